//! Provider host abstraction
//!
//! The OS-specific module loading mechanism is an opaque collaborator:
//! "acquire module by name" and "find exported symbol by name". The
//! client only ever talks to these traits, which keeps the negotiation
//! logic independent of the host's native loading machinery and makes
//! the whole guard chain testable against an in-memory provider.

use thiserror::Error;

use crate::types::{ExportSignature, ExportValue};

/// Acquires provider modules by their well-known name.
pub trait ModuleHost: Send + Sync {
    /// Acquire a handle to the named module.
    ///
    /// One-shot: a failed acquisition is reported and never retried by
    /// the caller within the same operation.
    fn acquire(&self, module_name: &str) -> Result<Box<dyn ProviderModule>, AcquireError>;
}

/// An acquired provider module.
///
/// The handle is valid for the lifetime of the process once acquired;
/// there is no release operation.
pub trait ProviderModule: Send + Sync {
    /// Resolve a named export against its declared contract.
    ///
    /// Hosts that can introspect exports reject a contract mismatch with
    /// [`ResolveError::SignatureMismatch`]; hosts that cannot trust the
    /// declared contract bit-exactly.
    fn find_export(
        &self,
        name: &str,
        signature: &ExportSignature,
    ) -> Result<Box<dyn ProviderExport>, ResolveError>;
}

/// A resolved, callable provider export.
pub trait ProviderExport: Send + Sync {
    /// Forward a call with the exact argument list the export expects.
    ///
    /// The raw return value is a `u64` register; the gateway translates
    /// it according to the declared return type.
    fn invoke(&self, args: &[ExportValue]) -> u64;
}

/// Module acquisition failure.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The module is not present in the running system.
    #[error("module '{0}' not found")]
    NotFound(String),
    /// The module was found but could not be loaded.
    #[error("failed to load module '{name}': {reason}")]
    LoadFailed { name: String, reason: String },
}

/// Export resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The export is absent from the module.
    #[error("export '{0}' not found")]
    NotFound(String),
    /// The export exists but its contract differs from the declared one.
    #[error("export '{name}' signature mismatch: declared {declared}, found {found}")]
    SignatureMismatch {
        name: String,
        declared: String,
        found: String,
    },
    /// The export name is not a valid symbol name.
    #[error("invalid export name '{0}'")]
    InvalidName(String),
    /// The declared arity exceeds what the host can forward.
    #[error("export '{name}' has unsupported arity {arity}")]
    UnsupportedArity { name: String, arity: usize },
}
