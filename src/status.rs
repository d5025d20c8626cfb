//! Normalized status codes
//!
//! Every public operation of this crate resolves to exactly one of these
//! values. Raw provider results are never surfaced directly; they are
//! translated through [`LoaderStatus::from_raw`] at the call boundary.

use thiserror::Error;

/// API version reported by the provider module.
pub type ModuleVersion = u32;

/// Sentinel meaning "no version negotiated / error".
///
/// The negotiated version stays at this value until the version-query
/// export has been invoked successfully. All capability gateways treat
/// the sentinel as "library uninitialized".
pub const MODULE_VERSION_ERROR: ModuleVersion = 0xFFFF_FFFF;

/// Result alias used by every public operation.
///
/// `Ok` is the success case; the `Err` variant never carries
/// [`LoaderStatus::Success`].
pub type LoaderResult<T = ()> = Result<T, LoaderStatus>;

/// Normalized outcome of a loader operation.
///
/// The integer values are the stable wire contract shared with the
/// provider module and C consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum LoaderStatus {
    /// The operation completed successfully.
    #[error("success")]
    Success = 0,
    /// The provider module is not present in the running system.
    #[error("provider module not found")]
    ModuleNotFound = -0x01,
    /// A mandatory export is absent from the provider module.
    #[error("provider module is missing a mandatory export")]
    ModuleMissingExport = -0x02,
    /// The negotiated version is below what the client requires at all.
    #[error("provider module API version is not supported")]
    UnsupportedApiVersion = -0x03,
    /// The capability's export is absent or its minimum version is unmet.
    #[error("command is not supported by the provider module")]
    UnsupportedCommand = -0x04,
    /// The caller supplied an invalid argument.
    #[error("invalid argument")]
    InvalidArgument = -0x10,
    /// A runtime lookup on the provider side failed.
    #[error("not found")]
    NotFound = -0x11,
    /// The requested resource is currently not available.
    #[error("not available")]
    NotAvailable = -0x12,
    /// A capability was invoked before successful initialization.
    #[error("library is not initialized")]
    LibUninitialized = -0x20,
    /// Catch-all for provider-side failure or an unrecognized raw result.
    #[error("unknown error")]
    UnknownError = -0x1000,
}

impl LoaderStatus {
    /// Translate a raw provider result into a normalized status.
    ///
    /// Recognized values pass through unchanged; anything else maps to
    /// [`LoaderStatus::UnknownError`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => LoaderStatus::Success,
            -0x01 => LoaderStatus::ModuleNotFound,
            -0x02 => LoaderStatus::ModuleMissingExport,
            -0x03 => LoaderStatus::UnsupportedApiVersion,
            -0x04 => LoaderStatus::UnsupportedCommand,
            -0x10 => LoaderStatus::InvalidArgument,
            -0x11 => LoaderStatus::NotFound,
            -0x12 => LoaderStatus::NotAvailable,
            -0x20 => LoaderStatus::LibUninitialized,
            _ => LoaderStatus::UnknownError,
        }
    }

    /// The stable wire value of this status.
    pub fn to_raw(self) -> i32 {
        self as i32
    }

    /// The canonical constant name of this status.
    pub fn name(&self) -> &'static str {
        match self {
            LoaderStatus::Success => "RPX_LOADER_RESULT_SUCCESS",
            LoaderStatus::ModuleNotFound => "RPX_LOADER_RESULT_MODULE_NOT_FOUND",
            LoaderStatus::ModuleMissingExport => "RPX_LOADER_RESULT_MODULE_MISSING_EXPORT",
            LoaderStatus::UnsupportedApiVersion => "RPX_LOADER_RESULT_UNSUPPORTED_API_VERSION",
            LoaderStatus::UnsupportedCommand => "RPX_LOADER_RESULT_UNSUPPORTED_COMMAND",
            LoaderStatus::InvalidArgument => "RPX_LOADER_RESULT_INVALID_ARGUMENT",
            LoaderStatus::NotFound => "RPX_LOADER_RESULT_NOT_FOUND",
            LoaderStatus::NotAvailable => "RPX_LOADER_RESULT_NOT_AVAILABLE",
            LoaderStatus::LibUninitialized => "RPX_LOADER_RESULT_LIB_UNINITIALIZED",
            LoaderStatus::UnknownError => "RPX_LOADER_RESULT_UNKNOWN_ERROR",
        }
    }

    /// Whether this status is the success value.
    pub fn is_success(&self) -> bool {
        matches!(self, LoaderStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(LoaderStatus::Success.to_raw(), 0);
        assert_eq!(LoaderStatus::ModuleNotFound.to_raw(), -0x01);
        assert_eq!(LoaderStatus::ModuleMissingExport.to_raw(), -0x02);
        assert_eq!(LoaderStatus::UnsupportedApiVersion.to_raw(), -0x03);
        assert_eq!(LoaderStatus::UnsupportedCommand.to_raw(), -0x04);
        assert_eq!(LoaderStatus::InvalidArgument.to_raw(), -0x10);
        assert_eq!(LoaderStatus::NotFound.to_raw(), -0x11);
        assert_eq!(LoaderStatus::NotAvailable.to_raw(), -0x12);
        assert_eq!(LoaderStatus::LibUninitialized.to_raw(), -0x20);
        assert_eq!(LoaderStatus::UnknownError.to_raw(), -0x1000);
    }

    #[test]
    fn test_from_raw_roundtrip() {
        for status in [
            LoaderStatus::Success,
            LoaderStatus::ModuleNotFound,
            LoaderStatus::ModuleMissingExport,
            LoaderStatus::UnsupportedApiVersion,
            LoaderStatus::UnsupportedCommand,
            LoaderStatus::InvalidArgument,
            LoaderStatus::NotFound,
            LoaderStatus::NotAvailable,
            LoaderStatus::LibUninitialized,
            LoaderStatus::UnknownError,
        ] {
            assert_eq!(LoaderStatus::from_raw(status.to_raw()), status);
        }
    }

    #[test]
    fn test_from_raw_unrecognized() {
        assert_eq!(LoaderStatus::from_raw(-999), LoaderStatus::UnknownError);
        assert_eq!(LoaderStatus::from_raw(1), LoaderStatus::UnknownError);
        assert_eq!(LoaderStatus::from_raw(i32::MIN), LoaderStatus::UnknownError);
    }

    #[test]
    fn test_names() {
        assert_eq!(LoaderStatus::Success.name(), "RPX_LOADER_RESULT_SUCCESS");
        assert_eq!(
            LoaderStatus::LibUninitialized.name(),
            "RPX_LOADER_RESULT_LIB_UNINITIALIZED"
        );
        assert!(LoaderStatus::Success.is_success());
        assert!(!LoaderStatus::UnknownError.is_success());
    }
}
