//! Export call contract
//!
//! Types describing the native calling contract of a provider export:
//! the declared parameter/return types, and the argument values lowered
//! to `u64` registers at the call boundary.

use std::ffi::CString;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Value types that can cross the provider export boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    /// No value.
    Void,
    /// C `bool` (one byte, zero/non-zero).
    Bool,
    /// 32-bit unsigned integer.
    U32,
    /// 32-bit signed integer.
    I32,
    /// Raw pointer (out-parameters, caller-supplied buffers).
    Ptr,
    /// Null-terminated C string (`const char *`).
    CStr,
    /// Provider status code (`i32` on the wire).
    Status,
}

impl ExportType {
    /// Whether this type is passed as a pointer.
    pub fn is_pointer(&self) -> bool {
        matches!(self, ExportType::Ptr | ExportType::CStr)
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportType::Void => write!(f, "void"),
            ExportType::Bool => write!(f, "bool"),
            ExportType::U32 => write!(f, "u32"),
            ExportType::I32 => write!(f, "i32"),
            ExportType::Ptr => write!(f, "ptr"),
            ExportType::CStr => write!(f, "cstr"),
            ExportType::Status => write!(f, "status"),
        }
    }
}

/// An argument value forwarded to a provider export.
///
/// The `CStr` variant owns its backing allocation, so the pointer handed
/// to the export stays valid for the duration of the call.
#[derive(Debug, Clone)]
pub enum ExportValue {
    /// 32-bit unsigned integer.
    U32(u32),
    /// 32-bit signed integer.
    I32(i32),
    /// Raw pointer value.
    Ptr(usize),
    /// Owned null-terminated string.
    CStr(CString),
}

impl ExportValue {
    /// Lower this value to a `u64` argument register.
    pub fn to_u64(&self) -> u64 {
        match self {
            ExportValue::U32(v) => u64::from(*v),
            ExportValue::I32(v) => *v as u32 as u64,
            ExportValue::Ptr(v) => *v as u64,
            ExportValue::CStr(s) => s.as_ptr() as u64,
        }
    }

    /// The declared type this value satisfies.
    pub fn export_type(&self) -> ExportType {
        match self {
            ExportValue::U32(_) => ExportType::U32,
            ExportValue::I32(_) => ExportType::I32,
            ExportValue::Ptr(_) => ExportType::Ptr,
            ExportValue::CStr(_) => ExportType::CStr,
        }
    }
}

/// Statically declared contract of a provider export.
///
/// Each capability carries one of these; it is compared at resolution
/// time where the host can introspect exports, and it drives the raw
/// result translation after a forwarded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSignature {
    /// Parameter types, in call order.
    pub params: Vec<ExportType>,
    /// Return type.
    pub returns: ExportType,
}

impl ExportSignature {
    /// Create a new signature.
    pub fn new(params: Vec<ExportType>, returns: ExportType) -> Self {
        Self { params, returns }
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Check an argument list against the declared parameters.
    pub fn matches_args(&self, args: &[ExportValue]) -> bool {
        args.len() == self.params.len()
            && args
                .iter()
                .zip(self.params.iter())
                .all(|(value, param)| value.export_type() == *param)
    }
}

impl fmt::Display for ExportSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.returns)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}
