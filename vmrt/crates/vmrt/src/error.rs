//! Error Module - vmrt Error Types
//!
//! Defines all error types surfaced by the runtime core.
//!
//! # Error Categories
//!
//! ## Resource Exhaustion (fatal for the request)
//! - `OutOfMemory` - Arena or chunk mapping exhausted
//! - `SymbolTooLong` / `StringTooLong` - Content exceeds the representable length
//!
//! ## Malformed Symbolic Reference (recoverable, record stays symbolic)
//! - `InternalError` - Obsolete or unrecognized member name format
//! - `NoSuchMethod` / `NoSuchField` / `Linkage` - Resolution found nothing
//! - `Link` - The link resolver rejected the reference
//!
//! ## Access Violation
//! - `IllegalAccess` - Caller may not reference the resolved class
//!
//! ## API Misuse
//! - `IllegalArgument` - Required argument missing or inconsistent
//!
//! ## Setup
//! - `Configuration` - Invalid runtime configuration
//! - `ClassFormat` - Inconsistent class definition handed to the class model

use thiserror::Error;

use crate::linkage::LinkError;

/// Main error type for all runtime operations
///
/// # Examples
///
/// ```rust
/// use vmrt::VmError;
///
/// fn report(err: VmError) {
///     match err {
///         VmError::SymbolTooLong { length, max } => {
///             eprintln!("symbol of {} bytes exceeds {}", length, max);
///         }
///         other if other.is_linkage() => eprintln!("link failure: {}", other),
///         other => eprintln!("error: {}", other),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum VmError {
    /// Out of memory - arena exhaustion
    ///
    /// **When returned:** A symbol body or arena chunk could not be allocated
    ///
    /// **Recovery strategy:** None for the current request
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Symbol content longer than a symbol can represent
    #[error("Symbol too long: {length} bytes exceeds maximum of {max}")]
    SymbolTooLong { length: usize, max: usize },

    /// String content longer than the string table accepts
    #[error("String too long: {length} chars exceeds maximum of {max}")]
    StringTooLong { length: usize, max: usize },

    /// Mapping a fresh arena chunk failed
    #[error("Virtual memory error: {0}")]
    VirtualMemory(String),

    /// VM-internal error surfaced to the managed caller
    ///
    /// **Example scenarios:**
    /// - Reference kind sub-field holds no recognized invocation mode
    /// - Member name has neither method, constructor nor field bit
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Required argument missing or inconsistent
    #[error("IllegalArgumentException: {0}")]
    IllegalArgument(String),

    /// Method or constructor resolution found no match
    #[error("NoSuchMethodError: {0}")]
    NoSuchMethod(String),

    /// Field resolution found no match
    #[error("NoSuchFieldError: {0}")]
    NoSuchField(String),

    /// Resolution failed for a member of unknown kind
    #[error("LinkageError: {0}")]
    Linkage(String),

    /// The link resolver rejected the reference
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Caller is not permitted to reference the class
    ///
    /// Distinct from "not found": the class exists but access verification failed.
    #[error("IllegalAccessError: {caller} cannot access {class}")]
    IllegalAccess { caller: String, class: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inconsistent class definition
    #[error("ClassFormatError: {0}")]
    ClassFormat(String),

    /// Malformed descriptor in a class definition
    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] vmrt_util::DescriptorError),
}

impl VmError {
    /// Resource exhaustion; the request cannot be completed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VmError::OutOfMemory { .. }
                | VmError::SymbolTooLong { .. }
                | VmError::StringTooLong { .. }
                | VmError::VirtualMemory(_)
        )
    }

    /// Errors of the linkage family a resolving caller can retry.
    pub fn is_linkage(&self) -> bool {
        matches!(
            self,
            VmError::NoSuchMethod(_)
                | VmError::NoSuchField(_)
                | VmError::Linkage(_)
                | VmError::Link(_)
                | VmError::IllegalAccess { .. }
        )
    }

    /// Check if this error indicates a bug in the caller
    pub fn is_bug(&self) -> bool {
        matches!(self, VmError::IllegalArgument(_))
    }
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(VmError::SymbolTooLong { length: 70_000, max: 65_535 }.is_fatal());
        assert!(VmError::OutOfMemory { requested: 8, available: 0 }.is_fatal());
        assert!(!VmError::NoSuchMethod("x".into()).is_fatal());
        assert!(VmError::NoSuchField("x".into()).is_linkage());
        assert!(VmError::IllegalAccess { caller: "a/A".into(), class: "b/B".into() }.is_linkage());
        assert!(!VmError::InternalError("x".into()).is_linkage());
        assert!(VmError::IllegalArgument("nothing to resolve".into()).is_bug());
    }

    #[test]
    fn test_messages_name_the_managed_error() {
        let err = VmError::InternalError("obsolete MemberName format".into());
        assert_eq!(err.to_string(), "InternalError: obsolete MemberName format");
    }
}
