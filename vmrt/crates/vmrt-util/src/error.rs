//! Core error types for vmrt-util crate
//!
//! This module defines error types used throughout the util crate.

use thiserror::Error;

/// Error type for type descriptor parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// Descriptor has no bytes at all
    #[error("Empty descriptor")]
    Empty,

    /// Descriptor ended in the middle of a type
    #[error("Descriptor truncated at byte {pos}")]
    UnexpectedEnd { pos: usize },

    /// Byte that cannot start or continue a type
    #[error("Invalid descriptor byte {byte:#04x} at {pos}")]
    InvalidByte { byte: u8, pos: usize },

    /// Array nesting deeper than the class-file format allows
    #[error("Array descriptor exceeds {max} dimensions")]
    TooManyDimensions { max: usize },

    /// Bytes left over after a complete descriptor
    #[error("Trailing bytes after descriptor at {pos}")]
    TrailingBytes { pos: usize },

    /// `V` used where a value type is required
    #[error("void is only valid as a method return type (at {pos})")]
    MisplacedVoid { pos: usize },
}

/// Error type for modified UTF-8 decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Utf8Error {
    /// Lead or continuation byte is not valid modified UTF-8
    #[error("Malformed modified UTF-8 at byte {pos}")]
    Malformed { pos: usize },

    /// Multi-byte sequence cut short by the end of input
    #[error("Truncated modified UTF-8 sequence at byte {pos}")]
    Truncated { pos: usize },
}

/// Result type alias for descriptor operations
pub type DescriptorResult<T> = std::result::Result<T, DescriptorError>;

/// Result type alias for UTF-8 operations
pub type Utf8Result<T> = std::result::Result<T, Utf8Error>;
