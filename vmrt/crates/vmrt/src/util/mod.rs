//! Util Module - Shared Utilities
//!
//! Utilities and helper functions used throughout the runtime.

pub mod alignment;
pub mod atomic;

pub use alignment::Alignment;
pub use atomic::AtomicUtils;

/// Constants for the runtime
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;

    /// Default arena alignment: 8 bytes
    pub const DEFAULT_ALIGNMENT: usize = 8;

    /// Object header size preceding instance fields
    pub const OBJECT_HEADER_SIZE: usize = 16;

    /// Offset of the first static field inside a class mirror
    pub const STATIC_FIELD_BASE: usize = 96;
}
