//! vmrt-util - Foundation types for the vmrt runtime
//!
//! ============================================================================
//! MODULE OVERVIEW
//! ============================================================================
//!
//! Small, dependency-free building blocks shared by the runtime crate:
//!
//! - [`hash`]: the default Java string hash and the seeded murmur3 alternate
//!   used by the interning tables after a hash-flood is detected.
//! - [`descriptor`]: parsing and validation of field and method descriptors.
//! - [`utf8`]: modified UTF-8, the encoding of every symbol.
//! - [`error`]: error types for the above.
//!
//! DESIGN PRINCIPLES:
//! ------------------
//! 1. NO HIDDEN STATE
//!    Nothing here owns global tables; the runtime decides where symbols
//!    live and which hash function is active.
//!
//! 2. BYTE-ORIENTED
//!    Symbols are byte strings, not Rust `str`. Functions take `&[u8]` and
//!    only offer lossy `String` views for display.

pub mod descriptor;
pub mod error;
pub mod hash;
pub mod utf8;

pub use descriptor::{BasicType, FieldType, MethodDescriptor};
pub use error::{DescriptorError, Utf8Error};
pub use hash::HashAlgorithm;

// Array dimension counts are stored in a single byte.
static_assertions::const_assert!(descriptor::MAX_ARRAY_DIMENSIONS <= u8::MAX as usize);
