//! Memory Module - Metadata Allocation
//!
//! Arena allocation for runtime metadata whose lifetime is tied to the
//! owning class loader (or to the whole runtime for the boot loader).

pub mod arena;

pub use arena::{BumpArena, MetaspaceArena};
