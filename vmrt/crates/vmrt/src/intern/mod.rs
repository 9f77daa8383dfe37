//! Intern Module - Symbol and String Tables
//!
//! Canonical storage for names and string constants:
//! - Symbol table: reference-counted byte strings, reclaimed at zero
//! - String table: managed string objects, reclaimed by GC liveness
//! - Rehashing controller: skew detection and seeded rebuild
//! - Shared snapshot: permanent pre-populated entries

pub(crate) mod hashtable;
pub mod rehash;
pub mod shared;
pub mod stats;
pub mod string_table;
pub mod symbol;
pub mod symbol_table;

pub use rehash::RehashController;
pub use shared::SharedSnapshot;
pub use stats::{TableStatistics, UnlinkStats};
pub use string_table::{IsAliveClosure, OopClosure, RootAction, StringTable};
pub use symbol::{Symbol, PERMANENT_REFCOUNT};
pub use symbol_table::SymbolTable;
