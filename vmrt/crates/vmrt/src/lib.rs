//! # vmrt - Symbol Interning and Method Handle Resolution
//!
//! vmrt is the metadata core of a JVM-style runtime: the tables that give
//! every name and string constant a single canonical instance, and the
//! resolution engine behind `java.lang.invoke`.
//!
//! ## Overview
//!
//! - **Symbol Table**: reference-counted byte strings, interned lock-free on
//!   the read path and reclaimed when their count reaches zero
//! - **String Table**: canonical managed strings whose liveness is decided
//!   by the garbage collector
//! - **Rehashing**: a table that walks too long a chain switches to a seeded
//!   murmur3 hash at the next safepoint
//! - **Shared Snapshot**: permanent pre-populated entries loaded at startup
//! - **Member Names**: symbolic member references resolved against the
//!   class hierarchy into invocable targets and dispatch indices
//! - **Call Sites**: retargetable method handles whose dependent compiled
//!   code is deoptimized before a new target becomes visible
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vmrt::{RuntimeConfig, RuntimeRegistry};
//!
//! fn main() -> vmrt::Result<()> {
//!     let runtime = RuntimeRegistry::new(RuntimeConfig::default())?;
//!
//!     // Interning twice yields the same symbol.
//!     let a = runtime.symbols().lookup_str("java/lang/String")?;
//!     let b = runtime.symbols().lookup_str("java/lang/String")?;
//!     assert!(a.ptr_eq(&b));
//!
//!     // Strings are canonical too.
//!     let s = runtime.strings().intern("hello")?;
//!     assert!(Arc::ptr_eq(&s, &runtime.strings().intern("hello")?));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     RuntimeRegistry                      │
//! │                                                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │ SymbolTable  │   │ StringTable  │   │  Dictionary  │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘  │
//! │         │                  │                  │          │
//! │         └────────┬─────────┘                  │          │
//! │                  ▼                            ▼          │
//! │  ┌──────────────────────────────┐   ┌──────────────────┐ │
//! │  │        MethodHandles         │──▶│   LinkResolver   │ │
//! │  │  resolve / expand / search   │   └──────────────────┘ │
//! │  └──────────────┬───────────────┘                        │
//! │                 ▼                                        │
//! │  ┌──────────────────────────────┐   ┌──────────────────┐ │
//! │  │  CallSite retargeting        │──▶│    CodeCache     │ │
//! │  └──────────────────────────────┘   └──────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Table Concurrency
//!
//! | Operation | Synchronization |
//! |-----------|-----------------|
//! | Lookup (hit) | Lock-free, epoch pinned |
//! | Insert | Per-table mutex, re-probe under the lock |
//! | Unlink dead entries | Safepoint token required |
//! | Rehash | Safepoint token required |
//!
//! Every operation that restructures a table takes a
//! [`SafepointToken`](runtime::SafepointToken), so it cannot be called
//! while mutators are running.
//!
//! ## Example: Resolving a Member Name
//!
//! ```rust
//! use vmrt::invoke::{DispatchIndex, MemberName, RefKind};
//! use vmrt::{RuntimeConfig, RuntimeRegistry};
//!
//! fn main() -> vmrt::Result<()> {
//!     let runtime = RuntimeRegistry::new(RuntimeConfig::default())?;
//!     let object = runtime.object_klass()?;
//!
//!     let mname = MemberName::method(&object, "hashCode", "()I", RefKind::InvokeVirtual);
//!     runtime.method_handles().resolve(&mname, None)?;
//!
//!     assert!(mname.is_resolved());
//!     assert!(matches!(mname.dispatch_index(), DispatchIndex::Vtable(_)));
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: runtime configuration and validation
//! - [`error`]: error types for all runtime operations
//! - [`intern`]: symbol and string tables, rehashing, shared snapshot
//! - [`invoke`]: member names, method handles and call sites
//! - [`linkage`]: link resolution against the class hierarchy
//! - [`logging`]: structured runtime events
//! - [`memory`]: metadata arenas
//! - [`oops`]: classes, methods, fields and managed strings
//! - [`runtime`]: registry, safepoints and code cache
//! - [`util`]: utility functions and helpers

// Interning
pub mod intern;

// Resolution
pub mod invoke;
pub mod linkage;
pub mod oops;

// Runtime and support
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod runtime;
pub mod util;

// Re-export main types for convenience
pub use config::{ConfigError, RuntimeConfig};
pub use error::{Result, VmError};
pub use intern::{SharedSnapshot, StringTable, Symbol, SymbolTable, TableStatistics};
pub use invoke::{CallSite, MemberName, MethodHandle, MethodHandles};
pub use runtime::{RegistryBuilder, RuntimeRegistry};

/// vmrt version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a runtime with default configuration
///
/// # Examples
///
/// ```rust
/// let runtime = vmrt::init()?;
/// assert!(runtime.find_class("java/lang/Object").is_some());
/// # Ok::<(), vmrt::VmError>(())
/// ```
pub fn init() -> Result<RuntimeRegistry> {
    RuntimeRegistry::new(RuntimeConfig::default())
}

/// Build a runtime with `config`
pub fn init_with_config(config: RuntimeConfig) -> Result<RuntimeRegistry> {
    RuntimeRegistry::new(config)
}
