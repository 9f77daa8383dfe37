//! Oops Module - Class Model
//!
//! The runtime's view of loaded code: klasses with their methods, fields
//! and vtables, class mirrors, method types and managed strings.
//!
//! Classes are defined through [`KlassBuilder`], which interns every name
//! and descriptor in the [`SymbolTable`](crate::intern::SymbolTable) and
//! links the vtable, then registered in the [`SystemDictionary`].

pub mod access;
pub mod builder;
pub mod dictionary;
pub mod field;
pub mod intrinsics;
pub mod java_string;
pub mod klass;
pub mod method;
pub mod mirror;
pub mod vm_symbols;

pub use access::AccessFlags;
pub use builder::KlassBuilder;
pub use dictionary::SystemDictionary;
pub use field::FieldInfo;
pub use intrinsics::IntrinsicId;
pub use java_string::{JavaString, StringRef};
pub use klass::Klass;
pub use method::{Method, INVALID_ITABLE_INDEX, INVALID_VTABLE_INDEX, NONVIRTUAL_VTABLE_INDEX};
pub use mirror::{JavaClass, MethodType};
pub use vm_symbols::VmSymbols;
