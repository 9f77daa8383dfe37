//! Klass - runtime representation of a loaded class or interface
//!
//! A klass owns its declared methods and fields, its vtable and the flattened
//! list of every interface it implements. Klasses are immutable once built
//! (see [`KlassBuilder`](super::builder::KlassBuilder)); identity is pointer
//! identity of the `Arc`.
//!
//! ## Vtable layout
//!
//! ```text
//! [ inherited slots (possibly overridden) | new virtual methods | mirandas ]
//! ```
//!
//! Miranda slots hold interface methods the class neither declares nor
//! inherits from a superclass. Interfaces carry no vtable; their methods
//! are numbered by itable index instead.

use std::fmt;
use std::sync::Arc;

use super::access::AccessFlags;
use super::field::FieldInfo;
use super::method::{Method, INVALID_VTABLE_INDEX};
use crate::intern::Symbol;

/// Klass - a loaded class or interface
pub struct Klass {
    pub(crate) name: Symbol,
    pub(crate) access: AccessFlags,
    pub(crate) loader_id: u32,
    pub(crate) super_klass: Option<Arc<Klass>>,
    pub(crate) local_interfaces: Vec<Arc<Klass>>,
    pub(crate) transitive_interfaces: Vec<Arc<Klass>>,
    pub(crate) methods: Vec<Arc<Method>>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) vtable: Vec<Arc<Method>>,
    pub(crate) instance_size: usize,
    pub(crate) static_size: usize,
}

impl Klass {
    /// Internal name, e.g. `java/lang/Object`
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Dotted name, e.g. `java.lang.Object`
    pub fn external_name(&self) -> String {
        self.name.as_klass_external_name()
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access
    }

    pub fn loader_id(&self) -> u32 {
        self.loader_id
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    pub fn is_final(&self) -> bool {
        self.access.is_final()
    }

    pub fn is_public(&self) -> bool {
        self.access.is_public()
    }

    pub fn super_klass(&self) -> Option<&Arc<Klass>> {
        self.super_klass.as_ref()
    }

    pub fn local_interfaces(&self) -> &[Arc<Klass>] {
        &self.local_interfaces
    }

    /// Every implemented interface, superinterfaces included
    pub fn transitive_interfaces(&self) -> &[Arc<Klass>] {
        &self.transitive_interfaces
    }

    pub fn methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn vtable(&self) -> &[Arc<Method>] {
        &self.vtable
    }

    pub fn vtable_length(&self) -> usize {
        self.vtable.len()
    }

    pub fn method_at_vtable(&self, index: usize) -> Option<&Arc<Method>> {
        self.vtable.get(index)
    }

    /// Instance size in bytes, header included
    pub fn instance_size(&self) -> usize {
        self.instance_size
    }

    /// End of the static field block in the class mirror
    pub fn static_size(&self) -> usize {
        self.static_size
    }

    /// `self` followed by its superclasses
    pub fn super_chain(&self) -> impl Iterator<Item = &Klass> {
        std::iter::successors(Some(self), |k| k.super_klass.as_deref())
    }

    pub fn is_subclass_of(&self, other: &Klass) -> bool {
        self.super_chain().any(|k| std::ptr::eq(k, other))
    }

    /// Subclass, implementor or identical
    pub fn is_subtype_of(&self, other: &Klass) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if other.is_interface() {
            return self
                .transitive_interfaces
                .iter()
                .any(|i| std::ptr::eq(Arc::as_ptr(i), other));
        }
        self.is_subclass_of(other)
    }

    /// Declared method with this name and signature
    pub fn find_method(&self, name: &Symbol, signature: &Symbol) -> Option<Arc<Method>> {
        self.methods
            .iter()
            .find(|m| m.matches(name, signature))
            .cloned()
    }

    /// Method declared here or by a superclass
    pub fn uncached_lookup_method(&self, name: &Symbol, signature: &Symbol) -> Option<Arc<Method>> {
        self.super_chain()
            .find_map(|k| k.find_method(name, signature))
    }

    /// Non-static method declared by any implemented interface
    pub fn lookup_method_in_all_interfaces(
        &self,
        name: &Symbol,
        signature: &Symbol,
    ) -> Option<Arc<Method>> {
        self.transitive_interfaces.iter().find_map(|intf| {
            intf.find_method(name, signature)
                .filter(|m| !m.is_static())
        })
    }

    pub fn find_local_field(&self, name: &Symbol, signature: &Symbol) -> Option<FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.matches(name, signature))
            .cloned()
    }

    fn find_interface_field(&self, name: &Symbol, signature: &Symbol) -> Option<(Arc<Klass>, FieldInfo)> {
        for intf in &self.local_interfaces {
            if let Some(field) = intf.find_local_field(name, signature) {
                return Some((Arc::clone(intf), field));
            }
            if let Some(found) = intf.find_interface_field(name, signature) {
                return Some(found);
            }
        }
        None
    }

    /// Field lookup in resolution order: this klass, its superinterfaces,
    /// then its superclass (recursively).
    pub fn find_field(
        self: &Arc<Self>,
        name: &Symbol,
        signature: &Symbol,
    ) -> Option<(Arc<Klass>, FieldInfo)> {
        if let Some(field) = self.find_local_field(name, signature) {
            return Some((Arc::clone(self), field));
        }
        if let Some(found) = self.find_interface_field(name, signature) {
            return Some(found);
        }
        self.super_klass.as_ref()?.find_field(name, signature)
    }

    /// Field at `offset`. Instance fields are searched up the superclass
    /// chain; static fields only locally.
    pub fn find_field_from_offset(
        self: &Arc<Self>,
        offset: u32,
        is_static: bool,
    ) -> Option<(Arc<Klass>, FieldInfo)> {
        let mut current = Some(Arc::clone(self));
        while let Some(klass) = current {
            if let Some(field) = klass
                .fields
                .iter()
                .find(|f| f.offset() == offset && f.is_static() == is_static)
            {
                return Some((Arc::clone(&klass), field.clone()));
            }
            if is_static {
                return None;
            }
            current = klass.super_klass.clone();
        }
        None
    }

    /// Vtable slot holding an interface method
    pub fn is_miranda_entry_at(&self, index: usize) -> bool {
        self.vtable
            .get(index)
            .and_then(|m| m.holder())
            .map_or(false, |holder| holder.is_interface())
    }

    /// Index of the miranda slot for `name` + `signature`, searching from
    /// the end, or [`INVALID_VTABLE_INDEX`].
    pub fn index_of_miranda(&self, name: &Symbol, signature: &Symbol) -> i32 {
        (0..self.vtable.len())
            .rev()
            .find(|&i| self.is_miranda_entry_at(i) && self.vtable[i].matches(name, signature))
            .map_or(INVALID_VTABLE_INDEX, |i| i as i32)
    }

    /// Vtable slot currently bound to `name` + `signature`
    pub fn vtable_index_of(&self, name: &Symbol, signature: &Symbol) -> Option<usize> {
        self.vtable.iter().position(|m| m.matches(name, signature))
    }

    /// Package part of the name, empty for the unnamed package
    pub fn package_name(&self) -> &[u8] {
        let bytes = self.name.as_bytes();
        match bytes.iter().rposition(|&b| b == b'/') {
            Some(pos) => &bytes[..pos],
            None => &[],
        }
    }

    /// Same loader and same package
    pub fn is_same_class_package(&self, other: &Klass) -> bool {
        self.loader_id == other.loader_id && self.package_name() == other.package_name()
    }
}

impl fmt::Debug for Klass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Klass")
            .field("name", &self.external_name())
            .field("access", &self.access)
            .field("methods", &self.methods.len())
            .field("vtable_length", &self.vtable.len())
            .finish()
    }
}
