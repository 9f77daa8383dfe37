//! Method metadata.

use std::fmt;
use std::sync::{Arc, Weak};

use super::access::AccessFlags;
use super::intrinsics::IntrinsicId;
use super::klass::Klass;
use crate::intern::Symbol;

/// Vtable index of methods that are never dispatched through a vtable
pub const NONVIRTUAL_VTABLE_INDEX: i32 = -2;
/// Vtable index of methods not (yet) placed in a vtable
pub const INVALID_VTABLE_INDEX: i32 = -4;
/// Itable index of non-interface methods
pub const INVALID_ITABLE_INDEX: i32 = -1;

/// A method declared by a klass, or synthesized for a signature-polymorphic
/// call.
pub struct Method {
    name: Symbol,
    signature: Symbol,
    access: AccessFlags,
    holder: Weak<Klass>,
    vtable_index: i32,
    itable_index: i32,
    intrinsic: Option<IntrinsicId>,
}

impl Method {
    pub(crate) fn new(
        name: Symbol,
        signature: Symbol,
        access: AccessFlags,
        holder: Weak<Klass>,
        vtable_index: i32,
        itable_index: i32,
        intrinsic: Option<IntrinsicId>,
    ) -> Self {
        Self {
            name,
            signature,
            access,
            holder,
            vtable_index,
            itable_index,
            intrinsic,
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn signature(&self) -> &Symbol {
        &self.signature
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access
    }

    /// Declaring klass; `None` once the klass has been dropped.
    pub fn holder(&self) -> Option<Arc<Klass>> {
        self.holder.upgrade()
    }

    pub fn vtable_index(&self) -> i32 {
        self.vtable_index
    }

    pub fn has_vtable_index(&self) -> bool {
        self.vtable_index >= 0
    }

    pub fn itable_index(&self) -> i32 {
        self.itable_index
    }

    pub fn has_itable_index(&self) -> bool {
        self.itable_index >= 0
    }

    pub fn intrinsic_id(&self) -> Option<IntrinsicId> {
        self.intrinsic
    }

    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_private(&self) -> bool {
        self.access.is_private()
    }

    pub fn is_public(&self) -> bool {
        self.access.is_public()
    }

    pub fn is_protected(&self) -> bool {
        self.access.is_protected()
    }

    pub fn is_final(&self) -> bool {
        self.access.is_final()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    pub fn is_native(&self) -> bool {
        self.access.is_native()
    }

    pub fn is_varargs(&self) -> bool {
        self.access.is_varargs()
    }

    pub fn is_object_initializer(&self) -> bool {
        self.name.equals(b"<init>")
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name.equals(b"<clinit>")
    }

    pub fn is_initializer(&self) -> bool {
        self.is_object_initializer() || self.is_static_initializer()
    }

    /// Final itself or declared by a final class
    pub fn is_final_method(&self) -> bool {
        self.is_final() || self.holder().map_or(false, |k| k.is_final())
    }

    /// Whether a call can bind without dispatch
    pub fn can_be_statically_bound(&self) -> bool {
        self.is_final_method() || self.vtable_index == NONVIRTUAL_VTABLE_INDEX
    }

    /// Same name and signature
    pub fn matches(&self, name: &Symbol, signature: &Symbol) -> bool {
        self.name.ptr_eq(name) && self.signature.ptr_eq(signature)
    }

    /// `java.lang.Object.equals(Ljava/lang/Object;)Z`
    pub fn external_name(&self) -> String {
        let holder = self
            .holder()
            .map(|k| k.external_name())
            .unwrap_or_else(|| "<unloaded>".to_string());
        format!("{}.{}{}", holder, self.name, self.signature)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.external_name())
            .field("access", &self.access)
            .field("vtable_index", &self.vtable_index)
            .field("itable_index", &self.itable_index)
            .finish()
    }
}
