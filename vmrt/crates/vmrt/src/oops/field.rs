//! Field metadata.

use vmrt_util::BasicType;

use super::access::AccessFlags;
use crate::intern::Symbol;

/// A field declared by a klass, with its laid-out offset
#[derive(Debug, Clone)]
pub struct FieldInfo {
    name: Symbol,
    signature: Symbol,
    access: AccessFlags,
    offset: u32,
}

impl FieldInfo {
    pub(crate) fn new(name: Symbol, signature: Symbol, access: AccessFlags, offset: u32) -> Self {
        Self {
            name,
            signature,
            access,
            offset,
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

    /// Byte offset in the instance, or in the class mirror for statics
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn is_final(&self) -> bool {
        self.access.is_final()
    }

    pub fn matches(&self, name: &Symbol, signature: &Symbol) -> bool {
        self.name.ptr_eq(name) && self.signature.ptr_eq(signature)
    }

    /// Basic type of the field's descriptor
    pub fn field_type(&self) -> BasicType {
        self.signature
            .byte_at(0)
            .and_then(BasicType::from_descriptor_byte)
            .unwrap_or(BasicType::Object)
    }
}
