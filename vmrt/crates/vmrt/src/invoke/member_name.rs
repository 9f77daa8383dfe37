//! MemberName - symbolic or resolved reference to a method, constructor or
//! field
//!
//! A member name starts symbolic (class, name, type, flags) and becomes
//! resolved when resolution publishes a [`Target`] and a `vmindex`. The
//! transition is one way: the first publish wins and later publishes are
//! ignored. Resolution itself is not locked per record; racing resolvers
//! compute equivalent results from the same immutable inputs.
//!
//! Member search is the exception. Its result slots are caller-owned
//! buffers that may be reused across searches, so each filled slot is
//! overwritten outright, symbolic components included.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::ref_kind::RefKind;
use crate::oops::{AccessFlags, JavaClass, JavaString, Klass, Method, MethodType, StringRef};

/// Flag bits of a member name, as shared with managed code
pub mod flags {
    pub const IS_METHOD: i32 = 0x0001_0000;
    pub const IS_CONSTRUCTOR: i32 = 0x0002_0000;
    pub const IS_FIELD: i32 = 0x0004_0000;
    pub const IS_TYPE: i32 = 0x0008_0000;
    pub const CALLER_SENSITIVE: i32 = 0x0010_0000;
    pub const TRUSTED_FINAL: i32 = 0x0020_0000;

    pub const ALL_KINDS: i32 = IS_METHOD | IS_CONSTRUCTOR | IS_FIELD | IS_TYPE;

    pub const REFERENCE_KIND_SHIFT: u32 = 24;
    pub const REFERENCE_KIND_MASK: i32 = 0x0f;

    /// Member search scope, only meaningful in search requests
    pub const SEARCH_SUPERCLASSES: i32 = 0x0010_0000;
    pub const SEARCH_INTERFACES: i32 = 0x0020_0000;

    pub const MODIFIER_MASK: i32 = 0xffff;

    /// `expand` suppression bits
    pub const SUPPRESS_DEFC: u32 = 1;
    pub const SUPPRESS_NAME: u32 = 2;
    pub const SUPPRESS_TYPE: u32 = 4;

    /// Reference kind sub-field, shifted into place
    pub const fn ref_kind_bits(kind: i32) -> i32 {
        (kind & REFERENCE_KIND_MASK) << REFERENCE_KIND_SHIFT
    }
}

use flags::*;

/// The `type` component of a member name
#[derive(Debug, Clone, PartialEq)]
pub enum MemberType {
    /// Descriptor string, e.g. `(I)V` or `Ljava/lang/String;`
    Signature(StringRef),
    /// Field type as a class mirror
    Class(JavaClass),
    /// Method type object
    MethodType(MethodType),
}

impl MemberType {
    pub fn signature(descriptor: &str) -> Self {
        MemberType::Signature(Arc::new(JavaString::of(descriptor)))
    }
}

/// What a resolved member name refers to
#[derive(Debug, Clone, Default)]
pub enum Target {
    #[default]
    Unresolved,
    Method(Arc<Method>),
    /// Field of `holder`, identified by `vmindex` and the static bit
    Field { holder: Arc<Klass> },
}

impl Target {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Target::Unresolved)
    }

    pub fn as_method(&self) -> Option<&Arc<Method>> {
        match self {
            Target::Method(m) => Some(m),
            _ => None,
        }
    }
}

/// Dispatch information of a resolved member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchIndex {
    Unresolved,
    /// Invoked without dispatch
    NonVirtual,
    Vtable(usize),
    Itable(usize),
    FieldOffset(u32),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemberState {
    pub(crate) clazz: Option<JavaClass>,
    pub(crate) name: Option<StringRef>,
    pub(crate) member_type: Option<MemberType>,
    pub(crate) flags: i32,
    pub(crate) target: Target,
    pub(crate) vmindex: i32,
}

/// MemberName - see module docs
#[derive(Default)]
pub struct MemberName {
    state: RwLock<MemberState>,
}

impl MemberName {
    pub fn new(
        clazz: Option<JavaClass>,
        name: Option<StringRef>,
        member_type: Option<MemberType>,
        flags: i32,
    ) -> Self {
        Self {
            state: RwLock::new(MemberState {
                clazz,
                name,
                member_type,
                flags,
                ..MemberState::default()
            }),
        }
    }

    /// Blank record, filled by member search
    pub fn empty() -> Self {
        Self::default()
    }

    /// Symbolic method reference
    pub fn method(clazz: &Arc<Klass>, name: &str, signature: &str, kind: RefKind) -> Self {
        Self::new(
            Some(JavaClass::instance(clazz)),
            Some(Arc::new(JavaString::of(name))),
            Some(MemberType::signature(signature)),
            IS_METHOD | ref_kind_bits(kind.raw()),
        )
    }

    /// Symbolic `<init>` reference
    pub fn constructor(clazz: &Arc<Klass>, signature: &str) -> Self {
        Self::new(
            Some(JavaClass::instance(clazz)),
            Some(Arc::new(JavaString::of("<init>"))),
            Some(MemberType::signature(signature)),
            IS_CONSTRUCTOR | ref_kind_bits(RefKind::NewInvokeSpecial.raw()),
        )
    }

    /// Symbolic field reference
    pub fn field(clazz: &Arc<Klass>, name: &str, descriptor: &str, kind: RefKind) -> Self {
        Self::new(
            Some(JavaClass::instance(clazz)),
            Some(Arc::new(JavaString::of(name))),
            Some(MemberType::signature(descriptor)),
            IS_FIELD | ref_kind_bits(kind.raw()),
        )
    }

    pub fn clazz(&self) -> Option<JavaClass> {
        self.state.read().clazz.clone()
    }

    pub fn name(&self) -> Option<StringRef> {
        self.state.read().name.clone()
    }

    pub fn member_type(&self) -> Option<MemberType> {
        self.state.read().member_type.clone()
    }

    pub fn flags(&self) -> i32 {
        self.state.read().flags
    }

    pub fn vmindex(&self) -> i32 {
        self.state.read().vmindex
    }

    pub fn target(&self) -> Target {
        self.state.read().target.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.state.read().target.is_resolved()
    }

    /// Raw reference kind sub-field
    pub fn ref_kind_raw(&self) -> i32 {
        (self.flags() >> REFERENCE_KIND_SHIFT) & REFERENCE_KIND_MASK
    }

    pub fn ref_kind(&self) -> Option<RefKind> {
        RefKind::from_raw(self.ref_kind_raw())
    }

    pub fn is_method(&self) -> bool {
        self.flags() & IS_METHOD != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.flags() & IS_CONSTRUCTOR != 0
    }

    pub fn is_field(&self) -> bool {
        self.flags() & IS_FIELD != 0
    }

    pub fn is_type(&self) -> bool {
        self.flags() & IS_TYPE != 0
    }

    /// Access modifiers carried in the low flag bits
    pub fn modifiers(&self) -> AccessFlags {
        AccessFlags::from_bits((self.flags() & MODIFIER_MASK) as u16)
    }

    pub fn dispatch_index(&self) -> DispatchIndex {
        let state = self.state.read();
        match &state.target {
            Target::Unresolved => DispatchIndex::Unresolved,
            Target::Field { .. } => DispatchIndex::FieldOffset(state.vmindex as u32),
            Target::Method(_) if state.vmindex < 0 => DispatchIndex::NonVirtual,
            Target::Method(_) => {
                let kind = (state.flags >> REFERENCE_KIND_SHIFT) & REFERENCE_KIND_MASK;
                if kind == RefKind::InvokeInterface.raw() {
                    DispatchIndex::Itable(state.vmindex as usize)
                } else {
                    DispatchIndex::Vtable(state.vmindex as usize)
                }
            },
        }
    }

    pub(crate) fn state(&self) -> MemberState {
        self.state.read().clone()
    }

    /// Publish a resolution. Returns false if another resolver got there
    /// first, in which case the record is left as it was.
    pub(crate) fn publish(&self, clazz: JavaClass, flags: i32, target: Target, vmindex: i32) -> bool {
        let mut state = self.state.write();
        if state.target.is_resolved() {
            return false;
        }
        state.clazz = Some(clazz);
        state.flags = flags;
        state.target = target;
        state.vmindex = vmindex;
        true
    }

    /// Replace whatever the record held with a fresh resolution.
    ///
    /// Name and type are cleared; `expand` derives them from the target.
    pub(crate) fn reset_resolved(&self, clazz: JavaClass, flags: i32, target: Target, vmindex: i32) {
        *self.state.write() = MemberState {
            clazz: Some(clazz),
            name: None,
            member_type: None,
            flags,
            target,
            vmindex,
        };
    }

    /// Fill in missing symbolic components; present ones are kept.
    pub(crate) fn fill_symbolic(
        &self,
        clazz: Option<JavaClass>,
        name: Option<StringRef>,
        member_type: Option<MemberType>,
    ) {
        let mut state = self.state.write();
        if state.clazz.is_none() {
            state.clazz = clazz;
        }
        if state.name.is_none() {
            state.name = name;
        }
        if state.member_type.is_none() {
            state.member_type = member_type;
        }
    }
}

impl fmt::Debug for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemberName")
            .field("clazz", &state.clazz)
            .field("name", &state.name.as_ref().map(|s| s.to_string_lossy()))
            .field("type", &state.member_type)
            .field("flags", &format_args!("{:#010x}", state.flags))
            .field("vmindex", &state.vmindex)
            .field("resolved", &state.target.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_layout() {
        assert_eq!(ref_kind_bits(RefKind::InvokeInterface.raw()), 0x0900_0000);
        assert_eq!(ALL_KINDS, 0x000f_0000);
        let mn = MemberName::new(None, None, None, IS_FIELD | ref_kind_bits(3) | 0x0008);
        assert_eq!(mn.ref_kind(), Some(RefKind::PutField));
        assert!(mn.is_field());
        assert!(mn.modifiers().is_static());
        assert_eq!(mn.dispatch_index(), DispatchIndex::Unresolved);
    }

    #[test]
    fn test_fill_keeps_present_components() {
        let mn = MemberName::new(None, Some(Arc::new(JavaString::of("keep"))), None, IS_METHOD);
        mn.fill_symbolic(
            None,
            Some(Arc::new(JavaString::of("replace"))),
            Some(MemberType::signature("()V")),
        );
        assert!(mn.name().unwrap().equals_str("keep"));
        assert_eq!(mn.member_type(), Some(MemberType::signature("()V")));
    }

    #[test]
    fn test_reset_overwrites_resolved_record() {
        let mn = MemberName::new(None, Some(Arc::new(JavaString::of("stale"))), None, IS_METHOD);
        assert!(!mn.is_resolved());

        let prim = JavaClass::Primitive(vmrt_util::BasicType::Int);
        mn.reset_resolved(prim, IS_FIELD, Target::Unresolved, 16);
        assert_eq!(mn.flags(), IS_FIELD);
        assert_eq!(mn.vmindex(), 16);
        assert!(mn.name().is_none(), "stale name must not survive a refill");
        assert!(matches!(mn.clazz(), Some(JavaClass::Primitive(_))));
    }
}
