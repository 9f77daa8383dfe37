//! Signature-polymorphic intrinsics of `java/lang/invoke/MethodHandle`.

/// Intrinsic method identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicId {
    /// `invokeExact`
    InvokeExact,
    /// `invoke`, and any other signature-polymorphic MethodHandle method
    InvokeGeneric,
    /// `invokeBasic`
    InvokeBasic,
    /// `linkToVirtual`
    LinkToVirtual,
    /// `linkToStatic`
    LinkToStatic,
    /// `linkToSpecial`
    LinkToSpecial,
    /// `linkToInterface`
    LinkToInterface,
}

impl IntrinsicId {
    pub const ALL: [IntrinsicId; 7] = [
        IntrinsicId::InvokeExact,
        IntrinsicId::InvokeGeneric,
        IntrinsicId::InvokeBasic,
        IntrinsicId::LinkToVirtual,
        IntrinsicId::LinkToStatic,
        IntrinsicId::LinkToSpecial,
        IntrinsicId::LinkToInterface,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntrinsicId::InvokeExact => "invokeExact",
            IntrinsicId::InvokeGeneric => "invoke",
            IntrinsicId::InvokeBasic => "invokeBasic",
            IntrinsicId::LinkToVirtual => "linkToVirtual",
            IntrinsicId::LinkToStatic => "linkToStatic",
            IntrinsicId::LinkToSpecial => "linkToSpecial",
            IntrinsicId::LinkToInterface => "linkToInterface",
        }
    }

    /// Recognize a well-known intrinsic name.
    pub fn from_name(name: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name().as_bytes() == name)
    }

    /// The `linkTo*` family, declared static
    pub fn is_signature_polymorphic_static(self) -> bool {
        matches!(
            self,
            IntrinsicId::LinkToVirtual
                | IntrinsicId::LinkToStatic
                | IntrinsicId::LinkToSpecial
                | IntrinsicId::LinkToInterface
        )
    }

    /// Intrinsics only the runtime itself may link against
    pub fn is_signature_polymorphic_intrinsic(self) -> bool {
        !matches!(self, IntrinsicId::InvokeExact | IntrinsicId::InvokeGeneric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for id in IntrinsicId::ALL {
            assert_eq!(IntrinsicId::from_name(id.name().as_bytes()), Some(id));
        }
        assert_eq!(IntrinsicId::from_name(b"bindTo"), None);
    }

    #[test]
    fn test_staticness() {
        assert!(IntrinsicId::LinkToStatic.is_signature_polymorphic_static());
        assert!(!IntrinsicId::InvokeBasic.is_signature_polymorphic_static());
        assert!(IntrinsicId::InvokeBasic.is_signature_polymorphic_intrinsic());
        assert!(!IntrinsicId::InvokeExact.is_signature_polymorphic_intrinsic());
    }
}
