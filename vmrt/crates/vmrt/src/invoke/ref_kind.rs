//! Reference kinds of method handle constants.

use std::fmt;

/// How a member is invoked or accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl RefKind {
    /// Decode the raw sub-field; `None` for unrecognized encodings.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            1 => RefKind::GetField,
            2 => RefKind::GetStatic,
            3 => RefKind::PutField,
            4 => RefKind::PutStatic,
            5 => RefKind::InvokeVirtual,
            6 => RefKind::InvokeStatic,
            7 => RefKind::InvokeSpecial,
            8 => RefKind::NewInvokeSpecial,
            9 => RefKind::InvokeInterface,
            _ => return None,
        })
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    pub fn is_field(self) -> bool {
        matches!(
            self,
            RefKind::GetField | RefKind::GetStatic | RefKind::PutField | RefKind::PutStatic
        )
    }

    pub fn is_getter(self) -> bool {
        matches!(self, RefKind::GetField | RefKind::GetStatic)
    }

    pub fn is_setter(self) -> bool {
        matches!(self, RefKind::PutField | RefKind::PutStatic)
    }

    pub fn is_method(self) -> bool {
        !self.is_field() && self != RefKind::NewInvokeSpecial
    }

    pub fn is_static(self) -> bool {
        matches!(
            self,
            RefKind::GetStatic | RefKind::PutStatic | RefKind::InvokeStatic
        )
    }

    pub fn has_receiver(self) -> bool {
        matches!(
            self,
            RefKind::GetField
                | RefKind::PutField
                | RefKind::InvokeVirtual
                | RefKind::InvokeSpecial
                | RefKind::InvokeInterface
        )
    }

    /// Field access kind for the given staticness and direction
    pub fn for_field(is_static: bool, is_setter: bool) -> Self {
        match (is_static, is_setter) {
            (false, false) => RefKind::GetField,
            (true, false) => RefKind::GetStatic,
            (false, true) => RefKind::PutField,
            (true, true) => RefKind::PutStatic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RefKind::GetField => "getField",
            RefKind::GetStatic => "getStatic",
            RefKind::PutField => "putField",
            RefKind::PutStatic => "putStatic",
            RefKind::InvokeVirtual => "invokeVirtual",
            RefKind::InvokeStatic => "invokeStatic",
            RefKind::InvokeSpecial => "invokeSpecial",
            RefKind::NewInvokeSpecial => "newInvokeSpecial",
            RefKind::InvokeInterface => "invokeInterface",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
