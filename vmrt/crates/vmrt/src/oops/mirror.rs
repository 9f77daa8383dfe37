//! Class mirrors and method types as seen by managed code.

use std::fmt;
use std::sync::Arc;

use vmrt_util::BasicType;

use super::klass::Klass;

/// JavaClass - reflective class object (`java.lang.Class`)
#[derive(Clone)]
pub enum JavaClass {
    /// `int.class`, `void.class`, ...
    Primitive(BasicType),
    /// Class or interface
    Instance(Arc<Klass>),
    /// Array with the given component type
    Array(Box<JavaClass>),
}

impl JavaClass {
    pub fn instance(klass: &Arc<Klass>) -> Self {
        JavaClass::Instance(Arc::clone(klass))
    }

    pub fn array_of(component: JavaClass) -> Self {
        JavaClass::Array(Box::new(component))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, JavaClass::Primitive(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JavaClass::Array(_))
    }

    pub fn as_klass(&self) -> Option<&Arc<Klass>> {
        match self {
            JavaClass::Instance(k) => Some(k),
            _ => None,
        }
    }

    /// Class of the innermost element of an array, or the class itself.
    /// `None` for primitives and primitive arrays.
    pub fn element_klass(&self) -> Option<&Arc<Klass>> {
        match self {
            JavaClass::Primitive(_) => None,
            JavaClass::Instance(k) => Some(k),
            JavaClass::Array(component) => component.element_klass(),
        }
    }

    /// Field descriptor, e.g. `I`, `Ljava/lang/String;`, `[[J`
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    pub(crate) fn write_descriptor(&self, out: &mut String) {
        match self {
            JavaClass::Primitive(t) => out.push(t.descriptor_byte() as char),
            JavaClass::Instance(k) => {
                out.push('L');
                out.push_str(&k.name().as_str());
                out.push(';');
            },
            JavaClass::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            },
        }
    }
}

impl PartialEq for JavaClass {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JavaClass::Primitive(a), JavaClass::Primitive(b)) => a == b,
            (JavaClass::Instance(a), JavaClass::Instance(b)) => Arc::ptr_eq(a, b),
            (JavaClass::Array(a), JavaClass::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JavaClass {}

impl fmt::Debug for JavaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JavaClass({})", self.descriptor())
    }
}

/// MethodType - return type plus parameter types
#[derive(Clone, PartialEq, Eq)]
pub struct MethodType {
    rtype: JavaClass,
    ptypes: Vec<JavaClass>,
}

impl MethodType {
    pub fn new(rtype: JavaClass, ptypes: Vec<JavaClass>) -> Self {
        Self { rtype, ptypes }
    }

    pub fn rtype(&self) -> &JavaClass {
        &self.rtype
    }

    pub fn ptypes(&self) -> &[JavaClass] {
        &self.ptypes
    }

    /// Method descriptor, e.g. `(Ljava/lang/Object;)Z`
    pub fn signature(&self) -> String {
        let mut out = String::from("(");
        for p in &self.ptypes {
            p.write_descriptor(&mut out);
        }
        out.push(')');
        self.rtype.write_descriptor(&mut out);
        out
    }
}

impl fmt::Debug for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodType{}", self.signature())
    }
}
