//! Field and method type descriptors.
//!
//! Descriptors follow the class-file grammar:
//!
//! ```text
//! FieldType       := BaseType | 'L' ClassName ';' | '[' FieldType
//! MethodDescriptor:= '(' FieldType* ')' ( FieldType | 'V' )
//! ```
//!
//! Parsing never allocates symbols; callers intern the pieces they keep.

use crate::error::{DescriptorError, DescriptorResult};

/// Maximum number of array dimensions a descriptor may carry
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Primitive and reference categories of the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
    Object,
    Array,
    Void,
}

impl BasicType {
    /// Map a descriptor lead byte to its basic type.
    pub fn from_descriptor_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            b'Z' => BasicType::Boolean,
            b'C' => BasicType::Char,
            b'F' => BasicType::Float,
            b'D' => BasicType::Double,
            b'B' => BasicType::Byte,
            b'S' => BasicType::Short,
            b'I' => BasicType::Int,
            b'J' => BasicType::Long,
            b'L' => BasicType::Object,
            b'[' => BasicType::Array,
            b'V' => BasicType::Void,
            _ => return None,
        })
    }

    /// Descriptor character.
    pub fn descriptor_byte(self) -> u8 {
        match self {
            BasicType::Boolean => b'Z',
            BasicType::Char => b'C',
            BasicType::Float => b'F',
            BasicType::Double => b'D',
            BasicType::Byte => b'B',
            BasicType::Short => b'S',
            BasicType::Int => b'I',
            BasicType::Long => b'J',
            BasicType::Object => b'L',
            BasicType::Array => b'[',
            BasicType::Void => b'V',
        }
    }

    /// Java-level name of a primitive, `None` for references.
    pub fn primitive_name(self) -> Option<&'static str> {
        Some(match self {
            BasicType::Boolean => "boolean",
            BasicType::Char => "char",
            BasicType::Float => "float",
            BasicType::Double => "double",
            BasicType::Byte => "byte",
            BasicType::Short => "short",
            BasicType::Int => "int",
            BasicType::Long => "long",
            BasicType::Void => "void",
            BasicType::Object | BasicType::Array => return None,
        })
    }

    /// Storage size of a field of this type, references taking a full word.
    pub fn field_size(self) -> usize {
        match self {
            BasicType::Boolean | BasicType::Byte => 1,
            BasicType::Char | BasicType::Short => 2,
            BasicType::Int | BasicType::Float => 4,
            BasicType::Long | BasicType::Double => 8,
            BasicType::Object | BasicType::Array => 8,
            BasicType::Void => 0,
        }
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, BasicType::Object | BasicType::Array)
    }
}

/// A parsed field type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(BasicType),
    /// Internal class name, e.g. `java/lang/String`
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a complete field descriptor.
    pub fn parse(descriptor: &[u8]) -> DescriptorResult<Self> {
        if descriptor.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let mut parser = Parser::new(descriptor);
        let ty = parser.field_type()?;
        parser.finish()?;
        Ok(ty)
    }

    pub fn basic_type(&self) -> BasicType {
        match self {
            FieldType::Base(b) => *b,
            FieldType::Object(_) => BasicType::Object,
            FieldType::Array(_) => BasicType::Array,
        }
    }

    /// Render back to descriptor form.
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            FieldType::Base(b) => out.push(b.descriptor_byte() as char),
            FieldType::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            FieldType::Array(elem) => {
                out.push('[');
                elem.write_descriptor(out);
            }
        }
    }

    /// Number of leading array dimensions.
    pub fn dimensions(&self) -> usize {
        match self {
            FieldType::Array(elem) => 1 + elem.dimensions(),
            _ => 0,
        }
    }
}

/// A parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    /// `None` for `V`
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parse a complete method descriptor.
    pub fn parse(descriptor: &[u8]) -> DescriptorResult<Self> {
        if descriptor.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let mut parser = Parser::new(descriptor);
        parser.expect(b'(')?;
        let mut params = Vec::new();
        while parser.peek()? != b')' {
            params.push(parser.field_type()?);
        }
        parser.expect(b')')?;
        let ret = if parser.peek()? == b'V' {
            parser.bump();
            None
        } else {
            Some(parser.field_type()?)
        };
        parser.finish()?;
        Ok(Self { params, ret })
    }

    /// Argument slots, longs and doubles counting twice.
    pub fn arg_slots(&self) -> usize {
        self.params
            .iter()
            .map(|p| match p.basic_type() {
                BasicType::Long | BasicType::Double => 2,
                _ => 1,
            })
            .sum()
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for p in &self.params {
            p.write_descriptor(&mut out);
        }
        out.push(')');
        match &self.ret {
            Some(r) => r.write_descriptor(&mut out),
            None => out.push('V'),
        }
        out
    }
}

/// Whether `bytes` is a method descriptor (by lead byte only).
#[inline]
pub fn is_method_descriptor(bytes: &[u8]) -> bool {
    bytes.first() == Some(&b'(')
}

pub fn is_valid_field_descriptor(bytes: &[u8]) -> bool {
    FieldType::parse(bytes).is_ok()
}

pub fn is_valid_method_descriptor(bytes: &[u8]) -> bool {
    MethodDescriptor::parse(bytes).is_ok()
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> DescriptorResult<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(DescriptorError::UnexpectedEnd { pos: self.pos })
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, byte: u8) -> DescriptorResult<()> {
        let found = self.peek()?;
        if found != byte {
            return Err(DescriptorError::InvalidByte {
                byte: found,
                pos: self.pos,
            });
        }
        self.bump();
        Ok(())
    }

    fn finish(&self) -> DescriptorResult<()> {
        if self.pos != self.bytes.len() {
            return Err(DescriptorError::TrailingBytes { pos: self.pos });
        }
        Ok(())
    }

    fn field_type(&mut self) -> DescriptorResult<FieldType> {
        let mut dims = 0;
        while self.peek()? == b'[' {
            dims += 1;
            if dims > MAX_ARRAY_DIMENSIONS {
                return Err(DescriptorError::TooManyDimensions {
                    max: MAX_ARRAY_DIMENSIONS,
                });
            }
            self.bump();
        }

        let start = self.pos;
        let lead = self.peek()?;
        let mut ty = match BasicType::from_descriptor_byte(lead) {
            Some(BasicType::Void) => return Err(DescriptorError::MisplacedVoid { pos: start }),
            Some(BasicType::Object) => {
                self.bump();
                let name_start = self.pos;
                loop {
                    match self.peek()? {
                        b';' => break,
                        b'.' | b'[' => {
                            return Err(DescriptorError::InvalidByte {
                                byte: self.bytes[self.pos],
                                pos: self.pos,
                            })
                        }
                        _ => self.bump(),
                    }
                }
                if self.pos == name_start {
                    return Err(DescriptorError::InvalidByte { byte: b';', pos: self.pos });
                }
                let name = String::from_utf8_lossy(&self.bytes[name_start..self.pos]).into_owned();
                self.bump();
                FieldType::Object(name)
            }
            Some(BasicType::Array) => unreachable!("array prefix consumed above"),
            Some(base) => {
                self.bump();
                FieldType::Base(base)
            }
            None => return Err(DescriptorError::InvalidByte { byte: lead, pos: start }),
        };

        for _ in 0..dims {
            ty = FieldType::Array(Box::new(ty));
        }
        Ok(ty)
    }
}
