//! Managed string objects.
//!
//! A [`JavaString`] holds immutable UTF-16 content. Identity matters: the
//! string table hands out one canonical [`StringRef`] per content, and code
//! compares interned strings with [`Arc::ptr_eq`].

use std::fmt;
use std::sync::Arc;

use vmrt_util::{hash::java_hash_utf16, utf8};

use crate::error::{Result, VmError};

/// Shared reference to a managed string
pub type StringRef = Arc<JavaString>;

/// Immutable UTF-16 string object
#[derive(Clone, PartialEq, Eq)]
pub struct JavaString {
    value: Box<[u16]>,
    hash: u32,
}

impl JavaString {
    pub fn new(value: impl Into<Box<[u16]>>) -> Self {
        let value = value.into();
        let hash = java_hash_utf16(&value);
        Self { value, hash }
    }

    pub fn of(s: &str) -> Self {
        Self::new(s.encode_utf16().collect::<Vec<u16>>())
    }

    /// Decode modified UTF-8.
    pub fn from_modified_utf8(bytes: &[u8]) -> Result<Self> {
        let chars = utf8::decode(bytes)
            .map_err(|e| VmError::IllegalArgument(format!("malformed string data: {}", e)))?;
        Ok(Self::new(chars))
    }

    #[inline]
    pub fn as_utf16(&self) -> &[u16] {
        &self.value
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// `String.hashCode()`
    #[inline]
    pub fn java_hash(&self) -> u32 {
        self.hash
    }

    pub fn to_modified_utf8(&self) -> Vec<u8> {
        utf8::encode(&self.value)
    }

    pub fn equals_str(&self, s: &str) -> bool {
        self.value.iter().copied().eq(s.encode_utf16())
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.value)
    }
}

impl From<&str> for JavaString {
    fn from(s: &str) -> Self {
        Self::of(s)
    }
}

impl fmt::Debug for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JavaString({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_java() {
        assert_eq!(JavaString::of("hello").java_hash(), 99_162_322);
        assert_eq!(JavaString::of("").java_hash(), 0);
    }

    #[test]
    fn test_modified_utf8_nul() {
        let s = JavaString::of("a\u{0}b");
        let encoded = s.to_modified_utf8();
        assert_eq!(encoded, vec![b'a', 0xc0, 0x80, b'b']);
        assert_eq!(JavaString::from_modified_utf8(&encoded).unwrap(), s);
        assert!(JavaString::from_modified_utf8(&[0xff]).is_err());
    }

    #[test]
    fn test_equals_str() {
        let s = JavaString::of("caf\u{e9}");
        assert!(s.equals_str("caf\u{e9}"));
        assert!(!s.equals_str("cafe"));
        assert_eq!(s.len(), 4);
    }
}
