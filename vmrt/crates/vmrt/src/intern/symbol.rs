//! Symbols
//!
//! A [`Symbol`] is a counted handle to a canonical, immutable byte string
//! owned by the [`SymbolTable`](super::SymbolTable). Cloning a handle adds a
//! reference, dropping it releases one. A symbol whose count reaches zero is
//! dead: lookups no longer return it and the next unlink pass reclaims it.
//! A dead symbol is never revived; interning the same bytes again creates a
//! fresh instance.
//!
//! Permanent symbols (well-known names, shared snapshot contents) carry a
//! sticky count and are never reclaimed.
//!
//! Handles must not outlive the table that created them.

use std::borrow::Cow;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use vmrt_util::{utf8, HashAlgorithm};

use super::hashtable::TablePayload;
use crate::util::AtomicUtils;

/// Sticky reference count of permanent symbols
pub const PERMANENT_REFCOUNT: u32 = u32::MAX;

pub(crate) enum SymbolBytes {
    Heap(Box<[u8]>),
    /// Arena memory, valid for the life of the owning table's arena
    Arena { ptr: NonNull<u8>, len: usize },
}

pub(crate) struct SymbolBody {
    refcount: AtomicU32,
    bytes: SymbolBytes,
}

// Arena bytes are written once before publication and never mutated.
unsafe impl Send for SymbolBody {}
unsafe impl Sync for SymbolBody {}

impl SymbolBody {
    pub fn heap(bytes: &[u8]) -> Self {
        Self {
            refcount: AtomicU32::new(1),
            bytes: SymbolBytes::Heap(bytes.into()),
        }
    }

    /// # Safety
    ///
    /// `ptr` must address `len` initialized bytes that outlive every handle
    /// to this body.
    pub unsafe fn permanent_in_arena(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            refcount: AtomicU32::new(PERMANENT_REFCOUNT),
            bytes: SymbolBytes::Arena { ptr, len },
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match &self.bytes {
            SymbolBytes::Heap(bytes) => bytes,
            SymbolBytes::Arena { ptr, len } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    #[inline]
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.refcount() == PERMANENT_REFCOUNT
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.refcount() == 0
    }

    /// Take a reference unless the symbol is dead.
    #[inline]
    pub fn try_retain(&self) -> bool {
        AtomicUtils::try_increment(&self.refcount, PERMANENT_REFCOUNT)
    }

    pub fn make_permanent(&self) {
        self.refcount.store(PERMANENT_REFCOUNT, Ordering::Release);
    }
}

impl TablePayload for SymbolBody {
    type Key = [u8];

    #[inline]
    fn hash_key(algorithm: &HashAlgorithm, key: &[u8]) -> u32 {
        algorithm.hash_bytes(key)
    }

    #[inline]
    fn hash_payload(&self, algorithm: &HashAlgorithm) -> u32 {
        algorithm.hash_bytes(self.as_bytes())
    }

    #[inline]
    fn matches(&self, key: &[u8]) -> bool {
        self.as_bytes() == key
    }

    fn reclaimable_at_teardown(&self) -> bool {
        self.is_dead()
    }
}

/// Counted handle to an interned symbol
pub struct Symbol {
    body: NonNull<SymbolBody>,
}

// The body is immutable apart from its atomic count.
unsafe impl Send for Symbol {}
unsafe impl Sync for Symbol {}

impl Symbol {
    /// Wrap a body whose count already includes this handle.
    ///
    /// # Safety
    ///
    /// The caller must have taken a reference on `body` for the new handle,
    /// and `body` must stay linked until that reference is released.
    pub(crate) unsafe fn from_retained(body: &SymbolBody) -> Self {
        Self {
            body: NonNull::from(body),
        }
    }

    #[inline]
    fn body(&self) -> &SymbolBody {
        // A live handle keeps the count above zero, so the entry is linked.
        unsafe { self.body.as_ref() }
    }

    /// Raw content in modified UTF-8
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.body().as_bytes()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    pub fn equals(&self, bytes: &[u8]) -> bool {
        self.as_bytes() == bytes
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.as_bytes().starts_with(prefix)
    }

    /// Position of `needle` at or after `start`.
    pub fn index_of_at(&self, start: usize, needle: &[u8]) -> Option<usize> {
        let bytes = self.as_bytes();
        if needle.is_empty() {
            return (start <= bytes.len()).then_some(start);
        }
        bytes
            .get(start..)?
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| pos + start)
    }

    /// Content as text; ASCII symbols borrow, others are decoded.
    pub fn as_str(&self) -> Cow<'_, str> {
        let bytes = self.as_bytes();
        if bytes.is_ascii() {
            // ASCII is valid UTF-8.
            Cow::Borrowed(std::str::from_utf8(bytes).unwrap_or_default())
        } else {
            Cow::Owned(utf8::decode_lossy(bytes))
        }
    }

    /// UTF-16 content
    pub fn to_utf16(&self) -> Vec<u16> {
        utf8::decode(self.as_bytes()).unwrap_or_else(|_| self.as_str().encode_utf16().collect())
    }

    /// `java/lang/Object` as `java.lang.Object`
    pub fn as_klass_external_name(&self) -> String {
        self.as_str().replace('/', ".")
    }

    /// Current reference count, [`PERMANENT_REFCOUNT`] for permanent symbols
    pub fn refcount(&self) -> u32 {
        self.body().refcount()
    }

    pub fn is_permanent(&self) -> bool {
        self.body().is_permanent()
    }

    /// Address-derived hash, stable for the life of the symbol
    pub fn identity_hash(&self) -> u32 {
        let addr = self.body.as_ptr() as usize as u64;
        ((addr >> 3) ^ (addr >> 35)) as u32
    }

    /// Address order, for sorted method arrays
    pub fn fast_compare(&self, other: &Symbol) -> CmpOrdering {
        self.body.as_ptr().cmp(&other.body.as_ptr())
    }

    /// Whether both handles name the same canonical instance
    #[inline]
    pub fn ptr_eq(&self, other: &Symbol) -> bool {
        self.body == other.body
    }
}

impl Clone for Symbol {
    fn clone(&self) -> Self {
        let retained = self.body().try_retain();
        debug_assert!(retained, "cloned a dead symbol");
        Self { body: self.body }
    }
}

impl Drop for Symbol {
    fn drop(&mut self) {
        AtomicUtils::decrement(&self.body().refcount, PERMANENT_REFCOUNT);
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.body.as_ptr().hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("value", &self.as_str())
            .field("refcount", &self.refcount())
            .finish()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked(bytes: &[u8]) -> Symbol {
        let body: &'static SymbolBody = Box::leak(Box::new(SymbolBody::heap(bytes)));
        unsafe { Symbol::from_retained(body) }
    }

    #[test]
    fn test_clone_and_drop_track_count() {
        let sym = leaked(b"java/lang/Object");
        assert_eq!(sym.refcount(), 1);
        let copy = sym.clone();
        assert_eq!(sym.refcount(), 2);
        assert_eq!(copy, sym);
        drop(copy);
        assert_eq!(sym.refcount(), 1);
    }

    #[test]
    fn test_dead_body_refuses_retain() {
        let body = SymbolBody::heap(b"x");
        body.refcount.store(0, Ordering::Relaxed);
        assert!(!body.try_retain());
        assert!(body.is_dead());
    }

    #[test]
    fn test_permanent_is_sticky() {
        let sym = leaked(b"<init>");
        sym.body().make_permanent();
        let copy = sym.clone();
        drop(copy);
        assert!(sym.is_permanent());
        assert_eq!(sym.refcount(), PERMANENT_REFCOUNT);
    }

    #[test]
    fn test_text_queries() {
        let sym = leaked(b"java/lang/String");
        assert_eq!(sym.as_klass_external_name(), "java.lang.String");
        assert!(sym.starts_with(b"java/"));
        assert_eq!(sym.index_of_at(0, b"/"), Some(4));
        assert_eq!(sym.index_of_at(5, b"/"), Some(9));
        assert_eq!(sym.index_of_at(10, b"/"), None);
        assert_eq!(sym.byte_at(0), Some(b'j'));
        assert_eq!(sym.to_string(), "java/lang/String");
    }

    #[test]
    fn test_non_ascii_round_trip() {
        let encoded = utf8::encode_str("caf\u{e9}");
        let sym = leaked(&encoded);
        assert_eq!(sym.as_str(), "caf\u{e9}");
        assert_eq!(sym.to_utf16(), "caf\u{e9}".encode_utf16().collect::<Vec<_>>());
    }
}
