//! Hash functions for the interning tables.
//!
//! Two interchangeable functions are provided:
//!
//! - the default Java string hash (`h = 31 * h + c`), cheap and stable but
//!   trivially floodable ("Aa" and "BB" collide, and so does every
//!   concatenation of them);
//! - a seeded MurmurHash3 alternate, selected once a table has observed a
//!   degenerate bucket. Moving to the alternate is a one-way upgrade.
//!
//! [`HashAlgorithm`] bundles the choice and the seed so a table can switch
//! with a single store.

pub mod murmur3;

pub use murmur3::{murmur3_32, murmur3_32_utf16, murmur3_32_words};

/// Java `String.hashCode` over modified UTF-8 bytes.
///
/// Bytes are sign-extended before accumulation, matching how the class-file
/// parser hashes `jbyte` data.
#[inline]
pub fn java_hash_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |h, &b| {
        h.wrapping_mul(31).wrapping_add(b as i8 as i32 as u32)
    })
}

/// Java `String.hashCode` over UTF-16 code units.
#[inline]
pub fn java_hash_utf16(chars: &[u16]) -> u32 {
    chars
        .iter()
        .fold(0u32, |h, &c| h.wrapping_mul(31).wrapping_add(c as u32))
}

/// Active hash function of an interning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// `31 * h + c`
    JavaDefault,
    /// Seeded murmur3_32
    Murmur3 { seed: u32 },
}

impl HashAlgorithm {
    /// Hash modified UTF-8 content.
    #[inline]
    pub fn hash_bytes(&self, bytes: &[u8]) -> u32 {
        match *self {
            HashAlgorithm::JavaDefault => java_hash_bytes(bytes),
            HashAlgorithm::Murmur3 { seed } => murmur3_32(seed, bytes),
        }
    }

    /// Hash UTF-16 content.
    #[inline]
    pub fn hash_utf16(&self, chars: &[u16]) -> u32 {
        match *self {
            HashAlgorithm::JavaDefault => java_hash_utf16(chars),
            HashAlgorithm::Murmur3 { seed } => murmur3_32_utf16(seed, chars),
        }
    }

    /// Whether this is the seeded alternate.
    #[inline]
    pub fn is_alternate(&self) -> bool {
        matches!(self, HashAlgorithm::Murmur3 { .. })
    }

    /// Seed of the alternate hash, if active.
    pub fn seed(&self) -> Option<u32> {
        match *self {
            HashAlgorithm::JavaDefault => None,
            HashAlgorithm::Murmur3 { seed } => Some(seed),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::JavaDefault
    }
}

/// Build `2^n` distinct byte strings that all share one Java hash.
///
/// Each string is a concatenation of `n` blocks drawn from `"Aa"` / `"BB"`.
/// Handy for exercising skew detection.
pub fn colliding_java_strings(n: u32) -> Vec<Vec<u8>> {
    (0..(1u64 << n))
        .map(|bits| {
            (0..n)
                .flat_map(|i| {
                    if bits & (1 << i) == 0 {
                        *b"Aa"
                    } else {
                        *b"BB"
                    }
                })
                .collect()
        })
        .collect()
}
