//! Seeded MurmurHash3 (x86, 32-bit).
//!
//! Used as the alternate hash of the interning tables once a bucket has been
//! observed to degenerate. The UTF-16 variant consumes two code units per
//! block so it agrees with the byte variant over little-endian UTF-16.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

#[inline]
fn mix_k1(mut k1: u32) -> u32 {
    k1 = k1.wrapping_mul(C1);
    k1 = k1.rotate_left(15);
    k1.wrapping_mul(C2)
}

#[inline]
fn mix_h1(mut h1: u32, k1: u32) -> u32 {
    h1 ^= mix_k1(k1);
    h1 = h1.rotate_left(13);
    h1.wrapping_mul(5).wrapping_add(0xe654_6b64)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Hash a byte slice.
pub fn murmur3_32(seed: u32, data: &[u8]) -> u32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 = mix_h1(h1, k1);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc ^ ((b as u32) << (8 * i)));
        h1 ^= mix_k1(k1);
    }

    h1 ^= data.len() as u32;
    fmix32(h1)
}

/// Hash a slice of UTF-16 code units.
pub fn murmur3_32_utf16(seed: u32, data: &[u16]) -> u32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(2);

    for block in &mut blocks {
        let k1 = (block[0] as u32) | ((block[1] as u32) << 16);
        h1 = mix_h1(h1, k1);
    }

    if let [last] = blocks.remainder() {
        h1 ^= mix_k1(*last as u32);
    }

    h1 ^= (data.len() as u32).wrapping_mul(2);
    fmix32(h1)
}

/// Hash a slice of 32-bit words.
pub fn murmur3_32_words(seed: u32, data: &[u32]) -> u32 {
    let h1 = data.iter().fold(seed, |h1, &k1| mix_h1(h1, k1));
    fmix32(h1 ^ (data.len() as u32).wrapping_mul(4))
}
