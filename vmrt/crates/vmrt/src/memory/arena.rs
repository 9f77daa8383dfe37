//! Metaspace Arena - Bump Pointer Allocation
//!
//! Fixed-lifetime memory for runtime metadata. Memory handed out by an arena
//! is never freed individually; it is released when the arena is dropped.
//! The interning tables use it for permanent symbol bodies.
//!
//! Chunks are anonymous memory mappings sized to a multiple of the system
//! page size. Allocation bumps a pointer inside the current chunk and maps a
//! new chunk when the current one is exhausted, until the arena's capacity is
//! reached. Exhaustion is fatal for the request and is reported, never retried.

use std::ptr::NonNull;

use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::error::{Result, VmError};
use crate::util::constants::DEFAULT_ALIGNMENT;
use crate::util::Alignment;

/// Arena allocator interface consumed by the interning tables
pub trait MetaspaceArena: Send + Sync {
    /// Allocate `size` bytes, aligned to at least 8 bytes.
    ///
    /// The memory stays valid until the arena is dropped.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;

    /// Bytes handed out so far.
    fn used(&self) -> usize;

    /// Bytes of mapped chunks.
    fn committed(&self) -> usize;
}

struct Chunk {
    map: MmapMut,
    top: usize,
}

impl Chunk {
    fn remaining(&self) -> usize {
        self.map.len() - self.top
    }
}

struct ArenaState {
    chunks: Vec<Chunk>,
    committed: usize,
    used: usize,
}

/// BumpArena - chunked bump pointer arena
pub struct BumpArena {
    chunk_size: usize,
    capacity: usize,
    state: Mutex<ArenaState>,
}

impl BumpArena {
    /// Create an arena that maps chunks of `chunk_size` bytes up to `capacity`.
    pub fn new(chunk_size: usize, capacity: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(VmError::IllegalArgument(
                "arena chunk size must be > 0".to_string(),
            ));
        }
        let page = page_size::get();
        let chunk_size = Alignment::align_up(chunk_size, page);
        if capacity < chunk_size {
            return Err(VmError::IllegalArgument(format!(
                "arena capacity ({:#x}) must be at least one chunk ({:#x})",
                capacity, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            capacity,
            state: Mutex::new(ArenaState {
                chunks: Vec::new(),
                committed: 0,
                used: 0,
            }),
        })
    }

    /// Chunk size after page rounding
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of mapped chunks
    pub fn chunk_count(&self) -> usize {
        self.state.lock().chunks.len()
    }

    fn map_chunk(&self, state: &mut ArenaState, min_size: usize) -> Result<()> {
        let size = Alignment::align_up(min_size.max(self.chunk_size), page_size::get());
        let available = self.capacity.saturating_sub(state.committed);
        if size > available {
            log::warn!(
                "metaspace arena exhausted: need {} bytes, {} of {} committed",
                size,
                state.committed,
                self.capacity
            );
            return Err(VmError::OutOfMemory {
                requested: min_size,
                available,
            });
        }

        let map = MmapMut::map_anon(size)
            .map_err(|e| VmError::VirtualMemory(format!("arena chunk of {} bytes: {}", size, e)))?;
        state.committed += size;
        state.chunks.push(Chunk { map, top: 0 });
        log::debug!("mapped arena chunk #{} ({} bytes)", state.chunks.len(), size);
        Ok(())
    }
}

impl MetaspaceArena for BumpArena {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let aligned_size = Alignment::align_up(size.max(1), DEFAULT_ALIGNMENT);
        let mut state = self.state.lock();

        let needs_chunk = state
            .chunks
            .last()
            .map_or(true, |chunk| chunk.remaining() < aligned_size);
        if needs_chunk {
            self.map_chunk(&mut state, aligned_size)?;
        }

        state.used += aligned_size;
        let chunk = state
            .chunks
            .last_mut()
            .ok_or_else(|| VmError::VirtualMemory("arena has no chunk".to_string()))?;
        let offset = chunk.top;
        chunk.top += aligned_size;

        // The mapping never moves, even when `chunks` reallocates.
        let ptr = unsafe { chunk.map.as_mut_ptr().add(offset) };
        NonNull::new(ptr).ok_or_else(|| VmError::VirtualMemory("null arena chunk".to_string()))
    }

    fn used(&self) -> usize {
        self.state.lock().used
    }

    fn committed(&self) -> usize {
        self.state.lock().committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_aligned_and_distinct() {
        let arena = BumpArena::new(4096, 16 * page_size::get()).unwrap();
        let a = arena.allocate(3).unwrap();
        let b = arena.allocate(5).unwrap();
        assert_ne!(a, b);
        assert!(Alignment::is_aligned(a.as_ptr() as usize, DEFAULT_ALIGNMENT));
        assert!(Alignment::is_aligned(b.as_ptr() as usize, DEFAULT_ALIGNMENT));
        assert_eq!(arena.used(), 16);
    }

    #[test]
    fn test_maps_new_chunk_when_full() {
        let arena = BumpArena::new(4096, 16 * page_size::get()).unwrap();
        let chunk = arena.chunk_size();
        arena.allocate(chunk).unwrap();
        arena.allocate(8).unwrap();
        assert_eq!(arena.chunk_count(), 2);
        assert_eq!(arena.committed(), 2 * chunk);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let page = page_size::get();
        let arena = BumpArena::new(page, page).unwrap();
        arena.allocate(page).unwrap();
        let err = arena.allocate(8).unwrap_err();
        assert!(matches!(err, VmError::OutOfMemory { requested: 8, available: 0 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_memory_is_writable() {
        let arena = BumpArena::new(4096, 16 * page_size::get()).unwrap();
        let p = arena.allocate(4).unwrap();
        unsafe {
            std::ptr::copy_nonoverlapping(b"abcd".as_ptr(), p.as_ptr(), 4);
            assert_eq!(std::slice::from_raw_parts(p.as_ptr(), 4), b"abcd");
        }
    }
}
