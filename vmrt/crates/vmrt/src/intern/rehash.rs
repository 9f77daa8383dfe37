//! Rehashing Controller
//!
//! Shared by the symbol and string tables. A lookup miss reports how many
//! entries it walked in its bucket; once a walk reaches `rehash_count` the
//! table is flagged. The flag is only acted on at a safepoint, where the
//! table is rebuilt under the seeded alternate hash.
//!
//! Rehashing defends against crafted names that collide under the default
//! Java string hash. The switch to the alternate hash is one-way; a later
//! rehash only draws a new seed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use vmrt_util::HashAlgorithm;

use crate::logging::{log_event, RuntimeEvent};

/// RehashController - skew detection and seed policy for one table
#[derive(Debug)]
pub struct RehashController {
    table: &'static str,
    rehash_count: usize,
    fixed_seed: Option<u32>,
    needs_rehash: AtomicBool,
    rehash_total: AtomicU64,
}

impl RehashController {
    pub fn new(table: &'static str, rehash_count: usize, fixed_seed: Option<u32>) -> Self {
        Self {
            table,
            rehash_count,
            fixed_seed,
            needs_rehash: AtomicBool::new(false),
            rehash_total: AtomicU64::new(0),
        }
    }

    /// Record the length of a chain walked by a lookup miss.
    #[inline]
    pub fn record_walk(&self, walked: usize) {
        if walked >= self.rehash_count && !self.needs_rehash.load(Ordering::Relaxed) {
            if !self.needs_rehash.swap(true, Ordering::AcqRel) {
                log_event(RuntimeEvent::SkewDetected {
                    table: self.table.to_string(),
                    chain_length: walked,
                });
            }
        }
    }

    /// Whether a lookup has observed a degenerate bucket since the last rehash
    pub fn needs_rehash(&self) -> bool {
        self.needs_rehash.load(Ordering::Acquire)
    }

    /// Threshold chain length
    pub fn rehash_count(&self) -> usize {
        self.rehash_count
    }

    /// Number of completed rehashes
    pub fn rehash_total(&self) -> u64 {
        self.rehash_total.load(Ordering::Relaxed)
    }

    /// Pick the hash function for the next table generation.
    ///
    /// Always the alternate hash. A configured seed is used as is (zero is
    /// bumped to one); otherwise a fresh non-zero random seed is drawn.
    pub fn next_algorithm(&self) -> HashAlgorithm {
        let seed = match self.fixed_seed {
            Some(seed) => seed.max(1),
            None => loop {
                let seed: u32 = rand::random();
                if seed != 0 {
                    break seed;
                }
            },
        };
        HashAlgorithm::Murmur3 { seed }
    }

    /// Clear the flag after the table has been rebuilt.
    pub fn mark_rehashed(&self) {
        self.needs_rehash.store(false, Ordering::Release);
        self.rehash_total.fetch_add(1, Ordering::Relaxed);
    }
}
