//! Atomic Utilities
//!
//! Helper functions for reference-count style atomic counters that have a
//! "dead" value (zero) and a sticky "permanent" value.

use std::sync::atomic::{AtomicU32, Ordering};

/// AtomicUtils - utility for atomic operations
pub struct AtomicUtils;

impl AtomicUtils {
    /// Increment unless the counter is zero.
    ///
    /// A counter at `sticky` is left untouched and counts as success. A counter
    /// reaching `sticky - 1` saturates into `sticky`.
    ///
    /// Returns `false` when the counter was zero: the owner is dead and must
    /// not be revived.
    pub fn try_increment(atomic: &AtomicU32, sticky: u32) -> bool {
        let mut current = atomic.load(Ordering::Relaxed);

        loop {
            if current == 0 {
                return false;
            }
            if current == sticky {
                return true;
            }

            match atomic.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Decrement unless the counter is zero or `sticky`.
    ///
    /// Returns the value after the operation.
    pub fn decrement(atomic: &AtomicU32, sticky: u32) -> u32 {
        let mut current = atomic.load(Ordering::Relaxed);

        loop {
            if current == 0 || current == sticky {
                return current;
            }

            match atomic.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current - 1,
                Err(actual) => current = actual,
            }
        }
    }
}
