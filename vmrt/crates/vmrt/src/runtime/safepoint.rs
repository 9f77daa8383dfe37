//! Safepoint Management
//!
//! A safepoint is a point where every attached mutator thread is stopped.
//! Table maintenance (unlink, rehash, root iteration) only runs while a
//! safepoint is held; the [`SafepointToken`] returned by
//! [`SafepointManager::begin`] is the proof of that and is required by every
//! maintenance operation.
//!
//! ## Safepoint States
//!
//! ```text
//! SAFEPOINT_NONE (0) ─────┐
//!     │                   │
//!     ▼                   │
//! SAFEPOINT_REQUESTED (1) │
//!     │                   │
//!     ▼                   │
//! SAFEPOINT_REACHED (2) ──┘ (token dropped)
//! ```
//!
//! ## Thread Pause Mechanism
//!
//! 1. A mutator attaches and holds a [`MutatorGuard`] (a shared lock).
//! 2. The VM thread requests a safepoint and waits for the exclusive lock.
//! 3. Mutators calling [`MutatorGuard::poll`] release their share and block
//!    until the safepoint is over. Detached threads never block it.
//! 4. Dropping the token releases the safepoint and mutators resume.
//!
//! A thread must hold at most one `MutatorGuard`; attaching twice on the
//! same thread deadlocks against a pending safepoint.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::logging::{log_event, RuntimeEvent};

/// Safepoint state constants
pub const SAFEPOINT_NONE: u8 = 0;
pub const SAFEPOINT_REQUESTED: u8 = 1;
pub const SAFEPOINT_REACHED: u8 = 2;

/// SafepointManager - coordination point for stop-the-world maintenance
///
/// # Examples
///
/// ```rust
/// use vmrt::runtime::safepoint::{SafepointManager, SAFEPOINT_NONE, SAFEPOINT_REACHED};
///
/// let safepoints = SafepointManager::new();
/// {
///     let token = safepoints.begin();
///     assert_eq!(safepoints.state(), SAFEPOINT_REACHED);
///     assert_eq!(token.id(), 1);
/// }
/// assert_eq!(safepoints.state(), SAFEPOINT_NONE);
/// ```
pub struct SafepointManager {
    state: AtomicU8,
    lock: RwLock<()>,
    attached: AtomicUsize,
    safepoint_count: AtomicU64,
}

impl SafepointManager {
    /// Create new safepoint manager in NONE state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SAFEPOINT_NONE),
            lock: RwLock::new(()),
            attached: AtomicUsize::new(0),
            safepoint_count: AtomicU64::new(0),
        }
    }

    /// Attach the calling thread as a mutator.
    ///
    /// Blocks while a safepoint is pending or held.
    pub fn attach(&self) -> MutatorGuard<'_> {
        let guard = self.lock.read();
        self.attached.fetch_add(1, Ordering::AcqRel);
        MutatorGuard {
            manager: self,
            guard,
        }
    }

    /// Stop all attached mutators.
    ///
    /// Returns once every attached thread has polled or detached.
    pub fn begin(&self) -> SafepointToken<'_> {
        self.state.store(SAFEPOINT_REQUESTED, Ordering::SeqCst);
        let guard = self.lock.write();
        self.state.store(SAFEPOINT_REACHED, Ordering::SeqCst);

        let id = self.safepoint_count.fetch_add(1, Ordering::AcqRel) + 1;
        log_event(RuntimeEvent::SafepointBegin { id });

        SafepointToken {
            manager: self,
            _guard: guard,
            id,
            started: Instant::now(),
        }
    }

    /// Check if a safepoint is requested or held
    pub fn is_requested(&self) -> bool {
        self.state.load(Ordering::Acquire) != SAFEPOINT_NONE
    }

    /// Check if a safepoint is held
    pub fn is_at_safepoint(&self) -> bool {
        self.state.load(Ordering::Acquire) == SAFEPOINT_REACHED
    }

    /// Get current safepoint state
    pub fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    /// Number of attached mutator threads
    pub fn attached_threads(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    /// Number of safepoints completed or in progress
    pub fn safepoint_count(&self) -> u64 {
        self.safepoint_count.load(Ordering::Acquire)
    }
}

impl Default for SafepointManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutator attachment, RAII
pub struct MutatorGuard<'a> {
    manager: &'a SafepointManager,
    guard: RwLockReadGuard<'a, ()>,
}

impl<'a> MutatorGuard<'a> {
    /// Safepoint poll.
    ///
    /// Blocks for the duration of a pending safepoint, then resumes.
    pub fn poll(&mut self) {
        if self.manager.is_requested() {
            RwLockReadGuard::unlocked_fair(&mut self.guard, || {});
        }
    }
}

impl<'a> Drop for MutatorGuard<'a> {
    fn drop(&mut self) {
        self.manager.attached.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Proof that all mutators are stopped.
///
/// Dropping the token releases the safepoint.
pub struct SafepointToken<'a> {
    manager: &'a SafepointManager,
    _guard: RwLockWriteGuard<'a, ()>,
    id: u64,
    started: Instant,
}

impl<'a> SafepointToken<'a> {
    /// Sequence number of this safepoint, starting at 1
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<'a> Drop for SafepointToken<'a> {
    fn drop(&mut self) {
        self.manager.state.store(SAFEPOINT_NONE, Ordering::SeqCst);
        log_event(RuntimeEvent::SafepointEnd {
            id: self.id,
            duration_us: self.started.elapsed().as_micros() as u64,
        });
    }
}
