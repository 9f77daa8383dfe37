//! Method handles and mutable call sites.
//!
//! A call site's target is read lock-free by executing code and replaced
//! only through [`MethodHandles`](super::MethodHandles), which invalidates
//! dependent compiled code under the compile lock before publishing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::epoch::{self, Atomic, Owned};

use super::member_name::MemberName;

static NEXT_CALL_SITE_ID: AtomicU64 = AtomicU64::new(1);

/// MethodHandle - a directly invocable reference to a resolved member
#[derive(Clone)]
pub struct MethodHandle {
    member: Arc<MemberName>,
}

impl MethodHandle {
    pub fn new(member: Arc<MemberName>) -> Self {
        Self { member }
    }

    pub fn member(&self) -> &Arc<MemberName> {
        &self.member
    }

    /// Same underlying member name
    pub fn ptr_eq(&self, other: &MethodHandle) -> bool {
        Arc::ptr_eq(&self.member, &other.member)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodHandle").field(&self.member).finish()
    }
}

/// CallSite - holder of a retargetable method handle
pub struct CallSite {
    id: u64,
    target: Atomic<MethodHandle>,
}

impl CallSite {
    pub fn new(target: MethodHandle) -> Self {
        Self {
            id: NEXT_CALL_SITE_ID.fetch_add(1, Ordering::Relaxed),
            target: Atomic::new(target),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current target
    pub fn target(&self) -> MethodHandle {
        let guard = epoch::pin();
        let current = self.target.load(Ordering::Acquire, &guard);
        // Never null: set at construction and only ever swapped.
        match unsafe { current.as_ref() } {
            Some(handle) => handle.clone(),
            None => unreachable!("call site {} lost its target", self.id),
        }
    }

    /// Replace the target. `ordering` is `Release` for ordinary call sites
    /// and `SeqCst` for volatile ones.
    pub(crate) fn publish(&self, target: MethodHandle, ordering: Ordering) {
        let guard = epoch::pin();
        let old = self.target.swap(Owned::new(target), ordering, &guard);
        if !old.is_null() {
            unsafe { guard.defer_destroy(old) };
        }
    }
}

impl Drop for CallSite {
    fn drop(&mut self) {
        unsafe {
            let guard = epoch::unprotected();
            let current = self.target.load(Ordering::Relaxed, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite").field("id", &self.id).finish()
    }
}
