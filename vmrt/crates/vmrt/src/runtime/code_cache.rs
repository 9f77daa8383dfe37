//! Code Cache - compiled code and its dependencies
//!
//! Compiled methods record the assumptions they were compiled under. When
//! a call site is retargeted, every compiled method that assumed the old
//! target is made not entrant and dropped from the cache. Installation and
//! invalidation both run under the [`CompileLock`], so a method can never be
//! installed against a target that was replaced while it was compiling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::invoke::{CallSite, MethodHandle};
use crate::logging::{log_event, RuntimeEvent};
use crate::oops::Method;

/// CompileLock - serializes code installation with dependency invalidation
#[derive(Default)]
pub struct CompileLock {
    lock: Mutex<()>,
}

/// Proof that the compile lock is held
pub struct CompileLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl CompileLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> CompileLockGuard<'_> {
        CompileLockGuard {
            _guard: self.lock.lock(),
        }
    }
}

/// An assumption compiled code depends on
#[derive(Debug, Clone)]
pub enum Dependency {
    /// The call site still has this target
    CallSiteTarget {
        call_site: Arc<CallSite>,
        target: MethodHandle,
    },
}

impl Dependency {
    pub fn call_site_target(call_site: &Arc<CallSite>) -> Self {
        Dependency::CallSiteTarget {
            call_site: Arc::clone(call_site),
            target: call_site.target(),
        }
    }

    /// Still true right now
    pub fn is_valid(&self) -> bool {
        match self {
            Dependency::CallSiteTarget { call_site, target } => call_site.target().ptr_eq(target),
        }
    }

    /// Broken by giving `call_site` the target `new_target`
    fn is_invalidated_by(&self, site: &CallSite, new_target: &MethodHandle) -> bool {
        match self {
            Dependency::CallSiteTarget { call_site, target } => {
                call_site.id() == site.id() && !target.ptr_eq(new_target)
            },
        }
    }
}

/// CompiledMethod - installed code for a method
#[derive(Debug)]
pub struct CompiledMethod {
    id: u64,
    method: Arc<Method>,
    dependencies: Vec<Dependency>,
    entrant: AtomicBool,
}

impl CompiledMethod {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// False once deoptimized
    pub fn is_entrant(&self) -> bool {
        self.entrant.load(Ordering::Acquire)
    }

    fn make_not_entrant(&self) -> bool {
        self.entrant.swap(false, Ordering::AcqRel)
    }
}

/// Code cache statistics
#[derive(Debug, Clone, Default)]
pub struct CodeCacheStats {
    pub total_installs: u64,
    pub refused_installs: u64,
    pub total_deoptimizations: u64,
    pub active_methods: usize,
}

/// CodeCache - installed compiled methods
pub struct CodeCache {
    compile_lock: CompileLock,
    methods: RwLock<Vec<Arc<CompiledMethod>>>,
    next_id: AtomicU64,
    total_installs: AtomicU64,
    refused_installs: AtomicU64,
    total_deoptimizations: AtomicU64,
}

impl CodeCache {
    pub fn new() -> Self {
        Self {
            compile_lock: CompileLock::new(),
            methods: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            total_installs: AtomicU64::new(0),
            refused_installs: AtomicU64::new(0),
            total_deoptimizations: AtomicU64::new(0),
        }
    }

    pub fn compile_lock(&self) -> &CompileLock {
        &self.compile_lock
    }

    /// Install compiled code for `method`.
    ///
    /// Returns `None` if any dependency was already broken; the compiler
    /// must recompile against the current state.
    pub fn install(
        &self,
        method: Arc<Method>,
        dependencies: Vec<Dependency>,
    ) -> Option<Arc<CompiledMethod>> {
        let _lock = self.compile_lock.lock();

        if dependencies.iter().any(|d| !d.is_valid()) {
            self.refused_installs.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "refusing to install {}: stale dependencies",
                method.external_name()
            );
            return None;
        }

        let compiled = Arc::new(CompiledMethod {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            dependencies,
            entrant: AtomicBool::new(true),
        });
        self.methods.write().push(Arc::clone(&compiled));
        self.total_installs.fetch_add(1, Ordering::Relaxed);
        Some(compiled)
    }

    /// Deoptimize every method that assumed another target for `call_site`.
    ///
    /// Returns the number of methods invalidated.
    pub fn flush_dependents_on(
        &self,
        _lock: &CompileLockGuard<'_>,
        call_site: &CallSite,
        new_target: &MethodHandle,
    ) -> usize {
        let mut flushed = Vec::new();
        self.methods.write().retain(|compiled| {
            let broken = compiled
                .dependencies
                .iter()
                .any(|d| d.is_invalidated_by(call_site, new_target));
            if broken {
                flushed.push(Arc::clone(compiled));
            }
            !broken
        });

        for compiled in &flushed {
            if compiled.make_not_entrant() {
                self.total_deoptimizations.fetch_add(1, Ordering::Relaxed);
                log_event(RuntimeEvent::Deoptimized {
                    compiled_method: compiled.id,
                    reason: format!("call site {} retargeted", call_site.id()),
                });
            }
        }
        flushed.len()
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }

    pub fn stats(&self) -> CodeCacheStats {
        CodeCacheStats {
            total_installs: self.total_installs.load(Ordering::Relaxed),
            refused_installs: self.refused_installs.load(Ordering::Relaxed),
            total_deoptimizations: self.total_deoptimizations.load(Ordering::Relaxed),
            active_methods: self.len(),
        }
    }
}

impl Default for CodeCache {
    fn default() -> Self {
        Self::new()
    }
}
