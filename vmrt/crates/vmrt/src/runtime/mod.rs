//! Runtime Module - Registry and Coordination
//!
//! Owns every runtime subsystem:
//! - Interning tables (symbols, strings)
//! - Class dictionary and link resolver
//! - Method handle engine
//! - Safepoint coordination
//! - Code cache and compile lock
//!
//! There is one [`RuntimeRegistry`] per process. It is built once at
//! startup, passed by reference to whatever needs interning or resolution,
//! and torn down when dropped.

pub mod code_cache;
pub mod safepoint;

pub use code_cache::{CodeCache, CodeCacheStats, CompileLock, CompiledMethod, Dependency};
pub use safepoint::{MutatorGuard, SafepointManager, SafepointToken};

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::{Result, VmError};
use crate::intern::{
    IsAliveClosure, SharedSnapshot, StringTable, SymbolTable, TableStatistics, UnlinkStats,
};
use crate::invoke::MethodHandles;
use crate::linkage::{HierarchyLinkResolver, LinkResolver};
use crate::logging::{configure_logger, LogLevel, RuntimeLoggerConfig};
use crate::memory::BumpArena;
use crate::oops::{AccessFlags, Klass, KlassBuilder, SystemDictionary};

/// Outcome of one maintenance safepoint
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub safepoint_id: u64,
    pub symbols: UnlinkStats,
    pub strings: UnlinkStats,
    pub symbols_rehashed: bool,
    pub strings_rehashed: bool,
}

/// RuntimeRegistry builder
///
/// # Examples
///
/// ```rust
/// use vmrt::{RuntimeConfig, RuntimeRegistry};
///
/// fn main() -> vmrt::Result<()> {
///     let runtime = RuntimeRegistry::builder()
///         .config(RuntimeConfig {
///             symbol_table_size: 1009,
///             string_table_size: 1009,
///             ..Default::default()
///         })
///         .build()?;
///
///     let foo = runtime.symbols().lookup_str("foo")?;
///     assert!(foo.ptr_eq(&runtime.symbols().lookup_str("foo")?));
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    config: Option<RuntimeConfig>,
    snapshot: Option<SharedSnapshot>,
    resolver: Option<Arc<dyn LinkResolver>>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Pre-populate the tables with shared entries.
    pub fn snapshot(mut self, snapshot: SharedSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Replace the default hierarchy-walking link resolver.
    pub fn resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> Result<RuntimeRegistry> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| VmError::Configuration(e.to_string()))?;

        if config.verbose {
            configure_logger(RuntimeLoggerConfig {
                level: LogLevel::Debug,
                emit: true,
                ..Default::default()
            });
        }

        let arena = Arc::new(BumpArena::new(config.arena_chunk_size, config.arena_capacity)?);
        let (symbols, strings) = match &self.snapshot {
            Some(snapshot) => (
                SymbolTable::with_snapshot(&config, arena, snapshot)?,
                StringTable::with_snapshot(&config, snapshot)?,
            ),
            None => (SymbolTable::new(&config, arena), StringTable::new(&config)),
        };
        let symbols = Arc::new(symbols);
        let strings = Arc::new(strings);
        let dictionary = Arc::new(SystemDictionary::new());
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(HierarchyLinkResolver::new()));
        let code_cache = Arc::new(CodeCache::new());

        let method_handles = MethodHandles::new(
            &config,
            Arc::clone(&symbols),
            Arc::clone(&strings),
            Arc::clone(&dictionary),
            Arc::clone(&resolver),
            Arc::clone(&code_cache),
        )?;

        let runtime = RuntimeRegistry {
            config,
            symbols,
            strings,
            dictionary,
            resolver,
            code_cache,
            safepoints: SafepointManager::new(),
            method_handles,
        };
        runtime.bootstrap()?;

        log::info!(
            "runtime initialized: {} symbols, {} strings, {} classes",
            runtime.symbols.len(),
            runtime.strings.len(),
            runtime.dictionary.len()
        );
        Ok(runtime)
    }
}

/// RuntimeRegistry - the process-wide runtime instance
pub struct RuntimeRegistry {
    config: RuntimeConfig,
    symbols: Arc<SymbolTable>,
    strings: Arc<StringTable>,
    dictionary: Arc<SystemDictionary>,
    resolver: Arc<dyn LinkResolver>,
    code_cache: Arc<CodeCache>,
    safepoints: SafepointManager,
    method_handles: MethodHandles,
}

impl RuntimeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with `config` and no snapshot
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Define the classes resolution depends on: `java/lang/Object` and
    /// `java/lang/invoke/MethodHandle` with its signature-polymorphic
    /// natives.
    fn bootstrap(&self) -> Result<()> {
        let public = AccessFlags::PUBLIC;
        let object = self.define_class(
            KlassBuilder::class("java/lang/Object")
                .method("<init>", "()V", public)
                .method("getClass", "()Ljava/lang/Class;", public | AccessFlags::FINAL | AccessFlags::NATIVE)
                .method("hashCode", "()I", public | AccessFlags::NATIVE)
                .method("equals", "(Ljava/lang/Object;)Z", public)
                .method("clone", "()Ljava/lang/Object;", AccessFlags::PROTECTED | AccessFlags::NATIVE)
                .method("toString", "()Ljava/lang/String;", public)
                .method("finalize", "()V", AccessFlags::PROTECTED),
        )?;

        let invoker = public | AccessFlags::FINAL | AccessFlags::NATIVE | AccessFlags::VARARGS;
        let linker = AccessFlags::STATIC | AccessFlags::NATIVE | AccessFlags::VARARGS;
        let generic = "([Ljava/lang/Object;)Ljava/lang/Object;";
        self.define_class(
            KlassBuilder::class("java/lang/invoke/MethodHandle")
                .access(public | AccessFlags::ABSTRACT)
                .extends(&object)
                .method("invokeExact", generic, invoker)
                .method("invoke", generic, invoker)
                .method("invokeBasic", generic, AccessFlags::FINAL | AccessFlags::NATIVE | AccessFlags::VARARGS)
                .method("linkToVirtual", generic, linker)
                .method("linkToStatic", generic, linker)
                .method("linkToSpecial", generic, linker)
                .method("linkToInterface", generic, linker),
        )?;
        Ok(())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn strings(&self) -> &Arc<StringTable> {
        &self.strings
    }

    pub fn dictionary(&self) -> &Arc<SystemDictionary> {
        &self.dictionary
    }

    pub fn resolver(&self) -> &Arc<dyn LinkResolver> {
        &self.resolver
    }

    pub fn code_cache(&self) -> &Arc<CodeCache> {
        &self.code_cache
    }

    pub fn safepoints(&self) -> &SafepointManager {
        &self.safepoints
    }

    pub fn method_handles(&self) -> &MethodHandles {
        &self.method_handles
    }

    /// Link and register a class.
    pub fn define_class(&self, builder: KlassBuilder) -> Result<Arc<Klass>> {
        let klass = builder.build(&self.symbols)?;
        self.dictionary.define(klass)
    }

    pub fn find_class(&self, name: &str) -> Option<Arc<Klass>> {
        self.dictionary.find_by_name(&self.symbols, name)
    }

    pub fn object_klass(&self) -> Result<Arc<Klass>> {
        self.dictionary
            .find(&self.method_handles.vm_symbols().java_lang_object)
            .ok_or_else(|| VmError::InternalError("java/lang/Object is not defined".to_string()))
    }

    pub fn method_handle_klass(&self) -> Result<Arc<Klass>> {
        self.dictionary
            .find(&self.method_handles.vm_symbols().java_lang_invoke_method_handle)
            .ok_or_else(|| {
                VmError::InternalError("java/lang/invoke/MethodHandle is not defined".to_string())
            })
    }

    /// Attach the calling thread as a mutator.
    pub fn attach_thread(&self) -> MutatorGuard<'_> {
        self.safepoints.attach()
    }

    /// Run table maintenance at a fresh safepoint: unlink dead symbols,
    /// unlink strings `is_alive` rejects, then rehash skewed tables.
    ///
    /// Blocks until every attached mutator is parked.
    pub fn run_maintenance(&self, is_alive: &(dyn IsAliveClosure + Sync)) -> MaintenanceReport {
        let token = self.safepoints.begin();
        let symbols = self.symbols.unlink(&token);
        let strings = self.strings.parallel_unlink(&token, is_alive, None);
        let symbols_rehashed = self.symbols.rehash_if_needed(&token);
        let strings_rehashed = self.strings.rehash_if_needed(&token);

        MaintenanceReport {
            safepoint_id: token.id(),
            symbols,
            strings,
            symbols_rehashed,
            strings_rehashed,
        }
    }

    /// Statistics of both interning tables
    pub fn table_statistics(&self) -> Vec<TableStatistics> {
        vec![self.symbols.statistics(), self.strings.statistics()]
    }
}
