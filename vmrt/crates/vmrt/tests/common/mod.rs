//! Test Utilities for the vmrt Test Suite
//!
//! Shared fixtures for the integration tests: a runtime with small tables,
//! a small class hierarchy to resolve against, and assertions that compare
//! by identity rather than by content.
//!
//! ============================================================================
//! Interning is about identity. Assertions here use pointer equality; two
//! equal-looking symbols that are not the same object are a bug.
//! ============================================================================

#![allow(dead_code)]

use std::sync::Arc;

use vmrt::invoke::{MemberName, RefKind, Target};
use vmrt::oops::{AccessFlags, Klass, KlassBuilder};
use vmrt::{RuntimeConfig, RuntimeRegistry, Symbol};

/// Bucket count used by most tests; small enough to force chaining
pub const SMALL_TABLE_SIZE: usize = 257;

/// Threads used by concurrency tests
pub const THREAD_COUNT: usize = 8;

/// Configuration with small tables and quiet logging
pub fn small_config() -> RuntimeConfig {
    RuntimeConfig {
        symbol_table_size: SMALL_TABLE_SIZE,
        string_table_size: SMALL_TABLE_SIZE,
        verbose: false,
        ..Default::default()
    }
}

/// ============================================================================
/// RUNTIME FIXTURE
/// ============================================================================

/// A bootstrapped runtime
pub struct RuntimeFixture {
    pub runtime: RuntimeRegistry,
}

impl RuntimeFixture {
    /// Runtime with small tables
    ///
    /// **Bug this finds:** Bootstrap failures, configuration validation bugs
    pub fn new() -> Self {
        Self::with_config(small_config())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let runtime =
            RuntimeRegistry::new(config).expect("runtime should build from a valid config");
        Self { runtime }
    }

    pub fn symbol(&self, s: &str) -> Symbol {
        self.runtime
            .symbols()
            .lookup_str(s)
            .expect("symbol should intern")
    }

    pub fn object(&self) -> Arc<Klass> {
        self.runtime.object_klass().expect("Object is bootstrapped")
    }

    pub fn define(&self, builder: KlassBuilder) -> Arc<Klass> {
        let name = builder.name().to_string();
        self.runtime
            .define_class(builder)
            .unwrap_or_else(|e| panic!("defining {} failed: {}", name, e))
    }

    /// Define the geometry hierarchy:
    ///
    /// ```text
    /// Object
    ///  ├── geo/Circle implements geo/Shape      (concrete)
    ///  └── geo/Partial implements geo/Shape     (abstract, miranda `area`)
    /// ```
    ///
    /// **Bug this finds:** Vtable and miranda layout bugs surfacing as wrong
    /// dispatch indices
    pub fn geometry(&self) -> Geometry {
        let object = self.object();
        let shape = self.define(
            KlassBuilder::interface("geo/Shape")
                .extends(&object)
                .method("area", "()D", AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
                .method(
                    "label",
                    "()Ljava/lang/String;",
                    AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
                ),
        );
        let circle = self.define(
            KlassBuilder::class("geo/Circle")
                .access(AccessFlags::PUBLIC)
                .extends(&object)
                .implements(&shape)
                .method("<init>", "()V", AccessFlags::PUBLIC)
                .method("<init>", "(D)V", AccessFlags::PUBLIC)
                .method("<clinit>", "()V", AccessFlags::STATIC)
                .method("area", "()D", AccessFlags::PUBLIC)
                .method("label", "()Ljava/lang/String;", AccessFlags::PUBLIC)
                .method("radius", "()D", AccessFlags::PRIVATE)
                .method("unit", "()Lgeo/Circle;", AccessFlags::PUBLIC | AccessFlags::STATIC)
                .method("scale", "(D)V", AccessFlags::PUBLIC | AccessFlags::FINAL)
                .field("r", "D", AccessFlags::PRIVATE)
                .field("name", "Ljava/lang/String;", AccessFlags::PUBLIC)
                .field(
                    "COUNT",
                    "I",
                    AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
                ),
        );
        let partial = self.define(
            KlassBuilder::class("geo/Partial")
                .access(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
                .extends(&object)
                .implements(&shape)
                .method("label", "()Ljava/lang/String;", AccessFlags::PUBLIC),
        );
        Geometry {
            object,
            shape,
            circle,
            partial,
        }
    }
}

impl Default for RuntimeFixture {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Geometry {
    pub object: Arc<Klass>,
    pub shape: Arc<Klass>,
    pub circle: Arc<Klass>,
    pub partial: Arc<Klass>,
}

/// ============================================================================
/// ASSERTIONS
/// ============================================================================

/// Assert two symbols are the same interned object
///
/// **Bug this finds:** Duplicate entries created by racing inserts
pub fn assert_same_symbol(a: &Symbol, b: &Symbol) {
    assert!(
        a.ptr_eq(b),
        "expected one canonical symbol for {:?}, found two objects",
        a.as_str()
    );
}

/// Assert every symbol in `symbols` is the same object
pub fn assert_all_same(symbols: &[Symbol]) {
    if let Some((first, rest)) = symbols.split_first() {
        for other in rest {
            assert_same_symbol(first, other);
        }
    }
}

/// Resolved method target of `mname`
///
/// **Bug this finds:** Resolution reporting success without publishing a target
pub fn resolved_method(mname: &MemberName) -> Arc<vmrt::oops::Method> {
    match mname.target() {
        Target::Method(method) => method,
        other => panic!("expected a method target, found {:?}", other),
    }
}

/// Symbolic method reference against `klass`
pub fn method_ref(klass: &Arc<Klass>, name: &str, sig: &str, kind: RefKind) -> MemberName {
    MemberName::method(klass, name, sig, kind)
}
