//! Rehash Tests - Hash-Flood Detection and Recovery
//!
//! These tests verify:
//! - Crafted colliding names flag a table for rehashing
//! - The flag is only acted on at a safepoint
//! - Rehashing switches to the seeded alternate hash without changing the
//!   identity of any entry
//!
//! ============================================================================
//! EACH TEST FINDS A SPECIFIC REHASH BUG - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use std::sync::Arc;

use common::{small_config, RuntimeFixture};
use vmrt::oops::JavaString;
use vmrt::RuntimeConfig;
use vmrt_util::hash::{colliding_java_strings, java_hash_bytes};
use vmrt_util::HashAlgorithm;

const SEED: u32 = 0x5eed;

fn flood_config() -> RuntimeConfig {
    RuntimeConfig {
        rehash_count: 16,
        hash_seed: Some(SEED),
        ..small_config()
    }
}

/// Colliding symbols trigger a rehash that preserves identity
///
/// **Bug this finds:** Entries lost or duplicated while relinking, payloads
/// reallocated instead of moved
/// **Invariant verified:** Every handle taken before the rehash is still the
/// canonical symbol after it
#[test]
fn test_symbol_flood_triggers_rehash() {
    let fixture = RuntimeFixture::with_config(flood_config());
    let symbols = fixture.runtime.symbols();
    let names = colliding_java_strings(5);
    let first_hash = java_hash_bytes(&names[0]);
    assert!(names.iter().all(|n| java_hash_bytes(n) == first_hash));

    let held: Vec<_> = names.iter().map(|n| symbols.lookup(n).unwrap()).collect();
    assert!(symbols.needs_rehash(), "32 colliding names must flag the table");
    assert_eq!(symbols.algorithm(), HashAlgorithm::JavaDefault);
    let skewed = symbols.statistics().max_chain;
    assert!(skewed >= names.len());

    let report = fixture
        .runtime
        .run_maintenance(&|_: &JavaString| true);
    assert!(report.symbols_rehashed);
    assert!(!report.strings_rehashed);
    assert!(!symbols.needs_rehash());
    assert_eq!(symbols.algorithm(), HashAlgorithm::Murmur3 { seed: SEED });

    for (name, handle) in names.iter().zip(&held) {
        let again = symbols.lookup(name).unwrap();
        assert!(again.ptr_eq(handle), "rehash changed the identity of a symbol");
    }
    let stats = symbols.statistics();
    assert!(stats.max_chain < skewed);
    assert!(stats.alternate_hash);
    assert_eq!(stats.seed, Some(SEED));
    assert_eq!(stats.rehashes, 1);
    symbols.verify().unwrap();
}

/// Colliding strings flag and rebuild the string table independently
///
/// **Bug this finds:** One table's skew rehashing the other
#[test]
fn test_string_flood_triggers_rehash() {
    let fixture = RuntimeFixture::with_config(flood_config());
    let strings = fixture.runtime.strings();
    let held: Vec<_> = colliding_java_strings(5)
        .iter()
        .map(|n| strings.intern_utf8(n).unwrap())
        .collect();
    assert!(strings.needs_rehash());
    assert!(!fixture.runtime.symbols().needs_rehash());

    let report = fixture.runtime.run_maintenance(&|_: &JavaString| true);
    assert!(report.strings_rehashed);
    assert!(!report.symbols_rehashed);
    assert!(strings.algorithm().is_alternate());

    for s in &held {
        let again = strings.intern_utf16(s.as_utf16()).unwrap();
        assert!(Arc::ptr_eq(&again, s));
    }
    assert_eq!(strings.len(), held.len());
    assert_eq!(strings.verify().unwrap(), held.len());
}

/// Ordinary names never flag a table
///
/// **Bug this finds:** Skew detection counting total walks instead of one chain
#[test]
fn test_no_rehash_without_skew() {
    let fixture = RuntimeFixture::with_config(flood_config());
    let symbols = fixture.runtime.symbols();
    for i in 0..200 {
        drop(symbols.lookup_str(&format!("pkg/Class{}", i)).unwrap());
    }
    assert!(!symbols.needs_rehash());

    let report = fixture.runtime.run_maintenance(&|_: &JavaString| true);
    assert!(!report.symbols_rehashed);
    assert_eq!(report.symbols.removed, 200);
    assert_eq!(symbols.algorithm(), HashAlgorithm::JavaDefault);
}

/// Rehashing while dead entries are still linked keeps them unreachable
///
/// **Bug this finds:** Rehash relinking dead symbols where lookups revive them
#[test]
fn test_rehash_after_unlink_drops_dead() {
    let fixture = RuntimeFixture::with_config(flood_config());
    let symbols = fixture.runtime.symbols();
    let names = colliding_java_strings(5);
    let mut held: Vec<_> = names.iter().map(|n| symbols.lookup(n).unwrap()).collect();
    let released = held.split_off(16);
    drop(released);
    assert_eq!(symbols.dead_count(), 16);

    let report = fixture.runtime.run_maintenance(&|_: &JavaString| true);
    assert_eq!(report.symbols.removed, 16);
    assert!(report.symbols_rehashed);
    assert_eq!(symbols.dead_count(), 0);

    for name in &names[16..] {
        let (found, _) = symbols.lookup_only(name);
        assert!(found.is_none());
    }
    for (name, handle) in names.iter().zip(&held) {
        assert!(symbols.lookup(name).unwrap().ptr_eq(handle));
    }
}
