//! Symbol Table Tests - Identity, Reference Counts and Reclamation
//!
//! These tests verify:
//! - One canonical symbol per content, under concurrent lookup
//! - Reference counts follow handle lifetimes exactly
//! - Dead symbols are reclaimed at a safepoint and never revived
//! - Shared (snapshot) symbols are permanent
//!
//! ============================================================================
//! EACH TEST FINDS A SPECIFIC INTERNING BUG - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{assert_all_same, assert_same_symbol, small_config, RuntimeFixture, THREAD_COUNT};
use vmrt::{RuntimeRegistry, SharedSnapshot, VmError};

/// ============================================================================
/// LIFECYCLE
/// ============================================================================

/// Intern "foo" twice, release both handles, reclaim, intern again
///
/// **Bug this finds:** Refcount leaks, entries surviving unlink while
/// referenced, dead bodies handed back out after reclamation
/// **Invariant verified:** A symbol's count equals its live handles; a
/// reclaimed symbol is replaced by a fresh one with count 1
#[test]
fn test_foo_lifecycle() {
    let fixture = RuntimeFixture::new();
    let symbols = fixture.runtime.symbols();
    let safepoints = fixture.runtime.safepoints();

    let first = symbols.lookup_str("foo").unwrap();
    let second = symbols.lookup_str("foo").unwrap();
    assert_same_symbol(&first, &second);
    assert_eq!(first.refcount(), 2);

    drop(second);
    assert_eq!(first.refcount(), 1);
    let stats = symbols.unlink(&safepoints.begin());
    assert_eq!(stats.removed, 0, "a referenced symbol must survive unlink");
    assert!(symbols.probe("foo").unwrap().ptr_eq(&first));

    let old_identity = first.identity_hash();
    drop(first);
    let stats = symbols.unlink(&safepoints.begin());
    assert_eq!(stats.removed, 1);
    assert!(symbols.probe("foo").is_none());

    let fresh = symbols.lookup_str("foo").unwrap();
    assert_eq!(fresh.refcount(), 1);
    assert_ne!(fresh.identity_hash(), old_identity);
}

/// Probing never changes reference counts
///
/// **Bug this finds:** lookup_only taking a reference it never releases
#[test]
fn test_probe_is_count_neutral() {
    let fixture = RuntimeFixture::new();
    let symbols = fixture.runtime.symbols();

    let held = symbols.lookup_str("probe/Me").unwrap();
    for _ in 0..10 {
        let (found, _) = symbols.lookup_only(b"probe/Me");
        assert!(found.unwrap().ptr_eq(&held));
    }
    assert_eq!(held.refcount(), 1);

    let (missing, hash) = symbols.lookup_only(b"probe/Missing");
    assert!(missing.is_none());
    assert_eq!(hash, symbols.hash_of(b"probe/Missing"));
}

/// A symbol whose count reached zero is not revived by a racing lookup
///
/// **Bug this finds:** Lookups resurrecting a body that unlink is about to free
#[test]
fn test_dead_entry_not_revived_before_unlink() {
    let fixture = RuntimeFixture::new();
    let symbols = fixture.runtime.symbols();
    let before = symbols.len();

    drop(symbols.lookup_str("short/Lived").unwrap());
    let replacement = symbols.lookup_str("short/Lived").unwrap();
    assert_eq!(replacement.refcount(), 1);
    assert_eq!(symbols.len(), before + 2, "dead entry stays linked until unlink");
    assert_eq!(symbols.dead_count(), 1);

    symbols.unlink(&fixture.runtime.safepoints().begin());
    assert_eq!(symbols.len(), before + 1);
    assert!(symbols.probe("short/Lived").unwrap().ptr_eq(&replacement));
}

/// Over-long content is a fatal, classified error
///
/// **Bug this finds:** Length checks that truncate instead of failing
#[test]
fn test_symbol_too_long() {
    let fixture = RuntimeFixture::new();
    let content = vec![b'x'; u16::MAX as usize + 1];
    let err = fixture.runtime.symbols().lookup(&content).unwrap_err();
    assert!(matches!(err, VmError::SymbolTooLong { .. }));
    assert!(err.is_fatal());
}

/// ============================================================================
/// CONCURRENCY
/// ============================================================================

/// Many threads interning the same names get the same objects
///
/// **Bug this finds:** Insert races creating duplicate entries
/// **Invariant verified:** Exactly one entry per content, counts add up
#[test]
fn test_concurrent_lookup_is_canonical() {
    let runtime = Arc::new(RuntimeRegistry::new(small_config()).unwrap());
    let names: Vec<String> = (0..64).map(|i| format!("race/Name{}", i)).collect();
    let names = Arc::new(names);
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let before = runtime.symbols().len();

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            let names = Arc::clone(&names);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                names
                    .iter()
                    .map(|n| runtime.symbols().lookup_str(n).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<_>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(runtime.symbols().len(), before + names.len());
    for i in 0..names.len() {
        let column: Vec<_> = results.iter().map(|r| r[i].clone()).collect();
        assert_all_same(&column);
        // one handle per thread plus the clones in `column`
        assert_eq!(column[0].refcount() as usize, 2 * THREAD_COUNT);
    }
    assert_eq!(runtime.symbols().verify().unwrap(), before + names.len());
}

/// Lookups proceed on mutator threads while maintenance waits for them
///
/// **Bug this finds:** Unlink running while mutators still hold the read path
#[test]
fn test_maintenance_waits_for_mutators() {
    let runtime = Arc::new(RuntimeRegistry::new(small_config()).unwrap());
    let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));

    let workers: Vec<_> = (0..THREAD_COUNT)
        .map(|t| {
            let runtime = Arc::clone(&runtime);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut mutator = runtime.attach_thread();
                barrier.wait();
                for i in 0..200 {
                    let name = format!("churn/T{}N{}", t, i % 10);
                    drop(runtime.symbols().lookup_str(&name).unwrap());
                    mutator.poll();
                }
            })
        })
        .collect();

    barrier.wait();
    let report = runtime.run_maintenance(&|_: &vmrt::oops::JavaString| true);
    for worker in workers {
        worker.join().unwrap();
    }
    let last = runtime.run_maintenance(&|_: &vmrt::oops::JavaString| true);

    assert!(last.safepoint_id > report.safepoint_id);
    assert_eq!(runtime.symbols().dead_count(), 0);
    assert!(runtime.symbols().probe("churn/T0N0").is_none());
}

/// ============================================================================
/// SHARED SNAPSHOT
/// ============================================================================

/// Snapshot symbols resolve to the shared entries and are never reclaimed
///
/// **Bug this finds:** Shared entries duplicated into the dynamic table or
/// unlinked with it
#[test]
fn test_snapshot_symbols_are_permanent() {
    let snapshot = SharedSnapshot::new().with_symbols(["shared/Alpha", "shared/Beta"]);
    let runtime = RuntimeRegistry::builder()
        .config(small_config())
        .snapshot(snapshot)
        .build()
        .unwrap();
    let symbols = runtime.symbols();
    assert_eq!(symbols.shared_len(), 2);

    let alpha = symbols.lookup_str("shared/Alpha").unwrap();
    assert!(alpha.is_permanent());
    drop(alpha);

    runtime.run_maintenance(&|_: &vmrt::oops::JavaString| true);
    let again = symbols.lookup_str("shared/Alpha").unwrap();
    assert!(again.is_permanent());
    assert_eq!(symbols.shared_len(), 2);
}

/// A snapshot saved to disk loads back into an equivalent runtime
///
/// **Bug this finds:** Serialization dropping sections or entries
#[test]
fn test_snapshot_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.json");
    SharedSnapshot::new()
        .with_symbols(["disk/Symbol"])
        .with_strings(["disk string"])
        .save(&path)
        .unwrap();

    let runtime = RuntimeRegistry::builder()
        .config(small_config())
        .snapshot(SharedSnapshot::load(&path).unwrap())
        .build()
        .unwrap();
    assert!(runtime.symbols().probe("disk/Symbol").unwrap().is_permanent());
    assert_eq!(runtime.strings().shared_len(), 1);
    assert!(runtime.strings().probe("disk string").is_some());
}

/// Substrings and batches share entries with ordinary lookups
///
/// **Bug this finds:** Batch insertion bypassing the canonical entry
#[test]
fn test_substring_and_batch_share_entries() {
    let fixture = RuntimeFixture::new();
    let symbols = fixture.runtime.symbols();

    let full = symbols.lookup_str("java/util/List").unwrap();
    let package = symbols.lookup_substring(&full, 0, 9).unwrap();
    assert_same_symbol(&package, &symbols.lookup_str("java/util").unwrap());

    let batch = symbols
        .lookup_many(&["java/util", "java/util/List", "fresh/One"])
        .unwrap();
    assert_same_symbol(&batch[0], &package);
    assert_same_symbol(&batch[1], &full);
    assert_same_symbol(&batch[2], &symbols.probe("fresh/One").unwrap());
}
