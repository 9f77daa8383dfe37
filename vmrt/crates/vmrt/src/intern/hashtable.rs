//! Concurrent Chained Hashtable
//!
//! The storage engine behind the symbol and string tables.
//!
//! - Readers never lock. Bucket heads and `next` links are epoch-protected
//!   atomic pointers; an entry stays readable until every guard pinned while
//!   it was linked has been released.
//! - Writers serialize on one insert lock and re-probe under it, so two
//!   racing inserts of the same key agree on a single winner. The key is
//!   hashed before the lock is taken; the lock covers the re-probe and the
//!   link only.
//! - Removal, replacement and rehash require a [`SafepointToken`]. Removed
//!   entries are handed to the epoch collector, never freed in place.
//!
//! Each bucket array carries the hash function it was built with. A reader
//! loads the array once and hashes with that function, so a probe always
//! sees a consistent (function, buckets) pair.
//!
//! Shared entries from a snapshot are appended at chain tails when the table
//! is built. New entries are pushed at the head, so until the first rehash a
//! chain's shared entries form its tail.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use vmrt_util::HashAlgorithm;

use super::rehash::RehashController;
use super::stats::{TableStatistics, UnlinkStats};
use crate::error::{Result, VmError};
use crate::runtime::safepoint::SafepointToken;

/// Payload stored in a table entry
pub(crate) trait TablePayload: Send + Sync + 'static {
    /// Borrowed lookup key
    type Key: ?Sized;

    fn hash_key(algorithm: &HashAlgorithm, key: &Self::Key) -> u32;

    fn hash_payload(&self, algorithm: &HashAlgorithm) -> u32;

    fn matches(&self, key: &Self::Key) -> bool;

    /// Whether the payload may be freed when the table itself is dropped.
    fn reclaimable_at_teardown(&self) -> bool {
        true
    }
}

/// Hash of a key together with the function that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyHash {
    pub value: u32,
    pub algorithm: HashAlgorithm,
}

pub(crate) struct Entry<P> {
    hash: AtomicU32,
    shared: bool,
    payload: P,
    next: Atomic<Entry<P>>,
}

impl<P> Entry<P> {
    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }
}

struct Buckets<P> {
    algorithm: HashAlgorithm,
    slots: Box<[Atomic<Entry<P>>]>,
}

impl<P> Buckets<P> {
    fn new(size: usize, algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            slots: (0..size).map(|_| Atomic::null()).collect(),
        }
    }

    #[inline]
    fn index(&self, hash: u32) -> usize {
        hash as usize % self.slots.len()
    }

    #[inline]
    fn slot(&self, hash: u32) -> &Atomic<Entry<P>> {
        &self.slots[self.index(hash)]
    }
}

/// What a maintenance visitor wants done with an entry
pub(crate) enum EntryAction<P> {
    Keep,
    Remove,
    Replace(P),
}

/// How a maintenance pass treats shared entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SharedPolicy {
    /// Stop walking a chain at its first shared entry
    StopAtFirst,
    /// Step over shared entries
    Skip,
    /// Offer shared entries to the visitor; removal and replacement are ignored
    Visit,
}

/// Proof of holding the insert lock
pub(crate) struct InsertLock<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

pub(crate) struct ConcurrentHashtable<P: TablePayload> {
    name: &'static str,
    buckets: Atomic<Buckets<P>>,
    insert_lock: Mutex<()>,
    entries: AtomicUsize,
    shared_entries: AtomicUsize,
    rehash: RehashController,
}

impl<P: TablePayload> ConcurrentHashtable<P> {
    pub fn new(name: &'static str, size: usize, rehash: RehashController) -> Self {
        Self {
            name,
            buckets: Atomic::new(Buckets::new(size.max(1), HashAlgorithm::JavaDefault)),
            insert_lock: Mutex::new(()),
            entries: AtomicUsize::new(0),
            shared_entries: AtomicUsize::new(0),
            rehash,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn shared_len(&self) -> usize {
        self.shared_entries.load(Ordering::Relaxed)
    }

    pub fn rehash_controller(&self) -> &RehashController {
        &self.rehash
    }

    #[inline]
    fn buckets<'g>(&self, guard: &'g Guard) -> &'g Buckets<P> {
        // The bucket array is never null and is only retired through the
        // epoch collector.
        unsafe { self.buckets.load(Ordering::Acquire, guard).deref() }
    }

    /// Hash function of the current generation
    pub fn algorithm(&self) -> HashAlgorithm {
        let guard = epoch::pin();
        self.buckets(&guard).algorithm
    }

    /// Hash `key` with the current generation's function.
    pub fn hash_of(&self, key: &P::Key) -> u32 {
        let guard = epoch::pin();
        self.key_hash(key, &guard).value
    }

    pub fn key_hash(&self, key: &P::Key, guard: &Guard) -> KeyHash {
        let algorithm = self.buckets(guard).algorithm;
        KeyHash {
            value: P::hash_key(&algorithm, key),
            algorithm,
        }
    }

    fn find_in_chain<'g, F>(
        slot: &'g Atomic<Entry<P>>,
        hash: u32,
        key: &P::Key,
        guard: &'g Guard,
        accept: &mut F,
    ) -> (Option<&'g P>, usize)
    where
        F: FnMut(&P) -> bool,
    {
        let mut walked = 0;
        let mut current = slot.load(Ordering::Acquire, guard);
        while let Some(entry) = unsafe { current.as_ref() } {
            walked += 1;
            if entry.hash() == hash && entry.payload.matches(key) && accept(&entry.payload) {
                return (Some(&entry.payload), walked);
            }
            current = entry.next.load(Ordering::Acquire, guard);
        }
        (None, walked)
    }

    /// Lock-free probe.
    ///
    /// `accept` is offered every matching entry in chain order and decides
    /// whether it counts as a hit. A miss whose walk reaches the rehash
    /// threshold flags the table. The returned hash can be handed to
    /// [`insert`](Self::insert) after a miss.
    pub fn lookup<'g, F>(&self, key: &P::Key, guard: &'g Guard, mut accept: F) -> (Option<&'g P>, KeyHash)
    where
        F: FnMut(&P) -> bool,
    {
        let buckets = self.buckets(guard);
        let hash = P::hash_key(&buckets.algorithm, key);
        let (found, walked) = Self::find_in_chain(buckets.slot(hash), hash, key, guard, &mut accept);
        if found.is_none() {
            self.rehash.record_walk(walked);
        }
        let key_hash = KeyHash {
            value: hash,
            algorithm: buckets.algorithm,
        };
        (found, key_hash)
    }

    pub fn lock_for_insert(&self) -> InsertLock<'_> {
        InsertLock(self.insert_lock.lock())
    }

    /// Publish a payload built by `make` unless an accepted entry for `key`
    /// already exists.
    ///
    /// `hash` is reused when the bucket array still uses the function it
    /// was computed with. `make` only runs once the re-probe has missed.
    /// Returns the canonical payload and whether a new entry was linked.
    pub fn try_insert_with_locked<'g, F, M, E>(
        &self,
        _lock: &InsertLock<'_>,
        key: &P::Key,
        hash: KeyHash,
        make: M,
        guard: &'g Guard,
        mut accept: F,
    ) -> std::result::Result<(&'g P, bool), E>
    where
        F: FnMut(&P) -> bool,
        M: FnOnce() -> std::result::Result<P, E>,
    {
        let buckets = self.buckets(guard);
        let hash = if hash.algorithm == buckets.algorithm {
            hash.value
        } else {
            // rehashed since the caller probed
            P::hash_key(&buckets.algorithm, key)
        };
        let slot = buckets.slot(hash);
        if let (Some(winner), _) = Self::find_in_chain(slot, hash, key, guard, &mut accept) {
            return Ok((winner, false));
        }

        let payload = make()?;
        let head = slot.load(Ordering::Acquire, guard);
        let linked = Owned::new(Entry {
            hash: AtomicU32::new(hash),
            shared: false,
            payload,
            next: Atomic::from(head),
        })
        .into_shared(guard);
        slot.store(linked, Ordering::Release);
        self.entries.fetch_add(1, Ordering::Relaxed);

        Ok((unsafe { &linked.deref().payload }, true))
    }

    /// Publish `candidate` unless an accepted entry for `key` already exists.
    /// A losing candidate is dropped.
    pub fn insert_locked<'g, F>(
        &self,
        lock: &InsertLock<'_>,
        key: &P::Key,
        hash: KeyHash,
        candidate: P,
        guard: &'g Guard,
        accept: F,
    ) -> (&'g P, bool)
    where
        F: FnMut(&P) -> bool,
    {
        let make = || Ok::<P, Infallible>(candidate);
        let inserted = self.try_insert_with_locked(lock, key, hash, make, guard, accept);
        match inserted {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    pub fn insert<'g, F>(
        &self,
        key: &P::Key,
        hash: KeyHash,
        candidate: P,
        guard: &'g Guard,
        accept: F,
    ) -> (&'g P, bool)
    where
        F: FnMut(&P) -> bool,
    {
        let lock = self.lock_for_insert();
        self.insert_locked(&lock, key, hash, candidate, guard, accept)
    }

    /// Append a shared entry at the tail of its chain.
    ///
    /// Only used while the table is being built, before it is published.
    pub fn append_shared(&self, payload: P) {
        let _lock = self.insert_lock.lock();
        let guard = epoch::pin();
        let buckets = self.buckets(&guard);
        let hash = payload.hash_payload(&buckets.algorithm);

        let mut tail = buckets.slot(hash);
        loop {
            let current = tail.load(Ordering::Acquire, &guard);
            match unsafe { current.as_ref() } {
                Some(entry) => tail = &entry.next,
                None => break,
            }
        }
        tail.store(
            Owned::new(Entry {
                hash: AtomicU32::new(hash),
                shared: true,
                payload,
                next: Atomic::null(),
            }),
            Ordering::Release,
        );
        self.entries.fetch_add(1, Ordering::Relaxed);
        self.shared_entries.fetch_add(1, Ordering::Relaxed);
    }

    fn process_bucket<'g, F>(
        slot: &'g Atomic<Entry<P>>,
        policy: SharedPolicy,
        visit: &mut F,
        guard: &'g Guard,
    ) -> UnlinkStats
    where
        F: FnMut(&P) -> EntryAction<P>,
    {
        let mut stats = UnlinkStats::default();
        let mut prev: &'g Atomic<Entry<P>> = slot;
        let mut current = prev.load(Ordering::Acquire, guard);

        while let Some(entry) = unsafe { current.as_ref() } {
            let next = entry.next.load(Ordering::Acquire, guard);

            if entry.shared {
                match policy {
                    SharedPolicy::StopAtFirst => break,
                    SharedPolicy::Skip => {
                        prev = &entry.next;
                        current = next;
                        continue;
                    },
                    SharedPolicy::Visit => {},
                }
            }

            stats.visited += 1;
            match visit(&entry.payload) {
                EntryAction::Remove if !entry.shared => {
                    prev.store(next, Ordering::Release);
                    unsafe { guard.defer_destroy(current) };
                    stats.removed += 1;
                },
                EntryAction::Replace(payload) if !entry.shared => {
                    let replacement = Owned::new(Entry {
                        hash: AtomicU32::new(entry.hash()),
                        shared: false,
                        payload,
                        next: Atomic::from(next),
                    })
                    .into_shared(guard);
                    prev.store(replacement, Ordering::Release);
                    unsafe { guard.defer_destroy(current) };
                    prev = unsafe { &replacement.deref().next };
                    stats.replaced += 1;
                },
                _ => {
                    prev = &entry.next;
                },
            }
            current = next;
        }

        stats
    }

    /// Visit entries at a safepoint and apply the visitor's decisions.
    pub fn process<F>(&self, _token: &SafepointToken<'_>, policy: SharedPolicy, mut visit: F) -> UnlinkStats
    where
        F: FnMut(&P) -> EntryAction<P>,
    {
        let _lock = self.insert_lock.lock();
        let guard = epoch::pin();
        let buckets = self.buckets(&guard);

        let mut stats = UnlinkStats::default();
        for slot in buckets.slots.iter() {
            stats.merge(Self::process_bucket(slot, policy, &mut visit, &guard));
        }
        self.entries.fetch_sub(stats.removed, Ordering::Relaxed);
        stats
    }

    /// Like [`process`](Self::process) with buckets partitioned across
    /// `workers` threads.
    pub fn process_parallel<F>(
        &self,
        token: &SafepointToken<'_>,
        policy: SharedPolicy,
        workers: usize,
        visit: F,
    ) -> UnlinkStats
    where
        F: Fn(&P) -> EntryAction<P> + Sync,
    {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("vmrt-unlink-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                log::warn!("{}: worker pool unavailable ({}), unlinking serially", self.name, e);
                return self.process(token, policy, |p| visit(p));
            },
        };

        let _lock = self.insert_lock.lock();
        let guard = epoch::pin();
        let buckets = self.buckets(&guard);
        let chunk = (buckets.slots.len() / (workers.max(1) * 4)).max(1);

        let stats = pool.install(|| {
            buckets
                .slots
                .par_chunks(chunk)
                .map(|slots| {
                    let local = epoch::pin();
                    let mut stats = UnlinkStats::default();
                    let mut visit = |p: &P| visit(p);
                    for slot in slots {
                        stats.merge(Self::process_bucket(slot, policy, &mut visit, &local));
                    }
                    stats
                })
                .reduce(UnlinkStats::default, |mut a, b| {
                    a.merge(b);
                    a
                })
        });
        self.entries.fetch_sub(stats.removed, Ordering::Relaxed);
        stats
    }

    /// Rebuild the table under `algorithm`.
    ///
    /// Entries are relinked, never copied: payload identity is preserved.
    /// Returns the number of entries moved.
    pub fn rehash(&self, _token: &SafepointToken<'_>, algorithm: HashAlgorithm) -> usize {
        let _lock = self.insert_lock.lock();
        let guard = epoch::pin();
        let old = self.buckets(&guard);
        let fresh = Buckets::new(old.slots.len(), algorithm);

        let mut moved = 0;
        for slot in old.slots.iter() {
            let mut current = slot.load(Ordering::Acquire, &guard);
            while let Some(entry) = unsafe { current.as_ref() } {
                let next = entry.next.load(Ordering::Acquire, &guard);
                let hash = entry.payload.hash_payload(&algorithm);
                entry.hash.store(hash, Ordering::Relaxed);

                let target = fresh.slot(hash);
                entry.next.store(target.load(Ordering::Relaxed, &guard), Ordering::Release);
                target.store(current, Ordering::Release);

                moved += 1;
                current = next;
            }
        }

        let retired = self.buckets.swap(Owned::new(fresh), Ordering::AcqRel, &guard);
        unsafe { guard.defer_destroy(retired) };
        self.rehash.mark_rehashed();
        moved
    }

    /// Apply `f` to every entry. Racy against concurrent inserts.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Entry<P>),
    {
        let guard = epoch::pin();
        for slot in self.buckets(&guard).slots.iter() {
            let mut current = slot.load(Ordering::Acquire, &guard);
            while let Some(entry) = unsafe { current.as_ref() } {
                f(entry);
                current = entry.next.load(Ordering::Acquire, &guard);
            }
        }
    }

    /// Check that every entry sits in the bucket its stored hash selects and
    /// that the stored hash matches its payload. Returns the entry count.
    pub fn verify(&self) -> Result<usize> {
        let guard = epoch::pin();
        let buckets = self.buckets(&guard);
        let mut count = 0;

        for (index, slot) in buckets.slots.iter().enumerate() {
            let mut current = slot.load(Ordering::Acquire, &guard);
            while let Some(entry) = unsafe { current.as_ref() } {
                let expected = entry.payload.hash_payload(&buckets.algorithm);
                if entry.hash() != expected {
                    return Err(VmError::InternalError(format!(
                        "{}: stale hash {:#x} in bucket {} (expected {:#x})",
                        self.name,
                        entry.hash(),
                        index,
                        expected
                    )));
                }
                if buckets.index(expected) != index {
                    return Err(VmError::InternalError(format!(
                        "{}: entry with hash {:#x} linked into bucket {}",
                        self.name, expected, index
                    )));
                }
                count += 1;
                current = entry.next.load(Ordering::Acquire, &guard);
            }
        }
        Ok(count)
    }

    pub fn statistics(&self) -> TableStatistics {
        let guard = epoch::pin();
        let buckets = self.buckets(&guard);
        let lengths = buckets.slots.iter().map(|slot| {
            let mut length = 0;
            let mut current = slot.load(Ordering::Acquire, &guard);
            while let Some(entry) = unsafe { current.as_ref() } {
                length += 1;
                current = entry.next.load(Ordering::Acquire, &guard);
            }
            length
        });
        TableStatistics::from_chain_lengths(
            self.name,
            lengths,
            self.shared_len(),
            &buckets.algorithm,
            self.rehash.rehash_total(),
        )
    }
}

impl<P: TablePayload> Drop for ConcurrentHashtable<P> {
    fn drop(&mut self) {
        // No reader can hold a guard into a table that is being dropped.
        let guard = unsafe { epoch::unprotected() };
        let buckets = self.buckets.load(Ordering::Relaxed, guard);
        let mut leaked = 0usize;

        if let Some(array) = unsafe { buckets.as_ref() } {
            for slot in array.slots.iter() {
                let mut current: Shared<'_, Entry<P>> = slot.load(Ordering::Relaxed, guard);
                while let Some(entry) = unsafe { current.as_ref() } {
                    let next = entry.next.load(Ordering::Relaxed, guard);
                    if !entry.shared && entry.payload.reclaimable_at_teardown() {
                        drop(unsafe { current.into_owned() });
                    } else {
                        leaked += 1;
                    }
                    current = next;
                }
            }
            drop(unsafe { buckets.into_owned() });
        }

        if leaked > 0 {
            log::debug!("{}: {} live entries outlive the table", self.name, leaked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::safepoint::SafepointManager;

    #[derive(Debug)]
    struct Word(Vec<u8>);

    impl TablePayload for Word {
        type Key = [u8];

        fn hash_key(algorithm: &HashAlgorithm, key: &[u8]) -> u32 {
            algorithm.hash_bytes(key)
        }

        fn hash_payload(&self, algorithm: &HashAlgorithm) -> u32 {
            algorithm.hash_bytes(&self.0)
        }

        fn matches(&self, key: &[u8]) -> bool {
            self.0 == key
        }
    }

    fn table(size: usize) -> ConcurrentHashtable<Word> {
        ConcurrentHashtable::new("words", size, RehashController::new("words", 4, Some(42)))
    }

    fn intern(table: &ConcurrentHashtable<Word>, key: &[u8]) -> *const Word {
        let guard = epoch::pin();
        let hash = table.key_hash(key, &guard);
        let (found, _) = table.insert(key, hash, Word(key.to_vec()), &guard, |_| true);
        found as *const Word
    }

    #[test]
    fn test_insert_is_idempotent() {
        let table = table(7);
        let a = intern(&table, b"alpha");
        let b = intern(&table, b"alpha");
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_miss_reports_hash() {
        let table = table(7);
        let guard = epoch::pin();
        let (found, hash) = table.lookup(b"ab", &guard, |_| true);
        assert!(found.is_none());
        assert_eq!(hash.value, HashAlgorithm::JavaDefault.hash_bytes(b"ab"));
        assert_eq!(hash.algorithm, HashAlgorithm::JavaDefault);
    }

    #[test]
    fn test_insert_rehashes_stale_key_hash() {
        let table = table(7);
        let guard = epoch::pin();
        let stale = KeyHash {
            value: 0xdead_beef,
            algorithm: HashAlgorithm::Murmur3 { seed: 1 },
        };
        let (linked, fresh) = table.insert(b"moved", stale, Word(b"moved".to_vec()), &guard, |_| true);
        assert!(fresh);
        let linked = linked as *const Word;

        let (found, hash) = table.lookup(b"moved", &guard, |_| true);
        assert_eq!(found.map(|w| w as *const Word), Some(linked));
        assert_eq!(hash.value, HashAlgorithm::JavaDefault.hash_bytes(b"moved"));
    }

    #[test]
    fn test_insert_builds_payload_only_on_miss() {
        let table = table(7);
        intern(&table, b"present");
        let guard = epoch::pin();
        let lock = table.lock_for_insert();
        let hash = table.key_hash(b"present", &guard);
        let mut built = false;
        let result: std::result::Result<_, ()> = table.try_insert_with_locked(
            &lock,
            b"present",
            hash,
            || {
                built = true;
                Ok(Word(b"present".to_vec()))
            },
            &guard,
            |_| true,
        );
        let (_, fresh) = result.unwrap();
        assert!(!fresh);
        assert!(!built);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_long_chain_flags_rehash() {
        let table = table(1);
        for i in 0..5u8 {
            intern(&table, &[b'k', i]);
        }
        let guard = epoch::pin();
        let _ = table.lookup(b"missing", &guard, |_| true);
        assert!(table.rehash_controller().needs_rehash());
    }

    #[test]
    fn test_rehash_preserves_identity() {
        let table = table(3);
        let before: Vec<_> = (0..20u8).map(|i| intern(&table, &[b'x', i])).collect();

        let safepoints = SafepointManager::new();
        let token = safepoints.begin();
        let moved = table.rehash(&token, HashAlgorithm::Murmur3 { seed: 9 });
        drop(token);

        assert_eq!(moved, 20);
        assert!(table.algorithm().is_alternate());
        assert_eq!(table.verify().unwrap(), 20);
        for (i, ptr) in before.into_iter().enumerate() {
            assert_eq!(intern(&table, &[b'x', i as u8]), ptr);
        }
    }

    #[test]
    fn test_process_removes_and_replaces() {
        let table = table(5);
        for key in [&b"keep"[..], b"drop", b"swap"] {
            intern(&table, key);
        }

        let safepoints = SafepointManager::new();
        let token = safepoints.begin();
        let stats = table.process(&token, SharedPolicy::Skip, |w| match w.0.as_slice() {
            b"drop" => EntryAction::Remove,
            b"swap" => EntryAction::Replace(Word(b"swap".to_vec())),
            _ => EntryAction::Keep,
        });
        drop(token);

        assert_eq!(stats.removed, 1);
        assert_eq!(stats.replaced, 1);
        assert_eq!(table.len(), 2);
        let guard = epoch::pin();
        assert!(table.lookup(b"drop", &guard, |_| true).0.is_none());
        assert!(table.lookup(b"swap", &guard, |_| true).0.is_some());
    }

    #[test]
    fn test_shared_entries_survive_processing() {
        let table = table(1);
        table.append_shared(Word(b"base".to_vec()));
        intern(&table, b"head");

        let safepoints = SafepointManager::new();
        let token = safepoints.begin();
        let stats = table.process(&token, SharedPolicy::StopAtFirst, |_| EntryAction::Remove);
        assert_eq!(stats.visited, 1);
        let stats = table.process(&token, SharedPolicy::Visit, |_| EntryAction::Remove);
        assert_eq!(stats.removed, 0);
        drop(token);

        assert_eq!(table.len(), 1);
        assert_eq!(table.shared_len(), 1);
    }

    #[test]
    fn test_parallel_process_matches_serial() {
        let table = table(64);
        for i in 0..200u32 {
            intern(&table, &i.to_le_bytes());
        }

        let safepoints = SafepointManager::new();
        let token = safepoints.begin();
        let stats = table.process_parallel(&token, SharedPolicy::Skip, 4, |w| {
            if w.0[0] % 2 == 0 {
                EntryAction::Remove
            } else {
                EntryAction::Keep
            }
        });
        drop(token);

        assert_eq!(stats.removed, 100);
        assert_eq!(table.len(), 100);
        assert_eq!(table.verify().unwrap(), 100);
    }
}
