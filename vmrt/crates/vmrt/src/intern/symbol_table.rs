//! Symbol Table
//!
//! Canonicalizes byte strings into [`Symbol`]s. Lookups are lock-free; a
//! miss allocates a candidate outside the lock and publishes it under the
//! insert lock after a re-probe. Unlink and rehash run at a safepoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::epoch;
use vmrt_util::{utf8, HashAlgorithm};

use super::hashtable::{ConcurrentHashtable, EntryAction, SharedPolicy};
use super::rehash::RehashController;
use super::shared::SharedSnapshot;
use super::stats::{TableStatistics, UnlinkStats};
use super::symbol::{Symbol, SymbolBody};
use crate::config::RuntimeConfig;
use crate::error::{Result, VmError};
use crate::logging::{log_event, RuntimeEvent};
use crate::memory::MetaspaceArena;
use crate::runtime::safepoint::SafepointToken;

const TABLE_NAME: &str = "SymbolTable";

/// SymbolTable - canonical symbol storage
pub struct SymbolTable {
    table: ConcurrentHashtable<SymbolBody>,
    arena: Arc<dyn MetaspaceArena>,
    max_length: usize,
    arena_symbols: AtomicUsize,
}

impl SymbolTable {
    /// Create an empty table sized and tuned by `config`.
    pub fn new(config: &RuntimeConfig, arena: Arc<dyn MetaspaceArena>) -> Self {
        Self {
            table: ConcurrentHashtable::new(
                TABLE_NAME,
                config.symbol_table_size,
                RehashController::new(TABLE_NAME, config.rehash_count, config.hash_seed),
            ),
            arena,
            max_length: config.max_symbol_length,
            arena_symbols: AtomicUsize::new(0),
        }
    }

    /// Create a table pre-populated with the snapshot's symbols as shared,
    /// permanent entries.
    pub fn with_snapshot(
        config: &RuntimeConfig,
        arena: Arc<dyn MetaspaceArena>,
        snapshot: &SharedSnapshot,
    ) -> Result<Self> {
        let table = Self::new(config, arena);
        for bytes in snapshot.symbol_bytes() {
            table.check_length(bytes.len())?;
            let body = table.arena_body(&bytes)?;
            table.table.append_shared(body);
        }
        Ok(table)
    }

    fn check_length(&self, length: usize) -> Result<()> {
        if length > self.max_length {
            log_event(RuntimeEvent::AllocationFailure {
                table: TABLE_NAME.to_string(),
                length,
            });
            return Err(VmError::SymbolTooLong {
                length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    fn arena_body(&self, bytes: &[u8]) -> Result<SymbolBody> {
        let ptr = self.arena.allocate(bytes.len()).map_err(|e| {
            log_event(RuntimeEvent::AllocationFailure {
                table: TABLE_NAME.to_string(),
                length: bytes.len(),
            });
            e
        })?;
        self.arena_symbols.fetch_add(1, Ordering::Relaxed);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(SymbolBody::permanent_in_arena(ptr, bytes.len()))
        }
    }

    /// Find or create the symbol for `bytes`.
    pub fn lookup(&self, bytes: &[u8]) -> Result<Symbol> {
        self.check_length(bytes.len())?;
        let guard = epoch::pin();

        let (found, hash) = self.table.lookup(bytes, &guard, SymbolBody::try_retain);
        if let Some(body) = found {
            return Ok(unsafe { Symbol::from_retained(body) });
        }

        let candidate = SymbolBody::heap(bytes);
        let (body, _) = self.table.insert(bytes, hash, candidate, &guard, SymbolBody::try_retain);
        Ok(unsafe { Symbol::from_retained(body) })
    }

    /// Find or create the symbol for a Rust string.
    pub fn lookup_str(&self, s: &str) -> Result<Symbol> {
        self.lookup(&utf8::encode_str(s))
    }

    /// Find or create the symbol for UTF-16 content.
    pub fn lookup_utf16(&self, chars: &[u16]) -> Result<Symbol> {
        self.check_length(utf8::utf8_length(chars))?;
        self.lookup(&utf8::encode(chars))
    }

    /// Find or create the symbol for `symbol[begin..end]`.
    pub fn lookup_substring(&self, symbol: &Symbol, begin: usize, end: usize) -> Result<Symbol> {
        let bytes = symbol.as_bytes().get(begin..end).ok_or_else(|| {
            VmError::IllegalArgument(format!(
                "substring {}..{} of symbol of length {}",
                begin,
                end,
                symbol.len()
            ))
        })?;
        self.lookup(bytes)
    }

    /// Probe without creating.
    ///
    /// Returns the symbol if present and live, and the hash of `bytes` under
    /// the active hash function.
    pub fn lookup_only(&self, bytes: &[u8]) -> (Option<Symbol>, u32) {
        let guard = epoch::pin();
        let (found, hash) = self.table.lookup(bytes, &guard, SymbolBody::try_retain);
        (found.map(|body| unsafe { Symbol::from_retained(body) }), hash.value)
    }

    pub fn probe(&self, s: &str) -> Option<Symbol> {
        self.lookup_only(&utf8::encode_str(s)).0
    }

    pub fn probe_utf16(&self, chars: &[u16]) -> Option<Symbol> {
        self.lookup_only(&utf8::encode(chars)).0
    }

    /// Intern a batch of names, taking the insert lock at most once.
    pub fn lookup_many<B: AsRef<[u8]>>(&self, names: &[B]) -> Result<Vec<Symbol>> {
        for name in names {
            self.check_length(name.as_ref().len())?;
        }

        let guard = epoch::pin();
        let mut found = Vec::with_capacity(names.len());
        let mut candidates = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let (body, hash) = self.table.lookup(name.as_ref(), &guard, SymbolBody::try_retain);
            if body.is_none() {
                candidates.push((i, hash, SymbolBody::heap(name.as_ref())));
            }
            found.push(body.map(|body| unsafe { Symbol::from_retained(body) }));
        }

        if !candidates.is_empty() {
            let lock = self.table.lock_for_insert();
            for (i, hash, candidate) in candidates {
                let (body, _) = self.table.insert_locked(
                    &lock,
                    names[i].as_ref(),
                    hash,
                    candidate,
                    &guard,
                    SymbolBody::try_retain,
                );
                found[i] = Some(unsafe { Symbol::from_retained(body) });
            }
        }

        found
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| VmError::InternalError("batch intern left a hole".to_string()))
            })
            .collect()
    }

    /// Find or create a permanent symbol.
    ///
    /// New permanent symbols live in the arena; an existing live symbol is
    /// promoted in place. Arena space is only taken once the re-probe under
    /// the insert lock has missed, so a lost race wastes nothing.
    pub fn new_permanent_symbol(&self, s: &str) -> Result<Symbol> {
        let bytes = utf8::encode_str(s);
        self.check_length(bytes.len())?;
        let guard = epoch::pin();

        let (found, hash) = self.table.lookup(&bytes, &guard, SymbolBody::try_retain);
        if let Some(body) = found {
            body.make_permanent();
            return Ok(unsafe { Symbol::from_retained(body) });
        }

        let lock = self.table.lock_for_insert();
        let (body, _) = self.table.try_insert_with_locked(
            &lock,
            &bytes,
            hash,
            || self.arena_body(&bytes),
            &guard,
            SymbolBody::try_retain,
        )?;
        drop(lock);
        body.make_permanent();
        Ok(unsafe { Symbol::from_retained(body) })
    }

    /// Remove every dead symbol. Safepoint only.
    pub fn unlink(&self, token: &SafepointToken<'_>) -> UnlinkStats {
        let started = Instant::now();
        let policy = if self.table.algorithm().is_alternate() {
            SharedPolicy::Skip
        } else {
            SharedPolicy::StopAtFirst
        };

        let stats = self.table.process(token, policy, |body| {
            if body.is_dead() {
                EntryAction::Remove
            } else {
                EntryAction::Keep
            }
        });

        log_event(RuntimeEvent::TableUnlinked {
            table: TABLE_NAME.to_string(),
            removed: stats.removed,
            retained: stats.retained(),
            duration_us: started.elapsed().as_micros() as u64,
        });
        stats
    }

    /// Whether a lookup has observed a skewed bucket
    pub fn needs_rehash(&self) -> bool {
        self.table.rehash_controller().needs_rehash()
    }

    /// Rebuild under the alternate hash with a new seed. Safepoint only.
    pub fn rehash(&self, token: &SafepointToken<'_>) -> usize {
        let started = Instant::now();
        let algorithm = self.table.rehash_controller().next_algorithm();
        let moved = self.table.rehash(token, algorithm);
        log_event(RuntimeEvent::TableRehashed {
            table: TABLE_NAME.to_string(),
            entries: moved,
            seed: algorithm.seed().unwrap_or_default(),
            duration_us: started.elapsed().as_micros() as u64,
        });
        moved
    }

    /// Rehash if flagged. Returns whether a rehash happened.
    pub fn rehash_if_needed(&self, token: &SafepointToken<'_>) -> bool {
        if !self.needs_rehash() {
            return false;
        }
        self.rehash(token);
        true
    }

    /// Active hash function
    pub fn algorithm(&self) -> HashAlgorithm {
        self.table.algorithm()
    }

    /// Hash of `bytes` under the active hash function
    pub fn hash_of(&self, bytes: &[u8]) -> u32 {
        self.table.hash_of(bytes)
    }

    /// Linked entries, live or awaiting unlink
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shared_len(&self) -> usize {
        self.table.shared_len()
    }

    /// Number of linked symbols whose count has reached zero
    pub fn dead_count(&self) -> usize {
        let mut dead = 0;
        self.table.for_each(|entry| {
            if entry.payload().is_dead() {
                dead += 1;
            }
        });
        dead
    }

    /// Check hashes and bucket placement. Returns the entry count.
    pub fn verify(&self) -> Result<usize> {
        let count = self.table.verify()?;
        let mut bad = None;
        self.table.for_each(|entry| {
            if entry.is_shared() && !entry.payload().is_permanent() && bad.is_none() {
                bad = Some(utf8::decode_lossy(entry.payload().as_bytes()));
            }
        });
        match bad {
            Some(name) => Err(VmError::InternalError(format!(
                "{}: shared symbol '{}' is not permanent",
                TABLE_NAME, name
            ))),
            None => Ok(count),
        }
    }

    pub fn statistics(&self) -> TableStatistics {
        self.table.statistics()
    }
}

impl Drop for SymbolTable {
    fn drop(&mut self) {
        // Permanent symbol bytes live in the arena and may still be referenced.
        if self.arena_symbols.load(Ordering::Relaxed) > 0 {
            std::mem::forget(Arc::clone(&self.arena));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BumpArena;
    use crate::runtime::safepoint::SafepointManager;

    fn table_with(config: RuntimeConfig) -> SymbolTable {
        let arena = BumpArena::new(config.arena_chunk_size, config.arena_capacity).unwrap();
        SymbolTable::new(&config, Arc::new(arena))
    }

    fn small_table() -> SymbolTable {
        table_with(RuntimeConfig {
            symbol_table_size: 31,
            ..RuntimeConfig::default()
        })
    }

    #[test]
    fn test_lookup_is_canonical() {
        let table = small_table();
        let a = table.lookup(b"java/lang/Object").unwrap();
        let b = table.lookup(b"java/lang/Object").unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.refcount(), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_only_leaves_no_count() {
        let table = small_table();
        let sym = table.lookup(b"foo").unwrap();
        let (probed, hash) = table.lookup_only(b"foo");
        assert!(probed.is_some());
        assert_eq!(hash, table.hash_of(b"foo"));
        drop(probed);
        assert_eq!(sym.refcount(), 1);
        assert!(table.lookup_only(b"bar").0.is_none());
    }

    #[test]
    fn test_too_long_is_fatal() {
        let table = table_with(RuntimeConfig {
            max_symbol_length: 4,
            ..RuntimeConfig::default()
        });
        let err = table.lookup(b"toolong").unwrap_err();
        assert!(matches!(err, VmError::SymbolTooLong { length: 7, max: 4 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_dead_symbol_is_not_revived() {
        let table = small_table();
        let first = table.lookup(b"transient").unwrap();
        let addr = first.identity_hash();
        drop(first);
        assert_eq!(table.dead_count(), 1);

        let second = table.lookup(b"transient").unwrap();
        assert_eq!(second.refcount(), 1);
        assert_ne!(second.identity_hash(), addr);
        assert_eq!(table.len(), 2);

        let safepoints = SafepointManager::new();
        let stats = table.unlink(&safepoints.begin());
        assert_eq!(stats.removed, 1);
        assert_eq!(table.len(), 1);
        assert!(table.probe("transient").unwrap().ptr_eq(&second));
    }

    #[test]
    fn test_substring_and_batch() {
        let table = small_table();
        let full = table.lookup(b"java/lang/String").unwrap();
        let pkg = table.lookup_substring(&full, 0, 9).unwrap();
        assert_eq!(pkg.as_bytes(), b"java/lang");
        assert!(table.lookup_substring(&full, 3, 99).is_err());

        let names: Vec<&[u8]> = vec![b"a", b"java/lang", b"b", b"a"];
        let symbols = table.lookup_many(&names).unwrap();
        assert!(symbols[1].ptr_eq(&pkg));
        assert!(symbols[0].ptr_eq(&symbols[3]));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_permanent_symbols_survive_unlink() {
        let table = small_table();
        let init = table.new_permanent_symbol("<init>").unwrap();
        drop(init);
        let promoted = table.lookup(b"main").unwrap();
        table.new_permanent_symbol("main").unwrap();
        drop(promoted);

        let safepoints = SafepointManager::new();
        assert_eq!(table.unlink(&safepoints.begin()).removed, 0);
        assert!(table.probe("<init>").unwrap().is_permanent());
        assert!(table.probe("main").unwrap().is_permanent());
    }

    #[test]
    fn test_permanent_race_allocates_once() {
        let config = RuntimeConfig {
            symbol_table_size: 31,
            ..RuntimeConfig::default()
        };
        let arena = Arc::new(BumpArena::new(config.arena_chunk_size, config.arena_capacity).unwrap());
        let table = Arc::new(SymbolTable::new(&config, Arc::clone(&arena) as Arc<dyn MetaspaceArena>));
        let before = arena.used();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    table.new_permanent_symbol("java/lang/Racer").unwrap()
                })
            })
            .collect();
        let symbols: Vec<Symbol> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(symbols.iter().all(|s| s.ptr_eq(&symbols[0])));
        // 15 bytes rounded up to the 8-byte arena alignment
        assert_eq!(arena.used() - before, 16);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshot_entries_are_shared() {
        let config = RuntimeConfig {
            symbol_table_size: 1,
            ..RuntimeConfig::default()
        };
        let arena = Arc::new(BumpArena::new(config.arena_chunk_size, config.arena_capacity).unwrap());
        let snapshot = SharedSnapshot::new().with_symbols(["java/lang/Object", "<init>"]);
        let table = SymbolTable::with_snapshot(&config, arena, &snapshot).unwrap();
        assert_eq!(table.shared_len(), 2);

        drop(table.lookup(b"scratch").unwrap());
        let safepoints = SafepointManager::new();
        let stats = table.unlink(&safepoints.begin());
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.visited, 1);
        assert_eq!(table.verify().unwrap(), 2);
    }
}
