//! String Table
//!
//! Canonicalizes managed string objects. Liveness is decided by the garbage
//! collector: entries are removed when an [`IsAliveClosure`] reports them
//! dead, and root processing may keep, clear or relocate each entry. Both
//! run at a safepoint.

use std::sync::Arc;
use std::time::Instant;

use crossbeam::epoch;
use vmrt_util::{utf8, HashAlgorithm};

use super::hashtable::{ConcurrentHashtable, EntryAction, SharedPolicy, TablePayload};
use super::rehash::RehashController;
use super::shared::SharedSnapshot;
use super::stats::{TableStatistics, UnlinkStats};
use super::symbol::Symbol;
use crate::config::RuntimeConfig;
use crate::error::{Result, VmError};
use crate::logging::{log_event, RuntimeEvent};
use crate::oops::{JavaString, StringRef};
use crate::runtime::safepoint::SafepointToken;

const TABLE_NAME: &str = "StringTable";

/// GC liveness predicate
pub trait IsAliveClosure {
    fn is_alive(&self, obj: &JavaString) -> bool;
}

impl<F> IsAliveClosure for F
where
    F: Fn(&JavaString) -> bool,
{
    fn is_alive(&self, obj: &JavaString) -> bool {
        self(obj)
    }
}

/// Outcome of visiting one root
#[derive(Debug, Clone)]
pub enum RootAction {
    /// Leave the entry in place
    Keep,
    /// Drop the entry from the table
    Clear,
    /// The object moved; link the relocated copy instead
    Replace(StringRef),
}

/// GC root visitor
pub trait OopClosure {
    fn do_oop(&mut self, obj: &StringRef) -> RootAction;
}

impl<F> OopClosure for F
where
    F: FnMut(&StringRef) -> RootAction,
{
    fn do_oop(&mut self, obj: &StringRef) -> RootAction {
        self(obj)
    }
}

impl TablePayload for StringRef {
    type Key = [u16];

    #[inline]
    fn hash_key(algorithm: &HashAlgorithm, key: &[u16]) -> u32 {
        algorithm.hash_utf16(key)
    }

    #[inline]
    fn hash_payload(&self, algorithm: &HashAlgorithm) -> u32 {
        algorithm.hash_utf16(self.as_utf16())
    }

    #[inline]
    fn matches(&self, key: &[u16]) -> bool {
        self.as_utf16() == key
    }
}

/// StringTable - canonical string storage
pub struct StringTable {
    table: ConcurrentHashtable<StringRef>,
    max_length: usize,
    unlink_workers: usize,
}

impl StringTable {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            table: ConcurrentHashtable::new(
                TABLE_NAME,
                config.string_table_size,
                RehashController::new(TABLE_NAME, config.rehash_count, config.hash_seed),
            ),
            max_length: config.max_string_length,
            unlink_workers: config.effective_unlink_workers(),
        }
    }

    /// Create a table pre-populated with the snapshot's strings as shared
    /// entries.
    pub fn with_snapshot(config: &RuntimeConfig, snapshot: &SharedSnapshot) -> Result<Self> {
        let table = Self::new(config);
        for chars in snapshot.string_chars() {
            table.check_length(chars.len())?;
            table.table.append_shared(Arc::new(JavaString::new(chars)));
        }
        Ok(table)
    }

    fn check_length(&self, length: usize) -> Result<()> {
        if length > self.max_length {
            log_event(RuntimeEvent::AllocationFailure {
                table: TABLE_NAME.to_string(),
                length,
            });
            return Err(VmError::StringTooLong {
                length,
                max: self.max_length,
            });
        }
        Ok(())
    }

    /// Find the canonical string for `chars`, publishing `make()` if absent.
    fn intern_with<F>(&self, chars: &[u16], make: F) -> Result<StringRef>
    where
        F: FnOnce() -> StringRef,
    {
        self.check_length(chars.len())?;
        let guard = epoch::pin();
        let (found, hash) = self.table.lookup(chars, &guard, |_| true);
        if let Some(found) = found {
            return Ok(Arc::clone(found));
        }
        let (canonical, _) = self.table.insert(chars, hash, make(), &guard, |_| true);
        Ok(Arc::clone(canonical))
    }

    /// Intern UTF-16 content.
    pub fn intern_utf16(&self, chars: &[u16]) -> Result<StringRef> {
        self.intern_with(chars, || Arc::new(JavaString::new(chars.to_vec())))
    }

    pub fn intern(&self, s: &str) -> Result<StringRef> {
        let chars: Vec<u16> = s.encode_utf16().collect();
        self.intern_utf16(&chars)
    }

    /// Intern modified UTF-8 content.
    pub fn intern_utf8(&self, bytes: &[u8]) -> Result<StringRef> {
        let chars = utf8::decode(bytes)
            .map_err(|e| VmError::IllegalArgument(format!("malformed string data: {}", e)))?;
        self.intern_utf16(&chars)
    }

    /// Intern the text of a symbol.
    pub fn intern_symbol(&self, symbol: &Symbol) -> Result<StringRef> {
        self.intern_utf16(&symbol.to_utf16())
    }

    /// `String.intern()`: if absent, the given object becomes canonical.
    pub fn intern_string(&self, string: &StringRef) -> Result<StringRef> {
        self.intern_with(string.as_utf16(), || Arc::clone(string))
    }

    /// Probe without creating. Returns the canonical string, if any, and the
    /// hash of `chars` under the active hash function.
    pub fn lookup_only(&self, chars: &[u16]) -> (Option<StringRef>, u32) {
        let guard = epoch::pin();
        let (found, hash) = self.table.lookup(chars, &guard, |_| true);
        (found.map(Arc::clone), hash.value)
    }

    pub fn probe(&self, s: &str) -> Option<StringRef> {
        let chars: Vec<u16> = s.encode_utf16().collect();
        self.lookup_only(&chars).0
    }

    fn unlink_policy(&self) -> SharedPolicy {
        if self.table.algorithm().is_alternate() {
            SharedPolicy::Skip
        } else {
            SharedPolicy::StopAtFirst
        }
    }

    fn report_unlink(&self, stats: &UnlinkStats, started: Instant) {
        log_event(RuntimeEvent::TableUnlinked {
            table: TABLE_NAME.to_string(),
            removed: stats.removed,
            retained: stats.retained(),
            duration_us: started.elapsed().as_micros() as u64,
        });
    }

    /// Remove entries the collector found dead. Safepoint only.
    pub fn unlink(&self, token: &SafepointToken<'_>, is_alive: &dyn IsAliveClosure) -> UnlinkStats {
        let started = Instant::now();
        let stats = self.table.process(token, self.unlink_policy(), |s| {
            if is_alive.is_alive(s) {
                EntryAction::Keep
            } else {
                EntryAction::Remove
            }
        });
        self.report_unlink(&stats, started);
        stats
    }

    /// [`unlink`](Self::unlink) with buckets split across worker threads.
    ///
    /// `workers` of `None` uses the configured unlink worker count.
    pub fn parallel_unlink(
        &self,
        token: &SafepointToken<'_>,
        is_alive: &(dyn IsAliveClosure + Sync),
        workers: Option<usize>,
    ) -> UnlinkStats {
        let started = Instant::now();
        let workers = workers.unwrap_or(self.unlink_workers);
        let stats = self
            .table
            .process_parallel(token, self.unlink_policy(), workers, |s| {
                if is_alive.is_alive(s) {
                    EntryAction::Keep
                } else {
                    EntryAction::Remove
                }
            });
        self.report_unlink(&stats, started);
        stats
    }

    /// Offer every entry to `closure` as a root. Safepoint only.
    ///
    /// Shared entries are visited but never cleared or replaced. A
    /// replacement must carry the same content as the entry it replaces.
    pub fn oops_do(&self, token: &SafepointToken<'_>, closure: &mut dyn OopClosure) -> UnlinkStats {
        self.table.process(token, SharedPolicy::Visit, |s| match closure.do_oop(s) {
            RootAction::Keep => EntryAction::Keep,
            RootAction::Clear => EntryAction::Remove,
            RootAction::Replace(moved) => {
                if moved.as_utf16() == s.as_utf16() {
                    EntryAction::Replace(moved)
                } else {
                    log::error!(
                        "{}: relocated string {:?} does not match {:?}, keeping original",
                        TABLE_NAME,
                        moved,
                        s
                    );
                    EntryAction::Keep
                }
            },
        })
    }

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

    pub fn rehash_if_needed(&self, token: &SafepointToken<'_>) -> bool {
        if !self.needs_rehash() {
            return false;
        }
        self.rehash(token);
        true
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.table.algorithm()
    }

    pub fn hash_of(&self, chars: &[u16]) -> u32 {
        self.table.hash_of(chars)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shared_len(&self) -> usize {
        self.table.shared_len()
    }

    pub fn verify(&self) -> Result<usize> {
        self.table.verify()
    }

    pub fn statistics(&self) -> TableStatistics {
        self.table.statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::safepoint::SafepointManager;

    fn table() -> StringTable {
        StringTable::new(&RuntimeConfig {
            string_table_size: 17,
            ..RuntimeConfig::default()
        })
    }

    #[test]
    fn test_intern_is_canonical() {
        let table = table();
        let a = table.intern("hello").unwrap();
        let b = table.intern_utf8(b"hello").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_intern_string_adopts_object() {
        let table = table();
        let mine = Arc::new(JavaString::of("adopted"));
        let canonical = table.intern_string(&mine).unwrap();
        assert!(Arc::ptr_eq(&mine, &canonical));

        let other = Arc::new(JavaString::of("adopted"));
        assert!(Arc::ptr_eq(&table.intern_string(&other).unwrap(), &mine));
    }

    #[test]
    fn test_too_long() {
        let table = StringTable::new(&RuntimeConfig {
            max_string_length: 3,
            ..RuntimeConfig::default()
        });
        assert!(matches!(
            table.intern("abcd"),
            Err(VmError::StringTooLong { length: 4, max: 3 })
        ));
    }

    #[test]
    fn test_unlink_uses_liveness() {
        let table = table();
        let keep = table.intern("keep").unwrap();
        table.intern("drop").unwrap();

        let safepoints = SafepointManager::new();
        let stats = table.unlink(&safepoints.begin(), &|s: &JavaString| !s.equals_str("drop"));
        assert_eq!(stats.removed, 1);
        assert!(table.probe("drop").is_none());
        assert!(Arc::ptr_eq(&table.probe("keep").unwrap(), &keep));
    }

    #[test]
    fn test_oops_do_replaces_and_clears() {
        let table = table();
        let original = table.intern("moved").unwrap();
        table.intern("gone").unwrap();
        let relocated = Arc::new(JavaString::of("moved"));

        let safepoints = SafepointManager::new();
        let token = safepoints.begin();
        let target = Arc::clone(&relocated);
        let mut closure = move |s: &StringRef| {
            if s.equals_str("moved") {
                RootAction::Replace(Arc::clone(&target))
            } else {
                RootAction::Clear
            }
        };
        let stats = table.oops_do(&token, &mut closure);
        drop(token);

        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.removed, 1);
        let now = table.probe("moved").unwrap();
        assert!(Arc::ptr_eq(&now, &relocated));
        assert!(!Arc::ptr_eq(&now, &original));
    }

    #[test]
    fn test_mismatched_replacement_is_ignored() {
        let table = table();
        let original = table.intern("x").unwrap();
        let safepoints = SafepointManager::new();
        let mut closure = |_: &StringRef| RootAction::Replace(Arc::new(JavaString::of("y")));
        let stats = table.oops_do(&safepoints.begin(), &mut closure);
        assert_eq!(stats.replaced, 0);
        assert!(Arc::ptr_eq(&table.probe("x").unwrap(), &original));
    }
}
