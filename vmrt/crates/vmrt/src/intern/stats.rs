//! Table Statistics
//!
//! Bucket occupancy reports for the interning tables, serializable for
//! diagnostic dumps.

use serde::Serialize;
use vmrt_util::HashAlgorithm;

/// Number of histogram rows; the last row collects all longer chains.
pub const HISTOGRAM_ROWS: usize = 10;

/// Outcome of an unlink or root-processing pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlinkStats {
    /// Entries offered to the visitor
    pub visited: usize,
    /// Entries unlinked
    pub removed: usize,
    /// Entries replaced by a relocated payload
    pub replaced: usize,
}

impl UnlinkStats {
    pub fn merge(&mut self, other: UnlinkStats) {
        self.visited += other.visited;
        self.removed += other.removed;
        self.replaced += other.replaced;
    }

    /// Visited entries that stayed linked
    pub fn retained(&self) -> usize {
        self.visited - self.removed
    }
}

/// Snapshot of a table's shape
#[derive(Debug, Clone, Serialize)]
pub struct TableStatistics {
    pub table: String,
    pub buckets: usize,
    pub entries: usize,
    pub shared_entries: usize,
    pub empty_buckets: usize,
    pub max_chain: usize,
    pub average_chain: f64,
    /// `histogram[n]` counts buckets holding exactly `n` entries
    pub histogram: Vec<usize>,
    pub alternate_hash: bool,
    pub seed: Option<u32>,
    pub rehashes: u64,
}

impl TableStatistics {
    pub(crate) fn from_chain_lengths<I>(
        table: &str,
        lengths: I,
        shared_entries: usize,
        algorithm: &HashAlgorithm,
        rehashes: u64,
    ) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut histogram = vec![0; HISTOGRAM_ROWS];
        let mut buckets = 0;
        let mut entries = 0;
        let mut max_chain = 0;

        for length in lengths {
            buckets += 1;
            entries += length;
            max_chain = max_chain.max(length);
            histogram[length.min(HISTOGRAM_ROWS - 1)] += 1;
        }

        let occupied = buckets - histogram[0];
        Self {
            table: table.to_string(),
            buckets,
            entries,
            shared_entries,
            empty_buckets: histogram[0],
            max_chain,
            average_chain: if occupied == 0 {
                0.0
            } else {
                entries as f64 / occupied as f64
            },
            histogram,
            alternate_hash: algorithm.is_alternate(),
            seed: algorithm.seed(),
            rehashes,
        }
    }

    /// Render as pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl std::fmt::Display for TableStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}: {} entries ({} shared) in {} buckets",
            self.table, self.entries, self.shared_entries, self.buckets
        )?;
        writeln!(
            f,
            "  max chain {}, average occupied chain {:.2}, {} empty",
            self.max_chain, self.average_chain, self.empty_buckets
        )?;
        for (length, count) in self.histogram.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let label = if length == HISTOGRAM_ROWS - 1 {
                format!("{}+", length)
            } else {
                length.to_string()
            };
            writeln!(f, "  {:>4}: {}", label, count)?;
        }
        Ok(())
    }
}
