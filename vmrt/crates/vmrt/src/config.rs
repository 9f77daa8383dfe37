//! Configuration Module - Runtime Tuning Parameters
//!
//! Manages the sizing and policy knobs of the interning tables, the
//! metaspace arena and the member resolution engine.

use crate::util::constants::{KB, MB};

/// Main configuration for the runtime core
///
/// # Examples
///
/// ```rust
/// use vmrt::RuntimeConfig;
///
/// // Use default configuration
/// let config = RuntimeConfig::default();
///
/// // Small tables with a fixed alternate-hash seed for reproducible tests
/// let config = RuntimeConfig {
///     symbol_table_size: 31,
///     string_table_size: 31,
///     hash_seed: Some(0x5eed),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of buckets in the symbol table
    ///
    /// Prime sizes spread the default hash best.
    /// Default: 20011
    pub symbol_table_size: usize,

    /// Number of buckets in the string table
    ///
    /// Default: 60013
    pub string_table_size: usize,

    /// Chain length that flags a table for rehashing
    ///
    /// A lookup miss that walks at least this many entries in one bucket marks
    /// the table as skewed; the next safepoint rehash switches to the seeded
    /// alternate hash.
    ///
    /// Default: 100
    pub rehash_count: usize,

    /// Fixed seed for the alternate hash
    ///
    /// If None, a random seed is drawn at every rehash.
    /// Default: None
    pub hash_seed: Option<u32>,

    /// Longest symbol in bytes
    ///
    /// Symbol lengths are stored in 16 bits.
    /// Default: 65535
    pub max_symbol_length: usize,

    /// Longest interned string in UTF-16 code units
    ///
    /// Default: i32::MAX
    pub max_string_length: usize,

    /// Size of one metaspace arena chunk in bytes
    ///
    /// Rounded up to the system page size.
    /// Default: 64KB
    pub arena_chunk_size: usize,

    /// Upper bound on committed arena memory in bytes
    ///
    /// Default: 64MB
    pub arena_capacity: usize,

    /// Verify caller access before resolving a member name
    ///
    /// Default: true
    pub verify_method_handles: bool,

    /// Minimum overflow budget of a bulk member search
    ///
    /// `find_members` stops counting overflow matches after
    /// `max(find_members_overflow_floor, results.len())`.
    /// Default: 1000
    pub find_members_overflow_floor: usize,

    /// Worker threads for parallel table unlinking
    ///
    /// If None, auto-detects: min(8, num_cpus)
    /// Default: Auto-detect
    pub unlink_workers: Option<usize>,

    /// Enable verbose event logging
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let num_cpus = num_cpus::get();

        RuntimeConfig {
            // Tables
            symbol_table_size: 20011,
            string_table_size: 60013,
            rehash_count: 100,
            hash_seed: None,
            max_symbol_length: u16::MAX as usize,
            max_string_length: i32::MAX as usize,

            // Arena
            arena_chunk_size: 64 * KB,
            arena_capacity: 64 * MB,

            // Resolution
            verify_method_handles: true,
            find_members_overflow_floor: 1000,

            // Workers
            unlink_workers: Some(num_cpus.clamp(1, 8)),

            // Debug
            verbose: false,
        }
    }
}

impl RuntimeConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vmrt::RuntimeConfig;
    ///
    /// let config = RuntimeConfig {
    ///     symbol_table_size: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol_table_size == 0 {
            return Err(ConfigError::InvalidTableSize(
                "symbol_table_size must be > 0".to_string(),
            ));
        }

        if self.string_table_size == 0 {
            return Err(ConfigError::InvalidTableSize(
                "string_table_size must be > 0".to_string(),
            ));
        }

        if self.rehash_count < 2 {
            return Err(ConfigError::InvalidRehashCount(
                "rehash_count must be >= 2".to_string(),
            ));
        }

        if self.max_symbol_length == 0 || self.max_symbol_length > u16::MAX as usize {
            return Err(ConfigError::InvalidLength(format!(
                "max_symbol_length must be in 1..={}",
                u16::MAX
            )));
        }

        if self.max_string_length == 0 {
            return Err(ConfigError::InvalidLength(
                "max_string_length must be > 0".to_string(),
            ));
        }

        if self.arena_chunk_size < self.max_symbol_length {
            return Err(ConfigError::InvalidArena(
                "arena_chunk_size must hold the longest symbol".to_string(),
            ));
        }

        if self.arena_capacity < self.arena_chunk_size {
            return Err(ConfigError::InvalidArena(
                "arena_capacity must be >= arena_chunk_size".to_string(),
            ));
        }

        if let Some(workers) = self.unlink_workers {
            if workers == 0 {
                return Err(ConfigError::InvalidWorkers(
                    "unlink_workers must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - VMRT_SYMBOL_TABLE_SIZE
    /// - VMRT_STRING_TABLE_SIZE
    /// - VMRT_REHASH_COUNT
    /// - VMRT_HASH_SEED
    /// - VMRT_VERIFY_METHOD_HANDLES
    /// - VMRT_UNLINK_WORKERS
    /// - VMRT_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse::<usize>("VMRT_SYMBOL_TABLE_SIZE") {
            config.symbol_table_size = size;
        }

        if let Some(size) = env_parse::<usize>("VMRT_STRING_TABLE_SIZE") {
            config.string_table_size = size;
        }

        if let Some(count) = env_parse::<usize>("VMRT_REHASH_COUNT") {
            config.rehash_count = count;
        }

        if let Some(seed) = env_parse::<u32>("VMRT_HASH_SEED") {
            config.hash_seed = Some(seed);
        }

        if let Ok(val) = std::env::var("VMRT_VERIFY_METHOD_HANDLES") {
            config.verify_method_handles = env_flag(&val);
        }

        if let Some(workers) = env_parse::<usize>("VMRT_UNLINK_WORKERS") {
            config.unlink_workers = Some(workers);
        }

        if let Ok(val) = std::env::var("VMRT_VERBOSE") {
            config.verbose = env_flag(&val);
        }

        config
    }

    /// Effective number of unlink workers.
    pub fn effective_unlink_workers(&self) -> usize {
        self.unlink_workers
            .unwrap_or_else(|| num_cpus::get().clamp(1, 8))
            .max(1)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid table size: {0}")]
    InvalidTableSize(String),

    #[error("Invalid rehash count: {0}")]
    InvalidRehashCount(String),

    #[error("Invalid length limit: {0}")]
    InvalidLength(String),

    #[error("Invalid arena settings: {0}")]
    InvalidArena(String),

    #[error("Invalid worker count: {0}")]
    InvalidWorkers(String),
}

impl From<ConfigError> for crate::error::VmError {
    fn from(err: ConfigError) -> Self {
        crate::error::VmError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rehash_count, 100);
        assert_eq!(config.max_symbol_length, 65535);
        assert!(config.verify_method_handles);
    }

    #[test]
    fn test_invalid_table_size() {
        let config = RuntimeConfig {
            string_table_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTableSize(_))));
    }

    #[test]
    fn test_symbol_length_cannot_exceed_u16() {
        let config = RuntimeConfig {
            max_symbol_length: 70_000,
            arena_chunk_size: 128 * KB,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLength(_))));
    }

    #[test]
    fn test_arena_must_hold_longest_symbol() {
        let config = RuntimeConfig {
            arena_chunk_size: 1024,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidArena(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = RuntimeConfig {
            unlink_workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
