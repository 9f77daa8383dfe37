//! Runtime Logging and Tracing
//!
//! Event log for table maintenance, method handle linkage and code cache
//! invalidation. Events are recorded in a bounded in-memory ring and emitted
//! through the `log` facade, either human readable or as JSON lines.
//!
//! Log Levels:
//! - ERROR: allocation failures, corrupted tables
//! - WARN: skewed buckets, degraded operation
//! - INFO: rehashes, deoptimization
//! - DEBUG: unlink passes, safepoints, call site updates
//! - TRACE: per-member resolution

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Log level for runtime events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Runtime event types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A lookup walked a bucket chain at or beyond the rehash threshold
    SkewDetected { table: String, chain_length: usize },

    /// A table was rebuilt under a new hash seed
    TableRehashed {
        table: String,
        entries: usize,
        seed: u32,
        duration_us: u64,
    },

    /// Dead entries were removed from a table
    TableUnlinked {
        table: String,
        removed: usize,
        retained: usize,
        duration_us: u64,
    },

    /// Symbol or string allocation failed
    AllocationFailure { table: String, length: usize },

    /// A safepoint was reached
    SafepointBegin { id: u64 },

    /// A safepoint was released
    SafepointEnd { id: u64, duration_us: u64 },

    /// A member name was linked
    MemberResolved {
        class: String,
        name: String,
        flags: i32,
        vmindex: i32,
    },

    /// Member name linkage failed
    ResolutionFailed {
        class: String,
        name: String,
        error: String,
    },

    /// A call site received a new target
    CallSiteRetargeted { call_site: u64, invalidated: usize },

    /// Compiled code was made not entrant
    Deoptimized { compiled_method: u64, reason: String },
}

/// Runtime logger configuration
#[derive(Debug, Clone)]
pub struct RuntimeLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Forward events to the `log` facade
    pub emit: bool,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Number of events retained in memory
    pub capacity: usize,
}

impl Default for RuntimeLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            emit: true,
            json: false,
            timestamps: true,
            capacity: 1024,
        }
    }
}

/// Runtime Logger - centralized event log
pub struct RuntimeLogger {
    config: RuntimeLoggerConfig,
    events: Mutex<VecDeque<(Instant, RuntimeEvent)>>,
    enabled: AtomicBool,
}

impl RuntimeLogger {
    /// Create new runtime logger
    pub fn new(config: RuntimeLoggerConfig) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(config.capacity.min(1024))),
            config,
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Log a runtime event
    pub fn log(&self, event: RuntimeEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = Self::event_level(&event);
        if level > self.config.level {
            return;
        }

        if self.config.emit {
            self.emit(level, &event);
        }

        if self.config.capacity == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() == self.config.capacity {
            events.pop_front();
        }
        events.push_back((Instant::now(), event));
    }

    /// Get log level for event
    fn event_level(event: &RuntimeEvent) -> LogLevel {
        match event {
            RuntimeEvent::AllocationFailure { .. } => LogLevel::Error,
            RuntimeEvent::SkewDetected { .. } => LogLevel::Warn,
            RuntimeEvent::TableRehashed { .. } | RuntimeEvent::Deoptimized { .. } => {
                LogLevel::Info
            },
            RuntimeEvent::TableUnlinked { .. }
            | RuntimeEvent::SafepointBegin { .. }
            | RuntimeEvent::SafepointEnd { .. }
            | RuntimeEvent::CallSiteRetargeted { .. }
            | RuntimeEvent::ResolutionFailed { .. } => LogLevel::Debug,
            RuntimeEvent::MemberResolved { .. } => LogLevel::Trace,
        }
    }

    fn emit(&self, level: LogLevel, event: &RuntimeEvent) {
        let body = if self.config.json {
            match serde_json::to_string(event) {
                Ok(json) => json,
                Err(_) => return,
            }
        } else {
            Self::format_human(event)
        };

        if self.config.timestamps {
            let now = chrono::Local::now();
            log::log!(
                target: "vmrt",
                level.as_log_level(),
                "[{}] {}",
                now.format("%Y-%m-%d %H:%M:%S%.3f"),
                body
            );
        } else {
            log::log!(target: "vmrt", level.as_log_level(), "{}", body);
        }
    }

    /// Human-readable rendering
    fn format_human(event: &RuntimeEvent) -> String {
        match event {
            RuntimeEvent::SkewDetected {
                table,
                chain_length,
            } => format!(
                "[{}] bucket chain of {} entries, rehash requested",
                table, chain_length
            ),
            RuntimeEvent::TableRehashed {
                table,
                entries,
                seed,
                duration_us,
            } => format!(
                "[{}] rehashed {} entries with seed {:#010x} ({} us)",
                table, entries, seed, duration_us
            ),
            RuntimeEvent::TableUnlinked {
                table,
                removed,
                retained,
                duration_us,
            } => format!(
                "[{}] unlinked {} entries, {} retained ({} us)",
                table, removed, retained, duration_us
            ),
            RuntimeEvent::AllocationFailure { table, length } => {
                format!("[{}] allocation failure for {} units", table, length)
            },
            RuntimeEvent::SafepointBegin { id } => format!("[safepoint] #{} reached", id),
            RuntimeEvent::SafepointEnd { id, duration_us } => {
                format!("[safepoint] #{} released after {} us", id, duration_us)
            },
            RuntimeEvent::MemberResolved {
                class,
                name,
                flags,
                vmindex,
            } => format!(
                "[linkage] resolved {}.{} flags={:#x} vmindex={}",
                class, name, flags, vmindex
            ),
            RuntimeEvent::ResolutionFailed { class, name, error } => {
                format!("[linkage] {}.{} failed: {}", class, name, error)
            },
            RuntimeEvent::CallSiteRetargeted {
                call_site,
                invalidated,
            } => format!(
                "[call site] #{} retargeted, {} dependents invalidated",
                call_site, invalidated
            ),
            RuntimeEvent::Deoptimized {
                compiled_method,
                reason,
            } => format!("[code cache] nmethod #{} not entrant: {}", compiled_method, reason),
        }
    }

    /// Get all retained events
    pub fn get_events(&self) -> Vec<(Instant, RuntimeEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for RuntimeLogger {
    fn default() -> Self {
        Self::new(RuntimeLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<RuntimeLogger> = Mutex::new(RuntimeLogger::default());
}

/// Log a runtime event to the global logger
pub fn log_event(event: RuntimeEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Configure global logger
pub fn configure_logger(config: RuntimeLoggerConfig) {
    *GLOBAL_LOGGER.lock() = RuntimeLogger::new(config);
}

/// Get global logger event count
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}

/// Snapshot of the global logger's retained events
pub fn recent_events() -> Vec<RuntimeEvent> {
    GLOBAL_LOGGER
        .lock()
        .get_events()
        .into_iter()
        .map(|(_, event)| event)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rehash_event() -> RuntimeEvent {
        RuntimeEvent::TableRehashed {
            table: "SymbolTable".to_string(),
            entries: 10,
            seed: 7,
            duration_us: 3,
        }
    }

    #[test]
    fn test_runtime_logger_basic() {
        let logger = RuntimeLogger::default();
        logger.log(rehash_event());
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_runtime_logger_disable() {
        let logger = RuntimeLogger::default();
        logger.disable();
        logger.log(rehash_event());
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_level_filter() {
        let logger = RuntimeLogger::default();
        logger.log(RuntimeEvent::SafepointBegin { id: 1 });
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_ring_is_bounded() {
        let logger = RuntimeLogger::new(RuntimeLoggerConfig {
            capacity: 2,
            emit: false,
            ..Default::default()
        });
        for _ in 0..5 {
            logger.log(rehash_event());
        }
        assert_eq!(logger.event_count(), 2);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(rehash_event()).unwrap();
        assert_eq!(json["type"], "table_rehashed");
        assert_eq!(json["entries"], 10);
    }

    #[test]
    fn test_global_logger() {
        log_event(RuntimeEvent::AllocationFailure {
            table: "StringTable".to_string(),
            length: 1,
        });
        assert!(get_event_count() > 0);
    }
}
