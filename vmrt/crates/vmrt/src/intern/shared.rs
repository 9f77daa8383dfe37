//! Shared Snapshot
//!
//! A persisted list of symbols and strings loaded into both tables when the
//! runtime starts. Snapshot entries are permanent and immutable: unlink never
//! removes them, root processing never replaces them, and they are never
//! freed individually.
//!
//! Snapshots are stored as JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vmrt_util::utf8;

use crate::error::{Result, VmError};

/// Persisted table contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSnapshot {
    /// Symbol contents as text
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Interned string contents
    #[serde(default)]
    pub strings: Vec<String>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    pub fn with_strings<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strings.extend(strings.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.strings.is_empty()
    }

    /// Symbol contents in modified UTF-8, deduplicated in order.
    pub(crate) fn symbol_bytes(&self) -> Vec<Vec<u8>> {
        let mut seen = std::collections::HashSet::new();
        self.symbols
            .iter()
            .map(|s| utf8::encode_str(s))
            .filter(|bytes| seen.insert(bytes.clone()))
            .collect()
    }

    /// String contents in UTF-16, deduplicated in order.
    pub(crate) fn string_chars(&self) -> Vec<Vec<u16>> {
        let mut seen = std::collections::HashSet::new();
        self.strings
            .iter()
            .map(|s| s.encode_utf16().collect::<Vec<u16>>())
            .filter(|chars| seen.insert(chars.clone()))
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| VmError::Configuration(format!("invalid shared snapshot: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VmError::InternalError(format!("shared snapshot encoding: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            VmError::Configuration(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).map_err(|e| {
            VmError::Configuration(format!("cannot write snapshot {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_and_dedup() {
        let snapshot = SharedSnapshot::new()
            .with_symbols(["java/lang/Object", "java/lang/Object", "<init>"])
            .with_strings(["hello"]);
        let parsed = SharedSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.symbol_bytes().len(), 2);
    }

    #[test]
    fn test_missing_sections_default() {
        let parsed = SharedSnapshot::from_json(r#"{"symbols": ["a"]}"#).unwrap();
        assert!(parsed.strings.is_empty());
        assert!(SharedSnapshot::from_json("[").is_err());
    }
}
