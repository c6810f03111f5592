use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identifier_key;

/// Passthrough entries kept per discovered record unless configured otherwise.
pub const DEFAULT_PASSTHROUGH_LIMIT: usize = 32;

/// Where a discovered record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoverySource {
    Mdm { provider: String },
    NetworkScan { scanner: String },
    Agent { agent_version: Option<String> },
    Manual,
}

/// Source-specific attributes the matcher never reads, capped in size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Passthrough(BTreeMap<String, String>);

impl Passthrough {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the map is full and `key` is new.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>, limit: usize) -> bool {
        let key = key.into();
        if !self.0.contains_key(&key) && self.0.len() >= limit {
            return false;
        }
        self.0.insert(key, value.into());
        true
    }

    /// Drop entries past `limit` (in key order). Returns how many were dropped.
    pub fn enforce_limit(&mut self, limit: usize) -> usize {
        let mut dropped = 0;
        while self.0.len() > limit {
            self.0.pop_last();
            dropped += 1;
        }
        dropped
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A device observed by an external discovery source. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredRecord {
    pub source_id: String,
    pub source: DiscoverySource,
    pub external_id: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Passthrough,
}

impl DiscoveredRecord {
    pub fn serial_key(&self) -> Option<String> {
        identifier_key(self.serial_number.as_deref())
    }
}
