use crate::core::segments::Segment;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Last result of one plugin method
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub index: usize,
    pub segment: Segment,
    pub cached_until: DateTime<Utc>,
}

impl CacheEntry {
    /// Usable without re-invoking the method while `now <= cached_until`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= self.cached_until
    }
}

/// In-memory result cache, keyed by method
#[derive(Debug, Default)]
pub struct PluginCache {
    entries: HashMap<String, CacheEntry>,
}

impl PluginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key` if it has not expired at `now`
    pub fn get_fresh(&self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|entry| entry.is_fresh(now))
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store an entry, replacing any older one
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
