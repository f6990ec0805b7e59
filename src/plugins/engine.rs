//! Plugin injection with per-method result caching.
//!
//! Every tick, each registered method either reuses its cached segment or is
//! invoked again once the cache entry has expired. A failing method is
//! replaced by an empty placeholder that is cached like any other result, so
//! a broken plugin is retried once per TTL instead of once per tick.

use super::{CacheEntry, Plugin, PluginCache, PluginOutput, PluginRegistration};
use crate::config::RelayConfig;
use crate::core::segments::{Segment, Tick};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key a plugin may set in its segment to pick its own expiry (unix seconds)
pub const CACHED_UNTIL_KEY: &str = "cached_until";

/// Default cache TTL in seconds
pub const DEFAULT_CACHE_TIMEOUT: u64 = 60;

// Roughly a century; keeps `now + ttl` well inside chrono's range
const MAX_CACHE_TIMEOUT: u64 = 100 * 365 * 24 * 3600;

struct RegisteredPlugin {
    registration: PluginRegistration,
    plugin: Box<dyn Plugin>,
}

pub struct InjectionEngine {
    // BTreeMap keeps ids in lexicographic order
    plugins: BTreeMap<String, RegisteredPlugin>,
    cache: PluginCache,
    cache_timeout: Duration,
    strict_validation: bool,
}

impl InjectionEngine {
    pub fn new(cache_timeout_secs: u64, strict_validation: bool) -> Self {
        Self {
            plugins: BTreeMap::new(),
            cache: PluginCache::new(),
            cache_timeout: Duration::seconds(cache_timeout_secs.min(MAX_CACHE_TIMEOUT) as i64),
            strict_validation,
        }
    }

    /// Register a plugin; its method list is frozen at this point.
    ///
    /// A plugin with an id that is already registered replaces the old one.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> &PluginRegistration {
        let registration = PluginRegistration::of(plugin.as_ref());
        let id = registration.id.clone();
        tracing::info!(
            "registered plugin {} with methods [{}]",
            id,
            registration.methods.join(", ")
        );
        let entry = RegisteredPlugin {
            registration,
            plugin,
        };
        self.plugins.insert(id.clone(), entry);
        &self.plugins[&id].registration
    }

    pub fn registrations(&self) -> impl Iterator<Item = &PluginRegistration> {
        self.plugins.values().map(|p| &p.registration)
    }

    pub fn cache(&self) -> &PluginCache {
        &self.cache
    }

    /// Cached entry for `method` of plugin `plugin_id`, expired or not
    pub fn cached(&self, plugin_id: &str, method: &str) -> Option<&CacheEntry> {
        let registration = &self.plugins.get(plugin_id)?.registration;
        self.cache.get(&registration.method_key(method))
    }

    /// Forget every cached result; the next [`inject`](Self::inject) calls every method
    pub fn clear_cache(&mut self) {
        tracing::debug!("clearing {} cached plugin results", self.cache.len());
        self.cache.clear();
    }

    pub fn inject(&mut self, tick: Tick, config: &RelayConfig) -> Tick {
        self.inject_at(tick, config, Utc::now())
    }

    /// Splice every plugin method's segment into `tick`, as seen at `now`
    pub fn inject_at(&mut self, mut tick: Tick, config: &RelayConfig, now: DateTime<Utc>) -> Tick {
        let Self {
            plugins,
            cache,
            cache_timeout,
            strict_validation,
        } = self;

        for registered in plugins.values_mut() {
            let registration = &registered.registration;
            for method in &registration.methods {
                let key = registration.method_key(method);

                let (index, segment) = match cache.get_fresh(&key, now) {
                    Some(entry) => (entry.index, entry.segment.clone()),
                    None => {
                        let result = registered.plugin.call(method, &tick, config);
                        let expiry = now + *cache_timeout;
                        let entry = settle(&key, result, expiry, *strict_validation);
                        let pair = (entry.index, entry.segment.clone());
                        cache.insert(key, entry);
                        pair
                    }
                };

                let at = index.min(tick.len());
                tick.insert(at, segment);
            }
        }
        tick
    }
}

/// Turn a raw invocation result into the entry that gets cached
fn settle(
    key: &str,
    result: crate::error::Result<PluginOutput>,
    default_expiry: DateTime<Utc>,
    strict_validation: bool,
) -> CacheEntry {
    let placeholder = CacheEntry {
        index: 0,
        segment: Segment::placeholder(),
        cached_until: default_expiry,
    };

    let PluginOutput { index, mut segment } = match result {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("user method {} failed ({})", key, e);
            return placeholder;
        }
    };
    let cached_until = take_cached_until(&mut segment).unwrap_or(default_expiry);

    let segment = match Segment::validate(segment.clone()) {
        Ok(segment) => segment,
        Err(e) if strict_validation => {
            tracing::error!("injection failed for {} ({})", key, e);
            return placeholder;
        }
        Err(e) => {
            tracing::error!("injection failed for {} ({}), inserting anyway", key, e);
            Segment::lenient(segment)
        }
    };

    CacheEntry {
        index,
        segment,
        cached_until,
    }
}

/// Pull a plugin-chosen expiry out of the segment so it never reaches the bar
fn take_cached_until(segment: &mut Value) -> Option<DateTime<Utc>> {
    let value = segment.as_object_mut()?.shift_remove(CACHED_UNTIL_KEY)?;
    let secs = value.as_f64()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
