//! Plugins compute extra bar segments that get spliced into every tick.
//!
//! The relay never loads code itself: a loader (see [`loader`]) resolves
//! plugins into values implementing [`Plugin`], and the
//! [`InjectionEngine`](engine::InjectionEngine) only deals with those.

pub mod cache;
pub mod command;
pub mod engine;
pub mod loader;

pub use cache::{CacheEntry, PluginCache};
pub use command::CommandPlugin;
pub use engine::InjectionEngine;
pub use loader::load_plugins;

use crate::config::RelayConfig;
use crate::core::segments::Segment;
use crate::error::Result;
use serde_json::Value;

/// What a plugin method hands back: where to insert, and the raw block
#[derive(Debug, Clone, PartialEq)]
pub struct PluginOutput {
    pub index: usize,
    pub segment: Value,
}

impl PluginOutput {
    pub fn new(index: usize, segment: Value) -> Self {
        Self { index, segment }
    }
}

/// A resolved plugin: a fixed, ordered set of methods that each produce one segment
pub trait Plugin {
    /// Stable identifier; plugins run in lexicographic order of their ids
    fn id(&self) -> &str;

    /// Method names, in the order they should run
    fn methods(&self) -> Vec<String>;

    /// Invoke `method` with the tick built so far and the generator settings
    fn call(&mut self, method: &str, tick: &[Segment], config: &RelayConfig)
        -> Result<PluginOutput>;
}

/// Snapshot of a plugin's identity taken once at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRegistration {
    pub id: String,
    pub methods: Vec<String>,
}

impl PluginRegistration {
    pub fn of(plugin: &dyn Plugin) -> Self {
        let mut methods: Vec<String> = Vec::new();
        for method in plugin.methods() {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Self {
            id: plugin.id().to_string(),
            methods,
        }
    }

    /// Cache key of one of this plugin's methods
    pub fn method_key(&self, method: &str) -> String {
        format!("{}::{}", self.id, method)
    }
}
