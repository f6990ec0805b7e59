//! Shared fixtures for scheduler tests.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use statusrelay::config::RelayConfig;
use statusrelay::core::segments::Segment;
use statusrelay::core::{RelayContext, Scheduler, TimeTransformer};
use statusrelay::error::{RelayError, Result};
use statusrelay::plugins::{InjectionEngine, Plugin, PluginOutput};
use statusrelay::wrapper::{BarOutput, LineSource};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const HEADER: &str = r#"{"version":1}"#;

/// A line source fed from a channel, with flags the test controls
pub struct ScriptedSource {
    lines: Receiver<String>,
    pub initializing: bool,
    pub streaming: bool,
    /// `is_alive()` answers true this many more times, then false
    pub alive_checks: Cell<usize>,
    pub refreshes: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(lines: Receiver<String>) -> Self {
        Self {
            lines,
            initializing: false,
            streaming: true,
            alive_checks: Cell::new(usize::MAX),
            refreshes: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Source that has already queued `lines` and then finished
    pub fn finished(lines: &[&str]) -> Self {
        let (tx, rx) = unbounded();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        Self::new(rx)
    }

    /// Source with `lines` queued whose sender stays open, so the Scheduler
    /// keeps producing synthetic ticks until `is_alive` turns false
    pub fn stalled(lines: &[&str], alive_checks: usize) -> (Self, Sender<String>) {
        let (tx, rx) = unbounded();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        let source = Self::new(rx);
        source.alive_checks.set(alive_checks);
        (source, tx)
    }
}

impl LineSource for ScriptedSource {
    fn lines(&self) -> &Receiver<String> {
        &self.lines
    }

    fn is_initializing(&self) -> bool {
        self.initializing
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn is_alive(&self) -> bool {
        let left = self.alive_checks.get();
        if left == 0 {
            return false;
        }
        self.alive_checks.set(left - 1);
        true
    }

    fn request_refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// In-process plugin with a single method returning a fixed segment,
/// counting its invocations
pub struct CountingPlugin {
    pub id: String,
    pub method: String,
    pub index: usize,
    pub segment: Value,
    pub fail: bool,
    pub calls: Rc<Cell<usize>>,
}

impl CountingPlugin {
    pub fn new(id: &str, method: &str, index: usize, segment: Value) -> Self {
        Self {
            id: id.to_string(),
            method: method.to_string(),
            index,
            segment,
            fail: false,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing(id: &str, method: &str) -> Self {
        let mut plugin = Self::new(id, method, 0, Value::Null);
        plugin.fail = true;
        plugin
    }
}

impl Plugin for CountingPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn methods(&self) -> Vec<String> {
        vec![self.method.clone()]
    }

    fn call(&mut self, method: &str, _tick: &[Segment], _config: &RelayConfig) -> Result<PluginOutput> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(RelayError::plugin(method, "boom"));
        }
        let mut segment = self.segment.clone();
        if let Some(text) = segment.get_mut("full_text") {
            // Make each invocation distinguishable
            *text = Value::String(format!(
                "{}#{}",
                text.as_str().unwrap_or_default(),
                self.calls.get()
            ));
        }
        Ok(PluginOutput::new(self.index, segment))
    }
}

/// Generator settings that never trigger the slow-generator compensation
pub fn fast_config() -> RelayConfig {
    RelayConfig {
        interval: 1,
        output_format: Some("i3bar".to_string()),
        ..RelayConfig::default()
    }
}

pub fn context(config: RelayConfig, engine: InjectionEngine, tick: Duration) -> RelayContext {
    let transformer = TimeTransformer::new(config.time_format.clone(), true);
    RelayContext::new(config, transformer, engine, tick)
}

pub fn build_scheduler(
    source: ScriptedSource,
    control: Option<Receiver<statusrelay::core::ControlEvent>>,
    ctx: RelayContext,
) -> Scheduler<ScriptedSource, Vec<u8>> {
    Scheduler::new(source, control, BarOutput::new(Vec::new()), ctx)
}

/// Emitted lines, without trailing newlines
pub fn output_lines(scheduler: Scheduler<ScriptedSource, Vec<u8>>) -> Vec<String> {
    let bytes = scheduler.into_output().into_inner();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Decode an element line, dropping the optional leading comma
pub fn element(line: &str) -> Vec<Value> {
    serde_json::from_str(line.strip_prefix(',').unwrap_or(line)).unwrap()
}
