//! Clock refresh between generator ticks.
//!
//! The generator only prints a new time every `interval` seconds. Between
//! those lines the relay advances the `time`/`tztime` blocks itself by parsing
//! their text with the generator's `time_format` and adding the elapsed delta.

use crate::core::segments::{Segment, Tick};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct TimeTransformer {
    time_format: String,
    enabled: bool,
    /// Blocks whose last shift failed; repeats of the same failure log at debug
    failing: RefCell<BTreeSet<String>>,
}

impl TimeTransformer {
    pub fn new(time_format: impl Into<String>, enabled: bool) -> Self {
        Self {
            time_format: time_format.into(),
            enabled,
            failing: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn time_format(&self) -> &str {
        &self.time_format
    }

    /// Whether the last shift of this block (`name` or `name:instance`) failed
    pub fn is_failing(&self, block: &str) -> bool {
        self.failing.borrow().contains(block)
    }

    /// Advance every clock segment of `tick` by `delta_seconds`.
    ///
    /// A segment whose text does not match the pattern is logged and left
    /// alone; the rest of the tick is still processed.
    pub fn apply(&self, mut tick: Tick, delta_seconds: i64) -> Tick {
        if !self.enabled {
            return tick;
        }
        let mut failing = self.failing.borrow_mut();
        for segment in tick.iter_mut().filter(|s| s.is_clock()) {
            let block = block_id(segment);
            match self.shift(segment, delta_seconds) {
                Ok(()) => {
                    failing.remove(&block);
                }
                Err(e) if failing.contains(&block) => {
                    tracing::debug!("transformation failed for '{}' ({})", block, e);
                }
                Err(e) => {
                    tracing::error!("transformation failed for '{}' ({})", block, e);
                    failing.insert(block);
                }
            }
        }
        tick
    }

    fn shift(&self, segment: &mut Segment, delta_seconds: i64) -> Result<(), String> {
        let text = segment
            .full_text()
            .ok_or_else(|| "missing 'full_text' key".to_string())?;
        let shifted = shift_text(text, &self.time_format, delta_seconds)?;
        segment.set_full_text(shifted);
        if delta_seconds > 0 {
            segment.mark_transformed();
        }
        Ok(())
    }
}

fn block_id(segment: &Segment) -> String {
    let name = segment.name().unwrap_or_default();
    match segment.get("instance").and_then(|v| v.as_str()) {
        Some(instance) => format!("{}:{}", name, instance),
        None => name.to_string(),
    }
}

/// Parse `text` with `format`, add `delta_seconds`, and format it back.
///
/// Patterns with both date and time, time only, or date only are accepted.
pub fn shift_text(text: &str, format: &str, delta_seconds: i64) -> Result<String, String> {
    let delta = Duration::try_seconds(delta_seconds)
        .ok_or_else(|| format!("delta of {}s out of range", delta_seconds))?;
    let mut out = String::new();

    let written = if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
        let shifted = datetime
            .checked_add_signed(delta)
            .ok_or_else(|| "date out of range".to_string())?;
        write!(out, "{}", shifted.format(format))
    } else if let Ok(time) = NaiveTime::parse_from_str(text, format) {
        let (shifted, _) = time.overflowing_add_signed(delta);
        write!(out, "{}", shifted.format(format))
    } else if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        let shifted = date
            .checked_add_signed(delta)
            .ok_or_else(|| "date out of range".to_string())?;
        write!(out, "{}", shifted.format(format))
    } else {
        return Err(format!("'{}' does not match '{}'", text, format));
    };

    written.map_err(|_| format!("cannot format with '{}'", format))?;
    Ok(out)
}
