//! The relay's main loop.
//!
//! Waits on the generator's line queue and the control channel for at most one
//! tick. A real line is decoded, injected and relayed; a timeout produces a
//! synthetic tick from the last real one with the clock advanced by one tick.

use crate::config::RelayConfig;
use crate::core::protocol::{self, ProtocolLine};
use crate::core::segments::Tick;
use crate::core::transform::TimeTransformer;
use crate::error::Result;
use crate::plugins::InjectionEngine;
use crate::wrapper::{BarOutput, LineSource};
use crossbeam_channel::{never, select, Receiver};
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

/// Out-of-band requests for the Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Drop cached plugin results and ask the generator for fresh output
    ForceRefresh,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    WaitingForLine,
    ProcessingRealLine,
    ProcessingSyntheticLine,
    Shutdown,
}

/// Everything the loop needs besides its input and output, built once at startup
pub struct RelayContext {
    pub config: RelayConfig,
    pub transformer: TimeTransformer,
    pub engine: InjectionEngine,
    pub tick: Duration,
}

impl RelayContext {
    pub fn new(
        config: RelayConfig,
        transformer: TimeTransformer,
        engine: InjectionEngine,
        tick: Duration,
    ) -> Self {
        Self {
            config,
            transformer,
            engine,
            tick,
        }
    }

    /// Clock delta applied to each synthetic tick
    pub fn tick_secs(&self) -> i64 {
        i64::try_from(self.tick.as_secs()).unwrap_or(i64::MAX)
    }
}

enum Wake {
    Line(String),
    Control(ControlEvent),
    ControlClosed,
    Timeout,
    Disconnected,
}

pub struct Scheduler<S: LineSource, W: Write> {
    source: S,
    control: Option<Receiver<ControlEvent>>,
    out: BarOutput<W>,
    ctx: RelayContext,
    forced: bool,
    last: Option<Tick>,
    state: SchedulerState,
}

impl<S: LineSource, W: Write> Scheduler<S, W> {
    pub fn new(
        source: S,
        control: Option<Receiver<ControlEvent>>,
        out: BarOutput<W>,
        ctx: RelayContext,
    ) -> Self {
        Self {
            source,
            control,
            out,
            ctx,
            forced: false,
            last: None,
            state: SchedulerState::WaitingForLine,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    pub fn output(&self) -> &BarOutput<W> {
        &self.out
    }

    pub fn into_output(self) -> BarOutput<W> {
        self.out
    }

    /// Run until shutdown. The source is stopped on the way out, error or not.
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_loop();
        self.state = SchedulerState::Shutdown;
        self.source.stop();
        match &result {
            Ok(()) => tracing::info!(
                "relay stopped after {} lines",
                self.out.lines_written()
            ),
            Err(e) => tracing::error!("relay stopped: {}", e),
        }
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        while self.state != SchedulerState::Shutdown {
            self.step()?;
        }
        Ok(())
    }

    /// One pass through the state machine, starting and ending in `WaitingForLine`
    /// unless shutdown was reached
    pub fn step(&mut self) -> Result<()> {
        self.state = SchedulerState::WaitingForLine;
        let started = Instant::now();

        match self.wait() {
            Wake::Line(raw) => {
                self.state = SchedulerState::ProcessingRealLine;
                self.compensate(started);
                self.relay_real(&raw)?;
            }
            Wake::Timeout => {
                self.state = SchedulerState::ProcessingSyntheticLine;
                self.relay_synthetic()?;
            }
            Wake::Control(ControlEvent::ForceRefresh) => self.force_refresh(),
            Wake::Control(ControlEvent::Shutdown) => {
                tracing::info!("shutdown requested");
                self.state = SchedulerState::Shutdown;
            }
            Wake::ControlClosed => {
                tracing::debug!("control channel closed");
                self.control = None;
            }
            Wake::Disconnected => {
                tracing::info!("generator finished");
                self.state = SchedulerState::Shutdown;
            }
        }

        if self.state != SchedulerState::Shutdown {
            self.state = SchedulerState::WaitingForLine;
        }
        Ok(())
    }

    fn wait(&self) -> Wake {
        let closed = never();
        let control = self.control.as_ref().unwrap_or(&closed);
        select! {
            recv(self.source.lines()) -> msg => match msg {
                Ok(line) => Wake::Line(line),
                Err(_) => Wake::Disconnected,
            },
            recv(control) -> msg => match msg {
                Ok(event) => Wake::Control(event),
                Err(_) => Wake::ControlClosed,
            },
            default(self.ctx.tick) => Wake::Timeout,
        }
    }

    /// A slow generator would otherwise have its real lines land right after
    /// our synthetic ones; hold them back to the tick boundary
    fn compensate(&mut self, started: Instant) {
        let slow_generator = self.ctx.config.interval > self.ctx.tick.as_secs();
        if self.source.is_streaming() && !self.forced && slow_generator {
            thread::sleep(self.ctx.tick.saturating_sub(started.elapsed()));
        } else {
            self.forced = false;
        }
    }

    fn relay_real(&mut self, raw: &str) -> Result<()> {
        match protocol::classify(raw)? {
            ProtocolLine::Element {
                leading_comma,
                tick,
            } => {
                let tick = self.ctx.transformer.apply(tick, 0);
                self.last = Some(tick.clone());
                self.emit(tick, leading_comma)
            }
            line => self.out.write_line(&protocol::serialize(&line)?),
        }
    }

    fn relay_synthetic(&mut self) -> Result<()> {
        let ready = self.source.is_streaming() || !self.source.is_initializing();
        match self.last.take() {
            Some(base) if ready => {
                let base = self.ctx.transformer.apply(base, self.ctx.tick_secs());
                self.last = Some(base.clone());
                self.emit(base, true)?;
            }
            base => {
                self.last = base;
                tracing::info!("waiting for generator");
            }
        }

        if !self.source.is_alive() {
            tracing::info!("generator is gone");
            self.state = SchedulerState::Shutdown;
        }
        Ok(())
    }

    fn emit(&mut self, tick: Tick, leading_comma: bool) -> Result<()> {
        let tick = self.ctx.engine.inject(tick, &self.ctx.config);
        let line = protocol::serialize(&ProtocolLine::Element {
            leading_comma,
            tick,
        })?;
        self.out.write_line(&line)
    }

    fn force_refresh(&mut self) {
        tracing::info!("forced refresh requested");
        if let Err(e) = self.source.request_refresh() {
            tracing::warn!("could not forward refresh to generator ({})", e);
        }
        self.ctx.engine.clear_cache();
        self.forced = true;
    }
}
