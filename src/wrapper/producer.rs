//! Generator subprocess and its reader thread.
//!
//! The reader thread owns the generator's stdout and does nothing but blocking
//! line reads and queue pushes. Everything else (decoding, injection, timing)
//! happens on the Scheduler's side of the queue.

use super::LineSource;
use crate::error::{RelayError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lines buffered between the reader thread and the Scheduler
pub const QUEUE_CAPACITY: usize = 64;

/// How long `stop()` waits for the reader thread before leaving it behind
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Header line and the array opener are forwarded without looking at them
const PREAMBLE_LINES: usize = 2;

#[derive(Debug)]
struct Flags {
    initializing: AtomicBool,
    streaming: AtomicBool,
    stop: AtomicBool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            initializing: AtomicBool::new(true),
            streaming: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }
}

pub struct StatusProducer {
    program: PathBuf,
    args: Vec<OsString>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    sender: Option<Sender<String>>,
    lines: Receiver<String>,
    flags: Arc<Flags>,
}

impl StatusProducer {
    pub fn new<I, A>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let (sender, lines) = bounded(QUEUE_CAPACITY);
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            child: None,
            reader: None,
            sender: Some(sender),
            lines,
            flags: Arc::new(Flags::default()),
        }
    }

    /// Producer running `program -c <config>`
    pub fn for_generator(program: impl Into<PathBuf>, config: &Path) -> Self {
        Self::new(
            program,
            [OsString::from("-c"), config.as_os_str().to_os_string()],
        )
    }

    /// Spawn the generator and start pumping its stdout into the queue
    pub fn start(&mut self) -> Result<()> {
        let sender = self
            .sender
            .take()
            .ok_or_else(|| RelayError::Spawn("producer already started".into()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RelayError::Spawn(format!("cannot run {}: {}", self.program.display(), e))
            })?;
        tracing::info!(
            "started generator {} (pid {})",
            self.program.display(),
            child.id()
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::Spawn("failed to capture generator stdout".into()))?;
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
                    tracing::warn!("generator: {}", line);
                }
            });
        }

        let flags = Arc::clone(&self.flags);
        let reader = thread::Builder::new()
            .name("status-producer".into())
            .spawn(move || {
                pump(BufReader::new(stdout), &sender, &flags);
                tracing::info!("generator output closed");
            })?;

        self.child = Some(child);
        self.reader = Some(reader);
        Ok(())
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

impl LineSource for StatusProducer {
    fn lines(&self) -> &Receiver<String> {
        &self.lines
    }

    fn is_initializing(&self) -> bool {
        self.flags.initializing.load(Ordering::SeqCst)
    }

    fn is_streaming(&self) -> bool {
        self.flags.streaming.load(Ordering::SeqCst)
    }

    fn is_alive(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }

    #[cfg(unix)]
    fn request_refresh(&self) -> Result<()> {
        let Some(pid) = self.pid() else {
            return Ok(());
        };
        // SAFETY: kill(2) with a pid we spawned ourselves and a constant signal
        // number has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGUSR1) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn request_refresh(&self) -> Result<()> {
        tracing::debug!("generator refresh is not supported on this platform");
        Ok(())
    }

    fn stop(&mut self) {
        self.flags.stop.store(true, Ordering::SeqCst);
        let Some(reader) = self.reader.take() else {
            return;
        };

        // The reader may be parked in a blocking read; give it a moment, then
        // leave it to exit on the generator's next line or EOF
        let deadline = Instant::now() + STOP_GRACE;
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            tracing::debug!("producer thread still blocked on read, detaching");
        }
    }
}

fn next_line<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut buf = String::new();
    match reader.read_line(&mut buf) {
        Ok(0) => None,
        Ok(_) => Some(buf.trim_end_matches(['\n', '\r']).to_string()),
        Err(e) => {
            tracing::error!("reading generator output failed ({})", e);
            None
        }
    }
}

/// Read loop of the producer thread; returns on EOF, stop, or a dropped queue
fn pump<R: BufRead>(mut reader: R, sender: &Sender<String>, flags: &Flags) {
    for _ in 0..PREAMBLE_LINES {
        let Some(line) = next_line(&mut reader) else {
            return;
        };
        if sender.send(line).is_err() {
            return;
        }
    }

    while !flags.stop.load(Ordering::SeqCst) {
        let Some(line) = next_line(&mut reader) else {
            break;
        };
        if line.len() > 1 && line.starts_with('[') {
            flags.initializing.store(false, Ordering::SeqCst);
        } else if line.starts_with(",[") {
            flags.streaming.store(true, Ordering::SeqCst);
        }
        if sender.send(line).is_err() {
            break;
        }
    }
}
