//! Plugins backed by external commands.
//!
//! Each method is a program. It gets a JSON request on stdin:
//!
//! ```json
//! {"method": "status", "tick": [...], "config": {...}}
//! ```
//!
//! and must print `[index, {"name": ..., "full_text": ...}]` on stdout. A
//! non-zero exit, a reply that does not parse, or running past the timeout
//! all count as a failed invocation.

use super::{Plugin, PluginOutput};
use crate::config::RelayConfig;
use crate::core::segments::Segment;
use crate::error::{RelayError, Result};
use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Extra wait for stderr once stdout is in; it only feeds error messages
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// One `[[methods]]` table of a plugin manifest
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MethodSpec {
    pub name: String,
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct Request<'a> {
    method: &'a str,
    tick: &'a [Segment],
    config: &'a RelayConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    Pair(usize, Value),
    Object { index: usize, segment: Value },
}

impl From<Reply> for PluginOutput {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Pair(index, segment) | Reply::Object { index, segment } => {
                PluginOutput::new(index, segment)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandPlugin {
    id: String,
    methods: Vec<MethodSpec>,
    timeout: Duration,
}

impl CommandPlugin {
    pub fn new(id: impl Into<String>, methods: Vec<MethodSpec>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            methods,
            timeout,
        }
    }

    fn spawn(&self, spec: &MethodSpec) -> Result<Child> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Let the command know who is calling it
        cmd.env("STATUSRELAY_PLUGIN", &self.id);
        cmd.env("STATUSRELAY_METHOD", &spec.name);
        cmd.env("STATUSRELAY_VERSION", env!("CARGO_PKG_VERSION"));

        // Own process group, so a timeout can take down whatever the command forked
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn().map_err(|e| {
            RelayError::plugin(
                &spec.name,
                format!("cannot run {}: {}", spec.command.display(), e),
            )
        })
    }

    fn timed_out(&self, method: &str) -> RelayError {
        RelayError::plugin(method, format!("timed out after {}s", self.timeout.as_secs()))
    }

    /// Wait for `child` until `deadline`, killing its process group once it passes
    fn wait_with_deadline(
        &self,
        child: &mut Child,
        method: &str,
        deadline: Instant,
    ) -> Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                kill_process_group(child);
                return Err(self.timed_out(method));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Plugin for CommandPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn methods(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.clone()).collect()
    }

    fn call(&mut self, method: &str, tick: &[Segment], config: &RelayConfig) -> Result<PluginOutput> {
        let spec = self
            .methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| RelayError::plugin(method, "no such method"))?;

        let request = serde_json::to_vec(&Request {
            method,
            tick,
            config,
        })?;

        let deadline = Instant::now() + self.timeout;
        let mut child = self.spawn(spec)?;
        let stdin = child.stdin.take();

        // Pipes are pumped on their own threads so a chatty or stubborn
        // command cannot block us past the deadline. A forked helper may keep
        // them open after the command itself exits; those threads are left behind.
        thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&request);
            }
        });
        let stdout = collect(child.stdout.take());
        let stderr = collect(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, method, deadline)?;
        let Ok(output) = stdout.recv_deadline(deadline) else {
            kill_process_group(&mut child);
            return Err(self.timed_out(method));
        };
        let errors = stderr.recv_timeout(STDERR_GRACE).unwrap_or_default();

        if !status.success() {
            let detail = errors.trim();
            return Err(RelayError::plugin(
                method,
                if detail.is_empty() {
                    format!("exited with {}", status)
                } else {
                    format!("exited with {}: {}", status, detail)
                },
            ));
        }

        let reply: Reply = serde_json::from_str(output.trim()).map_err(|e| {
            RelayError::plugin(method, format!("bad reply ({}): {}", e, output.trim()))
        })?;
        Ok(reply.into())
    }
}

/// Read `pipe` to the end on a helper thread; the text arrives on the channel
fn collect<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill(2) on the group led by a child we spawned with
        // process_group(0); no memory is involved.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
