pub mod output;
pub mod producer;

pub use output::BarOutput;
pub use producer::StatusProducer;

use crate::error::{RelayError, Result};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};

/// Default generator program
pub const GENERATOR_PROGRAM: &str = "i3status";

/// Where the Scheduler gets generator lines from
pub trait LineSource {
    /// Raw lines in arrival order; disconnects once the source has finished
    fn lines(&self) -> &Receiver<String>;

    /// Still before the first array line
    fn is_initializing(&self) -> bool;

    /// First full tick (`,[`) observed
    fn is_streaming(&self) -> bool;

    fn is_alive(&self) -> bool;

    /// Ask the generator to refresh its own output
    fn request_refresh(&self) -> Result<()>;

    /// Best-effort stop; must not block indefinitely
    fn stop(&mut self);
}

/// Find the generator executable: an explicit path, PATH, then common locations
pub fn find_generator(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.components().count() > 1 {
            return if path.exists() {
                Ok(path.to_path_buf())
            } else {
                Err(RelayError::Spawn(format!(
                    "generator not found at {}",
                    path.display()
                )))
            };
        }
        return which::which(path).map_err(|e| {
            RelayError::Spawn(format!("generator {} not found in PATH: {}", path.display(), e))
        });
    }

    match which::which(GENERATOR_PROGRAM) {
        Ok(path) => Ok(path),
        Err(_) => {
            let paths = ["/usr/local/bin/i3status", "/usr/bin/i3status"];
            for path in paths {
                let p = PathBuf::from(path);
                if p.exists() {
                    return Ok(p);
                }
            }

            Err(RelayError::Spawn(
                "i3status executable not found in PATH or common locations".into(),
            ))
        }
    }
}
