use crate::error::{RelayError, Result};
use std::io::Write;

/// Unbuffered line writer for the bar consumer
pub struct BarOutput<W: Write> {
    inner: W,
    lines_written: u64,
}

impl<W: Write> BarOutput<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            lines_written: 0,
        }
    }

    /// Write one protocol line and flush, so the bar sees it immediately
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.inner
            .write_all(line.as_bytes())
            .and_then(|_| self.inner.write_all(b"\n"))
            .and_then(|_| self.inner.flush())
            .map_err(RelayError::from_write)?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
