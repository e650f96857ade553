//! In-memory scripted transport.
//!
//! `ScriptedPort` replays queued bytes and records everything written to it.
//! It can fragment reads, insert empty polls between them and answer writes
//! through a responder closure, which is enough to simulate a sensor module
//! without hardware.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::port::Port;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// Scripted, hardware-free [`Port`].
pub struct ScriptedPort {
    name: String,
    incoming: VecDeque<u8>,
    read_limit: Option<usize>,
    idle_reads: usize,
    idle_countdown: usize,
    write_limit: Option<usize>,
    written: Vec<u8>,
    responder: Option<Responder>,
    read_calls: usize,
    open_history: Vec<u32>,
    close_calls: usize,
    is_open: bool,
    fail_open: bool,
}

impl ScriptedPort {
    /// Create an empty port that returns no data.
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            incoming: VecDeque::new(),
            read_limit: None,
            idle_reads: 0,
            idle_countdown: 0,
            write_limit: None,
            written: Vec::new(),
            responder: None,
            read_calls: 0,
            open_history: Vec::new(),
            close_calls: 0,
            is_open: false,
            fail_open: false,
        }
    }

    /// Return at most `limit` bytes per read.
    #[must_use]
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    /// Insert `count` empty reads before every read that returns data.
    #[must_use]
    pub fn with_idle_reads(mut self, count: usize) -> Self {
        self.idle_reads = count;
        self.idle_countdown = count;
        self
    }

    /// Accept at most `limit` bytes per write.
    #[must_use]
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Answer every write with the bytes returned by `responder`.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Make every `open` call fail.
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Queue bytes to be returned by subsequent reads.
    pub fn push_incoming(&mut self, bytes: &[u8]) {
        self.incoming
            .extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet read.
    pub fn pending_incoming(&self) -> usize {
        self.incoming.len()
    }

    /// Everything written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Take and clear the written bytes.
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }

    /// Number of read calls, including empty ones.
    pub fn read_calls(&self) -> usize {
        self.read_calls
    }

    /// Baud rates passed to `open`, in order.
    pub fn open_history(&self) -> &[u32] {
        &self.open_history
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    /// Whether the port is currently open.
    pub fn is_open(&self) -> bool {
        self.is_open
    }
}

impl Default for ScriptedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedPort")
            .field("name", &self.name)
            .field("pending", &self.incoming.len())
            .field("written", &self.written.len())
            .field("read_calls", &self.read_calls)
            .field("is_open", &self.is_open)
            .finish_non_exhaustive()
    }
}

impl Port for ScriptedPort {
    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        self.read_calls += 1;

        if self.idle_countdown > 0 {
            self.idle_countdown -= 1;
            return Ok(0);
        }

        let n = buf
            .len()
            .min(self.incoming.len())
            .min(self.read_limit.unwrap_or(usize::MAX));
        for slot in buf.iter_mut().take(n) {
            // n never exceeds the queue length
            *slot = self.incoming.pop_front().unwrap_or_default();
        }
        if n > 0 {
            self.idle_countdown = self.idle_reads;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize> {
        let n = buf
            .len()
            .min(self.write_limit.unwrap_or(usize::MAX));
        self.written
            .extend_from_slice(&buf[..n]);
        if n > 0 {
            if let Some(responder) = self.responder.as_mut() {
                let reply = responder(&buf[..n]);
                self.incoming.extend(reply);
            }
        }
        Ok(n)
    }

    fn open(&mut self, baud_rate: u32) -> Result<()> {
        self.open_history.push(baud_rate);
        if self.fail_open {
            return Err(Error::Transport(format!("{}: cannot open", self.name)));
        }
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.is_open = false;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
