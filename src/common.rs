// Licensed under the Apache-2.0 license

//! Logging plumbing shared by the bus engines and the console bridge.
//!
//! Engines take a `Logger` type parameter that defaults to [`NoOpLogger`], so
//! builds that never attach a console pay nothing for the log calls.
//!
//! When the console is owned by someone else (the bridge owns its UART), use
//! [`LogBuffer`]: the owner copies [`Logger::buffered`] out at a convenient
//! point and then calls [`Logger::clear_buffered`].

use embedded_io::Write;
use heapless::Vec;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);

    /// Log text held back for the console owner, one `\n`-terminated line
    /// per message. Loggers that write directly return nothing.
    fn buffered(&self) -> &[u8] {
        &[]
    }

    fn clear_buffered(&mut self) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Writes log lines to a byte-stream console.
///
/// Each message is terminated with `\r\n`. Write failures are dropped: a
/// broken console must never stall a bus transaction.
pub struct ConsoleLogger<W: Write> {
    console: W,
    debug_enabled: bool,
}

impl<W: Write> ConsoleLogger<W> {
    pub fn new(console: W) -> Self {
        Self {
            console,
            debug_enabled: true,
        }
    }

    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_enabled = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.console
    }

    fn line(&mut self, prefix: &[u8], msg: &str) {
        let _ = self.console.write_all(prefix);
        let _ = self.console.write_all(msg.as_bytes());
        let _ = self.console.write_all(b"\r\n");
    }
}

impl<W: Write> Logger for ConsoleLogger<W> {
    fn debug(&mut self, msg: &str) {
        if self.debug_enabled {
            self.line(b"", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        self.line(b"ERR: ", msg);
    }
}

/// Collects log lines in a fixed byte buffer until the console owner
/// drains them.
///
/// Messages that do not fit are dropped whole and counted.
pub struct LogBuffer<const N: usize> {
    bytes: Vec<u8, N>,
    dropped: u32,
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LogBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            dropped: 0,
        }
    }

    /// Messages lost to a full buffer since creation.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn line(&mut self, prefix: &[u8], msg: &str) {
        let len = prefix.len() + msg.len() + 1;
        if self.bytes.capacity() - self.bytes.len() < len {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        // Cannot fail, space was checked above.
        let _ = self.bytes.extend_from_slice(prefix);
        let _ = self.bytes.extend_from_slice(msg.as_bytes());
        let _ = self.bytes.push(b'\n');
    }
}

impl<const N: usize> Logger for LogBuffer<N> {
    fn debug(&mut self, msg: &str) {
        self.line(b"", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line(b"ERR: ", msg);
    }

    fn buffered(&self) -> &[u8] {
        &self.bytes
    }

    fn clear_buffered(&mut self) {
        self.bytes.clear();
    }
}
