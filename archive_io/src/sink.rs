//! Destinations for the diagnostics archives emit when something fails.
//!
//! Streams hold a shared `Arc<dyn ErrorSink>` and never own the device
//! behind it. Sinks are infallible: a message that cannot be delivered is
//! dropped.

use std::fmt;
use std::io::Write;

use parking_lot::Mutex;

pub trait ErrorSink: Send + Sync {
    /// Deliver one formatted message.
    fn logf(&self, args: fmt::Arguments<'_>);
}

/// Forwards every message to `tracing::error!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn logf(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "archive_io", "{args}");
    }
}

/// Writes one line per message to any `std::io::Write`.
pub struct WriteSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriteSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl WriteSink<std::io::Stderr> {
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ErrorSink for WriteSink<W> {
    fn logf(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{args}");
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_sink_appends_lines() {
        let sink = WriteSink::new(Vec::new());
        sink.logf(format_args!("seek failed"));
        sink.logf(format_args!("read beyond end of file {}+{}/{}", 10, 1, 10));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "seek failed\nread beyond end of file 10+1/10\n");
    }

    #[test]
    fn tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.logf(format_args!("write failed"));
    }
}
