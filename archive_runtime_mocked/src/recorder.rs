//! A writer implementation that stores written data in memory for later inspection.
//!
//! # Example
//! ```
//! use archive_runtime_mocked::Recorder;
//! use std::io::Write;
//!
//! let mut writer = Recorder::new();
//! writer.write_all(b"seek failed\n").unwrap();
//! assert_eq!(writer.lines(), vec!["seek failed".to_string()]);
//! ```

use std::io::{Result, Write};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).to_string()
    }

    /// Recorded output split into lines, without terminators.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.get_output().lines().map(str::to_string).collect()
    }
}
