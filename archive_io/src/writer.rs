//! Buffered sequential writes to a file.
//!
//! `FileWriter` stages small writes in one buffer and hands them to the
//! handle when the buffer overflows, on `flush`, before a seek and on close.
//!
//! # Example
//! ```no_run
//! use archive_io::{FileWriter, TracingSink};
//! use archive_runtime::{FileHandle, OpenMode, OsRuntime};
//! use std::sync::Arc;
//!
//! let handle = FileHandle::open(Arc::new(OsRuntime::new()), "save.dat", OpenMode::Write).unwrap();
//! let mut writer: FileWriter = FileWriter::new(handle, Arc::new(TracingSink));
//! writer.serialize(b"Hello, world!");
//! writer.close().unwrap();
//! ```

use std::sync::Arc;

use archive_runtime::{Errno, FileHandle, SeekOrigin};
use embedded_io::SeekFrom;
use tracing::{debug, trace, warn};

use crate::archive::{Archive, ArchiveFlags};
use crate::error::{ArchiveError, StickyError};
use crate::sink::ErrorSink;

pub const WRITE_BUFFER_SIZE: usize = 4096;

pub struct FileWriter<const CAP: usize = WRITE_BUFFER_SIZE> {
    handle: FileHandle,
    sink: Arc<dyn ErrorSink>,
    pos: u64,
    buffer_count: usize,
    error: StickyError,
    buffer: [u8; CAP],
}

impl<const CAP: usize> FileWriter<CAP> {
    const CAPACITY_IS_NOT_ZERO: () = assert!(CAP > 0, "write buffer capacity must not be zero");

    pub fn new(handle: FileHandle, sink: Arc<dyn ErrorSink>) -> Self {
        let () = Self::CAPACITY_IS_NOT_ZERO;
        debug!(fd = ?handle.fd(), "file writer open");
        Self {
            handle,
            sink,
            pos: 0,
            buffer_count: 0,
            error: StickyError::default(),
            buffer: [0; CAP],
        }
    }

    /// Logical cursor, including bytes that are only staged.
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_set()
    }

    #[must_use]
    pub fn error(&self) -> &StickyError {
        &self.error
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Bytes accepted by `serialize` that have not reached the handle yet.
    #[must_use]
    pub fn staged(&self) -> &[u8] {
        &self.buffer[..self.buffer_count]
    }

    /// Flush, then reposition. The cursor moves even if the handle refuses.
    ///
    /// A target that is not a valid file offset is rejected before anything
    /// is flushed, and the cursor stays put.
    pub fn seek(&mut self, pos: u64) {
        let Ok(offset) = i64::try_from(pos) else {
            self.fail(ArchiveError::InvalidSeek(format!(
                "{pos} does not fit a file offset"
            )));
            return;
        };
        self.flush();
        trace!(fd = ?self.handle.fd(), pos, "seek");
        if let Err(Errno(errno)) = self.handle.seek(offset, SeekOrigin::Start) {
            self.fail(ArchiveError::SeekFailure {
                target: pos,
                detail: None,
                errno,
            });
        }
        self.pos = pos;
    }

    /// Stage `data`, flushing every time the buffer fills up. The tail that
    /// fits stays staged.
    pub fn serialize(&mut self, mut data: &[u8]) {
        self.pos += data.len() as u64;
        loop {
            let free = CAP - self.buffer_count;
            if data.len() <= free {
                break;
            }
            let (head, tail) = data.split_at(free);
            self.buffer[self.buffer_count..].copy_from_slice(head);
            self.buffer_count = CAP;
            data = tail;
            self.flush();
        }
        if !data.is_empty() {
            let end = self.buffer_count + data.len();
            self.buffer[self.buffer_count..end].copy_from_slice(data);
            self.buffer_count = end;
        }
    }

    /// Hand staged bytes to the handle in one write.
    ///
    /// The staged count is reset even when the write fails: those bytes are
    /// lost and the failure is recorded.
    pub fn flush(&mut self) {
        if self.buffer_count > 0 {
            let count = self.buffer_count;
            let result = self.handle.write(&self.buffer[..count]);
            trace!(fd = ?self.handle.fd(), count, result = ?result, "flush");
            match result {
                Ok(n) if n == count => {}
                Ok(_) => {
                    let errno = self.handle.last_errno();
                    self.fail(ArchiveError::ShortWrite {
                        requested: count,
                        errno,
                    });
                }
                Err(Errno(errno)) => self.fail(ArchiveError::ShortWrite {
                    requested: count,
                    errno,
                }),
            }
        }
        self.buffer_count = 0;
    }

    /// Flush and release the handle. Can be called multiple times.
    ///
    /// # Errors
    /// Returns the first failure recorded during the writer's lifetime.
    pub fn close(&mut self) -> Result<(), ArchiveError> {
        self.flush();
        if self.handle.is_open() {
            let fd = self.handle.fd();
            if let Err(Errno(errno)) = self.handle.close() {
                self.fail(ArchiveError::CloseFailure { errno });
            }
            debug!(fd = ?fd, pos = self.pos, failures = self.error.count(), "file writer closed");
        }
        self.error.verdict()
    }

    fn fail(&mut self, error: ArchiveError) {
        self.sink.logf(format_args!("{error}"));
        self.error.record(error);
    }

    fn new_failure(&self, before: usize) -> Option<ArchiveError> {
        if self.error.count() > before {
            self.error.last().cloned()
        } else {
            None
        }
    }
}

impl<const CAP: usize> Drop for FileWriter<CAP> {
    fn drop(&mut self) {
        if self.handle.is_open() {
            if let Err(e) = self.close() {
                warn!(error = %e, "file writer dropped after a failure");
            }
        }
    }
}

impl<const CAP: usize> Archive for FileWriter<CAP> {
    fn serialize(&mut self, data: &mut [u8]) {
        FileWriter::<CAP>::serialize(self, data);
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) {
        FileWriter::<CAP>::seek(self, pos);
    }

    fn flush(&mut self) {
        FileWriter::<CAP>::flush(self);
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        FileWriter::<CAP>::close(self)
    }

    fn is_error(&self) -> bool {
        self.error.is_set()
    }

    fn flags(&self) -> ArchiveFlags {
        ArchiveFlags::FILE_SAVER
    }
}

impl<const CAP: usize> embedded_io::ErrorType for FileWriter<CAP> {
    type Error = ArchiveError;
}

impl<const CAP: usize> embedded_io::Write for FileWriter<CAP> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let failures = self.error.count();
        FileWriter::<CAP>::serialize(self, buf);
        self.new_failure(failures).map_or(Ok(buf.len()), Err)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let failures = self.error.count();
        FileWriter::<CAP>::flush(self);
        self.new_failure(failures).map_or(Ok(()), Err)
    }
}

impl<const CAP: usize> embedded_io::Seek for FileWriter<CAP> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(_) => {
                return Err(ArchiveError::InvalidSeek(
                    "a file writer does not track the end of the file".to_string(),
                ))
            }
        };
        let Some(target) = target else {
            return Err(ArchiveError::InvalidSeek(format!("{pos:?} is before the start")));
        };
        let failures = self.error.count();
        FileWriter::<CAP>::seek(self, target);
        self.new_failure(failures).map_or(Ok(target), Err)
    }
}

impl<const CAP: usize> core::fmt::Debug for FileWriter<CAP> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileWriter")
            .field("handle", &self.handle)
            .field("pos", &self.pos)
            .field("buffer_count", &self.buffer_count)
            .field("failures", &self.error.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_runtime::{FileRuntime, OpenMode};
    use archive_runtime_mocked::Vfs;

    struct Quiet;

    impl ErrorSink for Quiet {
        fn logf(&self, _args: std::fmt::Arguments<'_>) {}
    }

    fn writer<const CAP: usize>() -> (Arc<Vfs>, FileWriter<CAP>) {
        let vfs = Arc::new(Vfs::new());
        let rt: Arc<dyn FileRuntime> = vfs.clone();
        let handle = FileHandle::open(rt, "out", OpenMode::Write).unwrap();
        (vfs, FileWriter::new(handle, Arc::new(Quiet)))
    }

    #[test]
    fn exact_fill_stays_staged() {
        let (vfs, mut w) = writer::<8>();
        w.serialize(&[1; 8]);
        assert_eq!(w.staged(), &[1u8; 8]);
        assert!(vfs.writes().is_empty());

        w.serialize(&[2]);
        assert_eq!(vfs.writes(), vec![8]);
        assert_eq!(w.staged(), &[2u8]);
    }

    #[test]
    fn staged_bytes_are_the_newest_tail() {
        let (_vfs, mut w) = writer::<8>();
        w.serialize(b"abcdef");
        w.serialize(b"ghijk");
        assert_eq!(w.staged(), b"ijk");
        assert_eq!(w.tell(), 11);
    }

    #[test]
    fn flush_with_nothing_staged_issues_no_write() {
        let (vfs, mut w) = writer::<8>();
        w.flush();
        w.flush();
        assert!(vfs.writes().is_empty());
    }

    #[test]
    fn offset_beyond_i64_keeps_the_cursor() {
        let (vfs, mut w) = writer::<8>();
        w.serialize(b"ab");
        w.seek(u64::MAX);

        assert!(w.is_error());
        assert_eq!(w.tell(), 2);
        assert_eq!(w.staged(), b"ab");
        assert!(vfs.writes().is_empty());

        w.serialize(b"c");
        assert_eq!(w.tell(), 3);
        assert!(matches!(w.close(), Err(ArchiveError::InvalidSeek(_))));
    }
}
