//! Buffered read access to a file of known size.
//!
//! `FileReader` keeps one read-ahead buffer whose refills never cross a
//! capacity-aligned boundary of the file. Requests at least as large as the
//! buffer bypass it and land directly in the caller's slice.
//!
//! # Example
//!
//! ```no_run
//! use archive_io::{FileReader, TracingSink};
//! use archive_runtime::{FileHandle, OpenMode, OsRuntime};
//! use std::sync::Arc;
//!
//! let mut handle = FileHandle::open(Arc::new(OsRuntime::new()), "level.dat", OpenMode::Read).unwrap();
//! let size = handle.size().unwrap();
//! let mut reader: FileReader = FileReader::new(handle, Arc::new(TracingSink), size);
//!
//! let mut magic = [0u8; 4];
//! reader.serialize(&mut magic);
//! assert!(reader.close().is_ok());
//! ```

use std::sync::Arc;

use archive_runtime::{Errno, FileHandle, SeekOrigin};
use embedded_io::SeekFrom;
use tracing::{debug, trace, warn};

use crate::archive::{Archive, ArchiveFlags};
use crate::error::{ArchiveError, SeekDetail, StickyError};
use crate::sink::ErrorSink;

pub const READ_BUFFER_SIZE: usize = 1024;

pub struct FileReader<const CAP: usize = READ_BUFFER_SIZE> {
    handle: FileHandle,
    sink: Arc<dyn ErrorSink>,
    size: u64,
    pos: u64,
    buffer_base: u64,
    buffer_count: usize,
    error: StickyError,
    buffer: [u8; CAP],
}

impl<const CAP: usize> FileReader<CAP> {
    const CAPACITY_IS_POWER_OF_TWO: () =
        assert!(CAP.is_power_of_two(), "read buffer capacity must be a power of two");

    /// Take ownership of `handle`. `size` must be the true length of the file.
    pub fn new(handle: FileHandle, sink: Arc<dyn ErrorSink>, size: u64) -> Self {
        let () = Self::CAPACITY_IS_POWER_OF_TWO;
        let mut reader = Self {
            handle,
            sink,
            size,
            pos: 0,
            buffer_base: 0,
            buffer_count: 0,
            error: StickyError::default(),
            buffer: [0; CAP],
        };
        if let Err(Errno(errno)) = reader.handle.seek(0, SeekOrigin::Start) {
            reader.fail(ArchiveError::SeekFailure {
                target: 0,
                detail: Some(SeekDetail { size, pos: 0 }),
                errno,
            });
        }
        debug!(fd = ?reader.handle.fd(), size, "file reader open");
        reader
    }

    #[must_use]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size
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

    /// File offset of the first resident byte and the number of resident bytes.
    #[must_use]
    pub fn buffered(&self) -> (u64, usize) {
        (self.buffer_base, self.buffer_count)
    }

    /// Move the cursor to `pos` and drop the buffer.
    ///
    /// A failing handle seek is recorded, but the cursor still moves so the
    /// next read refills from `pos`. Targets past the end are rejected.
    pub fn seek(&mut self, pos: u64) {
        let offset = match i64::try_from(pos) {
            Ok(offset) if pos <= self.size => offset,
            _ => {
                self.fail(ArchiveError::InvalidSeek(format!(
                    "{pos} is past the end of a {}-byte file",
                    self.size
                )));
                return;
            }
        };
        trace!(fd = ?self.handle.fd(), pos, "seek");
        if let Err(Errno(errno)) = self.handle.seek(offset, SeekOrigin::Start) {
            self.fail(ArchiveError::SeekFailure {
                target: pos,
                detail: Some(SeekDetail {
                    size: self.size,
                    pos: self.pos,
                }),
                errno,
            });
        }
        self.pos = pos;
        self.buffer_base = pos;
        self.buffer_count = 0;
    }

    /// Refill the buffer from the cursor with up to `hint` bytes, stopping at
    /// the next capacity boundary and at the end of the file.
    pub fn precache(&mut self, hint: usize) {
        let resident_end = self.buffer_base + self.buffer_count as u64;
        if self.pos != resident_end {
            // Unread bytes are still resident, so the handle sits past the cursor.
            let offset = i64::try_from(self.pos).unwrap_or(i64::MAX);
            if let Err(Errno(errno)) = self.handle.seek(offset, SeekOrigin::Start) {
                self.fail(ArchiveError::SeekFailure {
                    target: self.pos,
                    detail: Some(SeekDetail {
                        size: self.size,
                        pos: self.pos,
                    }),
                    errno,
                });
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let to_boundary = CAP - (self.pos % CAP as u64) as usize;
        let to_end = usize::try_from(self.size.saturating_sub(self.pos)).unwrap_or(usize::MAX);
        let count = hint.min(to_boundary).min(to_end);

        self.buffer_base = self.pos;
        self.buffer_count = count;
        if count == 0 {
            return;
        }

        let result = self.handle.read(&mut self.buffer[..count]);
        trace!(fd = ?self.handle.fd(), pos = self.pos, count, result = ?result, "precache");
        match result {
            Ok(n) if n == count => {}
            Ok(n) => {
                self.buffer_count = n;
                let errno = self.handle.last_errno();
                self.fail(ArchiveError::ShortRead {
                    requested: count,
                    errno,
                });
            }
            Err(Errno(errno)) => {
                self.buffer_count = 0;
                self.fail(ArchiveError::ShortRead {
                    requested: count,
                    errno,
                });
            }
        }
    }

    /// Fill `data` from the cursor onward.
    ///
    /// Asking for bytes past the end of the file records `PastEndOfFile`;
    /// whatever was available before that point has already been copied.
    pub fn serialize(&mut self, mut data: &mut [u8]) {
        while !data.is_empty() {
            let mut copy = data.len().min(self.available());
            if copy == 0 {
                if data.len() >= CAP {
                    self.read_direct(data);
                    return;
                }
                debug_assert_eq!(self.pos, self.buffer_base + self.buffer_count as u64);
                let failures = self.error.count();
                self.precache(usize::MAX);
                if self.error.count() > failures {
                    return;
                }
                copy = data.len().min(self.available());
                if copy == 0 {
                    self.fail(ArchiveError::PastEndOfFile {
                        pos: self.pos,
                        len: data.len(),
                        size: self.size,
                    });
                    return;
                }
            }

            #[allow(clippy::cast_possible_truncation)]
            let start = (self.pos - self.buffer_base) as usize;
            let (head, tail) = std::mem::take(&mut data).split_at_mut(copy);
            head.copy_from_slice(&self.buffer[start..start + copy]);
            self.pos += copy as u64;
            data = tail;
        }
    }

    /// Release the handle. Can be called multiple times.
    ///
    /// # Errors
    /// Returns the first failure recorded during the reader's lifetime.
    pub fn close(&mut self) -> Result<(), ArchiveError> {
        if self.handle.is_open() {
            let fd = self.handle.fd();
            if let Err(errno) = self.handle.close() {
                warn!(fd = ?fd, %errno, "file reader close failed");
            }
            debug!(fd = ?fd, pos = self.pos, failures = self.error.count(), "file reader closed");
        }
        self.error.verdict()
    }

    /// Bytes between the cursor and the end of the resident buffer.
    fn available(&self) -> usize {
        let resident_end = self.buffer_base + self.buffer_count as u64;
        usize::try_from(resident_end.saturating_sub(self.pos)).unwrap_or(0)
    }

    fn read_direct(&mut self, data: &mut [u8]) {
        let len = data.len();
        if self.pos + len as u64 > self.size {
            self.fail(ArchiveError::PastEndOfFile {
                pos: self.pos,
                len,
                size: self.size,
            });
            return;
        }
        let result = self.handle.read(data);
        trace!(fd = ?self.handle.fd(), pos = self.pos, len, result = ?result, "direct read");
        match result {
            Ok(n) if n == len => {}
            Ok(_) => {
                let errno = self.handle.last_errno();
                self.fail(ArchiveError::ShortRead {
                    requested: len,
                    errno,
                });
            }
            Err(Errno(errno)) => self.fail(ArchiveError::ShortRead {
                requested: len,
                errno,
            }),
        }
        self.pos += len as u64;
        self.buffer_base += len as u64;
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

impl<const CAP: usize> Drop for FileReader<CAP> {
    fn drop(&mut self) {
        if self.handle.is_open() {
            let _ = self.close();
        }
    }
}

impl<const CAP: usize> Archive for FileReader<CAP> {
    fn serialize(&mut self, data: &mut [u8]) {
        FileReader::<CAP>::serialize(self, data);
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) {
        FileReader::<CAP>::seek(self, pos);
    }

    fn total_size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn precache(&mut self, hint: usize) {
        FileReader::<CAP>::precache(self, hint);
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        FileReader::<CAP>::close(self)
    }

    fn is_error(&self) -> bool {
        self.error.is_set()
    }

    fn flags(&self) -> ArchiveFlags {
        ArchiveFlags::FILE_LOADER
    }
}

impl<const CAP: usize> embedded_io::ErrorType for FileReader<CAP> {
    type Error = ArchiveError;
}

impl<const CAP: usize> embedded_io::Read for FileReader<CAP> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let left = self.size.saturating_sub(self.pos);
        let n = usize::try_from(left).map_or(buf.len(), |left| left.min(buf.len()));
        if n == 0 {
            return Ok(0);
        }
        let failures = self.error.count();
        FileReader::<CAP>::serialize(self, &mut buf[..n]);
        self.new_failure(failures).map_or(Ok(n), Err)
    }
}

impl<const CAP: usize> embedded_io::Seek for FileReader<CAP> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
        };
        let Some(target) = target.filter(|t| *t <= self.size) else {
            return Err(ArchiveError::InvalidSeek(format!(
                "{pos:?} is outside a {}-byte file",
                self.size
            )));
        };
        let failures = self.error.count();
        FileReader::<CAP>::seek(self, target);
        self.new_failure(failures).map_or(Ok(target), Err)
    }
}

impl<const CAP: usize> core::fmt::Debug for FileReader<CAP> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileReader")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("buffer_base", &self.buffer_base)
            .field("buffer_count", &self.buffer_count)
            .field("failures", &self.error.count())
            .finish()
    }
}
