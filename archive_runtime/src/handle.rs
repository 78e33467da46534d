//! An owned file descriptor.
//!
//! `FileHandle` pairs a descriptor with the runtime that issued it and
//! releases it exactly once: either through an explicit `close` or on drop.
//!
//! # Example
//! ```no_run
//! use archive_runtime::{FileHandle, OpenMode, OsRuntime};
//! use std::sync::Arc;
//!
//! let mut handle = FileHandle::open(Arc::new(OsRuntime::new()), "notes.txt", OpenMode::Write).unwrap();
//! handle.write(b"Hello, world!").unwrap();
//! handle.close().unwrap();
//! ```

use std::fmt;
use std::os::raw::c_int;
use std::sync::Arc;

use crate::errno::{EBADF, EINVAL};
use crate::{FileRuntime, OpenMode, SeekOrigin};

/// errno captured from a failed runtime call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub c_int);

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

impl std::error::Error for Errno {}

pub struct FileHandle {
    runtime: Arc<dyn FileRuntime>,
    fd: Option<c_int>,
}

impl FileHandle {
    /// Open `path` through `runtime`.
    ///
    /// # Errors
    /// Returns the runtime's errno if opening fails.
    pub fn open(runtime: Arc<dyn FileRuntime>, path: &str, mode: OpenMode) -> Result<Self, Errno> {
        let fd = runtime.open(path, mode);
        if fd < 0 {
            return Err(Errno(runtime.get_errno()));
        }
        Ok(Self {
            runtime,
            fd: Some(fd),
        })
    }

    /// Take ownership of a descriptor that was opened elsewhere.
    ///
    /// # Errors
    /// Returns `EINVAL` if the file descriptor is negative.
    pub fn from_fd(runtime: Arc<dyn FileRuntime>, fd: c_int) -> Result<Self, Errno> {
        if fd < 0 {
            Err(Errno(EINVAL))
        } else {
            Ok(Self {
                runtime,
                fd: Some(fd),
            })
        }
    }

    #[must_use]
    pub fn fd(&self) -> Option<c_int> {
        self.fd
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    /// errno of the most recent runtime call
    #[must_use]
    pub fn last_errno(&self) -> c_int {
        self.runtime.get_errno()
    }

    /// Read up to `buf.len()` bytes. A short count means end of file or an
    /// interrupted transfer; see `last_errno`.
    ///
    /// # Errors
    /// Returns the errno if the runtime reports failure or the handle is closed.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Errno> {
        let fd = self.fd.ok_or(Errno(EBADF))?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.runtime.read(fd, buf);
        usize::try_from(n).map_err(|_| Errno(self.runtime.get_errno()))
    }

    /// Write `buf`, returning how many bytes the runtime accepted.
    ///
    /// # Errors
    /// Returns the errno if the runtime reports failure or the handle is closed.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Errno> {
        let fd = self.fd.ok_or(Errno(EBADF))?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.runtime.write(fd, buf);
        usize::try_from(n).map_err(|_| Errno(self.runtime.get_errno()))
    }

    /// # Errors
    /// Returns the errno if repositioning fails or the handle is closed.
    pub fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<(), Errno> {
        let fd = self.fd.ok_or(Errno(EBADF))?;
        if self.runtime.seek(fd, offset, origin) == 0 {
            Ok(())
        } else {
            Err(Errno(self.runtime.get_errno()))
        }
    }

    /// # Errors
    /// Returns the errno if the offset is unavailable or the handle is closed.
    pub fn tell(&self) -> Result<u64, Errno> {
        let fd = self.fd.ok_or(Errno(EBADF))?;
        let pos = self.runtime.tell(fd);
        u64::try_from(pos).map_err(|_| Errno(self.runtime.get_errno()))
    }

    /// Length of the file. Leaves the offset at the end of the file.
    ///
    /// # Errors
    /// Returns the errno of the failing seek or tell.
    pub fn size(&mut self) -> Result<u64, Errno> {
        self.seek(0, SeekOrigin::End)?;
        self.tell()
    }

    /// Close the descriptor.
    /// Can be called multiple times; only the first call reaches the runtime.
    /// "drop" will call "close" automatically.
    ///
    /// # Errors
    /// Returns the errno if the runtime fails to close. The descriptor is
    /// released either way.
    pub fn close(&mut self) -> Result<(), Errno> {
        if let Some(fd) = self.fd.take() {
            if self.runtime.close(fd) < 0 {
                return Err(Errno(self.runtime.get_errno()));
            }
        }
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle").field("fd", &self.fd).finish()
    }
}
