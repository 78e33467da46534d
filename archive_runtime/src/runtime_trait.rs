use std::os::raw::c_int;

use crate::{DirEntry, OpenMode, SeekOrigin};

/// Trait for file runtime operations.
/// Provides an abstraction layer over the underlying file descriptor calls.
/// This allows for both host filesystem implementations and in-memory implementations (testing).
///
/// All calls follow POSIX conventions: a negative result means failure and
/// the cause is available through `get_errno`.
pub trait FileRuntime: Send + Sync {
    /// Get the last error number
    fn get_errno(&self) -> c_int;

    /// Open a file, returning a file descriptor or -1
    fn open(&self, path: &str, mode: OpenMode) -> c_int;

    /// Read into the provided buffer.
    /// Returns the number of bytes actually moved, which is short only at end of file
    /// or when an error interrupted the transfer.
    fn read(&self, fd: c_int, buffer: &mut [u8]) -> isize;

    /// Write from the provided buffer, returning the number of bytes actually moved
    fn write(&self, fd: c_int, buffer: &[u8]) -> isize;

    /// Reposition the file offset. Returns 0 on success.
    fn seek(&self, fd: c_int, offset: i64, origin: SeekOrigin) -> c_int;

    /// Current file offset, or -1
    fn tell(&self, fd: c_int) -> i64;

    /// Close a file descriptor
    fn close(&self, fd: c_int) -> c_int;

    /// Remove a file by path
    fn unlink(&self, path: &str) -> c_int;

    /// Make a file readable and writable by its owner
    fn make_writable(&self, path: &str) -> c_int;

    /// Create one directory; the parent must exist. Returns 0 on success.
    fn mkdir(&self, path: &str) -> c_int;

    /// Remove one empty directory. Returns 0 on success.
    fn rmdir(&self, path: &str) -> c_int;

    /// Append the entries of directory `path` to `entries`. Returns 0 on success.
    fn list_dir(&self, path: &str, entries: &mut Vec<DirEntry>) -> c_int;
}
