//! Error mapping utilities for converting between error types.
//!
//! Streams report the raw errno of the failing call in their diagnostics;
//! these helpers turn it into an `embedded_io::ErrorKind` and a short text.

use core::ffi::c_int;

use embedded_io::ErrorKind;

/// Convert errno to `embedded_io::ErrorKind`
#[must_use]
#[allow(clippy::match_same_arms)] // Common errno values are listed for documentation
pub fn errno_to_error_kind(errno: c_int) -> ErrorKind {
    match errno {
        1 | 13 => ErrorKind::PermissionDenied, // EPERM, EACCES
        2 => ErrorKind::NotFound,              // ENOENT
        4 => ErrorKind::Interrupted,           // EINTR
        9 | 22 | 29 => ErrorKind::InvalidInput, // EBADF, EINVAL, ESPIPE
        12 | 28 => ErrorKind::OutOfMemory,     // ENOMEM, ENOSPC (no space left)
        17 => ErrorKind::AlreadyExists,        // EEXIST
        24 => ErrorKind::Unsupported,          // EMFILE (too many open files)
        32 => ErrorKind::BrokenPipe,           // EPIPE
        // 0 (short transfer without errno, i.e. end of file), EIO, EAGAIN
        0 | 5 | 11 => ErrorKind::Other,
        _ => ErrorKind::Other,
    }
}

/// Convert error kind to a static string description
#[must_use]
pub fn error_kind_to_str(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not found",
        ErrorKind::PermissionDenied => "permission denied",
        ErrorKind::BrokenPipe => "broken pipe",
        ErrorKind::AlreadyExists => "already exists",
        ErrorKind::InvalidInput => "invalid input",
        ErrorKind::InvalidData => "invalid data",
        ErrorKind::TimedOut => "timed out",
        ErrorKind::Interrupted => "interrupted",
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::OutOfMemory => "out of memory",
        ErrorKind::Other => "other error",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_errnos() {
        assert_eq!(errno_to_error_kind(2), ErrorKind::NotFound);
        assert_eq!(errno_to_error_kind(13), ErrorKind::PermissionDenied);
        assert_eq!(errno_to_error_kind(28), ErrorKind::OutOfMemory);
        assert_eq!(errno_to_error_kind(0), ErrorKind::Other);
        assert_eq!(errno_to_error_kind(-7), ErrorKind::Other);
    }

    #[test]
    fn kind_text() {
        assert_eq!(error_kind_to_str(ErrorKind::NotFound), "not found");
        assert_eq!(error_kind_to_str(errno_to_error_kind(5)), "other error");
    }
}
