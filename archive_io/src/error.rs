//! Failure taxonomy of the file archives and the sticky accumulator that
//! remembers them.

use core::ffi::c_int;
use std::fmt;

use crate::error_mapping::{errno_to_error_kind, error_kind_to_str};

/// Context reported with a failed reader seek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekDetail {
    /// Total size of the file
    pub size: u64,
    /// Logical position before the seek
    pub pos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// Fewer bytes came back than a non-zero read asked for
    ShortRead { requested: usize, errno: c_int },
    /// Flush could not hand over all staged bytes
    ShortWrite { requested: usize, errno: c_int },
    /// The handle refused to reposition
    SeekFailure {
        target: u64,
        detail: Option<SeekDetail>,
        errno: c_int,
    },
    /// A read asked for bytes past the known total size
    PastEndOfFile { pos: u64, len: usize, size: u64 },
    /// Closing the handle failed. Reported with the write-failure text.
    CloseFailure { errno: c_int },
    /// Seek target outside what the stream accepts
    InvalidSeek(String),
    OpenFailed { path: String, errno: c_int },
    ConfigDir { path: String, message: String },
}

impl ArchiveError {
    /// errno of the underlying call, when there was one.
    #[must_use]
    pub fn errno(&self) -> Option<c_int> {
        match self {
            Self::ShortRead { errno, .. }
            | Self::ShortWrite { errno, .. }
            | Self::SeekFailure { errno, .. }
            | Self::CloseFailure { errno }
            | Self::OpenFailed { errno, .. } => Some(*errno),
            Self::PastEndOfFile { .. } | Self::InvalidSeek(_) | Self::ConfigDir { .. } => None,
        }
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead { requested, errno } => write!(
                f,
                "read failed: count={requested} errno={errno} ({})",
                error_kind_to_str(errno_to_error_kind(*errno))
            ),
            Self::ShortWrite { .. } | Self::CloseFailure { .. } => write!(f, "write failed"),
            Self::SeekFailure { detail: None, .. } => write!(f, "seek failed"),
            Self::SeekFailure {
                target,
                detail: Some(SeekDetail { size, pos }),
                errno,
            } => write!(f, "seek failed {target}/{size}: {pos} errno={errno}"),
            Self::PastEndOfFile { pos, len, size } => {
                write!(f, "read beyond end of file {pos}+{len}/{size}")
            }
            Self::InvalidSeek(reason) => write!(f, "invalid seek: {reason}"),
            Self::OpenFailed { path, errno } => write!(
                f,
                "failed to open {path}: {} (errno {errno})",
                error_kind_to_str(errno_to_error_kind(*errno))
            ),
            Self::ConfigDir { path, message } => {
                write!(f, "failed to create configuration directory {path}: {message}")
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

impl embedded_io::Error for ArchiveError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::PastEndOfFile { .. } | Self::InvalidSeek(_) => embedded_io::ErrorKind::InvalidInput,
            Self::ConfigDir { .. } => embedded_io::ErrorKind::Other,
            other => other
                .errno()
                .map_or(embedded_io::ErrorKind::Other, errno_to_error_kind),
        }
    }
}

/// Once-set failure record of a stream.
///
/// Never cleared by normal operation. Keeps the number of failures, the
/// first one (the stream's verdict) and the most recent one.
#[derive(Debug, Default, Clone)]
pub struct StickyError {
    count: usize,
    first: Option<ArchiveError>,
    last: Option<ArchiveError>,
}

impl StickyError {
    pub fn record(&mut self, error: ArchiveError) {
        self.count += 1;
        if self.first.is_none() {
            self.first = Some(error.clone());
        }
        self.last = Some(error);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.count > 0
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn first(&self) -> Option<&ArchiveError> {
        self.first.as_ref()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ArchiveError> {
        self.last.as_ref()
    }

    /// `Ok` if nothing ever failed, otherwise the first failure.
    ///
    /// # Errors
    /// Returns the first recorded failure.
    pub fn verdict(&self) -> Result<(), ArchiveError> {
        match &self.first {
            None => Ok(()),
            Some(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn generic_messages_for_writer_failures() {
        let short = ArchiveError::ShortWrite {
            requested: 10,
            errno: 28,
        };
        let close = ArchiveError::CloseFailure { errno: 5 };
        assert_eq!(short.to_string(), "write failed");
        assert_eq!(close.to_string(), "write failed");
        assert_ne!(short, close);
    }

    #[test]
    fn reader_messages_carry_context() {
        let eof = ArchiveError::PastEndOfFile {
            pos: 10,
            len: 1,
            size: 10,
        };
        assert_eq!(eof.to_string(), "read beyond end of file 10+1/10");

        let seek = ArchiveError::SeekFailure {
            target: 5,
            detail: Some(SeekDetail { size: 10, pos: 2 }),
            errno: 22,
        };
        assert_eq!(seek.to_string(), "seek failed 5/10: 2 errno=22");
        assert_eq!(seek.kind(), embedded_io::ErrorKind::InvalidInput);
    }

    #[test]
    fn sticky_keeps_first_and_last() {
        let mut sticky = StickyError::default();
        assert!(sticky.verdict().is_ok());

        sticky.record(ArchiveError::CloseFailure { errno: 5 });
        sticky.record(ArchiveError::InvalidSeek("x".to_string()));

        assert!(sticky.is_set());
        assert_eq!(sticky.count(), 2);
        assert_eq!(sticky.verdict(), Err(ArchiveError::CloseFailure { errno: 5 }));
        assert_eq!(sticky.last(), Some(&ArchiveError::InvalidSeek("x".to_string())));
    }
}
