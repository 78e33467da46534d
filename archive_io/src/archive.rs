//! The serialize surface shared by readers and writers.
//!
//! A loading archive fills the slice handed to `serialize`; a saving
//! archive consumes it. Failures never interrupt the caller: they are
//! recorded and surface through `is_error` and `close`.

use crate::error::ArchiveError;

/// Direction and durability of an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveFlags {
    pub loading: bool,
    pub saving: bool,
    pub persistent: bool,
}

impl ArchiveFlags {
    pub const FILE_LOADER: Self = Self {
        loading: true,
        saving: false,
        persistent: true,
    };
    pub const FILE_SAVER: Self = Self {
        loading: false,
        saving: true,
        persistent: true,
    };
}

pub trait Archive {
    /// Move `data.len()` bytes between the archive and `data`.
    fn serialize(&mut self, data: &mut [u8]);

    /// Logical cursor
    fn tell(&self) -> u64;

    fn seek(&mut self, pos: u64);

    /// Known length of the underlying file, if the archive has one.
    fn total_size(&self) -> Option<u64> {
        None
    }

    /// Hint that `hint` bytes are about to be read.
    fn precache(&mut self, _hint: usize) {}

    fn flush(&mut self) {}

    /// Release the handle. Safe to call more than once.
    ///
    /// # Errors
    /// Returns the first failure recorded during the archive's lifetime.
    fn close(&mut self) -> Result<(), ArchiveError>;

    /// Whether any failure has been recorded
    fn is_error(&self) -> bool;

    fn flags(&self) -> ArchiveFlags;

    fn at_end(&self) -> bool {
        self.total_size().is_some_and(|size| self.tell() >= size)
    }
}

/// Copy everything left in `src` into `dst` through a `chunk`-sized scratch buffer.
///
/// Stops early if either side records a failure. Returns the number of bytes
/// moved; a chunk during which `dst` failed is not counted.
pub fn transfer(src: &mut dyn Archive, dst: &mut dyn Archive, chunk: usize) -> u64 {
    let Some(size) = src.total_size() else {
        return 0;
    };
    let mut scratch = vec![0u8; chunk.max(1)];
    let mut moved = 0;
    while !src.is_error() && !dst.is_error() {
        let left = size.saturating_sub(src.tell());
        if left == 0 {
            break;
        }
        let n = usize::try_from(left).map_or(scratch.len(), |left| left.min(scratch.len()));
        src.serialize(&mut scratch[..n]);
        if src.is_error() {
            break;
        }
        dst.serialize(&mut scratch[..n]);
        if dst.is_error() {
            break;
        }
        moved += n as u64;
    }
    moved
}
