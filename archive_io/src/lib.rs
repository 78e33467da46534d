//! Buffered file archives.
//!
//! `FileReader` and `FileWriter` sit between a serialize-style interface and
//! an owned `archive_runtime::FileHandle`. Failures never interrupt a call:
//! each one is reported once through an `ErrorSink` and remembered in a
//! sticky record that `close` turns into the final verdict.

pub mod archive;
pub mod config;
pub mod error;
pub mod error_mapping;
pub mod file_manager;
pub mod path;
pub mod reader;
pub mod sink;
pub mod writer;

pub use archive::{transfer, Archive, ArchiveFlags};
pub use config::FileManagerConfig;
pub use error::{ArchiveError, SeekDetail, StickyError};
pub use error_mapping::{errno_to_error_kind, error_kind_to_str};
pub use file_manager::{FileManager, ReadFlags, WriteFlags};
pub use path::{fixup_separators, PathResolver};
pub use reader::{FileReader, READ_BUFFER_SIZE};
pub use sink::{ErrorSink, TracingSink, WriteSink};
pub use writer::{FileWriter, WRITE_BUFFER_SIZE};
