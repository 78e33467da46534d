mod handle;
mod os_runtime;
mod runtime_trait;

pub use handle::{Errno, FileHandle};
pub use os_runtime::OsRuntime;
pub use runtime_trait::FileRuntime;

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only
    Read,
    /// Create or truncate, write only
    Write,
    /// Create if missing, every write goes to the end
    Append,
}

/// Reference point for `FileRuntime::seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start = 0,
    Current = 1,
    End = 2,
}

/// One name inside a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// errno values produced by the runtimes in this workspace.
pub mod errno {
    use std::os::raw::c_int;

    pub const ENOENT: c_int = 2;
    pub const EIO: c_int = 5;
    pub const EBADF: c_int = 9;
    pub const EACCES: c_int = 13;
    pub const EEXIST: c_int = 17;
    pub const ENOTDIR: c_int = 20;
    pub const EINVAL: c_int = 22;
    pub const ENOSPC: c_int = 28;
    pub const ENOTEMPTY: c_int = 39;
}
