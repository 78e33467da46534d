/// In-memory file runtime with fault injection.
///
/// - `clear_mocks` drops all files, handles, faults and the call log.
/// - `add_file` adds a file to the virtual file system.
/// - `get_file` gets the content of a file from the virtual file system.
/// - `inject` installs a `Fault` that stays active until `clear_faults`.
/// - `calls` returns every runtime call issued so far, in order.
///
/// `open(name, mode)`:
/// - returns an error if `name` contains `WANT_ERROR`.
/// - `Read` expects the file to exist.
/// - `Write` truncates or creates; refuses read-only files.
/// - `Append` creates if missing; every write goes to the end.
///
/// `unlink` removes the name only; descriptors that are already open keep working.
///
/// Directories are implicit: any prefix of a file name ending at a `/` is a
/// directory. `mkdir` adds empty ones and does not require the parent.
/// Relative names live in the directory `.`.
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};

use archive_runtime::errno::{EACCES, EBADF, EEXIST, EINVAL, EIO, ENOENT, ENOSPC, ENOTDIR, ENOTEMPTY};
use archive_runtime::{DirEntry, FileRuntime, OpenMode, SeekOrigin};
use parking_lot::Mutex;

pub const WANT_ERROR: char = '\u{0001}';

struct VfsFile {
    name: String,
    buffer: Vec<u8>,
    read_only: bool,
    unlinked: bool,
}

struct OpenFile {
    vfs_index: usize,
    pos: usize,
    mode: OpenMode,
    closed: bool,
}

/// Failure to simulate on every matching call until `clear_faults`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reads move at most this many bytes and report EIO when cut short
    ShortRead(usize),
    FailRead,
    /// Writes accept at most this many bytes and report ENOSPC when cut short
    ShortWrite(usize),
    FailWrite,
    FailSeek,
    /// Close reports EIO; the descriptor is released anyway
    FailClose,
}

/// A runtime call as seen by the `Vfs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoCall {
    Open { path: String, mode: OpenMode },
    Read { fd: c_int, requested: usize, moved: isize },
    Write { fd: c_int, requested: usize, moved: isize },
    Seek { fd: c_int, offset: i64, origin: SeekOrigin },
    Tell { fd: c_int },
    Close { fd: c_int },
    Unlink { path: String },
    Mkdir { path: String },
    Rmdir { path: String },
    ListDir { path: String },
}

pub struct Vfs {
    files: Mutex<Vec<VfsFile>>,
    dirs: Mutex<Vec<String>>,
    handles: Mutex<Vec<OpenFile>>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<IoCall>>,
    io_errno: AtomicI32,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            dirs: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            io_errno: AtomicI32::new(0),
        }
    }

    pub fn clear_mocks(&self) {
        self.io_errno.store(0, Ordering::Relaxed);
        self.files.lock().clear();
        self.dirs.lock().clear();
        self.handles.lock().clear();
        self.faults.lock().clear();
        self.calls.lock().clear();
    }

    /// Add a file, replacing any file with the same name.
    pub fn add_file(&self, name: &str, buffer: Vec<u8>) {
        let mut files = self.files.lock();
        if let Some(file) = find_mut(&mut files, name) {
            file.unlinked = true;
        }
        files.push(VfsFile {
            name: name.to_string(),
            buffer,
            read_only: false,
            unlinked: false,
        });
    }

    /// # Errors
    /// - File not found
    pub fn get_file(&self, name: &str) -> Result<Vec<u8>, String> {
        let mut files = self.files.lock();
        find_mut(&mut files, name)
            .map(|f| f.buffer.clone())
            .ok_or_else(|| format!("File not found: {name}"))
    }

    /// # Errors
    /// - File not found
    pub fn set_read_only(&self, name: &str, read_only: bool) -> Result<(), String> {
        let mut files = self.files.lock();
        let file = find_mut(&mut files, name).ok_or_else(|| format!("File not found: {name}"))?;
        file.read_only = read_only;
        Ok(())
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    #[must_use]
    pub fn calls(&self) -> Vec<IoCall> {
        self.calls.lock().clone()
    }

    /// Requested lengths of every write call, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                IoCall::Write { requested, .. } => Some(*requested),
                _ => None,
            })
            .collect()
    }

    /// Requested lengths of every read call, in order.
    #[must_use]
    pub fn reads(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                IoCall::Read { requested, .. } => Some(*requested),
                _ => None,
            })
            .collect()
    }

    /// Number of descriptors not yet closed.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.closed).count()
    }

    fn has_fault(&self, pred: impl Fn(&Fault) -> bool) -> bool {
        self.faults.lock().iter().any(pred)
    }

    fn limit(&self, pred: impl Fn(&Fault) -> Option<usize>) -> Option<usize> {
        self.faults.lock().iter().filter_map(pred).min()
    }

    fn record(&self, call: IoCall) {
        self.calls.lock().push(call);
    }

    fn set_errno(&self, errno: c_int) {
        self.io_errno.store(errno, Ordering::Relaxed);
    }

    fn open_file(&self, path: &str, mode: OpenMode) -> c_int {
        if path.contains(WANT_ERROR) {
            self.set_errno(EINVAL);
            return -1;
        }
        let mut files = self.files.lock();
        let existing = files.iter().position(|f| !f.unlinked && f.name == path);

        let vfs_index = match (mode, existing) {
            (OpenMode::Read, Some(index)) => index,
            (OpenMode::Read, None) => {
                self.set_errno(ENOENT);
                return -1;
            }
            (_, Some(index)) if files[index].read_only => {
                self.set_errno(EACCES);
                return -1;
            }
            (OpenMode::Write, Some(index)) => {
                files[index].buffer.clear();
                index
            }
            (OpenMode::Append, Some(index)) => index,
            (OpenMode::Write | OpenMode::Append, None) => {
                files.push(VfsFile {
                    name: path.to_string(),
                    buffer: Vec::new(),
                    read_only: false,
                    unlinked: false,
                });
                files.len() - 1
            }
        };

        let mut handles = self.handles.lock();
        handles.push(OpenFile {
            vfs_index,
            pos: 0,
            mode,
            closed: false,
        });
        c_int::try_from(handles.len() - 1).unwrap_or_else(|_| {
            self.set_errno(EINVAL);
            -1
        })
    }

    fn read_file(&self, fd: c_int, buffer: &mut [u8]) -> isize {
        if self.has_fault(|f| *f == Fault::FailRead) {
            self.set_errno(EIO);
            return -1;
        }
        let files = self.files.lock();
        let mut handles = self.handles.lock();
        let Some(handle) = live_handle(&mut handles, fd) else {
            self.set_errno(EBADF);
            return -1;
        };
        if handle.mode != OpenMode::Read {
            self.set_errno(EBADF);
            return -1;
        }
        let Some(file) = files.get(handle.vfs_index) else {
            self.set_errno(EBADF);
            return -1;
        };

        let available = file.buffer.len().saturating_sub(handle.pos);
        let mut to_copy = buffer.len().min(available);
        if let Some(limit) = self.limit(|f| match f {
            Fault::ShortRead(n) => Some(*n),
            _ => None,
        }) {
            if limit < to_copy {
                to_copy = limit;
                self.set_errno(EIO);
            }
        }
        if to_copy > 0 {
            buffer[..to_copy].copy_from_slice(&file.buffer[handle.pos..handle.pos + to_copy]);
            handle.pos += to_copy;
        }
        isize::try_from(to_copy).unwrap_or(isize::MAX)
    }

    fn write_file(&self, fd: c_int, buffer: &[u8]) -> isize {
        if self.has_fault(|f| *f == Fault::FailWrite) {
            self.set_errno(EIO);
            return -1;
        }
        let mut files = self.files.lock();
        let mut handles = self.handles.lock();
        let Some(handle) = live_handle(&mut handles, fd) else {
            self.set_errno(EBADF);
            return -1;
        };
        if handle.mode == OpenMode::Read {
            self.set_errno(EBADF);
            return -1;
        }
        let Some(file) = files.get_mut(handle.vfs_index) else {
            self.set_errno(EBADF);
            return -1;
        };

        let mut to_copy = buffer.len();
        if let Some(limit) = self.limit(|f| match f {
            Fault::ShortWrite(n) => Some(*n),
            _ => None,
        }) {
            if limit < to_copy {
                to_copy = limit;
                self.set_errno(ENOSPC);
            }
        }
        if handle.mode == OpenMode::Append {
            handle.pos = file.buffer.len();
        }
        let end = handle.pos + to_copy;
        if file.buffer.len() < end {
            file.buffer.resize(end, 0);
        }
        file.buffer[handle.pos..end].copy_from_slice(&buffer[..to_copy]);
        handle.pos = end;
        isize::try_from(to_copy).unwrap_or(isize::MAX)
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.lock().iter().any(|f| !f.unlinked && f.name == path)
    }

    fn children(&self, dir: &str) -> Vec<DirEntry> {
        let mut entries: Vec<DirEntry> = Vec::new();
        let mut add = |name: &str, is_dir: bool| {
            if !entries.iter().any(|e| e.name == name) {
                entries.push(DirEntry {
                    name: name.to_string(),
                    is_dir,
                });
            }
        };
        for file in self.files.lock().iter().filter(|f| !f.unlinked) {
            if let Some((name, deeper)) = child_of(dir, &file.name) {
                add(name, deeper);
            }
        }
        for known in self.dirs.lock().iter() {
            if let Some((name, _)) = child_of(dir, known) {
                add(name, true);
            }
        }
        entries
    }

    fn dir_exists(&self, dir: &str) -> bool {
        if dir == "." || dir == "/" {
            return true;
        }
        let known = self.dirs.lock().iter().any(|d| d == dir);
        known || !self.children(dir).is_empty()
    }

    fn seek_file(&self, fd: c_int, offset: i64, origin: SeekOrigin) -> c_int {
        if self.has_fault(|f| *f == Fault::FailSeek) {
            self.set_errno(EINVAL);
            return -1;
        }
        let files = self.files.lock();
        let mut handles = self.handles.lock();
        let Some(handle) = live_handle(&mut handles, fd) else {
            self.set_errno(EBADF);
            return -1;
        };
        let len = files.get(handle.vfs_index).map_or(0, |f| f.buffer.len());
        let base = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => handle.pos,
            SeekOrigin::End => len,
        };
        let target = i64::try_from(base)
            .ok()
            .and_then(|b| b.checked_add(offset))
            .and_then(|t| usize::try_from(t).ok());
        match target {
            Some(pos) => {
                handle.pos = pos;
                0
            }
            None => {
                self.set_errno(EINVAL);
                -1
            }
        }
    }
}

/// First component of `name` below `dir`, and whether `name` goes deeper.
fn child_of<'a>(dir: &str, name: &'a str) -> Option<(&'a str, bool)> {
    let rest = match dir {
        "." if name.starts_with('/') => return None,
        "." => name,
        "/" => name.strip_prefix('/')?,
        _ => name.strip_prefix(dir)?.strip_prefix('/')?,
    };
    match rest.split_once('/') {
        _ if rest.is_empty() => None,
        Some((first, _)) => Some((first, true)),
        None => Some((rest, false)),
    }
}

fn normalize_dir(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        "" => ".",
        trimmed => trimmed,
    }
}

fn find_mut<'a>(files: &'a mut [VfsFile], name: &str) -> Option<&'a mut VfsFile> {
    files.iter_mut().find(|f| !f.unlinked && f.name == name)
}

fn live_handle(handles: &mut [OpenFile], fd: c_int) -> Option<&mut OpenFile> {
    let fd = usize::try_from(fd).ok()?;
    handles.get_mut(fd).filter(|h| !h.closed)
}

impl FileRuntime for Vfs {
    fn get_errno(&self) -> c_int {
        self.io_errno.load(Ordering::Relaxed)
    }

    fn open(&self, path: &str, mode: OpenMode) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Open {
            path: path.to_string(),
            mode,
        });
        self.open_file(path, mode)
    }

    fn read(&self, fd: c_int, buffer: &mut [u8]) -> isize {
        self.set_errno(0);
        let requested = buffer.len();
        let moved = self.read_file(fd, buffer);
        self.record(IoCall::Read {
            fd,
            requested,
            moved,
        });
        moved
    }

    fn write(&self, fd: c_int, buffer: &[u8]) -> isize {
        self.set_errno(0);
        let moved = self.write_file(fd, buffer);
        self.record(IoCall::Write {
            fd,
            requested: buffer.len(),
            moved,
        });
        moved
    }

    fn seek(&self, fd: c_int, offset: i64, origin: SeekOrigin) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Seek { fd, offset, origin });
        self.seek_file(fd, offset, origin)
    }

    fn tell(&self, fd: c_int) -> i64 {
        self.set_errno(0);
        self.record(IoCall::Tell { fd });
        let mut handles = self.handles.lock();
        match live_handle(&mut handles, fd) {
            Some(handle) => i64::try_from(handle.pos).unwrap_or(i64::MAX),
            None => {
                self.set_errno(EBADF);
                -1
            }
        }
    }

    fn close(&self, fd: c_int) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Close { fd });
        let mut handles = self.handles.lock();
        let Some(handle) = live_handle(&mut handles, fd) else {
            self.set_errno(EBADF);
            return -1;
        };
        handle.closed = true;
        if self.has_fault(|f| *f == Fault::FailClose) {
            self.set_errno(EIO);
            return -1;
        }
        0
    }

    fn unlink(&self, path: &str) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Unlink {
            path: path.to_string(),
        });
        let mut files = self.files.lock();
        match find_mut(&mut files, path) {
            Some(file) => {
                file.unlinked = true;
                0
            }
            None => {
                self.set_errno(ENOENT);
                -1
            }
        }
    }

    fn make_writable(&self, path: &str) -> c_int {
        self.set_errno(0);
        let mut files = self.files.lock();
        match find_mut(&mut files, path) {
            Some(file) => {
                file.read_only = false;
                0
            }
            None => {
                self.set_errno(ENOENT);
                -1
            }
        }
    }

    fn mkdir(&self, path: &str) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Mkdir {
            path: path.to_string(),
        });
        if path.contains(WANT_ERROR) {
            self.set_errno(EINVAL);
            return -1;
        }
        let dir = normalize_dir(path);
        if self.is_file(dir) || self.dir_exists(dir) {
            self.set_errno(EEXIST);
            return -1;
        }
        self.dirs.lock().push(dir.to_string());
        0
    }

    fn rmdir(&self, path: &str) -> c_int {
        self.set_errno(0);
        self.record(IoCall::Rmdir {
            path: path.to_string(),
        });
        let dir = normalize_dir(path);
        if self.is_file(dir) {
            self.set_errno(ENOTDIR);
            return -1;
        }
        if !self.children(dir).is_empty() {
            self.set_errno(ENOTEMPTY);
            return -1;
        }
        let mut dirs = self.dirs.lock();
        match dirs.iter().position(|d| d == dir) {
            Some(index) => {
                dirs.remove(index);
                0
            }
            None => {
                self.set_errno(ENOENT);
                -1
            }
        }
    }

    fn list_dir(&self, path: &str, entries: &mut Vec<DirEntry>) -> c_int {
        self.set_errno(0);
        self.record(IoCall::ListDir {
            path: path.to_string(),
        });
        let dir = normalize_dir(path);
        if self.is_file(dir) {
            self.set_errno(ENOTDIR);
            return -1;
        }
        if !self.dir_exists(dir) {
            self.set_errno(ENOENT);
            return -1;
        }
        entries.extend(self.children(dir));
        0
    }
}
