use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use crate::errno::{EBADF, EINVAL, EIO};
use crate::runtime_trait::FileRuntime;
use crate::{DirEntry, OpenMode, SeekOrigin};

/// Host filesystem implementation of `FileRuntime`.
///
/// Descriptors are indexes into an internal table of `std::fs::File`s.
/// Freed slots are reused by later opens.
pub struct OsRuntime {
    files: Mutex<Vec<Option<File>>>,
    io_errno: AtomicI32,
}

impl OsRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
            io_errno: AtomicI32::new(0),
        }
    }

    fn set_errno(&self, errno: c_int) {
        self.io_errno.store(errno, Ordering::Relaxed);
    }

    fn fail(&self, e: &std::io::Error) {
        self.set_errno(e.raw_os_error().unwrap_or(EIO));
    }

    /// 0 for `Ok`, otherwise record errno and return -1.
    fn status(&self, result: std::io::Result<()>) -> c_int {
        match result {
            Ok(()) => 0,
            Err(e) => {
                self.fail(&e);
                -1
            }
        }
    }

    /// Run `f` on the open file behind `fd`, or fail with EBADF.
    fn with_file<T>(&self, fd: c_int, bad_fd: T, f: impl FnOnce(&mut File) -> T) -> T {
        let mut files = self.files.lock();
        let slot = usize::try_from(fd).ok().and_then(|i| files.get_mut(i));
        match slot {
            Some(Some(file)) => f(file),
            _ => {
                log::warn!("OsRuntime: unknown fd {fd}");
                self.set_errno(EBADF);
                bad_fd
            }
        }
    }
}

impl Default for OsRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FileRuntime for OsRuntime {
    fn get_errno(&self) -> c_int {
        self.io_errno.load(Ordering::Relaxed)
    }

    fn open(&self, path: &str, mode: OpenMode) -> c_int {
        self.set_errno(0);
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
        };
        let file = match options.open(path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("OsRuntime: open {path:?} ({mode:?}) failed: {e}");
                self.fail(&e);
                return -1;
            }
        };

        let mut files = self.files.lock();
        let index = if let Some(free) = files.iter().position(Option::is_none) {
            files[free] = Some(file);
            free
        } else {
            files.push(Some(file));
            files.len() - 1
        };
        let Ok(fd) = c_int::try_from(index) else {
            files[index] = None;
            self.set_errno(EINVAL);
            return -1;
        };
        log::debug!("OsRuntime: opened {path:?} ({mode:?}) as fd {fd}");
        fd
    }

    fn read(&self, fd: c_int, buffer: &mut [u8]) -> isize {
        self.set_errno(0);
        self.with_file(fd, -1, |file| {
            let mut total = 0;
            while total < buffer.len() {
                match file.read(&mut buffer[total..]) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        self.fail(&e);
                        if total == 0 {
                            return -1;
                        }
                        break;
                    }
                }
            }
            isize::try_from(total).unwrap_or(isize::MAX)
        })
    }

    fn write(&self, fd: c_int, buffer: &[u8]) -> isize {
        self.set_errno(0);
        self.with_file(fd, -1, |file| {
            let mut total = 0;
            while total < buffer.len() {
                match file.write(&buffer[total..]) {
                    Ok(0) => break,
                    Ok(n) => total += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        self.fail(&e);
                        if total == 0 {
                            return -1;
                        }
                        break;
                    }
                }
            }
            isize::try_from(total).unwrap_or(isize::MAX)
        })
    }

    fn seek(&self, fd: c_int, offset: i64, origin: SeekOrigin) -> c_int {
        self.set_errno(0);
        let target = match origin {
            SeekOrigin::Start => match u64::try_from(offset) {
                Ok(offset) => SeekFrom::Start(offset),
                Err(_) => {
                    self.set_errno(EINVAL);
                    return -1;
                }
            },
            SeekOrigin::Current => SeekFrom::Current(offset),
            SeekOrigin::End => SeekFrom::End(offset),
        };
        self.with_file(fd, -1, |file| match file.seek(target) {
            Ok(_) => 0,
            Err(e) => {
                self.fail(&e);
                -1
            }
        })
    }

    fn tell(&self, fd: c_int) -> i64 {
        self.set_errno(0);
        self.with_file(fd, -1, |file| match file.stream_position() {
            Ok(pos) => i64::try_from(pos).unwrap_or(i64::MAX),
            Err(e) => {
                self.fail(&e);
                -1
            }
        })
    }

    fn close(&self, fd: c_int) -> c_int {
        self.set_errno(0);
        let mut files = self.files.lock();
        let slot = usize::try_from(fd).ok().and_then(|i| files.get_mut(i));
        match slot.and_then(Option::take) {
            Some(file) => {
                drop(file);
                log::debug!("OsRuntime: closed fd {fd}");
                0
            }
            None => {
                log::warn!("OsRuntime: close of unknown fd {fd}");
                self.set_errno(EBADF);
                -1
            }
        }
    }

    fn unlink(&self, path: &str) -> c_int {
        self.set_errno(0);
        self.status(std::fs::remove_file(path))
    }

    fn make_writable(&self, path: &str) -> c_int {
        self.set_errno(0);
        let result = std::fs::metadata(path).and_then(|meta| {
            let mut perms = meta.permissions();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                perms.set_mode(perms.mode() | 0o600);
            }
            #[cfg(not(unix))]
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms)
        });
        self.status(result)
    }

    fn mkdir(&self, path: &str) -> c_int {
        self.set_errno(0);
        let result = std::fs::create_dir(path);
        log::debug!("OsRuntime: mkdir {path:?}: {result:?}");
        self.status(result)
    }

    fn rmdir(&self, path: &str) -> c_int {
        self.set_errno(0);
        self.status(std::fs::remove_dir(path))
    }

    fn list_dir(&self, path: &str, entries: &mut Vec<DirEntry>) -> c_int {
        self.set_errno(0);
        let result = std::fs::read_dir(path).and_then(|dir| {
            for entry in dir {
                let entry = entry?;
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_dir: entry.file_type()?.is_dir(),
                });
            }
            Ok(())
        });
        self.status(result)
    }
}
