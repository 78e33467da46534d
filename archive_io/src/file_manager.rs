//! Opens file archives by path.
//!
//! Every path goes through separator fixup. Relative paths are looked up in
//! the configuration directory first: readers fall back to the path as given,
//! writers always create relative files inside the configuration directory.
//! Directory operations go through the runtime too, one level at a time.

use core::ffi::c_int;
use std::sync::Arc;

use archive_runtime::errno::{EEXIST, ENOENT};
use archive_runtime::{Errno, FileHandle, FileRuntime, OpenMode};
use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::config::FileManagerConfig;
use crate::error::ArchiveError;
use crate::error_mapping::{errno_to_error_kind, error_kind_to_str};
use crate::path::{fixup_separators, PathResolver};
use crate::reader::FileReader;
use crate::sink::ErrorSink;
use crate::writer::FileWriter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlags {
    /// Report an open failure through the error sink, not only in the result
    pub no_fail: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFlags {
    /// Report an open failure through the error sink, not only in the result
    pub no_fail: bool,
    /// Keep existing content and write at the end
    pub append: bool,
    /// Refuse to open a file that already exists
    pub no_replace_existing: bool,
    /// Make the target writable before opening it
    pub even_if_read_only: bool,
}

pub struct FileManager {
    runtime: Arc<dyn FileRuntime>,
    resolver: PathResolver,
}

impl FileManager {
    /// Resolve the configuration directory and create it, with any missing
    /// parents, through `runtime`.
    ///
    /// # Errors
    /// The directory cannot be resolved or created.
    pub fn new(runtime: Arc<dyn FileRuntime>, config: &FileManagerConfig) -> Result<Self, ArchiveError> {
        let dir = config.resolve_config_dir()?;
        make_config_dir(runtime.as_ref(), &dir).map_err(|Errno(errno)| ArchiveError::ConfigDir {
            path: dir.clone(),
            message: format!("{} (errno {errno})", error_kind_to_str(errno_to_error_kind(errno))),
        })?;
        debug!(app = %config.app_name, config_dir = %dir, "file manager ready");
        Ok(Self::with_resolver(runtime, PathResolver::new(&dir)))
    }

    /// Use `resolver` as is, without creating anything.
    #[must_use]
    pub fn with_resolver(runtime: Arc<dyn FileRuntime>, resolver: PathResolver) -> Self {
        Self { runtime, resolver }
    }

    #[must_use]
    pub fn config_dir(&self) -> &str {
        self.resolver.config_dir()
    }

    /// Open `path` for reading. The configuration-directory copy of a
    /// relative path is preferred over the path itself.
    ///
    /// # Errors
    /// `OpenFailed` if neither location can be opened or the size is unknown.
    pub fn create_file_reader(
        &self,
        path: &str,
        flags: ReadFlags,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<FileReader, ArchiveError> {
        let fixed = fixup_separators(path);
        let in_config = self
            .resolver
            .rewrite_to_config(&fixed)
            .and_then(|p| FileHandle::open(self.runtime.clone(), &p, OpenMode::Read).ok());
        let mut handle = match in_config {
            Some(handle) => handle,
            None => FileHandle::open(self.runtime.clone(), &fixed, OpenMode::Read)
                .map_err(|Errno(errno)| open_failed(&fixed, errno, flags.no_fail, sink.as_ref()))?,
        };
        let size = handle
            .size()
            .map_err(|Errno(errno)| open_failed(&fixed, errno, flags.no_fail, sink.as_ref()))?;
        debug!(path = %fixed, size, "reader created");
        Ok(FileReader::new(handle, sink, size))
    }

    /// Open `path` for writing. Relative paths land in the configuration directory.
    ///
    /// # Errors
    /// `OpenFailed` if the file cannot be opened, or exists while
    /// `no_replace_existing` is set.
    pub fn create_file_writer(
        &self,
        path: &str,
        flags: WriteFlags,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<FileWriter, ArchiveError> {
        let fixed = fixup_separators(path);
        let target = self.resolver.rewrite_to_config(&fixed).unwrap_or(fixed);
        if flags.even_if_read_only {
            let _ = self.runtime.make_writable(&target);
        }
        if flags.no_replace_existing && self.exists(&target) {
            return Err(open_failed(&target, EEXIST, flags.no_fail, sink.as_ref()));
        }
        let mode = if flags.append {
            OpenMode::Append
        } else {
            OpenMode::Write
        };
        let handle = FileHandle::open(self.runtime.clone(), &target, mode)
            .map_err(|Errno(errno)| open_failed(&target, errno, flags.no_fail, sink.as_ref()))?;
        debug!(path = %target, ?mode, "writer created");
        Ok(FileWriter::new(handle, sink))
    }

    /// Remove `path`. A file that is already gone counts as removed unless
    /// `require_exists` is set.
    ///
    /// # Errors
    /// Returns the runtime's errno when the unlink fails.
    pub fn delete(&self, path: &str, require_exists: bool, even_read_only: bool) -> Result<(), Errno> {
        let fixed = fixup_separators(path);
        if even_read_only {
            let _ = self.runtime.make_writable(&fixed);
        }
        if self.runtime.unlink(&fixed) == 0 {
            return Ok(());
        }
        match self.runtime.get_errno() {
            ENOENT if !require_exists => Ok(()),
            errno => Err(Errno(errno)),
        }
    }

    /// Create the single directory `path`. Its parent must exist; an
    /// existing directory counts as created.
    ///
    /// # Errors
    /// Returns the runtime's errno when the directory cannot be created.
    pub fn make_directory(&self, path: &str) -> Result<(), Errno> {
        let fixed = fixup_separators(path);
        if self.runtime.mkdir(&fixed) == 0 {
            return Ok(());
        }
        match self.runtime.get_errno() {
            EEXIST if self.is_directory(&fixed) => Ok(()),
            errno => Err(Errno(errno)),
        }
    }

    /// Remove the empty directory `path`. A directory that is already gone
    /// counts as removed unless `require_exists` is set.
    ///
    /// # Errors
    /// Returns the runtime's errno, e.g. when the directory is not empty.
    pub fn delete_directory(&self, path: &str, require_exists: bool) -> Result<(), Errno> {
        let fixed = fixup_separators(path);
        if self.runtime.rmdir(&fixed) == 0 {
            return Ok(());
        }
        match self.runtime.get_errno() {
            ENOENT if !require_exists => Ok(()),
            errno => Err(Errno(errno)),
        }
    }

    /// Base names of the regular files matching the wildcard `pattern`.
    ///
    /// Only the last path component may contain wildcards. For a relative
    /// pattern the configuration directory is searched first, then the
    /// pattern as given; a name found in both places is listed once.
    /// An unreadable directory or a malformed pattern yields no names.
    #[must_use]
    pub fn find_files(&self, pattern: &str) -> Vec<String> {
        let fixed = fixup_separators(pattern);
        let mut found: Vec<String> = Vec::new();
        let locations = self.resolver.rewrite_to_config(&fixed).into_iter().chain([fixed]);
        for location in locations {
            for name in self.find_in_dir(&location) {
                if !found.contains(&name) {
                    found.push(name);
                }
            }
        }
        debug!(pattern, count = found.len(), "files found");
        found
    }

    fn find_in_dir(&self, pattern: &str) -> Vec<String> {
        let (dir, name) = match pattern.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((dir, name)) => (dir, name),
            None => (".", pattern),
        };
        let Ok(matcher) = Pattern::new(name) else {
            debug!(pattern, "malformed wildcard");
            return Vec::new();
        };
        let mut entries = Vec::new();
        if self.runtime.list_dir(dir, &mut entries) != 0 {
            return Vec::new();
        }
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|entry| !entry.is_dir && matcher.matches_with(&entry.name, options))
            .map(|entry| entry.name)
            .collect();
        names.sort();
        names
    }

    /// Length of `path`, or `None` if it cannot be opened.
    #[must_use]
    pub fn file_size(&self, path: &str) -> Option<u64> {
        let fixed = fixup_separators(path);
        let mut handle = FileHandle::open(self.runtime.clone(), &fixed, OpenMode::Read).ok()?;
        handle.size().ok()
    }

    fn exists(&self, path: &str) -> bool {
        FileHandle::open(self.runtime.clone(), path, OpenMode::Read).is_ok()
    }

    fn is_directory(&self, path: &str) -> bool {
        self.runtime.list_dir(path, &mut Vec::new()) == 0
    }
}

/// `mkdir` every prefix of `dir` that ends before a `/`, then `dir` itself.
fn make_config_dir(runtime: &dyn FileRuntime, dir: &str) -> Result<(), Errno> {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        return Ok(());
    }
    let prefixes = dir
        .match_indices('/')
        .map(|(i, _)| &dir[..i])
        .filter(|prefix| !prefix.is_empty())
        .chain([dir]);
    for prefix in prefixes {
        if runtime.mkdir(prefix) != 0 {
            match runtime.get_errno() {
                EEXIST => {}
                errno => return Err(Errno(errno)),
            }
        }
    }
    if runtime.list_dir(dir, &mut Vec::new()) != 0 {
        return Err(Errno(runtime.get_errno()));
    }
    Ok(())
}

fn open_failed(path: &str, errno: c_int, no_fail: bool, sink: &dyn ErrorSink) -> ArchiveError {
    let error = ArchiveError::OpenFailed {
        path: path.to_string(),
        errno,
    };
    if no_fail {
        sink.logf(format_args!("{error}"));
    } else {
        debug!(%error, "open failed");
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_runtime_mocked::{Recorder, Vfs};

    use crate::sink::WriteSink;

    fn manager() -> (Arc<Vfs>, FileManager) {
        let vfs = Arc::new(Vfs::new());
        let rt: Arc<dyn FileRuntime> = vfs.clone();
        (vfs, FileManager::with_resolver(rt, PathResolver::new("/cfg")))
    }

    #[test]
    fn reader_prefers_config_copy() {
        let (vfs, fm) = manager();
        vfs.add_file("User.ini", b"plain".to_vec());
        vfs.add_file("/cfg/User.ini", b"config".to_vec());

        let mut reader = fm
            .create_file_reader("User.ini", ReadFlags::default(), Arc::new(WriteSink::new(Recorder::new())))
            .unwrap();
        assert_eq!(reader.total_size(), 6);
        let mut buf = [0u8; 6];
        reader.serialize(&mut buf);
        assert_eq!(&buf, b"config");
    }

    #[test]
    fn missing_reader_without_no_fail_stays_quiet() {
        let (_vfs, fm) = manager();
        let recorder = Recorder::new();
        let err = fm
            .create_file_reader("nope", ReadFlags::default(), Arc::new(WriteSink::new(recorder.clone())))
            .unwrap_err();
        assert_eq!(
            err,
            ArchiveError::OpenFailed {
                path: "nope".to_string(),
                errno: ENOENT
            }
        );
        assert!(recorder.lines().is_empty());
    }
}
