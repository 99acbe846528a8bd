//! Rotating file writer with size-based rotation and backup retention.
//!
//! Used both as the `tracing` log sink and as the append-only store behind
//! [`JsonlReporter`](crate::errors::JsonlReporter). The active file is rotated
//! once it grows past a size threshold, and only a fixed number of backups is
//! kept so disk usage stays bounded.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Default maximum file size before rotation (10 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Default number of backup files retained after rotation.
pub const DEFAULT_MAX_BACKUP_FILES: usize = 3;

struct WriterState {
    file: Option<File>,
    rotations: u64,
}

/// Thread-safe rotating file writer.
///
/// # Rotation Strategy
///
/// 1. Check the file size before each write
/// 2. If it exceeds the limit, rotate:
///    - Rename the current file to `<file name>.<unix millis>-<n>`
///    - Reopen a fresh file on the next write
///    - Remove the oldest backups beyond the retention limit
///
/// The file (and its parent directory) is created lazily on first write, so
/// construction never fails.
///
/// `&FileWriter` implements [`io::Write`], which makes `Arc<FileWriter>` usable
/// directly as a `tracing-subscriber` writer.
///
/// # Example
///
/// ```rust
/// use pageshell::observability::FileWriter;
///
/// let dir = std::env::temp_dir().join("pageshell-doc-writer");
/// let writer = FileWriter::new(dir.join("events.jsonl"));
/// writer.write_line(r#"{"event":"test"}"#)?;
/// # std::fs::remove_dir_all(&dir).ok();
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct FileWriter {
    file_path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    state: Mutex<WriterState>,
}

impl FileWriter {
    /// Creates a writer with the default rotation limits.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self::with_limits(file_path, DEFAULT_MAX_FILE_SIZE_BYTES, DEFAULT_MAX_BACKUP_FILES)
    }

    /// Creates a writer that rotates past `max_bytes` and keeps `max_backups` backups.
    pub fn with_limits(file_path: impl Into<PathBuf>, max_bytes: u64, max_backups: usize) -> Self {
        Self {
            file_path: file_path.into(),
            max_bytes,
            max_backups,
            state: Mutex::new(WriterState {
                file: None,
                rotations: 0,
            }),
        }
    }

    /// Path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Writes `line` followed by a newline, rotating first if necessary.
    ///
    /// # Errors
    ///
    /// Fails on permission problems, a full disk, or a poisoned lock.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.append(&buf)
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, WriterState>> {
        self.state
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Mutex poisoned: {e}")))
    }

    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock()?;
        self.check_and_rotate(&mut state)?;

        if state.file.is_none() {
            if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?;
            state.file = Some(file);
        }

        let file = state
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "No file available"))?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn check_and_rotate(&self, state: &mut WriterState) -> io::Result<()> {
        if let Ok(metadata) = fs::metadata(&self.file_path) {
            if metadata.len() > self.max_bytes {
                state.file = None;
                state.rotations += 1;
                self.rotate_files(state.rotations)?;
            }
        }
        Ok(())
    }

    fn backup_prefix(&self) -> io::Result<String> {
        self.file_path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|name| format!("{name}."))
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Invalid file name"))
    }

    fn rotate_files(&self, sequence: u64) -> io::Result<()> {
        let millis = chrono::Utc::now().timestamp_millis();
        let backup_path = self
            .file_path
            .with_file_name(format!("{}{millis}-{sequence}", self.backup_prefix()?));

        if self.file_path.exists() {
            fs::rename(&self.file_path, &backup_path)?;
        }

        self.cleanup_old_backups()
    }

    /// Deletes backups beyond the retention limit, newest kept.
    ///
    /// Individual deletion errors are ignored so cleanup always finishes.
    fn cleanup_old_backups(&self) -> io::Result<()> {
        let parent_dir = match self.file_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = self.backup_prefix()?;

        let mut backups: Vec<PathBuf> = fs::read_dir(parent_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();

        backups.sort_by(|a, b| {
            let a_time = fs::metadata(a).and_then(|m| m.modified()).ok();
            let b_time = fs::metadata(b).and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time).then_with(|| b.cmp(a))
        });

        for old_backup in backups.iter().skip(self.max_backups) {
            let _ = fs::remove_file(old_backup);
        }

        Ok(())
    }
}

impl Write for &FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.lock()?;
        match state.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWriter")
            .field("file_path", &self.file_path)
            .field("max_bytes", &self.max_bytes)
            .field("max_backups", &self.max_backups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backups(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.file_name().unwrap().to_str().unwrap().starts_with("log.jsonl."))
            .collect()
    }

    #[test]
    fn creates_parent_directories_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/log.jsonl");
        let writer = FileWriter::new(&path);
        assert!(!path.exists());

        writer.write_line("one").unwrap();
        writer.write_line("two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn rotates_and_bounds_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let writer = FileWriter::with_limits(&path, 16, 2);

        for n in 0..20 {
            writer.write_line(&format!("line number {n}")).unwrap();
        }

        assert!(fs::metadata(&path).unwrap().len() <= 32);
        let kept = backups(dir.path());
        assert!(!kept.is_empty());
        assert!(kept.len() <= 2);
    }

    #[test]
    fn io_write_appends_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.log");
        let writer = FileWriter::new(&path);

        let mut handle = &writer;
        handle.write_all(b"abc").unwrap();
        handle.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
    }
}
