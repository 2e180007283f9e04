//! Filesystem layout and path utilities.
//!
//! A dirfile is a directory. This module maps a [`DirfileLocation`] to the
//! files inside it and provides the small set of blocking file operations
//! the engine needs:
//!
//! - atomic write-then-rename replacement for fragment metadata documents;
//! - create-new semantics for exclusive fragment creation;
//! - reads that classify "not found" separately from other failures;
//! - directory preparation and truncation when a dirfile is created.
//!
//! Raw sample streams are opened through the codec layer, not here.

mod error;

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use snafu::prelude::*;

pub use error::StorageError;
use error::{IoSnafu, NotFoundSnafu};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Represents the location of a dirfile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirfileLocation {
    /// A dirfile stored on the local filesystem at the given directory.
    Local(PathBuf),
}

impl DirfileLocation {
    /// Creates a new `DirfileLocation` for a local directory.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        DirfileLocation::Local(root.into())
    }

    /// The dirfile directory.
    pub fn root(&self) -> &Path {
        match self {
            DirfileLocation::Local(root) => root,
        }
    }

    /// Join a path relative to the dirfile directory.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root().join(rel)
    }
}

fn io_context(path: &Path) -> IoSnafu<String> {
    IoSnafu {
        path: path.display().to_string(),
    }
}

fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent).context(io_context(parent))?;
    }
    Ok(())
}

/// Guard that removes a temporary file on drop unless disarmed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn temp_path(abs: &Path) -> PathBuf {
    let mut name = abs.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    abs.with_file_name(name)
}

/// Write `contents` to `rel_path` inside `location` using an atomic write.
///
/// The payload goes to a temporary sibling file, which is synced and then
/// renamed over the target. A failure at any step leaves the previous
/// contents of the target in place and removes the temporary file.
pub fn write_atomic(location: &DirfileLocation, rel_path: &Path, contents: &[u8]) -> StorageResult<()> {
    let abs = location.join(rel_path);
    create_parent_dir(&abs)?;

    let tmp_path = temp_path(&abs);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path).context(io_context(&tmp_path))?;
        file.write_all(contents).context(io_context(&tmp_path))?;
        file.sync_all().context(io_context(&tmp_path))?;
    }

    fs::rename(&tmp_path, &abs).context(io_context(&abs))?;
    guard.disarm();

    tracing::trace!(target: "dirfile", path = %abs.display(), bytes = contents.len(), "atomic write");
    Ok(())
}

/// Read the file at `rel_path` as a `String`.
///
/// A missing file yields [`StorageError::NotFound`]; every other failure is
/// [`StorageError::Io`].
pub fn read_to_string(location: &DirfileLocation, rel_path: &Path) -> StorageResult<String> {
    let abs = location.join(rel_path);
    match fs::read_to_string(&abs) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(e).context(NotFoundSnafu {
                path: abs.display().to_string(),
            })
        }
        Err(e) => Err(e).context(io_context(&abs)),
    }
}

/// Create a *new* file at `rel_path` and write `contents`, failing with
/// [`StorageError::AlreadyExists`] if the file already exists.
pub fn write_new(location: &DirfileLocation, rel_path: &Path, contents: &[u8]) -> StorageResult<()> {
    let abs = location.join(rel_path);
    create_parent_dir(&abs)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&abs)
        .map_err(|e| StorageError::from_io(&abs, e))?;

    file.write_all(contents).context(io_context(&abs))?;
    file.sync_all().context(io_context(&abs))?;
    Ok(())
}

/// Whether `rel_path` exists inside `location`.
pub fn exists(location: &DirfileLocation, rel_path: &Path) -> bool {
    location.join(rel_path).exists()
}

/// Length in bytes of the file at `rel_path`; a missing file has length zero.
pub fn file_len(location: &DirfileLocation, rel_path: &Path) -> StorageResult<u64> {
    let abs = location.join(rel_path);
    match fs::metadata(&abs) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e).context(io_context(&abs)),
    }
}

/// Remove the file at `rel_path`. Removing a missing file is not an error.
pub fn remove_file(location: &DirfileLocation, rel_path: &Path) -> StorageResult<()> {
    let abs = location.join(rel_path);
    match fs::remove_file(&abs) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(io_context(&abs)),
    }
}

/// Rename a file inside the dirfile. A missing source is reported as
/// [`StorageError::NotFound`].
pub fn rename(location: &DirfileLocation, from: &Path, to: &Path) -> StorageResult<()> {
    let src = location.join(from);
    let dst = location.join(to);
    create_parent_dir(&dst)?;
    fs::rename(&src, &dst).map_err(|e| StorageError::from_io(&src, e))
}

/// Make sure the dirfile directory exists.
pub fn ensure_root(location: &DirfileLocation) -> StorageResult<()> {
    let root = location.root();
    fs::create_dir_all(root).context(io_context(root))
}

/// Delete the contents of the dirfile directory.
///
/// Regular files are always removed. Subdirectories are removed only when
/// `subdirectories` is set; otherwise they are left untouched.
pub fn clear_dir(location: &DirfileLocation, subdirectories: bool) -> StorageResult<()> {
    let root = location.root();
    let entries = fs::read_dir(root).map_err(|e| StorageError::from_io(root, e))?;
    for entry in entries {
        let entry = entry.context(io_context(root))?;
        let path = entry.path();
        let file_type = entry.file_type().context(io_context(&path))?;
        if file_type.is_dir() {
            if subdirectories {
                fs::remove_dir_all(&path).context(io_context(&path))?;
            }
        } else {
            fs::remove_file(&path).context(io_context(&path))?;
        }
    }
    tracing::debug!(target: "dirfile", root = %root.display(), subdirectories, "truncated dirfile directory");
    Ok(())
}

/// Fail with [`StorageError::AlreadyExists`] if `rel_path` exists.
pub fn ensure_absent(location: &DirfileLocation, rel_path: &Path) -> StorageResult<()> {
    let abs = location.join(rel_path);
    if abs.exists() {
        return Err(StorageError::from_io(
            &abs,
            io::Error::from(io::ErrorKind::AlreadyExists),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn create_test_location() -> Result<(TempDir, DirfileLocation), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let location = DirfileLocation::local(tmp.path());
        Ok((tmp, location))
    }

    #[test]
    fn write_atomic_creates_file_with_contents() -> TestResult {
        let (tmp, location) = create_test_location()?;
        write_atomic(&location, Path::new("format"), b"hello")?;
        assert_eq!(fs::read(tmp.path().join("format"))?, b"hello");
        Ok(())
    }

    #[test]
    fn write_atomic_overwrites_and_leaves_no_tmp_file() -> TestResult {
        let (tmp, location) = create_test_location()?;
        write_atomic(&location, Path::new("format"), b"first")?;
        write_atomic(&location, Path::new("format"), b"second")?;
        assert_eq!(fs::read_to_string(tmp.path().join("format"))?, "second");
        assert!(!tmp.path().join("format.tmp").exists());
        Ok(())
    }

    #[test]
    fn write_atomic_creates_parent_directories() -> TestResult {
        let (tmp, location) = create_test_location()?;
        write_atomic(&location, Path::new("sub/dir/frag"), b"x")?;
        assert!(tmp.path().join("sub/dir/frag").exists());
        Ok(())
    }

    #[test]
    fn read_to_string_returns_not_found_for_missing_file() -> TestResult {
        let (_tmp, location) = create_test_location()?;
        let err = read_to_string(&location, Path::new("missing")).unwrap_err();
        assert!(err.is_not_found(), "{err}");
        Ok(())
    }

    #[test]
    fn write_new_fails_if_file_exists() -> TestResult {
        let (_tmp, location) = create_test_location()?;
        write_new(&location, Path::new("frag"), b"a")?;
        let err = write_new(&location, Path::new("frag"), b"b").unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }), "{err}");
        assert_eq!(read_to_string(&location, Path::new("frag"))?, "a");
        Ok(())
    }

    #[test]
    fn ensure_absent_reports_existing_files() -> TestResult {
        let (_tmp, location) = create_test_location()?;
        ensure_absent(&location, Path::new("frag"))?;
        write_new(&location, Path::new("frag"), b"")?;
        assert!(matches!(
            ensure_absent(&location, Path::new("frag")),
            Err(StorageError::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[test]
    fn clear_dir_keeps_subdirectories_unless_asked() -> TestResult {
        let (tmp, location) = create_test_location()?;
        write_new(&location, Path::new("data"), b"1234")?;
        write_new(&location, Path::new("sub/frag"), b"")?;

        clear_dir(&location, false)?;
        assert!(!tmp.path().join("data").exists());
        assert!(tmp.path().join("sub/frag").exists());

        clear_dir(&location, true)?;
        assert!(!tmp.path().join("sub").exists());
        Ok(())
    }

    #[test]
    fn file_len_and_remove_tolerate_missing_files() -> TestResult {
        let (_tmp, location) = create_test_location()?;
        assert_eq!(file_len(&location, Path::new("nothing"))?, 0);
        remove_file(&location, Path::new("nothing"))?;
        write_new(&location, Path::new("data"), b"12345")?;
        assert_eq!(file_len(&location, Path::new("data"))?, 5);
        rename(&location, Path::new("data"), Path::new("renamed"))?;
        assert!(exists(&location, Path::new("renamed")));
        assert!(!exists(&location, Path::new("data")));
        Ok(())
    }
}
