use std::{io, path::Path};

use snafu::{Backtrace, prelude::*};

/// Failure of a file operation inside the dirfile directory.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// A file or directory the operation needs is missing.
    #[snafu(display("no such file: {path}"))]
    NotFound {
        /// Path of the missing file.
        path: String,
        /// Error reported by the filesystem.
        source: io::Error,
        /// Where the failure was detected.
        backtrace: Backtrace,
    },

    /// A file that must be created fresh is already there.
    #[snafu(display("file exists: {path}"))]
    AlreadyExists {
        /// Path of the existing file.
        path: String,
        /// Error reported by the filesystem.
        source: io::Error,
        /// Where the failure was detected.
        backtrace: Backtrace,
    },

    /// Any other filesystem failure.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        /// Path being accessed.
        path: String,
        /// Error reported by the filesystem.
        source: io::Error,
        /// Where the failure was detected.
        backtrace: Backtrace,
    },
}

impl StorageError {
    /// Sort an I/O error on `path` into the variant matching its kind.
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.display().to_string();
        let backtrace = Backtrace::capture();
        match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound {
                path,
                source,
                backtrace,
            },
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                path,
                source,
                backtrace,
            },
            _ => StorageError::Io {
                path,
                source,
                backtrace,
            },
        }
    }

    /// True for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
