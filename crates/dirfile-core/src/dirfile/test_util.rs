//! Helpers shared by the handle's unit tests.

use std::{io, path::Path};

use bytes::Bytes;

use crate::{
    codec::{Encoding, RawStream, SampleCodec, StreamSpec},
    storage::{StorageError, StorageResult},
};

/// A gzip "backend" that creates its file and then fails every write.
#[derive(Debug)]
pub(crate) struct FullDiskCodec;

#[derive(Debug)]
struct FullDiskStream;

impl RawStream for FullDiskStream {
    fn read(&mut self, _first: u64, _count: usize) -> StorageResult<Bytes> {
        Ok(Bytes::new())
    }

    fn write(&mut self, _first: u64, _data: &[u8]) -> StorageResult<()> {
        Err(StorageError::from_io(Path::new("disk"), io::Error::other("no space left")))
    }

    fn nsamples(&mut self) -> StorageResult<u64> {
        Ok(0)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

impl SampleCodec for FullDiskCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Gzip
    }

    fn open(&self, spec: &StreamSpec<'_>) -> StorageResult<Box<dyn RawStream>> {
        std::fs::File::create(spec.path).map_err(|e| StorageError::from_io(spec.path, e))?;
        Ok(Box::new(FullDiskStream))
    }
}

/// Names of files in `dir` left behind by an interrupted raw file rewrite.
pub(crate) fn staged_leftovers(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".staged") {
            names.push(name);
        }
    }
    Ok(names)
}
