//! Open raw sample streams of a dirfile.

use std::{collections::HashMap, path::Path};

use bytes::Bytes;
use snafu::prelude::*;

use crate::{
    codec::{CodecRegistry, RawStream, StreamMode, StreamSpec, raw_file_name},
    error::{Result, TypeSnafu, UnsupportedEncodingSnafu},
    fragment::Fragment,
    storage::{self, DirfileLocation},
    types::{ByteOrder, ElementType, Samples},
};

const SCRATCH_SUFFIX: &str = ".staged";

/// A raw field as seen by the stream layer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTarget<'a> {
    pub(crate) name: &'a str,
    pub(crate) data_type: ElementType,
    pub(crate) fragment: &'a Fragment,
}

impl RawTarget<'_> {
    pub(crate) fn file_name(&self) -> String {
        raw_file_name(self.name, self.fragment.encoding)
    }
}

/// A raw file written under a scratch name, waiting to replace the real one.
#[derive(Debug)]
#[must_use]
pub(crate) struct StagedFile {
    scratch: String,
    file_name: String,
}

impl StagedFile {
    /// Move the scratch file over the raw file.
    pub(crate) fn commit(self, location: &DirfileLocation) -> Result<()> {
        storage::rename(location, Path::new(&self.scratch), Path::new(&self.file_name))?;
        tracing::trace!(target: "dirfile", file = %self.file_name, "replaced raw file");
        Ok(())
    }

    /// Delete the scratch file, leaving the raw file untouched.
    pub(crate) fn abandon(&self, location: &DirfileLocation) {
        if let Err(e) = storage::remove_file(location, Path::new(&self.scratch)) {
            tracing::warn!(target: "dirfile", file = %self.scratch, error = %e, "failed to remove scratch file");
        }
    }
}

#[derive(Debug)]
struct OpenStream {
    stream: Box<dyn RawStream>,
    mode: StreamMode,
}

/// Streams keyed by field name, opened on first use.
///
/// A stream opened for reading is reopened for writing when a write
/// arrives. Synced streams stay open; closed streams reopen transparently.
#[derive(Debug, Default)]
pub(crate) struct StreamCache {
    open: HashMap<String, OpenStream>,
}

impl StreamCache {
    /// The stream of `target`, or `None` when reading a field that has no
    /// file yet.
    pub(crate) fn stream(
        &mut self,
        target: &RawTarget<'_>,
        mode: StreamMode,
        location: &DirfileLocation,
        codecs: &CodecRegistry,
    ) -> Result<Option<&mut dyn RawStream>> {
        let reopen = match self.open.get(target.name) {
            Some(open) => mode == StreamMode::ReadWrite && open.mode == StreamMode::Read,
            None => true,
        };
        if reopen {
            let encoding = target.fragment.encoding;
            let codec = codecs.get(encoding).context(UnsupportedEncodingSnafu {
                name: target.name,
                encoding,
            })?;
            let path = location.join(target.file_name());
            let spec = StreamSpec {
                path: &path,
                byte_order: target.fragment.byte_order,
                data_type: target.data_type,
                mode,
            };
            let stream = match codec.open(&spec) {
                Ok(stream) => stream,
                Err(e) if e.is_not_found() && mode == StreamMode::Read => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            self.open
                .insert(target.name.to_string(), OpenStream { stream, mode });
        }
        let Some(open) = self.open.get_mut(target.name) else {
            return Ok(None);
        };
        let stream: &mut dyn RawStream = open.stream.as_mut();
        Ok(Some(stream))
    }

    /// Number of samples stored for `target`.
    pub(crate) fn nsamples(
        &mut self,
        target: &RawTarget<'_>,
        location: &DirfileLocation,
        codecs: &CodecRegistry,
    ) -> Result<u64> {
        if !self.open.contains_key(target.name) && !storage::exists(location, Path::new(&target.file_name())) {
            return Ok(0);
        }
        match self.stream(target, StreamMode::Read, location, codecs)? {
            Some(stream) => Ok(stream.nsamples()?),
            None => Ok(0),
        }
    }

    /// Every stored sample of `target`.
    pub(crate) fn read_all(
        &mut self,
        target: &RawTarget<'_>,
        location: &DirfileLocation,
        codecs: &CodecRegistry,
    ) -> Result<Samples> {
        let n = self.nsamples(target, location, codecs)?;
        let bytes = match self.stream(target, StreamMode::Read, location, codecs)? {
            Some(stream) => stream.read(0, n as usize)?,
            None => Bytes::new(),
        };
        Samples::from_bytes(target.data_type, &bytes, ByteOrder::native())
            .context(TypeSnafu { name: target.name })
    }

    /// Write `samples` for `target` into a scratch file beside its raw file.
    ///
    /// Nothing visible changes until the returned [`StagedFile`] is
    /// committed, so a failed write leaves the existing file intact.
    pub(crate) fn stage(
        &mut self,
        target: &RawTarget<'_>,
        samples: &Samples,
        location: &DirfileLocation,
        codecs: &CodecRegistry,
    ) -> Result<StagedFile> {
        self.open.remove(target.name);
        let encoding = target.fragment.encoding;
        let codec = codecs.get(encoding).context(UnsupportedEncodingSnafu {
            name: target.name,
            encoding,
        })?;
        let bytes = samples
            .to_bytes(ByteOrder::native())
            .context(TypeSnafu { name: target.name })?;
        let staged = StagedFile {
            scratch: format!("{}{SCRATCH_SUFFIX}", target.file_name()),
            file_name: target.file_name(),
        };
        storage::remove_file(location, Path::new(&staged.scratch))?;
        let path = location.join(&staged.scratch);
        let spec = StreamSpec {
            path: &path,
            byte_order: target.fragment.byte_order,
            data_type: target.data_type,
            mode: StreamMode::ReadWrite,
        };
        let written = codec.open(&spec).and_then(|mut stream| {
            stream.write(0, &bytes)?;
            stream.sync()
        });
        if let Err(e) = written {
            staged.abandon(location);
            return Err(e.into());
        }
        Ok(staged)
    }

    /// Replace the file of `target` with `samples`.
    pub(crate) fn replace(
        &mut self,
        target: &RawTarget<'_>,
        samples: &Samples,
        location: &DirfileLocation,
        codecs: &CodecRegistry,
    ) -> Result<()> {
        self.stage(target, samples, location, codecs)?.commit(location)
    }

    /// Forget `name`'s stream without committing it.
    pub(crate) fn forget(&mut self, name: &str) {
        self.open.remove(name);
    }

    /// Commit `name`'s stream, keeping it open.
    pub(crate) fn sync(&mut self, name: &str) -> Result<()> {
        if let Some(open) = self.open.get_mut(name) {
            open.stream.sync()?;
        }
        Ok(())
    }

    /// Commit and close `name`'s stream.
    pub(crate) fn close(&mut self, name: &str) -> Result<()> {
        if let Some(mut open) = self.open.remove(name) {
            open.stream.sync()?;
            tracing::trace!(target: "dirfile", field = name, "closed raw stream");
        }
        Ok(())
    }

    pub(crate) fn sync_all(&mut self) -> Result<()> {
        for open in self.open.values_mut() {
            open.stream.sync()?;
        }
        Ok(())
    }

    pub(crate) fn close_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.open.keys().cloned().collect();
        for name in names {
            self.close(&name)?;
        }
        Ok(())
    }

    /// Drop every stream without committing.
    pub(crate) fn discard_all(&mut self) {
        self.open.clear();
    }
}
