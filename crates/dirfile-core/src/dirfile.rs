//! The open dirfile handle.
//!
//! A [`Dirfile`] owns the fragment list, the table of every defined field,
//! the open raw streams and the per-field I/O cursors. Its operations are
//! split by concern across the submodules:
//!
//! - `load`: opening, loading the fragment tree, metadata flush and reload;
//! - `fragments`: include/uninclude and fragment attribute edits;
//! - `fields`: adding, altering, deleting, renaming and listing fields;
//! - `data`: sample reads and writes, cursors, sizes and stream lifecycle;
//! - `constants`: CONST, CARRAY, STRING and SARRAY values.
//!
//! Every failing public operation is also counted in the handle's error
//! channel (see [`Dirfile::error_count`]).

mod constants;
mod data;
mod fields;
mod fragments;
mod load;

#[cfg(test)]
pub(crate) mod test_util;

use std::{cell::RefCell, collections::HashMap, sync::Arc};

use snafu::prelude::*;

pub use fields::{DeleteOptions, FieldFilter, RenamePolicy};

use crate::{
    codec::{CodecRegistry, Encoding, EncodingSupport, SampleCodec},
    config::{DirfileConfig, MplexLookback, OpenOptions, PhaseEdge, WindowFill},
    error::{
        ErrorLog, FragmentNotFoundSnafu, Guarded, ProtectedSnafu, ReadOnlySnafu,
        Result,
    },
    eval::{Evaluator, linterp::TableCache, streams::StreamCache},
    fragment::Fragment,
    io::Position,
    namespace::FieldTable,
    storage::DirfileLocation,
};

/// An open dirfile.
///
/// A handle is single-threaded: it is `Send` but not `Sync`, and every
/// operation runs to completion before returning.
#[derive(Debug)]
pub struct Dirfile {
    location: DirfileLocation,
    options: OpenOptions,
    config: DirfileConfig,
    fragments: Vec<Fragment>,
    fields: FieldTable,
    codecs: CodecRegistry,
    streams: RefCell<StreamCache>,
    tables: RefCell<TableCache>,
    positions: RefCell<HashMap<String, Position>>,
    errors: ErrorLog,
}

impl Dirfile {
    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator {
            fields: &self.fields,
            fragments: &self.fragments,
            config: &self.config,
            location: &self.location,
            codecs: &self.codecs,
            streams: &self.streams,
            tables: &self.tables,
        }
    }

    /// Count a failed result in the error channel and pass it on.
    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.errors.record(err);
        }
        result
    }

    fn ensure_writable(&self) -> Result<()> {
        ensure!(self.options.write, ReadOnlySnafu);
        Ok(())
    }

    fn fragment_checked(&self, index: usize) -> Result<&Fragment> {
        self.fragments
            .get(index)
            .context(FragmentNotFoundSnafu { index })
    }

    /// Fail unless fragment `index` exists and permits edits of kind `guard`.
    fn ensure_unprotected(&self, index: usize, guard: Guarded) -> Result<()> {
        self.ensure_writable()?;
        let fragment = self.fragment_checked(index)?;
        ensure!(
            !fragment.protection.protects(guard),
            ProtectedSnafu {
                fragment: index,
                guard
            }
        );
        Ok(())
    }

    fn mark_dirty(&mut self, index: usize) {
        if let Some(fragment) = self.fragments.get_mut(index) {
            fragment.dirty = true;
        }
    }

    /// Directory of the dirfile.
    pub fn location(&self) -> &DirfileLocation {
        &self.location
    }

    /// Fragment `index`.
    pub fn fragment(&self, index: usize) -> Result<&Fragment> {
        self.track(self.fragment_checked(index))
    }

    /// Every fragment, root first.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Number of fragments.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Current evaluation policy.
    pub fn config(&self) -> &DirfileConfig {
        &self.config
    }

    /// Return and reset the number of errors this handle has recorded.
    pub fn error_count(&self) -> u64 {
        self.errors.take_count()
    }

    /// Message of the most recent error.
    pub fn last_error(&self) -> Option<String> {
        self.errors.last()
    }

    /// Print recorded errors to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.verbose = verbose;
        self.errors.set_verbose(verbose);
    }

    /// Text printed before each verbose diagnostic.
    pub fn set_verbose_prefix(&mut self, prefix: Option<String>) {
        self.errors.set_prefix(prefix.clone());
        self.config.verbose_prefix = prefix;
    }

    /// Pretty-print fragment documents on the next flush.
    pub fn set_pretty_print(&mut self, pretty: bool) {
        self.options.pretty = pretty;
    }

    /// How far back MPLEX fields search.
    pub fn set_mplex_lookback(&mut self, lookback: MplexLookback) {
        self.config.mplex_lookback = lookback;
    }

    /// What WINDOW fields produce where the check fails.
    pub fn set_window_fill(&mut self, fill: WindowFill) {
        self.config.window_fill = fill;
    }

    /// What PHASE fields do at the ends of their input.
    pub fn set_phase_edge(&mut self, edge: PhaseEdge) {
        self.config.phase_edge = edge;
    }

    /// Register the backend of an encoding, replacing any previous one.
    pub fn register_codec(&mut self, codec: Arc<dyn SampleCodec>) {
        if let Err(err) = self.streams.get_mut().close_all() {
            self.errors.record(&err);
        }
        self.codecs.register_codec(codec);
    }

    /// Whether samples of `encoding` can be read or written.
    pub fn encoding_support(&self, encoding: Encoding) -> EncodingSupport {
        self.codecs.encoding_support(encoding)
    }

    /// Flush metadata and every raw stream, then close the handle.
    pub fn close(mut self) -> Result<()> {
        let result = self.close_inner();
        self.track(result)
    }

    fn close_inner(&mut self) -> Result<()> {
        if self.options.write {
            self.metaflush_inner()?;
        }
        self.streams.get_mut().close_all()?;
        tracing::debug!(target: "dirfile", root = %self.location.root().display(), "closed dirfile");
        Ok(())
    }

    /// Close the handle without writing pending metadata.
    pub fn discard(mut self) -> Result<()> {
        self.streams.get_mut().discard_all();
        let dirty = self.fragments.iter().filter(|f| f.dirty).count();
        tracing::debug!(target: "dirfile", dirty, "discarded dirfile");
        Ok(())
    }
}
