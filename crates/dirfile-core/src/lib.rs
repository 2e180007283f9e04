//! Core engine for dirfiles: self-describing, frame-organized time-series
//! stores kept as a directory of schema fragments and raw sample files.
//!
//! This crate provides the building blocks behind the `dirfile` facade:
//!
//! - The element type registry: runtime type tags, typed values and sample
//!   vectors, and the sealed [`Sample`] trait (`types` module).
//! - The field descriptor model with one validated constructor per field kind
//!   (`entry` module) and a decoder for fixed-layout entry records (`wire`
//!   module).
//! - Fragments, their include tree and the namespace rules that turn names
//!   written inside a fragment into full field names (`fragment` and
//!   `namespace` modules), persisted as JSON documents (`schema` module).
//! - The field evaluation engine, which reads raw streams through pluggable
//!   codecs (`codec` module) and evaluates derived fields element-wise.
//! - Frame/sample addressing and per-field cursors (`io` module).
//!
//! The entry point is [`Dirfile`], an open handle combining all of the above.
//!
//! ```rust,ignore
//! use dirfile_core::{Dirfile, OpenOptions, SampleRange, entry::Entry, types::ElementType};
//!
//! let mut dirfile = Dirfile::open("run42", OpenOptions::new().create(true))?;
//! dirfile.add(Entry::raw("temp", ElementType::Float32, 4)?)?;
//! dirfile.put_data("temp", SampleRange::frames(0, 1), &[20.5f32, 20.6, 20.4, 20.5])?;
//! let frame = dirfile.get_data::<f64>("temp", SampleRange::frames(0, 1))?;
//! dirfile.close()?;
//! ```
#![deny(missing_docs)]
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod fragment;
pub mod io;
pub mod namespace;
pub mod schema;
pub mod storage;
pub mod types;
pub mod wire;

mod dirfile;
mod eval;

pub use config::{DirfileConfig, MplexLookback, OpenOptions, PhaseEdge, WindowFill};
pub use dirfile::{DeleteOptions, Dirfile, FieldFilter, RenamePolicy};
pub use error::{DirfileError, ErrorClass, Result, take_process_error_count};
pub use eval::MAX_RECURSION;
pub use io::{FrameRef, IoDirection, SampleRange, SeekOrigin};
pub use types::{ElementType, Sample, Samples, Value};
