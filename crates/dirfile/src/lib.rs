//! # dirfile
//!
//! Self-describing, frame-organized time-series store kept as a directory of
//! schema fragments and raw sample files.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dirfile::prelude::*;
//!
//! let mut df = Dirfile::open("run42", OpenOptions::new().create(true))?;
//! df.add(Entry::raw("temp", ElementType::Float32, 4)?)?;
//! df.put_data("temp", SampleRange::frames(0, 1), &[20.5f32, 20.6, 20.4, 20.5])?;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Field definitions.
pub mod entry {
    pub use dirfile_core::entry::{
        Entry, EntryError, EntryFlags, EntryKind, EntryParams, INDEX_FIELD, LincomTerm, MAX_LINCOM,
        MAX_POLYORD, Scalar, Threshold, WindowOp,
    };
}

/// Fixed-layout entry records.
pub mod wire {
    pub use dirfile_core::wire::{Abi, RecordLayout, WireError, decode, decode_with, encode, encode_with};
}

/// Raw sample encodings and codec backends.
pub mod codec {
    pub use dirfile_core::codec::{
        CodecRegistry, Encoding, EncodingSupport, RawStream, SampleCodec, StreamMode, StreamSpec,
        UnencodedCodec,
    };
}

pub use dirfile_core::config::{DirfileConfig, MplexLookback, OpenOptions, PhaseEdge, WindowFill};
pub use dirfile_core::error::{DirfileError, ErrorClass, Guarded, Result, take_process_error_count};
pub use dirfile_core::fragment::{Fragment, IncludeOptions, Protection};
pub use dirfile_core::io::{FrameRef, IoDirection, SampleRange, SeekOrigin};
pub use dirfile_core::storage::DirfileLocation;
pub use dirfile_core::types::{ByteOrder, Complex, ElementType, Sample, Samples, Value, classify_any};
pub use dirfile_core::{DeleteOptions, Dirfile, FieldFilter, MAX_RECURSION, RenamePolicy};
