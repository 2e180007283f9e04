//! Wrapper prelude.
//!
//! The `dirfile` crate is the supported public entry point. Downstream code
//! should prefer importing from this prelude instead of depending on internal
//! core module paths.

pub use crate::entry::{Entry, EntryKind, EntryParams, Scalar};
pub use crate::{
    DeleteOptions, Dirfile, DirfileConfig, DirfileError, ElementType, FieldFilter, IncludeOptions,
    IoDirection, OpenOptions, Protection, RenamePolicy, Sample, SampleRange, Samples, SeekOrigin,
    Value,
};
