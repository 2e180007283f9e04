//! Error types and the error channel of an open dirfile.
//!
//! [`DirfileError`] is the error returned by every public dirfile operation.
//! It wraps the per-module errors ([`EntryError`], [`WireError`],
//! [`TypeError`], [`StorageError`], [`SchemaError`]) and adds the lookup,
//! graph, range and protection failures detected by the engine itself.
//! [`DirfileError::class`] maps each variant onto an [`ErrorClass`].
//!
//! Besides returning the error, each dirfile counts it. The per-handle count
//! is drained with `Dirfile::error_count`; a process-wide count is drained
//! with [`take_process_error_count`].

use std::{
    cell::{Cell, RefCell},
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use snafu::prelude::*;

use crate::{
    codec::Encoding,
    entry::{EntryError, EntryKind},
    schema::SchemaError,
    storage::StorageError,
    types::TypeError,
    wire::WireError,
};

/// Result type of dirfile operations.
pub type Result<T, E = DirfileError> = std::result::Result<T, E>;

/// Which kind of protection an edit ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    /// Field definitions and fragment attributes.
    Format,
    /// Raw sample data.
    Data,
}

impl fmt::Display for Guarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Guarded::Format => "format",
            Guarded::Data => "data",
        })
    }
}

/// Errors from dirfile operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DirfileError {
    /// No field has this name.
    #[snafu(display("field not found: {name}"))]
    FieldNotFound {
        /// Name looked up.
        name: String,
    },

    /// No fragment has this index.
    #[snafu(display("fragment {index} does not exist"))]
    FragmentNotFound {
        /// Index looked up.
        index: usize,
    },

    /// A field with this name is already defined.
    #[snafu(display("duplicate field name: {name}"))]
    DuplicateField {
        /// The clashing name.
        name: String,
    },

    /// The field exists but has the wrong kind for the operation.
    #[snafu(display("field {name} is {kind}, expected {expected}"))]
    WrongKind {
        /// Field name.
        name: String,
        /// Its kind.
        kind: EntryKind,
        /// What the operation needs.
        expected: &'static str,
    },

    /// An entry failed validation.
    #[snafu(display("invalid entry: {source}"))]
    Entry {
        /// Validation failure.
        source: EntryError,
    },

    /// A wire record could not be decoded or encoded.
    #[snafu(display("entry record error: {source}"))]
    Wire {
        /// Underlying record error.
        source: WireError,
    },

    /// A value could not be represented in the requested type.
    #[snafu(display("type error on {name}: {source}"))]
    Type {
        /// Field being accessed.
        name: String,
        /// Underlying conversion error.
        source: TypeError,
    },

    /// Samples cannot be written through this field.
    #[snafu(display("cannot write to {kind} field {name}"))]
    NotWritable {
        /// Field name.
        name: String,
        /// Its kind.
        kind: EntryKind,
    },

    /// A replacement array has the wrong length.
    #[snafu(display("{name} holds {expected} elements, got {found}"))]
    ArrayLength {
        /// Field name.
        name: String,
        /// Current length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },

    /// Evaluating the field would revisit itself.
    #[snafu(display("circular dependency through field {name}"))]
    Cycle {
        /// A field on the cycle.
        name: String,
    },

    /// An alias points at a field that does not exist.
    #[snafu(display("alias {name} points to missing field {target}"))]
    DanglingAlias {
        /// The alias.
        name: String,
        /// Its missing target.
        target: String,
    },

    /// The derivation chain is deeper than the evaluator allows.
    #[snafu(display("derivation of {name} is nested more than {limit} levels"))]
    RecursionLimit {
        /// Field being evaluated.
        name: String,
        /// Maximum depth.
        limit: usize,
    },

    /// The field is still referenced by another field.
    #[snafu(display("field {name} is referenced by {by}"))]
    Referenced {
        /// Field being removed or moved.
        name: String,
        /// A referencing field.
        by: String,
    },

    /// A read or write of zero samples was requested.
    #[snafu(display("empty request on field {name}"))]
    EmptyRequest {
        /// Field accessed.
        name: String,
    },

    /// An index sample or array slice falls outside its array.
    #[snafu(display("index {index} out of bounds for {name} of length {len}"))]
    IndexOutOfBounds {
        /// Array field.
        name: String,
        /// Offending index.
        index: i64,
        /// Array length.
        len: usize,
    },

    /// A PHASE field reaches outside its input stream.
    #[snafu(display("phase shift {shift} of {name} reaches sample {sample}, outside the input"))]
    PhaseOutOfRange {
        /// PHASE field.
        name: String,
        /// Its shift.
        shift: i64,
        /// First sample outside the input.
        sample: i64,
    },

    /// A frame or sample position is before the start of the field.
    #[snafu(display("position {position} is before the start of {name}"))]
    BadPosition {
        /// Field accessed.
        name: String,
        /// The position in samples.
        position: i64,
    },

    /// An argument is outside the domain of the operation.
    #[snafu(display("{name}: {reason}"))]
    Domain {
        /// Field accessed.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// The fragment is protected against this edit.
    #[snafu(display("fragment {fragment} is {guard}-protected"))]
    Protected {
        /// Fragment index.
        fragment: usize,
        /// The violated protection.
        guard: Guarded,
    },

    /// The dirfile was opened read-only.
    #[snafu(display("dirfile is opened read-only"))]
    ReadOnly,

    /// Filesystem or codec failure.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },

    /// A fragment document is corrupt.
    #[snafu(display("schema error: {source}"))]
    Schema {
        /// Underlying document error.
        source: SchemaError,
    },

    /// No backend is registered for the encoding.
    #[snafu(display("encoding {encoding} of field {name} is not supported"))]
    UnsupportedEncoding {
        /// Raw field.
        name: String,
        /// Its encoding.
        encoding: Encoding,
    },

    /// A LINTERP table could not be used.
    #[snafu(display("bad lookup table {path}: {reason}"))]
    BadTable {
        /// Table path.
        path: String,
        /// What is wrong.
        reason: String,
    },
}

/// Broad category of a [`DirfileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A field or fragment is missing or duplicated.
    Lookup,
    /// An entry, record or value has the wrong shape.
    Shape,
    /// The field graph is cyclic, dangling or too deep.
    Graph,
    /// A request falls outside valid bounds.
    Range,
    /// An edit hit fragment protection or a read-only handle.
    Protection,
    /// The filesystem, a codec or a document failed.
    Io,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorClass::Lookup => "lookup",
            ErrorClass::Shape => "shape",
            ErrorClass::Graph => "graph",
            ErrorClass::Range => "range",
            ErrorClass::Protection => "protection",
            ErrorClass::Io => "io",
        })
    }
}

impl DirfileError {
    /// The category of this error.
    pub fn class(&self) -> ErrorClass {
        use DirfileError::*;
        match self {
            FieldNotFound { .. } | FragmentNotFound { .. } | DuplicateField { .. } | WrongKind { .. } => {
                ErrorClass::Lookup
            }
            Entry { .. } | Wire { .. } | Type { .. } | NotWritable { .. } | ArrayLength { .. } => {
                ErrorClass::Shape
            }
            Cycle { .. } | DanglingAlias { .. } | RecursionLimit { .. } | Referenced { .. } => ErrorClass::Graph,
            EmptyRequest { .. }
            | IndexOutOfBounds { .. }
            | PhaseOutOfRange { .. }
            | BadPosition { .. }
            | Domain { .. } => ErrorClass::Range,
            Protected { .. } | ReadOnly => ErrorClass::Protection,
            Storage { .. } | Schema { .. } | UnsupportedEncoding { .. } | BadTable { .. } => ErrorClass::Io,
        }
    }
}

impl From<StorageError> for DirfileError {
    fn from(source: StorageError) -> Self {
        DirfileError::Storage { source }
    }
}

impl From<EntryError> for DirfileError {
    fn from(source: EntryError) -> Self {
        DirfileError::Entry { source }
    }
}

impl From<SchemaError> for DirfileError {
    fn from(source: SchemaError) -> Self {
        DirfileError::Schema { source }
    }
}

static PROCESS_ERRORS: AtomicU64 = AtomicU64::new(0);

/// Return and reset the number of errors recorded by every dirfile in the process.
pub fn take_process_error_count() -> u64 {
    PROCESS_ERRORS.swap(0, Ordering::Relaxed)
}

/// Per-handle error counter and last message.
#[derive(Debug, Default)]
pub(crate) struct ErrorLog {
    count: Cell<u64>,
    last: RefCell<Option<String>>,
    verbose: Cell<bool>,
    prefix: RefCell<Option<String>>,
}

impl ErrorLog {
    pub(crate) fn new(verbose: bool, prefix: Option<String>) -> Self {
        Self {
            verbose: Cell::new(verbose),
            prefix: RefCell::new(prefix),
            ..Self::default()
        }
    }

    /// Count `err`, remember its message and print it in verbose mode.
    pub(crate) fn record(&self, err: &DirfileError) {
        self.count.set(self.count.get() + 1);
        PROCESS_ERRORS.fetch_add(1, Ordering::Relaxed);
        let message = err.to_string();
        tracing::warn!(target: "dirfile", class = %err.class(), error = %message, "operation failed");
        if self.verbose.get() {
            match self.prefix.borrow().as_deref() {
                Some(prefix) => eprintln!("{prefix}{message}"),
                None => eprintln!("{message}"),
            }
        }
        *self.last.borrow_mut() = Some(message);
    }

    pub(crate) fn take_count(&self) -> u64 {
        self.count.replace(0)
    }

    pub(crate) fn last(&self) -> Option<String> {
        self.last.borrow().clone()
    }

    pub(crate) fn set_verbose(&self, verbose: bool) {
        self.verbose.set(verbose);
    }

    pub(crate) fn set_prefix(&self, prefix: Option<String>) {
        *self.prefix.borrow_mut() = prefix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_the_taxonomy() {
        let lookup = DirfileError::FieldNotFound { name: "x".into() };
        assert_eq!(lookup.class(), ErrorClass::Lookup);
        let graph = DirfileError::Cycle { name: "a".into() };
        assert_eq!(graph.class(), ErrorClass::Graph);
        let range = DirfileError::EmptyRequest { name: "a".into() };
        assert_eq!(range.class(), ErrorClass::Range);
        let protection = DirfileError::Protected {
            fragment: 0,
            guard: Guarded::Format,
        };
        assert_eq!(protection.class(), ErrorClass::Protection);
        assert_eq!(protection.to_string(), "fragment 0 is format-protected");
        let shape = DirfileError::Wire {
            source: WireError::UnknownKind { code: 0x99 },
        };
        assert_eq!(shape.class(), ErrorClass::Shape);
    }

    #[test]
    fn log_counts_and_drains() {
        let log = ErrorLog::new(false, None);
        log.record(&DirfileError::ReadOnly);
        log.record(&DirfileError::FieldNotFound { name: "x".into() });
        assert_eq!(log.last().as_deref(), Some("field not found: x"));
        assert_eq!(log.take_count(), 2);
        assert_eq!(log.take_count(), 0);
        assert!(take_process_error_count() >= 2);
    }
}
