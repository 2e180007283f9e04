//! Fixed-layout entry records.
//!
//! A record is the binary hand-off format for one field definition, meant
//! for a schema parser or a foreign caller that builds definitions outside
//! this crate. It is laid out like a C tagged union:
//!
//! - a header: `kind` discriminant, flags, fragment index, name, up to
//!   three input field names, and six scalar-reference slots;
//! - a payload overlay whose shape is selected by `kind`, placed after the
//!   header at the union's alignment;
//! - a trailing string pool that every string slot points into.
//!
//! Member offsets follow the struct alignment rules of an [`Abi`]
//! (the compilation target's by default), so the same code decodes records
//! produced by native code on any platform. Array payloads always occupy
//! their maximum size; a separate count member says how much of each is
//! valid. All integers and floats are in native byte order.
//!
//! [`decode`] turns a record into an [`Entry`] with one exhaustive match on
//! the kind. A record with an unknown kind fails before any payload is read.

mod cursor;
mod decode;
mod encode;
pub mod layout;

use snafu::prelude::*;

pub use cursor::{ByteReader, ByteWriter};
pub use decode::{decode, decode_with};
pub use encode::{encode, encode_with};
pub use layout::{Abi, MAX_ARRAY, RecordLayout};

use crate::entry::EntryError;

/// Marker stored in the offset half of an absent string reference.
pub const NO_STRING: u32 = u32::MAX;

/// Errors raised while decoding or encoding a record.
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum WireError {
    /// The discriminant is not one of the known field kinds.
    #[snafu(display("unrecognized entry kind 0x{code:02x}"))]
    UnknownKind {
        /// The discriminant read from the record.
        code: u32,
    },

    /// The record is shorter than its layout requires.
    #[snafu(display("record truncated reading {field}: need {needed} bytes, have {found}"))]
    Truncated {
        /// Member being read.
        field: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        found: usize,
    },

    /// A string reference points outside the pool or at invalid UTF-8.
    #[snafu(display("bad string reference in {field} (offset {offset}, length {len})"))]
    BadString {
        /// Member holding the reference.
        field: &'static str,
        /// Pool offset.
        offset: u32,
        /// String length.
        len: u32,
    },

    /// A required string is absent.
    #[snafu(display("missing required string {field}"))]
    MissingString {
        /// Member holding the reference.
        field: &'static str,
    },

    /// A count or index member is out of range.
    #[snafu(display("{field} is {value}, expected 0..={max}"))]
    BadCount {
        /// Member being read.
        field: &'static str,
        /// Value found.
        value: i64,
        /// Largest accepted value.
        max: i64,
    },

    /// A type tag or operator code is not recognized.
    #[snafu(display("unrecognized {field} code 0x{value:x}"))]
    BadTag {
        /// Member being read.
        field: &'static str,
        /// Code found.
        value: u32,
    },

    /// The decoded fields do not make a valid entry.
    #[snafu(display("record describes an invalid entry: {source}"))]
    InvalidEntry {
        /// Validation failure.
        source: EntryError,
    },

    /// The entry does not fit the fixed record layout.
    #[snafu(display("{field} holds {count} items, a record holds at most {max}"))]
    TooLarge {
        /// Member being written.
        field: &'static str,
        /// Items present.
        count: usize,
        /// Capacity of the record.
        max: usize,
    },
}

impl WireError {
    /// True for [`WireError::UnknownKind`]; every other variant is a malformed record.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, WireError::UnknownKind { .. })
    }
}
