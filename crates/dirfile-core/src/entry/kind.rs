use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of field kinds.
///
/// The discriminant values are the wire codes used by
/// [`crate::wire`]; `NoEntry` is reserved for "no field" and never appears
/// on a live [`Entry`](super::Entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum EntryKind {
    /// Placeholder for an absent entry.
    NoEntry = 0x00,
    /// Raw sample stream stored on disk.
    Raw = 0x01,
    /// Linear combination of up to three inputs.
    Lincom = 0x02,
    /// Lookup table interpolation.
    Linterp = 0x03,
    /// Unsigned bit-field extraction.
    Bit = 0x04,
    /// Element-wise product of two inputs.
    Multiply = 0x05,
    /// Sample shift.
    Phase = 0x06,
    /// Implicit frame counter.
    Index = 0x07,
    /// Polynomial of one input.
    Polynom = 0x08,
    /// Signed bit-field extraction.
    Sbit = 0x09,
    /// Element-wise quotient of two inputs.
    Divide = 0x0a,
    /// Reciprocal scaled by a dividend.
    Recip = 0x0b,
    /// Conditional pass-through.
    Window = 0x0c,
    /// Multiplexed stream demultiplexer.
    Mplex = 0x0d,
    /// Numeric array indirection.
    Indir = 0x0e,
    /// String array indirection.
    Sindir = 0x0f,
    /// Numeric scalar constant.
    Const = 0x10,
    /// Numeric array constant.
    Carray = 0x11,
    /// Text scalar constant.
    String = 0x12,
    /// Text array constant.
    Sarray = 0x13,
    /// Reference to another field.
    Alias = 0x20,
}

const ALL: [EntryKind; 21] = [
    EntryKind::NoEntry,
    EntryKind::Raw,
    EntryKind::Lincom,
    EntryKind::Linterp,
    EntryKind::Bit,
    EntryKind::Multiply,
    EntryKind::Phase,
    EntryKind::Index,
    EntryKind::Polynom,
    EntryKind::Sbit,
    EntryKind::Divide,
    EntryKind::Recip,
    EntryKind::Window,
    EntryKind::Mplex,
    EntryKind::Indir,
    EntryKind::Sindir,
    EntryKind::Const,
    EntryKind::Carray,
    EntryKind::String,
    EntryKind::Sarray,
    EntryKind::Alias,
];

impl EntryKind {
    /// Wire code of this kind.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Map a wire code back to a kind.
    pub fn from_code(code: u32) -> Option<Self> {
        ALL.iter().copied().find(|k| k.code() == code)
    }

    /// Every kind a live entry can have.
    pub fn all() -> impl Iterator<Item = EntryKind> {
        ALL.iter().copied().skip(1)
    }

    /// Upper-case keyword for this kind.
    pub const fn name(self) -> &'static str {
        match self {
            EntryKind::NoEntry => "NO_ENTRY",
            EntryKind::Raw => "RAW",
            EntryKind::Lincom => "LINCOM",
            EntryKind::Linterp => "LINTERP",
            EntryKind::Bit => "BIT",
            EntryKind::Multiply => "MULTIPLY",
            EntryKind::Phase => "PHASE",
            EntryKind::Index => "INDEX",
            EntryKind::Polynom => "POLYNOM",
            EntryKind::Sbit => "SBIT",
            EntryKind::Divide => "DIVIDE",
            EntryKind::Recip => "RECIP",
            EntryKind::Window => "WINDOW",
            EntryKind::Mplex => "MPLEX",
            EntryKind::Indir => "INDIR",
            EntryKind::Sindir => "SINDIR",
            EntryKind::Const => "CONST",
            EntryKind::Carray => "CARRAY",
            EntryKind::String => "STRING",
            EntryKind::Sarray => "SARRAY",
            EntryKind::Alias => "ALIAS",
        }
    }

    /// Parse a keyword as produced by [`EntryKind::name`], case-insensitively.
    pub fn parse_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Self::all().find(|k| k.name() == upper)
    }

    /// True for kinds that produce a sample stream.
    pub const fn is_vector(self) -> bool {
        matches!(
            self,
            EntryKind::Raw
                | EntryKind::Lincom
                | EntryKind::Linterp
                | EntryKind::Bit
                | EntryKind::Multiply
                | EntryKind::Phase
                | EntryKind::Index
                | EntryKind::Polynom
                | EntryKind::Sbit
                | EntryKind::Divide
                | EntryKind::Recip
                | EntryKind::Window
                | EntryKind::Mplex
                | EntryKind::Indir
                | EntryKind::Sindir
        )
    }

    /// True for the constant kinds.
    pub const fn is_scalar(self) -> bool {
        matches!(
            self,
            EntryKind::Const | EntryKind::Carray | EntryKind::String | EntryKind::Sarray
        )
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
