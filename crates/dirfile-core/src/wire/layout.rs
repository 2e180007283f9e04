//! Field offsets of the fixed-size entry record.
//!
//! Offsets are computed from a slot list with C struct layout rules: each
//! slot starts at the next multiple of its alignment and the struct size is
//! rounded up to the largest alignment it contains. The alignments come from
//! an [`Abi`], which defaults to the compilation target's.

use std::mem::align_of;

use crate::entry::{EntryKind, MAX_LINCOM, MAX_POLYORD};

/// Longest CARRAY or SARRAY a record can hold inline.
pub const MAX_ARRAY: usize = 32;

/// Number of scalar-reference slots in the header.
pub const SCALAR_SLOTS: usize = MAX_POLYORD + 1;

/// Alignment rules for the primitive slot types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abi {
    /// Alignment of 32-bit integers.
    pub int32: usize,
    /// Alignment of 64-bit integers.
    pub int64: usize,
    /// Alignment of 64-bit floats (and complex doubles).
    pub float64: usize,
}

impl Abi {
    /// The alignment rules of the compilation target.
    pub const fn native() -> Self {
        Abi {
            int32: align_of::<u32>(),
            int64: align_of::<i64>(),
            float64: align_of::<f64>(),
        }
    }

    /// No padding anywhere.
    pub const fn packed() -> Self {
        Abi {
            int32: 1,
            int64: 1,
            float64: 1,
        }
    }
}

impl Default for Abi {
    fn default() -> Self {
        Self::native()
    }
}

/// Primitive slot types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// 64-bit float.
    F64,
    /// Complex double: two 64-bit floats.
    C128,
    /// String reference into the record's string pool: `(offset, len)` as two u32.
    StrRef,
    /// Sixteen-byte value cell holding one element of any numeric type.
    Cell,
}

impl Slot {
    /// Size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Slot::U32 | Slot::I32 => 4,
            Slot::I64 | Slot::F64 | Slot::StrRef => 8,
            Slot::C128 | Slot::Cell => 16,
        }
    }

    fn align(self, abi: Abi) -> usize {
        match self {
            Slot::U32 | Slot::I32 | Slot::StrRef => abi.int32,
            Slot::I64 => abi.int64,
            Slot::F64 | Slot::C128 => abi.float64,
            Slot::Cell => abi.int64.max(abi.float64),
        }
    }
}

/// One named member of a record struct.
#[derive(Debug, Clone, Copy)]
struct Member {
    name: &'static str,
    slot: Slot,
    count: usize,
}

const fn m(name: &'static str, slot: Slot, count: usize) -> Member {
    Member { name, slot, count }
}

const HEADER: &[Member] = &[
    m("kind", Slot::U32, 1),
    m("flags", Slot::U32, 1),
    m("fragment", Slot::I32, 1),
    m("name", Slot::StrRef, 1),
    m("in_fields", Slot::StrRef, MAX_LINCOM),
    m("scalar", Slot::StrRef, SCALAR_SLOTS),
    m("scalar_ind", Slot::I32, SCALAR_SLOTS),
];

fn payload_members(kind: EntryKind) -> &'static [Member] {
    const RAW: &[Member] = &[m("spf", Slot::U32, 1), m("data_type", Slot::U32, 1)];
    const LINCOM: &[Member] = &[
        m("n_fields", Slot::I32, 1),
        m("m", Slot::F64, MAX_LINCOM),
        m("cm", Slot::C128, MAX_LINCOM),
        m("b", Slot::F64, MAX_LINCOM),
        m("cb", Slot::C128, MAX_LINCOM),
    ];
    const LINTERP: &[Member] = &[m("table", Slot::StrRef, 1)];
    const BIT: &[Member] = &[m("bitnum", Slot::I32, 1), m("numbits", Slot::I32, 1)];
    const PHASE: &[Member] = &[m("shift", Slot::I64, 1)];
    const POLYNOM: &[Member] = &[
        m("poly_ord", Slot::I32, 1),
        m("a", Slot::F64, MAX_POLYORD + 1),
        m("ca", Slot::C128, MAX_POLYORD + 1),
    ];
    const RECIP: &[Member] = &[m("dividend", Slot::F64, 1), m("cdividend", Slot::C128, 1)];
    const WINDOW: &[Member] = &[
        m("windop", Slot::U32, 1),
        m("threshold_type", Slot::U32, 1),
        m("threshold", Slot::I64, 1),
    ];
    const MPLEX: &[Member] = &[m("count_val", Slot::I64, 1), m("period", Slot::I32, 1)];
    const CONST: &[Member] = &[m("const_type", Slot::U32, 1), m("value", Slot::Cell, 1)];
    const CARRAY: &[Member] = &[
        m("const_type", Slot::U32, 1),
        m("array_len", Slot::U32, 1),
        m("values", Slot::Cell, MAX_ARRAY),
    ];
    const STRING: &[Member] = &[m("value", Slot::StrRef, 1)];
    const SARRAY: &[Member] = &[
        m("array_len", Slot::U32, 1),
        m("values", Slot::StrRef, MAX_ARRAY),
    ];

    match kind {
        EntryKind::Raw => RAW,
        EntryKind::Lincom => LINCOM,
        EntryKind::Linterp => LINTERP,
        EntryKind::Bit | EntryKind::Sbit => BIT,
        EntryKind::Phase => PHASE,
        EntryKind::Polynom => POLYNOM,
        EntryKind::Recip => RECIP,
        EntryKind::Window => WINDOW,
        EntryKind::Mplex => MPLEX,
        EntryKind::Const => CONST,
        EntryKind::Carray => CARRAY,
        EntryKind::String => STRING,
        EntryKind::Sarray => SARRAY,
        EntryKind::NoEntry
        | EntryKind::Multiply
        | EntryKind::Divide
        | EntryKind::Indir
        | EntryKind::Sindir
        | EntryKind::Alias
        | EntryKind::Index => &[],
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    offset.div_ceil(align) * align
}

/// Offsets of one struct's members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    members: Vec<(&'static str, Slot, usize)>,
    size: usize,
    align: usize,
}

impl StructLayout {
    fn compute(members: &[Member], abi: Abi) -> Self {
        let mut offset = 0;
        let mut align = 1;
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let a = member.slot.align(abi);
            align = align.max(a);
            offset = align_up(offset, a);
            out.push((member.name, member.slot, offset));
            offset += member.slot.size() * member.count;
        }
        StructLayout {
            members: out,
            size: align_up(offset, align),
            align,
        }
    }

    /// Offset of member `name`, relative to the start of this struct.
    ///
    /// Member names are fixed by this module, so an unknown name is a bug.
    pub fn offset(&self, name: &str) -> usize {
        self.members
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, _, off)| *off)
            .unwrap_or_else(|| unreachable!("no record member named {name}"))
    }

    /// Struct size, including trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Full layout of the fixed part of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    abi: Abi,
    header: StructLayout,
    payload_offset: usize,
    fixed_size: usize,
}

impl RecordLayout {
    /// Layout for the given alignment rules.
    pub fn new(abi: Abi) -> Self {
        let header = StructLayout::compute(HEADER, abi);
        let payloads: Vec<StructLayout> = EntryKind::all()
            .map(|k| StructLayout::compute(payload_members(k), abi))
            .collect();
        let union_align = payloads.iter().map(|p| p.align).max().unwrap_or(1);
        let union_size = payloads.iter().map(|p| p.size).max().unwrap_or(0);
        let payload_offset = align_up(header.size, union_align);
        let fixed_size = align_up(payload_offset + union_size, union_align.max(header.align));
        RecordLayout {
            abi,
            header,
            payload_offset,
            fixed_size,
        }
    }

    /// Layout for the compilation target.
    pub fn native() -> Self {
        Self::new(Abi::native())
    }

    /// The alignment rules in use.
    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// Absolute offset of a header member.
    pub fn header(&self, name: &str) -> usize {
        self.header.offset(name)
    }

    /// Payload layout for `kind`, with absolute offsets.
    pub fn payload(&self, kind: EntryKind) -> PayloadLayout {
        PayloadLayout {
            base: self.payload_offset,
            inner: StructLayout::compute(payload_members(kind), self.abi),
        }
    }

    /// Size of the fixed part; the string pool starts here.
    pub fn fixed_size(&self) -> usize {
        self.fixed_size
    }
}

/// Payload member offsets for one kind.
#[derive(Debug, Clone)]
pub struct PayloadLayout {
    base: usize,
    inner: StructLayout,
}

impl PayloadLayout {
    /// Absolute offset of payload member `name`.
    pub fn at(&self, name: &str) -> usize {
        self.base + self.inner.offset(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_after_int_is_padded() {
        let abi = Abi {
            int32: 4,
            int64: 8,
            float64: 8,
        };
        let layout = RecordLayout::new(abi);
        let poly = layout.payload(EntryKind::Polynom);
        assert_eq!(poly.at("a") - poly.at("poly_ord"), 8);
        let lincom = layout.payload(EntryKind::Lincom);
        assert_eq!(lincom.at("m") - lincom.at("n_fields"), 8);
        assert_eq!(layout.fixed_size() % 8, 0);
    }

    #[test]
    fn packed_abi_has_no_padding() {
        let layout = RecordLayout::new(Abi::packed());
        let poly = layout.payload(EntryKind::Polynom);
        assert_eq!(poly.at("a") - poly.at("poly_ord"), 4);
        assert_eq!(layout.header("flags"), 4);
        assert!(layout.fixed_size() < RecordLayout::native().fixed_size());
    }

    #[test]
    fn header_members_are_in_order() {
        let layout = RecordLayout::native();
        assert_eq!(layout.header("kind"), 0);
        assert!(layout.header("name") < layout.header("in_fields"));
        assert!(layout.header("scalar_ind") < layout.fixed_size());
        let raw = layout.payload(EntryKind::Raw);
        assert!(raw.at("spf") >= layout.header("scalar_ind") + 4 * SCALAR_SLOTS);
    }
}
