use snafu::prelude::*;

use super::{
    BadCountSnafu, BadStringSnafu, BadTagSnafu, InvalidEntrySnafu, MissingStringSnafu, NO_STRING,
    TruncatedSnafu, UnknownKindSnafu, WireError,
    cursor::ByteReader,
    layout::{MAX_ARRAY, PayloadLayout, RecordLayout, SCALAR_SLOTS},
};
use crate::{
    entry::{
        Entry, EntryFlags, EntryKind, EntryParams, LincomTerm, MAX_LINCOM, MAX_POLYORD, Scalar,
        Threshold, WindowOp,
    },
    types::{ByteOrder, Complex, ElementType, Samples, Value},
};

/// Decode a record laid out for the compilation target.
pub fn decode(bytes: &[u8]) -> Result<Entry, WireError> {
    decode_with(bytes, &RecordLayout::native())
}

/// Decode a record laid out by `layout`.
pub fn decode_with(bytes: &[u8], layout: &RecordLayout) -> Result<Entry, WireError> {
    let reader = ByteReader::new(bytes);
    let code = reader.u32(layout.header("kind"), "kind")?;
    let kind = EntryKind::from_code(code)
        .filter(|k| *k != EntryKind::NoEntry)
        .context(UnknownKindSnafu { code })?;

    let fixed = layout.fixed_size();
    ensure!(
        bytes.len() >= fixed,
        TruncatedSnafu {
            field: "record",
            needed: fixed,
            found: bytes.len(),
        }
    );
    let rec = Record {
        reader,
        pool: &bytes[fixed..],
        layout,
        payload: layout.payload(kind),
    };

    let flags = EntryFlags::from_bits(reader.u32(layout.header("flags"), "flags")?);
    let fragment = rec.count(layout.header("fragment"), "fragment", i32::MAX as i64)?;
    let name = rec.required(layout.header("name"), "name")?;
    let complex = flags.contains(EntryFlags::COMPLEX_SCALARS);

    let params = match kind {
        EntryKind::Raw => {
            let spf = reader.u32(rec.at("spf"), "spf")?;
            let data_type = rec.element_type(rec.at("data_type"), "data_type")?;
            EntryParams::Raw { data_type, spf }
        }
        EntryKind::Lincom => {
            let n = rec.count(rec.at("n_fields"), "n_fields", MAX_LINCOM as i64)?;
            let (m, cm, b, cb) = (rec.at("m"), rec.at("cm"), rec.at("b"), rec.at("cb"));
            let terms = (0..n)
                .map(|i| {
                    Ok(LincomTerm {
                        input: rec.input(i)?,
                        scale: rec.scalar(i, m + 8 * i, cm + 16 * i, complex)?,
                        offset: rec.scalar(i + MAX_LINCOM, b + 8 * i, cb + 16 * i, complex)?,
                    })
                })
                .collect::<Result<Vec<_>, WireError>>()?;
            EntryParams::Lincom { terms }
        }
        EntryKind::Linterp => EntryParams::Linterp {
            input: rec.input(0)?,
            table: rec.required(rec.at("table"), "table")?.into(),
        },
        EntryKind::Bit | EntryKind::Sbit => {
            let input = rec.input(0)?;
            let bitnum = rec.count(rec.at("bitnum"), "bitnum", 63)? as u32;
            let numbits = rec.count(rec.at("numbits"), "numbits", 64)? as u32;
            if kind == EntryKind::Bit {
                EntryParams::Bit {
                    input,
                    bitnum,
                    numbits,
                }
            } else {
                EntryParams::Sbit {
                    input,
                    bitnum,
                    numbits,
                }
            }
        }
        EntryKind::Multiply => EntryParams::Multiply {
            inputs: [rec.input(0)?, rec.input(1)?],
        },
        EntryKind::Divide => EntryParams::Divide {
            inputs: [rec.input(0)?, rec.input(1)?],
        },
        EntryKind::Phase => EntryParams::Phase {
            input: rec.input(0)?,
            shift: reader.i64(rec.at("shift"), "shift")?,
        },
        EntryKind::Polynom => {
            let order = rec.count(rec.at("poly_ord"), "poly_ord", MAX_POLYORD as i64)?;
            let (a, ca) = (rec.at("a"), rec.at("ca"));
            let coefficients = (0..=order)
                .map(|j| rec.scalar(j, a + 8 * j, ca + 16 * j, complex))
                .collect::<Result<Vec<_>, WireError>>()?;
            EntryParams::Polynom {
                input: rec.input(0)?,
                coefficients,
            }
        }
        EntryKind::Recip => EntryParams::Recip {
            input: rec.input(0)?,
            dividend: rec.scalar(0, rec.at("dividend"), rec.at("cdividend"), complex)?,
        },
        EntryKind::Window => {
            let op_code = reader.u32(rec.at("windop"), "windop")?;
            let op = WindowOp::from_code(op_code).context(BadTagSnafu {
                field: "windop",
                value: op_code,
            })?;
            let bits = reader.i64(rec.at("threshold"), "threshold")?;
            let threshold = match reader.u32(rec.at("threshold_type"), "threshold_type")? {
                0 => Threshold::Int(bits),
                1 => Threshold::Uint(bits as u64),
                2 => Threshold::Float(f64::from_bits(bits as u64)),
                value => {
                    return BadTagSnafu {
                        field: "threshold_type",
                        value,
                    }
                    .fail();
                }
            };
            EntryParams::Window {
                input: rec.input(0)?,
                check: rec.input(1)?,
                op,
                threshold,
            }
        }
        EntryKind::Mplex => EntryParams::Mplex {
            input: rec.input(0)?,
            count: rec.input(1)?,
            count_val: reader.i64(rec.at("count_val"), "count_val")?,
            period: rec.count(rec.at("period"), "period", i32::MAX as i64)? as u32,
        },
        EntryKind::Indir => EntryParams::Indir {
            index: rec.input(0)?,
            array: rec.input(1)?,
        },
        EntryKind::Sindir => EntryParams::Sindir {
            index: rec.input(0)?,
            array: rec.input(1)?,
        },
        EntryKind::Const => {
            let ty = rec.element_type(rec.at("const_type"), "const_type")?;
            let cell = reader.read_exact(rec.at("value"), ty.size(), "value")?;
            let value = Value::from_bytes(ty, cell, ByteOrder::native()).ok().context(BadTagSnafu {
                field: "const_type",
                value: ty.tag(),
            })?;
            EntryParams::Const { value }
        }
        EntryKind::Carray => {
            let ty = rec.element_type(rec.at("const_type"), "const_type")?;
            let len = rec.array_len()?;
            let base = rec.at("values");
            let mut packed = Vec::with_capacity(len * ty.size());
            for i in 0..len {
                packed.extend_from_slice(reader.read_exact(base + 16 * i, ty.size(), "values")?);
            }
            let values = Samples::from_bytes(ty, &packed, ByteOrder::native()).ok().context(BadTagSnafu {
                field: "const_type",
                value: ty.tag(),
            })?;
            EntryParams::Carray { values }
        }
        EntryKind::String => EntryParams::String {
            value: rec.required(rec.at("value"), "value")?,
        },
        EntryKind::Sarray => {
            let len = rec.array_len()?;
            let base = rec.at("values");
            let values = (0..len)
                .map(|i| rec.required(base + 8 * i, "values"))
                .collect::<Result<Vec<_>, WireError>>()?;
            EntryParams::Sarray { values }
        }
        EntryKind::Alias => EntryParams::Alias {
            target: rec.input(0)?,
        },
        EntryKind::Index => EntryParams::Index,
        EntryKind::NoEntry => return UnknownKindSnafu { code }.fail(),
    };

    let entry = Entry {
        name,
        fragment,
        hidden: flags.contains(EntryFlags::HIDDEN),
        params,
    };
    entry.validate().context(InvalidEntrySnafu)?;
    Ok(entry)
}

struct Record<'a> {
    reader: ByteReader<'a>,
    pool: &'a [u8],
    layout: &'a RecordLayout,
    payload: PayloadLayout,
}

impl Record<'_> {
    fn at(&self, member: &str) -> usize {
        self.payload.at(member)
    }

    fn string(&self, offset: usize, field: &'static str) -> Result<Option<String>, WireError> {
        let off = self.reader.u32(offset, field)?;
        let len = self.reader.u32(offset + 4, field)?;
        if off == NO_STRING {
            return Ok(None);
        }
        let bad = BadStringSnafu {
            field,
            offset: off,
            len,
        };
        let start = off as usize;
        let bytes = start
            .checked_add(len as usize)
            .and_then(|end| self.pool.get(start..end))
            .context(bad)?;
        let s = std::str::from_utf8(bytes).ok().context(bad)?;
        Ok(Some(s.to_string()))
    }

    fn required(&self, offset: usize, field: &'static str) -> Result<String, WireError> {
        self.string(offset, field)?.context(MissingStringSnafu { field })
    }

    fn input(&self, i: usize) -> Result<String, WireError> {
        self.required(self.layout.header("in_fields") + 8 * i, "in_fields")
    }

    fn count(&self, offset: usize, field: &'static str, max: i64) -> Result<usize, WireError> {
        let value = i64::from(self.reader.i32(offset, field)?);
        ensure!((0..=max).contains(&value), BadCountSnafu { field, value, max });
        Ok(value as usize)
    }

    fn array_len(&self) -> Result<usize, WireError> {
        let value = i64::from(self.reader.u32(self.at("array_len"), "array_len")?);
        ensure!(
            (1..=MAX_ARRAY as i64).contains(&value),
            BadCountSnafu {
                field: "array_len",
                value,
                max: MAX_ARRAY as i64,
            }
        );
        Ok(value as usize)
    }

    fn element_type(&self, offset: usize, field: &'static str) -> Result<ElementType, WireError> {
        let value = self.reader.u32(offset, field)?;
        let ty = ElementType::from_tag(value);
        ensure!(ty.is_numeric(), BadTagSnafu { field, value });
        Ok(ty)
    }

    fn scalar(&self, slot: usize, real: usize, cplx: usize, complex: bool) -> Result<Scalar, WireError> {
        debug_assert!(slot < SCALAR_SLOTS);
        let header = self.layout.header("scalar") + 8 * slot;
        if let Some(name) = self.string(header, "scalar")? {
            let ind = self
                .reader
                .i32(self.layout.header("scalar_ind") + 4 * slot, "scalar_ind")?;
            let index = usize::try_from(ind).ok();
            return Ok(Scalar::Field { name, index });
        }
        if complex {
            let re = self.reader.f64(cplx, "complex scalar")?;
            let im = self.reader.f64(cplx + 8, "complex scalar")?;
            Ok(Scalar::from(Complex::new(re, im)))
        } else {
            Ok(Scalar::Real(self.reader.f64(real, "scalar")?))
        }
    }
}
