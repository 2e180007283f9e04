use snafu::prelude::*;

use super::{
    InvalidEntrySnafu, NO_STRING, TooLargeSnafu, WireError,
    cursor::ByteWriter,
    layout::{MAX_ARRAY, RecordLayout, SCALAR_SLOTS},
};
use crate::{
    entry::{Entry, EntryParams, MAX_LINCOM, Scalar, Threshold},
    types::{ByteOrder, Complex, Value},
};

/// Encode `entry` as a record laid out for the compilation target.
pub fn encode(entry: &Entry) -> Result<Vec<u8>, WireError> {
    encode_with(entry, &RecordLayout::native())
}

/// Encode `entry` as a record laid out by `layout`.
pub fn encode_with(entry: &Entry, layout: &RecordLayout) -> Result<Vec<u8>, WireError> {
    entry.validate().context(InvalidEntrySnafu)?;

    let mut rec = RecordWriter {
        out: ByteWriter::zeroed(layout.fixed_size()),
        pool: Vec::new(),
    };
    let kind = entry.kind();
    let payload = layout.payload(kind);

    rec.out.u32(layout.header("kind"), kind.code());
    rec.out.u32(layout.header("flags"), entry.flags().bits());
    let fragment = i32::try_from(entry.fragment)
        .ok()
        .context(TooLargeSnafu {
            field: "fragment",
            count: entry.fragment,
            max: i32::MAX as usize,
        })?;
    rec.out.i32(layout.header("fragment"), fragment);
    rec.string(layout.header("name"), Some(&entry.name))?;

    let inputs = entry.inputs();
    for i in 0..MAX_LINCOM {
        rec.string(layout.header("in_fields") + 8 * i, inputs.get(i).copied())?;
    }
    for slot in 0..SCALAR_SLOTS {
        rec.string(layout.header("scalar") + 8 * slot, None)?;
        rec.out.i32(layout.header("scalar_ind") + 4 * slot, -1);
    }

    match &entry.params {
        EntryParams::Raw { data_type, spf } => {
            rec.out.u32(payload.at("spf"), *spf);
            rec.out.u32(payload.at("data_type"), data_type.tag());
        }
        EntryParams::Lincom { terms } => {
            rec.out.i32(payload.at("n_fields"), terms.len() as i32);
            let (m, cm, b, cb) = (payload.at("m"), payload.at("cm"), payload.at("b"), payload.at("cb"));
            for (i, term) in terms.iter().enumerate() {
                rec.scalar(layout, i, &term.scale, m + 8 * i, cm + 16 * i)?;
                rec.scalar(layout, i + MAX_LINCOM, &term.offset, b + 8 * i, cb + 16 * i)?;
            }
        }
        EntryParams::Linterp { table, .. } => {
            let table = table.to_string_lossy();
            rec.string(payload.at("table"), Some(&table))?;
        }
        EntryParams::Bit { bitnum, numbits, .. } | EntryParams::Sbit { bitnum, numbits, .. } => {
            rec.out.i32(payload.at("bitnum"), *bitnum as i32);
            rec.out.i32(payload.at("numbits"), *numbits as i32);
        }
        EntryParams::Phase { shift, .. } => rec.out.i64(payload.at("shift"), *shift),
        EntryParams::Polynom { coefficients, .. } => {
            rec.out.i32(payload.at("poly_ord"), coefficients.len() as i32 - 1);
            let (a, ca) = (payload.at("a"), payload.at("ca"));
            for (j, c) in coefficients.iter().enumerate() {
                rec.scalar(layout, j, c, a + 8 * j, ca + 16 * j)?;
            }
        }
        EntryParams::Recip { dividend, .. } => {
            rec.scalar(layout, 0, dividend, payload.at("dividend"), payload.at("cdividend"))?;
        }
        EntryParams::Window { op, threshold, .. } => {
            let (ty, bits) = match *threshold {
                Threshold::Int(v) => (0, v),
                Threshold::Uint(v) => (1, v as i64),
                Threshold::Float(v) => (2, v.to_bits() as i64),
            };
            rec.out.u32(payload.at("windop"), op.code());
            rec.out.u32(payload.at("threshold_type"), ty);
            rec.out.i64(payload.at("threshold"), bits);
        }
        EntryParams::Mplex {
            count_val, period, ..
        } => {
            rec.out.i64(payload.at("count_val"), *count_val);
            let period = i32::try_from(*period).ok().context(TooLargeSnafu {
                field: "period",
                count: *period as usize,
                max: i32::MAX as usize,
            })?;
            rec.out.i32(payload.at("period"), period);
        }
        EntryParams::Const { value } => {
            rec.out.u32(payload.at("const_type"), value.element_type().tag());
            rec.out.put(payload.at("value"), &value.to_bytes(ByteOrder::native()));
        }
        EntryParams::Carray { values } => {
            ensure!(
                values.len() <= MAX_ARRAY,
                TooLargeSnafu {
                    field: "values",
                    count: values.len(),
                    max: MAX_ARRAY,
                }
            );
            rec.out.u32(payload.at("const_type"), values.element_type().tag());
            rec.out.u32(payload.at("array_len"), values.len() as u32);
            let base = payload.at("values");
            let width = values.element_type().size();
            let packed = values.to_bytes(ByteOrder::native()).unwrap_or_default();
            for (i, cell) in packed.chunks(width).enumerate() {
                rec.out.put(base + 16 * i, cell);
            }
        }
        EntryParams::String { value } => rec.string(payload.at("value"), Some(value))?,
        EntryParams::Sarray { values } => {
            ensure!(
                values.len() <= MAX_ARRAY,
                TooLargeSnafu {
                    field: "values",
                    count: values.len(),
                    max: MAX_ARRAY,
                }
            );
            rec.out.u32(payload.at("array_len"), values.len() as u32);
            let base = payload.at("values");
            for (i, value) in values.iter().enumerate() {
                rec.string(base + 8 * i, Some(value))?;
            }
        }
        EntryParams::Multiply { .. }
        | EntryParams::Divide { .. }
        | EntryParams::Indir { .. }
        | EntryParams::Sindir { .. }
        | EntryParams::Alias { .. }
        | EntryParams::Index => {}
    }

    let RecordWriter { mut out, pool } = rec;
    out.append(&pool);
    Ok(out.into_inner())
}

struct RecordWriter {
    out: ByteWriter,
    pool: Vec<u8>,
}

impl RecordWriter {
    fn string(&mut self, offset: usize, s: Option<&str>) -> Result<(), WireError> {
        let Some(s) = s else {
            self.out.u32(offset, NO_STRING);
            self.out.u32(offset + 4, 0);
            return Ok(());
        };
        let too_large = TooLargeSnafu {
            field: "string pool",
            count: self.pool.len() + s.len(),
            max: (NO_STRING - 1) as usize,
        };
        let start = u32::try_from(self.pool.len())
            .ok()
            .filter(|&v| v != NO_STRING)
            .context(too_large)?;
        let len = u32::try_from(s.len()).ok().context(too_large)?;
        self.pool.extend_from_slice(s.as_bytes());
        self.out.u32(offset, start);
        self.out.u32(offset + 4, len);
        Ok(())
    }

    fn scalar(
        &mut self,
        layout: &RecordLayout,
        slot: usize,
        scalar: &Scalar,
        real: usize,
        cplx: usize,
    ) -> Result<(), WireError> {
        let value = match scalar {
            Scalar::Field { name, index } => {
                self.string(layout.header("scalar") + 8 * slot, Some(name))?;
                let ind = index.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1);
                self.out.i32(layout.header("scalar_ind") + 4 * slot, ind);
                Complex::ZERO
            }
            other => other.literal().unwrap_or(Complex::ZERO),
        };
        self.out.f64(real, value.re);
        self.out.put(cplx, &Value::Complex128(value).to_bytes(ByteOrder::native()));
        Ok(())
    }
}
