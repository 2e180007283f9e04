//! Writing samples through a field.
//!
//! Raw fields store the samples directly. A few derived kinds can be
//! inverted and forward the write to their input; every other kind refuses.

use snafu::prelude::*;

use crate::{
    codec::StreamMode,
    entry::{Entry, EntryParams, Scalar},
    error::{
        BadPositionSnafu, Guarded, NotWritableSnafu, PhaseOutOfRangeSnafu, ProtectedSnafu, Result,
        TypeSnafu,
    },
    types::{ByteOrder, Complex, ElementType},
};

use super::{Evaluator, kernels, series::Series};

impl Evaluator<'_> {
    /// Store `data` through `name` starting at sample `first`. Returns the
    /// number of samples written.
    pub(crate) fn write(&self, name: &str, first: i64, data: &Series) -> Result<usize> {
        ensure!(first >= 0, BadPositionSnafu { name, position: first });
        if data.len() == 0 {
            return Ok(0);
        }
        let entry = self.entry(name)?;
        match &entry.params {
            EntryParams::Raw { data_type, .. } => self.write_raw(entry, *data_type, first, data),
            EntryParams::Phase { input, shift } => {
                let start = first + shift;
                ensure!(
                    start >= 0,
                    PhaseOutOfRangeSnafu {
                        name,
                        shift: *shift,
                        sample: start,
                    }
                );
                self.write(input, start, data)
            }
            EntryParams::Bit {
                input,
                bitnum,
                numbits,
            }
            | EntryParams::Sbit {
                input,
                bitnum,
                numbits,
            } => {
                let mut old = Series::zeros(self.native_type(input)?, data.len());
                old.overwrite(0, &self.read(input, first, data.len())?);
                let merged = kernels::insert_bits(&old, data, *bitnum, *numbits);
                self.write(input, first, &merged)
            }
            EntryParams::Lincom { terms } if terms.len() == 1 => {
                let term = &terms[0];
                let x = self.invert_linear(data, &term.scale, &term.offset)?;
                self.write(&term.input, first, &x)
            }
            EntryParams::Polynom {
                input,
                coefficients,
            } if coefficients.len() == 2 => {
                let x = self.invert_linear(data, &coefficients[1], &coefficients[0])?;
                self.write(input, first, &x)
            }
            EntryParams::Recip { input, dividend } => {
                let x = kernels::recip(data, self.scalar(dividend)?);
                self.write(input, first, &x)
            }
            _ => NotWritableSnafu {
                name,
                kind: entry.kind(),
            }
            .fail(),
        }
    }

    /// `x = (y - b) / m`.
    fn invert_linear(&self, y: &Series, m: &Scalar, b: &Scalar) -> Result<Series> {
        let (m, b) = (self.scalar(m)?, self.scalar(b)?);
        Ok(kernels::lincom(&[(y.clone(), Complex::ONE / m, -(b / m))]))
    }

    fn write_raw(&self, entry: &Entry, data_type: ElementType, first: i64, data: &Series) -> Result<usize> {
        let target = self.raw_target(entry)?;
        ensure!(
            !target.fragment.protection.protects_data(),
            ProtectedSnafu {
                fragment: entry.fragment,
                guard: Guarded::Data,
            }
        );
        let bof = self.bof(&entry.name)?;
        ensure!(
            first >= bof,
            BadPositionSnafu {
                name: entry.name.as_str(),
                position: first,
            }
        );
        let bytes = data
            .to_samples(data_type)
            .and_then(|s| s.to_bytes(ByteOrder::native()))
            .context(TypeSnafu {
                name: entry.name.as_str(),
            })?;
        let mut streams = self.streams.borrow_mut();
        if let Some(stream) = streams.stream(&target, StreamMode::ReadWrite, self.location, self.codecs)? {
            stream.write((first - bof) as u64, &bytes)?;
        }
        tracing::trace!(target: "dirfile", field = %entry.name, first, n = data.len(), "wrote samples");
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::Scratch;
    use super::*;
    use crate::{error::DirfileError, fragment::Protection};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn raw_writes_land_inside_frames() -> TestResult {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("data", ElementType::Int8, 8)?)?;
        s.fill("data", (1..=80).map(|v| v as i8).collect::<Vec<_>>())?;
        let e = s.eval();
        assert_eq!(e.write("data", 41, &Series::Int(vec![13, 14, 15, 16]))?, 4);
        assert_eq!(
            e.read("data", 40, 8)?,
            Series::Int(vec![41, 13, 14, 15, 16, 46, 47, 48])
        );
        Ok(())
    }

    #[test]
    fn writes_through_invertible_fields() -> TestResult {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("data", ElementType::Uint16, 1)?)?;
        s.add(Entry::lincom("cal", &["data"], vec![2.0.into()], vec![10.0.into()])?)?;
        s.add(Entry::polynom("p", "data", 1, vec![1.0.into(), 4.0.into()])?)?;
        s.add(Entry::recip("r", "data", 60.0)?)?;
        s.add(Entry::bit("hi", "data", 8, 8)?)?;
        s.add(Entry::phase("later", "data", 2)?)?;
        s.add(Entry::multiply("m", "data", "data")?)?;
        let e = s.eval();
        e.write("cal", 0, &Series::Real(vec![12.0, 14.0]))?;
        assert_eq!(e.read("data", 0, 2)?, Series::Uint(vec![1, 2]));
        e.write("p", 0, &Series::Real(vec![13.0]))?;
        assert_eq!(e.read("data", 0, 1)?, Series::Uint(vec![3]));
        e.write("r", 1, &Series::Real(vec![20.0]))?;
        assert_eq!(e.read("data", 1, 1)?, Series::Uint(vec![3]));
        e.write("hi", 0, &Series::Uint(vec![1, 2, 3]))?;
        assert_eq!(e.read("data", 0, 3)?, Series::Uint(vec![0x103, 0x203, 0x300]));
        e.write("later", 0, &Series::Uint(vec![9]))?;
        assert_eq!(e.read("data", 2, 1)?, Series::Uint(vec![9]));
        assert!(matches!(
            e.write("m", 0, &Series::Real(vec![1.0])),
            Err(DirfileError::NotWritable { .. })
        ));
        Ok(())
    }

    #[test]
    fn protected_and_early_writes_fail() -> TestResult {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("data", ElementType::Float32, 2)?)?;
        s.fragments[0].frame_offset = 1;
        assert!(matches!(
            s.eval().write("data", 1, &Series::Real(vec![1.0])),
            Err(DirfileError::BadPosition { position: 1, .. })
        ));
        s.eval().write("data", 2, &Series::Real(vec![1.0]))?;
        assert_eq!(s.eval().read("data", 0, 3)?, Series::Real(vec![0.0, 0.0, 1.0]));
        s.fragments[0].protection = Protection::Data;
        assert!(matches!(
            s.eval().write("data", 2, &Series::Real(vec![1.0])),
            Err(DirfileError::Protected { .. })
        ));
        Ok(())
    }
}
