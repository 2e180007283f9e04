//! Field evaluation engine.
//!
//! An [`Evaluator`] borrows the state of an open dirfile and turns a field
//! name plus a sample window into samples. Raw fields are read from their
//! streams; every derived field evaluates its inputs over the same window
//! and applies its formula element-wise.
//!
//! Sample positions are absolute: sample 0 is the first sample of frame 0
//! of the dirfile. A raw field whose fragment has a frame offset stores its
//! first sample at `frame_offset * spf`; reads before that point yield zero
//! samples. Inputs sampled at a different rate than the field being
//! evaluated are resampled by index: output sample `n` uses input sample
//! `floor(n * spf_in / spf_out)`.
//!
//! Callers run [`graph::check`] on a field before evaluating it, which bounds
//! the recursion in this module by [`MAX_RECURSION`].

pub(crate) mod graph;
pub(crate) mod kernels;
pub(crate) mod linterp;
pub(crate) mod series;
pub(crate) mod streams;
mod write;

use std::cell::RefCell;

use snafu::prelude::*;

use crate::{
    codec::{CodecRegistry, StreamMode},
    config::{DirfileConfig, MplexLookback, PhaseEdge},
    entry::{Entry, EntryParams, Scalar},
    error::{
        BadPositionSnafu, DirfileError, FragmentNotFoundSnafu, IndexOutOfBoundsSnafu,
        PhaseOutOfRangeSnafu, Result, TypeSnafu,
    },
    fragment::Fragment,
    namespace::FieldTable,
    storage::DirfileLocation,
    types::{ByteOrder, Complex, ElementType, Samples},
};

use linterp::TableCache;
use series::Series;
use streams::{RawTarget, StreamCache};

/// Deepest chain of derived fields, aliases or includes that is followed.
pub const MAX_RECURSION: usize = 32;

/// Borrowed view of an open dirfile used to evaluate fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Evaluator<'a> {
    pub(crate) fields: &'a FieldTable,
    pub(crate) fragments: &'a [Fragment],
    pub(crate) config: &'a DirfileConfig,
    pub(crate) location: &'a DirfileLocation,
    pub(crate) codecs: &'a CodecRegistry,
    pub(crate) streams: &'a RefCell<StreamCache>,
    pub(crate) tables: &'a RefCell<TableCache>,
}

fn wrong_kind(entry: &Entry, expected: &'static str) -> DirfileError {
    DirfileError::WrongKind {
        name: entry.name.clone(),
        kind: entry.kind(),
        expected,
    }
}

/// `ceil(n * num / den)` for a positive `den`.
fn rescale_up(n: i64, num: u32, den: u32) -> i64 {
    let (num, den) = (i64::from(num), i64::from(den));
    (n * num + den - 1).div_euclid(den)
}

impl<'a> Evaluator<'a> {
    /// Resolve `name`, following aliases.
    pub(crate) fn entry(&self, name: &str) -> Result<&'a Entry> {
        self.fields.resolve(name)
    }

    pub(crate) fn fragment(&self, entry: &Entry) -> Result<&'a Fragment> {
        self.fragments
            .get(entry.fragment)
            .context(FragmentNotFoundSnafu {
                index: entry.fragment,
            })
    }

    pub(crate) fn raw_target(&self, entry: &'a Entry) -> Result<RawTarget<'a>> {
        match &entry.params {
            EntryParams::Raw { data_type, .. } => Ok(RawTarget {
                name: &entry.name,
                data_type: *data_type,
                fragment: self.fragment(entry)?,
            }),
            _ => Err(wrong_kind(entry, "RAW")),
        }
    }

    /// Inputs that are read as sample streams.
    fn vector_inputs(entry: &Entry) -> Vec<&str> {
        match &entry.params {
            EntryParams::Indir { index, .. } | EntryParams::Sindir { index, .. } => vec![index.as_str()],
            _ => entry.inputs(),
        }
    }

    /// Samples per frame of `name`.
    pub(crate) fn spf(&self, name: &str) -> Result<u32> {
        self.spf_of(self.entry(name)?)
    }

    fn spf_of(&self, entry: &Entry) -> Result<u32> {
        match &entry.params {
            EntryParams::Raw { spf, .. } => Ok(*spf),
            EntryParams::Index => Ok(1),
            params if params.kind().is_scalar() => Err(wrong_kind(entry, "a vector field")),
            _ => match Self::vector_inputs(entry).first() {
                Some(input) => self.spf(input),
                None => Err(wrong_kind(entry, "a vector field")),
            },
        }
    }

    /// Element type `name` produces when read without conversion.
    pub(crate) fn native_type(&self, name: &str) -> Result<ElementType> {
        let entry = self.entry(name)?;
        match &entry.params {
            EntryParams::Raw { data_type, .. } => Ok(*data_type),
            EntryParams::Index | EntryParams::Linterp { .. } => Ok(ElementType::Float64),
            EntryParams::Bit { .. } => Ok(ElementType::Uint64),
            EntryParams::Sbit { .. } => Ok(ElementType::Int64),
            EntryParams::Phase { input, .. }
            | EntryParams::Window { input, .. }
            | EntryParams::Mplex { input, .. } => self.native_type(input),
            EntryParams::Lincom { .. }
            | EntryParams::Polynom { .. }
            | EntryParams::Recip { .. }
            | EntryParams::Multiply { .. }
            | EntryParams::Divide { .. } => {
                let mut complex = false;
                for scalar in entry.scalars() {
                    complex |= !self.scalar(scalar)?.is_real();
                }
                for input in entry.inputs() {
                    complex |= self.native_type(input)?.is_complex();
                }
                Ok(if complex {
                    ElementType::Complex128
                } else {
                    ElementType::Float64
                })
            }
            EntryParams::Indir { array, .. } => match &self.entry(array)?.params {
                EntryParams::Carray { values } => Ok(values.element_type()),
                _ => Err(wrong_kind(self.entry(array)?, "CARRAY")),
            },
            EntryParams::Sindir { .. } | EntryParams::String { .. } | EntryParams::Sarray { .. } => {
                Ok(ElementType::Text)
            }
            EntryParams::Const { value } => Ok(value.element_type()),
            EntryParams::Carray { values } => Ok(values.element_type()),
            EntryParams::Alias { target } => self.native_type(target),
        }
    }

    /// First sample of `name` backed by data.
    pub(crate) fn bof(&self, name: &str) -> Result<i64> {
        let entry = self.entry(name)?;
        match &entry.params {
            EntryParams::Raw { spf, .. } => {
                let offset = self.fragment(entry)?.frame_offset as i64;
                Ok(offset * i64::from(*spf))
            }
            EntryParams::Index => Ok(0),
            EntryParams::Phase { input, shift } => {
                let bof = self.bof(input)?;
                match self.config.phase_edge {
                    PhaseEdge::Error => Ok((bof - shift).max(0)),
                    PhaseEdge::Clamp => Ok(bof),
                }
            }
            _ => {
                let spf = self.spf_of(entry)?;
                let mut bof = 0;
                for input in Self::vector_inputs(entry) {
                    bof = bof.max(rescale_up(self.bof(input)?, spf, self.spf(input)?));
                }
                Ok(bof)
            }
        }
    }

    /// One past the last sample of `name`; `None` when unbounded.
    pub(crate) fn eof(&self, name: &str) -> Result<Option<i64>> {
        let entry = self.entry(name)?;
        match &entry.params {
            EntryParams::Raw { .. } => {
                let target = self.raw_target(entry)?;
                let n = self
                    .streams
                    .borrow_mut()
                    .nsamples(&target, self.location, self.codecs)?;
                Ok(Some(self.bof(name)? + n as i64))
            }
            EntryParams::Index => Ok(None),
            EntryParams::Phase { input, shift } => {
                let eof = self.eof(input)?;
                Ok(match self.config.phase_edge {
                    PhaseEdge::Error => eof.map(|e| (e - shift).max(0)),
                    PhaseEdge::Clamp => eof,
                })
            }
            _ => {
                let spf = self.spf_of(entry)?;
                let mut eof: Option<i64> = None;
                for input in Self::vector_inputs(entry) {
                    if let Some(e) = self.eof(input)? {
                        let e = rescale_up(e, spf, self.spf(input)?);
                        eof = Some(eof.map_or(e, |cur| cur.min(e)));
                    }
                }
                Ok(eof)
            }
        }
    }

    /// Value of a scalar parameter.
    pub(crate) fn scalar(&self, scalar: &Scalar) -> Result<Complex<f64>> {
        let (name, index) = match scalar {
            Scalar::Real(r) => return Ok(Complex::real(*r)),
            Scalar::Complex(c) => return Ok(*c),
            Scalar::Field { name, index } => (name, index),
        };
        let target = self.entry(name)?;
        let value = match &target.params {
            EntryParams::Const { value } => value.clone(),
            EntryParams::Carray { values } => {
                let i = index.unwrap_or(0);
                values.get(i).context(IndexOutOfBoundsSnafu {
                    name: name.as_str(),
                    index: i as i64,
                    len: values.len(),
                })?
            }
            _ => return Err(wrong_kind(target, "CONST or CARRAY")),
        };
        value.get::<Complex<f64>>().context(TypeSnafu { name: name.as_str() })
    }

    fn empty(&self, name: &str) -> Result<Series> {
        Ok(Series::zeros(self.native_type(name)?, 0))
    }

    /// Up to `len` samples of `name` starting at sample `first`.
    ///
    /// The result is short when the field ends inside the window.
    pub(crate) fn read(&self, name: &str, first: i64, len: usize) -> Result<Series> {
        ensure!(first >= 0, BadPositionSnafu { name, position: first });
        if len == 0 {
            return self.empty(name);
        }
        let entry = self.entry(name)?;
        let series = match &entry.params {
            EntryParams::Raw { data_type, .. } => self.read_raw(entry, *data_type, first, len)?,
            EntryParams::Index => Series::Real((first..first + len as i64).map(|n| n as f64).collect()),
            EntryParams::Lincom { terms } => {
                let spf = self.spf_of(entry)?;
                let mut inputs = Vec::with_capacity(terms.len());
                for term in terms {
                    inputs.push((
                        self.read_at_rate(&term.input, first, len, spf)?,
                        self.scalar(&term.scale)?,
                        self.scalar(&term.offset)?,
                    ));
                }
                kernels::lincom(&inputs)
            }
            EntryParams::Linterp { input, table } => {
                let x = self.read(input, first, len)?;
                let table = self.tables.borrow_mut().load(self.location, table)?;
                Series::Real(x.reals().into_iter().map(|v| table.lookup(v)).collect())
            }
            EntryParams::Bit {
                input,
                bitnum,
                numbits,
            } => kernels::bits(&self.read(input, first, len)?, *bitnum, *numbits, false),
            EntryParams::Sbit {
                input,
                bitnum,
                numbits,
            } => kernels::bits(&self.read(input, first, len)?, *bitnum, *numbits, true),
            EntryParams::Multiply { inputs } | EntryParams::Divide { inputs } => {
                let spf = self.spf(&inputs[0])?;
                let a = self.read(&inputs[0], first, len)?;
                let b = self.read_at_rate(&inputs[1], first, len, spf)?;
                match entry.params {
                    EntryParams::Multiply { .. } => kernels::multiply(&a, &b),
                    _ => kernels::divide(&a, &b),
                }
            }
            EntryParams::Phase { input, shift } => self.read_phase(entry, input, *shift, first, len)?,
            EntryParams::Polynom {
                input,
                coefficients,
            } => {
                let coefficients = coefficients
                    .iter()
                    .map(|c| self.scalar(c))
                    .collect::<Result<Vec<_>>>()?;
                kernels::polynom(&self.read(input, first, len)?, &coefficients)
            }
            EntryParams::Recip { input, dividend } => {
                kernels::recip(&self.read(input, first, len)?, self.scalar(dividend)?)
            }
            EntryParams::Window {
                input,
                check,
                op,
                threshold,
            } => {
                let spf = self.spf(input)?;
                let data = self.read(input, first, len)?;
                let check = self.read_at_rate(check, first, len, spf)?;
                kernels::window(&data, &check, *op, *threshold, self.config.window_fill)
            }
            EntryParams::Mplex {
                input,
                count,
                count_val,
                period,
            } => {
                let lookback = match self.config.mplex_lookback {
                    MplexLookback::Cycles(cycles) => i64::from(cycles) * i64::from((*period).max(1)),
                    MplexLookback::All => first,
                };
                let start = (first - lookback).max(0);
                let skip = (first - start) as usize;
                let spf = self.spf(input)?;
                let data = self.read(input, start, skip + len)?;
                let count = self.read_at_rate(count, start, skip + len, spf)?;
                kernels::mplex(&data, &count, *count_val, skip)
            }
            EntryParams::Indir { index, array } => {
                let EntryParams::Carray { values } = &self.entry(array)?.params else {
                    return Err(wrong_kind(self.entry(array)?, "CARRAY"));
                };
                let picks = self.array_indices(entry, index, values.len(), first, len)?;
                Series::from_samples(values).pick(picks.into_iter())
            }
            EntryParams::Sindir { index, array } => {
                let EntryParams::Sarray { values } = &self.entry(array)?.params else {
                    return Err(wrong_kind(self.entry(array)?, "SARRAY"));
                };
                let picks = self.array_indices(entry, index, values.len(), first, len)?;
                Series::Text(picks.into_iter().map(|i| values[i].clone()).collect())
            }
            EntryParams::Const { .. }
            | EntryParams::Carray { .. }
            | EntryParams::String { .. }
            | EntryParams::Sarray { .. }
            | EntryParams::Alias { .. } => return Err(wrong_kind(entry, "a vector field")),
        };
        Ok(series)
    }

    fn read_raw(&self, entry: &'a Entry, data_type: ElementType, first: i64, len: usize) -> Result<Series> {
        let target = self.raw_target(entry)?;
        let bof = self.bof(&entry.name)?;
        let pad = (bof - first).clamp(0, len as i64) as usize;
        let mut out = Series::zeros(data_type, pad);
        if pad == len {
            return Ok(out);
        }
        let file_first = (first + pad as i64 - bof) as u64;
        let mut streams = self.streams.borrow_mut();
        if let Some(stream) = streams.stream(&target, StreamMode::Read, self.location, self.codecs)? {
            let bytes = stream.read(file_first, len - pad)?;
            let samples = Samples::from_bytes(data_type, &bytes, ByteOrder::native())
                .context(TypeSnafu { name: entry.name.as_str() })?;
            out.append(&Series::from_samples(&samples));
        }
        Ok(out)
    }

    /// Read `name` over a window expressed in samples of a field with `spf` samples per frame.
    fn read_at_rate(&self, name: &str, first: i64, len: usize, spf: u32) -> Result<Series> {
        let own = self.spf(name)?;
        if own == spf {
            return self.read(name, first, len);
        }
        let map = |n: i64| (n * i64::from(own)).div_euclid(i64::from(spf));
        let lo = map(first);
        let hi = map(first + len as i64 - 1);
        let raw = self.read(name, lo, (hi - lo + 1) as usize)?;
        let available = raw.len();
        let picks = (first..first + len as i64)
            .map(|n| (map(n) - lo) as usize)
            .take_while(|&i| i < available);
        Ok(raw.pick(picks))
    }

    fn read_phase(&self, entry: &Entry, input: &str, shift: i64, first: i64, len: usize) -> Result<Series> {
        match self.config.phase_edge {
            PhaseEdge::Error => {
                let start = first + shift;
                ensure!(
                    start >= 0,
                    PhaseOutOfRangeSnafu {
                        name: entry.name.as_str(),
                        shift,
                        sample: start,
                    }
                );
                if let Some(end) = self.eof(input)? {
                    ensure!(
                        start + len as i64 <= end,
                        PhaseOutOfRangeSnafu {
                            name: entry.name.as_str(),
                            shift,
                            sample: start.max(end),
                        }
                    );
                }
                self.read(input, start, len)
            }
            PhaseEdge::Clamp => {
                let eof = self.eof(input)?;
                let len = match eof {
                    Some(end) => (end - first).clamp(0, len as i64) as usize,
                    None => len,
                };
                if len == 0 {
                    return self.empty(input);
                }
                let floor = self.bof(input)?;
                let last = eof.map_or(i64::MAX, |end| end - 1);
                let at = |n: i64| (n + shift).clamp(floor, last.max(floor));
                let lo = at(first);
                let hi = at(first + len as i64 - 1);
                let raw = self.read(input, lo, (hi - lo + 1) as usize)?;
                let available = raw.len();
                let picks = (first..first + len as i64)
                    .map(|n| (at(n) - lo) as usize)
                    .take_while(|&i| i < available);
                Ok(raw.pick(picks))
            }
        }
    }

    fn array_indices(&self, entry: &Entry, index: &str, len: usize, first: i64, count: usize) -> Result<Vec<usize>> {
        self.read(index, first, count)?
            .ints()
            .into_iter()
            .map(|i| {
                ensure!(
                    i >= 0 && (i as usize) < len,
                    IndexOutOfBoundsSnafu {
                        name: entry.name.as_str(),
                        index: i,
                        len,
                    }
                );
                Ok(i as usize)
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use std::cell::RefCell;

    use tempfile::TempDir;

    use super::*;
    use crate::types::Sample;

    /// A scratch dirfile state with one root fragment.
    pub(crate) struct Scratch {
        pub(crate) dir: TempDir,
        pub(crate) location: DirfileLocation,
        pub(crate) fields: FieldTable,
        pub(crate) fragments: Vec<Fragment>,
        pub(crate) config: DirfileConfig,
        pub(crate) codecs: CodecRegistry,
        pub(crate) streams: RefCell<StreamCache>,
        pub(crate) tables: RefCell<TableCache>,
    }

    impl Scratch {
        pub(crate) fn new() -> std::io::Result<Self> {
            let dir = TempDir::new()?;
            let location = DirfileLocation::local(dir.path());
            Ok(Self {
                dir,
                location,
                fields: FieldTable::default(),
                fragments: vec![Fragment::new("format", None)],
                config: DirfileConfig::default(),
                codecs: CodecRegistry::default(),
                streams: RefCell::default(),
                tables: RefCell::default(),
            })
        }

        pub(crate) fn eval(&self) -> Evaluator<'_> {
            Evaluator {
                fields: &self.fields,
                fragments: &self.fragments,
                config: &self.config,
                location: &self.location,
                codecs: &self.codecs,
                streams: &self.streams,
                tables: &self.tables,
            }
        }

        pub(crate) fn add(&mut self, entry: Entry) -> Result<()> {
            self.fields.insert(entry, false)
        }

        /// Write `values` as the whole contents of raw field `name`.
        pub(crate) fn fill<T: Sample>(&mut self, name: &str, values: Vec<T>) -> Result<()> {
            let series = Series::from_samples(&T::into_samples(values));
            self.eval().write(name, self.eval().bof(name)?, &series)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_util::Scratch, *};
    use crate::{
        config::WindowFill,
        entry::{Threshold, WindowOp},
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn int8_scratch() -> Result<Scratch, Box<dyn std::error::Error>> {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("data", ElementType::Int8, 8)?)?;
        s.fill("data", (1..=80).map(|v| v as i8).collect())?;
        Ok(s)
    }

    #[test]
    fn raw_reads_are_frame_addressed() -> TestResult {
        let s = int8_scratch()?;
        let e = s.eval();
        assert_eq!(e.read("data", 40, 8)?, Series::Int((41..=48).collect()));
        assert_eq!(e.eof("data")?, Some(80));
        assert_eq!(e.read("data", 76, 8)?.len(), 4);
        assert_eq!(e.read("data", 100, 8)?.len(), 0);
        assert!(matches!(e.read("data", -1, 1), Err(DirfileError::BadPosition { .. })));
        Ok(())
    }

    #[test]
    fn frame_offsets_pad_with_zeros() -> TestResult {
        let mut s = int8_scratch()?;
        s.fragments[0].frame_offset = 2;
        let e = s.eval();
        assert_eq!(e.bof("data")?, 16);
        assert_eq!(e.eof("data")?, Some(96));
        assert_eq!(
            e.read("data", 14, 4)?,
            Series::Int(vec![0, 0, 1, 2])
        );
        Ok(())
    }

    #[test]
    fn derived_fields_follow_their_formulas() -> TestResult {
        let mut s = int8_scratch()?;
        s.add(Entry::lincom("lin", &["data"], vec![2.0.into()], vec![1.0.into()])?)?;
        s.add(Entry::bit("low", "data", 0, 2)?)?;
        s.add(Entry::multiply("sq", "data", "data")?)?;
        s.add(Entry::phase("next", "data", 1)?)?;
        s.add(Entry::polynom("poly", "data", 2, vec![0.0.into(), 0.0.into(), 1.0.into()])?)?;
        s.add(Entry::alias("al", "lin")?)?;
        let e = s.eval();
        assert_eq!(e.read("lin", 0, 3)?, Series::Real(vec![3.0, 5.0, 7.0]));
        assert_eq!(e.read("al", 0, 3)?, Series::Real(vec![3.0, 5.0, 7.0]));
        assert_eq!(e.read("low", 0, 4)?, Series::Uint(vec![1, 2, 3, 0]));
        assert_eq!(e.read("sq", 2, 2)?, Series::Real(vec![9.0, 16.0]));
        assert_eq!(e.read("next", 0, 2)?, Series::Int(vec![2, 3]));
        assert_eq!(e.read("poly", 3, 1)?, Series::Real(vec![16.0]));
        assert_eq!(e.native_type("lin")?, ElementType::Float64);
        assert_eq!(e.native_type("next")?, ElementType::Int8);
        assert_eq!(e.eof("next")?, Some(79));
        Ok(())
    }

    #[test]
    fn slower_inputs_are_resampled() -> TestResult {
        let mut s = int8_scratch()?;
        s.add(Entry::multiply("scaled", "data", "INDEX")?)?;
        let e = s.eval();
        assert_eq!(e.spf("scaled")?, 8);
        // samples 8..10 of data lie in frame 1
        assert_eq!(e.read("scaled", 7, 3)?, Series::Real(vec![0.0, 9.0, 10.0]));
        assert_eq!(e.eof("scaled")?, Some(80));
        Ok(())
    }

    #[test]
    fn phase_edges_follow_the_policy() -> TestResult {
        let mut s = int8_scratch()?;
        s.add(Entry::phase("back", "data", -2)?)?;
        assert!(matches!(
            s.eval().read("back", 0, 4),
            Err(DirfileError::PhaseOutOfRange { sample: -2, .. })
        ));
        s.config.phase_edge = PhaseEdge::Clamp;
        let e = s.eval();
        assert_eq!(e.read("back", 0, 4)?, Series::Int(vec![1, 1, 1, 2]));
        s.add(Entry::phase("ahead", "data", 3)?)?;
        let e = s.eval();
        assert_eq!(e.read("ahead", 76, 8)?, Series::Int(vec![80, 80, 80, 80]));

        s.config.phase_edge = PhaseEdge::Error;
        let e = s.eval();
        assert_eq!(e.read("ahead", 72, 5)?, Series::Int(vec![76, 77, 78, 79, 80]));
        assert!(matches!(
            e.read("ahead", 76, 8),
            Err(DirfileError::PhaseOutOfRange { sample: 80, .. })
        ));
        Ok(())
    }

    #[test]
    fn clamped_phase_stops_at_the_first_stored_sample() -> TestResult {
        let mut s = int8_scratch()?;
        s.fragments[0].frame_offset = 1;
        s.config.phase_edge = PhaseEdge::Clamp;
        s.add(Entry::phase("back", "data", -2)?)?;
        let e = s.eval();
        assert_eq!(e.bof("back")?, 8);
        assert_eq!(e.read("back", 8, 4)?, Series::Int(vec![1, 1, 1, 2]));
        Ok(())
    }

    #[test]
    fn windows_and_multiplexes() -> TestResult {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("d", ElementType::Int32, 1)?)?;
        s.add(Entry::raw("sel", ElementType::Uint8, 1)?)?;
        s.fill("d", vec![10i32, 11, 12, 13, 14, 15])?;
        s.fill("sel", vec![1u8, 2, 1, 2, 1, 2])?;
        s.add(Entry::window("w", "d", "sel", WindowOp::Eq, Threshold::Int(1))?)?;
        s.add(Entry::mplex("m", "d", "sel", 2, 2)?)?;
        let e = s.eval();
        assert_eq!(e.read("w", 0, 4)?, Series::Int(vec![10, 0, 12, 0]));
        assert_eq!(e.read("m", 2, 3)?, Series::Int(vec![11, 13, 13]));
        s.config.window_fill = WindowFill::NotANumber;
        assert_eq!(s.eval().native_type("w")?, ElementType::Int32);
        Ok(())
    }

    #[test]
    fn indirection_checks_bounds() -> TestResult {
        let mut s = Scratch::new()?;
        s.add(Entry::raw("i", ElementType::Uint8, 1)?)?;
        s.fill("i", vec![0u8, 2, 1, 3])?;
        s.add(Entry::carray("arr", Samples::Float32(vec![0.5, 1.5, 2.5]))?)?;
        s.add(Entry::sarray("names", vec!["a".into(), "b".into(), "c".into()])?)?;
        s.add(Entry::indir("look", "i", "arr")?)?;
        s.add(Entry::sindir("say", "i", "names")?)?;
        let e = s.eval();
        assert_eq!(e.read("look", 0, 3)?, Series::Real(vec![0.5, 2.5, 1.5]));
        assert_eq!(e.native_type("look")?, ElementType::Float32);
        assert_eq!(
            e.read("say", 1, 2)?,
            Series::Text(vec!["c".into(), "b".into()])
        );
        assert!(matches!(
            e.read("look", 0, 4),
            Err(DirfileError::IndexOutOfBounds { index: 3, .. })
        ));
        Ok(())
    }

    #[test]
    fn scalars_resolve_through_constants() -> TestResult {
        let mut s = int8_scratch()?;
        s.add(Entry::constant("gain", crate::types::Value::Int16(3))?)?;
        s.add(Entry::carray("offsets", Samples::Float64(vec![0.0, 100.0]))?)?;
        s.add(Entry::lincom(
            "cal",
            &["data"],
            vec![Scalar::field("gain")],
            vec![Scalar::element("offsets", 1)],
        )?)?;
        s.add(Entry::recip("inv", "data", Scalar::field("data"))?)?;
        let e = s.eval();
        assert_eq!(e.read("cal", 0, 2)?, Series::Real(vec![103.0, 106.0]));
        assert!(matches!(e.read("inv", 0, 1), Err(DirfileError::WrongKind { .. })));
        Ok(())
    }
}
