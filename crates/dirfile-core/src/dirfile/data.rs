//! Sample reads and writes, cursors, field sizes and raw stream lifecycle.

use std::{collections::HashSet, path::PathBuf};

use snafu::prelude::*;

use crate::{
    entry::EntryParams,
    error::{BadPositionSnafu, DomainSnafu, Result, TypeSnafu, WrongKindSnafu},
    eval::{
        graph::{self, Missing},
        series::Series,
    },
    io::{IoDirection, Position, SampleRange, SeekOrigin},
    types::{ElementType, Sample, Samples},
};

use super::Dirfile;

impl Dirfile {
    /// Read `range` of `name` converted to `ty`.
    ///
    /// The result is short when the field ends inside the window and empty
    /// when the window starts past the end. The field's cursor moves to the
    /// sample after the last one returned.
    pub fn get_samples(&self, name: &str, range: SampleRange, ty: ElementType) -> Result<Samples> {
        let result = self.get_inner(name, range, ty);
        self.track(result)
    }

    fn get_inner(&self, name: &str, range: SampleRange, ty: ElementType) -> Result<Samples> {
        graph::check(&self.fields, name, Missing::Fail)?;
        let eval = self.evaluator();
        let key = eval.entry(name)?.name.clone();
        let spf = eval.spf(name)?;
        let (first, len) = range.resolve(name, spf, self.cursor(&key).sample)?;
        let series = eval.read(name, first, len)?;
        let samples = series.to_samples(ty).context(TypeSnafu { name })?;
        self.positions.borrow_mut().insert(
            key,
            Position {
                sample: first + series.len() as i64,
                direction: IoDirection::Read,
            },
        );
        tracing::trace!(target: "dirfile", field = name, first, requested = len, returned = samples.len(), "read samples");
        Ok(samples)
    }

    /// Read `range` of `name` as `T`.
    pub fn get_data<T: Sample>(&self, name: &str, range: SampleRange) -> Result<Vec<T>> {
        let samples = self.get_samples(name, range, T::TYPE)?;
        let result = samples.to_vec::<T>().context(TypeSnafu { name });
        self.track(result)
    }

    /// Read `range` of a text-valued field such as SINDIR.
    pub fn get_text(&self, name: &str, range: SampleRange) -> Result<Vec<String>> {
        match self.get_samples(name, range, ElementType::Text)? {
            Samples::Text(values) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    /// Write the first `range.len(spf)` samples of `data` through `name`.
    /// Returns the number of samples written.
    pub fn put_samples(&mut self, name: &str, range: SampleRange, data: &Samples) -> Result<usize> {
        let result = self.put_inner(name, range, data);
        self.track(result)
    }

    fn put_inner(&mut self, name: &str, range: SampleRange, data: &Samples) -> Result<usize> {
        self.ensure_writable()?;
        graph::check(&self.fields, name, Missing::Fail)?;
        let eval = self.evaluator();
        let key = eval.entry(name)?.name.clone();
        let spf = eval.spf(name)?;
        let (first, len) = range.resolve(name, spf, self.cursor(&key).sample)?;
        ensure!(
            data.len() >= len,
            DomainSnafu {
                name,
                reason: format!("{len} samples requested but {} supplied", data.len()),
            }
        );
        let mut series = Series::from_samples(data);
        series.truncate(len);
        let written = eval.write(name, first, &series)?;
        self.positions.get_mut().insert(
            key,
            Position {
                sample: first + written as i64,
                direction: IoDirection::Write,
            },
        );
        Ok(written)
    }

    /// Write `data` through `name`.
    pub fn put_data<T: Sample>(&mut self, name: &str, range: SampleRange, data: &[T]) -> Result<usize> {
        self.put_samples(name, range, &T::into_samples(data.to_vec()))
    }

    fn cursor(&self, key: &str) -> Position {
        self.positions.borrow().get(key).copied().unwrap_or_default()
    }

    /// Move the cursor of `name` to `frame` frames plus `sample` samples
    /// from `origin`, returning the new absolute sample.
    ///
    /// Seeking a raw field past its end for writing pads it with zeros.
    pub fn seek(
        &mut self,
        name: &str,
        frame: i64,
        sample: i64,
        origin: SeekOrigin,
        direction: IoDirection,
    ) -> Result<i64> {
        let result = self.seek_inner(name, frame, sample, origin, direction);
        self.track(result)
    }

    fn seek_inner(
        &mut self,
        name: &str,
        frame: i64,
        sample: i64,
        origin: SeekOrigin,
        direction: IoDirection,
    ) -> Result<i64> {
        graph::check(&self.fields, name, Missing::Fail)?;
        let eval = self.evaluator();
        let entry = eval.entry(name)?;
        let key = entry.name.clone();
        let spf = i64::from(eval.spf(name)?);
        let base = match origin {
            SeekOrigin::Set => 0,
            SeekOrigin::Cur => self.cursor(&key).sample,
            SeekOrigin::End => self.eof_inner(name)?,
        };
        let position = base + frame * spf + sample;
        ensure!(position >= 0, BadPositionSnafu { name, position });

        if direction == IoDirection::Write {
            if let EntryParams::Raw { data_type, .. } = entry.params {
                self.ensure_writable()?;
                let end = eval.eof(name)?.unwrap_or(0).max(eval.bof(name)?);
                if position > end {
                    let zeros = Series::zeros(data_type, (position - end) as usize);
                    eval.write(name, end, &zeros)?;
                }
            }
        }
        self.positions.get_mut().insert(
            key,
            Position {
                sample: position,
                direction,
            },
        );
        Ok(position)
    }

    /// Current cursor of `name` in samples; 0 before any I/O.
    pub fn tell(&self, name: &str) -> Result<i64> {
        let result = self
            .fields
            .resolve(name)
            .map(|entry| self.cursor(&entry.name).sample);
        self.track(result)
    }

    /// Number of frames of the reference field; 0 when there is none.
    pub fn nframes(&self) -> Result<i64> {
        let result = match self.reference() {
            Some(reference) => {
                let eval = self.evaluator();
                eval.eof(&reference).and_then(|eof| {
                    let spf = i64::from(eval.spf(&reference)?);
                    Ok(eof.unwrap_or(0).div_euclid(spf))
                })
            }
            None => Ok(0),
        };
        self.track(result)
    }

    /// One past the last sample of `name`.
    pub fn eof(&self, name: &str) -> Result<i64> {
        let result = self.eof_inner(name);
        self.track(result)
    }

    fn eof_inner(&self, name: &str) -> Result<i64> {
        graph::check(&self.fields, name, Missing::Fail)?;
        let eval = self.evaluator();
        match eval.eof(name)? {
            Some(eof) => Ok(eof),
            None => {
                let entry = eval.entry(name)?;
                WrongKindSnafu {
                    name,
                    kind: entry.kind(),
                    expected: "a field with an end",
                }
                .fail()
            }
        }
    }

    /// First sample of `name` backed by stored data.
    pub fn bof(&self, name: &str) -> Result<i64> {
        let result = graph::check(&self.fields, name, Missing::Fail).and_then(|()| self.evaluator().bof(name));
        self.track(result)
    }

    /// Samples per frame of `name`.
    pub fn spf(&self, name: &str) -> Result<u32> {
        let result = graph::check(&self.fields, name, Missing::Fail).and_then(|()| self.evaluator().spf(name));
        self.track(result)
    }

    /// Element type `name` yields when read without conversion.
    pub fn native_type(&self, name: &str) -> Result<ElementType> {
        let result =
            graph::check(&self.fields, name, Missing::Fail).and_then(|()| self.evaluator().native_type(name));
        self.track(result)
    }

    /// Fractional frame at which `name` takes `value`.
    pub fn framenum(&self, name: &str, value: f64) -> Result<f64> {
        self.framenum_subset(name, value, None, None)
    }

    /// [`Dirfile::framenum`] searching only frames `start..end`. A missing
    /// start means the beginning of the field; a missing or zero end means
    /// its end.
    ///
    /// The field must be monotonic over the searched frames. Values outside
    /// its range are extrapolated from the two nearest samples.
    pub fn framenum_subset(&self, name: &str, value: f64, start: Option<i64>, end: Option<i64>) -> Result<f64> {
        let result = self.framenum_inner(name, value, start, end);
        self.track(result)
    }

    fn framenum_inner(&self, name: &str, value: f64, start: Option<i64>, end: Option<i64>) -> Result<f64> {
        graph::check(&self.fields, name, Missing::Fail)?;
        let eval = self.evaluator();
        let spf = i64::from(eval.spf(name)?);
        let eof = self.eof_inner(name)?;
        let first = (start.unwrap_or(0) * spf).max(eval.bof(name)?);
        let last = match end {
            None | Some(0) => eof,
            Some(frame) => (frame * spf).min(eof),
        };
        ensure!(
            last - first >= 2,
            DomainSnafu {
                name,
                reason: "at least two samples are needed to interpolate",
            }
        );
        let data = eval.read(name, first, (last - first) as usize)?.reals();
        let i = bracket(&data, value);
        let (lo, hi) = (data[i], data[i + 1]);
        let fraction = if hi == lo { 0.0 } else { (value - lo) / (hi - lo) };
        let sample = (first + i as i64) as f64 + fraction;
        Ok(sample / spf as f64)
    }

    /// Path of raw field `name`'s data file.
    pub fn raw_filename(&self, name: &str) -> Result<PathBuf> {
        let result = self.fields.resolve(name).and_then(|entry| match entry.params {
            EntryParams::Raw { .. } => Ok(self.location.join(self.raw_file(&entry.name, entry.fragment)?)),
            _ => WrongKindSnafu {
                name,
                kind: entry.kind(),
                expected: "RAW",
            }
            .fail(),
        });
        self.track(result)
    }

    /// Path of LINTERP field `name`'s lookup table.
    pub fn linterp_tablename(&self, name: &str) -> Result<PathBuf> {
        let result = self.fields.resolve(name).and_then(|entry| match &entry.params {
            EntryParams::Linterp { table, .. } => Ok(self.location.join(table)),
            _ => WrongKindSnafu {
                name,
                kind: entry.kind(),
                expected: "LINTERP",
            }
            .fail(),
        });
        self.track(result)
    }

    /// Raw fields `name` reads from, itself included.
    fn raw_dependencies(&self, name: &str) -> Result<Vec<String>> {
        graph::check(&self.fields, name, Missing::Ignore)?;
        let mut seen = HashSet::new();
        let mut raw = Vec::new();
        let mut todo = vec![name.to_string()];
        while let Some(current) = todo.pop() {
            let Ok(entry) = self.fields.resolve(&current) else {
                continue;
            };
            if !seen.insert(entry.name.clone()) {
                continue;
            }
            if matches!(entry.params, EntryParams::Raw { .. }) {
                raw.push(entry.name.clone());
            }
            todo.extend(entry.references().into_iter().map(str::to_string));
        }
        Ok(raw)
    }

    /// Commit the raw streams `name` depends on, keeping them open.
    pub fn sync(&mut self, name: &str) -> Result<()> {
        let result = self.raw_dependencies(name).and_then(|raw| {
            let streams = self.streams.get_mut();
            raw.iter().try_for_each(|r| streams.sync(r))
        });
        self.track(result)
    }

    /// Commit every raw stream and pending metadata, keeping streams open.
    pub fn sync_all(&mut self) -> Result<()> {
        let result = self.streams.get_mut().sync_all().and_then(|()| {
            if self.options.write {
                self.metaflush_inner()?;
            }
            Ok(())
        });
        self.track(result)
    }

    /// Commit and close the raw streams `name` depends on.
    pub fn raw_close(&mut self, name: &str) -> Result<()> {
        let result = self.raw_dependencies(name).and_then(|raw| {
            let streams = self.streams.get_mut();
            raw.iter().try_for_each(|r| streams.close(r))
        });
        self.track(result)
    }

    /// Commit and close every raw stream; metadata is left pending.
    pub fn raw_close_all(&mut self) -> Result<()> {
        let result = self.streams.get_mut().close_all();
        self.track(result)
    }

    /// Close the raw streams of `name` and write its fragment if it has
    /// pending metadata.
    pub fn flush(&mut self, name: &str) -> Result<()> {
        let result = self.flush_inner(name);
        self.track(result)
    }

    fn flush_inner(&mut self, name: &str) -> Result<()> {
        let fragment = self.fields.resolve(name)?.fragment;
        for raw in self.raw_dependencies(name)? {
            self.streams.get_mut().close(&raw)?;
        }
        if self.options.write && self.fragments.get(fragment).is_some_and(|f| f.dirty) {
            self.write_fragment(fragment)?;
        }
        Ok(())
    }

    /// Close every raw stream and write all pending metadata.
    pub fn flush_all(&mut self) -> Result<()> {
        let result = self.streams.get_mut().close_all().and_then(|()| {
            if self.options.write {
                self.metaflush_inner()?;
            }
            Ok(())
        });
        self.track(result)
    }
}

/// Index `i` such that `value` lies between `data[i]` and `data[i + 1]`,
/// or the nearest end pair when it lies outside. `data` holds at least two
/// monotonic samples.
fn bracket(data: &[f64], value: f64) -> usize {
    let ascending = data[data.len() - 1] >= data[0];
    let below = |x: f64| if ascending { x <= value } else { x >= value };
    if !below(data[0]) {
        return 0;
    }
    let (mut lo, mut hi) = (0, data.len() - 1);
    if below(data[hi]) {
        return hi - 1;
    }
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if below(data[mid]) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::OpenOptions,
        entry::Entry,
        error::DirfileError,
        io::{FrameRef, SampleRange},
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn int8() -> Result<(TempDir, Dirfile), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let mut dirfile = Dirfile::open(tmp.path(), OpenOptions::new().create(true))?;
        dirfile.add(Entry::raw("data", ElementType::Int8, 8)?)?;
        let values: Vec<i8> = (1..=80).collect();
        dirfile.put_data("data", SampleRange::frames(0, 10), &values)?;
        Ok((tmp, dirfile))
    }

    #[test]
    fn cursors_follow_reads_and_seeks() -> TestResult {
        let (_tmp, mut dirfile) = int8()?;
        assert_eq!(dirfile.tell("data")?, 80);
        assert_eq!(dirfile.seek("data", 7, 0, SeekOrigin::Set, IoDirection::Read)?, 56);
        let next = dirfile.get_data::<i8>("data", SampleRange::here(1, 0))?;
        assert_eq!(next, (57..=64).collect::<Vec<i8>>());
        assert_eq!(dirfile.tell("data")?, 64);
        assert_eq!(dirfile.seek("data", 0, -4, SeekOrigin::End, IoDirection::Read)?, 76);
        assert_eq!(dirfile.seek("data", -1, 0, SeekOrigin::Cur, IoDirection::Read)?, 68);
        assert!(matches!(
            dirfile.seek("data", -20, 0, SeekOrigin::Cur, IoDirection::Read),
            Err(DirfileError::BadPosition { .. })
        ));
        Ok(())
    }

    #[test]
    fn seeking_to_write_pads_the_field() -> TestResult {
        let (_tmp, mut dirfile) = int8()?;
        dirfile.seek("data", 11, 0, SeekOrigin::Set, IoDirection::Write)?;
        assert_eq!(dirfile.eof("data")?, 88);
        dirfile.put_data("data", SampleRange::here(0, 2), &[7i8, 8])?;
        assert_eq!(dirfile.get_data::<i8>("data", SampleRange::new(10, 6, 0, 4))?, vec![0, 0, 7, 8]);
        assert_eq!(dirfile.nframes()?, 11);
        Ok(())
    }

    #[test]
    fn short_reads_and_type_conversion() -> TestResult {
        let (_tmp, dirfile) = int8()?;
        let tail = dirfile.get_samples("data", SampleRange::frames(9, 2), ElementType::Float64)?;
        assert_eq!(tail.len(), 8);
        assert_eq!(tail.get(0), Some(crate::types::Value::Float64(73.0)));
        assert!(dirfile.get_data::<u8>("data", SampleRange::frames(20, 1))?.is_empty());
        assert!(matches!(
            dirfile.get_data::<u8>("data", SampleRange::frames(0, 0)),
            Err(DirfileError::EmptyRequest { .. })
        ));
        assert!(matches!(
            dirfile.get_samples("data", SampleRange::frames(0, 1), ElementType::Unknown),
            Err(DirfileError::Type { .. })
        ));
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected() -> TestResult {
        let (_tmp, mut dirfile) = int8()?;
        let err = dirfile.put_data("data", SampleRange::frames(0, 1), &[1i8, 2]);
        assert!(matches!(err, Err(DirfileError::Domain { .. })));
        Ok(())
    }

    #[test]
    fn framenum_interpolates_across_the_offset() -> TestResult {
        let (_tmp, mut dirfile) = int8()?;
        dirfile.alter_frame_offset(0, 33, false)?;
        assert_eq!(dirfile.bof("data")?, 264);
        assert_eq!(dirfile.framenum("data", 52.5)?, 39.4375);
        assert_eq!(dirfile.framenum("data", 0.0)?, 33.0 - 1.0 / 8.0);
        assert_eq!(dirfile.framenum_subset("data", 20.0, Some(35), Some(0))?, 35.375);
        Ok(())
    }

    #[test]
    fn sizes_and_file_names() -> TestResult {
        let (tmp, mut dirfile) = int8()?;
        dirfile.add(Entry::linterp("cal", "data", "table.lut")?)?;
        assert_eq!(dirfile.spf("cal")?, 8);
        assert_eq!(dirfile.native_type("cal")?, ElementType::Float64);
        assert_eq!(dirfile.raw_filename("data")?, tmp.path().join("data"));
        assert_eq!(dirfile.linterp_tablename("cal")?, tmp.path().join("table.lut"));
        assert!(matches!(dirfile.eof("INDEX"), Err(DirfileError::WrongKind { .. })));
        assert_eq!(dirfile.nframes()?, 10);
        assert_eq!(SampleRange::here(1, 0).start, FrameRef::Here);
        Ok(())
    }

    #[test]
    fn stream_lifecycle_commits_data() -> TestResult {
        let (tmp, mut dirfile) = int8()?;
        dirfile.add(Entry::phase("late", "data", 8)?)?;
        dirfile.put_data("late", SampleRange::samples(0, 1), &[99i8])?;
        dirfile.sync("late")?;
        dirfile.flush("late")?;
        dirfile.sync_all()?;
        dirfile.raw_close("data")?;
        dirfile.raw_close_all()?;
        dirfile.flush_all()?;
        assert_eq!(std::fs::read(tmp.path().join("data"))?[8], 99);
        Ok(())
    }

    #[test]
    fn bracketing_handles_both_directions() {
        assert_eq!(bracket(&[1.0, 2.0, 3.0, 4.0], 2.5), 1);
        assert_eq!(bracket(&[4.0, 3.0, 2.0, 1.0], 2.5), 1);
        assert_eq!(bracket(&[1.0, 2.0, 3.0], -5.0), 0);
        assert_eq!(bracket(&[1.0, 2.0, 3.0], 10.0), 1);
    }
}
