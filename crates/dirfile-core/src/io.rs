//! Frame and sample addressing.
//!
//! Reads and writes name a window as a starting frame plus a sample offset
//! within it, and a length of whole frames plus extra samples. The frame
//! size is the samples-per-frame of the field being accessed, so the same
//! [`SampleRange`] covers a different number of samples on fields of
//! different rates.

use snafu::prelude::*;

use crate::error::{BadPositionSnafu, EmptyRequestSnafu, Result};

/// Where a window starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    /// At an absolute frame.
    At(i64),
    /// At the field's current I/O position.
    Here,
}

/// Reference point of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekOrigin {
    /// From sample 0.
    #[default]
    Set,
    /// From the current position.
    Cur,
    /// From the end of the field.
    End,
}

/// Direction of the next operation at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoDirection {
    /// The next operation reads.
    #[default]
    Read,
    /// The next operation writes.
    Write,
}

/// A field's I/O cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Absolute sample number.
    pub sample: i64,
    /// Direction recorded by the last seek or transfer.
    pub direction: IoDirection,
}

/// A window of samples addressed by frames and samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRange {
    /// First frame, or the current position.
    pub start: FrameRef,
    /// Samples past the start of `start`.
    pub first_sample: i64,
    /// Whole frames requested.
    pub num_frames: usize,
    /// Extra samples requested.
    pub num_samples: usize,
}

impl SampleRange {
    /// `num_frames` frames plus `num_samples` samples starting at sample
    /// `first_sample` of frame `first_frame`.
    pub fn new(first_frame: i64, first_sample: i64, num_frames: usize, num_samples: usize) -> Self {
        Self {
            start: FrameRef::At(first_frame),
            first_sample,
            num_frames,
            num_samples,
        }
    }

    /// Whole frames starting at `first_frame`.
    pub fn frames(first_frame: i64, num_frames: usize) -> Self {
        Self::new(first_frame, 0, num_frames, 0)
    }

    /// Samples starting at absolute sample `first_sample`.
    pub fn samples(first_sample: i64, num_samples: usize) -> Self {
        Self::new(0, first_sample, 0, num_samples)
    }

    /// A window continuing from the field's current position.
    pub fn here(num_frames: usize, num_samples: usize) -> Self {
        Self {
            start: FrameRef::Here,
            first_sample: 0,
            num_frames,
            num_samples,
        }
    }

    /// Offset the start by `samples`.
    pub fn offset(mut self, samples: i64) -> Self {
        self.first_sample += samples;
        self
    }

    /// Number of samples covered on a field with `spf` samples per frame.
    pub fn len(&self, spf: u32) -> usize {
        self.num_frames * spf as usize + self.num_samples
    }

    /// True when the window covers no samples on any field.
    pub fn is_empty(&self) -> bool {
        self.num_frames == 0 && self.num_samples == 0
    }

    /// First sample and length on field `name`, given its rate and cursor.
    pub(crate) fn resolve(&self, name: &str, spf: u32, here: i64) -> Result<(i64, usize)> {
        let len = self.len(spf);
        ensure!(len > 0, EmptyRequestSnafu { name });
        let base = match self.start {
            FrameRef::At(frame) => frame * i64::from(spf),
            FrameRef::Here => here,
        };
        let first = base + self.first_sample;
        ensure!(first >= 0, BadPositionSnafu { name, position: first });
        Ok((first, len))
    }
}
