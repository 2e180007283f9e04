//! Open options and evaluation policy.

use serde::{Deserialize, Serialize};

use crate::{codec::Encoding, types::ByteOrder};

/// How far back a MPLEX field searches for the last matching sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MplexLookback {
    /// Search at most this many selector periods before the requested window.
    Cycles(u32),
    /// Search back to the start of the field.
    All,
}

impl Default for MplexLookback {
    fn default() -> Self {
        MplexLookback::Cycles(10)
    }
}

/// Value produced by a WINDOW field where the check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFill {
    /// Zero of the output type.
    #[default]
    Zero,
    /// NaN for floating-point outputs; integer outputs still get zero.
    NotANumber,
}

/// What a PHASE field does when its shifted window leaves the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseEdge {
    /// Fail with a range error.
    #[default]
    Error,
    /// Repeat the first or last sample of the input.
    Clamp,
}

/// Evaluation policy of an open dirfile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirfileConfig {
    /// MPLEX search limit.
    pub mplex_lookback: MplexLookback,
    /// WINDOW sentinel.
    pub window_fill: WindowFill,
    /// PHASE boundary policy.
    pub phase_edge: PhaseEdge,
    /// Printed before each diagnostic in verbose mode.
    pub verbose_prefix: Option<String>,
}

/// Options for [`Dirfile::open`](crate::Dirfile::open).
///
/// ```
/// use dirfile_core::OpenOptions;
///
/// let options = OpenOptions::new().write(true).create(true);
/// assert!(options.is_writable());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub(crate) write: bool,
    pub(crate) create: bool,
    pub(crate) exclusive: bool,
    pub(crate) truncate: bool,
    pub(crate) truncate_subdirectories: bool,
    pub(crate) ignore_duplicates: bool,
    pub(crate) verbose: bool,
    pub(crate) pretty: bool,
    pub(crate) byte_order: Option<ByteOrder>,
    pub(crate) encoding: Option<Encoding>,
    pub(crate) config: DirfileConfig,
}

impl OpenOptions {
    /// Read-only defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow metadata and sample writes.
    pub fn write(mut self, yes: bool) -> Self {
        self.write = yes;
        self
    }

    /// Create the dirfile if it does not exist. Implies `write`.
    pub fn create(mut self, yes: bool) -> Self {
        self.create = yes;
        self.write |= yes;
        self
    }

    /// Fail if the dirfile already exists. Implies `create`.
    pub fn exclusive(mut self, yes: bool) -> Self {
        self.exclusive = yes;
        if yes {
            self = self.create(true);
        }
        self
    }

    /// Empty an existing dirfile directory. Implies `create`.
    pub fn truncate(mut self, yes: bool) -> Self {
        self.truncate = yes;
        if yes {
            self = self.create(true);
        }
        self
    }

    /// When truncating, remove subdirectories too.
    pub fn truncate_subdirectories(mut self, yes: bool) -> Self {
        self.truncate_subdirectories = yes;
        self
    }

    /// Let a later definition of a name replace an earlier one instead of failing.
    pub fn ignore_duplicates(mut self, yes: bool) -> Self {
        self.ignore_duplicates = yes;
        self
    }

    /// Print each recorded error to stderr.
    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }

    /// Pretty-print fragment documents.
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Force the byte order of every fragment.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = Some(order);
        self
    }

    /// Force the encoding of every fragment.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Evaluation policy.
    pub fn config(mut self, config: DirfileConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether writes are allowed.
    pub fn is_writable(&self) -> bool {
        self.write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_missing_keys_with_defaults() -> Result<(), serde_json::Error> {
        let config: DirfileConfig = serde_json::from_str(r#"{"phase_edge": "clamp"}"#)?;
        assert_eq!(config.phase_edge, PhaseEdge::Clamp);
        assert_eq!(config.mplex_lookback, MplexLookback::Cycles(10));
        assert_eq!(config.window_fill, WindowFill::Zero);

        let config: DirfileConfig = serde_json::from_str(r#"{"mplex_lookback": "all"}"#)?;
        assert_eq!(config.mplex_lookback, MplexLookback::All);
        Ok(())
    }

    #[test]
    fn creation_flags_imply_write() {
        let options = OpenOptions::new().truncate(true);
        assert!(options.create && options.write);
        assert!(!OpenOptions::new().is_writable());
    }
}
