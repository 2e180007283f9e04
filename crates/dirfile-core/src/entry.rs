//! Field descriptor model.
//!
//! An [`Entry`] is the envelope shared by every field (name, owning fragment,
//! flags) around exactly one kind-specific payload, [`EntryParams`]. Because
//! the payload is a closed enum, the kind of an entry is always the kind of
//! its payload; there is no way to build an entry whose kind and parameters
//! disagree.
//!
//! The constructors (`Entry::raw`, `Entry::lincom`, ...) validate the arity
//! and range invariants of their kind and never touch storage. An entry only
//! becomes part of a dirfile when it is passed to
//! [`Dirfile::add`](crate::Dirfile::add).
//!
//! Input fields are held by name. They are references, resolved against the
//! dirfile's current field table whenever the entry is evaluated.

mod kind;
mod params;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

pub use kind::EntryKind;
pub use params::{LincomTerm, Scalar, Threshold, WindowOp};

use crate::types::{ElementType, Samples, Value};

/// Maximum number of LINCOM inputs.
pub const MAX_LINCOM: usize = 3;

/// Maximum POLYNOM order.
pub const MAX_POLYORD: usize = 5;

/// Name of the implicit frame counter field.
pub const INDEX_FIELD: &str = "INDEX";

/// Errors raised when an entry violates the invariants of its kind.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum EntryError {
    /// Field names may not be empty.
    #[snafu(display("field name is empty"))]
    EmptyName,

    /// The field name contains a forbidden character or structure.
    #[snafu(display("invalid field name {name:?}: {reason}"))]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The name is reserved for an implicit field.
    #[snafu(display("field name {name:?} is reserved"))]
    ReservedName {
        /// The reserved name.
        name: String,
    },

    /// A required input field was not named.
    #[snafu(display("{kind} field {name:?} is missing its {role} input"))]
    MissingInput {
        /// Field being built.
        name: String,
        /// Kind of the field.
        kind: EntryKind,
        /// Which input is missing.
        role: &'static str,
    },

    /// The number of inputs is outside the range allowed for the kind.
    #[snafu(display("{kind} field {name:?} takes 1 to {max} inputs, got {found}"))]
    InputCount {
        /// Field being built.
        name: String,
        /// Kind of the field.
        kind: EntryKind,
        /// Inputs supplied.
        found: usize,
        /// Largest allowed input count.
        max: usize,
    },

    /// Parallel coefficient lists have different lengths.
    #[snafu(display(
        "{kind} field {name:?} expects {expected} coefficients per list, got {found}"
    ))]
    CoefficientCount {
        /// Field being built.
        name: String,
        /// Kind of the field.
        kind: EntryKind,
        /// Required length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },

    /// Polynomial order out of range.
    #[snafu(display("POLYNOM field {name:?} has order {order}, expected 1 to {max}"))]
    PolynomOrder {
        /// Field being built.
        name: String,
        /// Requested order.
        order: usize,
        /// Largest allowed order.
        max: usize,
    },

    /// The bit range is empty or does not fit in 64 bits.
    #[snafu(display("field {name:?} has invalid bit range: bitnum {bitnum}, numbits {numbits}"))]
    BitRange {
        /// Field being built.
        name: String,
        /// First bit.
        bitnum: i64,
        /// Number of bits.
        numbits: i64,
    },

    /// Samples per frame must be positive.
    #[snafu(display("RAW field {name:?} must have at least one sample per frame"))]
    ZeroSpf {
        /// Field being built.
        name: String,
    },

    /// The element type cannot be used for this kind.
    #[snafu(display("{kind} field {name:?} cannot have element type {ty}"))]
    BadType {
        /// Field being built.
        name: String,
        /// Kind of the field.
        kind: EntryKind,
        /// The rejected type.
        ty: ElementType,
    },

    /// Array constants must hold at least one element.
    #[snafu(display("{kind} field {name:?} must have at least one element"))]
    EmptyArray {
        /// Field being built.
        name: String,
        /// Kind of the field.
        kind: EntryKind,
    },

    /// The threshold variant does not suit the window operator.
    #[snafu(display("WINDOW field {name:?}: operator {op} needs an integer threshold"))]
    ThresholdType {
        /// Field being built.
        name: String,
        /// The operator.
        op: WindowOp,
    },

    /// The lookup table path is empty.
    #[snafu(display("LINTERP field {name:?} has no table path"))]
    MissingTable {
        /// Field being built.
        name: String,
    },
}

/// Kind-specific payload of an [`Entry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryParams {
    /// Raw sample stream.
    Raw {
        /// Element type of the stored samples.
        data_type: ElementType,
        /// Samples per frame.
        spf: u32,
    },
    /// `y = sum(scale_i * x_i + offset_i)`.
    Lincom {
        /// One term per input.
        terms: Vec<LincomTerm>,
    },
    /// Table lookup with linear interpolation.
    Linterp {
        /// Input field.
        input: String,
        /// Two-column table file, relative to the dirfile directory.
        table: PathBuf,
    },
    /// Unsigned bit-field extraction.
    Bit {
        /// Input field.
        input: String,
        /// First extracted bit.
        bitnum: u32,
        /// Number of extracted bits.
        numbits: u32,
    },
    /// Sign-extended bit-field extraction.
    Sbit {
        /// Input field.
        input: String,
        /// First extracted bit.
        bitnum: u32,
        /// Number of extracted bits.
        numbits: u32,
    },
    /// Element-wise product.
    Multiply {
        /// The two factors.
        inputs: [String; 2],
    },
    /// Element-wise quotient.
    Divide {
        /// Dividend and divisor.
        inputs: [String; 2],
    },
    /// `y[n] = x[n + shift]`.
    Phase {
        /// Input field.
        input: String,
        /// Sample shift; may be negative.
        shift: i64,
    },
    /// `y = sum(a_j * x^j)`.
    Polynom {
        /// Input field.
        input: String,
        /// Coefficients `a_0..=a_order`.
        coefficients: Vec<Scalar>,
    },
    /// `y = dividend / x`.
    Recip {
        /// Input field.
        input: String,
        /// Numerator.
        dividend: Scalar,
    },
    /// Pass `input` through where `check` satisfies the comparison.
    Window {
        /// Data input.
        input: String,
        /// Check input.
        check: String,
        /// Comparison operator.
        op: WindowOp,
        /// Comparison threshold.
        threshold: Threshold,
    },
    /// Demultiplex `input` where `count` equals `count_val`.
    Mplex {
        /// Data input.
        input: String,
        /// Count-selector input.
        count: String,
        /// Selector value to match.
        count_val: i64,
        /// Selector cycle length; zero when unknown.
        period: u32,
    },
    /// `y[n] = array[index[n]]` over a CARRAY.
    Indir {
        /// Index input.
        index: String,
        /// Backing CARRAY field.
        array: String,
    },
    /// `y[n] = array[index[n]]` over a SARRAY.
    Sindir {
        /// Index input.
        index: String,
        /// Backing SARRAY field.
        array: String,
    },
    /// Numeric scalar constant.
    Const {
        /// The value; its element type is the constant's type.
        value: Value,
    },
    /// Numeric array constant.
    Carray {
        /// The elements; their element type is the array's type.
        values: Samples,
    },
    /// Text scalar constant.
    String {
        /// The text.
        value: String,
    },
    /// Text array constant.
    Sarray {
        /// The elements.
        values: Vec<String>,
    },
    /// Another name for `target`.
    Alias {
        /// Aliased field; may dangle.
        target: String,
    },
    /// Implicit frame counter.
    Index,
}

impl EntryParams {
    /// The kind of this payload.
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryParams::Raw { .. } => EntryKind::Raw,
            EntryParams::Lincom { .. } => EntryKind::Lincom,
            EntryParams::Linterp { .. } => EntryKind::Linterp,
            EntryParams::Bit { .. } => EntryKind::Bit,
            EntryParams::Sbit { .. } => EntryKind::Sbit,
            EntryParams::Multiply { .. } => EntryKind::Multiply,
            EntryParams::Divide { .. } => EntryKind::Divide,
            EntryParams::Phase { .. } => EntryKind::Phase,
            EntryParams::Polynom { .. } => EntryKind::Polynom,
            EntryParams::Recip { .. } => EntryKind::Recip,
            EntryParams::Window { .. } => EntryKind::Window,
            EntryParams::Mplex { .. } => EntryKind::Mplex,
            EntryParams::Indir { .. } => EntryKind::Indir,
            EntryParams::Sindir { .. } => EntryKind::Sindir,
            EntryParams::Const { .. } => EntryKind::Const,
            EntryParams::Carray { .. } => EntryKind::Carray,
            EntryParams::String { .. } => EntryKind::String,
            EntryParams::Sarray { .. } => EntryKind::Sarray,
            EntryParams::Alias { .. } => EntryKind::Alias,
            EntryParams::Index => EntryKind::Index,
        }
    }
}

/// Bit flags reported for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// The entry is hidden from field listings.
    pub const HIDDEN: u32 = 0x01;
    /// At least one literal scalar parameter is complex.
    pub const COMPLEX_SCALARS: u32 = 0x02;
    /// At least one scalar parameter is a field reference.
    pub const CALCULATED: u32 = 0x04;

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Build from a raw bit representation.
    pub const fn from_bits(bits: u32) -> Self {
        EntryFlags(bits)
    }

    /// True when every bit of `flag` is set.
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Full field name, including any namespace and fragment affixes.
    pub name: String,
    /// Index of the fragment that defines this field.
    #[serde(skip)]
    pub fragment: usize,
    /// Hidden entries are left out of field listings unless asked for.
    #[serde(default)]
    pub hidden: bool,
    /// Kind-specific parameters.
    #[serde(flatten)]
    pub params: EntryParams,
}

impl Entry {
    fn build(name: impl Into<String>, params: EntryParams) -> Result<Self, EntryError> {
        let entry = Entry {
            name: name.into(),
            fragment: 0,
            hidden: false,
            params,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// A raw field storing `spf` samples of `data_type` per frame.
    pub fn raw(name: impl Into<String>, data_type: ElementType, spf: u32) -> Result<Self, EntryError> {
        Self::build(name, EntryParams::Raw { data_type, spf })
    }

    /// A linear combination. `inputs`, `scales` and `offsets` must have the
    /// same length, between 1 and [`MAX_LINCOM`].
    pub fn lincom(
        name: impl Into<String>,
        inputs: &[&str],
        scales: Vec<Scalar>,
        offsets: Vec<Scalar>,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        for list in [scales.len(), offsets.len()] {
            ensure!(
                list == inputs.len(),
                CoefficientCountSnafu {
                    name: name.clone(),
                    kind: EntryKind::Lincom,
                    expected: inputs.len(),
                    found: list,
                }
            );
        }
        let terms = inputs
            .iter()
            .zip(scales.into_iter().zip(offsets))
            .map(|(input, (scale, offset))| LincomTerm {
                input: (*input).to_string(),
                scale,
                offset,
            })
            .collect();
        Self::build(name, EntryParams::Lincom { terms })
    }

    /// A lookup-table field reading `table` relative to the dirfile directory.
    pub fn linterp(
        name: impl Into<String>,
        input: impl Into<String>,
        table: impl Into<PathBuf>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Linterp {
                input: input.into(),
                table: table.into(),
            },
        )
    }

    /// Unsigned extraction of `numbits` bits starting at `bitnum`.
    pub fn bit(
        name: impl Into<String>,
        input: impl Into<String>,
        bitnum: i64,
        numbits: i64,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        let (bitnum, numbits) = check_bits(&name, bitnum, numbits)?;
        Self::build(
            name,
            EntryParams::Bit {
                input: input.into(),
                bitnum,
                numbits,
            },
        )
    }

    /// Signed extraction of `numbits` bits starting at `bitnum`.
    pub fn sbit(
        name: impl Into<String>,
        input: impl Into<String>,
        bitnum: i64,
        numbits: i64,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        let (bitnum, numbits) = check_bits(&name, bitnum, numbits)?;
        Self::build(
            name,
            EntryParams::Sbit {
                input: input.into(),
                bitnum,
                numbits,
            },
        )
    }

    /// Element-wise product of two inputs.
    pub fn multiply(
        name: impl Into<String>,
        a: impl Into<String>,
        b: impl Into<String>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Multiply {
                inputs: [a.into(), b.into()],
            },
        )
    }

    /// Element-wise quotient `a / b`.
    pub fn divide(
        name: impl Into<String>,
        a: impl Into<String>,
        b: impl Into<String>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Divide {
                inputs: [a.into(), b.into()],
            },
        )
    }

    /// Shift `input` by `shift` samples.
    pub fn phase(name: impl Into<String>, input: impl Into<String>, shift: i64) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Phase {
                input: input.into(),
                shift,
            },
        )
    }

    /// Polynomial of the given order; `coefficients` must hold `order + 1` values.
    pub fn polynom(
        name: impl Into<String>,
        input: impl Into<String>,
        order: usize,
        coefficients: Vec<Scalar>,
    ) -> Result<Self, EntryError> {
        let name = name.into();
        ensure!(
            (1..=MAX_POLYORD).contains(&order),
            PolynomOrderSnafu {
                name: name.clone(),
                order,
                max: MAX_POLYORD,
            }
        );
        ensure!(
            coefficients.len() == order + 1,
            CoefficientCountSnafu {
                name: name.clone(),
                kind: EntryKind::Polynom,
                expected: order + 1,
                found: coefficients.len(),
            }
        );
        Self::build(
            name,
            EntryParams::Polynom {
                input: input.into(),
                coefficients,
            },
        )
    }

    /// `dividend / input`.
    pub fn recip(
        name: impl Into<String>,
        input: impl Into<String>,
        dividend: impl Into<Scalar>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Recip {
                input: input.into(),
                dividend: dividend.into(),
            },
        )
    }

    /// Pass `input` through where `check op threshold` holds.
    pub fn window(
        name: impl Into<String>,
        input: impl Into<String>,
        check: impl Into<String>,
        op: WindowOp,
        threshold: Threshold,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Window {
                input: input.into(),
                check: check.into(),
                op,
                threshold,
            },
        )
    }

    /// Demultiplex `input` on samples where `count == count_val`.
    pub fn mplex(
        name: impl Into<String>,
        input: impl Into<String>,
        count: impl Into<String>,
        count_val: i64,
        period: u32,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Mplex {
                input: input.into(),
                count: count.into(),
                count_val,
                period,
            },
        )
    }

    /// Look up CARRAY elements by the values of `index`.
    pub fn indir(
        name: impl Into<String>,
        index: impl Into<String>,
        array: impl Into<String>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Indir {
                index: index.into(),
                array: array.into(),
            },
        )
    }

    /// Look up SARRAY elements by the values of `index`.
    pub fn sindir(
        name: impl Into<String>,
        index: impl Into<String>,
        array: impl Into<String>,
    ) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Sindir {
                index: index.into(),
                array: array.into(),
            },
        )
    }

    /// A numeric constant.
    pub fn constant(name: impl Into<String>, value: Value) -> Result<Self, EntryError> {
        Self::build(name, EntryParams::Const { value })
    }

    /// A numeric array constant.
    pub fn carray(name: impl Into<String>, values: Samples) -> Result<Self, EntryError> {
        Self::build(name, EntryParams::Carray { values })
    }

    /// A text constant.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::String {
                value: value.into(),
            },
        )
    }

    /// A text array constant.
    pub fn sarray(name: impl Into<String>, values: Vec<String>) -> Result<Self, EntryError> {
        Self::build(name, EntryParams::Sarray { values })
    }

    /// An alias for `target`.
    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Result<Self, EntryError> {
        Self::build(
            name,
            EntryParams::Alias {
                target: target.into(),
            },
        )
    }

    /// The implicit frame counter.
    pub(crate) fn index_field() -> Self {
        Entry {
            name: INDEX_FIELD.to_string(),
            fragment: 0,
            hidden: false,
            params: EntryParams::Index,
        }
    }

    /// Place the entry in fragment `index`.
    pub fn in_fragment(mut self, index: usize) -> Self {
        self.fragment = index;
        self
    }

    /// Set the hidden flag.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// The kind of this entry.
    pub fn kind(&self) -> EntryKind {
        self.params.kind()
    }

    /// Flags derived from the entry's state.
    pub fn flags(&self) -> EntryFlags {
        let mut bits = 0;
        if self.hidden {
            bits |= EntryFlags::HIDDEN;
        }
        if self.scalars().any(Scalar::is_complex) {
            bits |= EntryFlags::COMPLEX_SCALARS;
        }
        if self.scalars().any(|s| s.reference().is_some()) {
            bits |= EntryFlags::CALCULATED;
        }
        EntryFlags(bits)
    }

    /// Parent field of a meta-field (`parent/child`).
    pub fn parent(&self) -> Option<&str> {
        self.name.split_once('/').map(|(parent, _)| parent)
    }

    /// Input fields read when evaluating this entry, in order.
    pub fn inputs(&self) -> Vec<&str> {
        match &self.params {
            EntryParams::Lincom { terms } => terms.iter().map(|t| t.input.as_str()).collect(),
            EntryParams::Linterp { input, .. }
            | EntryParams::Bit { input, .. }
            | EntryParams::Sbit { input, .. }
            | EntryParams::Phase { input, .. }
            | EntryParams::Polynom { input, .. }
            | EntryParams::Recip { input, .. } => vec![input.as_str()],
            EntryParams::Multiply { inputs } | EntryParams::Divide { inputs } => {
                vec![inputs[0].as_str(), inputs[1].as_str()]
            }
            EntryParams::Window { input, check, .. } => vec![input.as_str(), check.as_str()],
            EntryParams::Mplex { input, count, .. } => vec![input.as_str(), count.as_str()],
            EntryParams::Indir { index, array } | EntryParams::Sindir { index, array } => {
                vec![index.as_str(), array.as_str()]
            }
            EntryParams::Alias { target } => vec![target.as_str()],
            EntryParams::Raw { .. }
            | EntryParams::Const { .. }
            | EntryParams::Carray { .. }
            | EntryParams::String { .. }
            | EntryParams::Sarray { .. }
            | EntryParams::Index => Vec::new(),
        }
    }

    /// Scalar parameters, in wire slot order.
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &Scalar> + '_> {
        match &self.params {
            EntryParams::Lincom { terms } => Box::new(
                terms
                    .iter()
                    .map(|t| &t.scale)
                    .chain(terms.iter().map(|t| &t.offset)),
            ),
            EntryParams::Polynom { coefficients, .. } => Box::new(coefficients.iter()),
            EntryParams::Recip { dividend, .. } => Box::new(std::iter::once(dividend)),
            _ => Box::new(std::iter::empty()),
        }
    }

    fn scalars_mut(&mut self) -> Vec<&mut Scalar> {
        match &mut self.params {
            EntryParams::Lincom { terms } => terms
                .iter_mut()
                .flat_map(|t| [&mut t.scale, &mut t.offset])
                .collect(),
            EntryParams::Polynom { coefficients, .. } => coefficients.iter_mut().collect(),
            EntryParams::Recip { dividend, .. } => vec![dividend],
            _ => Vec::new(),
        }
    }

    fn inputs_mut(&mut self) -> Vec<&mut String> {
        match &mut self.params {
            EntryParams::Lincom { terms } => terms.iter_mut().map(|t| &mut t.input).collect(),
            EntryParams::Linterp { input, .. }
            | EntryParams::Bit { input, .. }
            | EntryParams::Sbit { input, .. }
            | EntryParams::Phase { input, .. }
            | EntryParams::Polynom { input, .. }
            | EntryParams::Recip { input, .. } => vec![input],
            EntryParams::Multiply { inputs } | EntryParams::Divide { inputs } => {
                inputs.iter_mut().collect()
            }
            EntryParams::Window { input, check, .. } => vec![input, check],
            EntryParams::Mplex { input, count, .. } => vec![input, count],
            EntryParams::Indir { index, array } | EntryParams::Sindir { index, array } => {
                vec![index, array]
            }
            EntryParams::Alias { target } => vec![target],
            _ => Vec::new(),
        }
    }

    /// Every field name this entry refers to: inputs, then scalar references.
    pub fn references(&self) -> Vec<&str> {
        let mut refs = self.inputs();
        refs.extend(self.scalars().filter_map(Scalar::reference));
        refs
    }

    /// Replace every reference to `old` with `new`. Returns true if anything changed.
    pub fn rename_references(&mut self, old: &str, new: &str) -> bool {
        let mut changed = false;
        for input in self.inputs_mut() {
            if *input == old {
                *input = new.to_string();
                changed = true;
            }
        }
        for scalar in self.scalars_mut() {
            if let Some(name) = scalar.reference_mut() {
                if *name == old {
                    *name = new.to_string();
                    changed = true;
                }
            }
        }
        changed
    }

    /// Check every invariant of the entry's kind.
    pub fn validate(&self) -> Result<(), EntryError> {
        let is_index = matches!(self.params, EntryParams::Index);
        if is_index || self.name == INDEX_FIELD {
            ensure!(
                is_index && self.name == INDEX_FIELD,
                ReservedNameSnafu {
                    name: self.name.clone()
                }
            );
            return Ok(());
        }
        validate_name(&self.name)?;
        let name = self.name.as_str();
        let kind = self.kind();
        let need = |field: &str, role: &'static str| -> Result<(), EntryError> {
            ensure!(
                !field.trim().is_empty(),
                MissingInputSnafu { name, kind, role }
            );
            Ok(())
        };
        match &self.params {
            EntryParams::Raw { data_type, spf } => {
                ensure!(
                    !name.contains('/'),
                    InvalidNameSnafu {
                        name,
                        reason: "raw fields cannot be meta-fields"
                    }
                );
                ensure!(
                    data_type.is_numeric(),
                    BadTypeSnafu {
                        name,
                        kind,
                        ty: *data_type
                    }
                );
                ensure!(*spf > 0, ZeroSpfSnafu { name });
            }
            EntryParams::Lincom { terms } => {
                ensure!(
                    (1..=MAX_LINCOM).contains(&terms.len()),
                    InputCountSnafu {
                        name,
                        kind,
                        found: terms.len(),
                        max: MAX_LINCOM,
                    }
                );
                for term in terms {
                    need(&term.input, "data")?;
                }
            }
            EntryParams::Linterp { input, table } => {
                need(input, "data")?;
                ensure!(!table.as_os_str().is_empty(), MissingTableSnafu { name });
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
                need(input, "data")?;
                check_bits(name, i64::from(*bitnum), i64::from(*numbits))?;
            }
            EntryParams::Multiply { inputs } | EntryParams::Divide { inputs } => {
                need(&inputs[0], "first")?;
                need(&inputs[1], "second")?;
            }
            EntryParams::Phase { input, .. } | EntryParams::Recip { input, .. } => {
                need(input, "data")?;
            }
            EntryParams::Polynom {
                input,
                coefficients,
            } => {
                need(input, "data")?;
                ensure!(
                    (2..=MAX_POLYORD + 1).contains(&coefficients.len()),
                    PolynomOrderSnafu {
                        name,
                        order: coefficients.len().saturating_sub(1),
                        max: MAX_POLYORD,
                    }
                );
            }
            EntryParams::Window {
                input,
                check,
                op,
                threshold,
            } => {
                need(input, "data")?;
                need(check, "check")?;
                ensure!(
                    !(op.is_bitwise() && matches!(threshold, Threshold::Float(_))),
                    ThresholdTypeSnafu { name, op: *op }
                );
            }
            EntryParams::Mplex { input, count, .. } => {
                need(input, "data")?;
                need(count, "count")?;
            }
            EntryParams::Indir { index, array } | EntryParams::Sindir { index, array } => {
                need(index, "index")?;
                need(array, "array")?;
            }
            EntryParams::Const { value } => {
                let ty = value.element_type();
                ensure!(ty.is_numeric(), BadTypeSnafu { name, kind, ty });
            }
            EntryParams::Carray { values } => {
                let ty = values.element_type();
                ensure!(ty.is_numeric(), BadTypeSnafu { name, kind, ty });
                ensure!(!values.is_empty(), EmptyArraySnafu { name, kind });
            }
            EntryParams::Sarray { values } => {
                ensure!(!values.is_empty(), EmptyArraySnafu { name, kind });
            }
            EntryParams::Alias { target } => need(target, "target")?,
            EntryParams::String { .. } | EntryParams::Index => {}
        }
        Ok(())
    }
}

fn check_bits(name: &str, bitnum: i64, numbits: i64) -> Result<(u32, u32), EntryError> {
    ensure!(
        bitnum >= 0 && numbits > 0 && bitnum + numbits <= 64,
        BitRangeSnafu {
            name,
            bitnum,
            numbits
        }
    );
    Ok((bitnum as u32, numbits as u32))
}

/// Check that `name` is usable as a field name.
///
/// Names may carry a namespace (`ns.name`) and at most one meta-field
/// separator (`parent/child`).
pub fn validate_name(name: &str) -> Result<(), EntryError> {
    ensure!(!name.is_empty(), EmptyNameSnafu);
    let invalid = |reason: &'static str| InvalidNameSnafu { name, reason }.fail();
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | ';' | '#'))
    {
        return invalid("contains whitespace, a control character or a reserved symbol");
    }
    if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        return invalid("cannot start or end with '.' or '/'");
    }
    if name.matches('/').count() > 1 {
        return invalid("meta-fields cannot be nested");
    }
    if name.contains("..") {
        return invalid("empty namespace component");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complex;

    #[test]
    fn lincom_rejects_mismatched_lists() {
        let err = Entry::lincom("l", &["a", "b"], vec![1.0.into()], vec![0.0.into(), 0.0.into()])
            .unwrap_err();
        assert!(matches!(err, EntryError::CoefficientCount { expected: 2, found: 1, .. }));
        assert!(Entry::lincom("l", &[], vec![], vec![]).is_err());
        assert!(
            Entry::lincom(
                "l",
                &["a", "b", "c", "d"],
                vec![1.0.into(); 4],
                vec![0.0.into(); 4]
            )
            .is_err()
        );
    }

    #[test]
    fn polynom_needs_order_plus_one_coefficients() {
        assert!(Entry::polynom("p", "x", 2, vec![1.0.into(), 2.0.into()]).is_err());
        let p = Entry::polynom("p", "x", 1, vec![1.0.into(), 2.0.into()]).expect("polynom");
        assert_eq!(p.kind(), EntryKind::Polynom);
        assert!(Entry::polynom("p", "x", 6, vec![0.0.into(); 7]).is_err());
    }

    #[test]
    fn bit_ranges_must_be_positive() {
        assert!(Entry::bit("b", "x", 2, 0).is_err());
        assert!(Entry::bit("b", "x", 2, -1).is_err());
        assert!(Entry::sbit("b", "x", 60, 5).is_err());
        assert!(Entry::bit("b", "x", 2, 3).is_ok());
    }

    #[test]
    fn two_input_kinds_reject_missing_inputs() {
        assert!(Entry::mplex("m", "d", "", 1, 10).is_err());
        assert!(Entry::window("w", "", "c", WindowOp::Lt, Threshold::Float(1.0)).is_err());
        assert!(Entry::window("w", "d", "c", WindowOp::Set, Threshold::Float(1.0)).is_err());
        assert!(Entry::multiply("m", "a", " ").is_err());
    }

    #[test]
    fn raw_rejects_text_and_zero_spf() {
        assert!(Entry::raw("r", ElementType::Text, 1).is_err());
        assert!(Entry::raw("r", ElementType::Unknown, 1).is_err());
        assert!(matches!(
            Entry::raw("r", ElementType::Int8, 0),
            Err(EntryError::ZeroSpf { .. })
        ));
    }

    #[test]
    fn names_are_checked() {
        assert!(validate_name("data").is_ok());
        assert!(validate_name("ns.data").is_ok());
        assert!(validate_name("data/meta").is_ok());
        assert!(validate_name("a/b/c").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("/lead").is_err());
        assert!(Entry::raw(INDEX_FIELD, ElementType::Int8, 1).is_err());
        assert!(Entry::raw("data/raw", ElementType::Int8, 1).is_err());
    }

    #[test]
    fn flags_follow_scalars() {
        let e = Entry::recip("r", "x", Complex::new(6.5f64, 4.3)).expect("recip");
        assert!(e.flags().contains(EntryFlags::COMPLEX_SCALARS));
        let e = Entry::lincom("l", &["x"], vec![Scalar::field("c")], vec![0.0.into()])
            .expect("lincom")
            .with_hidden(true);
        assert!(e.flags().contains(EntryFlags::CALCULATED | EntryFlags::HIDDEN));
        assert!(!e.flags().contains(EntryFlags::COMPLEX_SCALARS));
    }

    #[test]
    fn references_can_be_rewritten() {
        let mut e = Entry::lincom(
            "l",
            &["a", "b"],
            vec![Scalar::field("a"), 1.0.into()],
            vec![0.0.into(), 0.0.into()],
        )
        .expect("lincom");
        assert_eq!(e.references(), vec!["a", "b", "a"]);
        assert!(e.rename_references("a", "z"));
        assert_eq!(e.references(), vec!["z", "b", "z"]);
        assert!(!e.rename_references("q", "r"));
    }
}
