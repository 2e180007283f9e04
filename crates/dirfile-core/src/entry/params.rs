//! Parameter value types shared by several field kinds.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::types::Complex;

/// A numeric parameter of a derived field.
///
/// Scales, offsets, polynomial coefficients and reciprocal dividends are
/// either literals or named references to a CONST field (or one element of
/// a CARRAY field) resolved when the field is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    /// Real literal.
    Real(f64),
    /// Complex literal.
    Complex(Complex<f64>),
    /// Reference to a constant field.
    Field {
        /// Name of the CONST or CARRAY field.
        name: String,
        /// Element index when `name` is a CARRAY.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
}

impl Scalar {
    /// A reference to a CONST field.
    pub fn field(name: impl Into<String>) -> Self {
        Scalar::Field {
            name: name.into(),
            index: None,
        }
    }

    /// A reference to one CARRAY element.
    pub fn element(name: impl Into<String>, index: usize) -> Self {
        Scalar::Field {
            name: name.into(),
            index: Some(index),
        }
    }

    /// The literal value, or `None` for a field reference.
    pub fn literal(&self) -> Option<Complex<f64>> {
        match self {
            Scalar::Real(r) => Some(Complex::real(*r)),
            Scalar::Complex(c) => Some(*c),
            Scalar::Field { .. } => None,
        }
    }

    /// True for a literal with a non-zero imaginary part.
    pub fn is_complex(&self) -> bool {
        matches!(self, Scalar::Complex(c) if !c.is_real())
    }

    /// Name of the referenced field, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Scalar::Field { name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn reference_mut(&mut self) -> Option<&mut String> {
        match self {
            Scalar::Field { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<Complex<f64>> for Scalar {
    fn from(v: Complex<f64>) -> Self {
        if v.is_real() {
            Scalar::Real(v.re)
        } else {
            Scalar::Complex(v)
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Real(r) => write!(f, "{r}"),
            Scalar::Complex(c) => write!(f, "{c}"),
            Scalar::Field { name, index: None } => f.write_str(name),
            Scalar::Field {
                name,
                index: Some(i),
            } => write!(f, "{name}<{i}>"),
        }
    }
}

/// One input of a linear combination: `scale * input + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LincomTerm {
    /// Input field name.
    pub input: String,
    /// Multiplicative factor.
    pub scale: Scalar,
    /// Additive offset.
    pub offset: Scalar,
}

/// Comparison applied by a WINDOW field to its check input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum WindowOp {
    /// `check == threshold`
    Eq = 1,
    /// `check != threshold`
    Ne = 2,
    /// `check & threshold != 0`
    Set = 3,
    /// `check & threshold != threshold`
    Clr = 4,
    /// `check >= threshold`
    Ge = 5,
    /// `check > threshold`
    Gt = 6,
    /// `check <= threshold`
    Le = 7,
    /// `check < threshold`
    Lt = 8,
}

impl WindowOp {
    const ALL: [WindowOp; 8] = [
        WindowOp::Eq,
        WindowOp::Ne,
        WindowOp::Set,
        WindowOp::Clr,
        WindowOp::Ge,
        WindowOp::Gt,
        WindowOp::Le,
        WindowOp::Lt,
    ];

    /// Wire code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Map a wire code back to an operator.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    /// Two-letter mnemonic.
    pub const fn name(self) -> &'static str {
        match self {
            WindowOp::Eq => "EQ",
            WindowOp::Ne => "NE",
            WindowOp::Set => "SET",
            WindowOp::Clr => "CLR",
            WindowOp::Ge => "GE",
            WindowOp::Gt => "GT",
            WindowOp::Le => "LE",
            WindowOp::Lt => "LT",
        }
    }

    /// Parse a mnemonic, case-insensitively.
    pub fn parse_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|op| op.name() == upper)
    }

    /// True for the bitwise operators, which need an integer threshold.
    pub const fn is_bitwise(self) -> bool {
        matches!(self, WindowOp::Set | WindowOp::Clr)
    }

    /// Evaluate the operator for one floating point check sample.
    pub fn test(self, check: f64, threshold: Threshold) -> bool {
        self.decide(check as i64 as u64, check.partial_cmp(&threshold.as_f64()), threshold)
    }

    /// Evaluate the operator for one signed integer check sample.
    pub fn test_int(self, check: i64, threshold: Threshold) -> bool {
        let order = match threshold {
            Threshold::Int(t) => Some(check.cmp(&t)),
            Threshold::Uint(_) if check < 0 => Some(Ordering::Less),
            Threshold::Uint(t) => Some((check as u64).cmp(&t)),
            Threshold::Float(t) => (check as f64).partial_cmp(&t),
        };
        self.decide(check as u64, order, threshold)
    }

    /// Evaluate the operator for one unsigned integer check sample.
    pub fn test_uint(self, check: u64, threshold: Threshold) -> bool {
        let order = match threshold {
            Threshold::Int(t) if t < 0 => Some(Ordering::Greater),
            Threshold::Int(t) => Some(check.cmp(&(t as u64))),
            Threshold::Uint(t) => Some(check.cmp(&t)),
            Threshold::Float(t) => (check as f64).partial_cmp(&t),
        };
        self.decide(check, order, threshold)
    }

    // `order` is check against threshold; None when either side is NaN.
    fn decide(self, bits: u64, order: Option<Ordering>, threshold: Threshold) -> bool {
        match self {
            WindowOp::Set => bits & threshold.as_bits() != 0,
            WindowOp::Clr => {
                let mask = threshold.as_bits();
                bits & mask != mask
            }
            WindowOp::Eq => order == Some(Ordering::Equal),
            WindowOp::Ne => order != Some(Ordering::Equal),
            WindowOp::Ge => matches!(order, Some(Ordering::Greater | Ordering::Equal)),
            WindowOp::Gt => order == Some(Ordering::Greater),
            WindowOp::Le => matches!(order, Some(Ordering::Less | Ordering::Equal)),
            WindowOp::Lt => order == Some(Ordering::Less),
        }
    }
}

impl fmt::Display for WindowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Threshold of a WINDOW comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    /// Signed integer threshold.
    Int(i64),
    /// Unsigned integer threshold.
    Uint(u64),
    /// Floating point threshold.
    Float(f64),
}

impl Threshold {
    /// Threshold as a float.
    pub fn as_f64(self) -> f64 {
        match self {
            Threshold::Int(v) => v as f64,
            Threshold::Uint(v) => v as f64,
            Threshold::Float(v) => v,
        }
    }

    fn as_bits(self) -> u64 {
        match self {
            Threshold::Int(v) => v as u64,
            Threshold::Uint(v) => v,
            Threshold::Float(v) => v as i64 as u64,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Int(v) => write!(f, "{v}"),
            Threshold::Uint(v) => write!(f, "{v}"),
            Threshold::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_ops_compare_against_threshold() {
        assert!(WindowOp::Lt.test(4.0, Threshold::Float(4.1)));
        assert!(!WindowOp::Lt.test(4.1, Threshold::Float(4.1)));
        assert!(WindowOp::Ge.test(4.1, Threshold::Float(4.1)));
        assert!(WindowOp::Eq.test(7.0, Threshold::Int(7)));
        assert!(WindowOp::Ne.test(7.0, Threshold::Uint(8)));
        assert!(WindowOp::Set.test(0b0110 as f64, Threshold::Uint(0b0100)));
        assert!(!WindowOp::Set.test(0b0010 as f64, Threshold::Uint(0b0100)));
        assert!(WindowOp::Clr.test(0b0010 as f64, Threshold::Uint(0b0110)));
        assert!(!WindowOp::Clr.test(0b0110 as f64, Threshold::Uint(0b0110)));
        assert!(WindowOp::Ne.test(f64::NAN, Threshold::Float(1.0)));
        assert!(!WindowOp::Le.test(f64::NAN, Threshold::Float(1.0)));
    }

    #[test]
    fn integer_checks_compare_without_rounding() {
        let big = (1u64 << 60) | 1;
        assert!(WindowOp::Set.test_uint(big, Threshold::Uint(1)));
        assert!(WindowOp::Set.test_uint(u64::MAX, Threshold::Uint(1)));
        assert!(WindowOp::Clr.test_uint(big, Threshold::Uint(0b11)));
        assert!(!WindowOp::Clr.test_uint(u64::MAX, Threshold::Uint(0b11)));
        assert!(WindowOp::Ne.test_uint(big, Threshold::Uint(1 << 60)));
        assert!(WindowOp::Gt.test_uint(u64::MAX, Threshold::Uint(u64::MAX - 1)));
        assert!(WindowOp::Gt.test_uint(0, Threshold::Int(-1)));

        let near = i64::MAX - 1;
        assert!(WindowOp::Lt.test_int(near, Threshold::Int(i64::MAX)));
        assert!(WindowOp::Le.test_int(near, Threshold::Int(near)));
        assert!(!WindowOp::Ge.test_int(-1, Threshold::Uint(0)));
        assert!(WindowOp::Set.test_int(-1, Threshold::Uint(1 << 63)));
        assert!(WindowOp::Eq.test_int(3, Threshold::Float(3.0)));
    }

    #[test]
    fn complex_scalars_collapse_when_real() {
        assert_eq!(Scalar::from(Complex::new(2.0, 0.0)), Scalar::Real(2.0));
        assert!(Scalar::from(Complex::new(2.0, 1.0)).is_complex());
        assert!(!Scalar::field("c").is_complex());
    }

    #[test]
    fn op_names_parse_back() {
        for op in WindowOp::ALL {
            assert_eq!(WindowOp::parse_name(op.name()), Some(op));
            assert_eq!(WindowOp::from_code(op.code()), Some(op));
        }
    }
}
