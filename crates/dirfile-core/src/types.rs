//! Element type registry.
//!
//! Every value that flows through a get/put or constant operation carries
//! exactly one [`ElementType`]. This module owns that closed set of tags and
//! the bidirectional mapping between a tag and a concrete value
//! representation:
//!
//! - [`Sample`]: a sealed trait implemented once per numeric Rust type, so
//!   call sites whose type is statically known resolve the tag at compile time.
//! - [`Value`] and [`Samples`]: the runtime-tagged scalar and vector forms used
//!   at the dynamic boundary (bulk reads, constants, wire payloads).
//! - [`classify_any`]: runtime classification of an opaque host value, which
//!   reports [`ElementType::Unknown`] for unsupported shapes.
//!
//! Complex values are always an ordered `(re, im)` pair. Narrowing a complex
//! value to a real type keeps the real part and drops the imaginary part;
//! that loss is part of the documented conversion rules on [`Sample`].

pub mod byte_order;
pub mod complex;
pub mod element;
pub mod sample;
pub mod value;

pub use byte_order::ByteOrder;
pub use complex::{Complex, Complex64, Complex128};
pub use element::{Classify, ElementType, classify_any};
pub use sample::Sample;
pub use value::{Samples, Value};

use snafu::prelude::*;

/// Errors raised while mapping between element types and concrete values.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum TypeError {
    /// The sentinel `null` or `unknown` type was used where a concrete type is required.
    #[snafu(display("element type {ty} cannot carry values"))]
    UnsupportedType {
        /// The offending sentinel type.
        ty: ElementType,
    },

    /// The byte buffer does not hold a whole number of elements.
    #[snafu(display("{found} bytes is not a whole number of {ty} elements"))]
    BadLength {
        /// The element type being decoded.
        ty: ElementType,
        /// Number of bytes supplied.
        found: usize,
    },

    /// A text value was used where a number is required, or vice versa.
    #[snafu(display("cannot convert {from} to {to}"))]
    Incompatible {
        /// Source element type.
        from: ElementType,
        /// Requested element type.
        to: ElementType,
    },

    /// Text bytes were not valid UTF-8.
    #[snafu(display("text value is not valid UTF-8"))]
    InvalidText,
}
