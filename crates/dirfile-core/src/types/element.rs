//! The element type tag and runtime classification of host values.

use std::{any::Any, fmt};

use serde::{Deserialize, Serialize};

use super::complex::Complex;

const SIZE_MASK: u32 = 0x03f;
const SIGNED: u32 = 0x040;
const IEEE754: u32 = 0x080;
const COMPLEX: u32 = 0x100;
const STRING: u32 = 0x200;
const UNKNOWN: u32 = 0x400;

/// Closed set of element kinds a sample, constant, or array element can have.
///
/// The numeric tag returned by [`ElementType::tag`] packs the element size in
/// bytes into the low six bits and the signed/float/complex/text properties
/// into the bits above it. It is the representation used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 64-bit integer.
    Uint64,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit IEEE-754 float.
    Float32,
    /// 64-bit IEEE-754 float.
    Float64,
    /// Complex pair of 32-bit floats.
    Complex64,
    /// Complex pair of 64-bit floats.
    Complex128,
    /// UTF-8 text.
    Text,
    /// Sentinel: no value.
    Null,
    /// Sentinel: the type could not be determined.
    Unknown,
}

impl ElementType {
    /// Every type that can carry a value, in tag order.
    pub const CONCRETE: [ElementType; 13] = [
        ElementType::Uint8,
        ElementType::Int8,
        ElementType::Uint16,
        ElementType::Int16,
        ElementType::Uint32,
        ElementType::Int32,
        ElementType::Uint64,
        ElementType::Int64,
        ElementType::Float32,
        ElementType::Float64,
        ElementType::Complex64,
        ElementType::Complex128,
        ElementType::Text,
    ];

    /// Wire tag for this type.
    pub const fn tag(self) -> u32 {
        match self {
            ElementType::Uint8 => 1,
            ElementType::Int8 => SIGNED | 1,
            ElementType::Uint16 => 2,
            ElementType::Int16 => SIGNED | 2,
            ElementType::Uint32 => 4,
            ElementType::Int32 => SIGNED | 4,
            ElementType::Uint64 => 8,
            ElementType::Int64 => SIGNED | 8,
            ElementType::Float32 => IEEE754 | 4,
            ElementType::Float64 => IEEE754 | 8,
            ElementType::Complex64 => COMPLEX | 8,
            ElementType::Complex128 => COMPLEX | 16,
            ElementType::Text => STRING,
            ElementType::Null => 0,
            ElementType::Unknown => UNKNOWN,
        }
    }

    /// Map a wire tag back to a type. Unrecognized tags map to `Unknown`.
    pub fn from_tag(tag: u32) -> Self {
        Self::CONCRETE
            .iter()
            .copied()
            .chain([ElementType::Null])
            .find(|ty| ty.tag() == tag)
            .unwrap_or(ElementType::Unknown)
    }

    /// Size of one element in bytes; zero for text and the sentinels.
    pub const fn size(self) -> usize {
        match self {
            ElementType::Text | ElementType::Null | ElementType::Unknown => 0,
            other => (other.tag() & SIZE_MASK) as usize,
        }
    }

    /// True for the fixed-width numeric types.
    pub const fn is_numeric(self) -> bool {
        self.size() > 0
    }

    /// True for the integer types.
    pub const fn is_integer(self) -> bool {
        self.is_numeric() && self.tag() & (IEEE754 | COMPLEX) == 0
    }

    /// True for the signed integer types.
    pub const fn is_signed(self) -> bool {
        self.tag() & SIGNED != 0
    }

    /// True for the real floating point types.
    pub const fn is_float(self) -> bool {
        self.tag() & IEEE754 != 0
    }

    /// True for the complex types.
    pub const fn is_complex(self) -> bool {
        self.tag() & COMPLEX != 0
    }

    /// True for `Null` and `Unknown`, which must never carry a value.
    pub const fn is_sentinel(self) -> bool {
        matches!(self, ElementType::Null | ElementType::Unknown)
    }

    /// Lower-case name, as used in persisted metadata and diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Uint8 => "uint8",
            ElementType::Int8 => "int8",
            ElementType::Uint16 => "uint16",
            ElementType::Int16 => "int16",
            ElementType::Uint32 => "uint32",
            ElementType::Int32 => "int32",
            ElementType::Uint64 => "uint64",
            ElementType::Int64 => "int64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Complex64 => "complex64",
            ElementType::Complex128 => "complex128",
            ElementType::Text => "text",
            ElementType::Null => "null",
            ElementType::Unknown => "unknown",
        }
    }

    /// Parse a type name as produced by [`ElementType::name`], case-insensitively.
    pub fn parse_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::CONCRETE
            .iter()
            .copied()
            .chain([ElementType::Null, ElementType::Unknown])
            .find(|ty| ty.name() == lower)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compile-time classification of a host value shape.
///
/// Implemented for every numeric scalar, slices and vectors of them, and the
/// text shapes (`str`, `String`, `[String]`, `Vec<String>`). A reference
/// classifies like the value it points to.
pub trait Classify {
    /// The element type carried by this value.
    fn element_type(&self) -> ElementType;
}

impl<C: Classify + ?Sized> Classify for &C {
    fn element_type(&self) -> ElementType {
        (**self).element_type()
    }
}

macro_rules! classify_numeric {
    ($($t:ty => $ty:expr),* $(,)?) => {
        $(
            impl Classify for $t {
                fn element_type(&self) -> ElementType {
                    $ty
                }
            }
            impl Classify for [$t] {
                fn element_type(&self) -> ElementType {
                    $ty
                }
            }
            impl Classify for Vec<$t> {
                fn element_type(&self) -> ElementType {
                    $ty
                }
            }
        )*

        /// Runtime classification at the dynamic boundary.
        ///
        /// Recognizes owned scalars, `Vec`s and boxed slices of scalars,
        /// `String`, `&'static str` and `Vec<String>`. Anything else is
        /// [`ElementType::Unknown`], which callers must treat as an error.
        pub fn classify_any(value: &dyn Any) -> ElementType {
            $(
                if value.is::<$t>() || value.is::<Vec<$t>>() || value.is::<Box<[$t]>>() {
                    return $ty;
                }
            )*
            if value.is::<String>() || value.is::<&'static str>() || value.is::<Vec<String>>() {
                return ElementType::Text;
            }
            ElementType::Unknown
        }
    };
}

classify_numeric! {
    u8 => ElementType::Uint8,
    i8 => ElementType::Int8,
    u16 => ElementType::Uint16,
    i16 => ElementType::Int16,
    u32 => ElementType::Uint32,
    i32 => ElementType::Int32,
    u64 => ElementType::Uint64,
    i64 => ElementType::Int64,
    f32 => ElementType::Float32,
    f64 => ElementType::Float64,
    Complex<f32> => ElementType::Complex64,
    Complex<f64> => ElementType::Complex128,
}

impl Classify for str {
    fn element_type(&self) -> ElementType {
        ElementType::Text
    }
}

impl Classify for String {
    fn element_type(&self) -> ElementType {
        ElementType::Text
    }
}

impl Classify for [String] {
    fn element_type(&self) -> ElementType {
        ElementType::Text
    }
}

impl Classify for Vec<String> {
    fn element_type(&self) -> ElementType {
        ElementType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for ty in ElementType::CONCRETE {
            assert_eq!(ElementType::from_tag(ty.tag()), ty);
        }
        assert_eq!(ElementType::from_tag(0), ElementType::Null);
        assert_eq!(ElementType::from_tag(0x7777), ElementType::Unknown);
    }

    #[test]
    fn sizes_and_properties() {
        assert_eq!(ElementType::Int8.size(), 1);
        assert_eq!(ElementType::Uint64.size(), 8);
        assert_eq!(ElementType::Complex64.size(), 8);
        assert_eq!(ElementType::Complex128.size(), 16);
        assert_eq!(ElementType::Text.size(), 0);
        assert!(ElementType::Int32.is_signed());
        assert!(!ElementType::Uint32.is_signed());
        assert!(ElementType::Float32.is_float());
        assert!(ElementType::Complex128.is_complex());
        assert!(ElementType::Uint16.is_integer());
        assert!(!ElementType::Float64.is_integer());
        assert!(ElementType::Unknown.is_sentinel());
    }

    #[test]
    fn static_classification() {
        assert_eq!(3u8.element_type(), ElementType::Uint8);
        assert_eq!((&-3i64).element_type(), ElementType::Int64);
        assert_eq!(vec![1.5f32].element_type(), ElementType::Float32);
        assert_eq!([Complex::new(1.0f64, 2.0)][..].element_type(), ElementType::Complex128);
        assert_eq!("abc".element_type(), ElementType::Text);
        assert_eq!(vec!["a".to_string()].element_type(), ElementType::Text);
    }

    #[test]
    fn dynamic_classification() {
        assert_eq!(classify_any(&7u16), ElementType::Uint16);
        assert_eq!(classify_any(&vec![1i32, 2]), ElementType::Int32);
        assert_eq!(classify_any(&String::from("x")), ElementType::Text);
        assert_eq!(classify_any(&vec![String::new()]), ElementType::Text);
        assert_eq!(classify_any(&Complex::new(1.0f32, 0.0)), ElementType::Complex64);
        assert_eq!(classify_any(&'c'), ElementType::Unknown);
        assert_eq!(classify_any(&vec![true]), ElementType::Unknown);
    }

    #[test]
    fn names_parse_back() {
        for ty in ElementType::CONCRETE {
            assert_eq!(ElementType::parse_name(ty.name()), Some(ty));
        }
        assert_eq!(ElementType::parse_name("FLOAT64"), Some(ElementType::Float64));
        assert_eq!(ElementType::parse_name("quad"), None);
    }
}
