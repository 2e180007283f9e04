//! Runtime-tagged scalars and sample vectors.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use super::{
    BadLengthSnafu, ElementType, IncompatibleSnafu, TypeError, UnsupportedTypeSnafu,
    byte_order::ByteOrder,
    complex::Complex,
    sample::{Sample, decode_slice, encode_slice},
};

/// A single value carrying its element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Unsigned 8-bit integer.
    Uint8(u8),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Unsigned 16-bit integer.
    Uint16(u16),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 32-bit integer.
    Uint32(u32),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 64-bit integer.
    Uint64(u64),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Complex pair of 32-bit floats.
    Complex64(Complex<f32>),
    /// Complex pair of 64-bit floats.
    Complex128(Complex<f64>),
    /// UTF-8 text.
    Text(String),
}

macro_rules! dispatch_numeric {
    ($value:expr, $v:ident => $body:expr, text $t:ident => $text:expr) => {
        match $value {
            Value::Uint8($v) => $body,
            Value::Int8($v) => $body,
            Value::Uint16($v) => $body,
            Value::Int16($v) => $body,
            Value::Uint32($v) => $body,
            Value::Int32($v) => $body,
            Value::Uint64($v) => $body,
            Value::Int64($v) => $body,
            Value::Float32($v) => $body,
            Value::Float64($v) => $body,
            Value::Complex64($v) => $body,
            Value::Complex128($v) => $body,
            Value::Text($t) => $text,
        }
    };
}

impl Value {
    /// The element type of this value.
    pub fn element_type(&self) -> ElementType {
        dispatch_numeric!(self, v => type_of(v), text _t => ElementType::Text)
    }

    /// Build a value of type `ty` from its encoded bytes.
    ///
    /// Numeric types require exactly `ty.size()` bytes; text takes the bytes
    /// as UTF-8. The sentinel types always fail.
    pub fn from_bytes(ty: ElementType, bytes: &[u8], order: ByteOrder) -> Result<Self, TypeError> {
        if ty.is_sentinel() {
            return UnsupportedTypeSnafu { ty }.fail();
        }
        if ty == ElementType::Text {
            let s = std::str::from_utf8(bytes).map_err(|_| TypeError::InvalidText)?;
            return Ok(Value::Text(s.to_string()));
        }
        ensure!(
            bytes.len() == ty.size(),
            BadLengthSnafu {
                ty,
                found: bytes.len()
            }
        );
        let samples = Samples::from_bytes(ty, bytes, order)?;
        samples.get(0).context(BadLengthSnafu { ty, found: 0usize })
    }

    /// Encode this value; text is emitted as its UTF-8 bytes.
    pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
        let mut out = Vec::new();
        dispatch_numeric!(self, v => v.write_bytes(order, &mut out), text s => {
            out.extend_from_slice(s.as_bytes())
        });
        out
    }

    /// Convert to a numeric Rust type.
    pub fn get<T: Sample>(&self) -> Result<T, TypeError> {
        dispatch_numeric!(self, v => Ok(convert_one(*v)),
            text _t => IncompatibleSnafu { from: ElementType::Text, to: T::TYPE }.fail())
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to another element type.
    pub fn convert(&self, ty: ElementType) -> Result<Value, TypeError> {
        Samples::from_value(self.clone()).convert(ty)?.get(0).context(BadLengthSnafu {
            ty,
            found: 0usize,
        })
    }
}

fn type_of<T: Sample>(_: &T) -> ElementType {
    T::TYPE
}

/// A homogeneous vector of samples carrying its element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Samples {
    /// Unsigned 8-bit integers.
    Uint8(Vec<u8>),
    /// Signed 8-bit integers.
    Int8(Vec<i8>),
    /// Unsigned 16-bit integers.
    Uint16(Vec<u16>),
    /// Signed 16-bit integers.
    Int16(Vec<i16>),
    /// Unsigned 32-bit integers.
    Uint32(Vec<u32>),
    /// Signed 32-bit integers.
    Int32(Vec<i32>),
    /// Unsigned 64-bit integers.
    Uint64(Vec<u64>),
    /// Signed 64-bit integers.
    Int64(Vec<i64>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// Complex pairs of 32-bit floats.
    Complex64(Vec<Complex<f32>>),
    /// Complex pairs of 64-bit floats.
    Complex128(Vec<Complex<f64>>),
    /// UTF-8 strings.
    Text(Vec<String>),
}

macro_rules! dispatch_samples {
    ($samples:expr, $v:ident => $body:expr, text $t:ident => $text:expr) => {
        match $samples {
            Samples::Uint8($v) => $body,
            Samples::Int8($v) => $body,
            Samples::Uint16($v) => $body,
            Samples::Int16($v) => $body,
            Samples::Uint32($v) => $body,
            Samples::Int32($v) => $body,
            Samples::Uint64($v) => $body,
            Samples::Int64($v) => $body,
            Samples::Float32($v) => $body,
            Samples::Float64($v) => $body,
            Samples::Complex64($v) => $body,
            Samples::Complex128($v) => $body,
            Samples::Text($t) => $text,
        }
    };
}

macro_rules! typed_samples {
    ($ty:expr, $T:ident => $body:expr, text => $text:expr, sentinel => $sentinel:expr) => {
        match $ty {
            ElementType::Uint8 => { type $T = u8; $body }
            ElementType::Int8 => { type $T = i8; $body }
            ElementType::Uint16 => { type $T = u16; $body }
            ElementType::Int16 => { type $T = i16; $body }
            ElementType::Uint32 => { type $T = u32; $body }
            ElementType::Int32 => { type $T = i32; $body }
            ElementType::Uint64 => { type $T = u64; $body }
            ElementType::Int64 => { type $T = i64; $body }
            ElementType::Float32 => { type $T = f32; $body }
            ElementType::Float64 => { type $T = f64; $body }
            ElementType::Complex64 => { type $T = Complex<f32>; $body }
            ElementType::Complex128 => { type $T = Complex<f64>; $body }
            ElementType::Text => $text,
            ElementType::Null | ElementType::Unknown => $sentinel,
        }
    };
}

pub(crate) use typed_samples;

impl Samples {
    /// An empty vector of the given type.
    pub fn empty(ty: ElementType) -> Result<Self, TypeError> {
        typed_samples!(ty, T => Ok(T::into_samples(Vec::new())),
            text => Ok(Samples::Text(Vec::new())),
            sentinel => UnsupportedTypeSnafu { ty }.fail())
    }

    /// Wrap a single value.
    pub fn from_value(value: Value) -> Self {
        dispatch_numeric!(value, v => Sample::into_samples(vec![v]), text s => Samples::Text(vec![s]))
    }

    /// Decode a packed buffer of `ty` elements.
    pub fn from_bytes(ty: ElementType, bytes: &[u8], order: ByteOrder) -> Result<Self, TypeError> {
        typed_samples!(ty, T => {
            ensure!(bytes.len() % ty.size() == 0, BadLengthSnafu { ty, found: bytes.len() });
            Ok(T::into_samples(decode_slice::<T>(bytes, order)))
        },
        text => IncompatibleSnafu { from: ElementType::Text, to: ElementType::Uint8 }.fail(),
        sentinel => UnsupportedTypeSnafu { ty }.fail())
    }

    /// Encode numeric samples into a packed buffer. Text has no packed form.
    pub fn to_bytes(&self, order: ByteOrder) -> Result<Vec<u8>, TypeError> {
        dispatch_samples!(self, v => Ok(encode_slice(v, order)),
            text _t => IncompatibleSnafu { from: ElementType::Text, to: ElementType::Uint8 }.fail())
    }

    /// The element type of the contained samples.
    pub fn element_type(&self) -> ElementType {
        dispatch_samples!(self, v => element_type_of_slice(v), text _t => ElementType::Text)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        dispatch_samples!(self, v => v.len(), text t => t.len())
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th sample as a [`Value`].
    pub fn get(&self, i: usize) -> Option<Value> {
        dispatch_samples!(self, v => v.get(i).map(|x| x.into_value()),
            text t => t.get(i).cloned().map(Value::Text))
    }

    /// Convert every sample to `T`.
    pub fn to_vec<T: Sample>(&self) -> Result<Vec<T>, TypeError> {
        dispatch_samples!(self, v => Ok(convert_slice::<_, T>(v)),
            text _t => IncompatibleSnafu { from: ElementType::Text, to: T::TYPE }.fail())
    }

    /// Convert to samples of another element type.
    pub fn convert(&self, ty: ElementType) -> Result<Samples, TypeError> {
        if ty == self.element_type() {
            return Ok(self.clone());
        }
        typed_samples!(ty, T => Ok(T::into_samples(self.to_vec::<T>()?)),
            text => IncompatibleSnafu { from: self.element_type(), to: ty }.fail(),
            sentinel => UnsupportedTypeSnafu { ty }.fail())
    }

    /// Text content, if these are text samples.
    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Samples::Text(t) => Some(t),
            _ => None,
        }
    }
}

fn element_type_of_slice<T: Sample>(_: &[T]) -> ElementType {
    T::TYPE
}

/// Single-value form of [`convert_slice`].
pub(crate) fn convert_one<S: Sample, T: Sample>(x: S) -> T {
    if S::TYPE.is_integer() && T::TYPE.is_integer() {
        if S::TYPE.is_signed() {
            T::from_i64(x.to_i64())
        } else {
            T::from_u64(x.to_u64())
        }
    } else if S::TYPE.is_complex() || T::TYPE.is_complex() {
        T::from_complex(x.to_complex())
    } else {
        T::from_f64(x.to_f64())
    }
}

/// Element-wise conversion keeping 64-bit integers exact when both sides are integers.
pub(crate) fn convert_slice<S: Sample, T: Sample>(src: &[S]) -> Vec<T> {
    src.iter().map(|&x| convert_one(x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::classify_any;

    fn patterns(ty: ElementType) -> Vec<Vec<u8>> {
        let size = ty.size();
        if size <= 2 {
            // Exhaustive for 8- and 16-bit types.
            (0..(1u32 << (8 * size)))
                .map(|p| p.to_le_bytes()[..size].to_vec())
                .collect()
        } else {
            let mut out = vec![vec![0u8; size], vec![0xffu8; size]];
            for seed in [0x01u8, 0x7f, 0x80, 0x5a, 0xa5, 0x3c] {
                out.push((0..size).map(|i| seed.wrapping_mul(i as u8 + 1)).collect());
            }
            out
        }
    }

    #[test]
    fn represent_then_classify_reports_the_same_tag() {
        for ty in ElementType::CONCRETE.iter().copied().filter(|t| t.is_numeric()) {
            for bytes in patterns(ty) {
                for order in [ByteOrder::Little, ByteOrder::Big] {
                    let value = Value::from_bytes(ty, &bytes, order).expect("decode");
                    assert_eq!(value.element_type(), ty);
                    assert_eq!(value.to_bytes(order), bytes, "{ty} bit pattern preserved");
                }
            }
        }
        let text = Value::from_bytes(ElementType::Text, b"Zaphod", ByteOrder::Little).expect("text");
        assert_eq!(text.element_type(), ElementType::Text);
    }

    #[test]
    fn classified_samples_match_their_tag() {
        let s = Samples::from_bytes(ElementType::Int16, &[1, 0, 2, 0], ByteOrder::Little).expect("i16");
        let Samples::Int16(v) = &s else {
            panic!("wrong variant");
        };
        assert_eq!(classify_any(v), ElementType::Int16);
        assert_eq!(s.element_type(), ElementType::Int16);
    }

    #[test]
    fn sentinel_types_are_rejected() {
        assert!(matches!(
            Value::from_bytes(ElementType::Unknown, &[], ByteOrder::Little),
            Err(TypeError::UnsupportedType { .. })
        ));
        assert!(Samples::empty(ElementType::Null).is_err());
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(
            Value::from_bytes(ElementType::Float64, &[0; 4], ByteOrder::Little),
            Err(TypeError::BadLength { .. })
        ));
    }

    #[test]
    fn conversions_keep_64_bit_integers_exact() {
        let big = Value::Uint64(u64::MAX - 1);
        assert_eq!(big.get::<u64>().expect("u64"), u64::MAX - 1);
        let s = Samples::Int64(vec![i64::MIN + 3]);
        assert_eq!(s.to_vec::<i64>().expect("i64"), vec![i64::MIN + 3]);
    }

    #[test]
    fn text_does_not_convert_to_numbers() {
        let t = Value::Text("42".into());
        assert!(t.get::<i32>().is_err());
        assert!(Samples::Text(vec!["a".into()]).to_vec::<f64>().is_err());
    }

    #[test]
    fn convert_changes_the_tag() {
        let s = Samples::Int8(vec![41, 42]).convert(ElementType::Complex128).expect("convert");
        assert_eq!(
            s,
            Samples::Complex128(vec![Complex::real(41.0), Complex::real(42.0)])
        );
    }
}
