//! Statically-typed sample conversions.

use std::fmt;

use super::{
    byte_order::ByteOrder,
    complex::Complex,
    element::ElementType,
    value::{Samples, Value},
};

mod sealed {
    pub trait Sealed {}
}

/// A numeric Rust type that can be read from or written to a field.
///
/// Implemented for the eight integer widths, `f32`, `f64`, and the two
/// complex pair types. Conversions between sample types follow the usual
/// numeric cast rules (float to integer truncates toward zero and saturates),
/// with one explicit loss: converting a complex value to any real type keeps
/// the real part and discards the imaginary part.
pub trait Sample: sealed::Sealed + Copy + Default + PartialEq + fmt::Debug + Send + 'static {
    /// The element type tag of this Rust type.
    const TYPE: ElementType;

    /// Convert from a 64-bit float.
    fn from_f64(v: f64) -> Self;
    /// Convert from a signed 64-bit integer.
    fn from_i64(v: i64) -> Self;
    /// Convert from an unsigned 64-bit integer.
    fn from_u64(v: u64) -> Self;
    /// Convert from a complex value. Real targets keep only `v.re`.
    fn from_complex(v: Complex<f64>) -> Self;

    /// Convert to a 64-bit float. Complex sources yield their real part.
    fn to_f64(self) -> f64;
    /// Convert to a signed 64-bit integer.
    fn to_i64(self) -> i64;
    /// Convert to an unsigned 64-bit integer.
    fn to_u64(self) -> u64;
    /// Convert to a complex value.
    fn to_complex(self) -> Complex<f64>;

    /// Append the encoded bytes of `self` to `out`.
    fn write_bytes(self, order: ByteOrder, out: &mut Vec<u8>);
    /// Decode one element from exactly `TYPE.size()` bytes.
    fn read_bytes(bytes: &[u8], order: ByteOrder) -> Self;

    /// Wrap into a runtime-tagged scalar.
    fn into_value(self) -> Value;
    /// Wrap a vector into runtime-tagged samples.
    fn into_samples(v: Vec<Self>) -> Samples;
}

macro_rules! fixed_bytes {
    ($bytes:expr, $n:expr) => {{
        let mut buf = [0u8; $n];
        buf.copy_from_slice(&$bytes[..$n]);
        buf
    }};
}

macro_rules! impl_real_sample {
    ($($t:ty => $ty:ident, $n:expr);* $(;)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Sample for $t {
                const TYPE: ElementType = ElementType::$ty;

                fn from_f64(v: f64) -> Self {
                    v as $t
                }
                fn from_i64(v: i64) -> Self {
                    v as $t
                }
                fn from_u64(v: u64) -> Self {
                    v as $t
                }
                fn from_complex(v: Complex<f64>) -> Self {
                    v.re as $t
                }
                fn to_f64(self) -> f64 {
                    self as f64
                }
                fn to_i64(self) -> i64 {
                    self as i64
                }
                fn to_u64(self) -> u64 {
                    self as u64
                }
                fn to_complex(self) -> Complex<f64> {
                    Complex::real(self as f64)
                }
                fn write_bytes(self, order: ByteOrder, out: &mut Vec<u8>) {
                    match order {
                        ByteOrder::Little => out.extend_from_slice(&self.to_le_bytes()),
                        ByteOrder::Big => out.extend_from_slice(&self.to_be_bytes()),
                    }
                }
                fn read_bytes(bytes: &[u8], order: ByteOrder) -> Self {
                    let buf = fixed_bytes!(bytes, $n);
                    match order {
                        ByteOrder::Little => <$t>::from_le_bytes(buf),
                        ByteOrder::Big => <$t>::from_be_bytes(buf),
                    }
                }
                fn into_value(self) -> Value {
                    Value::$ty(self)
                }
                fn into_samples(v: Vec<Self>) -> Samples {
                    Samples::$ty(v)
                }
            }
        )*
    };
}

impl_real_sample! {
    u8 => Uint8, 1;
    i8 => Int8, 1;
    u16 => Uint16, 2;
    i16 => Int16, 2;
    u32 => Uint32, 4;
    i32 => Int32, 4;
    u64 => Uint64, 8;
    i64 => Int64, 8;
    f32 => Float32, 4;
    f64 => Float64, 8;
}

macro_rules! impl_complex_sample {
    ($($t:ty => $ty:ident, $half:expr);* $(;)?) => {
        $(
            impl sealed::Sealed for Complex<$t> {}

            impl Sample for Complex<$t> {
                const TYPE: ElementType = ElementType::$ty;

                fn from_f64(v: f64) -> Self {
                    Complex::new(v as $t, 0.0)
                }
                fn from_i64(v: i64) -> Self {
                    Complex::new(v as $t, 0.0)
                }
                fn from_u64(v: u64) -> Self {
                    Complex::new(v as $t, 0.0)
                }
                fn from_complex(v: Complex<f64>) -> Self {
                    Complex::new(v.re as $t, v.im as $t)
                }
                fn to_f64(self) -> f64 {
                    self.re as f64
                }
                fn to_i64(self) -> i64 {
                    self.re as i64
                }
                fn to_u64(self) -> u64 {
                    self.re as u64
                }
                fn to_complex(self) -> Complex<f64> {
                    Complex::new(self.re as f64, self.im as f64)
                }
                fn write_bytes(self, order: ByteOrder, out: &mut Vec<u8>) {
                    self.re.write_bytes(order, out);
                    self.im.write_bytes(order, out);
                }
                fn read_bytes(bytes: &[u8], order: ByteOrder) -> Self {
                    Complex::new(
                        <$t>::read_bytes(&bytes[..$half], order),
                        <$t>::read_bytes(&bytes[$half..2 * $half], order),
                    )
                }
                fn into_value(self) -> Value {
                    Value::$ty(self)
                }
                fn into_samples(v: Vec<Self>) -> Samples {
                    Samples::$ty(v)
                }
            }
        )*
    };
}

impl_complex_sample! {
    f32 => Complex64, 4;
    f64 => Complex128, 8;
}

/// Decode a packed buffer of `T` elements.
pub(crate) fn decode_slice<T: Sample>(bytes: &[u8], order: ByteOrder) -> Vec<T> {
    bytes
        .chunks_exact(T::TYPE.size())
        .map(|chunk| T::read_bytes(chunk, order))
        .collect()
}

/// Encode a slice of `T` elements into a packed buffer.
pub(crate) fn encode_slice<T: Sample>(values: &[T], order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::TYPE.size());
    for v in values {
        v.write_bytes(order, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_type_tags() {
        assert_eq!(<u8 as Sample>::TYPE, ElementType::Uint8);
        assert_eq!(<i64 as Sample>::TYPE, ElementType::Int64);
        assert_eq!(<Complex<f32> as Sample>::TYPE, ElementType::Complex64);
    }

    #[test]
    fn complex_to_real_keeps_real_part() {
        let c = Complex::new(2.5, -7.0);
        assert_eq!(f64::from_complex(c), 2.5);
        assert_eq!(i32::from_complex(c), 2);
        assert_eq!(Complex::<f64>::from_complex(c), c);
    }

    #[test]
    fn float_to_int_truncates_and_saturates() {
        assert_eq!(i8::from_f64(13.9), 13);
        assert_eq!(i8::from_f64(1000.0), i8::MAX);
        assert_eq!(u8::from_f64(-4.0), 0);
    }

    #[test]
    fn bytes_respect_byte_order() {
        let mut le = Vec::new();
        0x0102u16.write_bytes(ByteOrder::Little, &mut le);
        assert_eq!(le, [0x02, 0x01]);
        let mut be = Vec::new();
        0x0102u16.write_bytes(ByteOrder::Big, &mut be);
        assert_eq!(be, [0x01, 0x02]);
        assert_eq!(u16::read_bytes(&be, ByteOrder::Big), 0x0102);
    }

    #[test]
    fn slices_decode_what_they_encode() {
        let values = [Complex::new(1.0f32, -1.0), Complex::new(0.5, 2.0)];
        let bytes = encode_slice(&values, ByteOrder::Big);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_slice::<Complex<f32>>(&bytes, ByteOrder::Big), values);
    }
}
