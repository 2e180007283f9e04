//! Working representation of evaluated samples.

use crate::types::{
    Complex, ElementType, Sample, Samples, TypeError,
    value::typed_samples,
};

/// Samples in the widest representation of their domain.
///
/// Every signed integer fits `i64`, every unsigned integer `u64`, both float
/// widths `f64` and both complex widths `Complex<f64>`, so converting stored
/// samples into a series and back to their own type is exact.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Series {
    Int(Vec<i64>),
    Uint(Vec<u64>),
    Real(Vec<f64>),
    Complex(Vec<Complex<f64>>),
    Text(Vec<String>),
}

fn widen<S: Sample, T>(v: &[S], f: impl Fn(S) -> T) -> Vec<T> {
    v.iter().map(|&x| f(x)).collect()
}

impl Series {
    pub(crate) fn from_samples(samples: &Samples) -> Series {
        match samples {
            Samples::Int8(v) => Series::Int(widen(v, Sample::to_i64)),
            Samples::Int16(v) => Series::Int(widen(v, Sample::to_i64)),
            Samples::Int32(v) => Series::Int(widen(v, Sample::to_i64)),
            Samples::Int64(v) => Series::Int(v.clone()),
            Samples::Uint8(v) => Series::Uint(widen(v, Sample::to_u64)),
            Samples::Uint16(v) => Series::Uint(widen(v, Sample::to_u64)),
            Samples::Uint32(v) => Series::Uint(widen(v, Sample::to_u64)),
            Samples::Uint64(v) => Series::Uint(v.clone()),
            Samples::Float32(v) => Series::Real(widen(v, Sample::to_f64)),
            Samples::Float64(v) => Series::Real(v.clone()),
            Samples::Complex64(v) => Series::Complex(widen(v, Sample::to_complex)),
            Samples::Complex128(v) => Series::Complex(v.clone()),
            Samples::Text(v) => Series::Text(v.clone()),
        }
    }

    /// An all-zero series in the domain of `ty`.
    pub(crate) fn zeros(ty: ElementType, len: usize) -> Series {
        if ty.is_complex() {
            Series::Complex(vec![Complex::ZERO; len])
        } else if ty.is_float() {
            Series::Real(vec![0.0; len])
        } else if ty.is_signed() {
            Series::Int(vec![0; len])
        } else if ty == ElementType::Text {
            Series::Text(vec![String::new(); len])
        } else {
            Series::Uint(vec![0; len])
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Series::Int(v) => v.len(),
            Series::Uint(v) => v.len(),
            Series::Real(v) => v.len(),
            Series::Complex(v) => v.len(),
            Series::Text(v) => v.len(),
        }
    }

    pub(crate) fn is_complex(&self) -> bool {
        matches!(self, Series::Complex(_))
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        match self {
            Series::Int(v) => v.truncate(len),
            Series::Uint(v) => v.truncate(len),
            Series::Real(v) => v.truncate(len),
            Series::Complex(v) => v.truncate(len),
            Series::Text(v) => v.truncate(len),
        }
    }

    /// Samples at `indices`, in order.
    pub(crate) fn pick(&self, indices: impl Iterator<Item = usize>) -> Series {
        match self {
            Series::Int(v) => Series::Int(indices.map(|i| v[i]).collect()),
            Series::Uint(v) => Series::Uint(indices.map(|i| v[i]).collect()),
            Series::Real(v) => Series::Real(indices.map(|i| v[i]).collect()),
            Series::Complex(v) => Series::Complex(indices.map(|i| v[i]).collect()),
            Series::Text(v) => Series::Text(indices.map(|i| v[i].clone()).collect()),
        }
    }

    /// `self` followed by `other`, converted to `self`'s domain.
    pub(crate) fn append(&mut self, other: &Series) {
        match self {
            Series::Int(v) => v.extend(other.ints()),
            Series::Uint(v) => v.extend(other.uints()),
            Series::Real(v) => v.extend(other.reals()),
            Series::Complex(v) => v.extend(other.complexes()),
            Series::Text(v) => v.extend(other.texts()),
        }
    }

    /// Replace the samples from `start` on with `other`, growing as needed.
    pub(crate) fn overwrite(&mut self, start: usize, other: &Series) {
        fn put<T: Clone>(v: &mut Vec<T>, start: usize, new: Vec<T>) {
            for (i, x) in new.into_iter().enumerate() {
                match v.get_mut(start + i) {
                    Some(slot) => *slot = x,
                    None => v.push(x),
                }
            }
        }
        match self {
            Series::Int(v) => put(v, start, other.ints()),
            Series::Uint(v) => put(v, start, other.uints()),
            Series::Real(v) => put(v, start, other.reals()),
            Series::Complex(v) => put(v, start, other.complexes()),
            Series::Text(v) => put(v, start, other.texts()),
        }
    }

    pub(crate) fn reals(&self) -> Vec<f64> {
        match self {
            Series::Int(v) => v.iter().map(|&x| x as f64).collect(),
            Series::Uint(v) => v.iter().map(|&x| x as f64).collect(),
            Series::Real(v) => v.clone(),
            Series::Complex(v) => v.iter().map(|c| c.re).collect(),
            Series::Text(v) => vec![0.0; v.len()],
        }
    }

    pub(crate) fn complexes(&self) -> Vec<Complex<f64>> {
        match self {
            Series::Complex(v) => v.clone(),
            other => other.reals().into_iter().map(Complex::real).collect(),
        }
    }

    pub(crate) fn ints(&self) -> Vec<i64> {
        match self {
            Series::Int(v) => v.clone(),
            Series::Uint(v) => v.iter().map(|&x| x as i64).collect(),
            Series::Real(v) => v.iter().map(|&x| x as i64).collect(),
            Series::Complex(v) => v.iter().map(|c| c.re as i64).collect(),
            Series::Text(v) => vec![0; v.len()],
        }
    }

    /// Samples as 64-bit patterns; negative integers keep their two's complement bits.
    pub(crate) fn uints(&self) -> Vec<u64> {
        match self {
            Series::Uint(v) => v.clone(),
            Series::Int(v) => v.iter().map(|&x| x as u64).collect(),
            Series::Real(v) => v.iter().map(|&x| float_bits(x)).collect(),
            Series::Complex(v) => v.iter().map(|c| float_bits(c.re)).collect(),
            Series::Text(v) => vec![0; v.len()],
        }
    }

    fn texts(&self) -> Vec<String> {
        match self {
            Series::Text(v) => v.clone(),
            other => other.reals().iter().map(f64::to_string).collect(),
        }
    }

    /// Convert to samples of type `ty`.
    pub(crate) fn to_samples(&self, ty: ElementType) -> Result<Samples, TypeError> {
        if let Series::Text(v) = self {
            return match ty {
                ElementType::Text => Ok(Samples::Text(v.clone())),
                _ => Err(TypeError::Incompatible {
                    from: ElementType::Text,
                    to: ty,
                }),
            };
        }
        typed_samples!(ty, T => Ok(T::into_samples(self.typed::<T>())),
            text => Err(TypeError::Incompatible { from: self.domain(), to: ty }),
            sentinel => Err(TypeError::UnsupportedType { ty }))
    }

    fn typed<T: Sample>(&self) -> Vec<T> {
        match self {
            Series::Int(v) => v.iter().map(|&x| T::from_i64(x)).collect(),
            Series::Uint(v) => v.iter().map(|&x| T::from_u64(x)).collect(),
            Series::Real(v) => v.iter().map(|&x| T::from_f64(x)).collect(),
            Series::Complex(v) => v.iter().map(|&x| T::from_complex(x)).collect(),
            Series::Text(v) => vec![T::default(); v.len()],
        }
    }

    /// Widest element type of the series' domain.
    pub(crate) fn domain(&self) -> ElementType {
        match self {
            Series::Int(_) => ElementType::Int64,
            Series::Uint(_) => ElementType::Uint64,
            Series::Real(_) => ElementType::Float64,
            Series::Complex(_) => ElementType::Complex128,
            Series::Text(_) => ElementType::Text,
        }
    }
}

fn float_bits(x: f64) -> u64 {
    if x < 0.0 { x as i64 as u64 } else { x as u64 }
}
