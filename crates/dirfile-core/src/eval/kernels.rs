//! Element-wise formulas of the derived field kinds.
//!
//! Every kernel produces as many samples as its shortest input. Division by
//! zero follows IEEE-754: a zero divisor yields an infinity or NaN sample,
//! never an error.

use crate::{
    config::WindowFill,
    entry::{Threshold, WindowOp},
    types::Complex,
};

use super::series::Series;

fn shortest(series: &[&Series]) -> usize {
    series.iter().map(|s| s.len()).min().unwrap_or(0)
}

/// `y = sum(m_i * x_i + b_i)`.
pub(crate) fn lincom(terms: &[(Series, Complex<f64>, Complex<f64>)]) -> Series {
    let inputs: Vec<&Series> = terms.iter().map(|(x, _, _)| x).collect();
    let len = shortest(&inputs);
    let complex = terms
        .iter()
        .any(|(x, m, b)| x.is_complex() || !m.is_real() || !b.is_real());
    if complex {
        let mut y = vec![Complex::ZERO; len];
        for (x, m, b) in terms {
            for (out, v) in y.iter_mut().zip(x.complexes()) {
                *out = *out + *m * v + *b;
            }
        }
        Series::Complex(y)
    } else {
        let mut y = vec![0.0; len];
        for (x, m, b) in terms {
            for (out, v) in y.iter_mut().zip(x.reals()) {
                *out += m.re * v + b.re;
            }
        }
        Series::Real(y)
    }
}

/// `y = sum(a_j * x^j)`.
pub(crate) fn polynom(x: &Series, coefficients: &[Complex<f64>]) -> Series {
    let complex = x.is_complex() || coefficients.iter().any(|a| !a.is_real());
    if complex {
        Series::Complex(
            x.complexes()
                .into_iter()
                .map(|v| {
                    coefficients
                        .iter()
                        .rev()
                        .fold(Complex::ZERO, |acc, a| acc * v + *a)
                })
                .collect(),
        )
    } else {
        Series::Real(
            x.reals()
                .into_iter()
                .map(|v| coefficients.iter().rev().fold(0.0, |acc, a| acc * v + a.re))
                .collect(),
        )
    }
}

/// Bits `bitnum..bitnum + numbits` of each sample, sign-extended when `signed`.
pub(crate) fn bits(x: &Series, bitnum: u32, numbits: u32, signed: bool) -> Series {
    let mask = low_mask(numbits);
    let raw = x.uints().into_iter().map(move |v| (v >> bitnum) & mask);
    if signed {
        let shift = 64 - numbits;
        Series::Int(raw.map(|v| ((v << shift) as i64) >> shift).collect())
    } else {
        Series::Uint(raw.collect())
    }
}

/// Replace bits `bitnum..bitnum + numbits` of `old` with the low bits of `new`.
pub(crate) fn insert_bits(old: &Series, new: &Series, bitnum: u32, numbits: u32) -> Series {
    let mask = low_mask(numbits) << bitnum;
    Series::Uint(
        old.uints()
            .into_iter()
            .zip(new.uints())
            .map(|(o, n)| (o & !mask) | ((n << bitnum) & mask))
            .collect(),
    )
}

fn low_mask(numbits: u32) -> u64 {
    if numbits >= 64 { u64::MAX } else { (1u64 << numbits) - 1 }
}

/// `y = dividend / x`.
pub(crate) fn recip(x: &Series, dividend: Complex<f64>) -> Series {
    if x.is_complex() || !dividend.is_real() {
        Series::Complex(x.complexes().into_iter().map(|v| dividend / v).collect())
    } else {
        Series::Real(x.reals().into_iter().map(|v| dividend.re / v).collect())
    }
}

/// `y = a * b`.
pub(crate) fn multiply(a: &Series, b: &Series) -> Series {
    binary(a, b, |x, y| x * y, |x, y| x * y)
}

/// `y = a / b`.
pub(crate) fn divide(a: &Series, b: &Series) -> Series {
    binary(a, b, |x, y| x / y, |x, y| x / y)
}

fn binary(
    a: &Series,
    b: &Series,
    real: impl Fn(f64, f64) -> f64,
    complex: impl Fn(Complex<f64>, Complex<f64>) -> Complex<f64>,
) -> Series {
    if a.is_complex() || b.is_complex() {
        Series::Complex(
            a.complexes()
                .into_iter()
                .zip(b.complexes())
                .map(|(x, y)| complex(x, y))
                .collect(),
        )
    } else {
        Series::Real(
            a.reals()
                .into_iter()
                .zip(b.reals())
                .map(|(x, y)| real(x, y))
                .collect(),
        )
    }
}

/// `data` where `check` satisfies `op threshold`, the fill value elsewhere.
pub(crate) fn window(data: &Series, check: &Series, op: WindowOp, threshold: Threshold, fill: WindowFill) -> Series {
    let len = shortest(&[data, check]);
    let pass: Vec<bool> = match check {
        Series::Int(v) => v.iter().take(len).map(|&c| op.test_int(c, threshold)).collect(),
        Series::Uint(v) => v.iter().take(len).map(|&c| op.test_uint(c, threshold)).collect(),
        _ => check
            .reals()
            .into_iter()
            .take(len)
            .map(|c| op.test(c, threshold))
            .collect(),
    };
    let nan = fill == WindowFill::NotANumber;
    let mut out = data.clone();
    out.truncate(len);
    match &mut out {
        Series::Int(v) => mask(v, &pass, 0),
        Series::Uint(v) => mask(v, &pass, 0),
        Series::Real(v) => mask(v, &pass, if nan { f64::NAN } else { 0.0 }),
        Series::Complex(v) => {
            let fill = if nan { Complex::new(f64::NAN, f64::NAN) } else { Complex::ZERO };
            mask(v, &pass, fill)
        }
        Series::Text(v) => mask(v, &pass, String::new()),
    }
    out
}

fn mask<T: Clone>(v: &mut [T], pass: &[bool], fill: T) {
    for (x, ok) in v.iter_mut().zip(pass) {
        if !ok {
            *x = fill.clone();
        }
    }
}

/// Demultiplex: each output sample holds the latest `data` sample whose
/// `count` equals `count_val`, scanning from the start of the inputs. The
/// first `skip` samples only seed the scan and are not emitted.
pub(crate) fn mplex(data: &Series, count: &Series, count_val: i64, skip: usize) -> Series {
    let len = shortest(&[data, count]);
    let selector = count.ints();
    let mut emitted = Vec::with_capacity(len.saturating_sub(skip));
    let mut current: Option<usize> = None;
    for (j, &c) in selector.iter().enumerate().take(len) {
        if c == count_val {
            current = Some(j);
        }
        if j >= skip {
            emitted.push(current);
        }
    }
    let mut out = data.pick(emitted.iter().map(|i| i.unwrap_or(0)));
    let held_nothing: Vec<bool> = emitted.iter().map(Option::is_some).collect();
    match &mut out {
        Series::Int(v) => mask(v, &held_nothing, 0),
        Series::Uint(v) => mask(v, &held_nothing, 0),
        Series::Real(v) => mask(v, &held_nothing, 0.0),
        Series::Complex(v) => mask(v, &held_nothing, Complex::ZERO),
        Series::Text(v) => mask(v, &held_nothing, String::new()),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lincom_identity_is_exact() {
        let x = Series::Real(vec![1.0, 2.0, 3.0]);
        let y = lincom(&[(x.clone(), Complex::real(1.0), Complex::ZERO)]);
        assert_eq!(y, x);
    }

    #[test]
    fn lincom_goes_complex_with_complex_scales() {
        let x = Series::Int(vec![2]);
        let y = lincom(&[(x, Complex::new(0.0, 1.0), Complex::real(1.0))]);
        assert_eq!(y, Series::Complex(vec![Complex::new(1.0, 2.0)]));
    }

    #[test]
    fn polynom_uses_horner() {
        let y = polynom(&Series::Real(vec![2.0]), &[Complex::real(1.0), Complex::real(2.0), Complex::real(3.0)]);
        assert_eq!(y, Series::Real(vec![1.0 + 4.0 + 12.0]));
    }

    #[test]
    fn bit_extraction() {
        let x = Series::Uint(vec![0b1011_0100]);
        assert_eq!(bits(&x, 2, 3, false), Series::Uint(vec![0b101]));
        assert_eq!(bits(&x, 2, 3, true), Series::Int(vec![-3]));
        assert_eq!(bits(&Series::Int(vec![-1]), 0, 64, false), Series::Uint(vec![u64::MAX]));
    }

    #[test]
    fn insert_bits_leaves_neighbours_alone() {
        let old = Series::Uint(vec![0b1111_1111]);
        let new = Series::Uint(vec![0b000]);
        assert_eq!(insert_bits(&old, &new, 2, 3), Series::Uint(vec![0b1110_0011]));
    }

    #[test]
    fn division_by_zero_is_ieee() {
        let y = recip(&Series::Real(vec![0.0, 2.0]), Complex::real(1.0));
        let Series::Real(v) = y else { panic!("real expected") };
        assert!(v[0].is_infinite());
        assert_eq!(v[1], 0.5);
        let Series::Real(q) = divide(&Series::Real(vec![0.0]), &Series::Real(vec![0.0])) else {
            panic!("real expected")
        };
        assert!(q[0].is_nan());
    }

    #[test]
    fn window_fills_failed_samples() {
        let data = Series::Real(vec![1.0, 2.0, 3.0]);
        let check = Series::Real(vec![5.0, 1.0, 5.0]);
        let y = window(&data, &check, WindowOp::Gt, Threshold::Float(4.0), WindowFill::Zero);
        assert_eq!(y, Series::Real(vec![1.0, 0.0, 3.0]));
        let Series::Real(v) = window(&data, &check, WindowOp::Gt, Threshold::Float(4.0), WindowFill::NotANumber)
        else {
            panic!("real expected")
        };
        assert!(v[1].is_nan());
    }

    #[test]
    fn window_operators_cover_every_comparison() {
        let data = Series::Int(vec![10, 20, 30, 40]);
        let check = Series::Int(vec![-1, 2, 3, 4]);
        let run = |op, t| window(&data, &check, op, t, WindowFill::Zero);
        assert_eq!(run(WindowOp::Eq, Threshold::Int(3)), Series::Int(vec![0, 0, 30, 0]));
        assert_eq!(run(WindowOp::Ne, Threshold::Int(3)), Series::Int(vec![10, 20, 0, 40]));
        assert_eq!(run(WindowOp::Ge, Threshold::Int(3)), Series::Int(vec![0, 0, 30, 40]));
        assert_eq!(run(WindowOp::Gt, Threshold::Int(3)), Series::Int(vec![0, 0, 0, 40]));
        assert_eq!(run(WindowOp::Le, Threshold::Int(2)), Series::Int(vec![10, 20, 0, 0]));
        assert_eq!(run(WindowOp::Lt, Threshold::Uint(2)), Series::Int(vec![10, 0, 0, 0]));
        assert_eq!(run(WindowOp::Set, Threshold::Uint(0b010)), Series::Int(vec![10, 20, 30, 0]));
        assert_eq!(run(WindowOp::Clr, Threshold::Uint(0b011)), Series::Int(vec![0, 20, 0, 40]));
    }

    #[test]
    fn window_tests_wide_integers_exactly() {
        let data = Series::Int(vec![7, 9]);
        let check = Series::Uint(vec![(1 << 60) | 1, u64::MAX]);
        let y = window(&data, &check, WindowOp::Set, Threshold::Uint(1), WindowFill::Zero);
        assert_eq!(y, Series::Int(vec![7, 9]));
        let y = window(&data, &check, WindowOp::Eq, Threshold::Uint(1 << 60), WindowFill::Zero);
        assert_eq!(y, Series::Int(vec![0, 0]));

        let check = Series::Int(vec![i64::MAX - 1, i64::MAX]);
        let y = window(&data, &check, WindowOp::Lt, Threshold::Int(i64::MAX), WindowFill::Zero);
        assert_eq!(y, Series::Int(vec![7, 0]));
    }

    #[test]
    fn mplex_holds_the_last_match() {
        let data = Series::Int(vec![10, 11, 12, 13, 14, 15]);
        let count = Series::Int(vec![2, 1, 2, 1, 2, 1]);
        assert_eq!(mplex(&data, &count, 1, 0), Series::Int(vec![0, 11, 11, 13, 13, 15]));
        assert_eq!(mplex(&data, &count, 1, 2), Series::Int(vec![11, 13, 13, 15]));
    }
}
