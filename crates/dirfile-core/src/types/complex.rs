//! Complex sample values as ordered `(re, im)` pairs.

use std::{
    fmt,
    ops::{Add, Div, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};

/// A complex number stored as an ordered `(re, im)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex<T> {
    /// Real part.
    pub re: T,
    /// Imaginary part.
    pub im: T,
}

/// Complex value made of two 32-bit floats (element type `complex64`).
pub type Complex64 = Complex<f32>;

/// Complex value made of two 64-bit floats (element type `complex128`).
pub type Complex128 = Complex<f64>;

impl<T> Complex<T> {
    /// Build a complex number from its parts.
    pub const fn new(re: T, im: T) -> Self {
        Complex { re, im }
    }
}

impl Complex<f64> {
    /// `0 + 0i`.
    pub const ZERO: Self = Complex::new(0.0, 0.0);
    /// `1 + 0i`.
    pub const ONE: Self = Complex::new(1.0, 0.0);

    /// A purely real value.
    pub const fn real(re: f64) -> Self {
        Complex::new(re, 0.0)
    }

    /// True when the imaginary part is exactly zero.
    pub fn is_real(&self) -> bool {
        self.im == 0.0
    }

    /// Integer power by repeated multiplication.
    pub fn powi(self, n: u32) -> Self {
        let mut acc = Self::ONE;
        for _ in 0..n {
            acc = acc * self;
        }
        acc
    }
}

impl From<f64> for Complex<f64> {
    fn from(re: f64) -> Self {
        Complex::real(re)
    }
}

impl From<Complex<f32>> for Complex<f64> {
    fn from(c: Complex<f32>) -> Self {
        Complex::new(f64::from(c.re), f64::from(c.im))
    }
}

impl Add for Complex<f64> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex<f64> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex<f64> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// IEEE-754 semantics: dividing by `0 + 0i` yields non-finite parts.
impl Div for Complex<f64> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl Neg for Complex<f64> {
    type Output = Self;
    fn neg(self) -> Self {
        Complex::new(-self.re, -self.im)
    }
}

impl<T: fmt::Display> fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.re, self.im)
    }
}
