//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently with plain
//! `f64`, `Dual<f64>`, `Var<f64>`, and nestings such as `Dual<Var<f64>>` or
//! `Dual<Dual<f64>>`.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::dual::Dual;
use crate::float::Float;
use crate::special::SpecialFunctions;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

/// The central trait for AD-generic numeric code.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + SpecialFunctions
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    /// Lift an `f64` literal.
    #[inline]
    fn from_lit(x: f64) -> Self {
        Self::from_f(<Self::Float as Float>::lit(x))
    }
}

impl Scalar for f32 {
    type Float = f32;

    #[inline]
    fn from_f(val: f32) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f32 {
        *self
    }
}

impl Scalar for f64 {
    type Float = f64;

    #[inline]
    fn from_f(val: f64) -> Self {
        val
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }
}

impl<T: Scalar> Scalar for Dual<T> {
    type Float = T::Float;

    #[inline]
    fn from_f(val: T::Float) -> Self {
        Dual::constant(T::from_f(val))
    }

    #[inline]
    fn value(&self) -> T::Float {
        self.re.value()
    }
}

impl<F: TapeThreadLocal> Scalar for Var<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Var::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }
}
