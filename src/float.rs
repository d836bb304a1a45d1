use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Every tape stores values and adjoints of one base type. Only primitive
/// float types implement this; AD wrapper types do not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Convert an `f64` literal to this type.
    fn lit(x: f64) -> Self;
}

impl Float for f32 {
    #[inline]
    fn lit(x: f64) -> Self {
        x as f32
    }
}

impl Float for f64 {
    #[inline]
    fn lit(x: f64) -> Self {
        x
    }
}
