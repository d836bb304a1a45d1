use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::dual::Dual;
use crate::float::Float;
use crate::op::{BinaryOp, UnaryOp};
use crate::scalar::Scalar;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

// ──────────────────────────────────────────────
//  Dual<T> operators
// ──────────────────────────────────────────────

impl<T: Scalar> Add for Dual<T> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<T: Scalar> Sub for Dual<T> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<T: Scalar> Mul for Dual<T> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<T: Scalar> Div for Dual<T> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = rhs.re.recip();
        let re = self.re * inv;
        Dual {
            re,
            eps: (self.eps - re * rhs.eps) * inv,
        }
    }
}

impl<T: Scalar> Neg for Dual<T> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl<T: Scalar> Rem for Dual<T> {
    type Output = Self;
    /// `fmod`: `d(a % b) = da - trunc(a / b) db`.
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        let q = (self.re / rhs.re).trunc();
        Dual {
            re: self.re % rhs.re,
            eps: self.eps - q * rhs.eps,
        }
    }
}

impl<T: Scalar> AddAssign for Dual<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Scalar> SubAssign for Dual<T> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Scalar> MulAssign for Dual<T> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<T: Scalar> DivAssign for Dual<T> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<T: Scalar> RemAssign for Dual<T> {
    #[inline]
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

// Mixed ops: Dual<T> with its base float, at any nesting depth.
macro_rules! impl_dual_scalar_ops {
    ($f:ty) => {
        impl<T: Scalar<Float = $f>> Add<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn add(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re + T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Add<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn add(self, rhs: Dual<T>) -> Dual<T> {
                rhs + self
            }
        }

        impl<T: Scalar<Float = $f>> Sub<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn sub(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re - T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Sub<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn sub(self, rhs: Dual<T>) -> Dual<T> {
                Dual {
                    re: T::from_f(self) - rhs.re,
                    eps: -rhs.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Mul<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn mul(self, rhs: $f) -> Dual<T> {
                let c = T::from_f(rhs);
                Dual {
                    re: self.re * c,
                    eps: self.eps * c,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Mul<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn mul(self, rhs: Dual<T>) -> Dual<T> {
                rhs * self
            }
        }

        impl<T: Scalar<Float = $f>> Div<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn div(self, rhs: $f) -> Dual<T> {
                let inv = T::from_f(1.0 / rhs);
                Dual {
                    re: self.re * inv,
                    eps: self.eps * inv,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Div<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn div(self, rhs: Dual<T>) -> Dual<T> {
                Dual::constant(T::from_f(self)) / rhs
            }
        }

        impl<T: Scalar<Float = $f>> Rem<$f> for Dual<T> {
            type Output = Dual<T>;
            #[inline]
            fn rem(self, rhs: $f) -> Dual<T> {
                Dual {
                    re: self.re % T::from_f(rhs),
                    eps: self.eps,
                }
            }
        }

        impl<T: Scalar<Float = $f>> Rem<Dual<T>> for $f {
            type Output = Dual<T>;
            #[inline]
            fn rem(self, rhs: Dual<T>) -> Dual<T> {
                Dual::constant(T::from_f(self)) % rhs
            }
        }
    };
}

impl_dual_scalar_ops!(f32);
impl_dual_scalar_ops!(f64);

impl<T: Scalar> PartialEq for Dual<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl<T: Scalar> PartialOrd for Dual<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

// ──────────────────────────────────────────────
//  Var<F> operators
// ──────────────────────────────────────────────

macro_rules! impl_var_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $kind:expr) => {
        impl<F: TapeThreadLocal> $trait for Var<F> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.binary(rhs, $kind)
            }
        }

        impl<F: TapeThreadLocal> $assign_trait for Var<F> {
            #[inline]
            fn $assign_method(&mut self, rhs: Self) {
                *self = self.binary(rhs, $kind);
            }
        }
    };
}

impl_var_binop!(Add, add, AddAssign, add_assign, BinaryOp::Add);
impl_var_binop!(Sub, sub, SubAssign, sub_assign, BinaryOp::Sub);
impl_var_binop!(Mul, mul, MulAssign, mul_assign, BinaryOp::Mul);
impl_var_binop!(Div, div, DivAssign, div_assign, BinaryOp::Div);
impl_var_binop!(Rem, rem, RemAssign, rem_assign, BinaryOp::Rem);

impl<F: TapeThreadLocal> Neg for Var<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary(UnaryOp::Neg)
    }
}

// Mixed ops: Var<F> with primitive floats. The float side becomes a
// constant operand, so a single `vd` or `dv` node is recorded.
macro_rules! impl_var_scalar_ops {
    ($f:ty; $($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $kind:expr);+) => {
        $(
            impl $trait<$f> for Var<$f> {
                type Output = Var<$f>;
                #[inline]
                fn $method(self, rhs: $f) -> Var<$f> {
                    self.binary(Var::constant(rhs), $kind)
                }
            }

            impl $trait<Var<$f>> for $f {
                type Output = Var<$f>;
                #[inline]
                fn $method(self, rhs: Var<$f>) -> Var<$f> {
                    Var::constant(self).binary(rhs, $kind)
                }
            }

            impl $assign_trait<$f> for Var<$f> {
                #[inline]
                fn $assign_method(&mut self, rhs: $f) {
                    *self = self.binary(Var::constant(rhs), $kind);
                }
            }
        )+
    };
}

macro_rules! impl_var_scalar_ops_for {
    ($f:ty) => {
        impl_var_scalar_ops!($f;
            Add, add, AddAssign, add_assign, BinaryOp::Add;
            Sub, sub, SubAssign, sub_assign, BinaryOp::Sub;
            Mul, mul, MulAssign, mul_assign, BinaryOp::Mul;
            Div, div, DivAssign, div_assign, BinaryOp::Div;
            Rem, rem, RemAssign, rem_assign, BinaryOp::Rem
        );
    };
}

impl_var_scalar_ops_for!(f32);
impl_var_scalar_ops_for!(f64);

impl<F: Float> PartialEq for Var<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Var<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<F: Float> PartialEq<F> for Var<F> {
    #[inline]
    fn eq(&self, other: &F) -> bool {
        self.value == *other
    }
}

impl<F: Float> PartialOrd<F> for Var<F> {
    #[inline]
    fn partial_cmp(&self, other: &F) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}
