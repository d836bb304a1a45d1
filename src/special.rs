//! Special scalar functions used throughout log-density code.
//!
//! Each is available on `f32`, `f64`, [`Dual`] and [`Var`], so generic code
//! over [`Scalar`] can call them directly. On `Var` every function records a
//! single node with a closed-form partial instead of a chain of elementary
//! operations.

use crate::dual::Dual;
use crate::op::{self, BinaryOp, UnaryOp};
use crate::scalar::Scalar;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

/// Numerically stable special functions.
pub trait SpecialFunctions: Sized {
    /// `x * x`
    fn square(self) -> Self;
    /// Logistic sigmoid `1 / (1 + exp(-x))`.
    fn inv_logit(self) -> Self;
    /// Log-odds `ln(x / (1 - x))`.
    fn logit(self) -> Self;
    /// `ln(1 + exp(x))`
    fn log1p_exp(self) -> Self;
    /// `ln(1 - exp(x))`, defined for `x <= 0`.
    fn log1m_exp(self) -> Self;
    /// `ln(exp(self) + exp(other))`
    fn log_sum_exp(self, other: Self) -> Self;
    /// `ln(exp(self) - exp(other))`, defined for `self >= other`.
    fn log_diff_exp(self, other: Self) -> Self;
    /// Positive difference `max(self - other, 0)`.
    fn fdim(self, other: Self) -> Self;
}

/// Log density of a two-component mixture:
/// `ln(theta * exp(lambda1) + (1 - theta) * exp(lambda2))`.
pub fn log_mix<T: Scalar>(theta: T, lambda1: T, lambda2: T) -> T {
    (theta.ln() + lambda1).log_sum_exp((-theta).ln_1p() + lambda2)
}

macro_rules! impl_special_float {
    ($f:ty) => {
        impl SpecialFunctions for $f {
            #[inline]
            fn square(self) -> Self {
                self * self
            }
            #[inline]
            fn inv_logit(self) -> Self {
                op::inv_logit(self)
            }
            #[inline]
            fn logit(self) -> Self {
                op::logit(self)
            }
            #[inline]
            fn log1p_exp(self) -> Self {
                op::log1p_exp(self)
            }
            #[inline]
            fn log1m_exp(self) -> Self {
                op::log1m_exp(self)
            }
            #[inline]
            fn log_sum_exp(self, other: Self) -> Self {
                op::log_sum_exp(self, other)
            }
            #[inline]
            fn log_diff_exp(self, other: Self) -> Self {
                op::log_diff_exp(self, other)
            }
            #[inline]
            fn fdim(self, other: Self) -> Self {
                op::binary_value(BinaryOp::Fdim, self, other)
            }
        }
    };
}

impl_special_float!(f32);
impl_special_float!(f64);

impl<T: Scalar> SpecialFunctions for Dual<T> {
    #[inline]
    fn square(self) -> Self {
        self.chain(self.re * self.re, self.re + self.re)
    }

    #[inline]
    fn inv_logit(self) -> Self {
        let s = self.re.inv_logit();
        self.chain(s, s * (T::one() - s))
    }

    #[inline]
    fn logit(self) -> Self {
        self.chain(self.re.logit(), (self.re * (T::one() - self.re)).recip())
    }

    #[inline]
    fn log1p_exp(self) -> Self {
        self.chain(self.re.log1p_exp(), self.re.inv_logit())
    }

    #[inline]
    fn log1m_exp(self) -> Self {
        self.chain(self.re.log1m_exp(), -(-self.re).exp_m1().recip())
    }

    #[inline]
    fn log_sum_exp(self, other: Self) -> Self {
        let r = self.re.log_sum_exp(other.re);
        Dual {
            re: r,
            eps: self.eps * (self.re - other.re).inv_logit()
                + other.eps * (other.re - self.re).inv_logit(),
        }
    }

    #[inline]
    fn log_diff_exp(self, other: Self) -> Self {
        let r = self.re.log_diff_exp(other.re);
        let da = -(other.re - self.re).exp_m1().recip();
        let db = -(self.re - other.re).exp_m1().recip();
        Dual {
            re: r,
            eps: self.eps * da + other.eps * db,
        }
    }

    #[inline]
    fn fdim(self, other: Self) -> Self {
        if self.re > other.re {
            self - other
        } else {
            Dual::constant(T::zero())
        }
    }
}

impl<F: TapeThreadLocal> SpecialFunctions for Var<F> {
    #[inline]
    fn square(self) -> Self {
        self.unary(UnaryOp::Square)
    }
    #[inline]
    fn inv_logit(self) -> Self {
        self.unary(UnaryOp::InvLogit)
    }
    #[inline]
    fn logit(self) -> Self {
        self.unary(UnaryOp::Logit)
    }
    #[inline]
    fn log1p_exp(self) -> Self {
        self.unary(UnaryOp::Log1pExp)
    }
    #[inline]
    fn log1m_exp(self) -> Self {
        self.unary(UnaryOp::Log1mExp)
    }
    #[inline]
    fn log_sum_exp(self, other: Self) -> Self {
        self.binary(other, BinaryOp::LogSumExp)
    }
    #[inline]
    fn log_diff_exp(self, other: Self) -> Self {
        self.binary(other, BinaryOp::LogDiffExp)
    }
    #[inline]
    fn fdim(self, other: Self) -> Self {
        self.binary(other, BinaryOp::Fdim)
    }
}
