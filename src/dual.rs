use std::fmt::{self, Display};

use crate::scalar::Scalar;

/// Forward-mode dual number: a value paired with its tangent (derivative).
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`.
///
/// The components may themselves be AD scalars: `Dual<Dual<f64>>` carries
/// second-order tangents, and `Dual<Var<f64>>` differentiates a reverse-mode
/// computation forward along one direction (forward-over-reverse).
#[derive(Clone, Copy, Debug, Default)]
pub struct Dual<T: Scalar> {
    /// Primal (real) value.
    pub re: T,
    /// Tangent (derivative) value.
    pub eps: T,
}

impl<T: Scalar> Display for Dual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<T: Scalar> Dual<T> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: T, eps: T) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: T) -> Self {
        Dual { re, eps: T::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: T) -> Self {
        Dual { re, eps: T::one() }
    }

    /// Primal value.
    #[inline]
    pub fn val(&self) -> T {
        self.re
    }

    /// Tangent.
    #[inline]
    pub fn tangent(&self) -> T {
        self.eps
    }

    /// Apply the chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    pub(crate) fn chain(self, f_val: T, f_deriv: T) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        let inv = self.re.recip();
        self.chain(inv, -inv * inv)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, (T::from_lit(2.0) * s).recip())
    }

    #[inline]
    pub fn cbrt(self) -> Self {
        let c = self.re.cbrt();
        self.chain(c, (T::from_lit(3.0) * c * c).recip())
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = self.re.powi(n);
        if n == 0 {
            return Dual::constant(val);
        }
        let deriv = match n.checked_sub(1) {
            Some(m) => T::from_lit(f64::from(n)) * self.re.powi(m),
            None => T::from_lit(f64::from(n)) * self.re.powf(T::from_lit(f64::from(n) - 1.0)),
        };
        self.chain(val, deriv)
    }

    #[inline]
    pub fn powf(self, n: Self) -> Self {
        // d(x^y) = y x^(y-1) dx + x^y ln(x) dy; each term drops out when its
        // coefficient is zero so that 0^y and x^0 stay finite.
        let val = self.re.powf(n.re);
        let dx = if n.re.is_zero() {
            T::zero()
        } else {
            n.re * self.re.powf(n.re - T::one()) * self.eps
        };
        let dy = if n.eps.is_zero() || val.is_zero() {
            T::zero()
        } else {
            val * self.re.ln() * n.eps
        };
        Dual { re: val, eps: dx + dy }
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    #[inline]
    pub fn exp2(self) -> Self {
        let e = self.re.exp2();
        self.chain(e, e * T::LN_2())
    }

    #[inline]
    pub fn exp_m1(self) -> Self {
        self.chain(self.re.exp_m1(), self.re.exp())
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(self.re.ln(), self.re.recip())
    }

    #[inline]
    pub fn log2(self) -> Self {
        self.chain(self.re.log2(), (self.re * T::LN_2()).recip())
    }

    #[inline]
    pub fn log10(self) -> Self {
        self.chain(self.re.log10(), (self.re * T::LN_10()).recip())
    }

    #[inline]
    pub fn ln_1p(self) -> Self {
        self.chain(self.re.ln_1p(), (T::one() + self.re).recip())
    }

    #[inline]
    pub fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    // ── Trig ──

    #[inline]
    pub fn sin(self) -> Self {
        self.chain(self.re.sin(), self.re.cos())
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.chain(self.re.cos(), -self.re.sin())
    }

    #[inline]
    pub fn tan(self) -> Self {
        let t = self.re.tan();
        self.chain(t, T::one() + t * t)
    }

    #[inline]
    pub fn sin_cos(self) -> (Self, Self) {
        let (s, c) = self.re.sin_cos();
        (
            Dual {
                re: s,
                eps: self.eps * c,
            },
            Dual {
                re: c,
                eps: self.eps * (-s),
            },
        )
    }

    #[inline]
    pub fn asin(self) -> Self {
        self.chain(self.re.asin(), (T::one() - self.re * self.re).sqrt().recip())
    }

    #[inline]
    pub fn acos(self) -> Self {
        self.chain(
            self.re.acos(),
            -(T::one() - self.re * self.re).sqrt().recip(),
        )
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.chain(self.re.atan(), (T::one() + self.re * self.re).recip())
    }

    #[inline]
    pub fn atan2(self, other: Self) -> Self {
        // d atan2(y, x) = (x dy - y dx) / (x² + y²)
        let denom = self.re * self.re + other.re * other.re;
        Dual {
            re: self.re.atan2(other.re),
            eps: (other.re * self.eps - self.re * other.eps) / denom,
        }
    }

    // ── Hyperbolic ──

    #[inline]
    pub fn sinh(self) -> Self {
        self.chain(self.re.sinh(), self.re.cosh())
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.chain(self.re.cosh(), self.re.sinh())
    }

    #[inline]
    pub fn tanh(self) -> Self {
        let t = self.re.tanh();
        self.chain(t, T::one() - t * t)
    }

    #[inline]
    pub fn asinh(self) -> Self {
        self.chain(self.re.asinh(), (self.re * self.re + T::one()).sqrt().recip())
    }

    #[inline]
    pub fn acosh(self) -> Self {
        self.chain(self.re.acosh(), (self.re * self.re - T::one()).sqrt().recip())
    }

    #[inline]
    pub fn atanh(self) -> Self {
        self.chain(self.re.atanh(), (T::one() - self.re * self.re).recip())
    }

    // ── Misc ──

    /// Derivative is zero at exactly zero.
    #[inline]
    pub fn abs(self) -> Self {
        let zero = T::zero();
        let d = if self.re > zero {
            T::one()
        } else if self.re < zero {
            -T::one()
        } else {
            zero
        };
        self.chain(self.re.abs(), d)
    }

    #[inline]
    pub fn signum(self) -> Self {
        Dual::constant(self.re.signum())
    }

    #[inline]
    pub fn floor(self) -> Self {
        Dual::constant(self.re.floor())
    }

    #[inline]
    pub fn ceil(self) -> Self {
        Dual::constant(self.re.ceil())
    }

    #[inline]
    pub fn round(self) -> Self {
        Dual::constant(self.re.round())
    }

    #[inline]
    pub fn trunc(self) -> Self {
        Dual::constant(self.re.trunc())
    }

    #[inline]
    pub fn fract(self) -> Self {
        Dual {
            re: self.re.fract(),
            eps: self.eps,
        }
    }

    #[inline]
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        // d(x*a + b) = a*dx + x*da + db
        Dual {
            re: self.re.mul_add(a.re, b.re),
            eps: self.eps * a.re + self.re * a.eps + b.eps,
        }
    }

    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        let h = self.re.hypot(other.re);
        Dual {
            re: h,
            eps: (self.re * self.eps + other.re * other.eps) / h,
        }
    }

    /// The larger operand, tangent included. A NaN operand loses.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.re.is_nan() || other.re > self.re {
            other
        } else {
            self
        }
    }

    /// The smaller operand, tangent included. A NaN operand loses.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        if self.re.is_nan() || other.re < self.re {
            other
        } else {
            self
        }
    }

    #[inline]
    pub fn to_degrees(self) -> Self {
        self.chain(self.re.to_degrees(), T::from_lit(180.0) / T::PI())
    }

    #[inline]
    pub fn to_radians(self) -> Self {
        self.chain(self.re.to_radians(), T::PI() / T::from_lit(180.0))
    }
}
