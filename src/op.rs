//! Elementary operations recorded on the tape.
//!
//! Each operation kind has a forward rule (`*_value`) evaluated when the node
//! is created, and a local derivative rule (`*_partials`) evaluated by the
//! node's `chain` during the reverse sweep. Partials are always computed from
//! operand values and the node's own result, never from adjoints.

use crate::float::Float;

/// One-operand operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    // ── Arithmetic ──
    Neg,
    Recip,
    Square,
    Sqrt,
    Cbrt,
    Powi(i32),

    // ── Exp / Log ──
    Exp,
    Exp2,
    ExpM1,
    Ln,
    Log2,
    Log10,
    Ln1p,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    // ── Hyperbolic ──
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,

    // ── Special ──
    InvLogit,
    Logit,
    Log1pExp,
    Log1mExp,

    // ── Misc ──
    Abs,
    Fract,
    ToDegrees,
    ToRadians,
}

/// Two-operand operations. Each is recorded as `vv`, `vd` or `dv` depending on
/// which operands are tracked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Floating-point remainder with C `fmod` semantics.
    Rem,
    Powf,
    Atan2,
    Hypot,
    LogSumExp,
    LogDiffExp,
    /// Positive difference `max(a - b, 0)`.
    Fdim,
}

/// Three-operand operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TernaryOp {
    /// `a * b + c`
    Fma,
}

/// N-operand reductions whose partials are recomputed from operand values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduceOp {
    Sum,
    Mean,
    /// Sum of squares.
    DotSelf,
    LogSumExp,
}

// ══════════════════════════════════════════════
//  Scalar kernels shared by f64, Dual and Var
// ══════════════════════════════════════════════

/// Logistic sigmoid, evaluated without overflow for large `|x|`.
#[inline]
pub fn inv_logit<T: Float>(x: T) -> T {
    if x < T::zero() {
        let e = x.exp();
        e / (T::one() + e)
    } else {
        T::one() / (T::one() + (-x).exp())
    }
}

/// `ln(x / (1 - x))`
#[inline]
pub fn logit<T: Float>(x: T) -> T {
    (x / (T::one() - x)).ln()
}

/// `ln(1 + exp(x))` without overflow for large `x`.
#[inline]
pub fn log1p_exp<T: Float>(x: T) -> T {
    if x > T::zero() {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// `ln(1 - exp(x))` for `x < 0`; NaN for `x > 0`, `-inf` at zero.
#[inline]
pub fn log1m_exp<T: Float>(x: T) -> T {
    if x > T::zero() {
        T::nan()
    } else if x > -T::LN_2() {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// `ln(exp(a) + exp(b))` without overflow.
#[inline]
pub fn log_sum_exp<T: Float>(a: T, b: T) -> T {
    if a == T::neg_infinity() {
        return b;
    }
    if a == T::infinity() && b == T::infinity() {
        return T::infinity();
    }
    if a > b {
        a + log1p_exp(b - a)
    } else {
        b + log1p_exp(a - b)
    }
}

/// `ln(exp(a) - exp(b))`; NaN when `b > a`.
#[inline]
pub fn log_diff_exp<T: Float>(a: T, b: T) -> T {
    if b == T::neg_infinity() {
        return a;
    }
    a + log1m_exp(b - a)
}

/// `ln(Σ exp(x_i))` over a slice, shifted by the maximum.
pub fn log_sum_exp_slice<T: Float>(xs: &[T]) -> T {
    let max = xs.iter().copied().fold(T::neg_infinity(), T::max);
    if max.is_infinite() {
        return max;
    }
    let sum = xs.iter().fold(T::zero(), |acc, &x| acc + (x - max).exp());
    max + sum.ln()
}

// ══════════════════════════════════════════════
//  Forward rules
// ══════════════════════════════════════════════

/// Forward value of a unary operation.
#[inline]
pub fn unary_value<T: Float>(op: UnaryOp, a: T) -> T {
    match op {
        UnaryOp::Neg => -a,
        UnaryOp::Recip => a.recip(),
        UnaryOp::Square => a * a,
        UnaryOp::Sqrt => a.sqrt(),
        UnaryOp::Cbrt => a.cbrt(),
        UnaryOp::Powi(n) => a.powi(n),

        UnaryOp::Exp => a.exp(),
        UnaryOp::Exp2 => a.exp2(),
        UnaryOp::ExpM1 => a.exp_m1(),
        UnaryOp::Ln => a.ln(),
        UnaryOp::Log2 => a.log2(),
        UnaryOp::Log10 => a.log10(),
        UnaryOp::Ln1p => a.ln_1p(),

        UnaryOp::Sin => a.sin(),
        UnaryOp::Cos => a.cos(),
        UnaryOp::Tan => a.tan(),
        UnaryOp::Asin => a.asin(),
        UnaryOp::Acos => a.acos(),
        UnaryOp::Atan => a.atan(),

        UnaryOp::Sinh => a.sinh(),
        UnaryOp::Cosh => a.cosh(),
        UnaryOp::Tanh => a.tanh(),
        UnaryOp::Asinh => a.asinh(),
        UnaryOp::Acosh => a.acosh(),
        UnaryOp::Atanh => a.atanh(),

        UnaryOp::InvLogit => inv_logit(a),
        UnaryOp::Logit => logit(a),
        UnaryOp::Log1pExp => log1p_exp(a),
        UnaryOp::Log1mExp => log1m_exp(a),

        UnaryOp::Abs => a.abs(),
        UnaryOp::Fract => a.fract(),
        UnaryOp::ToDegrees => a.to_degrees(),
        UnaryOp::ToRadians => a.to_radians(),
    }
}

/// Forward value of a binary operation.
#[inline]
pub fn binary_value<T: Float>(op: BinaryOp, a: T, b: T) -> T {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Powf => a.powf(b),
        BinaryOp::Atan2 => a.atan2(b),
        BinaryOp::Hypot => a.hypot(b),
        BinaryOp::LogSumExp => log_sum_exp(a, b),
        BinaryOp::LogDiffExp => log_diff_exp(a, b),
        BinaryOp::Fdim => {
            if a > b {
                a - b
            } else {
                T::zero()
            }
        }
    }
}

/// Forward value of a ternary operation.
#[inline]
pub fn ternary_value<T: Float>(op: TernaryOp, a: T, b: T, c: T) -> T {
    match op {
        TernaryOp::Fma => a.mul_add(b, c),
    }
}

// ══════════════════════════════════════════════
//  Reverse rules
// ══════════════════════════════════════════════

/// `∂r/∂a` for a unary operation with operand `a` and result `r`.
#[inline]
pub fn unary_partial<T: Float>(op: UnaryOp, a: T, r: T) -> T {
    let one = T::one();
    match op {
        UnaryOp::Neg => -one,
        UnaryOp::Recip => -r * r,
        UnaryOp::Square => a + a,
        UnaryOp::Sqrt => one / (T::lit(2.0) * r),
        UnaryOp::Cbrt => one / (T::lit(3.0) * r * r),
        UnaryOp::Powi(n) => {
            let scale = T::lit(f64::from(n));
            if n == 0 {
                T::zero()
            } else if let Some(m) = n.checked_sub(1) {
                scale * a.powi(m)
            } else {
                // i32::MIN: the exponent n - 1 only exists as a float
                scale * a.powf(T::lit(f64::from(n) - 1.0))
            }
        }

        UnaryOp::Exp => r,
        UnaryOp::Exp2 => r * T::LN_2(),
        UnaryOp::ExpM1 => r + one,
        UnaryOp::Ln => one / a,
        UnaryOp::Log2 => one / (a * T::LN_2()),
        UnaryOp::Log10 => one / (a * T::LN_10()),
        UnaryOp::Ln1p => one / (one + a),

        UnaryOp::Sin => a.cos(),
        UnaryOp::Cos => -a.sin(),
        UnaryOp::Tan => one + r * r,
        UnaryOp::Asin => one / (one - a * a).sqrt(),
        UnaryOp::Acos => -one / (one - a * a).sqrt(),
        UnaryOp::Atan => one / (one + a * a),

        UnaryOp::Sinh => a.cosh(),
        UnaryOp::Cosh => a.sinh(),
        UnaryOp::Tanh => one - r * r,
        UnaryOp::Asinh => one / (a * a + one).sqrt(),
        UnaryOp::Acosh => one / (a * a - one).sqrt(),
        UnaryOp::Atanh => one / (one - a * a),

        UnaryOp::InvLogit => r * (one - r),
        UnaryOp::Logit => one / (a * (one - a)),
        UnaryOp::Log1pExp => inv_logit(a),
        UnaryOp::Log1mExp => -one / (-a).exp_m1(),

        UnaryOp::Abs => {
            if a > T::zero() {
                one
            } else if a < T::zero() {
                -one
            } else {
                T::zero()
            }
        }
        UnaryOp::Fract => one,
        UnaryOp::ToDegrees => T::lit(180.0) / T::PI(),
        UnaryOp::ToRadians => T::PI() / T::lit(180.0),
    }
}

/// `(∂r/∂a, ∂r/∂b)` for a binary operation.
///
/// Constant operands are passed by value so the same rule serves the `vv`,
/// `vd` and `dv` node variants.
#[inline]
pub fn binary_partials<T: Float>(op: BinaryOp, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    match op {
        BinaryOp::Add => (one, one),
        BinaryOp::Sub => (one, -one),
        BinaryOp::Mul => (b, a),
        BinaryOp::Div => {
            let inv = one / b;
            (inv, -r * inv)
        }
        BinaryOp::Rem => (one, -(a / b).trunc()),
        BinaryOp::Powf => {
            let da = if b == zero {
                zero
            } else {
                b * a.powf(b - one)
            };
            let db = if r == zero { zero } else { r * a.ln() };
            (da, db)
        }
        BinaryOp::Atan2 => {
            let denom = a * a + b * b;
            (b / denom, -a / denom)
        }
        BinaryOp::Hypot => (a / r, b / r),
        BinaryOp::LogSumExp => (inv_logit(a - b), inv_logit(b - a)),
        BinaryOp::LogDiffExp => (-one / (b - a).exp_m1(), -one / (a - b).exp_m1()),
        BinaryOp::Fdim => {
            if a > b {
                (one, -one)
            } else {
                (zero, zero)
            }
        }
    }
}

/// Partials of a ternary operation with respect to each operand.
#[inline]
pub fn ternary_partials<T: Float>(op: TernaryOp, a: T, b: T, _c: T) -> (T, T, T) {
    match op {
        TernaryOp::Fma => (b, a, T::one()),
    }
}

/// `∂r/∂x_i` for a reduction over `n` operands with result `r`.
#[inline]
pub fn reduce_partial<T: Float>(op: ReduceOp, x: T, r: T, n: usize) -> T {
    match op {
        ReduceOp::Sum => T::one(),
        ReduceOp::Mean => T::one() / T::lit(n as f64),
        ReduceOp::DotSelf => x + x,
        ReduceOp::LogSumExp => {
            if r == T::infinity() {
                if x == r {
                    T::one()
                } else {
                    T::zero()
                }
            } else {
                (x - r).exp()
            }
        }
    }
}
