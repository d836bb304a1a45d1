//! Reducing operations over many tracked values.
//!
//! Each records a single node whose operands occupy a contiguous span of the
//! tape's operand arena, instead of a chain of `n - 1` binary nodes. Constant
//! inputs contribute to the value but take no operand slot.

use crate::error::{AdError, Result};
use crate::node::{Op, Operand};
use crate::op::{self, ReduceOp};
use crate::tape::{Tape, TapeThreadLocal};
use crate::var::{record, try_record, Var};

fn slot<F: TapeThreadLocal>(x: &Var<F>, partial: F) -> Operand<F> {
    Operand {
        index: x.index(),
        partial,
    }
}

fn check_all<F: TapeThreadLocal>(t: &Tape<F>, xs: &[Var<F>]) -> Result<()> {
    xs.iter().try_for_each(|x| t.check(x.index(), x.epoch()))
}

/// Record a reduction whose partials are recomputed during the sweep.
fn reduce<F: TapeThreadLocal>(xs: &[Var<F>], value: F, kind: ReduceOp) -> Var<F> {
    if xs.iter().all(Var::is_constant) {
        return Var::constant(value);
    }
    record(value, |t| {
        check_all(t, xs)?;
        let span = t.push_operands(
            xs.iter()
                .filter(|x| !x.is_constant())
                .map(|x| slot(x, F::zero())),
        )?;
        t.push_op(value, Op::Reduce(span, kind))
    })
}

/// Record a node with captured partials `(operand, ∂value/∂operand)`.
fn weighted<F: TapeThreadLocal>(value: F, terms: &[(Var<F>, F)]) -> Result<Var<F>> {
    if terms.iter().all(|(x, _)| x.is_constant()) {
        return Ok(Var::constant(value));
    }
    try_record(value, |t| {
        for (x, _) in terms {
            t.check(x.index(), x.epoch())?;
        }
        let span = t.push_operands(
            terms
                .iter()
                .filter(|(x, _)| !x.is_constant())
                .map(|(x, d)| slot(x, *d)),
        )?;
        t.push_op(value, Op::Weighted(span))
    })
}

fn values<F: TapeThreadLocal>(xs: &[Var<F>]) -> Vec<F> {
    xs.iter().map(Var::val).collect()
}

/// `Σ x_i`. Zero for an empty slice.
pub fn sum<F: TapeThreadLocal>(xs: &[Var<F>]) -> Var<F> {
    let value = xs.iter().fold(F::zero(), |acc, x| acc + x.val());
    reduce(xs, value, ReduceOp::Sum)
}

/// `Σ x_i / n`. NaN for an empty slice.
pub fn mean<F: TapeThreadLocal>(xs: &[Var<F>]) -> Var<F> {
    let n = F::lit(xs.len() as f64);
    let value = xs.iter().fold(F::zero(), |acc, x| acc + x.val()) / n;
    if xs.iter().any(Var::is_constant) {
        // The recomputed partial would use the tracked count, not n.
        let inv = n.recip();
        let terms: Vec<(Var<F>, F)> = xs.iter().map(|&x| (x, inv)).collect();
        return match weighted(value, &terms) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        };
    }
    reduce(xs, value, ReduceOp::Mean)
}

/// `Σ x_i²`
pub fn dot_self<F: TapeThreadLocal>(xs: &[Var<F>]) -> Var<F> {
    let value = xs.iter().fold(F::zero(), |acc, x| acc + x.val() * x.val());
    reduce(xs, value, ReduceOp::DotSelf)
}

/// `ln Σ exp(x_i)`, shifted by the maximum. `-inf` for an empty slice.
pub fn log_sum_exp_slice<F: TapeThreadLocal>(xs: &[Var<F>]) -> Var<F> {
    let value = op::log_sum_exp_slice(&values(xs));
    reduce(xs, value, ReduceOp::LogSumExp)
}

/// `Σ a_i b_i` over two tracked vectors.
pub fn dot_product<F: TapeThreadLocal>(a: &[Var<F>], b: &[Var<F>]) -> Result<Var<F>> {
    if a.len() != b.len() {
        return Err(AdError::SizeMismatch {
            context: "dot_product",
            expected: a.len(),
            actual: b.len(),
        });
    }
    let value = a
        .iter()
        .zip(b)
        .fold(F::zero(), |acc, (x, y)| acc + x.val() * y.val());
    let mut terms = Vec::with_capacity(2 * a.len());
    for (&x, &y) in a.iter().zip(b) {
        terms.push((x, y.val()));
        terms.push((y, x.val()));
    }
    weighted(value, &terms)
}

/// `Σ a_i c_i` with constant weights `c`.
pub fn dot_product_const<F: TapeThreadLocal>(a: &[Var<F>], c: &[F]) -> Result<Var<F>> {
    if a.len() != c.len() {
        return Err(AdError::SizeMismatch {
            context: "dot_product_const",
            expected: a.len(),
            actual: c.len(),
        });
    }
    let value = a
        .iter()
        .zip(c)
        .fold(F::zero(), |acc, (x, &w)| acc + x.val() * w);
    let terms: Vec<(Var<F>, F)> = a.iter().copied().zip(c.iter().copied()).collect();
    weighted(value, &terms)
}

/// A node with an externally computed value and gradient.
///
/// During the sweep each operand receives `adj * gradients[i]`. The operands'
/// own values play no part. Lengths are checked before anything is recorded.
pub fn precomputed_gradients<F: TapeThreadLocal>(
    value: F,
    operands: &[Var<F>],
    gradients: &[F],
) -> Result<Var<F>> {
    if operands.len() != gradients.len() {
        return Err(AdError::SizeMismatch {
            context: "precomputed_gradients",
            expected: operands.len(),
            actual: gradients.len(),
        });
    }
    let terms: Vec<(Var<F>, F)> = operands
        .iter()
        .copied()
        .zip(gradients.iter().copied())
        .collect();
    weighted(value, &terms)
}
