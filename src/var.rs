use std::fmt::{self, Display};

use crate::error::Result;
use crate::float::Float;
use crate::node::{Op, CONSTANT};
use crate::op::{self, BinaryOp, TernaryOp, UnaryOp};
use crate::tape::{self, Tape, TapeThreadLocal};

/// Reverse-mode AD variable.
///
/// A value plus the `(index, epoch)` of its node on the active tape: 24 bytes
/// for `f64`. `Copy`, since the node lives on the tape and not in the handle.
/// Constants carry the sentinel index and never touch the tape.
///
/// The forward value is stored inline and stays readable after the tape has
/// been recovered. Anything that needs the node (its adjoint, or building on
/// it) checks the epoch and rejects a stale handle.
#[derive(Clone, Copy, Debug)]
pub struct Var<F: Float> {
    pub(crate) value: F,
    pub(crate) index: u32,
    pub(crate) epoch: u64,
}

impl<F: Float> Var<F> {
    /// An untracked constant.
    #[inline]
    pub fn constant(value: F) -> Self {
        Var {
            value,
            index: CONSTANT,
            epoch: 0,
        }
    }

    /// Rebuild a handle from raw parts, e.g. indices returned by [`Tape`]
    /// push methods.
    #[inline]
    pub fn from_parts(value: F, index: u32, epoch: u64) -> Self {
        Var {
            value,
            index,
            epoch,
        }
    }

    /// Forward value.
    #[inline]
    pub fn val(&self) -> F {
        self.value
    }

    /// Tape index, or the sentinel for constants.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Epoch of the node this handle refers to.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.index == CONSTANT
    }
}

impl<F: TapeThreadLocal> Var<F> {
    /// New independent variable on the active tape.
    ///
    /// # Panics
    ///
    /// If no tape is active or the arena cannot grow.
    #[inline]
    pub fn new(value: F) -> Self {
        record(value, |t| t.push_var(value))
    }

    /// Fallible [`new`](Self::new).
    pub fn try_new(value: F) -> Result<Self> {
        try_record(value, |t| t.push_var(value))
    }

    /// New variable whose node the reverse sweep never visits. Its adjoint
    /// still accumulates and is still zeroed with the rest.
    #[inline]
    pub fn new_nochain(value: F) -> Self {
        record(value, |t| t.push_nochain(value))
    }

    /// Accumulated adjoint. Constants report zero.
    ///
    /// # Panics
    ///
    /// If the handle is stale or no tape is active.
    pub fn adj(&self) -> F {
        match self.try_adj() {
            Ok(a) => a,
            Err(e) => panic!("{e}"),
        }
    }

    /// Accumulated adjoint, or an error for a stale handle.
    pub fn try_adj(&self) -> Result<F> {
        if self.is_constant() {
            return Ok(F::zero());
        }
        tape::try_with_active_tape(|t: &mut Tape<F>| t.adjoint(self.index, self.epoch))?
    }

    /// Gradient of `self` with respect to `independents`.
    ///
    /// Zeroes every adjoint on the tape, propagates from `self`, and reads
    /// the adjoints of `independents`. Memory is not recovered; the caller
    /// decides when the evaluation ends.
    ///
    /// # Panics
    ///
    /// If any handle is stale or no tape is active.
    pub fn grad(&self, independents: &[Var<F>]) -> Vec<F> {
        match self.try_grad(independents) {
            Ok(g) => g,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible [`grad`](Self::grad).
    pub fn try_grad(&self, independents: &[Var<F>]) -> Result<Vec<F>> {
        tape::try_with_active_tape(|t: &mut Tape<F>| {
            t.set_zero_all_adjoints();
            t.grad(self.index, self.epoch)?;
            t.adjoints(independents)
        })?
    }

    // ── recording ──

    #[inline]
    pub(crate) fn unary(self, kind: UnaryOp) -> Self {
        let value = op::unary_value(kind, self.value);
        if self.is_constant() {
            return Var::constant(value);
        }
        record(value, |t| {
            t.check(self.index, self.epoch)?;
            t.push_op(value, Op::Unary(self.index, kind))
        })
    }

    #[inline]
    pub(crate) fn binary(self, rhs: Self, kind: BinaryOp) -> Self {
        let value = op::binary_value(kind, self.value, rhs.value);
        match (self.is_constant(), rhs.is_constant()) {
            (true, true) => Var::constant(value),
            (false, true) => record(value, |t| {
                t.check(self.index, self.epoch)?;
                t.push_op(value, Op::BinaryVd(self.index, rhs.value, kind))
            }),
            (true, false) => record(value, |t| {
                t.check(rhs.index, rhs.epoch)?;
                t.push_op(value, Op::BinaryDv(self.value, rhs.index, kind))
            }),
            (false, false) => record(value, |t| {
                t.check(self.index, self.epoch)?;
                t.check(rhs.index, rhs.epoch)?;
                t.push_op(value, Op::Binary(self.index, rhs.index, kind))
            }),
        }
    }

    #[inline]
    pub(crate) fn ternary(self, b: Self, c: Self, kind: TernaryOp) -> Self {
        match kind {
            TernaryOp::Fma => {
                if self.is_constant() || b.is_constant() || c.is_constant() {
                    return self.binary(b, BinaryOp::Mul).binary(c, BinaryOp::Add);
                }
                let value = op::ternary_value(kind, self.value, b.value, c.value);
                record(value, |t| {
                    t.check(self.index, self.epoch)?;
                    t.check(b.index, b.epoch)?;
                    t.check(c.index, c.epoch)?;
                    t.push_op(value, Op::Ternary(self.index, b.index, c.index, kind))
                })
            }
        }
    }

    /// Result of a piecewise-constant function of `self`: recorded as a
    /// no-chain leaf, so it participates in the graph with zero derivative.
    #[inline]
    pub(crate) fn flat(self, value: F) -> Self {
        if self.is_constant() {
            return Var::constant(value);
        }
        record(value, |t| {
            t.check(self.index, self.epoch)?;
            t.push_nochain(value)
        })
    }
}

/// Push a node on the active tape and wrap it in a handle.
#[inline]
pub(crate) fn record<F: TapeThreadLocal>(
    value: F,
    push: impl FnOnce(&mut Tape<F>) -> Result<u32>,
) -> Var<F> {
    match try_record(value, push) {
        Ok(v) => v,
        Err(e) => panic!("{e}"),
    }
}

#[inline]
pub(crate) fn try_record<F: TapeThreadLocal>(
    value: F,
    push: impl FnOnce(&mut Tape<F>) -> Result<u32>,
) -> Result<Var<F>> {
    tape::try_with_active_tape(|t: &mut Tape<F>| {
        let index = push(t)?;
        Ok(Var {
            value,
            index,
            epoch: t.epoch(),
        })
    })?
}

impl<F: Float> Display for Var<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Var<F> {
    fn default() -> Self {
        Var::constant(F::zero())
    }
}

impl<F: Float> From<F> for Var<F> {
    fn from(value: F) -> Self {
        Var::constant(value)
    }
}
