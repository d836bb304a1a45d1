//! Chainable nodes of the reverse-mode graph.
//!
//! A node holds its forward value, its accumulated adjoint and the operation
//! that produced it. Operands are referenced by tape index, never copied.
//! `chain` reads the node's own value and adjoint plus its operands' values,
//! and only ever adds into operand adjoints: a node may feed several
//! consumers, so contributions must accumulate.

use crate::arena::Arena;
use crate::float::Float;
use crate::op::{self, BinaryOp, ReduceOp, TernaryOp, UnaryOp};

/// Index sentinel for an untracked constant operand.
pub const CONSTANT: u32 = u32::MAX;

/// A contiguous run of operand slots in the tape's operand arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub len: u32,
}

/// One operand of a reducing node.
///
/// `partial` is captured at construction for [`Op::Weighted`] nodes and
/// unused by [`Op::Reduce`] nodes, which recompute it from operand values.
#[derive(Clone, Copy, Debug)]
pub struct Operand<F> {
    pub index: u32,
    pub partial: F,
}

/// The operation that produced a node.
#[derive(Clone, Copy, Debug)]
pub enum Op<F> {
    /// Independent variable or zero-derivative result; `chain` is a no-op.
    Leaf,
    Unary(u32, UnaryOp),
    /// Both operands tracked.
    Binary(u32, u32, BinaryOp),
    /// Tracked left operand, constant right operand.
    BinaryVd(u32, F, BinaryOp),
    /// Constant left operand, tracked right operand.
    BinaryDv(F, u32, BinaryOp),
    Ternary(u32, u32, u32, TernaryOp),
    Reduce(Span, ReduceOp),
    /// `adj(x_i) += adj * partial_i`: dot products against constants,
    /// products with captured partners, precomputed gradients.
    Weighted(Span),
}

/// A vertex of the computation graph.
#[derive(Clone, Copy, Debug)]
pub struct Node<F> {
    pub(crate) value: F,
    pub(crate) adjoint: F,
    pub(crate) epoch: u64,
    pub(crate) op: Op<F>,
}

impl<F: Float> Node<F> {
    pub(crate) fn new(value: F, epoch: u64, op: Op<F>) -> Self {
        Node {
            value,
            adjoint: F::zero(),
            epoch,
            op,
        }
    }

    /// Forward value.
    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Accumulated adjoint.
    #[inline]
    pub fn adjoint(&self) -> F {
        self.adjoint
    }

    /// Epoch this node was created in.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The recorded operation.
    #[inline]
    pub fn op(&self) -> &Op<F> {
        &self.op
    }

    /// Whether the reverse sweep has to visit this node.
    #[inline]
    pub fn chains(&self) -> bool {
        !matches!(self.op, Op::Leaf)
    }

    /// Seed this node as the root of a gradient: `d root / d root = 1`.
    #[inline]
    pub fn init_dependent(&mut self) {
        self.adjoint = F::one();
    }

    #[inline]
    pub fn set_zero_adjoint(&mut self) {
        self.adjoint = F::zero();
    }

    /// Propagate this node's adjoint into its operands.
    ///
    /// `self` is a copy of the node stored at its own index in `nodes`.
    pub(crate) fn chain(&self, nodes: &mut Arena<Node<F>>, operands: &Arena<Operand<F>>) {
        let adj = self.adjoint;
        if adj == F::zero() {
            return;
        }
        let r = self.value;
        match self.op {
            Op::Leaf => {}
            Op::Unary(a, kind) => {
                let a = a as usize;
                let d = op::unary_partial(kind, nodes[a].value, r);
                accumulate(nodes, a, adj * d);
            }
            Op::Binary(a, b, kind) => {
                let (a, b) = (a as usize, b as usize);
                let (da, db) = op::binary_partials(kind, nodes[a].value, nodes[b].value, r);
                accumulate(nodes, a, adj * da);
                accumulate(nodes, b, adj * db);
            }
            Op::BinaryVd(a, c, kind) => {
                let a = a as usize;
                let (da, _) = op::binary_partials(kind, nodes[a].value, c, r);
                accumulate(nodes, a, adj * da);
            }
            Op::BinaryDv(c, b, kind) => {
                let b = b as usize;
                let (_, db) = op::binary_partials(kind, c, nodes[b].value, r);
                accumulate(nodes, b, adj * db);
            }
            Op::Ternary(a, b, c, kind) => {
                let (a, b, c) = (a as usize, b as usize, c as usize);
                let (da, db, dc) =
                    op::ternary_partials(kind, nodes[a].value, nodes[b].value, nodes[c].value);
                accumulate(nodes, a, adj * da);
                accumulate(nodes, b, adj * db);
                accumulate(nodes, c, adj * dc);
            }
            Op::Reduce(span, kind) => {
                let n = span.len as usize;
                for slot in operands.range(span.start as usize, n) {
                    let i = slot.index as usize;
                    let d = op::reduce_partial(kind, nodes[i].value, r, n);
                    accumulate(nodes, i, adj * d);
                }
            }
            Op::Weighted(span) => {
                for slot in operands.range(span.start as usize, span.len as usize) {
                    accumulate(nodes, slot.index as usize, adj * slot.partial);
                }
            }
        }
    }
}

#[inline]
fn accumulate<F: Float>(nodes: &mut Arena<Node<F>>, index: usize, delta: F) {
    let node = &mut nodes[index];
    node.adjoint = node.adjoint + delta;
}
