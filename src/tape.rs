//! The reverse-mode tape and its thread-local activation.
//!
//! A [`Tape`] owns two arenas (nodes and reducing-node operand slots) and two
//! index stacks. The chaining stack lists every node the reverse sweep has to
//! visit, in creation order; the no-chain stack lists leaves whose adjoints
//! must be zeroed but which propagate nothing. Handles carry `(index, epoch)`
//! and are checked against the node's recorded epoch on every access, so a
//! handle that outlives a recovery is detected instead of silently reading a
//! reused slot.
//!
//! Operator overloads on [`Var`](crate::Var) record onto the thread's active
//! tape, installed with [`TapeGuard`].

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::arena::Arena;
use crate::config::TapeConfig;
use crate::error::{AdError, Result};
use crate::float::Float;
use crate::node::{Node, Op, Operand, Span, CONSTANT};
use crate::var::Var;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(0);

/// Epochs are unique across every tape in the process.
fn fresh_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Span of operand slots `start..end`, which must be addressable by `u32`.
fn operand_span(start: usize, end: usize) -> Result<Span> {
    match (u32::try_from(start), u32::try_from(end - start), u32::try_from(end)) {
        (Ok(start), Ok(len), Ok(_)) => Ok(Span { start, len }),
        _ => Err(AdError::OutOfMemory {
            requested: end - start,
            reason: "operand index space exhausted".to_string(),
        }),
    }
}

/// High-water marks saved by [`Tape::start_nested`].
#[derive(Clone, Copy, Debug)]
struct Checkpoint {
    id: u64,
    nodes: usize,
    operands: usize,
    chain: usize,
    nochain: usize,
}

/// Token for an open nested scope, consumed by [`Tape::end_nested`].
#[derive(Debug)]
#[must_use = "a nested scope must be closed with `end_nested`"]
pub struct NestedCheckpoint {
    depth: usize,
    id: u64,
}

impl NestedCheckpoint {
    /// Nesting depth this checkpoint opened (1 for the outermost scope).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Snapshot of tape occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapeStats {
    /// Live nodes, chaining and no-chain.
    pub nodes: usize,
    pub chaining: usize,
    pub nochain: usize,
    /// Live operand slots of reducing nodes.
    pub operands: usize,
    pub node_blocks: usize,
    pub operand_blocks: usize,
    pub bytes_reserved: usize,
    pub nested_depth: usize,
    pub epoch: u64,
}

impl fmt::Display for TapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes ({} chaining, {} no-chain), {} operands, {} + {} blocks, {} bytes, depth {}, epoch {}",
            self.nodes,
            self.chaining,
            self.nochain,
            self.operands,
            self.node_blocks,
            self.operand_blocks,
            self.bytes_reserved,
            self.nested_depth,
            self.epoch
        )
    }
}

/// Reverse-mode tape: node storage, stacks and nesting checkpoints.
pub struct Tape<F: Float> {
    nodes: Arena<Node<F>>,
    operands: Arena<Operand<F>>,
    chain_stack: Vec<u32>,
    nochain_stack: Vec<u32>,
    nested: Vec<Checkpoint>,
    epoch: u64,
    config: TapeConfig,
}

impl<F: Float> Default for Tape<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> fmt::Debug for Tape<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape").field("stats", &self.stats()).finish()
    }
}

impl<F: Float> Tape<F> {
    /// Create an empty tape with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TapeConfig::default())
    }

    /// Create an empty tape. No arena block is allocated until the first node.
    pub fn with_config(config: TapeConfig) -> Self {
        Tape {
            nodes: Arena::new(config.node_block_len),
            operands: Arena::new(config.operand_block_len),
            chain_stack: Vec::with_capacity(config.stack_capacity),
            nochain_stack: Vec::new(),
            nested: Vec::new(),
            epoch: fresh_epoch(),
            config,
        }
    }

    pub fn config(&self) -> &TapeConfig {
        &self.config
    }

    /// Epoch stamped on nodes created from now on.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes the reverse sweep visits.
    #[inline]
    pub fn chaining_len(&self) -> usize {
        self.chain_stack.len()
    }

    #[inline]
    pub fn nochain_len(&self) -> usize {
        self.nochain_stack.len()
    }

    pub fn stats(&self) -> TapeStats {
        TapeStats {
            nodes: self.nodes.len(),
            chaining: self.chain_stack.len(),
            nochain: self.nochain_stack.len(),
            operands: self.operands.len(),
            node_blocks: self.nodes.num_blocks(),
            operand_blocks: self.operands.num_blocks(),
            bytes_reserved: self.nodes.bytes_reserved() + self.operands.bytes_reserved(),
            nested_depth: self.nested.len(),
            epoch: self.epoch,
        }
    }

    // ── recording ──

    #[inline]
    fn alloc(&mut self, value: F, op: Op<F>) -> Result<u32> {
        if self.nodes.len() >= CONSTANT as usize {
            return Err(AdError::OutOfMemory {
                requested: 1,
                reason: "node index space exhausted".to_string(),
            });
        }
        let index = self.nodes.alloc(Node::new(value, self.epoch, op))?;
        Ok(index as u32)
    }

    /// Record an independent variable on the chaining stack.
    #[inline]
    pub fn push_var(&mut self, value: F) -> Result<u32> {
        let index = self.alloc(value, Op::Leaf)?;
        self.chain_stack.push(index);
        Ok(index)
    }

    /// Record a leaf that the reverse sweep never visits.
    #[inline]
    pub fn push_nochain(&mut self, value: F) -> Result<u32> {
        let index = self.alloc(value, Op::Leaf)?;
        self.nochain_stack.push(index);
        Ok(index)
    }

    /// Record an operation node on the chaining stack.
    #[inline]
    pub fn push_op(&mut self, value: F, op: Op<F>) -> Result<u32> {
        let index = self.alloc(value, op)?;
        self.chain_stack.push(index);
        Ok(index)
    }

    /// Copy operand slots into the operand arena for a reducing node.
    pub fn push_operands(&mut self, slots: impl IntoIterator<Item = Operand<F>>) -> Result<Span> {
        let start = self.operands.len();
        self.operands.alloc_extend(slots)?;
        let end = self.operands.len();
        let span = operand_span(start, end);
        if span.is_err() {
            self.operands.truncate(start);
        }
        span
    }

    // ── handle access ──

    /// Fail with [`AdError::StaleHandle`] unless `(index, epoch)` names a live
    /// node of this tape. Constants always pass.
    #[inline]
    pub fn check(&self, index: u32, epoch: u64) -> Result<()> {
        if index == CONSTANT {
            return Ok(());
        }
        match self.nodes.get(index as usize) {
            Some(node) if node.epoch == epoch => Ok(()),
            _ => Err(AdError::StaleHandle { index, epoch }),
        }
    }

    /// Checked node lookup.
    pub fn node(&self, index: u32, epoch: u64) -> Result<&Node<F>> {
        match self.nodes.get(index as usize) {
            Some(node) if node.epoch == epoch => Ok(node),
            _ => Err(AdError::StaleHandle { index, epoch }),
        }
    }

    /// Adjoint of a handle. Constants have adjoint zero.
    pub fn adjoint(&self, index: u32, epoch: u64) -> Result<F> {
        if index == CONSTANT {
            return Ok(F::zero());
        }
        self.node(index, epoch).map(Node::adjoint)
    }

    /// Overwrite the adjoint of a node, e.g. to seed a weighted reverse sweep.
    pub fn set_adjoint(&mut self, index: u32, epoch: u64, adjoint: F) -> Result<()> {
        self.check(index, epoch)?;
        if index != CONSTANT {
            self.nodes[index as usize].adjoint = adjoint;
        }
        Ok(())
    }

    /// Adjoints of several handles.
    pub fn adjoints(&self, vars: &[Var<F>]) -> Result<Vec<F>> {
        vars.iter()
            .map(|v| self.adjoint(v.index(), v.epoch()))
            .collect()
    }

    // ── gradient driver ──

    /// Seed `root` with adjoint one and propagate back to every node created
    /// before it, down to the innermost nested boundary if a scope is open.
    /// Adjoints accumulate; zero them first for a fresh gradient.
    ///
    /// A constant root has no dependencies, so nothing happens.
    pub fn grad(&mut self, root: u32, epoch: u64) -> Result<()> {
        if root == CONSTANT {
            return Ok(());
        }
        self.check(root, epoch)?;
        self.nodes[root as usize].init_dependent();
        self.sweep(root);
        Ok(())
    }

    /// Run the reverse sweep from `root` downwards without touching any
    /// adjoint first. Callers seed adjoints themselves.
    pub fn grad_seeded(&mut self, root: u32, epoch: u64) -> Result<()> {
        if root == CONSTANT {
            return Ok(());
        }
        self.check(root, epoch)?;
        self.sweep(root);
        Ok(())
    }

    /// Walk the chaining stack backwards from `root`, stopping at the
    /// innermost nested boundary: a nested gradient never propagates into
    /// nodes of the enclosing evaluation, it only accumulates into them.
    fn sweep(&mut self, root: u32) {
        // Indices are pushed in creation order, so the stack is sorted.
        let end = self.chain_stack.partition_point(|&i| i <= root);
        let begin = self.nested.last().map_or(0, |cp| cp.chain).min(end);
        for pos in (begin..end).rev() {
            let index = self.chain_stack[pos] as usize;
            let node = self.nodes[index];
            node.chain(&mut self.nodes, &self.operands);
        }
    }

    /// Zero the adjoint of every live node on both stacks.
    pub fn set_zero_all_adjoints(&mut self) {
        for node in self.nodes.iter_mut() {
            node.set_zero_adjoint();
        }
    }

    /// Zero the adjoints of nodes created inside the innermost nested scope.
    pub fn set_zero_all_adjoints_nested(&mut self) -> Result<()> {
        let cp = *self.nested.last().ok_or(AdError::NotNested)?;
        for i in cp.nodes..self.nodes.len() {
            self.nodes[i].set_zero_adjoint();
        }
        Ok(())
    }

    // ── lifecycle ──

    /// Discard every node and start a new epoch. Arena blocks are kept for
    /// the next evaluation. Calling it on an empty tape is a no-op apart from
    /// the epoch change.
    ///
    /// Any open nested scopes are discarded along with their nodes.
    pub fn recover_memory(&mut self) {
        if !self.nested.is_empty() {
            log::warn!(
                "recover_memory with {} nested scope(s) open; discarding them",
                self.nested.len()
            );
            self.nested.clear();
        }
        self.nodes.recover_all();
        self.operands.recover_all();
        self.chain_stack.clear();
        self.nochain_stack.clear();
        self.epoch = fresh_epoch();
    }

    /// Like [`recover_memory`](Self::recover_memory), and also return every
    /// arena block except the first to the system allocator.
    pub fn free_memory(&mut self) {
        self.recover_memory();
        self.nodes.free_all();
        self.operands.free_all();
        self.chain_stack.shrink_to(self.config.stack_capacity);
        self.nochain_stack.shrink_to_fit();
        log::debug!("tape memory freed, epoch {}", self.epoch);
    }

    /// Open a nested scope. Nodes created until the matching
    /// [`recover_memory_nested`](Self::recover_memory_nested) or
    /// [`end_nested`](Self::end_nested) are discarded then; nodes created
    /// before it are untouched.
    pub fn start_nested(&mut self) -> NestedCheckpoint {
        let id = fresh_epoch();
        self.nested.push(Checkpoint {
            id,
            nodes: self.nodes.len(),
            operands: self.operands.len(),
            chain: self.chain_stack.len(),
            nochain: self.nochain_stack.len(),
        });
        log::trace!("enter nested scope, depth {}", self.nested.len());
        NestedCheckpoint {
            depth: self.nested.len(),
            id,
        }
    }

    /// Discard everything created since the innermost `start_nested`.
    pub fn recover_memory_nested(&mut self) -> Result<()> {
        let cp = self.nested.pop().ok_or(AdError::NotNested)?;
        self.restore(cp);
        log::trace!("exit nested scope, depth {}", self.nested.len() + 1);
        Ok(())
    }

    /// Close the scope opened by `checkpoint`, which must be the innermost.
    pub fn end_nested(&mut self, checkpoint: NestedCheckpoint) -> Result<()> {
        if checkpoint.depth != self.nested.len() || !self.owns(&checkpoint) {
            return Err(AdError::NestingMismatch {
                expected: checkpoint.depth,
                actual: self.nested.len(),
            });
        }
        self.recover_memory_nested()
    }

    /// Whether `checkpoint` still names an open scope of this tape. A scope
    /// discarded by `recover_memory` stays unowned even if another scope is
    /// later opened at the same depth.
    fn owns(&self, checkpoint: &NestedCheckpoint) -> bool {
        checkpoint.depth > 0
            && self
                .nested
                .get(checkpoint.depth - 1)
                .is_some_and(|cp| cp.id == checkpoint.id)
    }

    /// Close the scope opened by `checkpoint` and every scope deeper than it.
    /// Does nothing if that scope is already gone.
    pub(crate) fn unwind_to(&mut self, checkpoint: &NestedCheckpoint) {
        if !self.owns(checkpoint) {
            return;
        }
        let depth = checkpoint.depth;
        let cp = self.nested[depth - 1];
        self.nested.truncate(depth - 1);
        self.restore(cp);
        log::trace!("unwound nested scope to depth {}", depth - 1);
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.nodes.truncate(cp.nodes);
        self.operands.truncate(cp.operands);
        self.chain_stack.truncate(cp.chain);
        self.nochain_stack.truncate(cp.nochain);
        self.epoch = fresh_epoch();
    }

    /// Number of open nested scopes.
    #[inline]
    pub fn nested_depth(&self) -> usize {
        self.nested.len()
    }

    #[inline]
    pub fn is_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Make this tape the thread's active tape for as long as the guard lives.
    pub fn activate(&mut self) -> TapeGuard<'_, F>
    where
        F: TapeThreadLocal,
    {
        TapeGuard::new(self)
    }
}

// Thread-local active tape pointer.
thread_local! {
    static TAPE_F32: Cell<*mut Tape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut Tape<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Selects the thread-local slot for a base float type.
pub trait TapeThreadLocal: Float {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>>;
}

impl TapeThreadLocal for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F64
    }
}

/// Whether a tape for `F` is active on this thread.
pub fn is_active<F: TapeThreadLocal>() -> bool {
    F::cell().with(|cell| !cell.get().is_null())
}

/// Run `f` on the active tape. Panics if none is active.
#[inline]
pub fn with_active_tape<F: TapeThreadLocal, R>(f: impl FnOnce(&mut Tape<F>) -> R) -> R {
    match try_with_active_tape(f) {
        Ok(r) => r,
        Err(e) => panic!("{e}: activate one with `TapeGuard::new` or use `agrad::gradient`"),
    }
}

/// Run `f` on the active tape, or fail with [`AdError::NoActiveTape`].
#[inline]
pub fn try_with_active_tape<F: TapeThreadLocal, R>(
    f: impl FnOnce(&mut Tape<F>) -> R,
) -> Result<R> {
    F::cell().with(|cell| {
        let ptr = cell.get();
        if ptr.is_null() {
            return Err(AdError::NoActiveTape);
        }
        // SAFETY: the pointer was installed by a live `TapeGuard`, which holds
        // the tape's unique borrow. Access is confined to this thread and the
        // closure never re-enters the tape.
        let tape = unsafe { &mut *ptr };
        Ok(f(tape))
    })
}

/// RAII guard that installs a tape as the thread's active tape and restores
/// the previously active one on drop.
///
/// The guard holds the tape's unique borrow, so the tape cannot be touched
/// directly while it is active; lifecycle operations go through the guard.
pub struct TapeGuard<'a, F: TapeThreadLocal> {
    tape: *mut Tape<F>,
    prev: *mut Tape<F>,
    _borrow: PhantomData<&'a mut Tape<F>>,
}

impl<'a, F: TapeThreadLocal> TapeGuard<'a, F> {
    /// Activate `tape` on this thread.
    pub fn new(tape: &'a mut Tape<F>) -> Self {
        let ptr = tape as *mut Tape<F>;
        let prev = F::cell().with(|cell| cell.replace(ptr));
        TapeGuard {
            tape: ptr,
            prev,
            _borrow: PhantomData,
        }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn tape(&self) -> &mut Tape<F> {
        // SAFETY: `tape` comes from the `&'a mut` borrow held by this guard.
        // Every method takes a short-lived reference that does not escape and
        // never overlaps an operator's access through the thread-local.
        unsafe { &mut *self.tape }
    }

    pub fn stats(&self) -> TapeStats {
        self.tape().stats()
    }

    pub fn len(&self) -> usize {
        self.tape().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tape().is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.tape().epoch()
    }

    pub fn recover_memory(&self) {
        self.tape().recover_memory();
    }

    pub fn free_memory(&self) {
        self.tape().free_memory();
    }

    pub fn set_zero_all_adjoints(&self) {
        self.tape().set_zero_all_adjoints();
    }

    pub fn set_zero_all_adjoints_nested(&self) -> Result<()> {
        self.tape().set_zero_all_adjoints_nested()
    }

    pub fn start_nested(&self) -> NestedCheckpoint {
        self.tape().start_nested()
    }

    pub fn recover_memory_nested(&self) -> Result<()> {
        self.tape().recover_memory_nested()
    }

    pub fn end_nested(&self, checkpoint: NestedCheckpoint) -> Result<()> {
        self.tape().end_nested(checkpoint)
    }

    pub fn nested_depth(&self) -> usize {
        self.tape().nested_depth()
    }

    /// Open a nested scope that is recovered when the returned value drops.
    pub fn nested(&self) -> NestedScope<'_, F> {
        NestedScope::open(self.tape)
    }

    /// Seed `root` and propagate adjoints.
    pub fn grad(&self, root: &Var<F>) -> Result<()> {
        self.tape().grad(root.index(), root.epoch())
    }

    pub fn adjoints(&self, vars: &[Var<F>]) -> Result<Vec<F>> {
        self.tape().adjoints(vars)
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<'_, F> {
    fn drop(&mut self) {
        F::cell().with(|cell| cell.set(self.prev));
    }
}

/// A nested scope that restores the tape to its opening state on drop,
/// including during unwinding.
pub struct NestedScope<'g, F: TapeThreadLocal> {
    tape: *mut Tape<F>,
    checkpoint: NestedCheckpoint,
    _guard: PhantomData<&'g ()>,
}

impl<'g, F: TapeThreadLocal> NestedScope<'g, F> {
    fn open(tape: *mut Tape<F>) -> Self {
        // SAFETY: `tape` is the pointer of a live guard that outlives 'g.
        let checkpoint = unsafe { &mut *tape }.start_nested();
        NestedScope {
            tape,
            checkpoint,
            _guard: PhantomData,
        }
    }

    /// Depth this scope opened.
    pub fn depth(&self) -> usize {
        self.checkpoint.depth
    }

    /// Zero the adjoints of nodes created inside this scope.
    pub fn set_zero_adjoints(&self) -> Result<()> {
        // SAFETY: see `open`.
        let tape = unsafe { &mut *self.tape };
        if tape.nested_depth() != self.depth() || !tape.owns(&self.checkpoint) {
            return Err(AdError::NestingMismatch {
                expected: self.depth(),
                actual: tape.nested_depth(),
            });
        }
        tape.set_zero_all_adjoints_nested()
    }

    /// Close the scope now. Fails if a deeper scope is still open; the tape
    /// is restored to this scope's checkpoint either way.
    pub fn end(self) -> Result<()> {
        // SAFETY: see `open`.
        let tape = unsafe { &*self.tape };
        let actual = tape.nested_depth();
        if actual != self.depth() || !tape.owns(&self.checkpoint) {
            return Err(AdError::NestingMismatch {
                expected: self.depth(),
                actual,
            });
        }
        Ok(())
    }
}

impl<F: TapeThreadLocal> Drop for NestedScope<'_, F> {
    fn drop(&mut self) {
        // SAFETY: see `open`.
        unsafe { &mut *self.tape }.unwind_to(&self.checkpoint);
    }
}

/// Nested scope on whichever tape is active when it opens, unwound on drop.
pub(crate) struct ActiveNested<F: TapeThreadLocal> {
    checkpoint: NestedCheckpoint,
    _float: PhantomData<F>,
}

impl<F: TapeThreadLocal> ActiveNested<F> {
    pub(crate) fn open() -> Result<Self> {
        let checkpoint = try_with_active_tape(|t: &mut Tape<F>| t.start_nested())?;
        Ok(ActiveNested {
            checkpoint,
            _float: PhantomData,
        })
    }
}

impl<F: TapeThreadLocal> Drop for ActiveNested<F> {
    fn drop(&mut self) {
        let _ = try_with_active_tape(|t: &mut Tape<F>| t.unwind_to(&self.checkpoint));
    }
}

// ── free functions on the active tape ──

/// Zero every adjoint on the active tape.
pub fn set_zero_all_adjoints<F: TapeThreadLocal>() {
    with_active_tape(|t: &mut Tape<F>| t.set_zero_all_adjoints());
}

/// Recover the active tape.
pub fn recover_memory<F: TapeThreadLocal>() {
    with_active_tape(|t: &mut Tape<F>| t.recover_memory());
}

/// Open a nested scope on the active tape.
pub fn start_nested<F: TapeThreadLocal>() -> NestedCheckpoint {
    with_active_tape(|t: &mut Tape<F>| t.start_nested())
}

/// Recover the innermost nested scope of the active tape.
pub fn recover_memory_nested<F: TapeThreadLocal>() -> Result<()> {
    try_with_active_tape(|t: &mut Tape<F>| t.recover_memory_nested())?
}

/// Seed `root` on the active tape and propagate adjoints.
pub fn grad<F: TapeThreadLocal>(root: &Var<F>) -> Result<()> {
    try_with_active_tape(|t: &mut Tape<F>| t.grad(root.index(), root.epoch()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::BinaryOp;

    #[test]
    fn handles_from_other_tapes_are_stale() {
        let mut a = Tape::<f64>::new();
        let mut b = Tape::<f64>::new();
        let ia = a.push_var(1.0).unwrap();
        let ib = b.push_var(2.0).unwrap();
        assert_eq!(ia, ib);
        assert!(a.check(ia, a.epoch()).is_ok());
        assert!(matches!(
            b.check(ia, a.epoch()),
            Err(AdError::StaleHandle { .. })
        ));
    }

    #[test]
    fn sweep_stops_at_root() {
        let mut t = Tape::<f64>::new();
        let x = t.push_var(3.0).unwrap();
        let y = t.push_var(4.0).unwrap();
        let e = t.epoch();
        let p = t.push_op(12.0, Op::Binary(x, y, BinaryOp::Mul)).unwrap();
        // created after the root; must not be visited
        let _q = t.push_op(15.0, Op::Binary(p, y, BinaryOp::Add)).unwrap();
        t.grad(p, e).unwrap();
        assert_eq!(t.adjoint(x, e).unwrap(), 4.0);
        assert_eq!(t.adjoint(y, e).unwrap(), 3.0);
    }

    #[test]
    fn unwind_pops_deeper_scopes() {
        let mut t = Tape::<f64>::new();
        t.push_var(1.0).unwrap();
        let outer = t.start_nested();
        t.push_var(2.0).unwrap();
        let _inner = t.start_nested();
        t.push_var(3.0).unwrap();
        t.unwind_to(&outer);
        assert_eq!(t.len(), 1);
        assert_eq!(t.nested_depth(), 0);
    }

    #[test]
    fn epochs_past_u32_range_still_detect_stale_handles() {
        NEXT_EPOCH.fetch_max(u64::from(u32::MAX), Ordering::Relaxed);
        let mut t = Tape::<f64>::new();
        let x = t.push_var(1.0).unwrap();
        let e = t.epoch();
        assert!(e >= u64::from(u32::MAX));
        t.recover_memory();
        t.push_var(1.0).unwrap();
        assert!(t.epoch() > e);
        assert!(matches!(t.check(x, e), Err(AdError::StaleHandle { .. })));
    }

    #[test]
    fn operand_span_rejects_indices_beyond_u32() {
        let big = u32::MAX as usize;
        let span = operand_span(big - 4, big - 1).unwrap();
        assert_eq!((span.start, span.len), (u32::MAX - 4, 3));
        assert!(matches!(
            operand_span(big - 1, big + 2),
            Err(AdError::OutOfMemory { .. })
        ));
        assert!(matches!(
            operand_span(big + 1, big + 3),
            Err(AdError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn checkpoint_from_discarded_scope_is_not_reused() {
        let mut t = Tape::<f64>::new();
        let old = t.start_nested();
        t.recover_memory();
        let fresh = t.start_nested();
        t.push_var(1.0).unwrap();
        assert_eq!(old.depth(), fresh.depth());
        t.unwind_to(&old);
        assert_eq!(t.nested_depth(), 1);
        assert_eq!(t.len(), 1);
        assert!(matches!(
            t.end_nested(old),
            Err(AdError::NestingMismatch { .. })
        ));
        t.end_nested(fresh).unwrap();
        assert_eq!(t.len(), 0);
    }
}
