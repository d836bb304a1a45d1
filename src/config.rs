//! Sizing knobs for a [`Tape`](crate::tape::Tape).

/// Default number of nodes per arena block.
pub const DEFAULT_NODE_BLOCK_LEN: usize = 8192;
/// Default number of operand slots per arena block.
pub const DEFAULT_OPERAND_BLOCK_LEN: usize = 4096;

/// Arena and stack sizing for a tape.
///
/// Block lengths are counted in items, not bytes. A larger block means fewer
/// allocations on the first evaluation and more memory held between
/// evaluations (recovery keeps every block).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TapeConfig {
    /// Nodes per block of the node arena.
    pub node_block_len: usize,
    /// Operand slots per block of the operand arena (reducing nodes).
    pub operand_block_len: usize,
    /// Initial capacity of the chaining and no-chain stacks.
    pub stack_capacity: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        TapeConfig {
            node_block_len: DEFAULT_NODE_BLOCK_LEN,
            operand_block_len: DEFAULT_OPERAND_BLOCK_LEN,
            stack_capacity: 0,
        }
    }
}

impl TapeConfig {
    /// Set the node block length. Zero is clamped to one.
    pub fn node_block_len(mut self, len: usize) -> Self {
        self.node_block_len = len.max(1);
        self
    }

    /// Set the operand block length. Zero is clamped to one.
    pub fn operand_block_len(mut self, len: usize) -> Self {
        self.operand_block_len = len.max(1);
        self
    }

    /// Pre-size the node stacks for roughly `ops` operations.
    pub fn stack_capacity(mut self, ops: usize) -> Self {
        self.stack_capacity = ops;
        self
    }
}
