//! Chunked bump arena backing the tape.
//!
//! Items live in fixed-length blocks. Allocation bumps a single global
//! length; index `i` lives at block `i / block_len`, offset `i % block_len`.
//! Recovery resets the length without releasing any block, so the next
//! evaluation reuses the same pages. Items are `Copy`, so nothing is ever
//! dropped individually.

use std::mem;
use std::ops::{Index, IndexMut};

use crate::error::{AdError, Result};

/// Growable bump arena with bulk recovery.
#[derive(Debug)]
pub struct Arena<T: Copy> {
    blocks: Vec<Vec<T>>,
    block_len: usize,
    len: usize,
}

impl<T: Copy> Arena<T> {
    /// Create an empty arena. No block is allocated until the first `alloc`.
    pub fn new(block_len: usize) -> Self {
        Arena {
            blocks: Vec::new(),
            block_len: block_len.max(1),
            len: 0,
        }
    }

    /// Number of live items.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items per block.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of blocks currently held, live or not.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total item capacity across all held blocks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.len() * self.block_len
    }

    /// Bytes reserved by all held blocks.
    pub fn bytes_reserved(&self) -> usize {
        self.capacity() * mem::size_of::<T>()
    }

    /// Bump-allocate one item and return its index.
    ///
    /// Reuses a previously recovered block when one exists, otherwise asks
    /// the system allocator for a new block of `block_len` items.
    #[inline]
    pub fn alloc(&mut self, value: T) -> Result<usize> {
        let block = self.len / self.block_len;
        if block == self.blocks.len() {
            self.grow()?;
        }
        // Capacity was reserved exactly, so this push never reallocates.
        self.blocks[block].push(value);
        let index = self.len;
        self.len += 1;
        Ok(index)
    }

    /// Allocate every item of `values` contiguously in index space.
    /// Returns the index of the first item.
    pub fn alloc_extend(&mut self, values: impl IntoIterator<Item = T>) -> Result<usize> {
        let start = self.len;
        for v in values {
            self.alloc(v)?;
        }
        Ok(start)
    }

    #[cold]
    fn grow(&mut self) -> Result<()> {
        let mut block = Vec::new();
        block
            .try_reserve_exact(self.block_len)
            .map_err(|e| AdError::out_of_memory(self.block_len, e))?;
        self.blocks.push(block);
        log::debug!(
            "arena grew to {} blocks ({} bytes)",
            self.blocks.len(),
            self.bytes_reserved()
        );
        Ok(())
    }

    /// Item at `index`, if live.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            Some(&self.blocks[index / self.block_len][index % self.block_len])
        } else {
            None
        }
    }

    /// Mutable item at `index`, if live.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(&mut self.blocks[index / self.block_len][index % self.block_len])
        } else {
            None
        }
    }

    /// Iterate over the live items in `[start, start + count)`.
    pub fn range(&self, start: usize, count: usize) -> impl Iterator<Item = &T> + '_ {
        let end = (start + count).min(self.len);
        (start..end).map(move |i| &self.blocks[i / self.block_len][i % self.block_len])
    }

    /// Iterate mutably over every live item in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.blocks.iter_mut().flat_map(|b| b.iter_mut())
    }

    /// Discard every item at or above `len`, keeping all blocks.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let first = len / self.block_len;
        for (b, block) in self.blocks.iter_mut().enumerate().skip(first) {
            let keep = len.saturating_sub(b * self.block_len);
            if keep >= block.len() {
                continue;
            }
            block.truncate(keep);
        }
        self.len = len;
    }

    /// Reset to empty without releasing any block.
    pub fn recover_all(&mut self) {
        self.truncate(0);
    }

    /// Reset to empty and release every block except the first.
    pub fn free_all(&mut self) {
        let released = self.blocks.len().saturating_sub(1);
        self.blocks.truncate(1);
        self.blocks.shrink_to_fit();
        if let Some(first) = self.blocks.first_mut() {
            first.clear();
        }
        self.len = 0;
        if released > 0 {
            log::debug!("arena released {} blocks", released);
        }
    }
}

impl<T: Copy> Index<usize> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        assert!(index < self.len, "arena index {} out of range ({})", index, self.len);
        &self.blocks[index / self.block_len][index % self.block_len]
    }
}

impl<T: Copy> IndexMut<usize> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.len, "arena index {} out of range ({})", index, self.len);
        &mut self.blocks[index / self.block_len][index % self.block_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_span_blocks() {
        let mut arena = Arena::new(3);
        for i in 0..7u32 {
            assert_eq!(arena.alloc(i).unwrap(), i as usize);
        }
        assert_eq!(arena.num_blocks(), 3);
        assert_eq!(arena.get(5), Some(&5));
        assert_eq!(arena.get(7), None);
        let collected: Vec<u32> = arena.range(2, 4).copied().collect();
        assert_eq!(collected, vec![2, 3, 4, 5]);
    }

    #[test]
    fn truncate_across_block_boundary() {
        let mut arena = Arena::new(4);
        arena.alloc_extend(0..10u32).unwrap();
        arena.truncate(3);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.num_blocks(), 3);
        assert_eq!(arena.alloc(99).unwrap(), 3);
        assert_eq!(arena.alloc(100).unwrap(), 4);
        assert_eq!(arena.get(4), Some(&100));
        assert_eq!(arena.num_blocks(), 3);
    }

    #[test]
    fn recover_keeps_blocks_and_free_drops_them() {
        let mut arena = Arena::new(2);
        arena.alloc_extend([1.0f64; 9]).unwrap();
        assert_eq!(arena.num_blocks(), 5);
        arena.recover_all();
        assert!(arena.is_empty());
        assert_eq!(arena.num_blocks(), 5);
        arena.free_all();
        assert_eq!(arena.num_blocks(), 1);
        assert_eq!(arena.alloc(2.0).unwrap(), 0);
    }
}
