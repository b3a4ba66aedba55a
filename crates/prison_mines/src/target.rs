//! # Target Block Registry
//!
//! The planned block for every cell of a mine, produced by generation and
//! consumed by paging and sweeping.
//!
//! Entries live once in an ordered `Vec` (top-down scan order) and are found
//! by coordinate through an index map into that `Vec`. Only the registry can
//! add or remove entries, so the two structures always agree in length.

use std::collections::HashMap;

use crate::block::BlockType;

/// Identity of a target block: its cell coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetBlockKey {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl TargetBlockKey {
    /// Creates a key.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// One planned cell assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetBlock {
    key: TargetBlockKey,
    block: BlockType,
    spec: Option<usize>,
    edge: bool,
    air_broken: bool,
}

impl TargetBlock {
    /// Creates a target. Air targets start flagged as broken so the sweeper
    /// never counts them.
    #[must_use]
    pub fn new(key: TargetBlockKey, block: BlockType, spec: Option<usize>, edge: bool) -> Self {
        let air_broken = block.is_air();
        Self {
            key,
            block,
            spec,
            edge,
            air_broken,
        }
    }

    /// Cell coordinate.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> TargetBlockKey {
        self.key
    }

    /// Planned block.
    #[inline]
    #[must_use]
    pub const fn block(&self) -> &BlockType {
        &self.block
    }

    /// Index of the palette entry that produced this block, if any.
    #[inline]
    #[must_use]
    pub const fn spec(&self) -> Option<usize> {
        self.spec
    }

    /// On an edge or corner of the mine.
    #[inline]
    #[must_use]
    pub const fn is_edge(&self) -> bool {
        self.edge
    }

    /// True if the planned block is air.
    #[inline]
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.block.is_air()
    }

    /// True once the cell has been counted as broken.
    #[inline]
    #[must_use]
    pub const fn is_air_broken(&self) -> bool {
        self.air_broken
    }

    /// Marks the cell as counted.
    #[inline]
    pub fn set_air_broken(&mut self) {
        self.air_broken = true;
    }

    /// Replaces the planned block. The broken flag follows the new block.
    pub fn assign(&mut self, block: BlockType, spec: Option<usize>) {
        self.air_broken = block.is_air();
        self.block = block;
        self.spec = spec;
    }
}

/// Ordered list of target blocks with a coordinate index.
#[derive(Debug, Default)]
pub struct TargetBlockRegistry {
    blocks: Vec<TargetBlock>,
    index: HashMap<TargetBlockKey, usize>,
}

impl TargetBlockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry sized for `capacity` cells.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Removes every entry from both structures.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.index.clear();
    }

    /// Appends a target. A second target for the same cell replaces the
    /// first one in place.
    pub fn push(&mut self, target: TargetBlock) {
        if let Some(&i) = self.index.get(&target.key) {
            self.blocks[i] = target;
            return;
        }
        self.index.insert(target.key, self.blocks.len());
        self.blocks.push(target);
    }

    /// Number of targets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if nothing has been generated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Target at a scan position.
    #[inline]
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TargetBlock> {
        self.blocks.get(position)
    }

    /// Mutable target at a scan position.
    #[inline]
    pub fn get_mut(&mut self, position: usize) -> Option<&mut TargetBlock> {
        self.blocks.get_mut(position)
    }

    /// Scan position of a cell.
    #[inline]
    #[must_use]
    pub fn position_of(&self, key: &TargetBlockKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Target for a cell.
    #[must_use]
    pub fn get_by_key(&self, key: &TargetBlockKey) -> Option<&TargetBlock> {
        self.position_of(key).and_then(|i| self.blocks.get(i))
    }

    /// Mutable target for a cell.
    pub fn get_mut_by_key(&mut self, key: &TargetBlockKey) -> Option<&mut TargetBlock> {
        let i = self.position_of(key)?;
        self.blocks.get_mut(i)
    }

    /// Targets in scan order.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetBlock> {
        self.blocks.iter()
    }

    /// Mutable targets in scan order. Keys cannot be changed through this.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TargetBlock> {
        self.blocks.iter_mut()
    }

    /// Targets from `position` to the end.
    #[must_use]
    pub fn tail(&self, position: usize) -> &[TargetBlock] {
        self.blocks.get(position..).unwrap_or(&[])
    }
}

// ============================================================================
// TESTS
// ============================================================================
