//! # Voxel World
//!
//! Named worlds made of sparse 16x16 column chunks. Unset cells are air.
//!
//! ## Chunk Layout
//!
//! A chunk covers 16x16 columns of unbounded height. Only non-air cells are
//! stored, so a freshly loaded world costs nothing until something is
//! placed in it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use prison_mines::{BlockType, CellState, MineError, MineResult, WorldAdapter};
use tracing::info;

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Chunk coordinate (identifies a chunk column in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }
}

/// Position inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct LocalPos {
    x: u8,
    y: i32,
    z: u8,
}

impl LocalPos {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    const fn from_block_pos(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x.rem_euclid(CHUNK_SIZE) as u8,
            y,
            z: z.rem_euclid(CHUNK_SIZE) as u8,
        }
    }
}

/// Sparse chunk: only non-air cells are stored.
#[derive(Debug, Default)]
pub struct Chunk {
    cells: HashMap<LocalPos, BlockType>,
}

impl Chunk {
    /// Non-air cells in the chunk.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.cells.len()
    }

    fn get(&self, pos: LocalPos) -> BlockType {
        self.cells.get(&pos).cloned().unwrap_or_else(BlockType::air)
    }

    fn set(&mut self, pos: LocalPos, block: &BlockType) {
        if block.is_air() {
            self.cells.remove(&pos);
        } else {
            self.cells.insert(pos, block.clone());
        }
    }
}

/// One named world.
#[derive(Debug)]
pub struct VoxelWorld {
    name: String,
    chunks: RwLock<HashMap<ChunkCoord, Chunk>>,
}

impl VoxelWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// World name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block at a cell.
    #[must_use]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockType {
        self.chunks
            .read()
            .get(&ChunkCoord::from_block_pos(x, z))
            .map_or_else(BlockType::air, |c| c.get(LocalPos::from_block_pos(x, y, z)))
    }

    /// Sets a cell. Setting air in an empty chunk allocates nothing.
    pub fn set_block(&self, x: i32, y: i32, z: i32, block: &BlockType) {
        let coord = ChunkCoord::from_block_pos(x, z);
        let pos = LocalPos::from_block_pos(x, y, z);
        let mut chunks = self.chunks.write();
        if block.is_air() {
            if let Some(chunk) = chunks.get_mut(&coord) {
                chunk.set(pos, block);
            }
        } else {
            chunks.entry(coord).or_default().set(pos, block);
        }
    }

    /// Fills a box with one block.
    pub fn fill(&self, a: [i32; 3], b: [i32; 3], block: &BlockType) {
        for x in a[0].min(b[0])..=a[0].max(b[0]) {
            for y in a[1].min(b[1])..=a[1].max(b[1]) {
                for z in a[2].min(b[2])..=a[2].max(b[2]) {
                    self.set_block(x, y, z, block);
                }
            }
        }
    }

    /// Counts cells of `block` in a box.
    #[must_use]
    pub fn count(&self, a: [i32; 3], b: [i32; 3], block: &BlockType) -> u64 {
        let mut n = 0;
        for x in a[0].min(b[0])..=a[0].max(b[0]) {
            for y in a[1].min(b[1])..=a[1].max(b[1]) {
                for z in a[2].min(b[2])..=a[2].max(b[2]) {
                    if &self.get_block(x, y, z) == block {
                        n += 1;
                    }
                }
            }
        }
        n
    }

    /// Chunks holding at least one cell.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.read().len()
    }
}

/// Write and failure counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Cells read through the adapter.
    pub reads: u64,
    /// Cells written through the adapter.
    pub writes: u64,
    /// Adapter calls that failed.
    pub failures: u64,
}

/// Every loaded world, plus cells the host refuses to touch.
#[derive(Default)]
pub struct WorldRegistry {
    worlds: RwLock<HashMap<String, Arc<VoxelWorld>>>,
    blocked: Mutex<HashSet<(String, i32, i32, i32)>>,
    reads: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
}

impl WorldRegistry {
    /// Creates a registry with no worlds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads (creates) a world, returning the existing one if present.
    pub fn load_world(&self, name: &str) -> Arc<VoxelWorld> {
        let mut worlds = self.worlds.write();
        let world = worlds
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(world = %name, "world loaded");
                Arc::new(VoxelWorld::new(name))
            });
        Arc::clone(world)
    }

    /// Unloads a world. Returns false if it was not loaded.
    pub fn unload_world(&self, name: &str) -> bool {
        let removed = self.worlds.write().remove(name).is_some();
        if removed {
            info!(world = %name, "world unloaded");
        }
        removed
    }

    /// A loaded world.
    #[must_use]
    pub fn world(&self, name: &str) -> Option<Arc<VoxelWorld>> {
        self.worlds.read().get(name).cloned()
    }

    /// Makes every adapter access to a cell fail, as a protected region
    /// would.
    pub fn block_cell(&self, world: &str, x: i32, y: i32, z: i32) {
        self.blocked.lock().insert((world.to_string(), x, y, z));
    }

    /// Lifts [`Self::block_cell`].
    pub fn unblock_cell(&self, world: &str, x: i32, y: i32, z: i32) {
        self.blocked.lock().remove(&(world.to_string(), x, y, z));
    }

    /// Adapter counters.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn accessible(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<Arc<VoxelWorld>> {
        let Some(loaded) = self.world(world) else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(MineError::WorldNotLoaded(world.to_string()));
        };
        if self.blocked.lock().contains(&(world.to_string(), x, y, z)) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(MineError::WorldAccess {
                world: world.to_string(),
                x,
                y,
                z,
                reason: "cell is protected".to_string(),
            });
        }
        Ok(loaded)
    }
}

impl WorldAdapter for WorldRegistry {
    fn is_world_loaded(&self, world: &str) -> bool {
        self.worlds.read().contains_key(world)
    }

    fn resolve_cell(&self, world: &str, x: i32, y: i32, z: i32) -> MineResult<CellState> {
        let loaded = self.accessible(world, x, y, z)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(CellState {
            block: loaded.get_block(x, y, z),
        })
    }

    fn set_cell(&self, world: &str, x: i32, y: i32, z: i32, block: &BlockType) -> MineResult<()> {
        let loaded = self.accessible(world, x, y, z)?;
        loaded.set_block(x, y, z, block);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
