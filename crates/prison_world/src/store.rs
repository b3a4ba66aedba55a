//! # Count Store
//!
//! Saves each mine's counts as `<dir>/<mine>.toml`, or only in memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use prison_mines::{MineCounts, MineError, MinePersistence, MineResult};
use tracing::debug;

/// TOML files in one directory.
#[derive(Clone, Debug)]
pub struct TomlMineStore {
    dir: PathBuf,
}

impl TomlMineStore {
    /// Uses `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> MineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> MineResult<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(MineError::Persistence(format!(
                "mine name `{name}` cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{name}.toml")))
    }
}

impl MinePersistence for TomlMineStore {
    fn save_mine(&self, counts: &MineCounts) -> MineResult<()> {
        let path = self.path_for(&counts.name)?;
        let body = toml::to_string_pretty(counts)?;

        // Write then rename so a crash never leaves half a file
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        debug!(mine = %counts.name, path = %path.display(), "mine counts saved");
        Ok(())
    }

    fn load_mine(&self, name: &str) -> MineResult<Option<MineCounts>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path)?;
        let counts: MineCounts = toml::from_str(&body)?;
        if counts.name != name {
            return Err(MineError::Persistence(format!(
                "{} holds counts for `{}`",
                path.display(),
                counts.name
            )));
        }
        Ok(Some(counts))
    }
}

/// Counts kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryMineStore {
    saved: Mutex<HashMap<String, MineCounts>>,
}

impl MemoryMineStore {
    /// Saved mines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.lock().len()
    }

    /// True if nothing was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.lock().is_empty()
    }
}

impl MinePersistence for MemoryMineStore {
    fn save_mine(&self, counts: &MineCounts) -> MineResult<()> {
        self.saved.lock().insert(counts.name.clone(), counts.clone());
        Ok(())
    }

    fn load_mine(&self, name: &str) -> MineResult<Option<MineCounts>> {
        Ok(self.saved.lock().get(name).cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================
