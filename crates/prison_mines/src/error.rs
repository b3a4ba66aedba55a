//! # Mine Error Types
//!
//! All errors that can occur while generating, applying or sweeping a mine.

use thiserror::Error;

/// Errors that can occur in the mine reset engine.
#[derive(Error, Debug)]
pub enum MineError {
    /// Two corners could not be turned into a valid region.
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    /// A mine definition or engine setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No mine is registered under this name.
    #[error("unknown mine: {0}")]
    UnknownMine(String),

    /// A mine with this name is already registered.
    #[error("mine already registered: {0}")]
    DuplicateMine(String),

    /// The mine's world cannot be resolved, so the mine is disabled.
    #[error("mine `{0}` is not enabled: ensure its world exists")]
    MineDisabled(String),

    /// A reset cycle for this mine has not reached Done yet.
    #[error("mine `{0}` is already resetting")]
    ResetInProgress(String),

    /// The world is not loaded on the host.
    #[error("world not loaded: {0}")]
    WorldNotLoaded(String),

    /// Reading or writing a single cell failed.
    #[error("world access failed in `{world}` at ({x}, {y}, {z}): {reason}")]
    WorldAccess {
        /// World identifier.
        world: String,
        /// Cell x.
        x: i32,
        /// Cell y.
        y: i32,
        /// Cell z.
        z: i32,
        /// Host supplied message.
        reason: String,
    },

    /// A player could not be moved.
    #[error("teleport failed for player {player}: {reason}")]
    Teleport {
        /// Player identifier.
        player: u64,
        /// Host supplied message.
        reason: String,
    },

    /// A before/after reset command was rejected by the host.
    #[error("host command `{command}` failed: {reason}")]
    CommandFailed {
        /// The command line after prefix stripping.
        command: String,
        /// Host supplied message.
        reason: String,
    },

    /// Saving or loading mine counts failed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Filesystem error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML input.
    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Counts could not be encoded as TOML.
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

/// Result type for mine operations.
pub type MineResult<T> = Result<T, MineError>;
