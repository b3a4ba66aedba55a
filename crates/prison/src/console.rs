//! # Console Commands
//!
//! The `mines` operator command. A line is parsed once into a
//! [`ConsoleCommand`] and then executed against the runtime.
//!
//! ```text
//! mines list
//! mines reset <mine> [nocommands]
//! mines resetall
//! mines refresh <mine>
//! mines clear <mine>
//! mines sweep <mine>
//! mines stats <mine>
//! mines resize <mine> <edge> <amount>
//! mines save
//! ```

use prison_mines::{Edge, MineError, MineResult};

/// Command name the dispatcher registers.
pub const COMMAND_NAME: &str = "mines";

/// One parsed `mines` command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Names of every mine.
    List,
    /// Unconditional reset.
    Reset {
        /// Target mine.
        mine: String,
        /// Skip the mine's before/after commands.
        no_commands: bool,
    },
    /// Chained reset of every mine.
    ResetAll,
    /// Reset unless the skip-reset heuristic says otherwise.
    Refresh {
        /// Target mine.
        mine: String,
    },
    /// Fill with air.
    Clear {
        /// Target mine.
        mine: String,
    },
    /// Reconcile counts with the world now.
    Sweep {
        /// Target mine.
        mine: String,
    },
    /// Timing statistics of the last reset.
    Stats {
        /// Target mine.
        mine: String,
    },
    /// Move one edge of the mine.
    Resize {
        /// Target mine.
        mine: String,
        /// Face to move.
        edge: Edge,
        /// Blocks outward (negative shrinks).
        amount: i32,
    },
    /// Save counts of every mine.
    Save,
}

impl ConsoleCommand {
    /// Parses a line. The leading `/` and `mines` are optional.
    ///
    /// # Errors
    ///
    /// Returns [`MineError::CommandFailed`] for unknown subcommands or
    /// missing arguments.
    pub fn parse(line: &str) -> MineResult<Self> {
        let trimmed = line.trim().trim_start_matches('/');
        let mut args: Vec<&str> = trimmed.split_whitespace().collect();
        if args.first().is_some_and(|a| a.eq_ignore_ascii_case(COMMAND_NAME)) {
            args.remove(0);
        }
        Self::from_args(&args).map_err(|reason| MineError::CommandFailed {
            command: trimmed.to_string(),
            reason,
        })
    }

    /// Builds a command from the arguments after `mines`.
    ///
    /// # Errors
    ///
    /// Returns a usage message.
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let Some((sub, rest)) = args.split_first() else {
            return Err("missing subcommand".to_string());
        };
        let mine = || {
            rest.first()
                .map(|name| (*name).to_string())
                .ok_or_else(|| format!("usage: {COMMAND_NAME} {sub} <mine>"))
        };

        match sub.to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "reset" => Ok(Self::Reset {
                mine: mine()?,
                no_commands: rest
                    .get(1)
                    .is_some_and(|flag| flag.eq_ignore_ascii_case("nocommands")),
            }),
            "resetall" => Ok(Self::ResetAll),
            "refresh" => Ok(Self::Refresh { mine: mine()? }),
            "clear" => Ok(Self::Clear { mine: mine()? }),
            "sweep" => Ok(Self::Sweep { mine: mine()? }),
            "stats" => Ok(Self::Stats { mine: mine()? }),
            "resize" => {
                let usage = || format!("usage: {COMMAND_NAME} resize <mine> <edge> <amount>");
                let edge = rest.get(1).and_then(|e| parse_edge(e)).ok_or_else(usage)?;
                let amount = rest
                    .get(2)
                    .and_then(|a| a.parse::<i32>().ok())
                    .ok_or_else(usage)?;
                Ok(Self::Resize {
                    mine: mine()?,
                    edge,
                    amount,
                })
            }
            "save" => Ok(Self::Save),
            other => Err(format!("unknown subcommand `{other}`")),
        }
    }
}

fn parse_edge(name: &str) -> Option<Edge> {
    Some(match name.to_ascii_lowercase().as_str() {
        "top" => Edge::Top,
        "bottom" => Edge::Bottom,
        "north" => Edge::North,
        "east" => Edge::East,
        "south" => Edge::South,
        "west" => Edge::West,
        "walls" => Edge::Walls,
        _ => return None,
    })
}

// ============================================================================
// TESTS
// ============================================================================
