//! # Command Dispatcher
//!
//! Console commands by first word. Mines run their `before: ` and
//! `after: ` hooks through here.
//!
//! Built in: `say <text>` records a broadcast line.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use prison_mines::{CommandAdapter, MineError, MineResult};
use tracing::{debug, info};

/// A command handler. Receives the arguments after the command word.
pub type CommandHandler = Arc<dyn Fn(&[&str]) -> MineResult<()> + Send + Sync>;

/// Routes command lines to handlers.
pub struct CommandDispatcher {
    handlers: RwLock<HashMap<String, CommandHandler>>,
    history: Mutex<Vec<String>>,
    broadcasts: Arc<Mutex<Vec<String>>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher with the built-in commands.
    #[must_use]
    pub fn new() -> Self {
        let dispatcher = Self {
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            broadcasts: Arc::new(Mutex::new(Vec::new())),
        };

        let broadcasts = Arc::clone(&dispatcher.broadcasts);
        dispatcher.register(
            "say",
            Arc::new(move |args: &[&str]| {
                let line = args.join(" ");
                info!(target: "broadcast", "{line}");
                broadcasts.lock().push(line);
                Ok(())
            }),
        );
        dispatcher
    }

    /// Adds or replaces a command. Names are case-insensitive.
    pub fn register(&self, name: &str, handler: CommandHandler) {
        self.handlers.write().insert(name.to_ascii_lowercase(), handler);
    }

    /// Every command line run, in order, including failed ones.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    /// Lines sent with `say`.
    #[must_use]
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().clone()
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandAdapter for CommandDispatcher {
    fn run_host_command(&self, command: &str) -> MineResult<()> {
        let line = command.trim().trim_start_matches('/');
        self.history.lock().push(line.to_string());

        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(MineError::CommandFailed {
                command: command.to_string(),
                reason: "empty command".to_string(),
            });
        };
        let args: Vec<&str> = words.collect();

        let handler = self.handlers.read().get(&name.to_ascii_lowercase()).cloned();
        let Some(handler) = handler else {
            return Err(MineError::CommandFailed {
                command: line.to_string(),
                reason: format!("unknown command `{name}`"),
            });
        };

        debug!(command = %line, "running host command");
        handler(&args)
    }
}

// ============================================================================
// TESTS
// ============================================================================
