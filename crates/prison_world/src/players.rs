//! # Player Registry
//!
//! Online players, their positions and chat inboxes, plus named warp
//! destinations used by mines with a configured teleport target.

use std::collections::HashMap;

use parking_lot::RwLock;
use prison_mines::{Bounds, Location, MineError, MineResult, PlayerAdapter, PlayerId};
use tracing::debug;

#[derive(Debug)]
struct OnlinePlayer {
    location: Location,
    inbox: Vec<String>,
}

/// Online players and warps.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<PlayerId, OnlinePlayer>>,
    warps: RwLock<HashMap<String, Location>>,
}

impl PlayerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player at a location.
    pub fn join(&self, player: PlayerId, location: Location) {
        self.players.write().insert(
            player,
            OnlinePlayer {
                location,
                inbox: Vec::new(),
            },
        );
    }

    /// Removes a player. Returns false if they were not online.
    pub fn leave(&self, player: PlayerId) -> bool {
        self.players.write().remove(&player).is_some()
    }

    /// Moves a player as their own movement would.
    pub fn walk_to(&self, player: PlayerId, location: Location) -> bool {
        self.players
            .write()
            .get_mut(&player)
            .map(|p| p.location = location)
            .is_some()
    }

    /// Where a player is.
    #[must_use]
    pub fn location(&self, player: PlayerId) -> Option<Location> {
        self.players.read().get(&player).map(|p| p.location.clone())
    }

    /// Messages a player received, oldest first.
    #[must_use]
    pub fn messages(&self, player: PlayerId) -> Vec<String> {
        self.players
            .read()
            .get(&player)
            .map(|p| p.inbox.clone())
            .unwrap_or_default()
    }

    /// Online player count.
    #[must_use]
    pub fn online(&self) -> usize {
        self.players.read().len()
    }

    /// Defines or replaces a named destination.
    pub fn set_warp(&self, name: impl Into<String>, location: Location) {
        self.warps.write().insert(name.into(), location);
    }

    fn teleport_failed(player: PlayerId, reason: impl Into<String>) -> MineError {
        MineError::Teleport {
            player: player.0,
            reason: reason.into(),
        }
    }
}

impl PlayerAdapter for PlayerRegistry {
    fn players_in_region(&self, bounds: &Bounds) -> Vec<PlayerId> {
        let mut found: Vec<PlayerId> = self
            .players
            .read()
            .iter()
            .filter(|(_, p)| bounds.within_include_top_bottom(&p.location))
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }

    fn players_within_radius(&self, center: &Location, radius: f64) -> Vec<PlayerId> {
        let mut found: Vec<PlayerId> = self
            .players
            .read()
            .iter()
            .filter(|(_, p)| {
                let l = &p.location;
                l.world == center.world
                    && (l.x - center.x).hypot(l.y - center.y).hypot(l.z - center.z) <= radius
            })
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }

    fn teleport_out(&self, player: PlayerId, destination: &Location) -> MineResult<()> {
        let mut players = self.players.write();
        let online = players
            .get_mut(&player)
            .ok_or_else(|| Self::teleport_failed(player, "player is offline"))?;
        online.location = destination.clone();
        debug!(player = player.0, world = %destination.world, "player teleported");
        Ok(())
    }

    fn teleport_named(&self, player: PlayerId, destination: &str) -> MineResult<Location> {
        let location = self
            .warps
            .read()
            .get(destination)
            .cloned()
            .ok_or_else(|| Self::teleport_failed(player, format!("unknown destination `{destination}`")))?;
        self.teleport_out(player, &location)?;
        Ok(location)
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        if let Some(online) = self.players.write().get_mut(&player) {
            online.inbox.push(message.to_string());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
