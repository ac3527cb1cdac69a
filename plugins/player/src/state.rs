//! Managed plugin state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use murmur_audio::Player;

use crate::error::{PlayerError, Result};

/// Holds the player, or the reason it could not be opened.
pub struct PlayerState {
    player: Mutex<Option<Player>>,
    unavailable_reason: Mutex<Option<String>>,
}

impl PlayerState {
    pub fn new(player: Player) -> Self {
        Self {
            player: Mutex::new(Some(player)),
            unavailable_reason: Mutex::new(None),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            player: Mutex::new(None),
            unavailable_reason: Mutex::new(Some(reason.into())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Player>> {
        self.player.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the player.
    pub fn with_player<T>(&self, f: impl FnOnce(&Player) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        match guard.as_ref() {
            Some(player) => f(player),
            None => Err(PlayerError::Unavailable(self.reason())),
        }
    }

    fn reason(&self) -> String {
        self.unavailable_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "player shut down".to_string())
    }

    /// Drop the player; an open session still gets its finished event.
    pub fn shutdown(&self) {
        if let Some(player) = self.lock().take() {
            tracing::info!("shutting down player");
            drop(player);
        }
    }
}
