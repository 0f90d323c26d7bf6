//! Application state shared across routes

use crate::lobby::LobbyHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lobby: LobbyHandle,
}

impl AppState {
    pub fn new(lobby: LobbyHandle) -> Self {
        Self { lobby }
    }
}
