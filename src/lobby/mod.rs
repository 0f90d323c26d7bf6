//! Lobby: connection registry, user state and the dispatcher loop

pub mod dispatcher;
pub mod handle;
pub mod user;

pub use dispatcher::Dispatcher;
pub use handle::{ConnHandle, ConnId, LobbyHandle};
pub use user::{Connection, LobbyState, User};
