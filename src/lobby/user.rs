//! Lobby-side user state (owned by the dispatcher)

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::game::{forward_updates, Seat};
use crate::ws::protocol::{Message, Outbound};

use super::handle::{ConnId, UserView};

/// Where a user stands in the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Unready,
    Ready,
    InGame,
}

/// A connected player from the lobby's point of view
#[derive(Debug, Default)]
pub struct User {
    pub name: String,
    pub ready: bool,
    pub in_game: bool,
    /// Input of the current battle, set while in game
    pub battle_input: Option<mpsc::Sender<Message>>,
}

impl User {
    pub fn state(&self) -> LobbyState {
        if self.in_game {
            LobbyState::InGame
        } else if self.ready {
            LobbyState::Ready
        } else {
            LobbyState::Unready
        }
    }

    /// Back to the lobby. Dropping the battle input tells the engine this
    /// side is done.
    pub fn leave_battle(&mut self) {
        self.in_game = false;
        self.battle_input = None;
    }
}

/// One registered connection and its user
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::Sender<Outbound>,
    pub user: User,
}

impl Connection {
    pub fn new(outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            outbound,
            user: User::default(),
        }
    }

    /// Move the user into a battle: flags flip, a fresh seat is opened and a
    /// bridge starts relaying its updates to this connection. Returns the
    /// engine end of the seat.
    pub fn enter_battle(&mut self, conn_id: ConnId, match_id: Uuid) -> Seat {
        let (seat, peer) = Seat::open(self.user.name.clone());

        self.user.ready = false;
        self.user.in_game = true;
        self.user.battle_input = Some(peer.input);

        let dest = self.outbound.clone();
        tokio::spawn(async move {
            let exit = forward_updates(conn_id, dest, peer.updates).await;
            info!(conn_id = %conn_id, match_id = %match_id, exit = ?exit, "Bridge finished");
        });

        seat
    }

    pub fn view(&self, conn_id: ConnId) -> UserView {
        UserView {
            conn_id,
            name: self.user.name.clone(),
            ready: self.user.ready,
            in_game: self.user.in_game,
        }
    }
}
