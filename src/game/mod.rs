//! Battle engine seam, the bundled duel engine, bots and update bridges

pub mod bots;
pub mod bridge;
pub mod duel;

pub use bots::{spawn_bot, BotRoster};
pub use bridge::forward_updates;
pub use duel::Duel;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::util::rendezvous;
use crate::ws::protocol::{Message, Update};

/// A battle simulation. Implementations spawn their own task and must stop
/// once both seats stop listening for updates.
pub trait BattleEngine: Send + Sync {
    fn start(&self, match_id: Uuid, left: Seat, right: Seat);
}

/// Engine end of one participant's channels
#[derive(Debug)]
pub struct Seat {
    pub name: String,
    pub input: mpsc::Receiver<Message>,
    pub updates: mpsc::Sender<Update>,
}

/// Participant end of a seat: where inputs go in and updates come out
#[derive(Debug)]
pub struct SeatPeer {
    pub input: mpsc::Sender<Message>,
    pub updates: mpsc::Receiver<Update>,
}

impl Seat {
    pub fn open(name: impl Into<String>) -> (Seat, SeatPeer) {
        let (input_tx, input_rx) = rendezvous();
        let (update_tx, update_rx) = rendezvous();

        let seat = Seat {
            name: name.into(),
            input: input_rx,
            updates: update_tx,
        };
        let peer = SeatPeer {
            input: input_tx,
            updates: update_rx,
        };

        (seat, peer)
    }
}

/// Per-turn action understood by the duel engine. Carried in `command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Attack,
    Defend,
    Heal,
    Pass,
}

impl Action {
    pub fn from_message(msg: &Message) -> Self {
        match msg.command.as_str() {
            "ATTACK" => Self::Attack,
            "DEFEND" => Self::Defend,
            "HEAL" => Self::Heal,
            _ => Self::Pass,
        }
    }

    pub fn as_command(self) -> &'static str {
        match self {
            Self::Attack => "ATTACK",
            Self::Defend => "DEFEND",
            Self::Heal => "HEAL",
            Self::Pass => "PASS",
        }
    }

    pub fn into_message(self, username: &str) -> Message {
        Message {
            username: username.to_string(),
            content: String::new(),
            command: self.as_command().to_string(),
        }
    }
}
