//! Channel handles connecting the gateway to the dispatcher

use std::fmt;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::util::rendezvous;
use crate::ws::protocol::{Message, Outbound};

/// Identity of one live connection, issued by the dispatcher at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dispatcher end of a connection
#[derive(Debug)]
pub struct ConnHandle {
    pub inbound: mpsc::Receiver<Message>,
    pub outbound: mpsc::Sender<Outbound>,
}

/// Gateway end of a connection, driven by the reader and writer pumps.
/// Dropping `inbound` is how the dispatcher learns the connection is gone.
#[derive(Debug)]
pub struct ConnPumps {
    pub inbound: mpsc::Sender<Message>,
    pub outbound: mpsc::Receiver<Outbound>,
}

impl ConnHandle {
    pub fn pair() -> (ConnHandle, ConnPumps) {
        let (inbound_tx, inbound_rx) = rendezvous();
        let (outbound_tx, outbound_rx) = rendezvous();

        (
            ConnHandle {
                inbound: inbound_rx,
                outbound: outbound_tx,
            },
            ConnPumps {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }
}

/// An inbound message tagged with the user that sent it
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub message: Message,
    pub user: ConnId,
}

/// Merged per-connection traffic. Messages and the departure notice share one
/// channel so a connection's last messages always precede its departure.
#[derive(Debug)]
pub(crate) enum LobbyEvent {
    Message(MessageEnvelope),
    Left(ConnId),
}

pub(crate) enum Control {
    Register(ConnHandle, oneshot::Sender<ConnId>),
    Snapshot(oneshot::Sender<LobbySnapshot>),
}

/// Point-in-time view of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub conn_id: ConnId,
    pub name: String,
    pub ready: bool,
    pub in_game: bool,
}

/// Point-in-time view of the lobby, copied out of the dispatcher
#[derive(Debug, Clone, Default, Serialize)]
pub struct LobbySnapshot {
    pub users: Vec<UserView>,
}

impl LobbySnapshot {
    pub fn connections(&self) -> usize {
        self.users.len()
    }

    pub fn ready(&self) -> usize {
        self.users.iter().filter(|u| u.ready && !u.in_game).count()
    }

    pub fn in_game(&self) -> usize {
        self.users.iter().filter(|u| u.in_game).count()
    }

    pub fn user(&self, conn_id: ConnId) -> Option<&UserView> {
        self.users.iter().find(|u| u.conn_id == conn_id)
    }
}

/// Lobby errors
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Dispatcher is no longer running")]
    DispatcherClosed,
}

/// Cloneable handle for talking to the dispatcher
#[derive(Clone)]
pub struct LobbyHandle {
    control: mpsc::Sender<Control>,
}

impl LobbyHandle {
    pub(crate) fn new(control: mpsc::Sender<Control>) -> Self {
        Self { control }
    }

    /// Hand a new connection to the dispatcher. Waits until it has been
    /// accepted, which back-pressures new connections when the lobby is busy.
    pub async fn register(&self, handle: ConnHandle) -> Result<ConnId, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(Control::Register(handle, reply_tx))
            .await
            .map_err(|_| LobbyError::DispatcherClosed)?;
        reply_rx.await.map_err(|_| LobbyError::DispatcherClosed)
    }

    pub async fn snapshot(&self) -> Result<LobbySnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(Control::Snapshot(reply_tx))
            .await
            .map_err(|_| LobbyError::DispatcherClosed)?;
        reply_rx.await.map_err(|_| LobbyError::DispatcherClosed)
    }
}
