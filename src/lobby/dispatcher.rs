//! The dispatcher: sole owner of every connection and user
//!
//! All lobby state lives inside one task. Connection tasks only ever talk to
//! it through channels, so none of this state needs a lock. Keep it that way:
//! handling events concurrently would need explicit synchronization.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{spawn_bot, BattleEngine, BotRoster, Seat};
use crate::matchmaking;
use crate::util::rendezvous;
use crate::ws::protocol::{Command, Message, Outbound};

use super::handle::{
    ConnHandle, ConnId, Control, LobbyEvent, LobbyHandle, LobbySnapshot, MessageEnvelope,
};
use super::user::{Connection, LobbyState};

pub struct Dispatcher {
    connections: BTreeMap<ConnId, Connection>,
    next_id: u64,
    control_rx: mpsc::Receiver<Control>,
    events_tx: mpsc::Sender<LobbyEvent>,
    events_rx: mpsc::Receiver<LobbyEvent>,
    engine: Arc<dyn BattleEngine>,
    bots: BotRoster,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn BattleEngine>, bots: BotRoster) -> (Self, LobbyHandle) {
        let (control_tx, control_rx) = rendezvous();
        let (events_tx, events_rx) = rendezvous();

        let dispatcher = Self {
            connections: BTreeMap::new(),
            next_id: 1,
            control_rx,
            events_tx,
            events_rx,
            engine,
            bots,
        };

        (dispatcher, LobbyHandle::new(control_tx))
    }

    /// Run until every [`LobbyHandle`] has been dropped
    pub async fn run(mut self) {
        info!("Dispatcher started");

        loop {
            tokio::select! {
                control = self.control_rx.recv() => match control {
                    Some(Control::Register(handle, reply)) => {
                        let id = self.register(handle);
                        let _ = reply.send(id);
                    }
                    Some(Control::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => match event {
                    LobbyEvent::Message(envelope) => self.handle_message(envelope).await,
                    LobbyEvent::Left(id) => self.deregister(id),
                },
            }
        }

        info!(connections = self.connections.len(), "Dispatcher stopped");
    }

    fn register(&mut self, handle: ConnHandle) -> ConnId {
        let id = ConnId(self.next_id);
        self.next_id += 1;

        let ConnHandle { inbound, outbound } = handle;
        self.connections.insert(id, Connection::new(outbound));
        tokio::spawn(tag_inbound(id, inbound, self.events_tx.clone()));

        info!(conn_id = %id, connections = self.connections.len(), "Connection registered");
        id
    }

    fn deregister(&mut self, id: ConnId) {
        if self.connections.remove(&id).is_some() {
            info!(conn_id = %id, connections = self.connections.len(), "Connection left");
        }
    }

    fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            users: self
                .connections
                .iter()
                .map(|(id, conn)| conn.view(*id))
                .collect(),
        }
    }

    async fn handle_message(&mut self, envelope: MessageEnvelope) {
        let MessageEnvelope { message, user: id } = envelope;

        let Some(conn) = self.connections.get_mut(&id) else {
            debug!(conn_id = %id, "Message from unknown connection");
            return;
        };

        // Everything from a player in a game belongs to the battle
        if conn.user.state() == LobbyState::InGame {
            if message.parsed_command() == Some(Command::EndMatch) {
                conn.user.leave_battle();
                debug!(conn_id = %id, "Match ended, back in lobby");
                return;
            }
            match &conn.user.battle_input {
                Some(input) => {
                    if input.send(message).await.is_err() {
                        debug!(conn_id = %id, "Battle is over, input dropped");
                    }
                }
                None => warn!(conn_id = %id, "In game without a battle input"),
            }
            return;
        }

        match message.parsed_command() {
            None => self.broadcast(message).await,
            Some(Command::Ready) => {
                conn.user.ready = true;
                let pairing =
                    matchmaking::evaluate(&mut self.connections, self.engine.as_ref()).await;
                if let Some(pairing) = pairing {
                    info!(
                        match_id = %pairing.match_id,
                        left = %pairing.left,
                        right = %pairing.right,
                        "Matched ready users"
                    );
                }
            }
            Some(Command::Unready) => conn.user.ready = false,
            Some(Command::SetName) => conn.user.name = message.username,
            Some(Command::BotMatch) => self.start_bot_match(id, message.content).await,
            Some(command) => {
                warn!(
                    conn_id = %id,
                    username = %message.username,
                    command = command.as_str(),
                    "Unexpected command message"
                );
            }
        }
    }

    /// Chat goes to everyone, sender included
    async fn broadcast(&self, message: Message) {
        for (id, conn) in &self.connections {
            if conn
                .outbound
                .send(Outbound::Message(message.clone()))
                .await
                .is_err()
            {
                debug!(conn_id = %id, "Outbound closed, chat not delivered");
            }
        }
    }

    async fn start_bot_match(&mut self, id: ConnId, bot_name: String) {
        let Some(bot) = self.bots.get(&bot_name) else {
            warn!(conn_id = %id, bot = %bot_name, "Unrecognized bot");
            return;
        };
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };

        if conn
            .outbound
            .send(Message::start_game(bot_name).into())
            .await
            .is_err()
        {
            warn!(conn_id = %id, "Failed to send START GAME, connection closing");
        }

        let match_id = Uuid::new_v4();
        let seat = conn.enter_battle(id, match_id);
        let (bot_seat, bot_peer) = Seat::open(bot.name());
        spawn_bot(bot.clone(), bot_peer);
        self.engine.start(match_id, seat, bot_seat);

        info!(conn_id = %id, match_id = %match_id, bot = bot.name(), "Bot match started");
    }
}

/// Tag a connection's inbound messages with its id and feed them into the
/// dispatcher's merged stream. Announces the departure once inbound closes.
async fn tag_inbound(
    id: ConnId,
    mut inbound: mpsc::Receiver<Message>,
    events: mpsc::Sender<LobbyEvent>,
) {
    while let Some(message) = inbound.recv().await {
        let envelope = MessageEnvelope { message, user: id };
        if events.send(LobbyEvent::Message(envelope)).await.is_err() {
            return;
        }
    }
    let _ = events.send(LobbyEvent::Left(id)).await;
}
