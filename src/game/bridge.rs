//! Relays battle updates from the engine to one connection's outbound sink

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::lobby::ConnId;
use crate::ws::protocol::{Outbound, Update};

/// Why a bridge stopped forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// A terminal update was delivered
    Terminal,
    /// The connection went away; remaining updates were discarded
    SinkClosed,
    /// The engine stopped producing before the battle was decided
    SourceClosed,
}

/// Forward updates to `dest` until a terminal update has been delivered or the
/// destination closes. Dropping `src` on return is what tells the engine this
/// seat has stopped listening.
pub async fn forward_updates(
    conn_id: ConnId,
    dest: mpsc::Sender<Outbound>,
    mut src: mpsc::Receiver<Update>,
) -> BridgeExit {
    while let Some(update) = src.recv().await {
        let terminal = update.is_terminal();

        if dest.send(Outbound::Update(update)).await.is_err() {
            warn!(conn_id = %conn_id, "Outbound closed mid-battle, dropping remaining updates");
            return BridgeExit::SinkClosed;
        }

        if terminal {
            debug!(conn_id = %conn_id, "Terminal update delivered");
            return BridgeExit::Terminal;
        }
    }

    debug!(conn_id = %conn_id, "Update source closed");
    BridgeExit::SourceClosed
}
