//! WebSocket upgrade handler and per-connection pumps

use std::fmt::Display;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::lobby::{ConnHandle, ConnId, LobbyHandle};
use crate::ws::protocol::{Message, Outbound};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state.lobby))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, lobby: LobbyHandle) {
    let (ws_sink, ws_stream) = socket.split();
    serve_connection(lobby, ws_sink, ws_stream).await;
}

/// Register a connection and run its pumps until the reader stops
async fn serve_connection<W, R, E>(lobby: LobbyHandle, ws_sink: W, ws_stream: R)
where
    W: Sink<WsMessage> + Unpin + Send + 'static,
    W::Error: Display,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let (handle, pumps) = ConnHandle::pair();

    let conn_id = match lobby.register(handle).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "Failed to register connection");
            return;
        }
    };

    info!(conn_id = %conn_id, "New WebSocket connection");

    let writer_handle = tokio::spawn(write_pump(conn_id, ws_sink, pumps.outbound));

    read_pump(conn_id, ws_stream, pumps.inbound).await;

    // Inbound is closed by now; closing outbound too lets bridges and the
    // dispatcher see this connection as gone
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Writer pump: outbound -> WebSocket. A failed write drops that value only.
async fn write_pump<W>(conn_id: ConnId, mut ws_sink: W, mut outbound: mpsc::Receiver<Outbound>)
where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
{
    while let Some(value) = outbound.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &value).await {
            warn!(conn_id = %conn_id, error = %e, "Failed to write outbound message");
        }
    }
    debug!(conn_id = %conn_id, "Outbound channel closed");
}

/// Reader pump: WebSocket -> inbound. Any read or parse failure ends this
/// connection; dropping `inbound` on return is the disconnect signal.
async fn read_pump<R, E>(conn_id: ConnId, mut ws_stream: R, inbound: mpsc::Sender<Message>)
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    while let Some(result) = ws_stream.next().await {
        let parsed = match result {
            Ok(WsMessage::Text(text)) => serde_json::from_str::<Message>(&text),
            Ok(WsMessage::Binary(bytes)) => serde_json::from_slice::<Message>(&bytes),
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(WsMessage::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket read error");
                break;
            }
        };

        match parsed {
            Ok(msg) => {
                if inbound.send(msg).await.is_err() {
                    debug!(conn_id = %conn_id, "Inbound channel closed");
                    break;
                }
            }
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                break;
            }
        }
    }
}

/// Send a value over WebSocket
async fn send_msg<W>(sink: &mut W, value: &Outbound) -> Result<(), String>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
{
    let json = serde_json::to_string(value).map_err(|e| e.to_string())?;
    sink.send(WsMessage::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use futures::stream;
    use tokio::time::timeout;

    use crate::game::{BotRoster, Duel};
    use crate::lobby::handle::LobbySnapshot;
    use crate::lobby::Dispatcher;

    const WAIT: Duration = Duration::from_secs(2);

    type Frame = Result<WsMessage, String>;

    fn text(json: &str) -> Frame {
        Ok(WsMessage::Text(json.to_string()))
    }

    /// Sink that fails its first `failures` writes, then records text frames
    struct FlakySink {
        failures: usize,
        written: mpsc::UnboundedSender<String>,
    }

    impl Sink<WsMessage> for FlakySink {
        type Error = String;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: WsMessage) -> Result<(), String> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err("broken pipe".to_string());
            }
            if let WsMessage::Text(text) = item {
                let _ = self.written.send(text);
            }
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), String>> {
            Poll::Ready(Ok(()))
        }
    }

    fn flaky_sink(failures: usize) -> (FlakySink, mpsc::UnboundedReceiver<String>) {
        let (written, rx) = mpsc::unbounded_channel();
        (FlakySink { failures, written }, rx)
    }

    async fn collect_inbound(frames: Vec<Frame>) -> Vec<Message> {
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        read_pump(ConnId(1), stream::iter(frames), inbound_tx).await;

        let mut received = Vec::new();
        while let Some(msg) = inbound_rx.recv().await {
            received.push(msg);
        }
        received
    }

    #[tokio::test]
    async fn test_reader_skips_ping_and_pong() {
        let received = collect_inbound(vec![
            Ok(WsMessage::Ping(vec![1])),
            Ok(WsMessage::Pong(vec![2])),
            text(r#"{"username":"amy","message":"hi","command":""}"#),
        ])
        .await;

        assert_eq!(received, vec![Message::chat("amy", "hi")]);
    }

    #[tokio::test]
    async fn test_reader_stops_at_malformed_frame() {
        let received = collect_inbound(vec![
            text(r#"{"username":"amy","message":"one","command":""}"#),
            text("{not json"),
            text(r#"{"username":"amy","message":"two","command":""}"#),
        ])
        .await;

        assert_eq!(received, vec![Message::chat("amy", "one")]);
    }

    #[tokio::test]
    async fn test_reader_stops_at_read_error() {
        let received = collect_inbound(vec![
            Err("connection reset".to_string()),
            text(r#"{"username":"amy","message":"late","command":""}"#),
        ])
        .await;

        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_writer_keeps_going_after_failed_write() {
        let (sink, mut written) = flaky_sink(1);
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(4);

        outbound_tx
            .send(Message::chat("amy", "lost").into())
            .await
            .unwrap();
        outbound_tx
            .send(Message::chat("amy", "kept").into())
            .await
            .unwrap();
        drop(outbound_tx);

        write_pump(ConnId(1), sink, outbound_rx).await;

        let json = written.recv().await.unwrap();
        let msg: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, Message::chat("amy", "kept"));
        assert!(written.recv().await.is_none());
    }

    async fn wait_for_connections(lobby: &LobbyHandle, count: usize) -> LobbySnapshot {
        timeout(WAIT, async {
            loop {
                let snap = lobby.snapshot().await.unwrap();
                if snap.connections() == count {
                    return snap;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("lobby never reached the expected connection count")
    }

    #[tokio::test]
    async fn test_malformed_frame_disconnects_only_that_client() {
        let (dispatcher, lobby) = Dispatcher::new(Arc::new(Duel::new(100)), BotRoster::builtin());
        tokio::spawn(dispatcher.run());

        // A client that stays connected and watches for chat
        let (watcher_sink, mut watcher_written) = flaky_sink(0);
        tokio::spawn(serve_connection(
            lobby.clone(),
            watcher_sink,
            stream::pending::<Frame>(),
        ));
        wait_for_connections(&lobby, 1).await;

        // A client whose third frame would be chat, after a malformed frame
        let (broken_sink, _broken_written) = flaky_sink(0);
        let frames = stream::iter(vec![
            text(r#"{"username":"amy","message":"","command":"SETNAME"}"#),
            text("{not json"),
            text(r#"{"username":"amy","message":"never","command":""}"#),
        ]);
        timeout(WAIT, serve_connection(lobby.clone(), broken_sink, frames))
            .await
            .expect("reader should stop at the malformed frame");

        // Registration already happened, so one connection left means a departure
        let snap = wait_for_connections(&lobby, 1).await;

        // The remaining user is the watcher, and no chat was broadcast
        assert_eq!(snap.users[0].conn_id, ConnId(1));
        assert_eq!(snap.users[0].name, "");
        assert!(watcher_written.try_recv().is_err());
    }
}
