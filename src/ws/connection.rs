//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single subscribed client: answers
//! commands, drains the connection's snapshot queue, and pings on an
//! interval. Snapshots are checked against the last delivered sequence
//! right before sending, so a client never sees the leaderboard go back
//! in time.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use super::connection_manager::{ConnectionManager, LiveConnection};
use super::messages::{WsCommand, WsMessage};
use crate::domain::LeaderboardSnapshot;
use crate::service::ContestService;

type WsSink = SplitSink<WebSocket, Message>;

/// What the loop should do after handling a client frame.
enum Flow {
    Continue,
    Close,
}

/// Runs the read/write loop for one live connection until the client
/// leaves, unsubscribes, or the connection is evicted.
pub async fn run_connection(
    socket: WebSocket,
    connection: Arc<LiveConnection>,
    manager: ConnectionManager,
    service: Arc<ContestService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let settings = manager.settings().clone();

    if let Ok(current) = service.leaderboard_snapshot(connection.contest_id).await
        && !send_snapshot(&mut ws_tx, &connection, &current, settings.top_n, true).await
    {
        manager
            .unregister(connection.contest_id, connection.id)
            .await;
        return;
    }

    let mut ping = tokio::time::interval(settings.ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        connection.touch();
                        let flow = handle_text_message(
                            text.as_str(),
                            &mut ws_tx,
                            &connection,
                            &service,
                            settings.top_n,
                        )
                        .await;
                        if matches!(flow, Flow::Close) {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => connection.touch(),
                }
            }
            next = connection.queue().next() => {
                let Some(snapshot) = next else {
                    break;
                };
                if !send_snapshot(&mut ws_tx, &connection, &snapshot, settings.top_n, false).await {
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    manager
        .unregister(connection.contest_id, connection.id)
        .await;
    tracing::debug!(connection_id = %connection.id, "ws connection loop ended");
}

/// Sends `snapshot` if it is not older than what the client already has.
/// Returns `false` only when the socket is gone.
async fn send_snapshot(
    ws_tx: &mut WsSink,
    connection: &LiveConnection,
    snapshot: &LeaderboardSnapshot,
    top_n: usize,
    allow_repeat: bool,
) -> bool {
    if !connection.admit(snapshot.sequence, allow_repeat) {
        tracing::debug!(
            connection_id = %connection.id,
            sequence = snapshot.sequence,
            "discarded stale snapshot"
        );
        return true;
    }
    let view = snapshot.view(top_n, connection.viewer);
    let Some(json) = WsMessage::leaderboard(&view).to_json() else {
        return true;
    };
    ws_tx.send(Message::text(json)).await.is_ok()
}

async fn send_message(ws_tx: &mut WsSink, message: &WsMessage) -> bool {
    match message.to_json() {
        Some(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        None => true,
    }
}

/// Dispatches one client text frame.
async fn handle_text_message(
    text: &str,
    ws_tx: &mut WsSink,
    connection: &LiveConnection,
    service: &ContestService,
    top_n: usize,
) -> Flow {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        let err = WsMessage::error(String::new(), 400, "malformed JSON");
        return if send_message(ws_tx, &err).await {
            Flow::Continue
        } else {
            Flow::Close
        };
    };

    let sent = match msg.command() {
        Some(WsCommand::Ping) => {
            let pong = WsMessage::response(msg.id, serde_json::json!({ "command": "pong" }));
            send_message(ws_tx, &pong).await
        }
        Some(WsCommand::Status) => {
            match service.leaderboard_snapshot(connection.contest_id).await {
                Ok(current) => send_snapshot(ws_tx, connection, &current, top_n, true).await,
                Err(e) => {
                    let err = WsMessage::error(msg.id, e.error_code(), &e.to_string());
                    send_message(ws_tx, &err).await
                }
            }
        }
        Some(WsCommand::Unsubscribe) => {
            let done = WsMessage::response(
                msg.id,
                serde_json::json!({
                    "command": "unsubscribe",
                    "contest_id": connection.contest_id,
                }),
            );
            let _ = send_message(ws_tx, &done).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return Flow::Close;
        }
        None => {
            let err = WsMessage::error(msg.id, 404, "unknown command");
            send_message(ws_tx, &err).await
        }
    };

    if sent { Flow::Continue } else { Flow::Close }
}
