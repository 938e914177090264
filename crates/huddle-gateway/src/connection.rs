use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use huddle_types::events::ClientCommand;
use huddle_types::models::Identity;

use crate::coordinator::CoordinatorHandle;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Characters of a bad frame echoed into the log.
const EXCERPT_CHARS: usize = 200;

/// Drive one authenticated WebSocket until either side goes away.
///
/// The identity was established at the HTTP upgrade. The connection is
/// admitted through the coordinator, which sends the history snapshot to its
/// outbox before anything else can.
pub async fn handle_connection(socket: WebSocket, coordinator: CoordinatorHandle, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let connection_id = match coordinator.connect(identity.clone(), outbox).await {
        Ok(id) => id,
        Err(e) => {
            warn!("{} could not join: {}", identity, e);
            let _ = sender.close().await;
            return;
        }
    };

    info!("{} connected to gateway as {}", identity, connection_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Outbox -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = inbox.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&*event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode outbound event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Client -> coordinator
    let recv_coordinator = coordinator.clone();
    let who = identity.to_string();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(cmd) => {
                        debug!("{} -> {}", who, cmd.name());
                        if recv_coordinator.dispatch(connection_id, cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("{} bad command: {} -- raw: {}", who, e, excerpt(text.as_str()));
                        recv_coordinator
                            .reject(connection_id, format!("malformed command: {e}"))
                            .await;
                    }
                },
                Message::Binary(data) => {
                    warn!("{} sent a {} byte binary frame", who, data.len());
                    recv_coordinator
                        .reject(connection_id, "binary frames are not supported".into())
                        .await;
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    coordinator.disconnect(connection_id).await;
    info!("{} disconnected from gateway", identity);
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short"), "short");
        let long = "é".repeat(300);
        assert_eq!(excerpt(&long).chars().count(), EXCERPT_CHARS);
    }
}
