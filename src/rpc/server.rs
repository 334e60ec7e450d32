//! WebSocket transport for the JSON-RPC interface (C10).
//!
//! Grounded on the teacher's `web/ws.rs` reader/writer split: one task reads
//! client frames and feeds them to the [`Dispatcher`], a `tokio::select!`
//! loop also drains this connection's [`EventFanout`] queue and forwards a
//! 30s heartbeat, all multiplexed over a single socket split.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher::{ConnectionContext, Dispatcher};
use super::types::JsonRpcNotification;
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Client control frame, distinguished from a JSON-RPC request by the
/// absence of a `jsonrpc` field. Manages this connection's event
/// subscription set (spec §3: "Client Connection... owned by C10").
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
enum ControlMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topics: Vec<String> },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topics: Vec<String> },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let client_id = Uuid::new_v4().to_string();
    let ctx = ConnectionContext::new(client_id.clone());
    let dispatcher = Dispatcher::new(Arc::clone(&state));
    let fanout_id = state.events.register(Vec::new());
    state.metrics.connection_opened();

    info!(client_id = %client_id, "client connected");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let started = Instant::now();
                        if let Some(subscription) = try_control_message(&text) {
                            apply_subscription(&state, fanout_id, subscription);
                            continue;
                        }
                        if let Some(response) = dispatcher.handle(&ctx, &text).await {
                            let failed = response.error.is_some();
                            state.metrics.record_request(started.elapsed(), failed);
                            let Ok(json) = serde_json::to_string(&response) else { continue };
                            if sender.send(Message::Text(json)).await.is_err() {
                                warn!(client_id = %client_id, "failed to send response, disconnecting");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => debug!(client_id = %client_id, "received ping"),
                    Some(Ok(Message::Pong(_))) => debug!(client_id = %client_id, "received pong"),
                    Some(Ok(Message::Close(_))) | None => {
                        info!(client_id = %client_id, "client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(client_id = %client_id, error = %e, "websocket receive error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = state.events.wait_for_next(fanout_id) => {
                while let Some(envelope) = state.events.try_next(fanout_id) {
                    let notification = JsonRpcNotification {
                        jsonrpc: "2.0",
                        method: envelope.event.event_name().to_string(),
                        params: serde_json::to_value(&envelope).unwrap_or(serde_json::Value::Null),
                    };
                    let Ok(json) = serde_json::to_string(&notification) else { continue };
                    if sender.send(Message::Text(json)).await.is_err() {
                        warn!(client_id = %client_id, "failed to forward event, disconnecting");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!(client_id = %client_id, "failed to send heartbeat ping, disconnecting");
                    break;
                }
            }
        }
    }

    state.events.disconnect(fanout_id);
    state.metrics.connection_closed();
    info!(client_id = %client_id, "connection handler exiting");
}

fn try_control_message(text: &str) -> Option<ControlMessage> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if value.get("jsonrpc").is_some() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn apply_subscription(state: &AppState, fanout_id: Uuid, message: ControlMessage) {
    match message {
        ControlMessage::Subscribe { topics } => {
            let mut current = state.events.subscriptions(fanout_id);
            for topic in topics {
                if !current.contains(&topic) {
                    current.push(topic);
                }
            }
            state.events.set_subscriptions(fanout_id, current);
        }
        ControlMessage::Unsubscribe { topics } => {
            let mut current = state.events.subscriptions(fanout_id);
            current.retain(|t| !topics.contains(t));
            state.events.set_subscriptions(fanout_id, current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonrpc_frames_are_not_mistaken_for_control_messages() {
        let text = r#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
        assert!(try_control_message(text).is_none());
    }

    #[test]
    fn subscribe_frames_parse_as_control_messages() {
        let text = r#"{"type":"subscribe","payload":{"topics":["device.*"]}}"#;
        assert!(matches!(try_control_message(text), Some(ControlMessage::Subscribe { .. })));
    }
}
