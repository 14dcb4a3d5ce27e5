// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-server WebSocket.
//!
//! A user token is validated against the control plane before the
//! upgrade. After that the socket is a bridge: instance events flow
//! out as `{event, args}` frames, and the three inbound events map to
//! power actions, log replay, and console commands. Socket writes are
//! serialized so concurrent pushes never interleave frames.

use super::{ApiError, AppState};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use quay_adapters::ContainerRuntime;
use quay_core::{Event, PowerAction, Topic};
use quay_engine::Server;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One frame, either direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Frame {
    pub fn from_event(event: &Event) -> Self {
        let arg = match &event.data {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self { event: event.topic.wire_name().to_string(), args: vec![arg] }
    }
}

#[derive(Deserialize)]
pub(super) struct TokenQuery {
    token: String,
}

pub(super) async fn upgrade<R: ContainerRuntime>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let server = state.server(&id)?;

    // a non-204 from the control plane rejects the upgrade
    state
        .remote
        .validate_websocket_token(&query.token, &id)
        .await
        .map_err(|err| {
            tracing::debug!(server = %id, %err, "websocket token rejected");
            ApiError::Unauthorized
        })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, server)))
}

async fn handle_socket<R: ContainerRuntime>(socket: WebSocket, server: Server<R>) {
    let (sink, mut inbound) = socket.split();
    let sink = Arc::new(Mutex::new(sink));

    let (subscription, mut events) = server.events().subscribe(&Topic::ALL);

    // seed the client with the current state
    send_frame(&sink, &Frame::from_event(&Event::status(server.state()))).await;

    let writer = {
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !send_frame(&sink, &Frame::from_event(&event)).await {
                    break;
                }
            }
        })
    };

    while let Some(message) = inbound.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let Ok(frame) = serde_json::from_str::<Frame>(&text) else {
            continue;
        };
        handle_inbound(&server, &sink, frame).await;
    }

    writer.abort();
    subscription.unsubscribe();
}

async fn handle_inbound<R: ContainerRuntime>(
    server: &Server<R>,
    sink: &Arc<Mutex<futures_util::stream::SplitSink<WebSocket, Message>>>,
    frame: Frame,
) {
    match frame.event.as_str() {
        "set state" => {
            let Some(action) = frame.args.first().and_then(|a| PowerAction::parse(a)) else {
                return;
            };
            let server = server.clone();
            tokio::spawn(async move {
                if let Err(err) = server
                    .handle_power_action(action, Some(Duration::from_secs(30)))
                    .await
                {
                    server
                        .events()
                        .publish(Event::daemon_message(format!(
                            "Power action failed: {err}"
                        )))
                        .await;
                }
            });
        }
        "send logs" => {
            match server.read_log(100).await {
                Ok(lines) => {
                    for line in lines {
                        let frame = Frame {
                            event: Topic::Console.wire_name().to_string(),
                            args: vec![line],
                        };
                        if !send_frame(sink, &frame).await {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(server = %server.id(), %err, "log replay failed");
                }
            };
        }
        "send command" => {
            if let Some(command) = frame.args.first() {
                if let Err(err) = server.send_command(command).await {
                    tracing::debug!(server = %server.id(), %err, "command rejected");
                }
            }
        }
        _ => {}
    }
}

async fn send_frame(
    sink: &Arc<Mutex<futures_util::stream::SplitSink<WebSocket, Message>>>,
    frame: &Frame,
) -> bool {
    let Ok(text) = serde_json::to_string(frame) else {
        return true;
    };
    sink.lock().await.send(Message::Text(text)).await.is_ok()
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
