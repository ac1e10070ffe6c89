use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{auth::SessionAuthenticator, config::Config, AppResult, AppState};

use super::{
    event::{ClientEvent, ServerEvent},
    fanout::Broadcaster,
    registry::{Connection, ConnectionRegistry},
};

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

/// Upgrades to a realtime connection. A `token` binds the connection to an identity.
#[debug_handler(state = AppState)]
pub(crate) async fn realtime_ws(
    Query(WsQuery { token }): Query<WsQuery>,
    State(auth): State<SessionAuthenticator>,
    State(registry): State<Arc<ConnectionRegistry>>,
    State(broadcaster): State<Broadcaster>,
    State(config): State<Arc<Config>>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let identity = match token.as_deref() {
        Some(token) => Some(auth.verify(token)?),
        None => None,
    };
    let idle_timeout = config.ws_idle_timeout;

    Ok(ws.on_upgrade(move |socket| {
        run_connection(socket, identity, registry, broadcaster, idle_timeout)
    }))
}

async fn run_connection(
    socket: WebSocket,
    identity: Option<String>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    idle_timeout: Duration,
) {
    let (conn, mut rx) = Connection::new(identity);
    registry.register(conn.clone()).await;
    let sessions = match conn.identity() {
        Some(identity) => registry.identity_connections(identity).await.len(),
        None => 0,
    };
    info!(conn_id = %conn.id, identity = ?conn.identity(), sessions, "connected");

    let (mut sender, mut receiver) = socket.split();
    let ping_every = (idle_timeout / 2).max(Duration::from_secs(1));

    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_every);
        ping.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(WsMessage::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        let frame = match tokio::time::timeout(idle_timeout, receiver.next()).await {
            Err(_) => {
                debug!(conn_id = %conn.id, "idle timeout");
                break;
            }
            Ok(None) | Ok(Some(Err(_))) => break,
            Ok(Some(Ok(frame))) => frame,
        };

        let parsed = match frame {
            WsMessage::Text(text) => serde_json::from_str::<ClientEvent>(text.as_str()),
            WsMessage::Binary(data) => serde_json::from_slice::<ClientEvent>(&data),
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
        };

        match parsed {
            Ok(ClientEvent::SendMessage(payload)) => {
                if let Err(err) = broadcaster.handle_send(conn.identity(), payload).await {
                    debug!(conn_id = %conn.id, error = %err, "send rejected");
                    conn.send_event(&ServerEvent::error(&err));
                }
            }
            Err(err) => {
                debug!(conn_id = %conn.id, error = %err, "malformed frame");
                conn.send_event(&ServerEvent::Error {
                    kind: "validation".to_owned(),
                    message: format!("malformed frame: {err}"),
                });
            }
        }
    }

    registry.unregister(conn.id).await;
    writer.abort();
    info!(conn_id = %conn.id, dropped = conn.drop_count(), "disconnected");
}
