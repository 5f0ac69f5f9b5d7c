// ============================
// pointing-backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection lifecycle.
//!
//! Each connection moves through `Unjoined -> Joined(room_id)` and is torn
//! down on transport disconnect. Outbound traffic goes through a bounded
//! per-connection channel; a forwarding task serializes it onto the socket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use pointing_common::{ClientToServer, MemberId, ServerToClient};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{metrics as keys, AppState};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Outbound channel depth per connection. Snapshots for tens of members are
/// small; a subscriber this far behind is re-synced by the next broadcast.
const OUTBOUND_BUFFER: usize = 32;

/// Create the WebSocket router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rooms": state.rooms.room_count(),
    }))
}

/// Handler for WebSocket connections
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    counter!(keys::WS_CONNECTIONS).increment(1);
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    gauge!(keys::WS_ACTIVE).increment(1.0);

    // Transport-assigned ephemeral identity for this connection; doubles as
    // the participant id in whichever room it joins.
    let conn_id: MemberId = Uuid::new_v4();

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerToClient>(OUTBOUND_BUFFER);

    // Forward server events from the connection channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    debug!(error = %e, "failed to serialize server event");
                    continue;
                },
            };
            if socket_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Room this connection is currently a member of, if any
    let mut joined: Option<String> = None;

    while let Some(Ok(message)) = socket_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientToServer>(&text) {
                Ok(event) => {
                    dispatch(&state, conn_id, &tx, &mut joined, event).await;
                },
                Err(e) => {
                    // malformed requests fail to produce an effect, nothing more
                    debug!(conn_id = %conn_id, error = %e, "ignoring malformed client frame");
                },
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    // Transport-level disconnect: admin-clear and membership removal happen
    // in the room; the registry drops the room if it emptied.
    if let Some(room_id) = joined.take() {
        state.rooms.leave(&room_id, conn_id).await;
    }

    gauge!(keys::WS_ACTIVE).decrement(1.0);
    send_task.abort();
}

async fn dispatch(
    state: &Arc<AppState>,
    conn_id: MemberId,
    tx: &mpsc::Sender<ServerToClient>,
    joined: &mut Option<String>,
    event: ClientToServer,
) {
    match event {
        ClientToServer::JoinRoom {
            room_id,
            member_name,
            request_admin,
        } => {
            // one room per participant: switching rooms leaves the old one
            if let Some(previous) = joined.take() {
                state.rooms.leave(&previous, conn_id).await;
            }
            match state
                .rooms
                .join(&room_id, conn_id, &member_name, request_admin, tx.clone())
                .await
            {
                Ok(()) => *joined = Some(room_id),
                Err(e) => {
                    // only the failed joiner hears about this
                    let _ = tx
                        .send(ServerToClient::JoinError {
                            message: e.to_string(),
                        })
                        .await;
                },
            }
        },
        ClientToServer::Vote { room_id, vote } => {
            state.rooms.cast_vote(&room_id, conn_id, vote);
        },
        ClientToServer::Reveal { room_id } => {
            state.rooms.reveal(&room_id, conn_id);
        },
        ClientToServer::Reset { room_id } => {
            state.rooms.reset(&room_id, conn_id);
        },
        ClientToServer::ChangeVotingSystem { room_id, system } => {
            state.rooms.change_voting_system(&room_id, conn_id, system);
        },
        ClientToServer::RemoveMember { room_id, member_id } => {
            state.rooms.remove_member(&room_id, conn_id, member_id).await;
        },
    }
}
