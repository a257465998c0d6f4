//! Relay server core: shared state, WebSocket handler, session lifecycle,
//! and room fan-out.
//!
//! The relay accepts WebSocket connections, assigns each one a `SessionId`,
//! and tracks which room each session has joined. Every message from a
//! joined session is fanned out to the current members of its room,
//! including the sender. There is no persistence and no delivery guarantee
//! beyond best-effort at-most-once.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use roomcast_proto::event::{self, ClientEvent, ServerEvent};
use roomcast_proto::room::RoomId;
use roomcast_proto::session::SessionId;
use tokio::sync::{RwLock, mpsc};

use crate::rooms::RoomRegistry;

/// Default maximum allowed payload size in bytes (64 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Shared relay state holding the connection registry and room membership.
pub struct RelayState {
    /// Maps `SessionId` to a channel sender for delivering WebSocket messages.
    connections: RwLock<HashMap<SessionId, mpsc::UnboundedSender<Message>>>,
    /// Authoritative room membership.
    pub rooms: RoomRegistry,
    /// Maximum allowed payload size in bytes.
    max_payload_size: usize,
    /// Where `GET /` requests are redirected, if configured.
    root_redirect: Option<String>,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates a new relay state with no connections and no rooms, using
    /// the default payload size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RoomRegistry::new(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            root_redirect: None,
        }
    }

    /// Creates a new relay state with a custom payload size limit and
    /// optional root redirect target.
    #[must_use]
    pub fn with_config(max_payload_size: usize, root_redirect: Option<String>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RoomRegistry::new(),
            max_payload_size,
            root_redirect,
        }
    }

    /// Registers a session, storing the sender half of its message channel.
    pub async fn register(&self, session_id: SessionId, sender: mpsc::UnboundedSender<Message>) {
        let mut conns = self.connections.write().await;
        conns.insert(session_id, sender);
    }

    /// Removes a session from the registry, returning the sender if it
    /// existed. Dropping the returned sender closes the session's channel,
    /// discarding any deliveries queued but not yet flushed.
    pub async fn unregister(&self, session_id: SessionId) -> Option<mpsc::UnboundedSender<Message>> {
        let mut conns = self.connections.write().await;
        conns.remove(&session_id)
    }

    /// Returns a clone of the sender for the given session, if connected.
    pub async fn get_sender(&self, session_id: SessionId) -> Option<mpsc::UnboundedSender<Message>> {
        let conns = self.connections.read().await;
        conns.get(&session_id).cloned()
    }

    /// Send a WebSocket Close frame to all connected sessions.
    ///
    /// Causes each session's writer task to emit a close frame, which the
    /// client-side reader detects as disconnection. Used for graceful
    /// shutdown and testing.
    pub async fn close_all_connections(&self) {
        let conns = self.connections.read().await;
        for (session_id, sender) in conns.iter() {
            tracing::info!(session_id = %session_id, "sending close frame to session");
            let _ = sender.send(Message::Close(None));
        }
    }

    /// Fans a server event out to every current member of `room_id`.
    ///
    /// Membership is snapshotted at delivery time: a session that leaves
    /// mid-broadcast may or may not receive this message, but one that has
    /// completed disconnect never will (its channel is gone). A failed push
    /// to one member is logged and never aborts delivery to the rest.
    pub async fn broadcast(&self, room_id: &RoomId, event: &ServerEvent) {
        let encoded = match event::encode_server(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast event");
                return;
            }
        };

        let members = self.rooms.members_of(room_id).await;
        tracing::debug!(
            room = %room_id,
            members = members.len(),
            "fanning out to room"
        );

        for member in members {
            if let Some(sender) = self.get_sender(member).await
                && sender
                    .send(Message::Binary(encoded.clone().into()))
                    .is_err()
            {
                // The member's writer task is gone; its disconnect path
                // cleans up membership. Delivery to others continues.
                tracing::warn!(
                    room = %room_id,
                    session_id = %member,
                    "delivery failed for one member, skipping"
                );
            }
        }
    }
}

/// Handles an upgraded WebSocket connection for a single session.
///
/// The connection lifecycle:
/// 1. Assign a `SessionId` and register the session (no room yet).
/// 2. Send `Welcome` carrying the assigned id.
/// 3. Enter the event loop: `Join` records membership and confirms to the
///    joiner; `Message` fans out to the session's current room.
/// 4. On disconnect or transport error, leave the room and unregister.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let session_id = SessionId::new();
    tracing::info!(session_id = %session_id, "session connected");

    // Channel feeding this session's WebSocket writer.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.register(session_id, tx).await;

    // Send the Welcome with the server-assigned id.
    let welcome = ServerEvent::Welcome { session_id };
    if let Err(e) = send_event(&mut ws_sender, &welcome).await {
        tracing::error!(session_id = %session_id, error = %e, "failed to send Welcome");
        state.unregister(session_id).await;
        return;
    }

    // Writer task: forwards events from the channel to the WebSocket.
    let writer_session_id = session_id;
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(session_id = %writer_session_id, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader task: processes inbound events from this session.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_client_event(session_id, &data, &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // Clean up: leave whatever room the session occupied, drop its channel.
    // Both are idempotent, so a close racing a transport error is safe.
    let left = state.rooms.leave(session_id).await;
    state.unregister(session_id).await;
    tracing::info!(
        session_id = %session_id,
        room = left.as_ref().map_or("<none>", RoomId::as_str),
        "session disconnected"
    );
}

/// Handles one decoded binary frame from a connected session.
async fn handle_client_event(session_id: SessionId, data: &[u8], state: &Arc<RelayState>) {
    let event = match event::decode_client(data) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "failed to decode event");
            return;
        }
    };

    match event {
        ClientEvent::Join { room } => handle_join(session_id, &room, state).await,
        ClientEvent::Message { payload } => handle_message(session_id, payload, state).await,
    }
}

/// Join: validate the room id, move membership, confirm to the joiner only.
async fn handle_join(session_id: SessionId, room: &str, state: &Arc<RelayState>) {
    let room_id = match RoomId::parse(room) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "rejected join");
            let err = ServerEvent::Error {
                reason: e.to_string(),
            };
            send_to_session(state, session_id, &err).await;
            return;
        }
    };

    let previous = state.rooms.join(&room_id, session_id).await;
    tracing::info!(
        session_id = %session_id,
        room = %room_id,
        previous = previous.as_ref().map_or("<none>", RoomId::as_str),
        "session joined room"
    );

    let confirm = ServerEvent::Joined {
        room: room_id.as_str().to_string(),
    };
    send_to_session(state, session_id, &confirm).await;
}

/// Message: enforce the payload cap, then fan out to the sender's room.
///
/// A message from a session that has not joined a room is dropped; the
/// client is not in an error state, there is just nowhere to deliver.
async fn handle_message(session_id: SessionId, payload: String, state: &Arc<RelayState>) {
    if payload.len() > state.max_payload_size {
        tracing::warn!(
            session_id = %session_id,
            size = payload.len(),
            max = state.max_payload_size,
            "payload exceeds size limit"
        );
        let err = ServerEvent::Error {
            reason: format!(
                "payload too large: {} bytes (max {})",
                payload.len(),
                state.max_payload_size
            ),
        };
        send_to_session(state, session_id, &err).await;
        return;
    }

    let Some(room_id) = state.rooms.room_of(session_id).await else {
        tracing::debug!(session_id = %session_id, "message from unjoined session, dropping");
        return;
    };

    state
        .broadcast(&room_id, &ServerEvent::Message { payload })
        .await;
}

/// Sends a server event to a single session via its channel.
async fn send_to_session(state: &Arc<RelayState>, session_id: SessionId, event: &ServerEvent) {
    let bytes = match event::encode_server(event) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "failed to encode event");
            return;
        }
    };
    if let Some(sender) = state.get_sender(session_id).await {
        let _ = sender.send(Message::Binary(bytes.into()));
    }
}

/// Encodes and sends a server event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), String> {
    let bytes = event::encode_server(event).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the relay server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// Use [`RelayState::with_config`] to apply limits from the resolved
/// [`crate::config::RelayConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .route("/", axum::routing::get(root_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the relay server in-process for testing.
///
/// Binds to `127.0.0.1:0` (OS-assigned port) and returns the bound address
/// and a [`tokio::task::JoinHandle`] for cleanup.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Root requests are unrelated to the relay; redirect them away with a 301
/// when a target is configured, otherwise serve a plain banner.
async fn root_handler(
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    match &state.root_redirect {
        Some(url) => (
            axum::http::StatusCode::MOVED_PERMANENTLY,
            [(axum::http::header::LOCATION, url.clone())],
        )
            .into_response(),
        None => "roomcast relay".into_response(),
    }
}
