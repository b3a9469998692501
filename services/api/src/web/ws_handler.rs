//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the connection's `GenerationSession` and funnels every outbound frame
//! through a single writer task.

use crate::web::{
    generation_task::GenerationSession,
    protocol::{decode_client_frame, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use faq_core::domain::Identity;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt, Stream,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

const INACTIVITY_MESSAGE: &str = "Connection closed due to inactivity.";

/// The handler for upgrading HTTP requests to WebSocket connections.
/// The identity is placed in the request extensions by the auth middleware.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| {
        let connection_id = Uuid::new_v4();
        let span = tracing::info_span!("ws", %connection_id, user_id = identity.user_id);
        handle_socket(socket, app_state, identity).instrument(span)
    })
}

/// Why the read loop of a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    ClientClosed,
    Inactive,
    Disconnected,
    ReceiveFailed,
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    info!("New WebSocket connection established.");

    let (sink, receiver) = socket.split();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(write_frames(sink, events_rx).in_current_span());

    let mut session = GenerationSession::new(
        identity,
        app_state.db.clone(),
        app_state.generator.clone(),
        app_state.config.generation.clone(),
        events_tx.clone(),
    );

    let end = read_frames(
        receiver,
        &mut session,
        &events_tx,
        app_state.config.inactivity_timeout,
    )
    .await;
    debug!("Read loop ended: {:?}", end);

    // --- Cleanup ---
    session.shutdown().await;
    drop(session);
    drop(events_tx);
    if let Err(e) = writer.await {
        error!("WebSocket writer task failed: {:?}", e);
    }
    info!("WebSocket connection closed.");
}

/// The connection's main message loop.
///
/// Text frames are decoded and handed to the session; anything it cannot use
/// is answered with an `error` frame and the loop carries on. When
/// `inactivity` is set and no frame arrives within it, a final notice is
/// queued and the loop ends.
pub async fn read_frames<S>(
    mut incoming: S,
    session: &mut GenerationSession,
    events: &mpsc::UnboundedSender<ServerMessage>,
    inactivity: Option<Duration>,
) -> ConnectionEnd
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let next = match inactivity {
            Some(limit) => match tokio::time::timeout(limit, incoming.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!("Closing idle connection after {:?}.", limit);
                    let _ = events.send(ServerMessage::error(INACTIVITY_MESSAGE));
                    return ConnectionEnd::Inactive;
                }
            },
            None => incoming.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => match decode_client_frame(text.as_str()) {
                Ok(message) => session.handle(message).await,
                Err(e) => {
                    warn!("Rejected client frame: {}", e);
                    let _ = events.send(ServerMessage::error(e.to_string()));
                }
            },
            Some(Ok(Message::Binary(_))) => {
                warn!("Binary frames are not supported.");
                let _ = events.send(ServerMessage::error("Binary messages are not supported."));
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                return ConnectionEnd::ClientClosed;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive failed: {}", e);
                return ConnectionEnd::ReceiveFailed;
            }
            None => {
                info!("Client disconnected.");
                return ConnectionEnd::Disconnected;
            }
        }
    }
}

/// Drains the outbound channel into the socket, then closes it.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut events: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(message) = events.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            debug!("Socket closed while sending; dropping remaining frames.");
            return;
        }
    }
    let _ = sink.close().await;
}
