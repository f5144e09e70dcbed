//! services/api/src/web/ws_handler.rs
//!
//! The entry point and control loop for a live WebSocket connection. The
//! caller is authenticated before the upgrade; afterwards the socket is split
//! into a writer task draining the connection's outbox and a reader loop
//! feeding the `GatewaySession`.

use crate::web::{
    auth::CurrentUser,
    gateway::GatewaySession,
    state::AppState,
};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use vet_consult_core::domain::SessionUser;

/// Upgrades an authenticated request. Anonymous callers get 401 before any
/// upgrade takes place.
pub async fn ws_handler(
    State(app_state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, app_state, user)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: SessionUser) {
    let connection_id = Uuid::new_v4();
    let user_id = user.user_id;
    info!(user_id = %user_id, connection_id = %connection_id, "New WebSocket connection established.");

    app_state.presence.record_connect(user_id).await;

    let (mut sender, mut receiver) = socket.split();
    let mut outbox = app_state.hub.register(connection_id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let session = GatewaySession::new(
        connection_id,
        user,
        app_state.hub.clone(),
        app_state.chats.clone(),
        app_state.messages.clone(),
    );

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id = %connection_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // --- Cleanup ---
    app_state.hub.unregister(connection_id);
    writer.abort();
    app_state.presence.record_disconnect(user_id).await;
    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connection closed.");
}
