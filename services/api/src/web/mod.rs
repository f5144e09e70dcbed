pub mod auth;
pub mod gateway;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod rooms;
pub mod state;
pub mod ws_handler;

pub use middleware::resolve_session;
pub use state::{Adapters, AppState};
pub use ws_handler::ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Every API route, with the session middleware applied. CORS and the
/// Swagger UI are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", get(rest::list_my_chats_handler))
        .route("/chat/new", post(rest::create_chat_handler))
        .route("/chat/assign", post(rest::assign_chat_handler))
        .route("/chat/close", post(rest::close_chat_handler))
        .route("/chat/open", get(rest::list_open_chats_handler))
        .route("/chat/ongoing", get(rest::list_ongoing_chats_handler))
        .route("/chat/chat-summary/{id}", get(rest::chat_summaries_handler))
        .route("/chat/{id}", get(rest::get_chat_handler))
        .route("/ai-assistant/response", post(rest::ai_suggestions_handler))
        .route(
            "/medical-record/generate/{chat_id}",
            get(rest::medical_record_handler),
        )
        .route("/presence/{user_id}", get(rest::presence_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_session,
        ))
        .with_state(state)
}
