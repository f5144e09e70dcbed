//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{auth::CurrentUser, state::AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;
use vet_consult_core::domain::{MedicalRecordForm, Presence};
use vet_consult_core::view::ChatView;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_chat_handler,
        assign_chat_handler,
        close_chat_handler,
        list_open_chats_handler,
        list_ongoing_chats_handler,
        list_my_chats_handler,
        get_chat_handler,
        chat_summaries_handler,
        ai_suggestions_handler,
        medical_record_handler,
        presence_handler,
    ),
    components(
        schemas(ChatIdRequest, MessageResponse)
    ),
    tags(
        (name = "Vet Consultation API", description = "Consultation chats, AI assistance and presence.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatIdRequest {
    pub chat_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

//=========================================================================================
// Chat Handlers
//=========================================================================================

/// Open a new consultation as the caller.
#[utoipa::path(
    post,
    path = "/chat/new",
    responses(
        (status = 200, description = "Id of the new chat", body = String),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller may not open consultations")
    )
)]
pub async fn create_chat_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Uuid>, ApiError> {
    Ok(Json(state.consultations.create_chat(&user).await?))
}

/// Assign the caller as responder of an open chat.
#[utoipa::path(
    post,
    path = "/chat/assign",
    request_body = ChatIdRequest,
    responses(
        (status = 200, description = "The updated chat, without messages"),
        (status = 400, description = "Chat is not open"),
        (status = 403, description = "Caller may not respond to consultations"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn assign_chat_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatIdRequest>,
) -> Result<Json<ChatView>, ApiError> {
    Ok(Json(state.consultations.assign_responder(req.chat_id, &user).await?))
}

/// Close a chat the caller takes part in.
#[utoipa::path(
    post,
    path = "/chat/close",
    request_body = ChatIdRequest,
    responses(
        (status = 200, description = "Chat closed", body = MessageResponse),
        (status = 400, description = "Chat already closed"),
        (status = 403, description = "Caller may not close this chat"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn close_chat_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatIdRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.consultations.close_chat(req.chat_id, &user).await?;
    Ok(Json(MessageResponse {
        message: "Chat closed successfully".to_string(),
    }))
}

/// All chats waiting for a responder.
#[utoipa::path(
    get,
    path = "/chat/open",
    responses(
        (status = 200, description = "Open chats, without messages"),
        (status = 403, description = "Caller is not a verified veterinarian")
    )
)]
pub async fn list_open_chats_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    Ok(Json(state.consultations.list_open_chats(&user).await?))
}

/// The caller's ongoing chats.
#[utoipa::path(
    get,
    path = "/chat/ongoing",
    responses((status = 200, description = "Ongoing chats, without messages"))
)]
pub async fn list_ongoing_chats_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    Ok(Json(
        state.consultations.list_ongoing_chats_for_user(user.user_id).await?,
    ))
}

/// Every chat the caller takes part in, most recent first.
#[utoipa::path(
    get,
    path = "/chat",
    responses(
        (status = 200, description = "The caller's chats, without messages"),
        (status = 404, description = "The caller has no chats")
    )
)]
pub async fn list_my_chats_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    Ok(Json(state.consultations.list_chats_for_user(user.user_id).await?))
}

/// One chat with its messages.
#[utoipa::path(
    get,
    path = "/chat/{id}",
    params(("id" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "The chat including messages"),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn get_chat_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatView>, ApiError> {
    Ok(Json(state.consultations.get_chat_by_id(chat_id, user.user_id).await?))
}

/// A farmer's summarized consultations.
#[utoipa::path(
    get,
    path = "/chat/chat-summary/{id}",
    params(("id" = Uuid, Path, description = "Farmer user id")),
    responses(
        (status = 200, description = "Chats that carry a summary"),
        (status = 404, description = "The farmer has no chats")
    )
)]
pub async fn chat_summaries_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(farmer_id): Path<Uuid>,
) -> Result<Json<Vec<ChatView>>, ApiError> {
    Ok(Json(state.consultations.consultation_summaries(farmer_id).await?))
}

//=========================================================================================
// AI Assistance Handlers
//=========================================================================================

/// Reply suggestions for the responder of an ongoing chat.
#[utoipa::path(
    post,
    path = "/ai-assistant/response",
    request_body = ChatIdRequest,
    responses(
        (status = 200, description = "Suggested replies", body = [String]),
        (status = 400, description = "Chat is not ongoing"),
        (status = 403, description = "Caller is not a verified participant veterinarian"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn ai_suggestions_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatIdRequest>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.consultations.suggest_replies(req.chat_id, &user).await?))
}

/// A medical-record form pre-filled from a consultation.
#[utoipa::path(
    get,
    path = "/medical-record/generate/{chatId}",
    params(("chatId" = Uuid, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Pre-filled form; fields are blank when drafting failed"),
        (status = 403, description = "Caller may not draft records for this chat"),
        (status = 404, description = "Chat or farmer profile not found")
    )
)]
pub async fn medical_record_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MedicalRecordForm>, ApiError> {
    Ok(Json(
        state.consultations.generate_medical_record(chat_id, &user).await?,
    ))
}

//=========================================================================================
// Presence Handlers
//=========================================================================================

/// A user's online state.
#[utoipa::path(
    get,
    path = "/presence/{userId}",
    params(("userId" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Device count and last-seen time"))
)]
pub async fn presence_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Presence>, ApiError> {
    Ok(Json(state.presence.presence_of(user_id).await?))
}
