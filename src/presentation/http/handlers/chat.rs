//! Chat Handlers
//!
//! Request/response surface over [`ChatService`]. Every route here sits
//! behind `auth_middleware`, so the caller identity is always present.

use axum::{
    extract::{Extension, State},
    Json,
};
use uuid::Uuid;

use crate::application::dto::request::{CreateChatRequest, SendMessageRequest};
use crate::application::dto::response::{ConversationDto, MarkReadResponse, MessageDto};
use crate::application::services::ChatService;
use crate::presentation::http::extractors::{ApiJson, ApiPath};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_body;
use crate::startup::AppState;

/// List the caller's conversations with the other participant and full history.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationDto>>, AppError> {
    let chats = state.chat.list_conversations(auth.user_id).await?;
    Ok(Json(chats))
}

/// Get one conversation. Marks the other participant's messages as read.
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(chat_id): ApiPath<Uuid>,
) -> Result<Json<ConversationDto>, AppError> {
    let chat = state.chat.get_conversation(auth.user_id, chat_id).await?;
    Ok(Json(chat))
}

/// Explicitly start a conversation with another user.
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<CreateChatRequest>,
) -> Result<Json<ConversationDto>, AppError> {
    let chat = state
        .chat
        .create_conversation(auth.user_id, body.other_user_id)
        .await?;
    Ok(Json(chat))
}

/// Append a message to an existing conversation.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<Json<MessageDto>, AppError> {
    validate_body(&body)?;

    let message = state
        .chat
        .send_message(auth.user_id, body.chat_id, body.text)
        .await?;
    Ok(Json(message))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(chat_id): ApiPath<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let marked = state.chat.mark_read(auth.user_id, chat_id).await?;
    Ok(Json(MarkReadResponse { chat_id, marked }))
}
