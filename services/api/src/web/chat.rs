//! services/api/src/web/chat.rs
//!
//! Axum handlers for the study assistant: chat turns, topic summaries, study
//! tips, history inspection and session management.

use crate::web::rest::{validate_topic, StatusMessage};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use eduforge_core::{ChatReply, SessionMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 1000;
const LISTED_SESSION_IDS: usize = 10;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Omit to start a new conversation.
    pub session_id: Option<String>,
    pub message: String,
    /// Extra learner context merged into the session before the turn.
    #[schema(value_type = Option<Object>)]
    pub context: Option<Map<String, Value>>,
}

#[derive(Deserialize, ToSchema)]
pub struct SummarizeRequest {
    pub session_id: Option<String>,
    pub topic: String,
    /// One of `brief`, `medium`, `detailed`. Defaults to `medium`.
    pub detail_level: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StudyTipsRequest {
    pub session_id: Option<String>,
    pub topic: String,
    pub learning_style: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    response: String,
    session_id: String,
    /// RFC 3339 timestamp of the reply.
    timestamp: String,
    /// True when the reply is a canned substitute because the provider was unavailable.
    fallback: bool,
}

impl ChatResponse {
    fn new(session_id: String, reply: ChatReply) -> Self {
        Self {
            response: reply.text,
            session_id,
            timestamp: reply.timestamp.to_rfc3339(),
            fallback: reply.fallback,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryMessage {
    role: String,
    content: String,
    timestamp: String,
}

impl From<SessionMessage> for HistoryMessage {
    fn from(message: SessionMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content,
            timestamp: message.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    session_id: String,
    messages: Vec<HistoryMessage>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatStatistics {
    active_count: usize,
    total_message_count: usize,
    average_messages_per_session: f64,
}

#[derive(Serialize, ToSchema)]
pub struct ChatStatsResponse {
    statistics: ChatStatistics,
    active_sessions: usize,
    session_ids: Vec<String>,
}

/// Uses the caller's session id, or mints a fresh one.
fn resolve_session_id(session_id: Option<String>) -> String {
    session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn validate_message(message: &str) -> Result<(), (StatusCode, String)> {
    if message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message must not be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("message must be at most {} characters", MAX_MESSAGE_CHARS),
        ));
    }
    Ok(())
}

//=========================================================================================
// Chat Handlers
//=========================================================================================

/// Send one message to the study assistant.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Empty or over-long message")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    validate_message(&request.message)?;
    let session_id = resolve_session_id(request.session_id);

    let reply = app_state
        .conversations
        .send(&session_id, &request.message, request.context)
        .await;

    Ok(Json(ChatResponse::new(session_id, reply)))
}

/// Ask for a summary of a topic.
#[utoipa::path(
    post,
    path = "/api/chat/summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Topic summary", body = ChatResponse),
        (status = 400, description = "Invalid topic")
    )
)]
pub async fn summarize_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    validate_topic(&request.topic)?;
    let session_id = resolve_session_id(request.session_id);
    let detail_level = request.detail_level.as_deref().unwrap_or("medium");

    let reply = app_state
        .conversations
        .summarize(&session_id, &request.topic, detail_level)
        .await;

    Ok(Json(ChatResponse::new(session_id, reply)))
}

/// Ask for study tips on a topic, optionally tuned to a learning style.
#[utoipa::path(
    post,
    path = "/api/chat/study_tips",
    request_body = StudyTipsRequest,
    responses(
        (status = 200, description = "Study tips", body = ChatResponse),
        (status = 400, description = "Invalid topic")
    )
)]
pub async fn study_tips_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<StudyTipsRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    validate_topic(&request.topic)?;
    let session_id = resolve_session_id(request.session_id);

    let reply = app_state
        .conversations
        .study_tips(&session_id, &request.topic, request.learning_style.as_deref())
        .await;

    Ok(Json(ChatResponse::new(session_id, reply)))
}

/// List the messages of a session. Unknown or expired sessions yield an empty list.
#[utoipa::path(
    get,
    path = "/api/chat/history/{session_id}",
    responses((status = 200, description = "Session messages", body = HistoryResponse)),
    params(("session_id" = String, Path, description = "The chat session id."))
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let messages = app_state
        .conversations
        .history(&session_id)
        .into_iter()
        .map(Into::into)
        .collect();

    Json(HistoryResponse {
        session_id,
        messages,
    })
}

/// Forget a chat session.
#[utoipa::path(
    delete,
    path = "/api/chat/{session_id}",
    responses(
        (status = 200, description = "Session cleared", body = StatusMessage),
        (status = 404, description = "Session not found")
    ),
    params(("session_id" = String, Path, description = "The chat session id."))
)]
pub async fn clear_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<StatusMessage>, (StatusCode, String)> {
    if app_state.conversations.clear(&session_id) {
        Ok(Json(StatusMessage {
            message: format!("Chat session {} cleared successfully", session_id),
        }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", session_id),
        ))
    }
}

/// Aggregate chat activity for operators.
#[utoipa::path(
    get,
    path = "/api/admin/chat_stats",
    responses((status = 200, description = "Chat statistics", body = ChatStatsResponse))
)]
pub async fn chat_stats_handler(State(app_state): State<Arc<AppState>>) -> Json<ChatStatsResponse> {
    let stats = app_state.conversations.stats();
    let mut session_ids = app_state.conversations.active_sessions();
    let active_sessions = session_ids.len();
    session_ids.truncate(LISTED_SESSION_IDS);
    info!("Chat stats requested: {} active sessions", active_sessions);

    Json(ChatStatsResponse {
        statistics: ChatStatistics {
            active_count: stats.active_count,
            total_message_count: stats.total_message_count,
            average_messages_per_session: stats.average_messages_per_session,
        },
        active_sessions,
        session_ids,
    })
}
