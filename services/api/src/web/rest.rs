//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for content generation and health, and the master
//! definition for the OpenAPI specification.

use crate::web::chat;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use eduforge_core::{
    EducationalContent, Flashcard, LearnerLevel, LearningStyle, PortError, QuizItem, StoredContent,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

pub const MAX_TOPIC_CHARS: usize = 200;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        root_handler,
        health_handler,
        generate_content_handler,
        get_content_handler,
        chat::chat_handler,
        chat::summarize_handler,
        chat::study_tips_handler,
        chat::history_handler,
        chat::clear_session_handler,
        chat::chat_stats_handler,
    ),
    components(
        schemas(
            ContentRequest,
            ContentResponse,
            QuizItemResponse,
            FlashcardResponse,
            UiSuggestionsResponse,
            HealthResponse,
            ApiKeyStatus,
            StatusMessage,
            chat::ChatRequest,
            chat::SummarizeRequest,
            chat::StudyTipsRequest,
            chat::ChatResponse,
            chat::HistoryResponse,
            chat::HistoryMessage,
            chat::ChatStatsResponse,
            chat::ChatStatistics,
        )
    ),
    tags(
        (name = "EduForge AI API", description = "Educational content generation and study assistant chat.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The request payload for generating educational content.
#[derive(Deserialize, ToSchema)]
pub struct ContentRequest {
    pub topic: String,
    /// One of `beginner`, `intermediate`, `advanced`.
    pub learner_level: String,
    /// One of `visual`, `auditory`, `reading`, `kinesthetic`, `comprehensive`.
    pub learning_style: String,
}

#[derive(Serialize, ToSchema)]
pub struct QuizItemResponse {
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    explanation: String,
    hint: String,
}

impl From<QuizItem> for QuizItemResponse {
    fn from(item: QuizItem) -> Self {
        Self {
            question: item.question,
            options: item.options,
            correct_answer: item.correct_answer,
            explanation: item.explanation,
            hint: item.hint,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    front: String,
    back: String,
}

impl From<Flashcard> for FlashcardResponse {
    fn from(card: Flashcard) -> Self {
        Self {
            front: card.front,
            back: card.back,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UiSuggestionsResponse {
    color_scheme: String,
    layout_emphasis: String,
    interaction_type: String,
}

/// A generated (and persisted) piece of educational content.
#[derive(Serialize, ToSchema)]
pub struct ContentResponse {
    id: Uuid,
    topic: String,
    learner_level: String,
    learning_style: String,
    learning_objectives: Vec<String>,
    video_script: String,
    quiz: Vec<QuizItemResponse>,
    flashcards: Vec<FlashcardResponse>,
    ui_suggestions: UiSuggestionsResponse,
    created_at: DateTime<Utc>,
}

impl From<StoredContent> for ContentResponse {
    fn from(stored: StoredContent) -> Self {
        let EducationalContent {
            learning_objectives,
            video_script,
            quiz,
            flashcards,
            ui_suggestions,
        } = stored.content;

        Self {
            id: stored.id,
            topic: stored.topic,
            learner_level: stored.learner_level,
            learning_style: stored.learning_style,
            learning_objectives,
            video_script,
            quiz: quiz.into_iter().map(Into::into).collect(),
            flashcards: flashcards.into_iter().map(Into::into).collect(),
            ui_suggestions: UiSuggestionsResponse {
                color_scheme: ui_suggestions.color_scheme,
                layout_emphasis: ui_suggestions.layout_emphasis,
                interaction_type: ui_suggestions.interaction_type,
            },
            created_at: stored.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ApiKeyStatus {
    current_key_index: usize,
    request_count: u32,
    total_keys: usize,
    max_requests_per_key: u32,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    groq_configured: bool,
    api_key_status: ApiKeyStatus,
    active_chat_sessions: usize,
}

/// A plain informational message.
#[derive(Serialize, ToSchema)]
pub struct StatusMessage {
    pub message: String,
}

/// Rejects blank or over-long topics.
pub fn validate_topic(topic: &str) -> Result<(), (StatusCode, String)> {
    if topic.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "topic must not be empty".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("topic must be at most {} characters", MAX_TOPIC_CHARS),
        ));
    }
    Ok(())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// API banner.
#[utoipa::path(
    get,
    path = "/api",
    responses((status = 200, description = "API banner", body = StatusMessage))
)]
pub async fn root_handler() -> Json<StatusMessage> {
    Json(StatusMessage {
        message: "EduForge AI API v2.0 - Advanced Educational Content Generation".to_string(),
    })
}

/// Report credential rotation state and chat activity.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pool = app_state.completion_client.pool().status();
    let stats = app_state.conversations.stats();

    Json(HealthResponse {
        status: "healthy".to_string(),
        groq_configured: pool.total > 0,
        api_key_status: ApiKeyStatus {
            current_key_index: pool.active_index,
            request_count: pool.uses_on_active,
            total_keys: pool.total,
            max_requests_per_key: pool.max_uses_per_credential,
        },
        active_chat_sessions: stats.active_count,
    })
}

/// Generate educational content tailored to a learning style.
///
/// The content is persisted and also seeds the study assistant's context,
/// using the content id as the chat session id.
#[utoipa::path(
    post,
    path = "/api/generate_content",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Content generated", body = ContentResponse),
        (status = 400, description = "Invalid topic, learning style, or learner level"),
        (status = 500, description = "Content could not be stored")
    )
)]
pub async fn generate_content_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ContentRequest>,
) -> Result<Json<ContentResponse>, (StatusCode, String)> {
    validate_topic(&request.topic)?;

    let learning_style = request.learning_style.parse::<LearningStyle>().map_err(|_| {
        let valid: Vec<&str> = LearningStyle::ALL.iter().map(LearningStyle::as_str).collect();
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid learning style. Must be one of: {:?}", valid),
        )
    })?;
    let learner_level = request.learner_level.parse::<LearnerLevel>().map_err(|_| {
        let valid: Vec<&str> = LearnerLevel::ALL.iter().map(LearnerLevel::as_str).collect();
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid learner level. Must be one of: {:?}", valid),
        )
    })?;

    info!(
        "Generating content for topic: {}, level: {}, style: {}",
        request.topic, learner_level, learning_style
    );

    let content = app_state
        .synthesizer
        .synthesize(&request.topic, learner_level.as_str(), learning_style.as_str())
        .await;

    let stored = StoredContent {
        id: Uuid::new_v4(),
        topic: request.topic,
        learner_level: learner_level.to_string(),
        learning_style: learning_style.to_string(),
        content,
        created_at: Utc::now(),
    };

    if let Err(e) = app_state.db.save_content(&stored).await {
        error!("Failed to store generated content: {:?}", e);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Content generation failed: {}", e),
        ));
    }

    app_state
        .conversations
        .update_learning_context(
            &stored.id.to_string(),
            &stored.topic,
            &stored.learning_style,
            &stored.learner_level,
            Some(&stored.content.learning_objectives),
        );

    info!("Successfully generated content with ID: {}", stored.id);
    Ok(Json(stored.into()))
}

/// Retrieve previously generated content.
#[utoipa::path(
    get,
    path = "/api/content/{content_id}",
    responses(
        (status = 200, description = "Stored content", body = ContentResponse),
        (status = 404, description = "Educational content not found")
    ),
    params(("content_id" = Uuid, Path, description = "Id returned by generate_content."))
)]
pub async fn get_content_handler(
    State(app_state): State<Arc<AppState>>,
    Path(content_id): Path<Uuid>,
) -> Result<Json<ContentResponse>, (StatusCode, String)> {
    match app_state.db.get_content(content_id).await {
        Ok(stored) => Ok(Json(stored.into())),
        Err(PortError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            "Educational content not found".to_string(),
        )),
        Err(e) => {
            error!("Failed to load content {}: {:?}", content_id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load content".to_string(),
            ))
        }
    }
}
