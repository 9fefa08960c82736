//! crates/eduforge_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Educational payloads derive serde because they are parsed from model output
//! and persisted as JSON; everything else stays plain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Credentials and Completion Requests
//=========================================================================================

/// An opaque upstream authorization token, identified by its slot in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    secret: String,
}

impl Credential {
    pub fn new(index: usize, secret: impl Into<String>) -> Self {
        Self {
            index,
            secret: secret.into(),
        }
    }

    /// Zero-based position of this credential in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets must never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single (role, text) pair sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

/// Point-in-time view of the credential pool, used for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub active_index: usize,
    pub uses_on_active: u32,
    pub total: usize,
    pub max_uses_per_credential: u32,
}

//=========================================================================================
// Educational Content
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiSuggestions {
    pub color_scheme: String,
    pub layout_emphasis: String,
    pub interaction_type: String,
}

/// The structured payload produced for a (topic, level, style) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationalContent {
    pub learning_objectives: Vec<String>,
    pub video_script: String,
    pub quiz: Vec<QuizItem>,
    pub flashcards: Vec<Flashcard>,
    pub ui_suggestions: UiSuggestions,
}

/// A generated payload together with the request that produced it, as persisted.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub id: Uuid,
    pub topic: String,
    pub learner_level: String,
    pub learning_style: String,
    pub content: EducationalContent,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Conversations
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Short-term conversational memory for one session id.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<SessionMessage>,
    pub context: Map<String, Value>,
}

impl ChatSession {
    pub fn new(session_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at,
            messages: Vec::new(),
            context: Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the reply is the rule-based substitute for an unavailable provider.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub active_count: usize,
    pub total_message_count: usize,
    pub average_messages_per_session: f64,
}
