//! crates/eduforge_core/src/chat.rs
//!
//! Short-term conversational memory for the study assistant.
//!
//! Sessions are created on first touch and live for a fixed window measured
//! from their creation, not from their last message. Expired sessions are
//! swept lazily at the start of every store operation.
//!
//! Each session carries two locks. The turn lock is held for a whole chat turn,
//! provider call included, so turns within one conversation are serialized
//! while unrelated conversations proceed in parallel. The data lock guards the
//! messages and context and is never held across an `.await`, so store-wide
//! reads never wait on an in-flight turn.

use crate::completion::ResilientCompletionClient;
use crate::domain::{ChatReply, ChatRole, ChatSession, PromptMessage, SessionMessage, SessionStats};
use crate::ports::Clock;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const BASE_SYSTEM_PROMPT: &str = r#"You are EduForge AI Assistant, an expert educational chatbot designed to help students learn effectively. You have the following capabilities:

1. **Answer Questions**: Provide clear, accurate answers on any educational topic
2. **Summarize Topics**: Create concise, comprehensive summaries of complex subjects
3. **Clarify Concepts**: Break down difficult ideas into understandable parts
4. **Learning Support**: Offer study tips, learning strategies, and educational guidance
5. **Context Awareness**: Remember our conversation and build upon previous topics

Your communication style should be:
- Clear and educational
- Encouraging and supportive
- Appropriate for learners of all levels
- Concise but comprehensive
- Engaging and interactive

Guidelines:
- Always provide accurate, helpful information
- If you don't know something, admit it and suggest how to find the answer
- Use examples and analogies to explain complex concepts
- Encourage critical thinking and curiosity
- Maintain conversation context and refer back to previous topics when relevant"#;

const CONTINUITY_NOTE: &str = "\n\nConversation Summary: We have been discussing educational topics. Please maintain continuity with our previous conversation while helping with new questions.";

const SUMMARY_PROMPT_TEMPLATE: &str = r#"Please provide a {detail_level} summary of the topic: {topic}

{instruction}

The summary should be educational, accurate, and appropriate for learners. Include:
- Main concepts and definitions
- Key points and important details
- Practical applications or examples (if applicable)
- Why this topic is important or relevant

Format the response in a clear, organized manner that's easy to understand."#;

const STUDY_TIPS_PROMPT_TEMPLATE: &str = r#"Can you provide effective study tips and strategies for learning about {topic}?{style_note}

Please include:
- Specific study techniques that work well for this subject
- How to organize and structure learning
- Common challenges and how to overcome them
- Ways to test understanding and retention
- Additional resources or tools that might help

Make the advice practical and actionable."#;

pub const CONTEXT_TOPIC: &str = "current_topic";
pub const CONTEXT_LEARNING_STYLE: &str = "learning_style";
pub const CONTEXT_LEARNER_LEVEL: &str = "learner_level";
pub const CONTEXT_RECENT_OBJECTIVES: &str = "recent_objectives";

#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// How long a session lives after creation.
    pub retention: Duration,
    /// Prior messages sent along with each new user message.
    pub history_window: usize,
    /// Message count above which the continuity note is added.
    pub long_conversation_threshold: usize,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            retention: Duration::hours(2),
            history_window: 10,
            long_conversation_threshold: 6,
            model: "llama3-8b-8192".to_string(),
            temperature: 0.7,
            max_output_tokens: 1500,
        }
    }
}

struct SessionSlot {
    turn: tokio::sync::Mutex<()>,
    session: Mutex<ChatSession>,
}

impl SessionSlot {
    fn new(session: ChatSession) -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            session: Mutex::new(session),
        }
    }

    fn data(&self) -> MutexGuard<'_, ChatSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.data().created_at
    }
}

pub struct ConversationStore {
    sessions: DashMap<String, Arc<SessionSlot>>,
    client: Arc<ResilientCompletionClient>,
    clock: Arc<dyn Clock>,
    settings: ChatSettings,
}

impl ConversationStore {
    pub fn new(
        client: Arc<ResilientCompletionClient>,
        clock: Arc<dyn Clock>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            client,
            clock,
            settings,
        }
    }

    /// Returns a snapshot of the session, creating it if absent.
    pub fn touch(&self, session_id: &str) -> ChatSession {
        self.slot(session_id).data().clone()
    }

    /// Runs one chat turn and returns the reply. Never fails: when the
    /// provider is exhausted a canned reply is recorded and returned instead.
    pub async fn send(
        &self,
        session_id: &str,
        text: &str,
        context_patch: Option<Map<String, Value>>,
    ) -> ChatReply {
        let slot = self.slot(session_id);
        let _turn = slot.turn.lock().await;

        let messages = {
            let mut session = slot.data();
            if let Some(patch) = context_patch {
                session.context.extend(patch);
            }

            let window_start = session
                .messages
                .len()
                .saturating_sub(self.settings.history_window);
            let prior: Vec<PromptMessage> = session.messages[window_start..]
                .iter()
                .map(|m| PromptMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect();

            session.messages.push(SessionMessage {
                role: ChatRole::User,
                content: text.to_string(),
                timestamp: self.clock.now(),
            });

            let mut messages = Vec::with_capacity(prior.len() + 2);
            messages.push(PromptMessage::system(self.build_system_prompt(&session)));
            messages.extend(prior);
            messages.push(PromptMessage::user(text));
            messages
        };

        let (reply, fallback) = match self
            .client
            .complete(
                messages,
                &self.settings.model,
                self.settings.temperature,
                self.settings.max_output_tokens,
            )
            .await
        {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!("Chat completion failed for session {}: {}", session_id, e);
                (fallback_reply(text).to_string(), true)
            }
        };

        let timestamp = self.clock.now();
        slot.data().messages.push(SessionMessage {
            role: ChatRole::Assistant,
            content: reply.clone(),
            timestamp,
        });

        ChatReply {
            text: reply,
            timestamp,
            fallback,
        }
    }

    /// Asks for a summary of `topic` at `brief`, `medium` or `detailed` depth.
    pub async fn summarize(&self, session_id: &str, topic: &str, detail_level: &str) -> ChatReply {
        let instruction = match detail_level {
            "brief" => "Provide a concise 2-3 sentence summary covering only the most essential points.",
            "detailed" => "Generate an in-depth summary with multiple paragraphs covering concepts, applications, examples, and significance.",
            _ => "Create a comprehensive paragraph summary (4-6 sentences) covering key concepts and main ideas.",
        };
        let prompt = SUMMARY_PROMPT_TEMPLATE
            .replace("{instruction}", instruction)
            .replace("{detail_level}", detail_level)
            .replace("{topic}", topic);

        self.send(session_id, &prompt, None).await
    }

    pub async fn study_tips(
        &self,
        session_id: &str,
        topic: &str,
        learning_style: Option<&str>,
    ) -> ChatReply {
        let style_note = learning_style
            .map(|style| format!(" Keep in mind that I'm a {} learner.", style))
            .unwrap_or_default();
        let prompt = STUDY_TIPS_PROMPT_TEMPLATE
            .replace("{style_note}", &style_note)
            .replace("{topic}", topic);

        self.send(session_id, &prompt, None).await
    }

    /// Seeds the session with the learner's current study context.
    pub fn update_learning_context(
        &self,
        session_id: &str,
        topic: &str,
        learning_style: &str,
        learner_level: &str,
        objectives: Option<&[String]>,
    ) {
        let slot = self.slot(session_id);
        let now = self.clock.now();
        let mut session = slot.data();

        let context = &mut session.context;
        context.insert(CONTEXT_TOPIC.into(), Value::from(topic));
        context.insert(CONTEXT_LEARNING_STYLE.into(), Value::from(learning_style));
        context.insert(CONTEXT_LEARNER_LEVEL.into(), Value::from(learner_level));
        context.insert("updated_at".into(), Value::from(now.to_rfc3339()));
        if let Some(objectives) = objectives.filter(|o| !o.is_empty()) {
            context.insert(CONTEXT_RECENT_OBJECTIVES.into(), Value::from(objectives.to_vec()));
        }
    }

    /// Messages of the session, oldest first; empty if the session is absent.
    pub fn history(&self, session_id: &str) -> Vec<SessionMessage> {
        self.sweep();
        let Some(slot) = self.sessions.get(session_id).map(|entry| entry.value().clone()) else {
            return Vec::new();
        };
        let messages = slot.data().messages.clone();
        messages
    }

    /// Removes the session, reporting whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sweep();
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("Cleared chat session {}", session_id);
        }
        removed
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.sweep();
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn stats(&self) -> SessionStats {
        self.sweep();
        let slots: Vec<Arc<SessionSlot>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let total_message_count: usize = slots.iter().map(|slot| slot.data().messages.len()).sum();

        let active_count = slots.len();
        let average_messages_per_session = if active_count > 0 {
            total_message_count as f64 / active_count as f64
        } else {
            0.0
        };

        SessionStats {
            active_count,
            total_message_count,
            average_messages_per_session,
        }
    }

    /// Drops every session older than the retention window.
    fn sweep(&self) {
        let now = self.clock.now();
        let retention = self.settings.retention;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, slot| now.signed_duration_since(slot.created_at()) <= retention);

        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!("Evicted {} expired chat sessions", evicted);
        }
    }

    fn slot(&self, session_id: &str) -> Arc<SessionSlot> {
        self.sweep();
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(SessionSlot::new(ChatSession::new(session_id, self.clock.now())))
            })
            .value()
            .clone()
    }

    fn build_system_prompt(&self, session: &ChatSession) -> String {
        let mut prompt = BASE_SYSTEM_PROMPT.to_string();
        let context = &session.context;

        if !context.is_empty() {
            prompt.push_str("\n\nCurrent Learning Context:\n");
            if let Some(topic) = context.get(CONTEXT_TOPIC).or_else(|| context.get("topic")) {
                prompt.push_str(&format!("- Current Topic: {}\n", render(topic)));
            }
            if let Some(style) = context.get(CONTEXT_LEARNING_STYLE) {
                prompt.push_str(&format!("- Learner Style: {}\n", render(style)));
            }
            if let Some(level) = context.get(CONTEXT_LEARNER_LEVEL) {
                prompt.push_str(&format!("- Learner Level: {}\n", render(level)));
            }
            if let Some(Value::Array(objectives)) = context.get(CONTEXT_RECENT_OBJECTIVES) {
                let recent: Vec<String> = objectives.iter().take(3).map(render).collect();
                prompt.push_str(&format!(
                    "- Recent Learning Objectives: {}\n",
                    recent.join(", ")
                ));
            }
        }

        if session.messages.len() > self.settings.long_conversation_threshold {
            prompt.push_str(CONTINUITY_NOTE);
        }
        prompt
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Canned reply used when the provider cannot answer, picked by keywords in
/// the user's message.
pub fn fallback_reply(message: &str) -> &'static str {
    let message = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| message.contains(w));

    if mentions(&["what is", "define", "explain"]) {
        "I'd be happy to help explain that concept! However, I'm experiencing some technical difficulties right now. Could you try rephrasing your question, or I can help you find reliable educational resources to look up the information you need."
    } else if mentions(&["how to", "how do", "steps"]) {
        "Great question about the process! While I'm having some connectivity issues, I can suggest breaking down your learning into smaller steps and checking reputable educational sources for step-by-step guides."
    } else if mentions(&["summary", "summarize", "overview"]) {
        "I'd love to help create a summary for you! Unfortunately, I'm experiencing technical issues. In the meantime, try creating your own summary by identifying the main points, key concepts, and important details of the topic you're studying."
    } else if mentions(&["help", "stuck", "confused"]) {
        "I understand you need help! Even though I'm having technical difficulties, here are some general study strategies: break the problem into smaller parts, review the basics, try explaining it to someone else, and don't hesitate to seek additional resources or ask teachers/peers for clarification."
    } else {
        "Thank you for your question! I'm currently experiencing technical difficulties, but I'm here to help with your learning. Please try asking your question again, or feel free to explore the educational content and resources available in EduForge AI."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ClientSettings;
    use crate::credentials::CredentialPool;
    use crate::ports::CompletionProvider;
    use crate::testing::{GatedProvider, ManualClock, ScriptedProvider};
    use serde_json::json;

    struct Fixture {
        store: ConversationStore,
        provider: Arc<ScriptedProvider>,
        clock: Arc<ManualClock>,
    }

    fn store_with(provider: Arc<dyn CompletionProvider>, clock: Arc<ManualClock>) -> ConversationStore {
        let pool = CredentialPool::new(vec!["k1".into(), "k2".into()], 20).unwrap();
        let client = ResilientCompletionClient::new(
            pool,
            provider,
            ClientSettings {
                retry_backoff: std::time::Duration::ZERO,
            },
        );
        ConversationStore::new(Arc::new(client), clock, ChatSettings::default())
    }

    fn fixture(provider: ScriptedProvider) -> Fixture {
        let provider = Arc::new(provider);
        let clock = Arc::new(ManualClock::new());
        let store = store_with(provider.clone(), clock.clone());
        Fixture {
            store,
            provider,
            clock,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn touch_creates_empty_session_once() {
        let f = fixture(ScriptedProvider::always_ok("hi"));
        let first = f.store.touch("s1");
        assert_eq!(first.session_id, "s1");
        assert!(first.messages.is_empty());
        assert!(first.context.is_empty());

        f.store.send("s1", "Hello", None).await;
        let again = f.store.touch("s1");
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.messages.len(), 2);
    }

    #[tokio::test]
    async fn send_records_user_and_assistant_messages() {
        let f = fixture(ScriptedProvider::always_ok("This is a helpful response."));
        let reply = f.store.send("test_session", "What is machine learning?", None).await;

        assert_eq!(reply.text, "This is a helpful response.");
        assert!(!reply.fallback);

        let history = f.store.history("test_session");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "What is machine learning?");
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn context_patch_reaches_system_prompt() {
        let f = fixture(ScriptedProvider::always_ok("Contextual response"));
        let patch = json!({
            "current_topic": "Python Programming",
            "learning_style": "kinesthetic",
            "learner_level": "beginner",
            "recent_objectives": ["Learn loops", "Write functions", "Use classes", "Extra"]
        });
        let patch = patch.as_object().cloned();

        f.store.send("s", "Explain decorators", patch).await;

        let request = f.provider.last_request().unwrap();
        let system = &request.messages[0];
        assert_eq!(system.role, ChatRole::System);
        assert!(system.content.contains("EduForge AI Assistant"));
        assert!(system.content.contains("- Current Topic: Python Programming"));
        assert!(system.content.contains("- Learner Style: kinesthetic"));
        assert!(system.content.contains("Learn loops, Write functions, Use classes"));
        assert!(!system.content.contains("Extra"));
        assert!(!system.content.contains("Conversation Summary"));
    }

    #[tokio::test]
    async fn long_conversation_gets_continuity_note() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        for i in 0..3 {
            f.store.send("s", &format!("Message {}", i), None).await;
        }
        let request = f.provider.last_request().unwrap();
        assert!(!request.messages[0].content.contains("continuity"));

        // 6 stored messages plus the new user message exceeds the threshold.
        f.store.send("s", "One more", None).await;
        let request = f.provider.last_request().unwrap();
        assert!(request.messages[0].content.contains("Conversation Summary"));
    }

    #[tokio::test]
    async fn outbound_history_is_windowed_oldest_first() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        {
            let slot = f.store.slot("s");
            let mut session = slot.data();
            for i in 0..15 {
                session.messages.push(SessionMessage {
                    role: if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant },
                    content: format!("m{}", i),
                    timestamp: f.clock.now(),
                });
            }
        }

        f.store.send("s", "newest", None).await;

        let request = f.provider.last_request().unwrap();
        // system + 10 prior + the new message
        assert_eq!(request.messages.len(), 12);
        let contents: Vec<&str> = request.messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["m5", "m6", "m7", "m8", "m9", "m10", "m11", "m12", "m13", "m14", "newest"]
        );
    }

    #[tokio::test]
    async fn exhausted_provider_yields_keyword_fallback() {
        let f = fixture(ScriptedProvider::always_err("service unavailable"));
        let reply = f.store.send("s", "Can you define entropy?", None).await;

        assert!(reply.fallback);
        assert!(reply.text.contains("explain that concept"));
        let history = f.store.history("s");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, reply.text);
    }

    #[test]
    fn fallback_reply_matches_keywords() {
        assert!(fallback_reply("How do I start?").contains("the process"));
        assert!(fallback_reply("Give me an OVERVIEW").contains("summary"));
        assert!(fallback_reply("I'm stuck").contains("study strategies"));
        assert!(fallback_reply("Hello there").contains("Thank you for your question"));
    }

    #[tokio::test]
    async fn history_of_unknown_session_is_empty() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        assert!(f.store.history("nope").is_empty());
        assert!(f.store.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        f.store.send("s", "Hello", None).await;

        assert!(f.store.clear("s"));
        assert!(!f.store.clear("s"));
        assert!(f.store.history("s").is_empty());
    }

    #[tokio::test]
    async fn sessions_expire_from_creation_time() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        f.store.send("old", "Hello", None).await;

        // Activity does not extend the window.
        f.clock.advance(Duration::minutes(90));
        f.store.send("old", "Still here", None).await;
        f.store.send("recent", "Hi", None).await;

        f.clock.advance(Duration::minutes(31));
        assert!(f.store.history("old").is_empty());
        assert_eq!(f.store.active_sessions(), vec!["recent".to_string()]);

        let stats = f.store.stats();
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.total_message_count, 2);

        let recreated = f.store.touch("old");
        assert!(recreated.messages.is_empty());
        assert_eq!(recreated.created_at, f.clock.now());
    }

    #[tokio::test]
    async fn stats_average_messages() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        assert_eq!(f.store.stats().average_messages_per_session, 0.0);

        f.store.send("a", "one", None).await;
        f.store.send("a", "two", None).await;
        f.store.send("b", "three", None).await;

        let stats = f.store.stats();
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.total_message_count, 6);
        assert_eq!(stats.average_messages_per_session, 3.0);
    }

    #[tokio::test]
    async fn summarize_and_study_tips_build_prompts() {
        let f = fixture(ScriptedProvider::always_ok("ok"));

        f.store.summarize("s", "Photosynthesis", "brief").await;
        let request = f.provider.last_request().unwrap();
        let prompt = &request.messages.last().unwrap().content;
        assert!(prompt.contains("brief summary of the topic: Photosynthesis"));
        assert!(prompt.contains("2-3 sentence"));

        f.store.summarize("s", "Photosynthesis", "unheard-of").await;
        let request = f.provider.last_request().unwrap();
        assert!(request.messages.last().unwrap().content.contains("4-6 sentences"));

        f.store.study_tips("s", "Calculus", Some("visual")).await;
        let request = f.provider.last_request().unwrap();
        let prompt = &request.messages.last().unwrap().content;
        assert!(prompt.contains("learning about Calculus? Keep in mind that I'm a visual learner."));
    }

    #[tokio::test]
    async fn learning_context_seeds_session() {
        let f = fixture(ScriptedProvider::always_ok("ok"));
        let objectives = vec!["Learn ML basics".to_string()];
        f.store
            .update_learning_context("content-1", "Machine Learning", "visual", "beginner", Some(&objectives));

        let session = f.store.touch("content-1");
        assert_eq!(session.context[CONTEXT_TOPIC], "Machine Learning");
        assert_eq!(session.context[CONTEXT_RECENT_OBJECTIVES], json!(["Learn ML basics"]));
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn turns_on_one_session_are_serialized() {
        let provider = Arc::new(GatedProvider::new("u"));
        let store = Arc::new(store_with(provider.clone(), Arc::new(ManualClock::new())));

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.send("s", "u1", None).await }
        });
        settle().await;
        assert_eq!(provider.gated_entries(), 1);

        let second = tokio::spawn({
            let store = store.clone();
            async move { store.send("s", "u2", None).await }
        });
        settle().await;
        // The second turn waits for the first before reaching the provider.
        assert_eq!(provider.gated_entries(), 1);

        provider.release(2);
        first.await.unwrap();
        second.await.unwrap();

        let contents: Vec<String> = store.history("s").into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["u1", "re: u1", "u2", "re: u2"]);
    }

    #[tokio::test]
    async fn in_flight_turn_blocks_neither_other_sessions_nor_reads() {
        let provider = Arc::new(GatedProvider::new("slow"));
        let store = Arc::new(store_with(provider.clone(), Arc::new(ManualClock::new())));

        let busy = tokio::spawn({
            let store = store.clone();
            async move { store.send("busy", "slow question", None).await }
        });
        settle().await;
        assert_eq!(provider.gated_entries(), 1);

        let reply = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            store.send("other", "quick question", None),
        )
        .await
        .expect("unrelated session waited on a busy one");
        assert_eq!(reply.text, "re: quick question");

        let stats = store.stats();
        assert_eq!(stats.active_count, 2);
        // The busy session has only its user message so far.
        assert_eq!(stats.total_message_count, 3);
        assert_eq!(store.history("busy").len(), 1);
        assert_eq!(store.touch("busy").messages[0].content, "slow question");

        provider.release(1);
        busy.await.unwrap();
        assert_eq!(store.stats().total_message_count, 4);
    }
}
