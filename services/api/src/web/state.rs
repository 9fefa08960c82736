//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use eduforge_core::{ContentStore, ContentSynthesizer, ConversationStore, ResilientCompletionClient};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The completion client owns the credential pool; the synthesizer and the
/// conversation store both hold a reference to that same client.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn ContentStore>,
    pub completion_client: Arc<ResilientCompletionClient>,
    pub synthesizer: Arc<ContentSynthesizer>,
    pub conversations: Arc<ConversationStore>,
}
