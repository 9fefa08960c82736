pub mod chat;
pub mod completion;
pub mod content;
pub mod credentials;
pub mod domain;
pub mod ports;
pub mod styles;

#[cfg(test)]
mod testing;

pub use chat::{ChatSettings, ConversationStore};
pub use completion::{ClientSettings, CompletionError, ResilientCompletionClient};
pub use content::{ContentSynthesizer, SynthesizerSettings};
pub use credentials::{CredentialPool, PoolError};
pub use domain::{
    ChatReply, ChatRole, ChatSession, CompletionRequest, Credential, EducationalContent, Flashcard,
    PoolStatus, PromptMessage, QuizItem, SessionMessage, SessionStats, StoredContent, UiSuggestions,
};
pub use ports::{
    Clock, CompletionProvider, ContentStore, PortError, PortResult, ProviderError, SystemClock,
};
pub use styles::{LearnerLevel, LearningStyle};
