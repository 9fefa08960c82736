pub mod chat;
pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router from one place.
pub use chat::{
    chat_handler, chat_stats_handler, clear_session_handler, history_handler, study_tips_handler,
    summarize_handler,
};
pub use rest::{generate_content_handler, get_content_handler, health_handler, root_handler};
