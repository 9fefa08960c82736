pub mod db;
pub mod groq_llm;

pub use db::DbAdapter;
pub use groq_llm::GroqCompletionAdapter;
