//! crates/eduforge_core/src/completion.rs
//!
//! The resilient completion client that fronts the external LLM provider.
//!
//! Every logical call gets one attempt per credential in the pool. Quota and
//! rate-limit failures rotate to the next credential right away; any other
//! failure pauses briefly and retries on the same credential.

use crate::credentials::CredentialPool;
use crate::domain::{CompletionRequest, PromptMessage};
use crate::ports::{CompletionProvider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Substrings (matched case-insensitively) that mark a quota or rate-limit failure.
const QUOTA_MARKERS: [&str; 2] = ["quota", "rate limit"];

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("all API keys exhausted after {attempts} attempts: {last}")]
    ProviderExhausted { attempts: usize, last: ProviderError },
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Pause before retrying a non-quota failure on the same credential.
    pub retry_backoff: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// What a single failed attempt means for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The credential's quota bucket is spent; move to the next one now.
    Quota,
    /// Anything else; wait and try the same credential again.
    Transient,
}

pub fn classify_failure(err: &ProviderError) -> FailureKind {
    let message = err.message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| message.contains(marker)) {
        FailureKind::Quota
    } else {
        FailureKind::Transient
    }
}

pub struct ResilientCompletionClient {
    pool: CredentialPool,
    provider: Arc<dyn CompletionProvider>,
    settings: ClientSettings,
}

impl ResilientCompletionClient {
    pub fn new(
        pool: CredentialPool,
        provider: Arc<dyn CompletionProvider>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            pool,
            provider,
            settings,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Produces a completion, rotating and retrying across the credential pool.
    pub async fn complete(
        &self,
        messages: Vec<PromptMessage>,
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            messages,
            model: model.to_string(),
            temperature,
            max_output_tokens,
        };
        self.complete_request(&request).await
    }

    pub async fn complete_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, CompletionError> {
        let max_attempts = self.pool.len();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let credential = self.pool.acquire();
            debug!(
                "Completion attempt {}/{} with API key {}",
                attempt,
                max_attempts,
                credential.index() + 1
            );

            let err = match self.provider.complete(&credential, request).await {
                Ok(text) => {
                    self.pool.record_use();
                    return Ok(text);
                }
                Err(err) => err,
            };

            warn!(
                "Request failed with key {}: {}",
                credential.index() + 1,
                err
            );

            match classify_failure(&err) {
                FailureKind::Quota => {
                    self.pool.rotate_from(credential.index());
                }
                FailureKind::Transient if attempt < max_attempts => {
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                FailureKind::Transient => {}
            }
            last_error = Some(err);
        }

        error!("All API keys exhausted for request");
        Err(CompletionError::ProviderExhausted {
            attempts: max_attempts,
            last: last_error.unwrap_or_else(|| ProviderError::new("no attempts were made")),
        })
    }
}
