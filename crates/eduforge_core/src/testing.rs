//! In-memory fakes for the core ports, shared by the unit tests.

use crate::domain::{CompletionRequest, Credential};
use crate::ports::{Clock, CompletionProvider, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

enum Fallthrough {
    Ok(String),
    Err(String),
}

/// Replays scripted results in order, then repeats a fixed result forever.
/// Every call is recorded with the credential and request it received.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallthrough: Fallthrough,
    calls: Mutex<Vec<(usize, CompletionRequest)>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallthrough: Fallthrough::Err("script exhausted".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok(text: &str) -> Self {
        Self {
            fallthrough: Fallthrough::Ok(text.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn always_err(message: &str) -> Self {
        Self {
            fallthrough: Fallthrough::Err(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn credentials_used(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.calls.lock().unwrap().last().map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((credential.index(), request.clone()));

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallthrough {
            Fallthrough::Ok(text) => Ok(text.clone()),
            Fallthrough::Err(message) => Err(ProviderError::new(message.clone())),
        }
    }
}

/// Echoes the last prompt message as `re: <text>`. Prompts starting with the
/// gated prefix wait for a permit from `release` before answering.
pub struct GatedProvider {
    gated_prefix: String,
    gate: Semaphore,
    gated_entries: AtomicUsize,
}

impl GatedProvider {
    pub fn new(gated_prefix: &str) -> Self {
        Self {
            gated_prefix: gated_prefix.to_string(),
            gate: Semaphore::new(0),
            gated_entries: AtomicUsize::new(0),
        }
    }

    /// Number of gated calls that have started, released or not.
    pub fn gated_entries(&self) -> usize {
        self.gated_entries.load(Ordering::SeqCst)
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait]
impl CompletionProvider for GatedProvider {
    async fn complete(
        &self,
        _credential: &Credential,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if text.starts_with(&self.gated_prefix) {
            self.gated_entries.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|e| ProviderError::new(e.to_string()))?
                .forget();
        }
        Ok(format!("re: {}", text))
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
