//! In-memory completion backend (testing only)
//!
//! `ScriptedBackend` replays queued responses in order and records every
//! request it receives, so callers can assert on prompts and tuning.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    CompletionBackend, CompletionError, CompletionOutput, CompletionRequest, ProviderKind,
    TokenUsage,
};

/// Backend that answers from a script
#[derive(Debug)]
pub struct ScriptedBackend {
    provider: ProviderKind,
    delay: Option<Duration>,
    usage: Option<TokenUsage>,
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            delay: None,
            usage: None,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push_response(text);
        self
    }

    /// Queue a failure
    pub fn fail(self, error: CompletionError) -> Self {
        self.push_error(error);
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report this usage with every successful response
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: CompletionError) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionOutput, CompletionError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Ok(text)) => {
                let output = CompletionOutput::new(
                    text,
                    request.model.clone(),
                    self.delay.unwrap_or_default(),
                );
                Ok(match self.usage {
                    Some(usage) => output.with_usage(usage),
                    None => output,
                })
            }
            Some(Err(error)) => Err(error),
            None => Err(CompletionError::Transport {
                provider: self.provider,
                message: "script exhausted".to_string(),
            }),
        }
    }
}
