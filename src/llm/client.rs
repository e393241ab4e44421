//! Oracle client trait and a scripted mock for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse};
use crate::error::{MendError, Result};

/// Stateless oracle client: every call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model used when the request does not override it
    fn model(&self) -> &str;

    /// False when the client cannot possibly succeed (e.g. no API key)
    fn is_ready(&self) -> bool;
}

/// Replays scripted responses in order and records every request.
///
/// Running out of responses is an error, which surfaces as an oracle failure
/// in the healing loop.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<CompletionResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script plain-text responses
    pub fn with_texts<S: Into<String>>(texts: impl IntoIterator<Item = S>) -> Self {
        Self::new(texts.into_iter().map(CompletionResponse::text).collect())
    }

    /// Queue a failure after the scripted responses
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.lock_responses().push_back(Err(MendError::Llm(message.into())));
        self
    }

    /// Every request seen so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Err(MendError::Llm("mock client has no more responses".to_string())))
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn is_ready(&self) -> bool {
        true
    }
}
