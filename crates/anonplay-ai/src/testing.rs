//! In-memory completion clients for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{AiError, CompletionClient, CompletionRequest};

/// Replays canned responses in order and records every request.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, AiError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, AiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AiError::EmptyResponse))
    }
}

/// Never answers within the given duration.
pub struct Slow(pub Duration);

#[async_trait]
impl CompletionClient for Slow {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, AiError> {
        tokio::time::sleep(self.0).await;
        Ok("too late".into())
    }
}
