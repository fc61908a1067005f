use async_trait::async_trait;
use std::sync::Mutex;

use crate::errors::TransportError;
use crate::models::message::Message;
use crate::providers::base::{ChatOptions, Provider};

/// A mock provider that returns pre-configured responses and records every request
pub struct MockProvider {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of raw model outputs
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of chat calls made so far
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The message list sent on each call
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn chat(
        &self,
        _model: &str,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(TransportError::EmptyBody)
        } else {
            Ok(responses.remove(0))
        }
    }
}
