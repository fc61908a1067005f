use crate::state::AppState;
use async_trait::async_trait;
use intellicare::agent::{Agent, AgentConfig};
use intellicare::capabilities::appointments::AcceptingAppointmentBook;
use intellicare::capabilities::records::InMemoryRecordStore;
use intellicare::capabilities::CapabilityRegistry;
use intellicare::errors::TransportError;
use intellicare::models::message::Message;
use intellicare::providers::base::{ByteStream, ChatOptions, Generator, Provider};
use std::sync::{Arc, Mutex};

/// Chat backend answering from a fixed script
pub struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, TransportError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        _model: &str,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Err(TransportError::EmptyBody)
        } else {
            replies.remove(0)
        }
    }
}

/// Generation backend with a canned completion and a single prepared stream
pub struct ScriptedGenerator {
    completion: Result<String, TransportError>,
    stream: Mutex<Option<Result<ByteStream, TransportError>>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(
        completion: Result<String, TransportError>,
        stream: Result<ByteStream, TransportError>,
    ) -> Self {
        Self {
            completion,
            stream: Mutex::new(Some(stream)),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Models requested so far, in order
    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, TransportError> {
        self.models.lock().unwrap().push(model.to_string());
        match &self.completion {
            Ok(text) => Ok(text.clone()),
            Err(TransportError::Status { status, body }) => Err(TransportError::Status {
                status: *status,
                body: body.clone(),
            }),
            Err(_) => Err(TransportError::EmptyBody),
        }
    }

    async fn generate_stream(
        &self,
        model: &str,
        _prompt: &str,
    ) -> Result<ByteStream, TransportError> {
        self.models.lock().unwrap().push(model.to_string());
        self.stream
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(TransportError::EmptyBody))
    }
}

pub fn state_with(provider: Arc<dyn Provider>, generator: Arc<dyn Generator>) -> AppState {
    let registry = Arc::new(CapabilityRegistry::new(
        Arc::new(AcceptingAppointmentBook),
        Arc::new(InMemoryRecordStore::default()),
    ));
    let agent = Agent::new(provider, registry, AgentConfig::default()).unwrap();

    AppState {
        agent: Arc::new(agent),
        generator,
        generate_model: "gemma3:12b".to_string(),
    }
}

pub fn test_state(provider: Arc<ScriptedProvider>) -> AppState {
    let generator = Arc::new(ScriptedGenerator::new(
        Ok(String::new()),
        Err(TransportError::EmptyBody),
    ));
    state_with(provider, generator)
}
