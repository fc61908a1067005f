use super::base::{ByteStream, ChatOptions, Generator, Provider};
use super::configs::OllamaProviderConfig;
use crate::errors::TransportError;
use crate::models::message::Message;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::debug;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_CHAT_MODEL: &str = "qwen3:4b";
pub const OLLAMA_GENERATE_MODEL: &str = "gemma3:12b";

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self, TransportError> {
        // No overall request timeout: generations are streamed for as long as the model talks.
        // Round trip deadlines are enforced by the caller.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.config.host.trim_end_matches('/'), path);
        debug!(%url, "posting to ollama");

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn read_json(response: Response) -> Result<Value, TransportError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }
        serde_json::from_str(&body).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, TransportError> {
        let mut sampling = json!({ "stop": options.stop });
        if let Some(temperature) = options.temperature {
            sampling["temperature"] = json!(temperature);
        }

        let mut payload = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": sampling,
        });
        if options.structured_output {
            payload["format"] = json!("json");
        }

        let response = self.post("/api/chat", payload).await?;
        let data = Self::read_json(response).await?;

        let content = data
            .pointer("/message/content")
            .and_then(Value::as_str)
            .filter(|content| !content.trim().is_empty())
            .ok_or(TransportError::EmptyBody)?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl Generator for OllamaProvider {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, TransportError> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self.post("/api/generate", payload).await?;
        let data = Self::read_json(response).await?;

        Ok(data
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<ByteStream, TransportError> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": true,
        });

        let response = self.post("/api/generate", payload).await?;
        Ok(response.bytes_stream().map_err(TransportError::from).boxed())
    }
}
