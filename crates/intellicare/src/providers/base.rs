use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::errors::TransportError;
use crate::models::message::Message;

/// Raw body of a streaming response, as read off the wire
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Fence markers the backend is asked to stop on, so the envelope comes back bare
pub const ENVELOPE_STOP_MARKERS: [&str; 2] = ["```json", "```"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub stop: Vec<String>,
    /// Ask the backend to constrain its output to JSON
    pub structured_output: bool,
}

impl ChatOptions {
    /// Sampling options for a turn that must produce an envelope
    pub fn envelope(temperature: Option<f32>) -> Self {
        Self {
            temperature,
            stop: ENVELOPE_STOP_MARKERS.iter().map(|s| s.to_string()).collect(),
            structured_output: true,
        }
    }
}

/// A chat backend that answers a whole conversation with one completed message
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<String, TransportError>;
}

/// A free-form text generation backend
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate the whole completion before returning it
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, TransportError>;

    /// Start a generation and hand back the newline delimited response body as it arrives
    async fn generate_stream(&self, model: &str, prompt: &str)
        -> Result<ByteStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_options() {
        let options = ChatOptions::envelope(Some(0.7));
        assert_eq!(options.stop, vec!["```json", "```"]);
        assert!(options.structured_output);

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["stop"], json!(["```json", "```"]));
    }
}
