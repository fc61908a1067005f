use std::time::Duration;

use super::ollama::OLLAMA_HOST;

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub connect_timeout: Duration,
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            host: OLLAMA_HOST.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
