use crate::error::ConfigError;
use config::{Config, Environment};
use intellicare::agent::AgentConfig;
use intellicare::providers::configs::OllamaProviderConfig;
use intellicare::providers::ollama;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
                address: address.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_ollama_host")]
    pub host: String,
    /// Chat model used by the agent
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Default model for /generate
    #[serde(default = "default_generate_model")]
    pub generate_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    /// Deadline for a single model round trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_chat_model(),
            generate_model: default_generate_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn ollama_config(&self) -> OllamaProviderConfig {
        OllamaProviderConfig {
            host: self.host.clone(),
            ..OllamaProviderConfig::default()
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            round_trip_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordSettings {
    /// JSON file of patient records; the store starts empty without it
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub records: RecordSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("provider.host", default_ollama_host())?
            .set_default("provider.model", default_chat_model())?
            .set_default("provider.generate_model", default_generate_model())?
            .set_default("provider.timeout_secs", default_timeout_secs())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("INTELLICARE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            ConfigError::Other(err)
        })
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_chat_model() -> String {
    ollama::OLLAMA_CHAT_MODEL.to_string()
}

fn default_generate_model() -> String {
    ollama::OLLAMA_GENERATE_MODEL.to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

fn default_timeout_secs() -> u64 {
    120
}
