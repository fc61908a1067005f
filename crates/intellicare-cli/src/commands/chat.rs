use anyhow::Result;
use intellicare::agent::{Agent, AgentConfig};
use intellicare::capabilities::appointments::AcceptingAppointmentBook;
use intellicare::capabilities::records::InMemoryRecordStore;
use intellicare::capabilities::CapabilityRegistry;
use intellicare::providers::configs::OllamaProviderConfig;
use intellicare::providers::ollama::OllamaProvider;
use std::path::PathBuf;
use std::sync::Arc;

use crate::prompt::cliclack::CliclackPrompt;
use crate::session::Session;

pub async fn run(
    host: String,
    model: String,
    records: Option<PathBuf>,
    time_zone: Option<String>,
    show_thinking: bool,
) -> Result<()> {
    let store = match records {
        Some(path) => InMemoryRecordStore::from_json_file(path)?,
        None => InMemoryRecordStore::default(),
    };
    let registry = Arc::new(CapabilityRegistry::new(
        Arc::new(AcceptingAppointmentBook),
        Arc::new(store),
    ));

    let provider = Arc::new(OllamaProvider::new(OllamaProviderConfig {
        host,
        ..OllamaProviderConfig::default()
    })?);
    let agent = Agent::new(
        provider,
        registry,
        AgentConfig {
            model,
            ..AgentConfig::default()
        },
    )?;

    let prompt = CliclackPrompt::new(show_thinking);
    let mut session = Session::new(agent, Box::new(prompt), time_zone);
    session.start().await
}
