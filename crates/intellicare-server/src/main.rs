use intellicare::agent::Agent;
use intellicare::capabilities::appointments::AcceptingAppointmentBook;
use intellicare::capabilities::records::{InMemoryRecordStore, RecordStore};
use intellicare::capabilities::CapabilityRegistry;
use intellicare::providers::ollama::OllamaProvider;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new()?;

    let store: Arc<dyn RecordStore> = match &settings.records.path {
        Some(path) => {
            let store = InMemoryRecordStore::from_json_file(path)?;
            info!("loaded {} patient records from {}", store.len(), path.display());
            Arc::new(store)
        }
        None => {
            warn!("INTELLICARE_RECORDS__PATH not set, patient record search will find nothing");
            Arc::new(InMemoryRecordStore::default())
        }
    };
    let registry = Arc::new(CapabilityRegistry::new(
        Arc::new(AcceptingAppointmentBook),
        store,
    ));

    let ollama = Arc::new(OllamaProvider::new(settings.provider.ollama_config())?);
    let agent = Agent::new(ollama.clone(), registry, settings.provider.agent_config())?;

    let state = AppState {
        agent: Arc::new(agent),
        generator: ollama,
        generate_model: settings.provider.generate_model.clone(),
    };

    // Create router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!(
        model = %settings.provider.model,
        backend = %settings.provider.host,
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
