use intellicare::agent::Agent;
use intellicare::providers::base::Generator;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub generator: Arc<dyn Generator>,
    /// Model used by /generate when the request names none
    pub generate_model: String,
}
