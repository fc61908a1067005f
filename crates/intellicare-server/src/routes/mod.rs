pub mod agent;
pub mod generate;
pub mod status;

#[cfg(test)]
pub mod test_support;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(agent::routes(state.clone()))
        .merge(generate::routes(state))
        .merge(status::routes())
}
