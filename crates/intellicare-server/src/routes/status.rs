use axum::{routing::get, Router};

async fn status() -> String {
    "ok".to_string()
}

pub fn routes() -> Router {
    Router::new().route("/status", get(status))
}
