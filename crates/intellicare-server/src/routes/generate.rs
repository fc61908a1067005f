use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use intellicare::errors::TransportError;
use intellicare::relay::{relay, strip_reasoning};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    /// Anything but a boolean counts as the default, streaming
    #[serde(default)]
    stream: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    ai_response: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct GenerateError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<TransportError> for GenerateError {
    fn from(e: TransportError) -> Self {
        error!("Error from model backend: {}", e);
        match e {
            TransportError::Status { status, body } => Self {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: format!("Ollama API error: {}", body),
            },
            other => Self {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Failed to fetch AI response: {}", other),
            },
        }
    }
}

type Line = Result<String, TransportError>;

// Line delimited JSON body fed by the relay task. An error item aborts the body
// so a truncated generation never reads as complete.
pub struct JsonlResponse {
    rx: ReceiverStream<Line>,
}

impl JsonlResponse {
    fn new(rx: ReceiverStream<Line>) -> Self {
        Self { rx }
    }
}

impl Stream for JsonlResponse {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx).map(|opt| {
            opt.map(|line| {
                line.map(Bytes::from)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            })
        })
    }
}

impl IntoResponse for JsonlResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "application/jsonl"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, GenerateError> {
    let prompt = request
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| GenerateError {
            status: StatusCode::BAD_REQUEST,
            message: "Prompt is required.".to_string(),
        })?;
    let model = request
        .model
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| state.generate_model.clone());
    let stream = request
        .stream
        .as_ref()
        .and_then(Value::as_bool)
        .unwrap_or(true);

    info!(%model, stream, "generating");

    if !stream {
        let text = state.generator.generate(&model, &prompt).await?;
        return Ok(Json(GenerateResponse {
            ai_response: strip_reasoning(&text),
        })
        .into_response());
    }

    let upstream = state.generator.generate_stream(&model, &prompt).await?;

    let (tx, rx) = mpsc::channel(100);
    let cancel = CancellationToken::new();
    let mut chunks = relay(upstream, cancel.clone());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => {
                    info!("client disconnected, cancelling generation");
                    cancel.cancel();
                    break;
                }
                next = chunks.next() => match next {
                    Some(Ok(chunk)) => {
                        if tx.send(Ok(chunk.to_line())).await.is_err() {
                            cancel.cancel();
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Generation stream failed: {}", e);
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                    None => break,
                },
            }
        }
    });

    Ok(JsonlResponse::new(ReceiverStream::new(rx)).into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{state_with, ScriptedGenerator, ScriptedProvider};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use intellicare::providers::base::ByteStream;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(generator: Arc<ScriptedGenerator>) -> Router {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        routes(state_with(provider, generator))
    }

    fn request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn byte_stream(blocks: Vec<&'static str>) -> ByteStream {
        futures::stream::iter(
            blocks
                .into_iter()
                .map(|block| Ok(Bytes::from_static(block.as_bytes()))),
        )
        .boxed()
    }

    #[tokio::test]
    async fn test_streams_jsonl_chunks() {
        let generator = Arc::new(ScriptedGenerator::new(
            Ok(String::new()),
            Ok(byte_stream(vec![
                "{\"response\":\"Hello <thi",
                "nk>ignored</think> world\",\"done\":false}\n",
                "{\"response\":\"\",\"done\":true}\n",
            ])),
        ));

        let response = app(generator.clone())
            .oneshot(request(json!({"prompt": "Say hello", "model": "llama3.2"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/jsonl"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "{\"chunk\":\"Hello \"}\n{\"chunk\":\" world\"}\n"
        );
        assert_eq!(generator.models(), vec!["llama3.2"]);
    }

    #[tokio::test]
    async fn test_non_streaming_returns_stripped_text() {
        let generator = Arc::new(ScriptedGenerator::new(
            Ok("<THINK>draft</THINK>Twinkle twinkle".to_string()),
            Err(TransportError::EmptyBody),
        ));

        let response = app(generator.clone())
            .oneshot(request(json!({"prompt": "Write a poem", "stream": false})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"aiResponse": "Twinkle twinkle"}));
        assert_eq!(generator.models(), vec!["gemma3:12b"]);
    }

    #[tokio::test]
    async fn test_missing_prompt_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::new(
            Ok(String::new()),
            Err(TransportError::EmptyBody),
        ));

        for body in [json!({}), json!({"prompt": "   "})] {
            let response = app(generator.clone()).oneshot(request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(generator.models().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_status_is_propagated() {
        let generator = Arc::new(ScriptedGenerator::new(
            Ok(String::new()),
            Err(TransportError::Status {
                status: 404,
                body: "model \"nope\" not found".to_string(),
            }),
        ));

        let response = app(generator)
            .oneshot(request(json!({"prompt": "Hi", "model": "nope", "stream": "yes"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Ollama API error: model \"nope\" not found");
    }

    #[tokio::test]
    async fn test_upstream_failure_mid_stream_aborts_body() {
        let generator = Arc::new(ScriptedGenerator::new(
            Ok(String::new()),
            Ok(futures::stream::iter(vec![
                Ok(Bytes::from_static(b"{\"response\":\"partial\"}\n")),
                Err(TransportError::EmptyBody),
            ])
            .boxed()),
        ));

        let response = app(generator)
            .oneshot(request(json!({"prompt": "Tell me a story"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(
            frame.into_data().unwrap(),
            Bytes::from_static(b"{\"chunk\":\"partial\"}\n")
        );
        assert!(body.frame().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_client_disconnect_releases_upstream() {
        let (upstream_tx, upstream_rx) = mpsc::channel::<Result<Bytes, TransportError>>(8);
        let generator = Arc::new(ScriptedGenerator::new(
            Ok(String::new()),
            Ok(ReceiverStream::new(upstream_rx).boxed()),
        ));

        let response = app(generator)
            .oneshot(request(json!({"prompt": "Tell me a long story"})))
            .await
            .unwrap();

        upstream_tx
            .send(Ok(Bytes::from_static(b"{\"response\":\"Once\"}\n")))
            .await
            .unwrap();

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(
            frame.into_data().unwrap(),
            Bytes::from_static(b"{\"chunk\":\"Once\"}\n")
        );

        drop(body);

        // The relay task notices the closed channel and drops the upstream body
        tokio::time::timeout(Duration::from_secs(2), upstream_tx.closed())
            .await
            .expect("upstream was not released after the client went away");
    }
}
