use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::ExchangeError;
use crate::exchange::ExchangeService;
use crate::models::{ChatRequest, ExchangeResult};

#[derive(Clone)]
struct AppState {
    exchange: ExchangeService,
}

pub async fn run_server(bind_addr: &str, exchange: ExchangeService) -> Result<()> {
    let app = router(AppState { exchange });

    let addr: SocketAddr = bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ExchangeResult>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let result = state.exchange.exchange(message, &request.history).await?;
    Ok(Json(result))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(value: ExchangeError) -> Self {
        match value {
            ExchangeError::Configuration => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: value.to_string(),
            },
            // Upstream detail stays in the logs.
            ExchangeError::Upstream(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream model request failed; try again shortly".to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{AppConfig, GeminiConfig, SearchConfig, SourcePolicy};
    use crate::gemini::{Content, ModelClient, ModelReply};

    struct CannedModel;

    #[async_trait]
    impl ModelClient for CannedModel {
        async fn generate(
            &self,
            _system_instruction: &str,
            _contents: Vec<Content>,
        ) -> anyhow::Result<ModelReply> {
            Ok(ModelReply {
                text: Some("resposta".to_string()),
                grounding_chunks: Vec::new(),
            })
        }
    }

    fn test_router() -> Router {
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            gemini: GeminiConfig {
                base_url: "http://localhost".to_string(),
                model: "test-model".to_string(),
                api_key: Some("key".to_string()),
            },
            search: SearchConfig {
                api_key: None,
                engine_id: None,
                site_filter: None,
                result_limit: 5,
            },
            source_policy: SourcePolicy::FallbackOnly,
            provider_timeout: Duration::from_millis(100),
            static_sources: false,
        };
        let exchange = ExchangeService::new(config, Arc::new(CannedModel), vec![]);
        router(AppState { exchange })
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let response = test_router()
            .oneshot(chat_request(r#"{"message": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_round_trip_returns_answer() {
        let response = test_router()
            .oneshot(chat_request(
                r#"{"message": "O que é a Eucaristia?", "history": []}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthz_responds() {
        let request = Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
