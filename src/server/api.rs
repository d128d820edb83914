use crate::agent::ChatAgent;
use crate::llm::AgentError;
use crate::models::chat::{ ChatRequest, ChatResponse, ErrorBody, HealthStatus };
use crate::server::sse;
use std::sync::Arc;
use std::time::Instant;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    body::Body,
    extract::{ FromRequest, Request, State },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    http::{ header, HeaderValue, Method, StatusCode },
};
use chrono::{ SecondsFormat, Utc };
use thiserror::Error;
use tower_http::cors::CorsLayer;
use log::{ info, error };

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn ChatAgent>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to generate response: {0}")]
    Generation(AgentError),

    #[error("Failed to stream response: {0}")]
    StreamOpen(AgentError),
}

/// The configured browser origin is not a valid header value.
#[derive(Debug, Error)]
#[error("Invalid allowed origin '{0}'")]
pub struct InvalidOrigin(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ApiError::Generation(_) =>
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response"),
            ApiError::StreamOpen(_) =>
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to stream response"),
        };
        let message = match self {
            ApiError::Validation(msg) => msg,
            ApiError::Generation(e) | ApiError::StreamOpen(e) => e.to_string(),
        };

        (status, Json(ErrorBody { error: label.to_string(), message })).into_response()
    }
}

/// A `ChatRequest` that parsed and passed validation.
pub struct ValidChatRequest(pub ChatRequest);

impl<S> FromRequest<S> for ValidChatRequest where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<ChatRequest>
            ::from_request(req, state).await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        body.validate().map_err(ApiError::Validation)?;
        Ok(Self(body))
    }
}

pub fn cors_layer(app_url: &str) -> Result<CorsLayer, InvalidOrigin> {
    let origin = HeaderValue::from_str(app_url).map_err(|_| InvalidOrigin(app_url.to_string()))?;

    Ok(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::POST,
                Method::DELETE,
                Method::PATCH,
            ])
            .allow_headers([header::CONTENT_TYPE])
    )
}

pub fn router(agent: Arc<dyn ChatAgent>, app_url: &str) -> Result<Router, InvalidOrigin> {
    let app_state = AppState { agent };

    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(app_url)?)
        .with_state(app_state);

    Ok(app)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    info!("<-- {} {}", method, path);

    let response = next.run(req).await;

    info!(
        "--> {} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn chat_handler(
    State(state): State<AppState>,
    ValidChatRequest(req): ValidChatRequest
) -> Result<Json<ChatResponse>, ApiError> {
    let context = req.to_context();

    let text = state.agent.generate(&context).await.map_err(|e| {
        error!("Chat error: {}", e);
        ApiError::Generation(e)
    })?;

    Ok(Json(ChatResponse::assistant(text, req.session_id)))
}

async fn chat_stream_handler(
    State(state): State<AppState>,
    ValidChatRequest(req): ValidChatRequest
) -> Result<Response, ApiError> {
    let context = req.to_context();

    let chunks = state.agent.stream(&context).await.map_err(|e| {
        error!("Chat stream error: {}", e);
        ApiError::StreamOpen(e)
    })?;

    let headers = [
        (header::CONTENT_TYPE, "text/event-stream"),
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
    ];
    Ok((headers, Body::from_stream(sse::relay(chunks))).into_response())
}
