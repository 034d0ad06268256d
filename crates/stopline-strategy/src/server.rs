/*
[INPUT]:  HTTP requests carrying a JSON body with the shared password
[OUTPUT]: Controller replies as pretty JSON status or plain-text messages
[POS]:    Interface layer - HTTP control surface over TaskController
[UPDATE]: When adding routes or changing request guarding
*/

use crate::controller::{ControlReply, TaskController};
use crate::task::{BartDropParams, ExitValueParams, LineBreakParams};
use anyhow::Context;
use axum::{
    Extension, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const BODY_LIMIT: usize = 64 * 1024;
const INVALID_PARAMS: &str = "Invalid params";

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TaskController>,
    password: Arc<str>,
}

impl AppState {
    pub fn new(controller: Arc<TaskController>, password: &str) -> Self {
        Self {
            controller,
            password: Arc::from(password),
        }
    }
}

/// JSON body parsed once by the guard and handed to the handlers.
#[derive(Debug, Clone)]
pub struct RequestBody(pub Value);

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", any(status))
        .route("/line-break-task", any(line_break_task))
        .route("/bart-drop-task", any(bart_drop_task))
        .route("/bart-drop-exit-value", any(bart_drop_exit_value))
        .route("/cancel", any(cancel))
        .fallback(undefined_path)
        .layer(middleware::from_fn_with_state(state.clone(), guard))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("http server")
}

/// Password first, then method.
async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "unreadable request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    let params = parse_body(&bytes);

    if params.get("password").and_then(Value::as_str) != Some(&*state.password) {
        tracing::warn!(path = %parts.uri.path(), "request with wrong password");
        return StatusCode::FORBIDDEN.into_response();
    }
    if parts.method != Method::POST {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(RequestBody(params));
    next.run(request).await
}

fn parse_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

fn params<T: DeserializeOwned>(body: Value) -> Option<T> {
    serde_json::from_value(body).ok()
}

async fn status(State(state): State<AppState>) -> Result<ControlReply, ApiError> {
    Ok(state.controller.status().await?)
}

async fn line_break_task(
    State(state): State<AppState>,
    Extension(RequestBody(body)): Extension<RequestBody>,
) -> Result<ControlReply, ApiError> {
    let Some(params) = params::<LineBreakParams>(body) else {
        return Ok(ControlReply::message(INVALID_PARAMS));
    };
    Ok(state.controller.make_line_break_task(params).await?)
}

async fn bart_drop_task(
    State(state): State<AppState>,
    Extension(RequestBody(body)): Extension<RequestBody>,
) -> Result<ControlReply, ApiError> {
    let Some(params) = params::<BartDropParams>(body) else {
        return Ok(ControlReply::message(INVALID_PARAMS));
    };
    Ok(state.controller.make_bart_drop_task(params).await?)
}

async fn bart_drop_exit_value(
    State(state): State<AppState>,
    Extension(RequestBody(body)): Extension<RequestBody>,
) -> Result<ControlReply, ApiError> {
    let Some(params) = params::<ExitValueParams>(body) else {
        return Ok(ControlReply::message(INVALID_PARAMS));
    };
    Ok(state.controller.change_bart_drop_exit_value(params).await?)
}

async fn cancel(State(state): State<AppState>) -> Result<ControlReply, ApiError> {
    Ok(state.controller.cancel().await?)
}

async fn undefined_path(uri: Uri) -> (StatusCode, String) {
    let path = uri.path().trim_start_matches('/');
    (StatusCode::NOT_FOUND, format!("Undefined path {path}"))
}

impl IntoResponse for ControlReply {
    fn into_response(self) -> Response {
        match self {
            ControlReply::Message(text) => text.into_response(),
            ControlReply::Status(report) => match serde_json::to_string_pretty(&report) {
                Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
                Err(err) => ApiError(err.into()).into_response(),
            },
        }
    }
}

/// Fatal controller failure; logged and reported as 500.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "control request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
    }
}
