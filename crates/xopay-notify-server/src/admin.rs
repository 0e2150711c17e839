//! Admin HTTP surface: CRUD over notification rules.
//!
//! Every route requires a Bearer token carrying the `admin` or `system`
//! group. Mutations write to the rule store and reload the engine cache, so
//! the next event sees the change.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use xopay_notify_auth::{AuthError, TokenSigner};
use xopay_notify_engine::{NotifyEngine, NotifyRule, RuleStore, StoreError};

#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn RuleStore>,
    pub engine: Arc<NotifyEngine>,
    pub signer: TokenSigner,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/notifications", get(notifications_list).post(notification_create))
        .route(
            "/notifications/{notify_id}",
            get(notification_detail)
                .put(notification_update)
                .delete(notification_delete),
        )
        .with_state(state)
}

// Errors

/// JSON API error: `{"error": {"status_code", "message"}}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    fn validation(errors: Vec<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, errors.join("; "))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::TokenNotFound | AuthError::TokenExpired | AuthError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<xopay_notify_engine::EngineError> for ApiError {
    fn from(err: xopay_notify_engine::EngineError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "status_code": self.status.as_u16(),
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

fn authorize(state: &AdminState, headers: &HeaderMap) -> Result<(), ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    state.signer.authorize(header, &["admin", "system"])?;
    Ok(())
}

// Payloads

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    name: String,
    case_regex: String,
    case_template: String,
    header_template: String,
    body_template: String,
    subscribers_template: String,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationPatch {
    name: Option<String>,
    case_regex: Option<String>,
    case_template: Option<String>,
    header_template: Option<String>,
    body_template: Option<String>,
    subscribers_template: Option<String>,
}

// Handlers

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn notifications_list(
    State(state): State<AdminState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;

    let notifications = state.store.load_all().await?;
    Ok(Json(json!({ "notifications": notifications })))
}

async fn notification_create(
    State(state): State<AdminState>,
    headers: HeaderMap,
    Json(payload): Json<NotificationPayload>,
) -> Result<Json<NotifyRule>, ApiError> {
    authorize(&state, &headers)?;

    let rule = NotifyRule {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        case_regex: payload.case_regex,
        case_template: payload.case_template,
        header_template: payload.header_template,
        body_template: payload.body_template,
        subscribers_template: payload.subscribers_template,
    };
    rule.validate().map_err(ApiError::validation)?;

    state.store.insert(rule.clone()).await?;
    state.engine.reload().await?;

    Ok(Json(rule))
}

async fn notification_detail(
    State(state): State<AdminState>,
    Path(notify_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<NotifyRule>, ApiError> {
    authorize(&state, &headers)?;

    state
        .store
        .get(&notify_id)
        .await?
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

async fn notification_update(
    State(state): State<AdminState>,
    Path(notify_id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<NotificationPatch>,
) -> Result<Json<NotifyRule>, ApiError> {
    authorize(&state, &headers)?;

    let mut rule = state
        .store
        .get(&notify_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    if let Some(name) = patch.name {
        rule.name = name;
    }
    if let Some(case_regex) = patch.case_regex {
        rule.case_regex = case_regex;
    }
    if let Some(case_template) = patch.case_template {
        rule.case_template = case_template;
    }
    if let Some(header_template) = patch.header_template {
        rule.header_template = header_template;
    }
    if let Some(body_template) = patch.body_template {
        rule.body_template = body_template;
    }
    if let Some(subscribers_template) = patch.subscribers_template {
        rule.subscribers_template = subscribers_template;
    }

    rule.validate().map_err(ApiError::validation)?;

    if !state.store.update(rule.clone()).await? {
        return Err(ApiError::not_found());
    }
    state.engine.reload().await?;

    Ok(Json(rule))
}

async fn notification_delete(
    State(state): State<AdminState>,
    Path(notify_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;

    if !state.store.remove(&notify_id).await? {
        return Err(ApiError::not_found());
    }
    state.engine.reload().await?;

    Ok(Json(json!({})))
}
