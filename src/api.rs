//! HTTP API surface for the translation relay.
//!
//! This module owns request parsing, authentication, input validation, and
//! response formatting while delegating completion calls to the relay.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::relay::{
    DetectionRequest, DetectionResult, Relay, TranslationRequest, TranslationResult,
    DETECT_TEXT_REQUIRED_MESSAGE, INVALID_INPUT_MESSAGE,
};

/// Human-readable service name returned by health endpoints.
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
/// Service version string returned by health endpoints.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    /// Relay wrapping the active completion backend.
    pub relay: Relay,
}

impl AppState {
    /// Constructs shared handler state.
    pub fn new(cfg: AppConfig, relay: Relay) -> Self {
        Self { cfg, relay }
    }
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/translate", post(translate))
        .route("/detect-language", post(detect_language))
        .with_state(state)
}

/// Root status endpoint (`GET /`).
pub async fn root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "name": APP_NAME,
        "version": APP_VERSION,
        "model": state.relay.model(),
    })))
}

/// Alias status endpoint (`GET /health`).
pub async fn health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    root(State(state), headers).await
}

/// Detects the source language and translates text (`POST /translate`).
///
/// A body that is not a JSON object is treated like one with missing fields.
pub async fn translate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TranslationRequest>, JsonRejection>,
) -> Result<Json<TranslationResult>, AppError> {
    require_auth(&state.cfg, &headers)?;

    let Json(req) = payload.map_err(|rejection| {
        debug!(error = %rejection, "rejected translate body");
        AppError::invalid_request(INVALID_INPUT_MESSAGE)
    })?;

    let result = state.relay.translate(&req).await?;
    Ok(Json(result))
}

/// Identifies the language of text (`POST /detect-language`).
pub async fn detect_language(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<DetectionRequest>, JsonRejection>,
) -> Result<Json<DetectionResult>, AppError> {
    require_auth(&state.cfg, &headers)?;

    let Json(req) = payload.map_err(|rejection| {
        debug!(error = %rejection, "rejected detect-language body");
        AppError::invalid_request(DETECT_TEXT_REQUIRED_MESSAGE)
    })?;

    let result = state.relay.detect_language(&req.text).await?;
    Ok(Json(result))
}

/// Enforces optional bearer-token authentication.
fn require_auth(cfg: &AppConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected_api_key) = cfg.api_key.as_deref() else {
        return Ok(());
    };

    let Some(raw) = headers.get(header::AUTHORIZATION) else {
        return Err(AppError::unauthorized("missing bearer token"));
    };

    let value = raw
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts
        .next()
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    let token = parts
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("missing bearer token"));
    }

    if token != expected_api_key {
        return Err(AppError::unauthorized("invalid token"));
    }

    Ok(())
}
