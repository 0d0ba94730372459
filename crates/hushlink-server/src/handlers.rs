use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    store::{ConsumeResult, SecretRecord},
    AppState,
};

/// Per-field cap on submitted base64 blobs.
const MAX_FIELD_BYTES: usize = 1_048_576;

// ── Health ───────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub encrypted: String,
    pub iv: String,
    pub salt: String,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub link: String,
}

pub async fn store_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StoreRequest>,
) -> Response {
    // The blobs stay opaque, but they must at least be base64 of sane size —
    // anything else can never decrypt and only wastes storage.
    for (name, value) in [
        ("encrypted", &body.encrypted),
        ("iv", &body.iv),
        ("salt", &body.salt),
    ] {
        if value.is_empty() || value.len() > MAX_FIELD_BYTES {
            return bad_request(&format!("{name} must be 1–{MAX_FIELD_BYTES} bytes"));
        }
        if STANDARD.decode(value).is_err() {
            return bad_request(&format!("{name} is not valid base64"));
        }
    }

    match state.store.put(&body.encrypted, &body.iv, &body.salt) {
        Ok(id) => {
            info!(id = %id, "secret stored");
            let link = format!("{}/secret/{}", link_base(&state, &headers), id);
            (StatusCode::CREATED, Json(StoreResponse { link })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Fetch (the consuming read) ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub encrypted: String,
    pub iv: String,
    pub salt: String,
}

impl From<SecretRecord> for FetchResponse {
    fn from(record: SecretRecord) -> Self {
        Self {
            encrypted: record.encrypted,
            iv: record.iv,
            salt: record.salt,
        }
    }
}

pub async fn fetch_secret(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.consume_once(&id) {
        Ok(ConsumeResult::Consumed(record)) => {
            info!(id = %id, "secret consumed");
            Json(FetchResponse::from(record)).into_response()
        }
        Ok(ConsumeResult::AlreadyConsumed) => (
            StatusCode::GONE,
            Json(json!({"error": "Secret has already been used"})),
        )
            .into_response(),
        Ok(ConsumeResult::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Secret not found"})),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Base URL for issued links: the configured public URL, or the requester's
/// own view of this server (scheme from x-forwarded-proto, authority from
/// Host), the way the original deployment built them.
fn link_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.public_url {
        return url.trim_end_matches('/').to_owned();
    }
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))).into_response()
}

fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal server error"})),
    )
        .into_response()
}
