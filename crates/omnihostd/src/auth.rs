//! API-key authentication: Bearer `wh_<random>` tokens hashed with `sha2`
//! before storage (§6), plus the one-shot bootstrap endpoint that creates
//! the first key and then permanently disables itself.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::warn;

use omnihost_core::storage::api_key_repo;

/// Paths reachable without a Bearer token: the bootstrap endpoint itself
/// (guarded by its own zero-keys check) and the API documentation.
fn is_public(path: &str) -> bool {
    path == "/auth/bootstrap" || path.starts_with("/swagger-ui") || path.starts_with("/api-docs")
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

fn unauthorized_json() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"error":"unauthorized","details":"missing or invalid bearer token"}"#))
        .unwrap()
}

/// Pulls `api_key` out of a raw query string. Browsers cannot set an
/// `Authorization` header on a WebSocket upgrade request, so `/term`,
/// `/zlogin`, and the VNC bridge routes accept the token as `?api_key=...`
/// as well as a Bearer header.
fn token_from_query(query: &str) -> Option<&str> {
    query.split('&').find_map(|pair| pair.strip_prefix("api_key="))
}

pub async fn api_key_middleware(State(pool): State<SqlitePool>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_public(&path) {
        return next.run(req).await;
    }

    let header_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));
    let query_token = req.uri().query().and_then(token_from_query);
    let token = header_token.or(query_token);

    let Some(token) = token else {
        warn!(path = %path, "auth: no bearer token");
        return unauthorized_json();
    };

    if !token.starts_with("wh_") {
        warn!(path = %path, "auth: malformed token prefix");
        return unauthorized_json();
    }

    let hash = hash_key(token);
    match api_key_repo::authenticate(&pool, &hash).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            warn!(path = %path, "auth: unknown key");
            unauthorized_json()
        }
        Err(e) => {
            warn!(path = %path, error = %e, "auth: lookup failed");
            unauthorized_json()
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub(crate) struct BootstrapResponse {
    api_key: String,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub(crate) struct BootstrapError {
    error: String,
    details: String,
}

/// `POST /auth/bootstrap`: only succeeds while `api_key` is empty. Returns
/// the raw key exactly once — it is never recoverable after this response.
#[utoipa::path(
    post,
    path = "/auth/bootstrap",
    responses(
        (status = 201, description = "First API key created", body = BootstrapResponse),
        (status = 403, description = "Bootstrap already completed", body = BootstrapError)
    )
)]
pub async fn bootstrap(State(pool): State<SqlitePool>) -> Response {
    match api_key_repo::count(&pool).await {
        Ok(0) => {}
        Ok(_) => {
            return (
                StatusCode::FORBIDDEN,
                Json(BootstrapError { error: "forbidden".into(), details: "bootstrap already completed".into() }),
            )
                .into_response();
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, Json(BootstrapError { error: "internal".into(), details: e.to_string() })).into_response(),
    }

    let mut raw = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut raw);
    let key = format!("wh_{}", bytes_to_hex(&raw));
    let hash = hash_key(&key);

    if let Err(e) = api_key_repo::insert(&pool, &hash, Some("bootstrap")).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(BootstrapError { error: "internal".into(), details: e.to_string() })).into_response();
    }

    (StatusCode::CREATED, Json(BootstrapResponse { api_key: key })).into_response()
}
