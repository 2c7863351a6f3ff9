use std::{collections::HashSet, convert::Infallible, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Client id accepted by the token endpoint.
pub const CLIENT_ID: &str = "test-client";
/// Client secret accepted by the token endpoint.
pub const CLIENT_SECRET: &str = "test-secret";

/// Largest body `/bytes/{n}` will produce.
pub const MAX_BYTES: usize = 16 * 1024 * 1024;

/// Body chunk sent by `/stall` before it stops writing.
pub const STALL_PREFIX: &str = "partial";

#[derive(Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Whoami {
    pub authorization: Option<String>,
}

pub type Tokens = Arc<RwLock<HashSet<String>>>;

pub fn app() -> Router {
    let tokens: Tokens = Arc::new(RwLock::new(HashSet::new()));
    Router::new()
        .route("/ok", get(ok))
        .route("/bytes/{n}", get(sized))
        .route("/slow/{ms}", get(slow).post(slow))
        .route("/stall", get(stall).post(stall))
        .route("/whoami", get(whoami))
        .route("/protected", get(protected))
        .route("/oauth/token", post(issue_token))
        .with_state(tokens)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn ok() -> &'static str {
    "ok"
}

async fn sized(Path(n): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if n > MAX_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok((0..n).map(|i| b'a' + (i % 26) as u8).collect())
}

/// Waits before sending any headers.
async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "slow"
}

/// Sends headers and a first chunk, then never finishes the body.
async fn stall() -> Body {
    let first = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(STALL_PREFIX.as_bytes())) });
    Body::from_stream(first.chain(stream::pending()))
}

async fn whoami(headers: HeaderMap) -> Json<Whoami> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(Whoami { authorization })
}

async fn protected(State(tokens): State<Tokens>, headers: HeaderMap) -> Result<&'static str, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if tokens.read().await.contains(token) {
        Ok("granted")
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn issue_token(
    State(tokens): State<Tokens>,
    Form(input): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<serde_json::Value>)> {
    if input.grant_type != "client_credentials" {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "unsupported_grant_type" })),
        ));
    }
    if input.client_id != CLIENT_ID || input.client_secret != CLIENT_SECRET {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid_client" })),
        ));
    }
    let token = Uuid::new_v4().to_string();
    tracing::debug!(scope = ?input.scope, "issued access token");
    tokens.write().await.insert(token.clone());
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: 3600,
    }))
}
