//! Pluggable round-trip strategies.
//!
//! # Design
//! A `Transport` performs one request and returns as soon as the response
//! headers arrive, leaving the body unread. Decorators such as
//! `BearerTransport` wrap another `Arc<dyn Transport>` and adjust the request
//! before delegating, which is how a `Config` layers authorization on top of
//! whatever base transport the caller supplied.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::context::done_or_pending;
use crate::error::{BodyError, TransportError};
use crate::http::{Body, HttpMethod, HttpRequest, TransportResponse};

/// Executes a single HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: HttpRequest) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by a shared `reqwest::Client`.
///
/// Honours a context bound to the request: if it ends before the headers
/// arrive, the in-flight request is dropped and `TransportError::Cancelled`
/// is returned.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<TransportResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            context,
        } = request;

        let mut builder = self.client.request(reqwest_method(method), url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = tokio::select! {
            result = builder.send() => result?,
            cause = done_or_pending(context.as_ref()) => {
                return Err(TransportError::Cancelled(cause));
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Ok(TransportResponse {
            status,
            headers,
            body: Box::new(ReqwestBody {
                response: Some(response),
            }),
        })
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

/// Body of a `reqwest::Response`. Closing drops the response, which
/// releases or discards the connection.
struct ReqwestBody {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl Body for ReqwestBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>, BodyError> {
        match self.response.as_mut() {
            Some(response) => Ok(response.chunk().await?),
            None => Err(BodyError::Io("read on closed body".to_string())),
        }
    }

    fn close(&mut self) -> Result<(), BodyError> {
        self.response.take();
        Ok(())
    }
}

/// Adds `Authorization: Bearer <token>` to every request before delegating.
pub struct BearerTransport {
    inner: Arc<dyn Transport>,
    token: String,
}

impl BearerTransport {
    pub fn new(inner: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self {
            inner,
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTransport")
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for BearerTransport {
    async fn round_trip(&self, mut request: HttpRequest) -> Result<TransportResponse, TransportError> {
        request
            .headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        request
            .headers
            .push(("Authorization".to_string(), format!("Bearer {}", self.token)));
        self.inner.round_trip(request).await
    }
}
