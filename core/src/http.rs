//! HTTP request and response types shared by the client and its transports.
//!
//! # Design
//! Requests and fully read responses are plain data with owned fields. The
//! one exception is `TransportResponse`, which is what a `Transport` hands
//! back after the headers arrive: its body is still a live stream behind the
//! `Body` trait, and the executor decides when to read and close it.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::context::Context;
use crate::error::BodyError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A fully formed HTTP request.
///
/// `context` is set by `Client::execute` (or `with_context`) so transports
/// can abandon connection setup and header exchange when it is cancelled.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub context: Option<Context>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            context: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Bind `ctx` to this request, replacing any earlier binding.
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response whose body has been read to the end.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A streaming response body.
///
/// `chunk` yields `Ok(None)` at end of body. `close` releases the underlying
/// connection; the executor calls it exactly once per response.
#[async_trait]
pub trait Body: Send {
    async fn chunk(&mut self) -> Result<Option<Bytes>, BodyError>;

    fn close(&mut self) -> Result<(), BodyError>;
}

/// What a `Transport` returns once response headers have arrived.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Body>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://example.test/foo").unwrap()
    }

    #[test]
    fn get_builds_an_empty_request() {
        let req = HttpRequest::get(url());
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url.as_str(), "http://example.test/foo");
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
        assert!(req.context.is_none());
    }

    #[test]
    fn post_carries_body_and_headers() {
        let req = HttpRequest::post(url(), "payload").with_header("Content-Type", "text/plain");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body.as_deref(), Some(&b"payload"[..]));
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn with_context_binds_the_context() {
        let ctx = Context::new();
        let req = HttpRequest::get(url()).with_context(ctx.clone());
        ctx.cancel();
        assert!(req.context.unwrap().is_done());
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let resp = HttpResponse {
            status: 204,
            headers: vec![("X-Request-Id".to_string(), "abc".to_string())],
            body: Bytes::new(),
        };
        assert!(resp.is_success());
        assert_eq!(resp.header("x-request-id"), Some("abc"));
        assert_eq!(resp.header("missing"), None);
    }

    #[test]
    fn method_names() {
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Head.as_str(), "HEAD");
    }
}
