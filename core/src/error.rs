//! Error types for client construction and request execution.
//!
//! # Design
//! Construction failures (`ConfigError`) and per-request failures
//! (`ClientError`) are separate types because they happen at different
//! times and callers react to them differently. `ClientError` tags where a
//! request failed: before a response arrived (`Transport`), while the body
//! was being read (`Read`), because the caller's context ended (`Cancelled`),
//! or while closing the body after cancellation (`Close`). The underlying
//! cause is preserved in every variant.

use std::time::Duration;

use thiserror::Error;

/// Why a `Context` is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors produced while building a `Client` from a `Config`.
///
/// Returned unchanged by `Client::new`, so a config implementation can match
/// on exactly the value it produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration could not produce an authorizing transport.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The configuration could not produce an endpoint resolver.
    #[error("endpoint resolution failed: {0}")]
    Endpoints(String),

    /// A configured URL could not be parsed.
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A token endpoint rejected the exchange or returned something unusable.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

/// The round trip failed before a response was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("request cancelled before a response arrived: {0}")]
    Cancelled(ContextError),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Reading or closing a response body failed.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("body i/o failed: {0}")]
    Io(String),

    #[error("body not fully read within {0:?}")]
    Timeout(Duration),

    /// The read was stopped before the body ended.
    #[error("body read interrupted")]
    Interrupted,
}

impl From<reqwest::Error> for BodyError {
    fn from(err: reqwest::Error) -> Self {
        BodyError::Io(err.to_string())
    }
}

/// Errors returned by `Client::execute`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller's context ended while the body was being read.
    #[error("request cancelled while reading body: {0}")]
    Cancelled(ContextError),

    #[error("reading response body failed: {0}")]
    Read(#[source] BodyError),

    /// Closing the body after cancellation failed.
    #[error("closing response body failed: {0}")]
    Close(#[source] BodyError),
}

impl ClientError {
    /// True when the caller's context ended, whether before or after the
    /// response headers arrived.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ClientError::Cancelled(_) | ClientError::Transport(TransportError::Cancelled(_))
        )
    }

    /// True when the client-wide timeout expired.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(TransportError::Timeout(_))
                | ClientError::Read(BodyError::Timeout(_))
        )
    }
}
