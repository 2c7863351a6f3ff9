//! Cancellation-aware API client.
//!
//! # Overview
//! A `Config` tells the client where named endpoints live and how to
//! authorize requests. `Client::new` resolves both once; `Client::execute`
//! then performs requests through the authorized transport, buffering the
//! whole response body while honouring the caller's `Context`.
//!
//! # Design
//! - `Client` is immutable after construction and cheap to clone.
//! - Authorization is a transport decorator (`BearerTransport`), so the
//!   executor never knows which auth scheme is in use.
//! - The body is read on a spawned task that is always joined before
//!   `execute` returns; cancellation closes the body after the join.
//! - Every request is bounded by `ClientOptions::timeout` (10 s default) in
//!   addition to any caller deadline.
//! - `ClientError` tags transport failure, cancellation, read failure and
//!   close failure as separate variants.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod oauth;
pub mod transport;

pub use client::Client;
pub use config::{
    ClientOptions, Config, EndpointResolver, StaticConfig, TokenConfig, DEFAULT_TIMEOUT,
};
pub use context::Context;
pub use error::{BodyError, ClientError, ConfigError, ContextError, TransportError};
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse, TransportResponse};
pub use oauth::ClientCredentialsConfig;
pub use transport::{BearerTransport, ReqwestTransport, Transport};
