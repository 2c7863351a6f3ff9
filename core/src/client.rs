//! Client factory and cancellation-aware request executor.
//!
//! # Design
//! `Client` holds only what `Client::new` resolved from the `Config`: the
//! authorized transport, the endpoint resolver and the timeout. Nothing is
//! mutated afterwards, so a single client can be cloned and shared across
//! any number of concurrent `execute` calls.
//!
//! `execute` reads the response body on a spawned task and races its
//! completion against the caller's context. Whichever side wins, the read
//! task is joined before `execute` returns and the body is closed exactly
//! once. The task handle aborts on drop, so dropping the `execute` future
//! does not leave the read running either.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use url::Url;

use crate::config::{ClientOptions, Config, EndpointResolver};
use crate::context::{done_or_pending, Context};
use crate::error::{BodyError, ClientError, ConfigError, TransportError};
use crate::http::{Body, HttpRequest, HttpResponse, TransportResponse};
use crate::transport::{ReqwestTransport, Transport};

/// Issues requests against an API described by a `Config`.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    endpoints: EndpointResolver,
    timeout: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Outcome of the spawned body read: the body comes back so the caller can
/// close it after the task has finished with it.
type ReadOutcome = (Box<dyn Body>, Result<Bytes, BodyError>);

impl Client {
    /// Build a client with default `ClientOptions`.
    ///
    /// `ctx` governs any requests `config` makes while authorizing.
    /// `transport` is the base transport; `None` selects `ReqwestTransport`.
    /// Errors from `config` are returned unchanged.
    pub async fn new(
        ctx: &Context,
        config: &dyn Config,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self, ConfigError> {
        Self::with_options(ctx, config, transport, ClientOptions::default()).await
    }

    pub async fn with_options(
        ctx: &Context,
        config: &dyn Config,
        transport: Option<Arc<dyn Transport>>,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        let base: Arc<dyn Transport> = match transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::default()),
        };
        let transport = config.authorize(ctx, base).await?;
        let endpoints = config.endpoints()?;

        tracing::debug!(timeout = ?options.timeout, "api client configured");
        Ok(Self {
            transport,
            endpoints,
            timeout: options.timeout,
        })
    }

    /// Location of the named endpoint, if the configuration knows it.
    pub fn url(&self, endpoint: &str) -> Option<Url> {
        (self.endpoints)(endpoint)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform `request` and read its whole body.
    ///
    /// With `ctx` present it is bound to the request and raced against the
    /// body read; `None` applies only the client timeout. A non-2xx status is
    /// not an error here; callers inspect `HttpResponse::status`.
    pub async fn execute(
        &self,
        ctx: Option<&Context>,
        mut request: HttpRequest,
    ) -> Result<HttpResponse, ClientError> {
        if let Some(ctx) = ctx {
            request = request.with_context(ctx.clone());
        }
        let deadline = Instant::now() + self.timeout;

        tracing::trace!(method = request.method.as_str(), url = %request.url, "sending request");
        let TransportResponse {
            status,
            headers,
            body,
        } = tokio::select! {
            result = tokio::time::timeout_at(deadline, self.transport.round_trip(request)) => {
                match result {
                    Ok(response) => response?,
                    Err(_) => return Err(TransportError::Timeout(self.timeout).into()),
                }
            }
            cause = done_or_pending(ctx) => {
                return Err(TransportError::Cancelled(cause).into());
            }
        };

        let stop = CancellationToken::new();
        let mut read = AbortOnDropHandle::new(tokio::spawn(read_body(
            body,
            stop.clone(),
            deadline,
            self.timeout,
        )));

        tokio::select! {
            biased;
            joined = &mut read => {
                let (mut body, result) = joined_outcome(joined)?;
                if let Err(err) = body.close() {
                    tracing::trace!(error = %err, "closing response body failed");
                }
                let body = result.map_err(ClientError::Read)?;
                tracing::trace!(status, len = body.len(), "response read");
                Ok(HttpResponse { status, headers, body })
            }
            cause = done_or_pending(ctx) => {
                stop.cancel();
                let (mut body, _discarded) = joined_outcome(read.await)?;
                tracing::trace!(status, %cause, "request cancelled while reading body");
                body.close().map_err(ClientError::Close)?;
                Err(ClientError::Cancelled(cause))
            }
        }
    }
}

/// Read `body` to the end unless `stop` fires or `deadline` passes first.
async fn read_body(
    mut body: Box<dyn Body>,
    stop: CancellationToken,
    deadline: Instant,
    timeout: Duration,
) -> ReadOutcome {
    let mut buf = BytesMut::new();
    let result = loop {
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => break Err(BodyError::Interrupted),
            () = tokio::time::sleep_until(deadline) => break Err(BodyError::Timeout(timeout)),
            next = body.chunk() => next,
        };
        match next {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) => break Ok(buf.freeze()),
            Err(err) => break Err(err),
        }
    };
    (body, result)
}

/// The read task never gets aborted while `execute` is polling it, so a
/// join error can only be a panic, which is resumed on the caller.
fn joined_outcome(joined: Result<ReadOutcome, JoinError>) -> Result<ReadOutcome, ClientError> {
    match joined {
        Ok(outcome) => Ok(outcome),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(_) => Err(ClientError::Read(BodyError::Interrupted)),
    }
}
