//! OAuth2 client-credentials configuration.
//!
//! `authorize` runs the client-credentials grant with `oauth2`'s
//! `BasicClient`. The HTTP function handed to `oauth2` sends each token
//! request through the base transport, bound to the caller's context, and
//! reads the token body under that same context. The base transport is then
//! wrapped in a `BearerTransport` carrying the issued access token. Tokens
//! are fetched once per `Client::new` and never refreshed.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenType};
use oauth2::http::{self, Method};
use oauth2::{AuthType, ClientId, ClientSecret, RequestTokenError, Scope, TokenResponse, TokenUrl};
use thiserror::Error;
use tokio_util::task::AbortOnDropHandle;
use url::Url;

use crate::config::{base_url_resolver, parse_base_url, Config, EndpointResolver};
use crate::context::Context;
use crate::error::{BodyError, ConfigError, ContextError, TransportError};
use crate::http::{Body, HttpMethod, HttpRequest, TransportResponse};
use crate::transport::{BearerTransport, Transport};

#[derive(Clone)]
pub struct ClientCredentialsConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ClientCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialsConfig")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Failure while sending a token request, before `oauth2` sees a response.
#[derive(Debug, Error)]
enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("reading token response: {0}")]
    Body(#[from] BodyError),
    #[error("token response not received: {0}")]
    Cancelled(ContextError),
    #[error("unsupported token request method `{0}`")]
    Method(Method),
    #[error("invalid token request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid token response: {0}")]
    Response(#[from] http::Error),
    #[error("token request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Send one `oauth2` request through `transport`, bound to `ctx`.
///
/// The body is read chunk by chunk against `ctx`, and closed once whether or
/// not the read finished.
async fn send_token_request(
    transport: Arc<dyn Transport>,
    ctx: Context,
    request: oauth2::HttpRequest,
) -> Result<oauth2::HttpResponse, ExchangeError> {
    let method = if *request.method() == Method::POST {
        HttpMethod::Post
    } else if *request.method() == Method::GET {
        HttpMethod::Get
    } else {
        return Err(ExchangeError::Method(request.method().clone()));
    };
    let url = Url::parse(&request.uri().to_string())?;

    let mut outbound = HttpRequest::new(method, url).with_context(ctx.clone());
    for (name, value) in request.headers() {
        outbound = outbound.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    let outbound = outbound.with_body(Bytes::from(request.into_body()));

    let TransportResponse {
        status,
        headers,
        mut body,
    } = transport.round_trip(outbound).await?;

    let collected = collect_body(body.as_mut(), &ctx).await;
    if let Err(err) = body.close() {
        tracing::trace!(error = %err, "closing token response body failed");
    }
    let collected = collected?;

    let mut response = http::Response::builder().status(status);
    for (name, value) in &headers {
        response = response.header(name.as_str(), value.as_str());
    }
    Ok(response.body(collected)?)
}

async fn collect_body(body: &mut dyn Body, ctx: &Context) -> Result<Vec<u8>, ExchangeError> {
    let mut buf = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            cause = ctx.done() => return Err(ExchangeError::Cancelled(cause)),
            next = body.chunk() => next?,
        };
        match next {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => return Ok(buf),
        }
    }
}

fn exchange_failed(err: RequestTokenError<ExchangeError, BasicErrorResponse>) -> ConfigError {
    let message = match err {
        RequestTokenError::Request(err) => err.to_string(),
        RequestTokenError::Parse(err, _) => format!("malformed token response: {err}"),
        other => other.to_string(),
    };
    ConfigError::TokenExchange(message)
}

#[async_trait]
impl Config for ClientCredentialsConfig {
    fn endpoints(&self) -> Result<EndpointResolver, ConfigError> {
        Ok(base_url_resolver(parse_base_url(&self.base_url)?))
    }

    async fn authorize(
        &self,
        ctx: &Context,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        let token_url =
            TokenUrl::new(self.token_url.clone()).map_err(|source| ConfigError::InvalidUrl {
                url: self.token_url.clone(),
                source,
            })?;
        let oauth = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(token_url);

        // Each request runs on its own task so the future handed to `oauth2`
        // is `Sync`; dropping the exchange aborts it.
        let send = |request: oauth2::HttpRequest| {
            let task = AbortOnDropHandle::new(tokio::spawn(send_token_request(
                transport.clone(),
                ctx.clone(),
                request,
            )));
            async move {
                match task.await {
                    Ok(result) => result,
                    Err(err) => Err(ExchangeError::Task(err)),
                }
            }
        };

        let token = oauth
            .exchange_client_credentials()
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .request_async(&send)
            .await
            .map_err(exchange_failed)?;

        if *token.token_type() != BasicTokenType::Bearer {
            return Err(ConfigError::TokenExchange(format!(
                "unsupported token type `{:?}`",
                token.token_type()
            )));
        }
        let access_token = token.access_token().secret().clone();
        if access_token.is_empty() {
            return Err(ConfigError::TokenExchange("empty access token".to_string()));
        }
        tracing::debug!(
            client_id = %self.client_id,
            expires_in = ?token.expires_in(),
            "obtained client-credentials token"
        );
        Ok(Arc::new(BearerTransport::new(transport, access_token)))
    }
}
