//! Request driver: one connection per hop, head first, body on demand.
//!
//! [`RequestDriver::open_hop`] performs a single exchange and hands back the
//! response head together with a [`HttpChunkSource`] that has not read any
//! body bytes yet. [`RequestDriver::open`] repeats hops through
//! [`RedirectPolicy`] until a terminal response arrives, then rejects
//! non-success statuses and declared sizes above the limit before the
//! caller sees a single body byte.

use reqwest::{Certificate, Client};
use tracing::{debug, instrument, warn};

use super::classify::{classify_status, classify_transport};
use super::error::{FetchError, TransferPhase};
use super::metadata::ResponseMetadata;
use super::options::RequestSpec;
use super::redirect::{RedirectContext, RedirectDecision, RedirectPolicy};
use super::source::{ChunkSource, HttpChunkSource};
use super::url_check::validate_target;
use crate::user_agent;

/// Opens HTTP(S) retrievals and exposes their bodies as chunk producers.
///
/// Every hop builds its own transport with pooling disabled, so a connection
/// is owned by exactly one [`HttpChunkSource`] and closes when it is released.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestDriver {
    policy: RedirectPolicy,
}

impl RequestDriver {
    /// Creates a driver with the default redirect policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Performs one request/response exchange without following redirects.
    ///
    /// Returns as soon as the response head is received, whatever its status.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] for a non-http(s) target
    /// - [`FetchError::Timeout`] when connecting or waiting for the head takes too long
    /// - [`FetchError::Connection`] / [`FetchError::Ssl`] for transport failures
    #[instrument(level = "debug", skip(self, spec), fields(url = %spec.url()))]
    pub async fn open_hop(
        &self,
        spec: &RequestSpec,
    ) -> Result<(ResponseMetadata, HttpChunkSource), FetchError> {
        validate_target(spec.url())?;
        let client = build_client(spec)?;
        let url = spec.url().as_str();

        let request = client
            .get(spec.url().clone())
            .headers(spec.headers().clone());
        let head_budget = spec.connect_timeout() + spec.read_timeout();
        let response = match tokio::time::timeout(head_budget, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify_transport(url, e, TransferPhase::Read)),
            Err(_) => return Err(FetchError::timeout(url, TransferPhase::Read)),
        };

        let metadata = ResponseMetadata::from_response(&response);
        debug!(
            status = metadata.status(),
            content_length = ?metadata.content_length(),
            "response head received"
        );
        Ok((metadata, HttpChunkSource::new(response, spec.read_timeout())))
    }

    /// Opens `spec`, following redirects up to its hop budget.
    ///
    /// # Errors
    ///
    /// Everything [`open_hop`](Self::open_hop) returns, plus:
    /// - [`FetchError::TooManyRedirects`] / [`FetchError::InvalidRedirect`] from the redirect chain
    /// - [`FetchError::Client`] / [`FetchError::Server`] / [`FetchError::Response`] for a
    ///   non-success terminal status
    /// - [`FetchError::TooLarge`] when the declared length exceeds `spec.max_size()`
    #[instrument(skip(self, spec), fields(url = %spec.url(), max_redirects = spec.max_redirects()))]
    pub async fn open(
        &self,
        spec: &RequestSpec,
    ) -> Result<(ResponseMetadata, HttpChunkSource), FetchError> {
        let mut context = RedirectContext::new(spec.url().clone(), spec.max_redirects());
        let mut current = spec.clone();

        loop {
            let (metadata, mut body) = self.open_hop(&current).await?;
            match self.policy.next(&metadata, &mut context) {
                Ok(RedirectDecision::Follow(next)) => {
                    body.release();
                    current = current.redirected(next, context.cookie());
                }
                Ok(RedirectDecision::Terminal) => {
                    return accept_terminal(metadata, body, spec.max_size());
                }
                Err(e) => {
                    body.release();
                    return Err(e);
                }
            }
        }
    }
}

fn accept_terminal(
    metadata: ResponseMetadata,
    mut body: HttpChunkSource,
    max_size: Option<u64>,
) -> Result<(ResponseMetadata, HttpChunkSource), FetchError> {
    if !metadata.is_success() {
        body.release();
        debug!(status = metadata.status(), url = %metadata.url(), "terminal response is not a success");
        return Err(classify_status(metadata));
    }

    if let Some(limit) = max_size
        && let Some(declared) = metadata.content_length()
        && declared > limit
    {
        body.release();
        warn!(url = %metadata.url(), limit, declared, "declared size exceeds maximum");
        return Err(FetchError::too_large_declared(limit, metadata));
    }

    Ok((metadata, body))
}

fn build_client(spec: &RequestSpec) -> Result<Client, FetchError> {
    let url = spec.url().as_str();
    let mut builder = Client::builder()
        .connect_timeout(spec.connect_timeout())
        .read_timeout(spec.read_timeout())
        .redirect(reqwest::redirect::Policy::none())
        .http1_only()
        .pool_max_idle_per_host(0)
        .user_agent(user_agent::default_user_agent());

    if let Some(proxy) = spec.proxy() {
        let resolved = proxy
            .to_proxy()
            .map_err(|e| FetchError::invalid_url(proxy.url().as_str(), e.to_string()))?;
        builder = builder.proxy(resolved);
    }

    let tls = spec.tls();
    if !tls.verify() {
        warn!(url, "TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }
    for pem in tls.extra_roots_pem() {
        let certificate = Certificate::from_pem(pem).map_err(|e| FetchError::Ssl {
            url: url.to_string(),
            message: format!("invalid trust anchor: {e}"),
            source: Some(e),
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    builder.build().map_err(|e| FetchError::Transport {
        url: url.to_string(),
        source: e,
    })
}
