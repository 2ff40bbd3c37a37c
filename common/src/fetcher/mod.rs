//! Fetching remote resources

mod identity;
mod proxy;

pub use identity::*;
pub use proxy::*;

use crate::limiter::RateLimiter;
use reqwest::{Client, ClientBuilder, Identity, IntoUrl, Proxy, Response, header::HeaderMap, redirect};
use std::{sync::Arc, time::Duration};

/// Fetch data using HTTP.
///
/// This is some functionality sitting on top of an HTTP client: TLS and
/// proxy setup, extra request headers, redirect logging, and an optional
/// rate limit applied to every outgoing request.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Option<Arc<RateLimiter>>,
    verbose: bool,
}

/// Error when retrieving
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Options for the [`Fetcher`]
#[non_exhaustive]
#[derive(Clone, Default)]
pub struct FetcherOptions {
    pub timeout: Option<Duration>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Client certificate for mutual TLS.
    pub identity: Option<Identity>,
    /// Headers added to every outgoing request.
    pub headers: HeaderMap,
    /// Maximum number of HTTP operations per second.
    pub rate: Option<f64>,
    /// Log every outgoing request.
    pub verbose: bool,
}

impl FetcherOptions {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: impl Into<Duration>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn identity(mut self, identity: impl Into<Option<Identity>>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn rate(mut self, rate: impl Into<Option<f64>>) -> Self {
        self.rate = rate.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

const MAX_REDIRECTS: usize = 10;

impl Fetcher {
    /// Create a new fetcher from options.
    pub fn new(options: FetcherOptions) -> anyhow::Result<Self> {
        let mut client = ClientBuilder::new();

        if let Some(timeout) = options.timeout {
            client = client.timeout(timeout);
        }
        if options.insecure {
            client = client.danger_accept_invalid_certs(true);
        }
        if let Some(identity) = options.identity {
            client = client.identity(identity);
        }
        if !options.headers.is_empty() {
            client = client.default_headers(options.headers);
        }

        client = client.proxy(Proxy::custom(proxy_from_environment));
        client = client.redirect(redirect::Policy::custom(|attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let via = attempt
                .previous()
                .iter()
                .map(|url| url.to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            log::debug!("Redirecting to {url} via {via}", url = attempt.url());
            attempt.follow()
        }));

        Ok(Self {
            client: client.build()?,
            limiter: options.rate.map(|rate| Arc::new(RateLimiter::new(rate))),
            verbose: options.verbose,
        })
    }

    /// Perform a GET request, honoring the rate limit.
    ///
    /// Any response is returned as-is, status code handling is up to the
    /// caller.
    pub async fn get(&self, url: impl IntoUrl) -> Result<Response, Error> {
        let url = url.into_url()?;

        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        if self.verbose {
            log::debug!("http method=GET url={url}");
        }

        Ok(self.client.get(url).send().await?)
    }

    /// Perform a POST request with a multipart body, honoring the rate
    /// limit.
    pub async fn post_multipart(
        &self,
        url: impl IntoUrl,
        form: reqwest::multipart::Form,
    ) -> Result<Response, Error> {
        let url = url.into_url()?;

        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        if self.verbose {
            log::debug!("http method=POST url={url}");
        }

        Ok(self.client.post(url).multipart(form).send().await?)
    }
}
