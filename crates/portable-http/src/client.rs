//! HTTP client interface and the native engine client

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};
use tracing::{debug, instrument};
use url::Url;

use crate::backends::{self, EngineOptions, HostLimiter, ProxyResolver};
use crate::error::{HttpError, Result};
use crate::headers::Headers;
use crate::request::Request;
use crate::response::{Response, ResponseBody};

/// Common HTTP client interface
///
/// Implementations delegate to an environment-specific engine.
#[async_trait]
pub trait Client: Send + Sync + std::fmt::Debug {
    /// Send `request` and wait for the response head
    ///
    /// The body of the returned [`Response`] is streamed lazily.
    async fn send(&self, request: Request) -> Result<Response>;

    /// Release the engine
    ///
    /// With `force` in-flight exchanges are aborted immediately, otherwise
    /// this waits for them to finish. Later sends fail with
    /// [`HttpError::Closed`].
    async fn close(&self, force: bool);
}

/// Convenience methods available on every [`Client`]
pub trait ClientExt: Client {
    /// GET request, returns JSON deserialized to R
    fn fetch<R: DeserializeOwned>(&self, url: &str) -> impl Future<Output = Result<R>> + Send;

    /// POST with JSON body, returns JSON deserialized to R
    fn post_json<B, R>(&self, url: &str, body: &B) -> impl Future<Output = Result<R>> + Send
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned;

    /// POST with form data, returns JSON deserialized to R
    fn post_form<F, R>(&self, url: &str, form: &F) -> impl Future<Output = Result<R>> + Send
    where
        F: Serialize + ?Sized + Sync,
        R: DeserializeOwned;

    /// PATCH with JSON body, returns JSON deserialized to R
    fn patch_json<B, R>(&self, url: &str, body: &B) -> impl Future<Output = Result<R>> + Send
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned;

    /// GET request returning the response unread
    fn get_raw(&self, url: &str) -> impl Future<Output = Result<Response>> + Send;
}

impl<C: Client + ?Sized> ClientExt for C {
    async fn fetch<R: DeserializeOwned>(&self, url: &str) -> Result<R> {
        Request::get(url).send_json(self).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        Request::post(url).json(body).send_json(self).await
    }

    async fn post_form<F, R>(&self, url: &str, form: &F) -> Result<R>
    where
        F: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        Request::post(url).form(form).send_json(self).await
    }

    async fn patch_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        Request::patch(url).json(body).send_json(self).await
    }

    async fn get_raw(&self, url: &str) -> Result<Response> {
        Request::get(url).send(self).await
    }
}

#[derive(Debug)]
struct Shared {
    engine: RwLock<Option<reqwest::Client>>,
    default_headers: Headers,
    host_limiter: Option<HostLimiter>,
    in_flight: TaskTracker,
    shutdown: CancellationToken,
}

/// HTTP client backed by the native engine
///
/// Cloning is cheap; clones share the engine, the default headers and the
/// closed state.
#[derive(Debug, Clone)]
pub struct HttpClient {
    shared: Arc<Shared>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new HTTP client builder
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Headers merged into every request
    pub fn default_headers(&self) -> &Headers {
        &self.shared.default_headers
    }

    /// Whether [`Client::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.shared.in_flight.is_closed()
    }
}

/// Keeps an exchange counted as in flight until the response body is done
struct ExchangeGuard {
    _token: TaskTrackerToken,
    _permit: Option<OwnedSemaphorePermit>,
}

fn guard_body(body: ResponseBody, guard: ExchangeGuard, shutdown: CancellationToken) -> ResponseBody {
    let state = Some((body.into_stream(), guard, shutdown));
    let stream = futures::stream::unfold(state, |state| async move {
        let (mut stream, guard, shutdown) = state?;
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            chunk = stream.next() => Some(chunk),
        };
        match next {
            None => Some((
                Err(io::Error::new(io::ErrorKind::ConnectionAborted, "client closed")),
                None,
            )),
            Some(chunk) => chunk.map(|chunk| (chunk, Some((stream, guard, shutdown)))),
        }
    });
    ResponseBody::new(stream.boxed())
}

#[async_trait]
impl Client for HttpClient {
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    async fn send(&self, request: Request) -> Result<Response> {
        let token = self.shared.in_flight.token();
        let engine = self
            .shared
            .engine
            .read()
            .await
            .clone()
            .ok_or(HttpError::Closed)?;

        let parts = request.into_parts();
        let timeout = parts.timeout;
        let url = parts.url.clone();
        let shared = &self.shared;

        let exchange = async move {
            let permit = match &shared.host_limiter {
                Some(limiter) => Some(limiter.acquire(&url).await?),
                None => None,
            };
            let response = backends::execute(&engine, &shared.default_headers, parts).await?;
            Ok::<_, HttpError>((response, permit))
        };

        let timed = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, exchange)
                    .await
                    .map_err(|_| HttpError::Timeout(limit))?,
                None => exchange.await,
            }
        };

        let (mut response, permit) = tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => return Err(HttpError::Closed),
            result = timed => result?,
        };

        debug!(
            status = response.status(),
            redirects = response.redirects().len(),
            "exchange complete"
        );

        let guard = ExchangeGuard {
            _token: token,
            _permit: permit,
        };
        response.body = guard_body(response.body, guard, self.shared.shutdown.clone());
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn close(&self, force: bool) {
        let engine = self.shared.engine.write().await.take();
        self.shared.in_flight.close();

        if force {
            self.shared.shutdown.cancel();
        } else {
            self.shared.in_flight.wait().await;
        }

        drop(engine);
        debug!("client closed");
    }
}

/// HTTP client builder for configuring proxy, TLS and connection settings
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    options: EngineOptions,
    default_headers: Headers,
    max_connections_per_host: Option<usize>,
}

impl HttpClientBuilder {
    /// Accept invalid TLS certificates
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.options.accept_invalid_certs = accept;
        self
    }

    /// Send every request through this proxy
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.options.proxy = Some(url.into());
        self
    }

    /// Pick a proxy per request URL; `None` falls through to the static proxy
    pub fn proxy_fn<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Url) -> Option<Url> + Send + Sync + 'static,
    {
        let resolver: ProxyResolver = Arc::new(resolver);
        self.options.proxy_fn = Some(resolver);
        self
    }

    /// Set a proxy URL used only for hosts matching `pattern`
    pub fn proxy_with_matcher(self, url: Url, pattern: &str) -> Result<Self> {
        let matcher = regex::Regex::new(pattern)
            .map_err(|e| HttpError::Proxy(format!("Invalid proxy pattern: {}", e)))?;
        Ok(self.proxy_fn(move |target| {
            if matcher.is_match(target.host_str().unwrap_or("")) {
                Some(url.clone())
            } else {
                None
            }
        }))
    }

    /// Replace the headers merged into every request
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    /// Add one header merged into every request
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.append(key, value);
        self
    }

    /// How long an idle pooled connection is kept
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = Some(timeout);
        self
    }

    /// Maximum number of concurrent exchanges per scheme, host and port
    pub fn max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = Some(max);
        self
    }

    /// Transparently decompress gzip, brotli, deflate and zstd bodies
    pub fn auto_uncompress(mut self, enabled: bool) -> Self {
        self.options.auto_uncompress = Some(enabled);
        self
    }

    /// User-Agent for every request; an empty string sends none
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.options.user_agent = Some(agent.into());
        self
    }

    /// Build the HTTP client
    pub fn build(self) -> Result<HttpClient> {
        debug!(options = ?self.options, "building HTTP client");
        let engine = backends::build_engine(&self.options)?;

        Ok(HttpClient {
            shared: Arc::new(Shared {
                engine: RwLock::new(Some(engine)),
                default_headers: self.default_headers,
                host_limiter: self.max_connections_per_host.map(HostLimiter::new),
                in_flight: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

/// Convenience function for simple GET requests
pub async fn fetch<R: DeserializeOwned>(url: &str) -> Result<R> {
    HttpClient::new()?.fetch(url).await
}
