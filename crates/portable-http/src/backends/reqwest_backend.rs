//! reqwest-based engine adapter

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH};
use reqwest::redirect::{Action, Attempt, Policy};
use reqwest::{Method, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::trace;
use url::Url;

use crate::body::Body;
use crate::error::{HttpError, Result};
use crate::headers::Headers;
use crate::request::RequestParts;
use crate::response::{RedirectInfo, Response, ResponseBody};

/// Redirect limit used when a request does not set one
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// User-Agent sent when the client is not configured with one
pub const DEFAULT_USER_AGENT: &str = concat!("portable-http/", env!("CARGO_PKG_VERSION"));

/// Per-URI proxy resolver
pub(crate) type ProxyResolver = Arc<dyn Fn(&Url) -> Option<Url> + Send + Sync>;

tokio::task_local! {
    static REDIRECTS: Arc<RedirectRecorder>;
}

/// Engine settings collected by [`HttpClientBuilder`](crate::HttpClientBuilder)
#[derive(Clone, Default)]
pub(crate) struct EngineOptions {
    pub proxy: Option<String>,
    pub proxy_fn: Option<ProxyResolver>,
    pub idle_timeout: Option<Duration>,
    pub auto_uncompress: Option<bool>,
    pub user_agent: Option<String>,
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("proxy", &self.proxy)
            .field("proxy_fn", &self.proxy_fn.as_ref().map(|_| "<resolver>"))
            .field("idle_timeout", &self.idle_timeout)
            .field("auto_uncompress", &self.auto_uncompress)
            .field("user_agent", &self.user_agent)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Build the engine
pub(crate) fn build_engine(options: &EngineOptions) -> Result<reqwest::Client> {
    let auto_uncompress = options.auto_uncompress.unwrap_or(true);
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .redirect(redirect_policy())
        .gzip(auto_uncompress)
        .brotli(auto_uncompress)
        .deflate(auto_uncompress)
        .zstd(auto_uncompress);

    if options.accept_invalid_certs {
        tracing::warn!("TLS certificate validation is disabled");
    }

    if let Some(idle_timeout) = options.idle_timeout {
        builder = builder.pool_idle_timeout(idle_timeout);
    }

    match options.user_agent.as_deref() {
        None => builder = builder.user_agent(DEFAULT_USER_AGENT),
        Some("") => {}
        Some(agent) => builder = builder.user_agent(agent),
    }

    // Resolver first: reqwest uses the first proxy that answers for a URL.
    if let Some(resolver) = options.proxy_fn.clone() {
        builder = builder.proxy(reqwest::Proxy::custom(move |url| resolver(url)));
    }

    if let Some(proxy_url) = &options.proxy {
        let proxy =
            reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| HttpError::Proxy(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| HttpError::Build(e.to_string()))
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| match REDIRECTS.try_with(Arc::clone) {
        Ok(recorder) => recorder.decide(attempt),
        Err(_) if attempt.previous().len() > DEFAULT_MAX_REDIRECTS => {
            attempt.error(format!("too many redirects (limit {})", DEFAULT_MAX_REDIRECTS))
        }
        Err(_) => attempt.follow(),
    })
}

#[derive(Debug)]
struct RedirectState {
    method: Method,
    hops: Vec<RedirectInfo>,
}

/// Applies one request's redirect options and records the hops taken
#[derive(Debug)]
pub(crate) struct RedirectRecorder {
    follow: bool,
    max: usize,
    state: Mutex<RedirectState>,
}

impl RedirectRecorder {
    pub(crate) fn new(method: Method, follow: bool, max: usize) -> Self {
        Self {
            follow,
            max,
            state: Mutex::new(RedirectState {
                method,
                hops: Vec::new(),
            }),
        }
    }

    fn decide(&self, attempt: Attempt<'_>) -> Action {
        if !self.follow {
            return attempt.stop();
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.hops.len() >= self.max {
            return attempt.error(format!("too many redirects (limit {})", self.max));
        }

        let status = attempt.status();
        state.method = next_method(status, &state.method);
        let hop = RedirectInfo {
            status: status.as_u16(),
            method: state.method.clone(),
            location: attempt.url().clone(),
        };
        trace!(status = hop.status, location = %hop.location, "following redirect");
        state.hops.push(hop);
        attempt.follow()
    }

    fn take_hops(&self) -> Vec<RedirectInfo> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut state.hops)
    }
}

/// Method the engine uses for the hop after a redirect with `status`
fn next_method(status: StatusCode, current: &Method) -> Method {
    match status {
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
            if *current != Method::GET && *current != Method::HEAD =>
        {
            Method::GET
        }
        _ => current.clone(),
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, values) in headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::Argument(format!("Invalid header name: {}", name)))?;
        for value in values {
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::Argument(format!("Invalid value for header {}", name)))?;
            map.append(header_name.clone(), header_value);
        }
    }
    Ok(map)
}

/// Set `Content-Length` unless the caller already did
fn default_content_length(map: &mut HeaderMap, length: u64) {
    if !map.contains_key(CONTENT_LENGTH) {
        map.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
}

/// Run one exchange on the engine and translate the result
pub(crate) async fn execute(
    engine: &reqwest::Client,
    default_headers: &Headers,
    parts: RequestParts,
) -> Result<Response> {
    let RequestParts {
        method,
        url,
        headers,
        body,
        persistent_connection,
        follow_redirects,
        max_redirects,
        ..
    } = parts;

    let mut header_map = to_header_map(&headers.merged_over(default_headers))?;

    if persistent_connection == Some(false) && !header_map.contains_key(CONNECTION) {
        header_map.insert(CONNECTION, HeaderValue::from_static("close"));
    }

    let recorder = Arc::new(RedirectRecorder::new(
        method.clone(),
        follow_redirects.unwrap_or(true),
        max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
    ));

    trace!(body = ?body, "dispatching request body");
    let engine_body = match body {
        Body::Empty => None,
        Body::Bytes(bytes) => {
            default_content_length(&mut header_map, bytes.len() as u64);
            Some(reqwest::Body::from(bytes))
        }
        Body::Factory(factory) => {
            let stream = factory().await?;
            Some(reqwest::Body::wrap_stream(stream))
        }
        Body::Stream(stream) => Some(reqwest::Body::wrap_stream(stream)),
        Body::File(path) => {
            let file = tokio::fs::File::open(&path).await?;
            let length = file.metadata().await?.len();
            default_content_length(&mut header_map, length);
            Some(reqwest::Body::wrap_stream(ReaderStream::new(file)))
        }
    };

    let mut builder = engine.request(method, url).headers(header_map);
    if let Some(engine_body) = engine_body {
        builder = builder.body(engine_body);
    }

    let response = REDIRECTS.scope(recorder.clone(), builder.send()).await?;

    let status = response.status();
    let redirects = recorder.take_hops();
    let remote_address = response.remote_addr();
    // Without redirects the request and the response share one connection.
    let request_address = if redirects.is_empty() {
        remote_address
    } else {
        None
    };

    Ok(Response {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        headers: Headers::from(response.headers()),
        url: response.url().clone(),
        content_length: response.content_length(),
        redirects,
        request_address,
        remote_address,
        body: ResponseBody::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(io::Error::other))
                .boxed(),
        ),
    })
}
