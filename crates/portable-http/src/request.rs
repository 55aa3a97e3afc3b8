//! HTTP request and builder

use std::any::Any;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::body::Body;
use crate::client::Client;
use crate::error::{HttpError, Result};
use crate::headers::Headers;
use crate::response::Response;

/// An HTTP request ready to be sent through a [`Client`]
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Body,
    timeout: Option<Duration>,
    persistent_connection: Option<bool>,
    follow_redirects: Option<bool>,
    max_redirects: Option<usize>,
}

impl Request {
    /// Create a request with no headers, no body and engine defaults
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Body::Empty,
            timeout: None,
            persistent_connection: None,
            follow_redirects: None,
            max_redirects: None,
        }
    }

    /// Start building a request
    pub fn builder(method: Method, url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, url.as_ref())
    }

    /// GET request builder
    pub fn get(url: impl AsRef<str>) -> RequestBuilder {
        Self::builder(Method::GET, url)
    }

    /// POST request builder
    pub fn post(url: impl AsRef<str>) -> RequestBuilder {
        Self::builder(Method::POST, url)
    }

    /// PATCH request builder
    pub fn patch(url: impl AsRef<str>) -> RequestBuilder {
        Self::builder(Method::PATCH, url)
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request-level headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the request-level headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Request body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the request body
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Timeout for receiving the response head, if any
    ///
    /// It covers connecting, writing the request body and following
    /// redirects. Reading the response body afterwards is not bounded.
    /// A zero duration is treated as no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }

    /// Set the timeout; `None` or zero disables it
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Keep-alive override, `None` for the engine default
    pub fn persistent_connection(&self) -> Option<bool> {
        self.persistent_connection
    }

    /// Set the keep-alive override
    pub fn set_persistent_connection(&mut self, persistent: Option<bool>) {
        self.persistent_connection = persistent;
    }

    /// Redirect-following override, `None` for the engine default
    pub fn follow_redirects(&self) -> Option<bool> {
        self.follow_redirects
    }

    /// Set the redirect-following override
    pub fn set_follow_redirects(&mut self, follow: Option<bool>) {
        self.follow_redirects = follow;
    }

    /// Redirect limit override, `None` for the engine default
    pub fn max_redirects(&self) -> Option<usize> {
        self.max_redirects
    }

    /// Set the redirect limit override
    pub fn set_max_redirects(&mut self, max: Option<usize>) {
        self.max_redirects = max;
    }

    pub(crate) fn into_parts(self) -> RequestParts {
        let timeout = self.timeout();
        RequestParts {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout,
            persistent_connection: self.persistent_connection,
            follow_redirects: self.follow_redirects,
            max_redirects: self.max_redirects,
        }
    }
}

/// Owned pieces of a request, consumed by a backend
#[derive(Debug)]
pub(crate) struct RequestParts {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Body,
    pub timeout: Option<Duration>,
    pub persistent_connection: Option<bool>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<usize>,
}

/// HTTP request builder
///
/// The first error hit while building (bad URL, unknown dynamic body,
/// serialization failure) is kept and returned by [`RequestBuilder::build`]
/// or [`RequestBuilder::send`], before any network I/O happens.
#[derive(Debug)]
pub struct RequestBuilder {
    inner: Result<Request>,
}

impl RequestBuilder {
    pub(crate) fn new(method: Method, url: &str) -> Self {
        Self {
            inner: Url::parse(url)
                .map(|url| Request::new(method, url))
                .map_err(HttpError::from),
        }
    }

    fn map(mut self, f: impl FnOnce(&mut Request) -> Result<()>) -> Self {
        if let Ok(request) = self.inner.as_mut() {
            if let Err(err) = f(request) {
                self.inner = Err(err);
            }
        }
        self
    }

    /// Add a header to the request
    pub fn header(self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|request| {
            request.headers.append(key.as_ref(), value.as_ref());
            Ok(())
        })
    }

    /// Add several headers to the request
    pub fn headers(self, headers: &Headers) -> Self {
        self.map(|request| {
            for (name, values) in headers.iter() {
                for value in values {
                    request.headers.append(name, value.as_str());
                }
            }
            Ok(())
        })
    }

    /// Set the request body
    pub fn body(self, body: impl Into<Body>) -> Self {
        self.map(|request| {
            request.body = body.into();
            Ok(())
        })
    }

    /// Set the request body from a dynamically typed value
    ///
    /// See [`Body::from_dynamic`] for the accepted types.
    pub fn body_any(self, value: Box<dyn Any + Send>) -> Self {
        self.map(|request| {
            request.body = Body::from_dynamic(value)?;
            Ok(())
        })
    }

    /// Set the request body as JSON
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Self {
        self.map(|request| {
            let bytes = serde_json::to_vec(body)?;
            request.headers.insert("Content-Type", "application/json");
            request.body = Body::from(bytes);
            Ok(())
        })
    }

    /// Set the request body as form data
    pub fn form<T: Serialize + ?Sized>(self, body: &T) -> Self {
        self.map(|request| {
            let encoded = serde_urlencoded::to_string(body)?;
            request
                .headers
                .insert("Content-Type", "application/x-www-form-urlencoded");
            request.body = Body::from(encoded);
            Ok(())
        })
    }

    /// Fail with [`HttpError::Timeout`] if the response head has not arrived
    /// within `timeout`
    ///
    /// Streaming the response body is not covered.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.map(|request| {
            request.timeout = Some(timeout);
            Ok(())
        })
    }

    /// Ask for (or refuse) a persistent connection
    pub fn persistent_connection(self, persistent: bool) -> Self {
        self.map(|request| {
            request.persistent_connection = Some(persistent);
            Ok(())
        })
    }

    /// Enable or disable automatic redirect following
    pub fn follow_redirects(self, follow: bool) -> Self {
        self.map(|request| {
            request.follow_redirects = Some(follow);
            Ok(())
        })
    }

    /// Maximum number of redirects to follow
    pub fn max_redirects(self, max: usize) -> Self {
        self.map(|request| {
            request.max_redirects = Some(max);
            Ok(())
        })
    }

    /// Finish building
    pub fn build(self) -> Result<Request> {
        self.inner
    }

    /// Send the request through `client` and return the raw response
    pub async fn send<C>(self, client: &C) -> Result<Response>
    where
        C: Client + ?Sized,
    {
        let request = self.build()?;
        client.send(request).await
    }

    /// Send the request and deserialize a successful response as JSON
    pub async fn send_json<C, R>(self, client: &C) -> Result<R>
    where
        C: Client + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(client).await?;
        response.error_for_status().await?.json().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let request = Request::post("https://example.com/upload")
            .header("X-Trace", "1")
            .body("payload")
            .timeout(Duration::from_secs(5))
            .persistent_connection(false)
            .follow_redirects(false)
            .max_redirects(3)
            .build()
            .expect("Valid request");

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.url().as_str(), "https://example.com/upload");
        assert_eq!(request.headers().get("x-trace"), Some("1"));
        assert!(matches!(request.body(), Body::Bytes(b) if b.len() == 7));
        assert_eq!(request.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(request.persistent_connection(), Some(false));
        assert_eq!(request.follow_redirects(), Some(false));
        assert_eq!(request.max_redirects(), Some(3));
    }

    #[test]
    fn test_defaults_leave_engine_in_charge() {
        let request = Request::get("https://example.com")
            .build()
            .expect("Valid request");

        assert!(request.body().is_empty());
        assert_eq!(request.timeout(), None);
        assert_eq!(request.persistent_connection(), None);
        assert_eq!(request.follow_redirects(), None);
        assert_eq!(request.max_redirects(), None);
    }

    #[test]
    fn test_zero_timeout_means_no_timeout() {
        let request = Request::get("https://example.com")
            .timeout(Duration::ZERO)
            .build()
            .expect("Valid request");
        assert_eq!(request.timeout(), None);
        assert_eq!(request.into_parts().timeout, None);
    }

    #[test]
    fn test_invalid_url_is_argument_error() {
        let result = Request::get("not a url").header("a", "b").build();
        assert!(matches!(result, Err(HttpError::Argument(_))));
    }

    #[test]
    fn test_unknown_dynamic_body_is_kept_until_build() {
        let result = Request::post("https://example.com")
            .body_any(Box::new(42u64))
            .header("X-After", "ignored")
            .build();

        match result {
            Err(HttpError::Argument(msg)) => assert_eq!(msg, "Unknown request body"),
            other => panic!("Expected HttpError::Argument, got {:?}", other),
        }
    }

    #[test]
    fn test_json_sets_content_type() {
        let request = Request::post("https://example.com")
            .json(&serde_json::json!({"name": "test"}))
            .build()
            .expect("Valid request");

        assert_eq!(request.headers().get("content-type"), Some("application/json"));
        assert!(matches!(request.body(), Body::Bytes(b) if b.as_ref() == br#"{"name":"test"}"#));
    }

    #[test]
    fn test_form_sets_content_type() {
        let request = Request::post("https://example.com")
            .form(&[("a", "1"), ("b", "two words")])
            .build()
            .expect("Valid request");

        assert_eq!(
            request.headers().get("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert!(matches!(request.body(), Body::Bytes(b) if b.as_ref() == b"a=1&b=two+words"));
    }

    #[test]
    fn test_headers_appends_all_values() {
        let extra: Headers = [("Accept", "text/html"), ("accept", "text/plain")]
            .into_iter()
            .collect();
        let request = Request::get("https://example.com")
            .headers(&extra)
            .build()
            .expect("Valid request");

        assert_eq!(request.headers().get_all("ACCEPT").map(|v| v.len()), Some(2));
    }
}
