//! HTTP response types

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use url::Url;

use crate::body::BodyStream;
use crate::error::{HttpError, Result};
use crate::headers::Headers;

/// One redirect hop that was followed automatically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    /// Status code of the redirect response
    pub status: u16,
    /// Method used for the next hop
    pub method: Method,
    /// Location that was followed
    pub location: Url,
}

/// Streaming response body
pub struct ResponseBody {
    inner: BodyStream,
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

impl ResponseBody {
    pub(crate) fn new(inner: BodyStream) -> Self {
        Self { inner }
    }

    pub(crate) fn into_stream(self) -> BodyStream {
        self.inner
    }

    /// Collect the whole body
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.inner.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }

    /// Collect the body as UTF-8 text, replacing invalid sequences
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Collect and deserialize the body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(HttpError::from)
    }
}

impl Stream for ResponseBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// HTTP response returned by [`Client::send`](crate::Client::send)
#[derive(Debug)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) reason: String,
    pub(crate) headers: Headers,
    pub(crate) url: Url,
    pub(crate) content_length: Option<u64>,
    pub(crate) redirects: Vec<RedirectInfo>,
    pub(crate) request_address: Option<SocketAddr>,
    pub(crate) remote_address: Option<SocketAddr>,
    pub(crate) body: ResponseBody,
}

impl Response {
    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase for the status code, empty when unknown
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Check if the response status is a success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status is a redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Check if the response status is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Response headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Final URL, after any redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Body length advertised by the server, if known
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Redirects followed to reach this response, oldest first
    pub fn redirects(&self) -> &[RedirectInfo] {
        &self.redirects
    }

    /// Peer address the original request was sent to, when known
    pub fn request_address(&self) -> Option<SocketAddr> {
        self.request_address
    }

    /// Peer address this response was received from, when known
    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }

    /// Take the streaming body
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Get the response body as bytes
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.bytes().await
    }

    /// Get the response body as text
    pub async fn text(self) -> Result<String> {
        self.body.text().await
    }

    /// Get the response body as JSON
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        self.body.json().await
    }

    /// Turn a non-2xx response into [`HttpError::Status`] carrying the body text
    pub async fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let message = self.text().await.unwrap_or_default();
        Err(HttpError::Status { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, chunks: &[&'static str]) -> Response {
        let stream = futures::stream::iter(
            chunks
                .iter()
                .copied()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                .collect::<Vec<_>>(),
        )
        .boxed();
        Response {
            status,
            reason: String::new(),
            headers: Headers::new(),
            url: Url::parse("http://localhost/").expect("Valid URL"),
            content_length: None,
            redirects: Vec::new(),
            request_address: None,
            remote_address: None,
            body: ResponseBody::new(stream),
        }
    }

    #[test]
    fn test_status_classes() {
        assert!(response(204, &[]).is_success());
        assert!(response(301, &[]).is_redirect());
        assert!(response(404, &[]).is_client_error());
        assert!(response(503, &[]).is_server_error());
        assert!(!response(503, &[]).is_success());
    }

    #[tokio::test]
    async fn test_body_chunks_are_concatenated() {
        let text = response(200, &["hel", "lo"])
            .text()
            .await
            .expect("Body should be readable");
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_json_body() {
        let value: serde_json::Value = response(200, &[r#"{"ok":"#, "true}"])
            .json()
            .await
            .expect("Valid JSON");
        assert_eq!(value, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_for_status_carries_body() {
        let result = response(418, &["short and stout"])
            .error_for_status()
            .await;
        match result {
            Err(HttpError::Status { status, message }) => {
                assert_eq!(status, 418);
                assert_eq!(message, "short and stout");
            }
            other => panic!("Expected HttpError::Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_body_stream_error_surfaces() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionAborted, "gone")),
        ])
        .boxed();
        let result = ResponseBody::new(stream).bytes().await;
        assert!(matches!(result, Err(HttpError::Io(_))));
    }
}
