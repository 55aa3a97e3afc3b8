//! Cross-environment HTTP client abstraction
//!
//! This crate provides a common [`Client`] / [`Request`] / [`Response`] interface
//! and a native implementation, [`HttpClient`], that delegates connection
//! management, TLS, proxies and redirect following to the reqwest engine.
//!
//! # Example
//!
//! ```no_run
//! use portable_http::{ClientExt, HttpClient, HttpError};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct ApiResponse {
//!     message: String,
//! }
//!
//! async fn example() -> Result<ApiResponse, HttpError> {
//!     let client = HttpClient::builder()
//!         .default_header("Accept", "application/json")
//!         .build()?;
//!     client.fetch("https://api.example.com/data").await
//! }
//! ```
//!
//! Requests with bodies, timeouts or redirect settings go through
//! [`Request::builder`]:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use portable_http::{Body, Client, HttpClient, HttpError, Request};
//!
//! async fn upload(client: &HttpClient) -> Result<u16, HttpError> {
//!     let response = Request::post("https://api.example.com/upload")
//!         .body(Body::file("report.csv"))
//!         .timeout(Duration::from_secs(30))
//!         .follow_redirects(false)
//!         .send(client)
//!         .await?;
//!     client.close(false).await;
//!     Ok(response.status())
//! }
//! ```

mod backends;
mod body;
mod client;
mod config;
mod error;
mod headers;
mod request;
mod response;

pub use backends::{DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
pub use body::{Body, BodyStream, StreamFactory};
pub use client::{fetch, Client, ClientExt, HttpClient, HttpClientBuilder};
pub use self::config::{ClientConfig, ENV_PREFIX};
pub use error::{HttpError, Result};
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use reqwest::Method;
pub use response::{RedirectInfo, Response, ResponseBody};
pub use url::Url;
