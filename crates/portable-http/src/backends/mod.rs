//! Engine backends

pub(crate) mod host_limit;
pub(crate) mod reqwest_backend;

pub(crate) use host_limit::HostLimiter;
pub use reqwest_backend::{DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
pub(crate) use reqwest_backend::{build_engine, execute, EngineOptions, ProxyResolver};
