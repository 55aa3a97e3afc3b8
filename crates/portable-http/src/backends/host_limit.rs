//! Per-host concurrency limit

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::error::{HttpError, Result};

/// Caps the number of concurrent exchanges per scheme, host and port
///
/// Hosts with no exchange in flight are dropped on the next acquire.
#[derive(Debug)]
pub(crate) struct HostLimiter {
    max_per_host: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    pub(crate) fn new(max_per_host: usize) -> Self {
        Self {
            max_per_host: max_per_host.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn key(url: &Url) -> String {
        format!(
            "{}://{}:{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default()
        )
    }

    /// Wait for a free slot on the host of `url`
    ///
    /// The slot is held until the returned permit is dropped.
    pub(crate) async fn acquire(&self, url: &Url) -> Result<OwnedSemaphorePermit> {
        let semaphore = {
            let mut hosts = self.hosts.lock().await;
            // An idle host's semaphore is referenced only by the map.
            hosts.retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
            hosts
                .entry(Self::key(url))
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_host)))
                .clone()
        };
        semaphore.acquire_owned().await.map_err(|_| HttpError::Closed)
    }
}
