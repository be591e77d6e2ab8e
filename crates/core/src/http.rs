//! Direct HTTP probes
//!
//! Used where the browser cannot observe the outcome, e.g. asserting that a
//! deleted file answers 404. Only the status code matters; redirects are
//! followed and any status is a successful probe.

use crate::errors::{HttpError, Result};
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches a URL and reports its HTTP status
#[async_trait::async_trait]
pub trait HttpProbe: Send + Sync {
    async fn status(&self, url: &str) -> Result<u16>;
}

/// Probe backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lifeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Request {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpProbe for ReqwestProbe {
    #[instrument(skip(self))]
    async fn status(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status().as_u16();
        debug!("GET {} -> {}", url, status);
        Ok(status)
    }
}

pub mod mock {
    //! Probe answering from a fixed URL → status table

    use super::HttpProbe;
    use crate::errors::Result;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    pub struct MockHttpProbe {
        statuses: Arc<Mutex<HashMap<String, u16>>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockHttpProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_status(self, url: &str, status: u16) -> Self {
            self.statuses
                .lock()
                .unwrap()
                .insert(url.to_string(), status);
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl HttpProbe for MockHttpProbe {
        /// Unknown URLs answer 404
        async fn status(&self, url: &str) -> Result<u16> {
            self.requests.lock().unwrap().push(url.to_string());
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or(404))
        }
    }
}
