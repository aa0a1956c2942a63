// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// Page fetcher sharing one client and a bound on in-flight requests.
///
/// Cloning is cheap; clones share the connection pool and the semaphore.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    permits: Arc<Semaphore>,
}

impl HttpFetcher {
    /// Build a fetcher from crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(config)?,
            config.max_concurrent,
        ))
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, max_concurrent: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Fetch a page body.
    ///
    /// Returns `(Some(body), status)` on success, `(None, status)` for any
    /// status >= 400 and `(None, 0)` when the request itself failed.
    pub async fn get(&self, url: &str) -> (Option<String>, u16) {
        let Ok(_permit) = self.permits.acquire().await else {
            return (None, 0);
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("HTTP error for {}: {}", url, e);
                return (None, 0);
            }
        };

        let status = response.status().as_u16();
        if status >= 400 {
            log::debug!("HTTP {} for {}", status, url);
            return (None, status);
        }

        match response.text().await {
            Ok(body) => (Some(body), status),
            Err(e) => {
                log::debug!("Failed to read body of {}: {}", url, e);
                (None, 0)
            }
        }
    }

    /// Requests that could start right now without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
