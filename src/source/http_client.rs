use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Thin JSON-over-HTTP client. Failures are sorted into `Transport`
/// (connect, timeout, non-2xx, body read) and `Decode` (JSON shape).
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { inner })
    }

    /// GET `url` and decode the body as `T`. No retry: the caller's poll
    /// interval is the retry policy.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("GET {}: HTTP {}", url, status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("GET {}: reading body: {}", url, e)))?;

        serde_json::from_str(&body).map_err(|e| Error::Decode(format!("GET {}: {}", url, e)))
    }
}
