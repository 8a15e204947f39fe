//! HTTP Blackboard Client
//!
//! A `Space` implementation backed by a remote board server. Writes go out
//! with retry and exponential backoff; blocking takes are mapped onto bounded
//! server-side long-polls that the client re-issues until its own deadline
//! (or forever) elapses.

use super::protocol::*;
use super::types::*;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Extra headroom on the HTTP timeout above the long-poll the server holds.
const POLL_HTTP_MARGIN: Duration = Duration::from_secs(5);

pub struct HttpSpace {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSpace {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn post_with_retry<T: serde::Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &T,
        timeout: Duration,
        attempts: usize,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        anyhow::bail!("{} failed: {}", endpoint, resp.status());
                    }
                    return Ok(resp.json().await?);
                }
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}

#[async_trait]
impl Space for HttpSpace {
    async fn write(&self, entry: Entry, lease: Lease) -> Result<()> {
        let payload = WriteRequest { entry, lease };
        let response: WriteResponse = self
            .post_with_retry(
                ENDPOINT_SPACE_WRITE,
                &payload,
                Duration::from_millis(2_000),
                3,
            )
            .await?;
        if !response.accepted {
            anyhow::bail!("board rejected write");
        }
        Ok(())
    }

    async fn take(&self, template: Template, timeout: Timeout) -> Result<Option<Entry>> {
        let deadline = match timeout {
            Timeout::Forever => None,
            Timeout::Millis(millis) => Some(Instant::now() + Duration::from_millis(millis)),
        };

        loop {
            let poll_millis = match deadline {
                None => MAX_POLL_MILLIS,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    (remaining.as_millis() as u64).min(MAX_POLL_MILLIS)
                }
            };

            let payload = TakeRequest {
                template: template.clone(),
                timeout: Timeout::Millis(poll_millis),
            };
            // One attempt per poll round; the outer loop is the retry
            let response: TakeResponse = self
                .post_with_retry(
                    ENDPOINT_SPACE_TAKE,
                    &payload,
                    Duration::from_millis(poll_millis) + POLL_HTTP_MARGIN,
                    1,
                )
                .await?;

            if let Some(entry) = response.entry {
                return Ok(Some(entry));
            }
        }
    }

    async fn take_if_exists(&self, template: Template) -> Result<Option<Entry>> {
        let payload = TakeIfExistsRequest { template };
        let response: TakeResponse = self
            .post_with_retry(
                ENDPOINT_SPACE_TAKE_IF_EXISTS,
                &payload,
                Duration::from_millis(2_000),
                1,
            )
            .await?;
        Ok(response.entry)
    }
}
