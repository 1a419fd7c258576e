// Mirror fetcher with per-mirror retry and ordered fallback

use crate::config::FetchConfig;
use crate::error::{IngestError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Payload plus the mirror that served it
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub mirror: String,
}

/// HTTP client that walks the configured mirrors in order
pub struct MirrorFetcher {
    client: Client,
    config: FetchConfig,
}

impl MirrorFetcher {
    /// Create a fetcher; the client is built once and shared by all workers
    pub fn new(config: &FetchConfig) -> Result<Self> {
        config.validate().map_err(IngestError::Config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("argo-ingest/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `rel_path` from the first mirror that answers within `max_tries`
    ///
    /// Each mirror gets up to `max_tries` attempts with capped exponential
    /// backoff between them before the next mirror is tried. The last error is
    /// returned once every mirror is exhausted.
    pub async fn fetch(&self, rel_path: &str, max_tries: u32) -> Result<Fetched> {
        let mut last_error = None;

        for mirror in &self.config.mirrors {
            let url = join_url(mirror, rel_path);

            for attempt in 0..max_tries {
                debug!(url = %url, attempt = attempt + 1, max_tries, "Fetching");

                match self.get(&url).await {
                    Ok(bytes) => {
                        debug!(url = %url, kb = bytes.len() / 1024, "Fetched");
                        return Ok(Fetched {
                            bytes,
                            mirror: mirror.clone(),
                        });
                    },
                    Err(e) => {
                        warn!(
                            url = %url,
                            attempt = attempt + 1,
                            max_tries,
                            error = %e,
                            "Fetch attempt failed"
                        );
                        last_error = Some(e);

                        if attempt + 1 < max_tries {
                            tokio::time::sleep(self.config.backoff_delay(attempt)).await;
                        }
                    },
                }
            }

            info!(mirror = %mirror, path = rel_path, "Mirror exhausted, trying next");
        }

        Err(last_error.unwrap_or_else(|| {
            IngestError::Config(format!("No mirror attempts were made for {rel_path}"))
        }))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Join a mirror base URL and a relative path with exactly one slash
pub fn join_url(base: &str, rel_path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        rel_path.trim_start_matches('/')
    )
}
