//! REST depth-snapshot fetcher
//!
//! The diff stream only carries increments; the initial full-depth book
//! comes from the REST endpoint and every re-sync fetches a fresh one.

use crate::{
    config::BotConfig,
    data::DepthSnapshot,
    error::SnapshotError,
    parser::BinanceDataParser,
    retry::RetryPolicy,
};
use tokio::time::sleep;

/// Fetches full-depth snapshots with retry
pub struct SnapshotFetcher {
    http_client: reqwest::Client,
    url: String,
    symbol: String,
    policy: RetryPolicy,
    parser: BinanceDataParser,
}

impl SnapshotFetcher {
    pub fn new(config: &BotConfig) -> Self {
        Self::with_policy(config, RetryPolicy::default())
    }

    pub fn with_policy(config: &BotConfig, policy: RetryPolicy) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: config.rest_depth_url.clone(),
            symbol: config.symbol.clone(),
            policy,
            parser: BinanceDataParser::new(),
        }
    }

    /// Fetch a snapshot, retrying with backoff until the budget runs out
    pub async fn fetch(&self) -> Result<DepthSnapshot, SnapshotError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once().await {
                Ok(snapshot) => {
                    tracing::info!(
                        symbol = %self.symbol,
                        last_update_id = snapshot.last_update_id,
                        bids = snapshot.bids.len(),
                        asks = snapshot.asks.len(),
                        "Depth snapshot loaded"
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    if !self.policy.should_retry(attempt) {
                        return Err(SnapshotError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.policy.calculate_delay(attempt);
                    tracing::warn!(
                        symbol = %self.symbol,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Snapshot fetch failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self) -> Result<DepthSnapshot, SnapshotError> {
        let response = self
            .http_client
            .get(&self.url)
            .query(&[("symbol", self.symbol.as_str()), ("limit", "1000")])
            .send()
            .await
            .map_err(|e| SnapshotError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SnapshotError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SnapshotError::Http(e.to_string()))?;

        self.parser
            .parse_snapshot(&body)
            .map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}
