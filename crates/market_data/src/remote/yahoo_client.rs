use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use common::SignalError;
use common::models::PriceBar;
use common::traits::QuoteSource;

use crate::remote::chart_response::ChartResponse;
use crate::traits::RemoteResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// 5-minute bars over the last two sessions from Yahoo Finance's chart API.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: Url,
    market_suffix: String,
}

impl YahooClient {
    pub fn new(base_url: &str, market_suffix: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Yahoo base URL {:?}", base_url))?;

        Ok(Self {
            client,
            base_url,
            market_suffix: market_suffix.to_string(),
        })
    }

    /// Exchange-qualified ticker, e.g. `BBCA` -> `BBCA.JK`.
    fn qualified(&self, symbol: &str) -> String {
        let suffix = &self.market_suffix;
        if suffix.is_empty() || symbol.to_uppercase().ends_with(&suffix.to_uppercase()) {
            symbol.to_string()
        } else {
            format!("{}{}", symbol, suffix)
        }
    }

    async fn fetch_chart(&self, symbol: &str) -> anyhow::Result<Vec<PriceBar>> {
        // symbols come from chat text; push them as one encoded segment
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Yahoo base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart"])
            .push(&self.qualified(symbol));

        let response = self
            .client
            .get(url)
            .query(&[("interval", "5m"), ("range", "2d")])
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", "https://finance.yahoo.com/")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Yahoo Finance returned status {}", status);
        }

        let chart = response
            .json::<ChartResponse>()
            .await
            .context("Failed to parse chart response")?;

        let bars = chart.to_domain()?;
        debug!("Fetched {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }
}

#[async_trait]
impl QuoteSource for YahooClient {
    async fn fetch(&self, symbol: &str) -> Result<Vec<PriceBar>, SignalError> {
        self.fetch_chart(symbol)
            .await
            .map_err(|e| SignalError::fetch(symbol, format!("{:#}", e)))
    }
}
