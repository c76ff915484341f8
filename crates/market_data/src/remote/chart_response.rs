use anyhow::{anyhow, bail};
use chrono::DateTime;
use serde::Deserialize;

use common::models::PriceBar;

use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteSeries>,
}

// Yahoo emits `null` for intervals without trades.
#[derive(Debug, Deserialize)]
pub struct QuoteSeries {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<i64>>,
}

impl QuoteSeries {
    fn bar_at(&self, index: usize, timestamp: i64) -> Option<PriceBar> {
        let price = |series: &[Option<f64>]| series.get(index).map(|v| v.unwrap_or(0.0));

        let bar = PriceBar {
            timestamp: DateTime::from_timestamp(timestamp, 0)?,
            open: price(&self.open)?,
            high: price(&self.high)?,
            low: price(&self.low)?,
            close: price(&self.close)?,
            volume: self.volume.get(index)?.unwrap_or(0),
        };

        bar.is_complete().then_some(bar)
    }
}

impl RemoteResponse<Vec<PriceBar>> for ChartResponse {
    fn to_domain(&self) -> anyhow::Result<Vec<PriceBar>> {
        let result = match self.chart.result.as_deref() {
            Some([first, ..]) => first,
            _ => {
                return Err(match &self.chart.error {
                    Some(err) => anyhow!("chart error {}: {}", err.code, err.description),
                    None => anyhow!("no data returned"),
                });
            }
        };

        let Some(quote) = result.indicators.quote.first() else {
            bail!("no quote data available");
        };

        let bars: Vec<PriceBar> = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| quote.bar_at(i, ts))
            .collect();

        if bars.is_empty() {
            bail!("no valid OHLC data found");
        }

        Ok(bars)
    }
}
