use anyhow::{Context, anyhow};
use chrono::Utc;
use serde::Deserialize;

use common::models::{BarAnnotation, Signal};

/// The JSON object the model is asked to answer with.
#[derive(Debug, Deserialize)]
pub(crate) struct SignalReply {
    pub signal: String,
    #[serde(default)]
    pub buy_price: f64,
    #[serde(default)]
    pub target_price: f64,
    #[serde(default)]
    pub stop_loss: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub ohlcv_analysis: Option<OhlcvAnalysis>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OhlcvAnalysis {
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub explanation: String,
}

impl SignalReply {
    /// Decodes the first `{` .. last `}` span of free-form model output.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let start = text.find('{');
        let end = text.rfind('}');

        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => return Err(anyhow!("no JSON found in response")),
        };

        serde_json::from_str(json).context("failed to decode signal JSON")
    }

    pub fn into_signal(self, symbol: &str) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            direction: self.signal,
            entry_price: self.buy_price,
            target_price: self.target_price,
            stop_price: self.stop_loss,
            confidence: self.confidence.round().clamp(0.0, 100.0) as u8,
            rationale: self.reason,
            generated_at: Utc::now(),
            latest_bar: self.ohlcv_analysis.map(|a| BarAnnotation {
                open: a.open,
                high: a.high,
                low: a.low,
                close: a.close,
                volume: a.volume.round() as i64,
                narrative: a.explanation,
            }),
        }
    }
}
