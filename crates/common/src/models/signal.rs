use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bucket a signal lands in. Anything that is not BUY or SELL is a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn classify(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            _ => Self::Hold,
        }
    }
}

/// Latest bar as described by the model, with its narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarAnnotation {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    /// Direction exactly as the model returned it ("BUY", "SELL", "WAIT", ...).
    pub direction: String,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_price: f64,
    /// 0-100
    pub confidence: u8,
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_bar: Option<BarAnnotation>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskReward {
    pub risk: f64,
    pub reward: f64,
    pub ratio: f64,
}

impl Signal {
    pub fn bucket(&self) -> Direction {
        Direction::classify(&self.direction)
    }

    /// Risk, reward and their ratio for actionable signals.
    ///
    /// Returns `None` for holds and whenever the price levels are incoherent
    /// (non-positive risk or reward).
    pub fn risk_reward(&self) -> Option<RiskReward> {
        let (risk, reward) = match self.bucket() {
            Direction::Buy => (
                self.entry_price - self.stop_price,
                self.target_price - self.entry_price,
            ),
            Direction::Sell => (
                self.stop_price - self.entry_price,
                self.entry_price - self.target_price,
            ),
            Direction::Hold => return None,
        };

        if risk <= 0.0 || reward <= 0.0 {
            return None;
        }

        Some(RiskReward {
            risk,
            reward,
            ratio: reward / risk,
        })
    }
}
