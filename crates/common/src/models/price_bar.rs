use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sampling interval of market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// A zero in any price field means the upstream sample is missing.
    pub fn is_complete(&self) -> bool {
        self.open != 0.0 && self.high != 0.0 && self.low != 0.0 && self.close != 0.0
    }
}
