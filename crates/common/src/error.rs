use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// Failures that cross crate boundaries.
///
/// Fetch and inference errors reach single-symbol callers as-is and are
/// folded into the failed list inside a batch. Delivery errors never leave
/// the place they happen except to be logged.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to fetch market data for {symbol}: {reason}")]
    UpstreamFetch { symbol: String, reason: String },

    #[error("failed to generate signal for {symbol}: {reason}")]
    UpstreamInference { symbol: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to deliver message: {0}")]
    Delivery(String),

    #[error("a batch run is already in progress")]
    BatchInProgress,

    #[error("{symbol} was analyzed recently, retry in {}s", .remaining.as_secs())]
    CoolingDown { symbol: String, remaining: Duration },
}

impl SignalError {
    pub fn fetch(symbol: &str, reason: impl Display) -> Self {
        Self::UpstreamFetch {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn inference(symbol: &str, reason: impl Display) -> Self {
        Self::UpstreamInference {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn delivery(reason: impl Display) -> Self {
        Self::Delivery(reason.to_string())
    }
}
