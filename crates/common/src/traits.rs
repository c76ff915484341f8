use async_trait::async_trait;

use crate::error::SignalError;
use crate::models::{PriceBar, Signal};

/// Chat or channel a message is addressed to.
pub type Recipient = i64;

/// Market data for one symbol, oldest bar first.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Must fail rather than return an empty series.
    async fn fetch(&self, symbol: &str) -> Result<Vec<PriceBar>, SignalError>;
}

/// Turns a price series into a recommendation.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait SignalInference: Send + Sync {
    async fn infer(&self, symbol: &str, bars: &[PriceBar]) -> Result<Signal, SignalError>;
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<(), SignalError>;
}
