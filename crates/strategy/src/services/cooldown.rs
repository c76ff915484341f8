use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Last-signal instant per symbol. Entries are never evicted; the symbol
/// universe is small and operator-configured.
pub struct CooldownCache {
    window: Duration,
    last_signal: RwLock<HashMap<String, Instant>>,
}

impl CooldownCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_signal: RwLock::new(HashMap::new()),
        }
    }

    pub async fn can_generate(&self, symbol: &str) -> bool {
        self.remaining(symbol).await.is_none()
    }

    /// Time left before `symbol` may be generated again, if any.
    pub async fn remaining(&self, symbol: &str) -> Option<Duration> {
        let cache = self.last_signal.read().await;
        let last = cache.get(symbol)?;
        self.window.checked_sub(last.elapsed()).filter(|d| !d.is_zero())
    }

    pub async fn record(&self, symbol: &str) {
        let mut cache = self.last_signal.write().await;
        cache.insert(symbol.to_string(), Instant::now());
    }

    /// Checks and records in one step. Returns the time left when `symbol`
    /// is still cooling down, otherwise the slot is taken as of now.
    pub async fn try_claim(&self, symbol: &str) -> Result<(), Duration> {
        let mut cache = self.last_signal.write().await;
        if let Some(left) = cache
            .get(symbol)
            .and_then(|last| self.window.checked_sub(last.elapsed()))
            .filter(|d| !d.is_zero())
        {
            return Err(left);
        }
        cache.insert(symbol.to_string(), Instant::now());
        Ok(())
    }

    /// Gives a claimed slot back, e.g. when generation failed.
    pub async fn release(&self, symbol: &str) {
        self.last_signal.write().await.remove(symbol);
    }
}
