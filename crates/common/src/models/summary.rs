use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::signal::{Direction, Signal};

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub total_analyzed: usize,
    pub buy: Vec<Signal>,
    pub sell: Vec<Signal>,
    pub hold: Vec<Signal>,
    pub failed: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Collects per-symbol outcomes of a run. Every symbol goes through exactly
/// one `record_*` call, so the bucket lengths always add up to the total.
#[derive(Debug)]
pub struct SummaryBuilder {
    run_id: Uuid,
    buy: Vec<Signal>,
    sell: Vec<Signal>,
    hold: Vec<Signal>,
    failed: Vec<String>,
}

impl SummaryBuilder {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            buy: Vec::new(),
            sell: Vec::new(),
            hold: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_signal(&mut self, signal: Signal) -> Direction {
        let direction = signal.bucket();
        match direction {
            Direction::Buy => self.buy.push(signal),
            Direction::Sell => self.sell.push(signal),
            Direction::Hold => self.hold.push(signal),
        }
        direction
    }

    pub fn record_failure(&mut self, symbol: &str) {
        self.failed.push(symbol.to_string());
    }

    pub fn finish(self) -> BatchSummary {
        let total_analyzed = self.buy.len() + self.sell.len() + self.hold.len() + self.failed.len();
        BatchSummary {
            run_id: self.run_id,
            total_analyzed,
            buy: self.buy,
            sell: self.sell,
            hold: self.hold,
            failed: self.failed,
            generated_at: Utc::now(),
        }
    }
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.buy.len() + self.sell.len() + self.hold.len()
    }
}
