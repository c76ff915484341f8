use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::SignalError;
use common::models::{BatchSummary, Signal, SummaryBuilder};
use common::traits::{NotificationSink, QuoteSource, Recipient, SignalInference};

use crate::report;

pub const INTER_ITEM_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Deliver every signal as it is produced, then the summary.
    PerSymbol,
    /// Deliver an "accepted" notice up front, then only the summary.
    SummaryOnly,
}

/// Handed back to whoever started a background batch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchTicket {
    pub run_id: Uuid,
    pub symbols: usize,
    pub mode: BatchMode,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub symbols: Vec<String>,
    pub recipient: Recipient,
    pub inter_item_delay: Duration,
}

impl OrchestratorConfig {
    pub fn new(symbols: Vec<String>, recipient: Recipient) -> Self {
        Self {
            symbols,
            recipient,
            inter_item_delay: INTER_ITEM_DELAY,
        }
    }
}

/// Released when the background batch that owns it finishes.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives symbols through fetch -> infer and reports the outcome.
pub struct SignalOrchestrator {
    quotes: Arc<dyn QuoteSource>,
    inference: Arc<dyn SignalInference>,
    notifier: Arc<dyn NotificationSink>,
    config: OrchestratorConfig,
    batch_running: Arc<AtomicBool>,
}

impl SignalOrchestrator {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        inference: Arc<dyn SignalInference>,
        notifier: Arc<dyn NotificationSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            quotes,
            inference,
            notifier,
            config,
            batch_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    pub fn notifier(&self) -> Arc<dyn NotificationSink> {
        Arc::clone(&self.notifier)
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::Acquire)
    }

    /// One fetch and one inference call, no retries. The symbol is expected
    /// to be normalized already.
    pub async fn generate_signal(&self, symbol: &str) -> Result<Signal, SignalError> {
        info!("Generating trading signal for {}", symbol);

        let bars = self.quotes.fetch(symbol).await?;
        if bars.is_empty() {
            return Err(SignalError::fetch(symbol, "no price data available"));
        }
        debug!("Fetched {} bars for {}", bars.len(), symbol);

        let signal = self.inference.infer(symbol, &bars).await?;

        Ok(Signal {
            symbol: symbol.to_string(),
            generated_at: Utc::now(),
            ..signal
        })
    }

    /// Runs `symbols` one at a time with a fixed pause between them and
    /// delivers the summary once. Per-symbol failures end up in `failed`.
    pub async fn generate_batch(
        &self,
        run_id: Uuid,
        symbols: &[String],
        mode: BatchMode,
    ) -> BatchSummary {
        info!(
            "[{}] Starting batch analysis of {} symbols ({:?})",
            run_id,
            symbols.len(),
            mode
        );

        if mode == BatchMode::SummaryOnly {
            self.notify(&report::batch_accepted_message(symbols.len(), Utc::now()))
                .await;
        }

        let mut builder = SummaryBuilder::new(run_id);

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                time::sleep(self.config.inter_item_delay).await;
            }

            info!("[{}] Analyzing {}/{}: {}", run_id, i + 1, symbols.len(), symbol);

            match self.generate_signal(symbol).await {
                Ok(signal) => {
                    if mode == BatchMode::PerSymbol {
                        self.notify(&report::signal_message(&signal)).await;
                    }
                    builder.record_signal(signal);
                }
                Err(e) => {
                    warn!("[{}] {}", run_id, e);
                    builder.record_failure(symbol);
                }
            }
        }

        let summary = builder.finish();
        self.notify(&report::summary_message(&summary)).await;

        info!(
            "[{}] Batch completed. Total: {}, Succeeded: {}, Buy: {}, Sell: {}, Hold: {}, Failed: {}",
            run_id,
            summary.total_analyzed,
            summary.succeeded(),
            summary.buy.len(),
            summary.sell.len(),
            summary.hold.len(),
            summary.failed.len()
        );

        summary
    }

    /// Starts a batch over the configured universe in the background and
    /// returns right away. Only one batch runs at a time.
    pub fn spawn_batch(self: &Arc<Self>, mode: BatchMode) -> Result<BatchTicket, SignalError> {
        let guard =
            RunGuard::try_acquire(&self.batch_running).ok_or(SignalError::BatchInProgress)?;

        let ticket = BatchTicket {
            run_id: Uuid::new_v4(),
            symbols: self.config.symbols.len(),
            mode,
        };

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            orchestrator
                .generate_batch(ticket.run_id, &orchestrator.config.symbols, mode)
                .await;
        });

        info!("[{}] Batch queued ({} symbols)", ticket.run_id, ticket.symbols);
        Ok(ticket)
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.deliver(self.config.recipient, text).await {
            error!("Failed to deliver notification: {}", e);
        }
    }
}
