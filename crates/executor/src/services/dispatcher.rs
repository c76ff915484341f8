use std::sync::Arc;

use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use tracing::{error, info, warn};

use common::SignalError;
use common::models::Signal;
use common::traits::{NotificationSink, Recipient};
use strategy::report;
use strategy::{BatchMode, CooldownCache, SignalOrchestrator};

const WELCOME: &str = "🤖 <b>Welcome to Trading Signal Bot!</b> 🤖

📈 <b>Available Commands:</b>

🔍 <b>Single Stock Analysis:</b>
   Send a stock symbol (e.g., BBCA, BBRI, ANTM)
   Example: <code>ANTM</code>

📊 <b>Bulk Analysis:</b>
   /bulk - Analyze all configured stocks
   /summary - Get summary of all stocks
   /stocks - Show all configured stocks

❓ <b>Help:</b>
   /help - Show this help message
   /start - Start the bot";

const HELP: &str = "📚 <b>Help &amp; Instructions</b> 📚

🔍 <b>How to use:</b>
   1. Send a stock symbol to get a trading signal
   2. Wait for the analysis to complete
   3. Receive a detailed signal with buy/sell levels

📊 <b>Available Commands:</b>
   /stocks - Show all configured stocks
   /bulk - Analyze all configured stocks (individual signals)
   /summary - Analyze all configured stocks (summary only)
   /help - Show this help message
   /start - Start the bot

📊 <b>Signal Types:</b>
   🟢 BUY - Good opportunity to buy
   🔴 SELL - Consider selling
   🟡 WAIT - Hold current position

⚠️ <b>Disclaimer:</b>
   This is for educational purposes only.
   Always do your own research before trading.";

const BULK_STARTED: &str =
    "🚀 Starting bulk analysis for all configured stocks. You will receive signals as they are generated.";
const SUMMARY_STARTED: &str =
    "📊 Starting bulk analysis with summary. You will receive a summary once complete.";
const ALREADY_RUNNING: &str =
    "⏳ A bulk analysis is already running. You will get its results when it finishes.";
const UNKNOWN: &str = "❓ Unknown command. Send /help for available commands.";

#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "show all configured stocks")]
    Stocks,
    #[command(description = "analyze all configured stocks (individual signals)")]
    Bulk,
    #[command(description = "analyze all configured stocks (summary only)")]
    Summary,
}

/// What an inbound text resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Command(Command),
    Symbol(String),
    Unknown,
}

impl Action {
    /// Commands match exactly; any other non-empty text not starting with
    /// `/` is taken as a symbol.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Action::Unknown;
        }
        if text.starts_with('/') {
            return Command::parse(text, "")
                .map(Action::Command)
                .unwrap_or(Action::Unknown);
        }
        Action::Symbol(normalize_symbol(text))
    }
}

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Routes chat input to the orchestrator. Replies go back to the chat the
/// input came from; long-running work is spawned and reported later.
pub struct CommandDispatcher {
    orchestrator: Arc<SignalOrchestrator>,
    cooldown: Arc<CooldownCache>,
    notifier: Arc<dyn NotificationSink>,
}

impl CommandDispatcher {
    pub fn new(orchestrator: Arc<SignalOrchestrator>, cooldown: Arc<CooldownCache>) -> Self {
        let notifier = orchestrator.notifier();
        Self {
            orchestrator,
            cooldown,
            notifier,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SignalOrchestrator> {
        &self.orchestrator
    }

    pub async fn dispatch(self: &Arc<Self>, chat: Recipient, text: &str) -> Action {
        let action = Action::parse(text);
        info!("Chat {} sent {:?}", chat, action);

        match &action {
            Action::Command(Command::Start) => self.reply(chat, WELCOME).await,
            Action::Command(Command::Help) => self.reply(chat, HELP).await,
            Action::Command(Command::Stocks) => {
                let text = report::stocks_list_message(self.orchestrator.symbols());
                self.reply(chat, &text).await;
            }
            Action::Command(Command::Bulk) => {
                self.start_batch(chat, BatchMode::PerSymbol, BULK_STARTED)
                    .await
            }
            Action::Command(Command::Summary) => {
                self.start_batch(chat, BatchMode::SummaryOnly, SUMMARY_STARTED)
                    .await
            }
            Action::Symbol(symbol) => self.spawn_symbol(chat, symbol.clone()).await,
            Action::Unknown => self.reply(chat, UNKNOWN).await,
        }

        action
    }

    /// Single-symbol generation behind the cooldown window. The slot is
    /// claimed before generating and given back if no signal was produced.
    pub async fn generate_with_cooldown(&self, symbol: &str) -> Result<Signal, SignalError> {
        self.claim(symbol).await?;
        self.generate_claimed(symbol).await
    }

    async fn claim(&self, symbol: &str) -> Result<(), SignalError> {
        self.cooldown
            .try_claim(symbol)
            .await
            .map_err(|remaining| SignalError::CoolingDown {
                symbol: symbol.to_string(),
                remaining,
            })
    }

    async fn generate_claimed(&self, symbol: &str) -> Result<Signal, SignalError> {
        let result = self.orchestrator.generate_signal(symbol).await;
        if result.is_err() {
            self.cooldown.release(symbol).await;
        }
        result
    }

    async fn start_batch(&self, chat: Recipient, mode: BatchMode, ack: &str) {
        match self.orchestrator.spawn_batch(mode) {
            Ok(ticket) => {
                info!("[{}] Batch requested from chat {}", ticket.run_id, chat);
                self.reply(chat, ack).await;
            }
            Err(SignalError::BatchInProgress) => self.reply(chat, ALREADY_RUNNING).await,
            Err(e) => {
                error!("Failed to start batch: {}", e);
                self.reply(chat, &format!("❌ {}", html::escape(&e.to_string())))
                    .await;
            }
        }
    }

    async fn spawn_symbol(self: &Arc<Self>, chat: Recipient, symbol: String) {
        if let Err(err) = self.claim(&symbol).await {
            self.reply(chat, &format!("⏳ {}", html::escape(&err.to_string())))
                .await;
            return;
        }

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher
                .reply(chat, &report::analyzing_message(&symbol))
                .await;

            let text = match dispatcher.generate_claimed(&symbol).await {
                Ok(signal) => report::signal_message(&signal),
                Err(e) => {
                    warn!("Chat {} request for {} failed: {}", chat, symbol, e);
                    report::failure_message(&symbol, &e)
                }
            };
            dispatcher.reply(chat, &text).await;
        });
    }

    async fn reply(&self, chat: Recipient, text: &str) {
        if let Err(e) = self.notifier.deliver(chat, text).await {
            error!("Failed to reply to chat {}: {}", chat, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::models::PriceBar;
    use common::traits::{MockNotificationSink, MockQuoteSource, MockSignalInference};
    use std::sync::Mutex;
    use std::time::Duration;
    use strategy::OrchestratorConfig;

    const OPERATOR: Recipient = -100;
    const CHAT: Recipient = 42;

    type Outbox = Arc<Mutex<Vec<(Recipient, String)>>>;

    fn dispatcher(symbols: &[&str]) -> (Arc<CommandDispatcher>, Outbox) {
        let mut quotes = MockQuoteSource::new();
        quotes.expect_fetch().returning(|symbol: &str| {
            if symbol == "NOPE" {
                Err(SignalError::fetch(symbol, "no data"))
            } else {
                Ok(vec![PriceBar {
                    timestamp: Utc::now(),
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.5,
                    volume: 100,
                }])
            }
        });

        let mut inference = MockSignalInference::new();
        inference
            .expect_infer()
            .returning(|symbol: &str, _bars: &[PriceBar]| {
                Ok(Signal {
                    symbol: symbol.to_string(),
                    direction: "BUY".to_string(),
                    entry_price: 10.0,
                    target_price: 12.0,
                    stop_price: 9.0,
                    confidence: 75,
                    rationale: "Breakout".to_string(),
                    generated_at: Utc::now(),
                    latest_bar: None,
                })
            });

        let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&outbox);
        let mut sink = MockNotificationSink::new();
        sink.expect_deliver()
            .returning(move |recipient: Recipient, text: &str| {
                log.lock().unwrap().push((recipient, text.to_string()));
                Ok(())
            });

        let orchestrator = Arc::new(SignalOrchestrator::new(
            Arc::new(quotes),
            Arc::new(inference),
            Arc::new(sink),
            OrchestratorConfig::new(symbols.iter().map(|s| s.to_string()).collect(), OPERATOR),
        ));
        let cooldown = Arc::new(CooldownCache::new(Duration::from_secs(15 * 60)));

        (
            Arc::new(CommandDispatcher::new(orchestrator, cooldown)),
            outbox,
        )
    }

    fn sent_to(outbox: &Outbox, recipient: Recipient) -> Vec<String> {
        outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }

    #[test]
    fn test_parse() {
        assert_eq!(Action::parse("/start"), Action::Command(Command::Start));
        assert_eq!(Action::parse("  /help "), Action::Command(Command::Help));
        assert_eq!(Action::parse("/stocks"), Action::Command(Command::Stocks));
        assert_eq!(Action::parse("/bulk"), Action::Command(Command::Bulk));
        assert_eq!(Action::parse("/summary"), Action::Command(Command::Summary));
        assert_eq!(Action::parse(" bbca "), Action::Symbol("BBCA".to_string()));
        assert_eq!(Action::parse("/frobnicate"), Action::Unknown);
        assert_eq!(Action::parse(""), Action::Unknown);
        assert_eq!(Action::parse("   "), Action::Unknown);
    }

    #[tokio::test]
    async fn test_informational_commands_reply_to_sender() {
        let (dispatcher, outbox) = dispatcher(&["BBCA", "BBRI"]);

        dispatcher.dispatch(CHAT, "/start").await;
        dispatcher.dispatch(CHAT, "/help").await;
        dispatcher.dispatch(CHAT, "/stocks").await;
        dispatcher.dispatch(CHAT, "/nope").await;

        let replies = sent_to(&outbox, CHAT);
        assert_eq!(replies.len(), 4);
        assert!(replies[0].contains("Welcome"));
        assert!(replies[1].contains("Help"));
        assert!(replies[2].contains("<code>BBCA</code> • <code>BBRI</code>"));
        assert_eq!(replies[3], UNKNOWN);
        assert!(sent_to(&outbox, OPERATOR).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_is_analyzed_in_background() {
        let (dispatcher, outbox) = dispatcher(&["BBCA"]);

        let action = dispatcher.dispatch(CHAT, "bbca").await;
        assert_eq!(action, Action::Symbol("BBCA".to_string()));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let replies = sent_to(&outbox, CHAT);
        assert_eq!(replies.len(), 2);
        assert!(replies[0].contains("Analyzing BBCA"));
        assert!(replies[1].contains("BUY BBCA"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_symbol_is_cooled_down() {
        let (dispatcher, outbox) = dispatcher(&["BBCA"]);

        dispatcher.dispatch(CHAT, "BBCA").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.dispatch(CHAT, "BBCA").await;

        let replies = sent_to(&outbox, CHAT);
        assert_eq!(replies.len(), 3);
        assert!(replies[2].starts_with("⏳ BBCA was analyzed recently"));

        tokio::time::advance(Duration::from_secs(15 * 60)).await;
        dispatcher.dispatch(CHAT, "BBCA").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(sent_to(&outbox, CHAT).len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_symbol_reports_and_is_not_cooled_down() {
        let (dispatcher, outbox) = dispatcher(&["BBCA"]);

        dispatcher.dispatch(CHAT, "nope").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let replies = sent_to(&outbox, CHAT);
        assert_eq!(replies.len(), 2);
        assert!(replies[1].starts_with("❌ Failed to analyze NOPE"));
        assert!(dispatcher.cooldown.can_generate("NOPE").await);
    }

    #[tokio::test]
    async fn test_simultaneous_requests_generate_once() {
        let (dispatcher, _outbox) = dispatcher(&["BBCA"]);

        let (first, second) = tokio::join!(
            dispatcher.generate_with_cooldown("BBCA"),
            dispatcher.generate_with_cooldown("BBCA"),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SignalError::CoolingDown { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_dispatch_spawns_one_analysis() {
        let (dispatcher, outbox) = dispatcher(&["BBCA"]);

        // the second request arrives before the first analysis has run
        dispatcher.dispatch(CHAT, "BBCA").await;
        dispatcher.dispatch(CHAT, "BBCA").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let replies = sent_to(&outbox, CHAT);
        assert_eq!(replies.len(), 3);
        assert_eq!(replies.iter().filter(|r| r.starts_with("⏳")).count(), 1);
        assert_eq!(
            replies.iter().filter(|r| r.contains("BUY BBCA")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_generation_releases_claim() {
        let (dispatcher, _outbox) = dispatcher(&["BBCA"]);

        assert!(dispatcher.generate_with_cooldown("NOPE").await.is_err());
        assert!(matches!(
            dispatcher.generate_with_cooldown("NOPE").await,
            Err(SignalError::UpstreamFetch { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_acknowledges_then_runs() {
        let (dispatcher, outbox) = dispatcher(&["A", "B"]);

        dispatcher.dispatch(CHAT, "/bulk").await;
        assert_eq!(sent_to(&outbox, CHAT), vec![BULK_STARTED.to_string()]);

        dispatcher.dispatch(CHAT, "/summary").await;
        assert_eq!(sent_to(&outbox, CHAT)[1], ALREADY_RUNNING);

        tokio::time::sleep(Duration::from_secs(30)).await;

        // two signals and the summary go to the configured channel
        let operator = sent_to(&outbox, OPERATOR);
        assert_eq!(operator.len(), 3);
        assert!(operator[2].contains("BATCH SIGNAL SUMMARY"));
        assert!(!dispatcher.orchestrator().is_batch_running());
    }
}
