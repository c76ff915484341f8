use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::SignalError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COOLDOWN_MINUTES: u64 = 15;

/// Process-wide settings, loaded once at startup and handed to each
/// component by value or behind an `Arc`.
#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,
    pub port: u16,
    pub environment: String,
    pub default_stock_symbol: String,
    pub stock_symbols: Vec<String>,
    pub signal_cooldown: Duration,
    pub schedule_times: Vec<String>,
    pub schedule_timezone: String,
    pub market_suffix: String,
    pub yahoo_base_url: String,
    pub webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, SignalError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SignalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = required(&get, "GEMINI_API_KEY")?;
        let telegram_bot_token = required(&get, "TELEGRAM_BOT_TOKEN")?;
        let telegram_chat_id = required(&get, "TELEGRAM_CHAT_ID")?
            .trim()
            .parse::<i64>()
            .map_err(|e| {
                SignalError::Configuration(format!("TELEGRAM_CHAT_ID must be a number: {}", e))
            })?;

        let default_stock_symbol = get_or("DEFAULT_STOCK_SYMBOL", "INDY");
        let mut stock_symbols = split_list(get("STOCK_SYMBOLS").as_deref());
        if stock_symbols.is_empty() {
            stock_symbols.push(default_stock_symbol.clone());
        }

        Ok(Self {
            gemini_api_key,
            gemini_model: get_or("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_base_url: get_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            telegram_bot_token,
            telegram_chat_id,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT),
            environment: get_or("ENVIRONMENT", "development"),
            default_stock_symbol,
            stock_symbols,
            signal_cooldown: Duration::from_secs(
                parse_or::<u64>(
                    get("SIGNAL_COOLDOWN_MINUTES"),
                    "SIGNAL_COOLDOWN_MINUTES",
                    DEFAULT_COOLDOWN_MINUTES,
                )
                .saturating_mul(60),
            ),
            schedule_times: split_list(get("CRON_SCHEDULE_TIMES").as_deref()),
            schedule_timezone: get_or("SCHEDULE_TIMEZONE", "Asia/Jakarta"),
            market_suffix: lookup("MARKET_SUFFIX").unwrap_or_else(|| ".JK".to_string()),
            yahoo_base_url: get_or("YAHOO_BASE_URL", "https://query1.finance.yahoo.com"),
            webhook_url: get("WEBHOOK_URL"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_model", &self.gemini_model)
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("default_stock_symbol", &self.default_stock_symbol)
            .field("stock_symbols", &self.stock_symbols)
            .field("signal_cooldown", &self.signal_cooldown)
            .field("schedule_times", &self.schedule_times)
            .field("schedule_timezone", &self.schedule_timezone)
            .field("market_suffix", &self.market_suffix)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

fn required<F>(get: &F, key: &str) -> Result<String, SignalError>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).ok_or_else(|| SignalError::Configuration(format!("{} is required", key)))
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(
                "{} has invalid value {:?}, using default: {}",
                key, raw, default
            );
            default
        }),
        None => default,
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
