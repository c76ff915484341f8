//! Telegram-ready (HTML parse mode) renderings of signals and batch results.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;

use common::SignalError;
use common::models::{BatchSummary, Direction, Signal};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
const STOCKS_PER_ROW: usize = 5;

/// Estimated wall-clock cost of one symbol in a batch, in seconds.
const SECONDS_PER_SYMBOL: usize = 3;

fn emoji(direction: Direction) -> &'static str {
    match direction {
        Direction::Buy => "🟢",
        Direction::Sell => "🔴",
        Direction::Hold => "🟡",
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

pub fn signal_message(signal: &Signal) -> String {
    let icon = emoji(signal.bucket());
    let mut msg = format!(
        "{icon} <b>{} {}</b> {icon}\n\n\
         💰 <b>Entry:</b> {:.2}\n\
         🎯 <b>Target:</b> {:.2}\n\
         🛑 <b>Stop loss:</b> {:.2}",
        escape(&signal.direction.to_uppercase()),
        escape(&signal.symbol),
        signal.entry_price,
        signal.target_price,
        signal.stop_price,
    );

    if let Some(rr) = signal.risk_reward() {
        let _ = write!(
            msg,
            "\n\n⚖️ <b>Risk/reward:</b> risk {:.2}, reward {:.2}, ratio 1:{:.2}",
            rr.risk, rr.reward, rr.ratio
        );
    }

    let _ = write!(
        msg,
        "\n\n📈 <b>Confidence:</b> {}%\n\n📝 <b>Reason:</b>\n{}",
        signal.confidence,
        escape(&signal.rationale)
    );

    if let Some(bar) = &signal.latest_bar {
        let _ = write!(
            msg,
            "\n\n📊 <b>Latest bar:</b> O {:.2} · H {:.2} · L {:.2} · C {:.2} · V {}\n{}",
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            escape(&bar.narrative)
        );
    }

    let _ = write!(
        msg,
        "\n\n⏰ <b>Generated:</b> {}\n{}",
        timestamp(&signal.generated_at),
        RULE
    );
    msg
}

pub fn summary_message(summary: &BatchSummary) -> String {
    let mut msg = format!(
        "📊 <b>BATCH SIGNAL SUMMARY</b>\n\n\
         ✅ Analyzed: {}\n\
         🟢 Buy: {}\n\
         🔴 Sell: {}\n\
         🟡 Hold: {}\n\
         ❌ Failed: {}\n\n\
         ⏰ <b>Generated:</b> {}",
        summary.total_analyzed,
        summary.buy.len(),
        summary.sell.len(),
        summary.hold.len(),
        summary.failed.len(),
        timestamp(&summary.generated_at),
    );

    if !summary.buy.is_empty() {
        msg.push_str("\n\n🟢 <b>BUY</b>");
        for s in &summary.buy {
            let _ = write!(
                msg,
                "\n • {} ({}%) entry {:.2}, target {:.2}, stop {:.2}{}",
                escape(&s.symbol),
                s.confidence,
                s.entry_price,
                s.target_price,
                s.stop_price,
                ratio_suffix(s)
            );
        }
    }

    if !summary.sell.is_empty() {
        msg.push_str("\n\n🔴 <b>SELL</b>");
        for s in &summary.sell {
            let _ = write!(
                msg,
                "\n • {} ({}%) stop {:.2}{}",
                escape(&s.symbol),
                s.confidence,
                s.stop_price,
                ratio_suffix(s)
            );
        }
    }

    if !summary.hold.is_empty() {
        msg.push_str("\n\n🟡 <b>HOLD</b>");
        for s in &summary.hold {
            let _ = write!(msg, "\n • {} ({}%)", escape(&s.symbol), s.confidence);
        }
    }

    if !summary.failed.is_empty() {
        msg.push_str("\n\n❌ <b>FAILED</b>");
        for symbol in &summary.failed {
            let _ = write!(msg, "\n • {}", escape(symbol));
        }
    }

    let _ = write!(msg, "\n\n{}", RULE);
    msg
}

fn ratio_suffix(signal: &Signal) -> String {
    signal
        .risk_reward()
        .map(|rr| format!(", R:R 1:{:.2}", rr.ratio))
        .unwrap_or_default()
}

pub fn batch_accepted_message(total: usize, at: DateTime<Utc>) -> String {
    format!(
        "📋 <b>BATCH REQUEST ACCEPTED</b>\n\n\
         📈 Symbols queued: {}\n\
         ⏱️ Estimated time: ~{} min\n\
         ⏰ Requested: {}\n\n\
         A summary will follow once every symbol has been analyzed.\n{}",
        total,
        total * SECONDS_PER_SYMBOL / 60 + 1,
        timestamp(&at),
        RULE
    )
}

pub fn stocks_list_message(symbols: &[String]) -> String {
    let mut msg = format!(
        "📋 <b>CONFIGURED STOCKS</b>\n\n📈 Total: {}\n",
        symbols.len()
    );

    for row in symbols.chunks(STOCKS_PER_ROW) {
        let line: Vec<String> = row
            .iter()
            .map(|s| format!("<code>{}</code>", escape(s)))
            .collect();
        let _ = write!(msg, "\n{}", line.join(" • "));
    }

    let _ = write!(
        msg,
        "\n\n💡 Send any symbol for a signal, /bulk to analyze all of them, /summary for a summary only.\n{}",
        RULE
    );
    msg
}

pub fn analyzing_message(symbol: &str) -> String {
    format!("🔍 Analyzing {}... please wait.", escape(symbol))
}

pub fn failure_message(symbol: &str, error: &SignalError) -> String {
    format!(
        "❌ Failed to analyze {}: {}",
        escape(symbol),
        escape(&error.to_string())
    )
}
