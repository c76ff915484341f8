use std::fmt::Write;

use common::models::PriceBar;

const INSTRUCTIONS: &str = r#"### Task
Run a technical analysis on the candlesticks above and produce one trading signal.

Risk/reward must be at least 1:2:
- BUY: the distance from entry to target must be at least twice the distance from entry to stop loss.
- SELL: the same rule applied downwards.
- Example: entry 1000, stop loss 950 (risk 50) means a target of at least 1100 (reward 100).
- A slightly lower ratio is acceptable only for a very strong setup; explain why in the reason.

Look for:
- candlestick patterns (bullish engulfing, doji, hammer, ...)
- 5 EMA / 20 EMA crossovers
- support and resistance from the last two hours
- RSI and MACD
- breakouts confirmed by volume

Also describe the latest bar (open, high, low, close, volume) in a short narrative.

Answer with JSON only, in exactly this shape:
{
  "signal": "BUY" | "SELL" | "WAIT",
  "buy_price": 2750,
  "target_price": 2850,
  "stop_loss": 2725,
  "confidence": 82,
  "reason": "Bullish engulfing on the 5 minute chart, risk 25 / reward 100.",
  "ohlcv_analysis": {
    "open": 2740,
    "high": 2750,
    "low": 2730,
    "close": 2745,
    "volume": 80000,
    "explanation": "Opened at 2740, traded between 2730 and 2750 and closed at 2745 on rising volume."
  }
}"#;

pub(crate) fn build_prompt(symbol: &str, bars: &[PriceBar]) -> String {
    let mut prompt = format!(
        "Analyze the stock {}. Below are its 5-minute candlesticks from the latest sessions up to now.\n\ncandlestick_data = [\n",
        symbol
    );

    for bar in bars {
        let _ = writeln!(
            prompt,
            "  {{\"timestamp\": \"{}\", \"open\": {:.2}, \"high\": {:.2}, \"low\": {:.2}, \"close\": {:.2}, \"volume\": {}}},",
            bar.timestamp.to_rfc3339(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }

    prompt.push_str("]\n\n");
    prompt.push_str(INSTRUCTIONS);
    prompt
}
