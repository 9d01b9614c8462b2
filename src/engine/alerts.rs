// Telegram (Markdown) message bodies for scanner events

use chrono::{DateTime, Utc};

use crate::execution::{ExitReason, PerformanceRow, Position};
use crate::models::OrderBookSummary;
use crate::regime::{RegimeState, RegimeTransition, RotationEvent};
use crate::strategy::ScoreCard;

const BOT_NAME: &str = "BREAKOUT SCANNER";
const RULE: &str = "━━━━━━━━━━━━━━━━━━";

fn order_book_lines(book: Option<&OrderBookSummary>) -> String {
    match book {
        Some(book) => format!(
            "\n📗 Bid Depth: `{:.0}` USDT\n📕 Ask Depth: `{:.0}` USDT\n⚖️ Imbalance: `{:.2}`",
            book.bid_depth, book.ask_depth, book.imbalance
        ),
        None => String::new(),
    }
}

pub fn signal_opened(
    position: &Position,
    card: &ScoreCard,
    book: Option<&OrderBookSummary>,
) -> String {
    let breakout = if card.pre_breakout_fired() {
        "\n🧨 Pre-breakout pattern on 4h"
    } else {
        ""
    };

    format!(
        "👑 *{BOT_NAME}*\n{RULE}\n💰 *{}*\n{} {} | *SIGNAL #1*\n{RULE}\n💵 Price: `{}`\n📊 Score: *{}/100*\n🕐 Time: `{}`{}{}\n⚠️ Stop Loss: `-{:.2}%`",
        position.symbol,
        position.label.emoji(),
        position.label,
        position.entry_price,
        card.score,
        position.entry_time.format("%H:%M:%S"),
        order_book_lines(book),
        breakout,
        position.stop_loss_pct,
    )
}

pub fn level_up(position: &Position, price: f64, gain_pct: f64) -> String {
    let icon = if position.level >= 3 { "🔥" } else { "🚀" };
    format!(
        "{icon} {} {} | *SIGNAL #{}*\n{RULE}\n💰 *{}*\n📈 Gain: *+{:.2}%*\n💵 Price: `{}`\n📊 Score: *{}/100*",
        position.label.emoji(),
        position.label,
        position.level,
        position.symbol,
        gain_pct,
        price,
        position.score,
    )
}

/// Exit message; stale evictions are not announced
pub fn closed(position: &Position, price: Option<f64>, reason: ExitReason) -> Option<String> {
    let price = price?;
    let change = position.gain_pct(price);

    match reason {
        ExitReason::StopLoss => Some(format!(
            "🛑 *STOP LOSS* | `{}`\n📉 Loss: `{:.2}%`\n💵 Entry: `{}`\n💵 Now: `{}`",
            position.symbol, change, position.entry_price, price
        )),
        ExitReason::TrailingStop => Some(format!(
            "🎯 *TRAILING STOP* | `{}`\n📈 Result: `{:+.2}%`\n🏔️ Peak: `{}`\n💵 Entry: `{}`\n💵 Now: `{}`",
            position.symbol, change, position.peak_price, position.entry_price, price
        )),
        ExitReason::Stale => None,
    }
}

pub fn regime_change(
    transition: &RegimeTransition,
    inputs: Option<(f64, f64)>,
    reference: &str,
) -> String {
    let icon = match transition.to {
        RegimeState::Permissive => "🟢",
        RegimeState::Cautious => "🟡",
        RegimeState::Restrictive => "🔴",
    };
    let mut msg = format!(
        "{icon} *MARKET REGIME*: {} → *{}*",
        transition.from, transition.to
    );
    if let Some((change_24h, short_trend)) = inputs {
        msg.push_str(&format!(
            "\n📊 {reference} 24h: `{:+.2}%` | 1h: `{:+.2}%`",
            change_24h, short_trend
        ));
    }
    msg
}

pub fn sector_rotation(event: &RotationEvent) -> String {
    let mut msg = String::from("🔄 *SECTOR ROTATION*\n");
    for stats in &event.stats {
        msg.push_str(&format!(
            "🔥 *{}* avg `{:+.2}%` | rising `{:.0}%`\n",
            stats.name,
            stats.avg_change,
            stats.rising_fraction * 100.0
        ));
    }
    if !event.exited.is_empty() {
        msg.push_str(&format!("❄️ Cooled: {}\n", event.exited.join(", ")));
    }
    if !event.top_movers.is_empty() {
        msg.push_str("🏃 Top movers:\n");
        for (symbol, change) in &event.top_movers {
            msg.push_str(&format!("   `{}` `{:+.2}%`\n", symbol, change));
        }
    }
    msg.trim_end().to_string()
}

/// Report body, or None when nothing grew enough
pub fn performance_report(rows: &[PerformanceRow], now: DateTime<Utc>) -> Option<String> {
    if rows.is_empty() {
        return None;
    }

    let mut msg = format!(
        "⚡ *PERFORMANCE REPORT*\n🕐 `{}`\n\n",
        now.format("%Y-%m-%d %H:%M")
    );
    for row in rows {
        msg.push_str(&format!(
            "🔥 *{}*\n   Discovery: `{}`\n   Now: `{}`\n   Growth: *+{:.2}%* | Score: *{}*\n\n",
            row.symbol, row.discovery_price, row.current_price, row.growth_pct, row.score
        ));
    }
    Some(msg.trim_end().to_string())
}

pub fn startup_banner(
    min_label_score: u32,
    stop_range: (f64, f64),
    interval_secs: u64,
    max_candidates: usize,
) -> String {
    format!(
        "🤖 *{BOT_NAME}* started\n⚙️ Score Min: `{}` | Stop Loss: `-{:.0}%..-{:.0}%`\n📊 Interval: `{}s` | Max Pairs: `{}`",
        min_label_score, stop_range.0, stop_range.1, interval_secs, max_candidates
    )
}

pub fn shutdown_banner() -> String {
    format!("⛔ *{BOT_NAME}* stopped")
}
