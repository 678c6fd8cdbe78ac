//! Message formatting for Telegram notifications.

use crate::port::outbound::notifier::Event;

use super::notifier::TelegramSettings;

/// Format an event into a Telegram message, or None if the event should be skipped.
pub fn format_event_message(event: &Event, settings: &TelegramSettings) -> Option<String> {
    match event {
        Event::ValidationComplete(prediction) if settings.notify_validations => {
            let outcome = prediction.outcome()?;
            let emoji = match outcome.realized_r {
                r if r > 0.0 => "✅",
                r if r < 0.0 => "❌",
                _ => "⏹️",
            };

            Some(format!(
                "{} *Prediction {}*\n\
                \n\
                📋 {} `{}`\n\
                🧩 Setup: `{}`\n\
                🎯 Exit: `{}`\n\
                📈 Result: `{:+.2}R`",
                emoji,
                escape_markdown(prediction.status().as_str()),
                escape_markdown(prediction.snapshot.symbol.as_str()),
                prediction.targets.direction(),
                truncate(&prediction.setup_key(), 40),
                outcome.exit_price,
                outcome.realized_r
            ))
        }
        Event::InsightReady(record) if settings.notify_insights => {
            let mut msg = format!(
                "🧠 *Insight {} \\(v{}\\)*\n\
                \n\
                📊 Trades: `{}`\n\
                ✔️ Eligible buckets: `{}`\n",
                escape_markdown(&record.period.to_string()),
                record.version,
                record.evidence.total_trades,
                record.evidence.eligible_buckets
            );

            if let Some(best) = record.best_setups.first() {
                msg.push_str(&format!(
                    "🏆 Best setup: `{}` \\(`{:+.2}R`\\)\n",
                    truncate(&best.value, 40),
                    best.average_r
                ));
            }
            if let Some(worst) = record.worst_setups.first() {
                msg.push_str(&format!(
                    "🪫 Worst setup: `{}` \\(`{:+.2}R`\\)\n",
                    truncate(&worst.value, 40),
                    worst.average_r
                ));
            }
            if record.has_deltas() {
                msg.push_str("\n*Adjustments*\n");
                for (name, delta) in &record.deltas {
                    msg.push_str(&format!("• `{name}`: `{delta:+.3}`\n"));
                }
            }
            if !record.calibration_warnings.is_empty() {
                msg.push_str(&format!(
                    "\n⚠️ Calibration: {}",
                    escape_markdown(&record.calibration_warnings.join(", "))
                ));
            }

            Some(msg)
        }
        Event::Degraded { stage, reason } if settings.notify_degraded => Some(format!(
            "🛑 *Run Degraded*\n\
            \n\
            ⚙️ Stage: `{}`\n\
            ⚠️ Reason: {}",
            stage,
            escape_markdown(&truncate(reason, 200))
        )),
        _ => None,
    }
}

/// Truncate a string with ellipsis (Unicode-safe).
pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

/// Escape special characters for Telegram `MarkdownV2`.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        if special_chars.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }

    result
}
