//! Telegram notifier.
//!
//! Provides the [`TelegramNotifier`] for sending engine notifications.
//! Messages are queued on a channel and delivered by a background worker
//! so `notify` never blocks the scheduler.
//!
//! Requires the `telegram` feature to be enabled.

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::port::outbound::notifier::{Event, Notifier};

use super::format::format_event_message;

/// Delivery target and event filter for the Telegram notifier.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Bot API token obtained from BotFather.
    pub bot_token: String,
    /// Target chat ID for notifications.
    pub chat_id: i64,
    /// Send one message per validated prediction (can be noisy).
    pub notify_validations: bool,
    /// Send new insight summaries.
    pub notify_insights: bool,
    /// Send degraded-run alerts.
    pub notify_degraded: bool,
}

/// Telegram notifier that sends messages to a chat.
pub struct TelegramNotifier {
    /// Channel sender for queuing outbound notifications.
    sender: mpsc::UnboundedSender<Event>,
}

impl TelegramNotifier {
    /// Create a new Telegram notifier and spawn the background worker.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(settings: TelegramSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(telegram_worker(settings, receiver));
        Self { sender }
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, event: Event) {
        if self.sender.send(event).is_err() {
            warn!("Telegram notifier channel closed");
        }
    }
}

/// Background worker that sends Telegram messages.
async fn telegram_worker(settings: TelegramSettings, mut receiver: mpsc::UnboundedReceiver<Event>) {
    let bot = Bot::new(&settings.bot_token);
    let chat_id = ChatId(settings.chat_id);

    info!(chat_id = settings.chat_id, "Telegram notifier started");

    while let Some(event) = receiver.recv().await {
        let Some(text) = format_event_message(&event, &settings) else {
            continue;
        };

        if let Err(e) = bot
            .send_message(chat_id, &text)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            error!(error = %e, "Failed to send Telegram message");
        }
    }

    warn!("Telegram notifier worker shutting down");
}
