use async_trait::async_trait;
use common::config::TelegramSettings;
use common::models::{Detection, PatternBias};
use teloxide::prelude::*;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Destination for alert messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, text: String) -> anyhow::Result<()>;
}

pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramSink {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self {
            bot: Bot::new(&settings.token),
            chat_id: ChatId(settings.chat_id),
        }
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn deliver(&self, text: String) -> anyhow::Result<()> {
        self.bot.send_message(self.chat_id, text).await?;
        Ok(())
    }
}

/// Forwards every alert from the scan feed to a sink.
pub struct AlertNotifier<S> {
    sink: S,
}

impl<S: AlertSink> AlertNotifier<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub async fn start(self, mut rx: broadcast::Receiver<Detection>) {
        info!("Starting alert notifier");

        loop {
            match rx.recv().await {
                Ok(alert) => {
                    // Delivery failures are logged and skipped.
                    if let Err(e) = self.sink.deliver(format_alert(&alert)).await {
                        error!("Failed to deliver alert for {}: {:#}", alert.symbol, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Alert notifier lagged behind. Missed {} alerts.", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Alert channel closed. Stopping notifier.");
                    break;
                }
            }
        }
    }
}

pub fn format_alert(alert: &Detection) -> String {
    let marker = match alert.bias {
        PatternBias::Bullish => "🟢",
        PatternBias::Bearish => "🔴",
        PatternBias::Neutral => "⚪",
    };
    let verified = if alert.verified { " (verified)" } else { "" };
    format!(
        "{} {} {} @ {:.4}\nconfidence {:.0}%{}\n{}",
        marker,
        alert.symbol,
        alert.pattern,
        alert.price,
        alert.confidence * 100.0,
        verified,
        alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
