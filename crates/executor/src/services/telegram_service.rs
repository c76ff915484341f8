use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use common::SignalError;
use common::traits::{NotificationSink, Recipient};

use crate::services::dispatcher::{Command, CommandDispatcher};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Telegram Bot API client used for every outbound message.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> anyhow::Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            bot: Bot::with_client(token, client),
        })
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub async fn setup_webhook(&self, webhook_url: &str) -> anyhow::Result<()> {
        let url = Url::parse(webhook_url).context("Invalid webhook URL")?;
        self.bot
            .set_webhook(url)
            .await
            .context("Telegram rejected setWebhook")?;
        info!("Telegram webhook registered at {}", webhook_url);
        Ok(())
    }

    pub async fn delete_webhook(&self) -> anyhow::Result<()> {
        self.bot
            .delete_webhook()
            .await
            .context("Telegram rejected deleteWebhook")?;
        info!("Telegram webhook removed");
        Ok(())
    }

    /// Long-polls updates and feeds text messages to the dispatcher until
    /// the returned task is aborted.
    pub fn spawn_polling(&self, dispatcher: Arc<CommandDispatcher>) -> JoinHandle<()> {
        let bot = self.bot();

        tokio::spawn(async move {
            if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
                warn!("Failed to register bot commands: {}", e);
            }

            let handler = Update::filter_message().endpoint(
                |msg: Message, dispatcher: Arc<CommandDispatcher>| async move {
                    if let Some(text) = msg.text() {
                        dispatcher.dispatch(msg.chat.id.0, text).await;
                    }
                    respond(())
                },
            );

            info!("Polling Telegram for updates");
            Dispatcher::builder(bot, handler)
                .dependencies(dptree::deps![dispatcher])
                .build()
                .dispatch()
                .await;
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<(), SignalError> {
        debug!("Sending {} chars to chat {}", text.len(), recipient);

        self.bot
            .send_message(ChatId(recipient), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(SignalError::delivery)?;

        Ok(())
    }
}
