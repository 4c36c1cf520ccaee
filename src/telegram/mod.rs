// Telegram module - Long-polling transport for the bot

mod api;

pub use api::{CallbackQuery, Chat, Message, TelegramClient, Update, User};

use crate::bot::{HaikuBot, Incoming, Reply};
use crate::config::TelegramConfig;
use crate::error::{HaikuError, Result};
use crate::shutdown::Shutdown;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Delay before polling again after a network error
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TelegramPoller {
    client: TelegramClient,
    bot: HaikuBot,
    poll_timeout_secs: u64,
}

impl TelegramPoller {
    pub fn new(client: TelegramClient, bot: HaikuBot, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            bot,
            poll_timeout_secs,
        }
    }

    /// Build a poller when a token is configured
    pub fn from_config(config: &TelegramConfig, bot: HaikuBot) -> Result<Option<Self>> {
        let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let client = TelegramClient::new(
            &config.api_base,
            token,
            Duration::from_secs(config.poll_timeout_secs),
        )?;
        Ok(Some(Self::new(client, bot, config.poll_timeout_secs)))
    }

    /// Poll until `shutdown` fires. Each update is handled on its own task
    /// so a long retrain does not stall other chats.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        info!("Telegram polling started");
        let mut offset = 0;

        loop {
            let polled = tokio::select! {
                _ = shutdown.clone().wait() => break,
                polled = self.client.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let client = self.client.clone();
                        let bot = self.bot.clone();
                        tokio::spawn(async move {
                            if let Err(e) = dispatch(&client, &bot, update).await {
                                warn!("Failed to handle update: {}", e);
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!("Polling failed, retrying in {:?}: {}", RETRY_DELAY, e);
                    tokio::select! {
                        _ = shutdown.clone().wait() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram polling stopped");
        Ok(())
    }
}

/// Route one update through the bot and deliver its replies
pub async fn dispatch(client: &TelegramClient, bot: &HaikuBot, update: Update) -> Result<()> {
    if let Some(query) = update.callback_query {
        return dispatch_callback(client, bot, query).await;
    }

    let Some(message) = update.message else {
        debug!("Ignoring update {} without a message", update.update_id);
        return Ok(());
    };
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };
    let Some(incoming) = Incoming::from_message(text) else {
        debug!("Ignoring unknown command: {}", text);
        return Ok(());
    };

    let chat_id = message.chat.id;
    let user_id = message.from.as_ref().map_or(chat_id, |user| user.id);

    if incoming.runs_generation() && bot.is_loaded().await {
        if let Err(e) = client.send_typing(chat_id).await {
            debug!("sendChatAction failed: {}", e);
        }
    }

    relay(bot, user_id, incoming, move |reply| async move {
        client.send_message(chat_id, &reply).await
    })
    .await
}

async fn dispatch_callback(
    client: &TelegramClient,
    bot: &HaikuBot,
    query: CallbackQuery,
) -> Result<()> {
    client.answer_callback_query(&query.id).await?;

    let (Some(data), Some(message)) = (query.data, query.message) else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let incoming = Incoming::Callback(data);

    if incoming.runs_generation() {
        if let Err(e) = client.send_typing(chat_id).await {
            debug!("sendChatAction failed: {}", e);
        }
    }

    let message_id = message.message_id;
    relay(bot, query.from.id, incoming, move |reply| async move {
        deliver(client, chat_id, message_id, &reply).await
    })
    .await
}

/// Deliver replies while the bot is still producing them, so a retrain
/// announces itself before training finishes
async fn relay<F, Fut>(bot: &HaikuBot, user_id: i64, incoming: Incoming, mut send: F) -> Result<()>
where
    F: FnMut(Reply) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let respond = async move { bot.respond(user_id, incoming, &tx).await };
    let forward = async {
        while let Some(reply) = rx.recv().await {
            send(reply).await?;
        }
        Ok::<(), HaikuError>(())
    };

    let ((), forwarded) = tokio::join!(respond, forward);
    forwarded
}

async fn deliver(client: &TelegramClient, chat_id: i64, message_id: i64, reply: &Reply) -> Result<()> {
    if !reply.edit {
        return client.send_message(chat_id, reply).await;
    }

    match client.edit_message_text(chat_id, message_id, reply).await {
        // Editing to identical content is rejected; nothing to show then
        Err(HaikuError::TelegramError(e)) if e.contains("message is not modified") => Ok(()),
        other => other,
    }
}
