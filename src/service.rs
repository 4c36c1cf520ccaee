// Native service: HTTP API, model lifecycle and optional Telegram polling

use crate::bot::{BotSettings, HaikuBot, TrainingOutcome};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::server;
use crate::shutdown::Shutdown;
use crate::telegram::TelegramPoller;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Run until `shutdown` fires.
///
/// The listener is already bound, so the port accepts connections while
/// the model is still loading; `/health` reports the model state.
pub async fn run(config: &ServiceConfig, listener: TcpListener, shutdown: Shutdown) -> Result<()> {
    let bot = HaikuBot::new(BotSettings::from_config(config));

    let trainer = {
        let bot = bot.clone();
        tokio::spawn(async move {
            match bot.load_or_train().await {
                Ok(TrainingOutcome::Loaded) => info!("Model ready"),
                Ok(TrainingOutcome::Trained(_)) => info!("Model trained and ready"),
                Ok(TrainingOutcome::StillTraining) => {
                    warn!("Model is not ready yet, requests are answered as training")
                }
                Err(e) => error!("Model unavailable: {}", e),
            }
        })
    };

    let poller = match TelegramPoller::from_config(&config.telegram, bot.clone())? {
        Some(poller) => Some(tokio::spawn(poller.run(shutdown.clone()))),
        None => {
            info!("No Telegram token configured, polling disabled");
            None
        }
    };

    let served = server::serve(listener, bot, shutdown).await;

    if let Some(poller) = poller {
        match poller.await {
            Ok(Err(e)) => error!("Telegram polling failed: {}", e),
            Err(e) => error!("Telegram polling task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }
    trainer.abort();

    served
}
