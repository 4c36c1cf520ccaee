// Shared stop notification fed by SIGTERM/SIGINT

use crate::error::{HaikuError, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Sending half; triggering is idempotent
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every task that must stop
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown was requested. Also resolves if every trigger
    /// was dropped.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Wait for SIGTERM or SIGINT and return the signal's name
pub async fn wait_for_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        let mut sigterm = unix_signal(SignalKind::terminate()).map_err(|e| {
            HaikuError::SignalError(format!("Failed to install SIGTERM handler: {}", e))
        })?;
        let mut sigint = unix_signal(SignalKind::interrupt()).map_err(|e| {
            HaikuError::SignalError(format!("Failed to install SIGINT handler: {}", e))
        })?;

        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(|e| {
            HaikuError::SignalError(format!("Failed to install Ctrl+C handler: {}", e))
        })?;
        Ok("Ctrl+C")
    }
}

/// Trigger shutdown on the first SIGTERM/SIGINT
pub fn listen_for_signals() -> Shutdown {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                info!("Received {}, shutting down", name);
                trigger.trigger();
            }
            Err(e) => {
                // Dropping the trigger would read as a shutdown request
                tracing::error!("{}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    shutdown
}
