use crate::error::{HaikuError, Result};
use crate::process::spawner::SpawnedProcess;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::future::Future;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// The running entry command
pub struct EntryProcess {
    pub child: Child,
    pub pid: u32,
    pub name: String,
    stop_signal: Signal,
    stop_timeout: Duration,
}

impl EntryProcess {
    pub fn new(spawned: SpawnedProcess, stop_signal: &str, stop_timeout: Duration) -> Result<Self> {
        Ok(Self {
            child: spawned.child,
            pid: spawned.pid,
            name: spawned.name,
            stop_signal: parse_signal(stop_signal)?,
            stop_timeout,
        })
    }

    /// Send the stop signal, wait up to the stop timeout, then SIGKILL
    pub async fn stop(&mut self) -> Result<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Ok(status);
        }

        let pid = Pid::from_raw(self.pid as i32);

        tracing::info!(
            "Stopping {} (PID: {}) with {}",
            self.name,
            self.pid,
            self.stop_signal
        );
        signal::kill(pid, self.stop_signal).map_err(|e| {
            HaikuError::StopError(
                self.name.clone(),
                format!("Failed to send {}: {}", self.stop_signal, e),
            )
        })?;

        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("{} exited with {}", self.name, status);
                return Ok(status);
            }
            Ok(Err(e)) => {
                return Err(HaikuError::StopError(
                    self.name.clone(),
                    format!("Wait failed: {}", e),
                ));
            }
            Err(_) => {
                tracing::warn!(
                    "{} did not exit within {:?}, sending SIGKILL",
                    self.name,
                    self.stop_timeout
                );
            }
        }

        signal::kill(pid, Signal::SIGKILL).map_err(|e| {
            HaikuError::StopError(
                self.name.clone(),
                format!("Failed to send SIGKILL after timeout: {}", e),
            )
        })?;

        self.child
            .wait()
            .await
            .map_err(|e| HaikuError::StopError(self.name.clone(), format!("Wait failed: {}", e)))
    }

    /// Wait for the entry command to exit on its own, or stop it when
    /// `shutdown` resolves first. Returns the exit code to propagate.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<i32>
    where
        F: Future<Output = ()>,
    {
        let status = tokio::select! {
            status = self.child.wait() => status?,
            _ = shutdown => self.stop().await?,
        };

        let code = exit_code(status);
        tracing::info!("{} finished with exit code {}", self.name, code);
        Ok(code)
    }
}

/// Exit code of a finished process; 128 + signal number when it was killed
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}

pub fn parse_signal(signal_name: &str) -> Result<Signal> {
    match signal_name {
        "SIGTERM" => Ok(Signal::SIGTERM),
        "SIGINT" => Ok(Signal::SIGINT),
        "SIGQUIT" => Ok(Signal::SIGQUIT),
        "SIGKILL" => Ok(Signal::SIGKILL),
        "SIGHUP" => Ok(Signal::SIGHUP),
        "SIGUSR1" => Ok(Signal::SIGUSR1),
        "SIGUSR2" => Ok(Signal::SIGUSR2),
        _ => Err(HaikuError::SignalError(format!(
            "Invalid signal name: {}",
            signal_name
        ))),
    }
}
