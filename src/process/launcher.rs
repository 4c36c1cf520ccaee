use crate::bootstrap::ServiceIdentity;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::logs::LogCapture;
use crate::process::entry::EntryProcess;
use crate::process::spawner::{spawn_process, EntrySpec};
use crate::shutdown::Shutdown;
use std::path::Path;
use std::time::Duration;

/// How long to keep draining output after the entry command exited.
/// Grandchildren that inherited the pipes can hold them open forever.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the entry command, capture its output into `logs_dir`, and wait
/// until it exits or `shutdown` fires. Returns the exit code to propagate.
pub async fn launch(
    config: &ServiceConfig,
    logs_dir: &Path,
    run_as: Option<ServiceIdentity>,
    capture: Option<LogCapture>,
    shutdown: Shutdown,
) -> Result<i32> {
    let spec = EntrySpec::from_config(config, run_as);
    let mut spawned = spawn_process(&spec).await?;

    let capture = capture.unwrap_or_else(|| LogCapture::new(logs_dir, &config.name));
    let handles = capture.attach(&mut spawned.child).await?;

    let mut entry =
        EntryProcess::new(spawned, &config.entry.stop_signal, config.entry.stop_timeout())?;
    let code = entry.run_until(shutdown.wait()).await?;

    match tokio::time::timeout(DRAIN_TIMEOUT, handles.join()).await {
        Ok((stdout, stderr)) => tracing::debug!(
            "Captured {} stdout and {} stderr lines from {}",
            stdout,
            stderr,
            entry.name
        ),
        Err(_) => tracing::warn!(
            "Output of {} still open {:?} after exit, not waiting further",
            entry.name,
            DRAIN_TIMEOUT
        ),
    }

    Ok(code)
}
