// Integration tests for running the entry command

use haiku::config::ServiceConfig;
use haiku::error::HaikuError;
use haiku::logs::LogCapture;
use haiku::process;
use haiku::shutdown;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn shell_config(workdir: &Path, script: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.name = "entry".to_string();
    config.workdir = workdir.to_path_buf();
    config.entry.program = PathBuf::from("/bin/sh");
    config.entry.args = vec!["-c".to_string(), script.to_string()];
    config.entry.stop_timeout_secs = 2;
    config
}

fn quiet_capture(logs_dir: &Path) -> Option<LogCapture> {
    Some(LogCapture::new(logs_dir, "entry").without_echo())
}

async fn wait_for_log(path: &Path, needle: &str, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Ok(contents) = fs::read_to_string(path) {
            if contents.contains(needle) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_exit_code_is_propagated() {
    let temp_dir = TempDir::new().unwrap();
    let logs_dir = temp_dir.path().join("logs");
    fs::create_dir(&logs_dir).unwrap();
    let config = shell_config(temp_dir.path(), "echo done; exit 3");

    let (_trigger, stop) = shutdown::channel();
    let code = process::launch(&config, &logs_dir, None, quiet_capture(&logs_dir), stop)
        .await
        .unwrap();

    assert_eq!(code, 3);
    let out = fs::read_to_string(logs_dir.join("entry-out.log")).unwrap();
    assert!(out.contains("done"));
}

#[tokio::test]
async fn test_runtime_environment_reaches_entry() {
    let temp_dir = TempDir::new().unwrap();
    let logs_dir = temp_dir.path().join("logs");
    fs::create_dir(&logs_dir).unwrap();

    let mut config = shell_config(
        temp_dir.path(),
        "echo \"path=$PYTHONPATH unbuffered=$PYTHONUNBUFFERED extra=$EXTRA\"; echo oops >&2",
    );
    config
        .entry
        .env
        .insert("EXTRA".to_string(), "value".to_string());
    // The runtime contract cannot be overridden
    config
        .entry
        .env
        .insert("PYTHONUNBUFFERED".to_string(), "0".to_string());

    let (_trigger, stop) = shutdown::channel();
    let code = process::launch(&config, &logs_dir, None, quiet_capture(&logs_dir), stop)
        .await
        .unwrap();
    assert_eq!(code, 0);

    let out = fs::read_to_string(logs_dir.join("entry-out.log")).unwrap();
    assert!(out.contains(&format!(
        "path={} unbuffered=1 extra=value",
        temp_dir.path().display()
    )));

    let err = fs::read_to_string(logs_dir.join("entry-err.log")).unwrap();
    assert!(err.contains("oops"));
}

#[tokio::test]
async fn test_output_visible_before_exit_and_stop_on_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let logs_dir = temp_dir.path().join("logs");
    fs::create_dir(&logs_dir).unwrap();
    let config = shell_config(temp_dir.path(), "echo first; exec sleep 30");

    let (trigger, stop) = shutdown::channel();
    let task = {
        let logs_dir = logs_dir.clone();
        tokio::spawn(async move {
            process::launch(&config, &logs_dir, None, quiet_capture(&logs_dir), stop).await
        })
    };

    // Visible while the process is still running
    assert!(
        wait_for_log(
            &logs_dir.join("entry-out.log"),
            "first",
            Duration::from_secs(5)
        )
        .await
    );
    assert!(!task.is_finished());

    trigger.trigger();
    let code = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Terminated by SIGTERM
    assert_eq!(code, 128 + 15);
}

#[tokio::test]
async fn test_stubborn_entry_is_killed_after_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let logs_dir = temp_dir.path().join("logs");
    fs::create_dir(&logs_dir).unwrap();
    let mut config = shell_config(
        temp_dir.path(),
        "trap '' TERM; echo ready; while true; do sleep 1; done",
    );
    config.entry.stop_timeout_secs = 1;

    let (trigger, stop) = shutdown::channel();
    let task = {
        let logs_dir = logs_dir.clone();
        tokio::spawn(async move {
            process::launch(&config, &logs_dir, None, quiet_capture(&logs_dir), stop).await
        })
    };

    assert!(
        wait_for_log(
            &logs_dir.join("entry-out.log"),
            "ready",
            Duration::from_secs(5)
        )
        .await
    );
    trigger.trigger();

    let code = tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(code, 128 + 9);
}

#[tokio::test]
async fn test_missing_program_fails_to_spawn() {
    let temp_dir = TempDir::new().unwrap();
    let logs_dir = temp_dir.path().join("logs");
    fs::create_dir(&logs_dir).unwrap();

    let mut config = shell_config(temp_dir.path(), "");
    config.entry.program = PathBuf::from("/nonexistent/python");

    let (_trigger, stop) = shutdown::channel();
    let result = process::launch(&config, &logs_dir, None, quiet_capture(&logs_dir), stop).await;
    assert!(matches!(result, Err(HaikuError::SpawnError(_))));
}
