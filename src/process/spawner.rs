use crate::bootstrap::{RuntimeEnv, ServiceIdentity};
use crate::config::ServiceConfig;
use crate::error::{HaikuError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Everything needed to start the entry command
#[derive(Debug, Clone)]
pub struct EntrySpec {
    /// Name used in logs and log file names
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: RuntimeEnv,
    /// Account to switch to in the child; `None` keeps the current one
    pub run_as: Option<ServiceIdentity>,
}

impl EntrySpec {
    /// Build the spec from the startup configuration
    pub fn from_config(config: &ServiceConfig, run_as: Option<ServiceIdentity>) -> Self {
        Self {
            name: config.name.clone(),
            program: config.entry.program.clone(),
            args: config.entry.args.clone(),
            cwd: config.workdir.clone(),
            env: RuntimeEnv::for_workdir(&config.workdir).with_extra(&config.entry.env),
            run_as,
        }
    }
}

/// Metadata returned when spawning a process
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,

    pub name: String,
}

/// Spawn the entry command with piped stdout/stderr.
///
/// Programs given as a path must exist; bare names are looked up in PATH.
pub async fn spawn_process(spec: &EntrySpec) -> Result<SpawnedProcess> {
    if spec.program.components().count() > 1 && !spec.program.exists() {
        return Err(HaikuError::SpawnError(format!(
            "Program does not exist: {}",
            spec.program.display()
        )));
    }

    if !spec.cwd.is_dir() {
        return Err(HaikuError::SpawnError(format!(
            "Working directory does not exist: {}",
            spec.cwd.display()
        )));
    }

    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    command.current_dir(&spec.cwd);
    spec.env.apply(&mut command);

    #[cfg(unix)]
    if let Some(identity) = spec.run_as {
        command.uid(identity.uid);
        command.gid(identity.gid);
    }

    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        HaikuError::SpawnError(format!(
            "Failed to spawn '{}': {}",
            spec.program.display(),
            e
        ))
    })?;

    let pid = child.id().ok_or_else(|| {
        HaikuError::SpawnError(format!("Failed to get PID for '{}'", spec.name))
    })?;

    tracing::info!(
        "Started {} (PID: {}): {} {}",
        spec.name,
        pid,
        spec.program.display(),
        spec.args.join(" ")
    );

    Ok(SpawnedProcess {
        child,
        pid,
        name: spec.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn spec(program: &str, args: &[&str], cwd: &Path) -> EntrySpec {
        EntrySpec {
            name: "test".to_string(),
            program: PathBuf::from(program),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.to_path_buf(),
            env: RuntimeEnv::for_workdir(cwd),
            run_as: None,
        }
    }

    #[tokio::test]
    async fn test_spawn_captures_stdout_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let spawned = spawn_process(&spec("/bin/echo", &["hello"], temp_dir.path()))
            .await
            .unwrap();

        assert!(spawned.pid > 0);
        assert!(spawned.child.stdout.is_some());
        assert!(spawned.child.stderr.is_some());
    }

    #[tokio::test]
    async fn test_spawn_applies_runtime_env() {
        let temp_dir = TempDir::new().unwrap();
        let mut spawned = spawn_process(&spec(
            "/bin/sh",
            &["-c", "printf '%s|%s|%s' \"$PYTHONPATH\" \"$PYTHONUNBUFFERED\" \"$(pwd)\""],
            temp_dir.path(),
        ))
        .await
        .unwrap();

        let mut output = String::new();
        let mut stdout = spawned.child.stdout.take().unwrap();
        tokio::io::AsyncReadExt::read_to_string(&mut stdout, &mut output)
            .await
            .unwrap();
        spawned.child.wait().await.unwrap();

        let parts: Vec<&str> = output.split('|').collect();
        let workdir = temp_dir.path().to_string_lossy();
        assert_eq!(parts[0], workdir);
        assert_eq!(parts[1], "1");
        assert_eq!(
            Path::new(parts[2]).canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_program() {
        let temp_dir = TempDir::new().unwrap();
        let result = spawn_process(&spec("/nonexistent/program", &[], temp_dir.path())).await;

        match result {
            Err(HaikuError::SpawnError(msg)) => assert!(msg.contains("does not exist")),
            other => panic!("Expected SpawnError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_unknown_program_on_path() {
        let temp_dir = TempDir::new().unwrap();
        let result = spawn_process(&spec("haiku-no-such-binary", &[], temp_dir.path())).await;

        assert!(matches!(result, Err(HaikuError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_spawn_invalid_working_directory() {
        let result = spawn_process(&spec("/bin/echo", &[], Path::new("/nonexistent/dir"))).await;

        assert!(matches!(result, Err(HaikuError::SpawnError(_))));
    }
}
