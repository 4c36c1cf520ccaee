use crate::error::{HaikuError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Signals accepted as the entry command's stop signal
pub const VALID_STOP_SIGNALS: [&str; 7] = [
    "SIGTERM", "SIGINT", "SIGQUIT", "SIGKILL", "SIGHUP", "SIGUSR1", "SIGUSR2",
];

/// Process-wide configuration, populated once at startup and passed down
/// explicitly instead of being looked up from the environment on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, used for log file naming
    #[serde(default = "default_name")]
    pub name: String,

    /// Working directory holding the application tree
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Log directory, relative to the working directory
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Address the HTTP listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the HTTP listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub entry: EntryConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Unprivileged account the service runs as
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub uid: u32,
    pub gid: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            uid: 1000,
            gid: 1000,
        }
    }
}

/// Command started by `haiku launch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Program to execute (looked up in PATH when relative)
    pub program: PathBuf,

    /// Command-line arguments
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Signal to send on stop (default: SIGTERM)
    pub stop_signal: String,

    /// Timeout before force kill (in seconds)
    pub stop_timeout_secs: u64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python"),
            args: vec!["haiku.py".to_string()],
            env: HashMap::new(),
            stop_signal: "SIGTERM".to_string(),
            stop_timeout_secs: 10,
        }
    }
}

impl EntryConfig {
    /// Get stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Dependency manifest checked before anything is started
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Manifest path, relative to the working directory
    pub path: PathBuf,

    /// Directory of installed `*.dist-info` entries to resolve against
    pub site_packages: Option<PathBuf>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("requirements.txt"),
            site_packages: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding model artifacts (defaults to the working directory)
    pub dir: Option<PathBuf>,

    /// N-gram order of the language model
    pub order: usize,

    /// Optional JSON corpus replacing the built-in one
    pub corpus: Option<PathBuf>,

    /// Maximum number of generation steps per completion
    pub max_length: usize,

    /// Sampling temperature for first generations
    pub temperature: f64,

    /// Sampling temperature for "another variant" requests
    pub regenerate_temperature: f64,

    /// Upper bound on how long startup waits for training
    pub training_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: None,
            order: 3,
            corpus: None,
            max_length: 15,
            temperature: 0.8,
            regenerate_temperature: 0.9,
            training_timeout_secs: 3600,
        }
    }
}

impl ModelConfig {
    pub fn training_timeout(&self) -> Duration {
        Duration::from_secs(self.training_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Users allowed to trigger retraining
    pub admin_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; polling is disabled when unset
    pub token: Option<String>,

    /// Long-poll timeout passed to getUpdates (in seconds)
    pub poll_timeout_secs: u64,

    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_timeout_secs: 30,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

// Default value functions for serde
fn default_name() -> String {
    "haiku".to_string()
}

fn default_workdir() -> PathBuf {
    PathBuf::from("/app")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            workdir: default_workdir(),
            logs_dir: default_logs_dir(),
            bind_address: default_bind_address(),
            port: default_port(),
            identity: IdentityConfig::default(),
            entry: EntryConfig::default(),
            manifest: ManifestConfig::default(),
            model: ModelConfig::default(),
            bot: BotConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Build the startup configuration: defaults or the given file, then
    /// environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load a configuration file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HaikuError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(HaikuError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| HaikuError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| HaikuError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Apply `HAIKU_*` and `TELEGRAM_BOT_TOKEN` overrides
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(workdir) = lookup("HAIKU_WORKDIR") {
            self.workdir = PathBuf::from(workdir);
        }
        if let Some(bind) = lookup("HAIKU_BIND") {
            self.bind_address = bind;
        }
        if let Some(port) = lookup("HAIKU_PORT") {
            self.port = parse_override("HAIKU_PORT", &port)?;
        }
        if let Some(uid) = lookup("HAIKU_UID") {
            self.identity.uid = parse_override("HAIKU_UID", &uid)?;
        }
        if let Some(gid) = lookup("HAIKU_GID") {
            self.identity.gid = parse_override("HAIKU_GID", &gid)?;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.token = Some(token);
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(HaikuError::ConfigValidationError(
                "name must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(HaikuError::ConfigValidationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.identity.uid == 0 {
            return Err(HaikuError::ConfigValidationError(
                "identity.uid must not be 0; the service never runs as root".to_string(),
            ));
        }

        if self.logs_dir.as_os_str().is_empty() {
            return Err(HaikuError::ConfigValidationError(
                "logs_dir must not be empty".to_string(),
            ));
        }

        if self.entry.program.as_os_str().is_empty() {
            return Err(HaikuError::ConfigValidationError(
                "entry.program must not be empty".to_string(),
            ));
        }

        if !VALID_STOP_SIGNALS.contains(&self.entry.stop_signal.as_str()) {
            return Err(HaikuError::ConfigValidationError(format!(
                "Invalid stop_signal: {}. Must be one of: {}",
                self.entry.stop_signal,
                VALID_STOP_SIGNALS.join(", ")
            )));
        }

        if self.model.order == 0 {
            return Err(HaikuError::ConfigValidationError(
                "model.order must be at least 1".to_string(),
            ));
        }

        if self.model.max_length == 0 {
            return Err(HaikuError::ConfigValidationError(
                "model.max_length must be at least 1".to_string(),
            ));
        }

        for (field, value) in [
            ("model.temperature", self.model.temperature),
            ("model.regenerate_temperature", self.model.regenerate_temperature),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(HaikuError::ConfigValidationError(format!(
                    "{} must be a positive number, got {}",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Absolute path of the log directory
    pub fn logs_path(&self) -> PathBuf {
        self.workdir.join(&self.logs_dir)
    }

    /// Directory where model artifacts live
    pub fn model_dir(&self) -> PathBuf {
        match self.model.dir {
            Some(ref dir) if dir.is_absolute() => dir.clone(),
            Some(ref dir) => self.workdir.join(dir),
            None => self.workdir.clone(),
        }
    }

    /// Manifest path resolved against the working directory
    pub fn manifest_path(&self) -> PathBuf {
        self.workdir.join(&self.manifest.path)
    }

    /// `address:port` string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Expand `$VAR` and `${VAR}` references in path-like fields
    fn expand_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.workdir = PathBuf::from(expand_env(&self.workdir.to_string_lossy(), &lookup));
        self.entry.program =
            PathBuf::from(expand_env(&self.entry.program.to_string_lossy(), &lookup));
        self.entry.args = self
            .entry
            .args
            .iter()
            .map(|arg| expand_env(arg, &lookup))
            .collect();
        self.entry.env = self
            .entry
            .env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env(v, &lookup)))
            .collect();
        if let Some(ref site) = self.manifest.site_packages {
            self.manifest.site_packages = Some(PathBuf::from(expand_env(
                &site.to_string_lossy(),
                &lookup,
            )));
        }
        if let Some(ref token) = self.telegram.token {
            self.telegram.token = Some(expand_env(token, &lookup));
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        HaikuError::ConfigError(format!("Invalid value for {}: '{}'", key, value))
    })
}

/// Expand `$VAR` and `${VAR}`; unknown variables expand to nothing
fn expand_env<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed {
                result.push_str("${");
                result.push_str(&name);
                continue;
            }
            name
        } else {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
            name
        };

        result.push_str(&lookup(&name).unwrap_or_default());
    }

    result
}
