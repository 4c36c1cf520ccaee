use thiserror::Error;

/// Main error type for the haiku service
#[derive(Debug, Error)]
pub enum HaikuError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Bootstrap errors
    #[error("Log directory error: {0}")]
    LogDirError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to change ownership of {0}: {1}")]
    OwnershipError(String, String),

    #[error("Failed to drop privileges: {0}")]
    PrivilegeError(String),

    // Manifest errors
    #[error("Invalid requirement on line {0}: {1}")]
    ManifestParseError(usize, String),

    #[error("Unresolved dependencies: {}", .0.join(", "))]
    UnresolvedDependencies(Vec<String>),

    // Entry process errors
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    #[error("Failed to stop process {0}: {1}")]
    StopError(String, String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // Log capture errors
    #[error("Log error: {0}")]
    LogError(String),

    #[error("Failed to open log file: {0}")]
    LogFileError(String),

    #[error("Log rotation failed: {0}")]
    LogRotationError(String),

    // Model errors
    #[error("Model is not ready: {0}")]
    ModelNotReady(String),

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("Generation failed: {0}")]
    GenerationError(String),

    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Failed to save model: {0}")]
    ModelSaveError(String),

    // Network errors
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for haiku operations
pub type Result<T> = std::result::Result<T, HaikuError>;
