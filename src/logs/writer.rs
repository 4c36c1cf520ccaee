use crate::error::{HaikuError, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;

/// Default maximum log file size before rotation (10MB)
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Output stream a log file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    fn suffix(self) -> &'static str {
        match self {
            LogStream::Stdout => "out",
            LogStream::Stderr => "err",
        }
    }
}

/// Appends timestamped lines to one log file, rotating it by size
pub struct LogWriter {
    path: PathBuf,
    file: TokioFile,
    max_size: u64,
    size: u64,
}

impl LogWriter {
    /// Open (or create) `<log_dir>/<name>-<out|err>.log` in append mode
    pub async fn new(log_dir: &Path, name: &str, stream: LogStream) -> Result<Self> {
        Self::with_max_size(log_dir, name, stream, DEFAULT_MAX_LOG_SIZE).await
    }

    pub async fn with_max_size(
        log_dir: &Path,
        name: &str,
        stream: LogStream,
        max_size: u64,
    ) -> Result<Self> {
        let path = log_dir.join(format!("{}-{}.log", name, stream.suffix()));
        let file = open_append(&path)?;

        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file: TokioFile::from_std(file),
            max_size,
            size,
        })
    }

    /// Write one line with a timestamp and flush it
    pub async fn write_line(&mut self, data: &[u8]) -> Result<()> {
        if self.size >= self.max_size {
            self.rotate().await?;
        }

        let entry = format_log_entry(&Local::now(), data);

        self.file
            .write_all(&entry)
            .await
            .map_err(|e| HaikuError::LogError(format!("Failed to write to log: {}", e)))?;

        self.file
            .flush()
            .await
            .map_err(|e| HaikuError::LogError(format!("Failed to flush log: {}", e)))?;

        self.size += entry.len() as u64;
        Ok(())
    }

    /// Rename the current file with a timestamp and start a fresh one
    async fn rotate(&mut self) -> Result<()> {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();
        let parent = self
            .path
            .parent()
            .ok_or_else(|| HaikuError::LogRotationError("Invalid log file path".to_string()))?;
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| HaikuError::LogRotationError("Invalid log file name".to_string()))?;

        // Several rotations can land in the same millisecond
        let mut rotated = parent.join(format!("{}-{}.log", stem, timestamp));
        let mut attempt = 1;
        while tokio::fs::try_exists(&rotated)
            .await
            .map_err(|e| HaikuError::LogRotationError(format!("Failed to check {}: {}", rotated.display(), e)))?
        {
            rotated = parent.join(format!("{}-{}-{}.log", stem, timestamp, attempt));
            attempt += 1;
        }

        self.file
            .flush()
            .await
            .map_err(|e| HaikuError::LogRotationError(format!("Failed to flush log: {}", e)))?;
        tokio::fs::rename(&self.path, &rotated)
            .await
            .map_err(|e| HaikuError::LogRotationError(format!("Failed to rotate log: {}", e)))?;

        self.file = TokioFile::from_std(open_append(&self.path)?);
        self.size = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| HaikuError::LogError(format!("Failed to flush log: {}", e)))
    }
}

fn open_append(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| HaikuError::LogFileError(format!("{}: {}", path.display(), e)))
}

/// Format: `[YYYY-MM-DD HH:MM:SS.mmm] <data>\n`
fn format_log_entry(timestamp: &DateTime<Local>, data: &[u8]) -> Vec<u8> {
    let timestamp = timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    let mut entry = Vec::with_capacity(timestamp.len() + 4 + data.len());

    entry.push(b'[');
    entry.extend_from_slice(timestamp.as_bytes());
    entry.extend_from_slice(b"] ");
    entry.extend_from_slice(data);

    if !data.ends_with(b"\n") {
        entry.push(b'\n');
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_log_writer() {
        let temp_dir = TempDir::new().unwrap();

        let writer = LogWriter::new(temp_dir.path(), "haiku", LogStream::Stdout)
            .await
            .unwrap();

        assert_eq!(writer.max_size(), DEFAULT_MAX_LOG_SIZE);
        assert_eq!(writer.path(), temp_dir.path().join("haiku-out.log"));
        assert!(writer.path().exists());
    }

    #[tokio::test]
    async fn test_timestamped_entries() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogWriter::new(temp_dir.path(), "haiku", LogStream::Stderr)
            .await
            .unwrap();

        writer.write_line(b"Line 1").await.unwrap();
        writer.write_line(b"Line 2\n").await.unwrap();

        let content = tokio::fs::read_to_string(writer.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] Line 1"));
        assert!(lines[1].ends_with("] Line 2"));
    }

    #[tokio::test]
    async fn test_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("haiku-out.log"), "previous\n").unwrap();

        let mut writer = LogWriter::new(temp_dir.path(), "haiku", LogStream::Stdout)
            .await
            .unwrap();
        assert_eq!(writer.size(), 9);

        writer.write_line(b"next").await.unwrap();

        let content = tokio::fs::read_to_string(writer.path()).await.unwrap();
        assert!(content.starts_with("previous\n["));
    }

    #[tokio::test]
    async fn test_log_rotation_keeps_every_line() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            LogWriter::with_max_size(temp_dir.path(), "haiku", LogStream::Stdout, 40)
                .await
                .unwrap();

        // Each entry exceeds the limit, so every write rotates
        for i in 0..200 {
            writer
                .write_line(format!("This is test log entry {}", i).as_bytes())
                .await
                .unwrap();
        }

        let mut lines = Vec::new();
        let mut log_files = 0;
        for entry in std::fs::read_dir(temp_dir.path()).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if !(name.starts_with("haiku-out") && name.ends_with(".log")) {
                continue;
            }
            log_files += 1;
            let content = std::fs::read_to_string(&path).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }

        assert_eq!(log_files, 200);
        assert_eq!(lines.len(), 200);
        for i in 0..200 {
            let suffix = format!("] This is test log entry {}", i);
            assert!(
                lines.iter().any(|line| line.ends_with(&suffix)),
                "missing entry {}",
                i
            );
        }
        assert!(writer.size() < 40 + 64);
    }
}
