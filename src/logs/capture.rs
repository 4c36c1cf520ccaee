use crate::error::{HaikuError, Result};
use crate::logs::writer::{LogStream, LogWriter};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Routes a child's stdout/stderr, line by line, to the log directory and
/// to this process's own stdout/stderr.
pub struct LogCapture {
    log_dir: PathBuf,
    name: String,
    echo: bool,
    max_size: u64,
}

/// Reader tasks started by [`LogCapture::attach`]; each finishes at EOF
/// and yields the number of lines it forwarded.
pub struct CaptureHandles {
    pub stdout: JoinHandle<usize>,
    pub stderr: JoinHandle<usize>,
}

impl CaptureHandles {
    /// Wait for both streams to drain
    pub async fn join(self) -> (usize, usize) {
        let stdout = self.stdout.await.unwrap_or(0);
        let stderr = self.stderr.await.unwrap_or(0);
        (stdout, stderr)
    }
}

impl LogCapture {
    pub fn new<P: AsRef<Path>>(log_dir: P, name: &str) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            name: name.to_string(),
            echo: true,
            max_size: crate::logs::writer::DEFAULT_MAX_LOG_SIZE,
        }
    }

    /// Disable mirroring lines to our own stdout/stderr
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Take the child's pipes and start forwarding them
    pub async fn attach(&self, child: &mut Child) -> Result<CaptureHandles> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HaikuError::LogError("No stdout pipe available".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HaikuError::LogError("No stderr pipe available".to_string()))?;

        let out_writer =
            LogWriter::with_max_size(&self.log_dir, &self.name, LogStream::Stdout, self.max_size)
                .await?;
        let err_writer =
            LogWriter::with_max_size(&self.log_dir, &self.name, LogStream::Stderr, self.max_size)
                .await?;

        Ok(CaptureHandles {
            stdout: tokio::spawn(forward_lines(stdout, out_writer, LogStream::Stdout, self.echo)),
            stderr: tokio::spawn(forward_lines(stderr, err_writer, LogStream::Stderr, self.echo)),
        })
    }
}

async fn forward_lines<R>(reader: R, mut writer: LogWriter, stream: LogStream, echo: bool) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut count = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = writer.write_line(&line).await {
                    tracing::warn!("Failed to write {}: {}", writer.path().display(), e);
                }
                if echo {
                    echo_line(stream, &line).await;
                }
                count += 1;
            }
            Err(e) => {
                tracing::debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }

    let _ = writer.flush().await;
    count
}

async fn echo_line(stream: LogStream, line: &[u8]) {
    let result = match stream {
        LogStream::Stdout => {
            let mut out = tokio::io::stdout();
            write_and_flush(&mut out, line).await
        }
        LogStream::Stderr => {
            let mut err = tokio::io::stderr();
            write_and_flush(&mut err, line).await
        }
    };
    if let Err(e) = result {
        tracing::debug!("Failed to echo child output: {}", e);
    }
}

async fn write_and_flush<W>(out: &mut W, line: &[u8]) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    out.write_all(line).await?;
    if !line.ends_with(b"\n") {
        out.write_all(b"\n").await?;
    }
    out.flush().await
}
