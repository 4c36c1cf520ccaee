// Logs module - Capture of entry command output

mod capture;
mod writer;

pub use capture::{CaptureHandles, LogCapture};
pub use writer::{LogStream, LogWriter, DEFAULT_MAX_LOG_SIZE};
