//! Execution context shared by every stage of an encode.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Sender for reporting encode progress.
///
/// Wraps a callback that receives the completed fraction of the encode
/// stage, in `[0, 1]`.
pub struct ProgressSender {
    callback: Box<dyn Fn(f64) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, fraction: f64) {
        (self.callback)(fraction);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Destination for external tool output.
pub trait LogSink: Send + Sync {
    fn stdout_line(&self, line: &str);
    fn stderr_line(&self, line: &str);
}

/// Forwards tool output to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn stdout_line(&self, line: &str) {
        tracing::trace!(target: "df_pipeline::tool", stream = "stdout", "{line}");
    }

    fn stderr_line(&self, line: &str) {
        tracing::trace!(target: "df_pipeline::tool", stream = "stderr", "{line}");
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received on stdout so far.
    pub fn stdout(&self) -> Vec<String> {
        self.stdout.lock().clone()
    }

    /// Lines received on stderr so far.
    pub fn stderr(&self) -> Vec<String> {
        self.stderr.lock().clone()
    }
}

impl LogSink for MemoryLogSink {
    fn stdout_line(&self, line: &str) {
        self.stdout.lock().push(line.to_string());
    }

    fn stderr_line(&self, line: &str) {
        self.stderr.lock().push(line.to_string());
    }
}

/// Context passed to every stage of an encode.
#[derive(Clone)]
pub struct EncodeContext {
    /// Checked at every stage boundary and inside tool execution.
    pub cancellation: CancellationToken,
    /// Receives encode-stage progress.
    pub progress: Arc<ProgressSender>,
    /// Receives encoder and muxer output.
    pub log: Arc<dyn LogSink>,
}

impl EncodeContext {
    /// Create a context with a fresh token, no progress reporting and
    /// tool output routed to `tracing`.
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            progress: Arc::new(ProgressSender::noop()),
            log: Arc::new(TracingLogSink),
        }
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: attach a progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Builder: attach a log sink.
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check_cancelled(&self) -> df_core::Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(df_core::Error::Cancelled);
        }
        Ok(())
    }
}

impl Default for EncodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EncodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeContext")
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
