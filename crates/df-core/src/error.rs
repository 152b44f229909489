//! Unified error type for the dashforge pipeline.
//!
//! All crates funnel their failures into [`Error`]. The encode-run variants
//! ([`Error::EncoderFailed`], [`Error::MuxerFailed`], ...) carry the captured
//! tool log and the rendered command lines so a failed run can be reproduced
//! by hand.

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in dashforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The encoder exited non-zero or the encode stage failed.
    #[error("Encoder failed: {message}")]
    EncoderFailed {
        /// Human-readable error description.
        message: String,
        /// Captured encoder output.
        log: String,
        /// The rendered encoder command line.
        command: String,
    },

    /// The muxer exited non-zero or the mux stage failed. Failures while
    /// harvesting subtitles or rewriting the manifest afterwards are reported
    /// here too, with an empty log.
    #[error("Muxer failed: {message}")]
    MuxerFailed {
        /// Human-readable error description.
        message: String,
        /// Captured muxer output.
        log: String,
        /// The rendered encoder command line, when one was built.
        encoder_command: Option<String>,
        /// The rendered muxer command line, when one was built.
        muxer_command: Option<String>,
    },

    /// The muxer reported success but wrote no manifest.
    #[error("Manifest not created: {}", path.display())]
    ManifestNotCreated {
        /// Where the manifest was expected.
        path: PathBuf,
        /// Captured muxer output.
        log: String,
    },

    /// The configured working or output directory does not exist.
    #[error("Invalid working directory: {}", path.display())]
    InvalidWorkingDirectory {
        /// The offending directory.
        path: PathBuf,
    },

    /// Required input data was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The run was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// An external tool could not be found, spawned, or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The manifest could not be parsed or serialized.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EncoderFailed`].
    pub fn encoder_failed(
        message: impl Into<String>,
        log: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Error::EncoderFailed {
            message: message.into(),
            log: log.into(),
            command: command.into(),
        }
    }

    /// Convenience constructor for [`Error::MuxerFailed`].
    pub fn muxer_failed(
        message: impl Into<String>,
        log: impl Into<String>,
        encoder_command: Option<String>,
        muxer_command: Option<String>,
    ) -> Self {
        Error::MuxerFailed {
            message: message.into(),
            log: log.into(),
            encoder_command,
            muxer_command,
        }
    }

    /// Convenience constructor for [`Error::InvalidWorkingDirectory`].
    pub fn invalid_working_directory(path: &Path) -> Self {
        Error::InvalidWorkingDirectory {
            path: path.to_path_buf(),
        }
    }

    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The captured tool log, for variants that carry one.
    pub fn log(&self) -> Option<&str> {
        match self {
            Error::EncoderFailed { log, .. }
            | Error::MuxerFailed { log, .. }
            | Error::ManifestNotCreated { log, .. } => Some(log),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_failed_display() {
        let err = Error::encoder_failed("exit code 1", "frame=1", "ffmpeg -i in.mkv");
        assert_eq!(err.to_string(), "Encoder failed: exit code 1");
        assert_eq!(err.log(), Some("frame=1"));
    }

    #[test]
    fn muxer_failed_keeps_both_commands() {
        let err = Error::muxer_failed(
            "exit code 2",
            "",
            Some("ffmpeg".into()),
            Some("MP4Box".into()),
        );
        match err {
            Error::MuxerFailed {
                encoder_command,
                muxer_command,
                ..
            } => {
                assert_eq!(encoder_command.as_deref(), Some("ffmpeg"));
                assert_eq!(muxer_command.as_deref(), Some("MP4Box"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn manifest_not_created_display() {
        let err = Error::ManifestNotCreated {
            path: PathBuf::from("/out/movie.mpd"),
            log: String::new(),
        };
        assert_eq!(err.to_string(), "Manifest not created: /out/movie.mpd");
    }

    #[test]
    fn invalid_working_directory_display() {
        let err = Error::invalid_working_directory(Path::new("/missing"));
        assert_eq!(err.to_string(), "Invalid working directory: /missing");
        assert!(err.log().is_none());
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Internal("boom".into()).is_cancelled());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("MP4Box", "not found");
        assert_eq!(err.to_string(), "Tool error [MP4Box]: not found");
    }
}
