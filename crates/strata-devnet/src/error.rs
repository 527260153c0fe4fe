//! Devnet pipeline error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a devnet pipeline run.
///
/// None of these are retried; the recovery path is to delete the output root
/// and run again.
#[derive(Debug, Error)]
pub enum DevnetError {
    /// The request or a collaborator's output violates a precondition.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An external process exited unsuccessfully.
    #[error("`{command}` exited with {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    ExternalProcess {
        /// The command line that was run.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An external process could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration patch could not be applied.
    #[error("failed to patch {}: {reason}", path.display())]
    Patch {
        /// File being patched.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A template failed to render.
    #[error("failed to render template `{template}`: {source}")]
    Render {
        /// Template file name.
        template: String,
        /// Underlying template error.
        #[source]
        source: askama::Error,
    },

    /// Key material could not be generated, parsed or sealed.
    #[error(transparent)]
    Keys(#[from] strata_keys::KeyError),

    /// A JSON document could not be parsed or encoded.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A TOML document could not be parsed.
    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml_edit::TomlError,
    },

    /// A stage ran before the stage producing its input.
    #[error("stage `{stage}` requires {missing}, which no earlier stage produced")]
    StageOrder {
        /// The stage that was started.
        stage: &'static str,
        /// The missing input.
        missing: &'static str,
    },

    /// A blocking background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DevnetError {
    /// Returns a closure wrapping an I/O error with the path it occurred on.
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Builds a patch error for `path`.
    pub(crate) fn patch(path: &Path, reason: impl Into<String>) -> Self {
        Self::Patch {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for devnet operations.
pub type Result<T> = std::result::Result<T, DevnetError>;
