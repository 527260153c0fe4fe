//! Consensus binary acquisition.

use super::process::run_command;
use crate::error::{DevnetError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Supplies the consensus-layer binary used to create the testnet skeleton.
#[async_trait]
pub trait BinaryProvider: Send + Sync {
    /// Makes sure the binary exists and returns its path.
    async fn ensure_built(&self) -> Result<PathBuf>;
}

/// A binary that is already installed.
#[derive(Debug, Clone)]
pub struct PrebuiltBinary {
    path: PathBuf,
}

impl PrebuiltBinary {
    /// Uses the binary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BinaryProvider for PrebuiltBinary {
    async fn ensure_built(&self) -> Result<PathBuf> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(self.path.clone()),
            Ok(_) => Err(DevnetError::Precondition(format!(
                "consensus binary {} is not a file",
                self.path.display()
            ))),
            Err(source) => Err(DevnetError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Builds the binary from a git repository with `make build`.
#[derive(Debug, Clone)]
pub struct SourceBuild {
    /// Repository URL.
    pub repository: String,
    /// Branch to check out.
    pub branch: String,
    /// Checkout directory.
    pub checkout_dir: PathBuf,
    /// Name of the binary under `<checkout>/build/`.
    pub binary_name: String,
}

impl SourceBuild {
    /// Default binary name.
    pub const DEFAULT_BINARY: &'static str = "consensusd";

    /// Creates a source build of `repository` at `branch` into `checkout_dir`.
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        checkout_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            checkout_dir: checkout_dir.into(),
            binary_name: Self::DEFAULT_BINARY.to_string(),
        }
    }

    /// Overrides the binary name.
    #[must_use]
    pub fn with_binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = name.into();
        self
    }

    /// Path the built binary is expected at.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.checkout_dir.join("build").join(&self.binary_name)
    }
}

#[async_trait]
impl BinaryProvider for SourceBuild {
    async fn ensure_built(&self) -> Result<PathBuf> {
        let parent = self
            .checkout_dir
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        crate::fs::create_dir_all(&parent).await?;

        if tokio::fs::metadata(self.checkout_dir.join(".git")).await.is_ok() {
            tracing::info!(dir = %self.checkout_dir.display(), "Reusing existing checkout");
        } else {
            tracing::info!(repo = %self.repository, branch = %self.branch, "Cloning consensus repository");
            let dir = self.checkout_dir.to_string_lossy().into_owned();
            run_command(
                "git",
                &[
                    "clone",
                    "--depth",
                    "1",
                    "--branch",
                    self.branch.as_str(),
                    self.repository.as_str(),
                    dir.as_str(),
                ],
                &parent,
            )
            .await?;
        }

        tracing::info!(dir = %self.checkout_dir.display(), "Building consensus binary");
        run_command("make", &["build"], &self.checkout_dir).await?;

        let binary = self.binary_path();
        if tokio::fs::metadata(&binary).await.is_err() {
            return Err(DevnetError::Precondition(format!(
                "build finished but {} does not exist",
                binary.display()
            )));
        }
        Ok(binary)
    }
}
