//! Async file helpers that attach paths to I/O errors.

use crate::error::{DevnetError, Result};
use std::path::Path;

/// Permission bits for identity and secret files.
#[cfg(unix)]
const PRIVATE_MODE: u32 = 0o600;
/// Permission bits for generated scripts.
#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

pub(crate) async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(DevnetError::io(path))
}

pub(crate) async fn read_to_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(DevnetError::io(path))
}

/// Writes `contents` with default permissions.
pub(crate) async fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(DevnetError::io(path))
}

/// Writes `contents` readable and writable by the owner only.
pub(crate) async fn write_private(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    write(path, contents).await?;
    #[cfg(unix)]
    set_mode(path, PRIVATE_MODE).await?;
    Ok(())
}

/// Writes `contents` and marks the file executable.
pub(crate) async fn write_executable(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    write(path, contents).await?;
    #[cfg(unix)]
    set_mode(path, EXECUTABLE_MODE).await?;
    Ok(())
}

/// Removes a file, treating a missing file as success.
pub(crate) async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DevnetError::io(path)(e)),
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(DevnetError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[tokio::test]
    async fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("nodekey");
        write_private(&path, "secret\n").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "secret\n");
    }

    #[tokio::test]
    async fn remove_missing_file_is_ok() {
        let dir = tempdir().unwrap();
        assert!(!remove_file_if_exists(&dir.path().join("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn io_errors_carry_the_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing/file.txt");
        let err = write(&missing, "x").await.unwrap_err();
        assert!(matches!(err, DevnetError::Io { ref path, .. } if path == &missing));
    }
}
