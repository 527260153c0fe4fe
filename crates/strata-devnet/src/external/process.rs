//! External process invocation.

use crate::error::{DevnetError, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

fn describe<S: AsRef<OsStr>>(program: &OsStr, args: &[S]) -> String {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `program` with `args` in `cwd` and waits for it to exit.
///
/// Standard output and error are captured. A non-zero exit becomes
/// [`DevnetError::ExternalProcess`] carrying both streams verbatim.
///
/// # Errors
///
/// Fails if the process cannot be spawned or exits unsuccessfully.
pub async fn run_command<P, S>(program: P, args: &[S], cwd: &Path) -> Result<Output>
where
    P: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let command = describe(program, args);
    tracing::debug!(command = %command, cwd = %cwd.display(), "Running external command");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| DevnetError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        tracing::error!(command = %command, status = %output.status, "External command failed");
        return Err(DevnetError::ExternalProcess {
            command,
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output)
}
