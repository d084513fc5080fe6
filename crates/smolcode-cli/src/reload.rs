//! Reload support: rebuild the binary, then replace this process with a
//! fresh instance pointed at the history snapshot.
//!
//! The agent itself only signals the restart; all exec mechanics live here
//! in the launcher.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

/// Rebuild the executable when running from a Cargo workspace. A rebuild
/// failure is reported but does not abort the restart.
fn rebuild() {
    if !Path::new("Cargo.toml").exists() {
        return;
    }
    info!("rebuilding smolcode before restart");
    match std::process::Command::new("cargo")
        .args(["build", "--bin", "smolcode"])
        .status()
    {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%status, "rebuild failed, restarting with the current binary"),
        Err(e) => warn!(error = %e, "could not run cargo, restarting with the current binary"),
    }
}

/// Replace this process with a new instance carrying the same flags plus
/// the snapshot. Only returns on failure.
pub fn restart(snapshot: PathBuf) -> anyhow::Result<()> {
    rebuild();

    let exe = std::env::current_exe().context("cannot locate current executable")?;

    // Re-exec with the original arguments, swapping in the new snapshot.
    let mut args: Vec<String> = Vec::new();
    let mut original = std::env::args().skip(1);
    while let Some(arg) = original.next() {
        if arg == "--snapshot" {
            let _ = original.next();
            continue;
        }
        args.push(arg);
    }
    args.push("--snapshot".to_string());
    args.push(snapshot.display().to_string());

    info!(exe = %exe.display(), "restarting");
    Err(exec(&exe, &args))
}

#[cfg(unix)]
fn exec(exe: &Path, args: &[String]) -> anyhow::Error {
    use std::os::unix::process::CommandExt;
    let err = std::process::Command::new(exe).args(args).exec();
    anyhow::anyhow!("re-exec failed: {err}")
}

#[cfg(not(unix))]
fn exec(_exe: &Path, _args: &[String]) -> anyhow::Error {
    anyhow::anyhow!("reload is only supported on unix")
}
