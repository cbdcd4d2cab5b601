//! Terminate other running tgeraser processes

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Executable name other instances run under.
pub const PROCESS_NAME: &str = "tgeraser";

/// Parse `pgrep` output into pids, leaving out our own.
pub fn parse_pids(output: &str, own_pid: u32) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != own_pid)
        .collect()
}

#[cfg(unix)]
async fn find_instances(own_pid: u32) -> Result<Vec<u32>> {
    let output = Command::new("pgrep")
        .arg("-x")
        .arg(PROCESS_NAME)
        .output()
        .await?;

    // pgrep exits with 1 when nothing matched.
    match output.status.code() {
        Some(0) | Some(1) => Ok(parse_pids(
            &String::from_utf8_lossy(&output.stdout),
            own_pid,
        )),
        _ => Err(Error::Io(std::io::Error::other(format!(
            "pgrep failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))),
    }
}

#[cfg(unix)]
async fn terminate(pid: u32) -> Result<bool> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .await?;
    Ok(status.success())
}

/// Kill every other tgeraser instance; returns how many were signalled.
#[cfg(unix)]
pub async fn run() -> Result<usize> {
    let own_pid = std::process::id();
    let pids = find_instances(own_pid).await?;

    let mut killed = 0;
    for pid in pids {
        if terminate(pid).await? {
            info!(pid, "Terminated instance");
            killed += 1;
        } else {
            warn!(pid, "Failed to terminate instance");
        }
    }

    println!("Killed {} running tgeraser instance(s).", killed);
    Ok(killed)
}

#[cfg(windows)]
pub async fn run() -> Result<usize> {
    let own_pid = std::process::id();
    let output = Command::new("taskkill")
        .args(["/F", "/IM", format!("{}.exe", PROCESS_NAME).as_str()])
        .args(["/FI", format!("PID ne {}", own_pid).as_str()])
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let killed = stdout.lines().filter(|l| l.starts_with("SUCCESS")).count();
    println!("Killed {} running tgeraser instance(s).", killed);
    Ok(killed)
}
