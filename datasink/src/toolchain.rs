use std::{
    io::Read,
    process::{Command, Stdio},
    time::Duration,
};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// used when the toolchain version can neither be configured nor detected
pub const UNKNOWN_VERSION: &str = "unknown";

const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve the Go toolchain version for keys and labels.
/// An explicit version wins, otherwise `go env GOVERSION` is asked.
pub fn resolve_go_version(configured: Option<&str>) -> String {
    if let Some(version) = configured {
        return version.to_string();
    }

    match detect_go_version("go") {
        Some(version) => {
            debug!("Detected toolchain {version}");

            version
        }
        None => {
            warn!("Unable to detect the Go toolchain version, pass --go-version to set it. Falling back to '{UNKNOWN_VERSION}'");

            UNKNOWN_VERSION.to_string()
        }
    }
}

/// run `<go> env GOVERSION` and return its trimmed output
pub fn detect_go_version(go: &str) -> Option<String> {
    let mut child = match Command::new(go)
        .args(["env", "GOVERSION"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            debug!("Failed to spawn {go}: {error}");

            return None;
        }
    };

    match child.wait_timeout(DETECT_TIMEOUT) {
        Ok(Some(status)) if status.success() => {}
        Ok(Some(status)) => {
            debug!("{go} env exited with {status}");

            return None;
        }
        Ok(None) => {
            debug!("{go} env ran into timeout");
            let _ = child.kill();
            let _ = child.wait();

            return None;
        }
        Err(error) => {
            debug!("Failed to wait for {go}: {error}");

            return None;
        }
    }

    let mut output = String::new();
    child.stdout.take()?.read_to_string(&mut output).ok()?;

    let version = output.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
