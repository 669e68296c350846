use std::process::Command;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;

use super::driver::ProbeDriver;
use super::process_ext::run_with_timeout;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const STARTUP_CAPTURE_LIMIT: usize = 64 * 1024;

/// Invokes the probe with a version query bounded by a 30 s deadline.
/// Refuses success if the binary is missing, not executable, or its output
/// doesn't look like a version banner. This is a fatal precondition: callers
/// should abort startup on error.
pub fn validate_startup(driver: &ProbeDriver) -> Result<String, AppError> {
    let mut cmd = Command::new(driver.probe_path());
    cmd.arg("-version");

    let outcome = run_with_timeout(
        cmd,
        STARTUP_TIMEOUT,
        STARTUP_CAPTURE_LIMIT,
        &CancellationToken::new(),
        driver.active_processes(),
    )
    .map_err(|e| {
        AppError::ProbeMissing(format!(
            "probe binary {} could not be spawned: {e}",
            driver.probe_path().display()
        ))
    })?;

    if outcome.timed_out {
        return Err(AppError::ProbeMissing(
            "probe version query did not return within the startup deadline".to_string(),
        ));
    }

    if !outcome.status.success() {
        return Err(AppError::ProbeMissing(format!(
            "probe binary {} exited non-zero during startup validation",
            driver.probe_path().display()
        )));
    }

    let banner = String::from_utf8_lossy(&outcome.stdout).to_string();
    let first_line = banner.lines().next().unwrap_or_default();
    if !first_line.to_ascii_lowercase().contains("version") {
        return Err(AppError::ProbeMissing(
            "probe binary returned an unrecognized version banner shape".to_string(),
        ));
    }

    Ok(first_line.trim().to_string())
}
