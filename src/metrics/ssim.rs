use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::QualityStats;
use crate::error::AppError;
use crate::probe::ProbeDriver;

use super::aggregate::aggregate;
use super::textparse::parse_ssim_series;

/// Single renderer pass at native scale. `stats_file=-` directs the filter
/// to write per-frame `All:<x>` lines rather than only a final summary.
pub fn compute_ssim(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<QualityStats, AppError> {
    let series = ssim_series(driver, reference, distorted, timeout, cancel)?;
    aggregate(&series)
}

pub(super) fn ssim_series(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, AppError> {
    let output = driver.run_renderer(&[reference, distorted], "[0:v][1:v]ssim=stats_file=-", timeout, cancel)?;

    let mut lines = output.stdout_lines;
    lines.extend(output.stderr_lines);

    let series = parse_ssim_series(&lines);
    if series.is_empty() {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }
    Ok(series)
}
