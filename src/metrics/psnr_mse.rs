use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::QualityStats;
use crate::error::AppError;
use crate::probe::ProbeDriver;

use super::aggregate::aggregate;
use super::textparse::{derive_mse_from_psnr, parse_mse_avg_series, parse_psnr_series};

/// Single renderer pass computing both PSNR and MSE. When the renderer build
/// doesn't emit `mse_avg` directly, MSE is derived per frame from PSNR.
pub fn compute_psnr_mse(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(QualityStats, QualityStats), AppError> {
    let output = driver.run_renderer(&[reference, distorted], "[0:v][1:v]psnr", timeout, cancel)?;

    let mut lines = output.stderr_lines;
    lines.extend(output.stdout_lines);

    let psnr_series = parse_psnr_series(&lines);
    if psnr_series.is_empty() {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }

    let mse_series = parse_mse_avg_series(&lines);
    let mse_series = if mse_series.is_empty() {
        psnr_series.iter().map(|p| derive_mse_from_psnr(*p)).collect()
    } else {
        mse_series
    };

    let psnr_stats = aggregate(&psnr_series)?;
    let mse_stats = aggregate(&mse_series)?;
    Ok((psnr_stats, mse_stats))
}

#[cfg(test)]
mod tests {
    use super::super::textparse::{parse_mse_avg_series, parse_psnr_series};

    #[test]
    fn derives_mse_when_not_reported() {
        let lines = vec!["frame:1 PSNR average:30.00".to_string()];
        let psnr = parse_psnr_series(&lines);
        let mse = parse_mse_avg_series(&lines);
        assert_eq!(psnr, vec![30.0]);
        assert!(mse.is_empty());
    }
}
