//! Quality Metrics Pipeline: runs one or more metric computations in
//! sequence on a reference/distorted pair, collecting per-metric statistics.
//! Passes run sequentially because each renderer invocation holds exclusive
//! temp paths.

mod aggregate;
mod lpips;
mod ms_ssim;
mod psnr_mse;
pub mod scoring;
mod ssim;
mod textparse;
mod vmaf;

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::{MetricType, QualityStats, QualityStatus};
use crate::error::AppError;
use crate::probe::ProbeDriver;

pub use aggregate::{aggregate, percentile};
pub use vmaf::VmafOptions;

const DEFAULT_METRIC_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    pub vmaf: VmafOptions,
    pub timeout: Option<Duration>,
}

/// Outcome of one metric's computation, independent of the persisted
/// `QualityAnalysis` record the caller assembles from it.
#[derive(Debug, Clone)]
pub struct QualityResult {
    pub metric_type: MetricType,
    pub stats: Option<QualityStats>,
    pub status: QualityStatus,
    pub error: Option<String>,
}

/// Runs each requested metric in sequence against the same reference/
/// distorted pair. A single metric's failure never aborts the others; each
/// yields its own [`QualityResult`]. `cancel` is checked before each metric
/// starts and passed into its renderer invocation, so a cancellation takes
/// effect between or within metrics rather than only at the call boundary.
pub fn analyze_quality(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    metrics: &[MetricType],
    config: &MetricsConfig,
    cancel: &CancellationToken,
) -> Vec<QualityResult> {
    let timeout = config.timeout.unwrap_or(DEFAULT_METRIC_TIMEOUT);

    metrics
        .iter()
        .copied()
        .map(|metric| {
            if cancel.is_cancelled() {
                return failed(metric, AppError::Cancelled);
            }
            match metric {
                MetricType::Psnr => {
                    match psnr_mse::compute_psnr_mse(driver, reference, distorted, timeout, cancel) {
                        Ok((psnr_stats, _mse_stats)) => completed(metric, psnr_stats),
                        Err(e) => failed(metric, e),
                    }
                }
                MetricType::Mse => {
                    match psnr_mse::compute_psnr_mse(driver, reference, distorted, timeout, cancel) {
                        Ok((_psnr_stats, mse_stats)) => completed(metric, mse_stats),
                        Err(e) => failed(metric, e),
                    }
                }
                MetricType::Ssim => match ssim::compute_ssim(driver, reference, distorted, timeout, cancel) {
                    Ok(stats) => completed(metric, stats),
                    Err(e) => failed(metric, e),
                },
                MetricType::MsSsim => {
                    match ms_ssim::compute_ms_ssim(driver, reference, distorted, timeout, cancel) {
                        Ok(stats) => completed(metric, stats),
                        Err(e) => failed(metric, e),
                    }
                }
                MetricType::Vmaf => {
                    match vmaf::compute_vmaf(driver, reference, distorted, &config.vmaf, timeout, cancel) {
                        Ok(stats) => completed(metric, stats),
                        Err(e) => failed(metric, e),
                    }
                }
                MetricType::Lpips => match lpips::compute_lpips() {
                    Ok(()) => unreachable!("LPIPS never succeeds"),
                    Err(e) => failed(metric, e),
                },
            }
        })
        .collect()
}

fn completed(metric_type: MetricType, stats: QualityStats) -> QualityResult {
    QualityResult {
        metric_type,
        stats: Some(stats),
        status: QualityStatus::Completed,
        error: None,
    }
}

fn failed(metric_type: MetricType, error: crate::error::AppError) -> QualityResult {
    QualityResult {
        metric_type,
        stats: None,
        status: QualityStatus::Failed,
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn lpips_metric_always_reports_failed_status() {
        let driver = ProbeDriver::new(PathBuf::from("/bin/true"), PathBuf::from("/bin/true"));
        let results = analyze_quality(
            &driver,
            Path::new("ref.mp4"),
            Path::new("dist.mp4"),
            &[MetricType::Lpips],
            &MetricsConfig::default(),
            &CancellationToken::new(),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, QualityStatus::Failed);
        assert!(results[0].error.is_some());
    }

    #[test]
    fn one_metric_failure_does_not_prevent_others_from_running() {
        let driver = ProbeDriver::new(PathBuf::from("/no/such/renderer"), PathBuf::from("/no/such/renderer"));
        let results = analyze_quality(
            &driver,
            Path::new("ref.mp4"),
            Path::new("dist.mp4"),
            &[MetricType::Lpips, MetricType::Ssim],
            &MetricsConfig::default(),
            &CancellationToken::new(),
        );
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == QualityStatus::Failed));
    }
}
