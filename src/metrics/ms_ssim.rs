use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::QualityStats;
use crate::error::AppError;
use crate::probe::ProbeDriver;

use super::aggregate::aggregate;
use super::ssim::ssim_series;

/// Scale, weight pairs per the five-band multi-scale SSIM combination.
const SCALES: [(f64, f64); 5] = [
    (1.0, 0.0448),
    (0.5, 0.2856),
    (0.25, 0.3001),
    (0.125, 0.2363),
    (0.0625, 0.1333),
];

fn scaled_ssim_series(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    scale: f64,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, AppError> {
    if scale == 1.0 {
        return ssim_series(driver, reference, distorted, timeout, cancel);
    }
    let filter = format!(
        "[0:v]scale=iw*{scale}:ih*{scale}:flags=lanczos[r];[1:v]scale=iw*{scale}:ih*{scale}:flags=lanczos[d];[d][r]ssim=stats_file=-"
    );
    let output = driver.run_renderer(&[reference, distorted], &filter, timeout, cancel)?;
    let mut lines = output.stdout_lines;
    lines.extend(output.stderr_lines);
    let series = super::textparse::parse_ssim_series(&lines);
    if series.is_empty() {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }
    Ok(series)
}

/// Five renderer passes at scales {1, 1/2, 1/4, 1/8, 1/16}, combined as
/// `prod(SSIM_i ^ w_i)`. A scale whose pass fails is dropped and the partial
/// product is renormalized by raising it to the inverse of the summed
/// weights of the scales that succeeded. Frame series are truncated to the
/// shortest length among the surviving scales before combination.
pub fn compute_ms_ssim(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<QualityStats, AppError> {
    let mut present: Vec<(f64, Vec<f64>)> = Vec::new();
    for (scale, weight) in SCALES {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        match scaled_ssim_series(driver, reference, distorted, scale, timeout, cancel) {
            Ok(series) => present.push((weight, series)),
            Err(_) => continue,
        }
    }

    if present.is_empty() {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }

    let min_len = present.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
    if min_len == 0 {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }

    let total_weight: f64 = present.iter().map(|(w, _)| w).sum();

    let combined: Vec<f64> = (0..min_len)
        .map(|i| {
            let raw_product: f64 = present
                .iter()
                .map(|(weight, series)| series[i].max(0.0).powf(*weight))
                .product();
            raw_product.powf(1.0 / total_weight)
        })
        .collect();

    aggregate(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_weights_sum_to_one() {
        let sum: f64 = SCALES.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn full_weight_product_matches_reference_formula() {
        let per_scale = [0.95_f64, 0.93, 0.90, 0.88, 0.85];
        let expected: f64 = SCALES
            .iter()
            .zip(per_scale.iter())
            .map(|((_, w), v)| v.powf(*w))
            .product();
        let product: f64 = per_scale
            .iter()
            .zip(SCALES.iter())
            .map(|(v, (_, w))| v.powf(*w))
            .product();
        assert!((expected - product).abs() < 1e-12);
    }
}
