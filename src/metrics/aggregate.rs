use crate::error::AppError;

use crate::domain::QualityStats;

/// Reduces a per-frame value series to the documented statistics: mean, min,
/// max, population stddev, and percentiles 1/5/95/99 by linear interpolation
/// on the sorted sequence. `overall` is set equal to `mean`; see the PSNR
/// per-line-as-sample convention documented alongside the caller.
pub fn aggregate(values: &[f64]) -> Result<QualityStats, AppError> {
    if values.is_empty() {
        return Err(AppError::ProbeOutputMalformed("no_values_parsed".to_string()));
    }

    let n = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / n as f64;

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let stddev = variance.sqrt();

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let min = sorted[0];
    let max = sorted[n - 1];

    Ok(QualityStats {
        overall: mean,
        min,
        max,
        mean,
        stddev,
        percentile_1: percentile(&sorted, 1.0),
        percentile_5: percentile(&sorted, 5.0),
        percentile_95: percentile(&sorted, 95.0),
        percentile_99: percentile(&sorted, 99.0),
    })
}

/// Linear-interpolation percentile on an already-sorted slice. Position is
/// `p * (n-1) / 100`; the fractional part blends between the floor and
/// ceiling indices.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let position = p * (n - 1) as f64 / 100.0;
    let floor_idx = position.floor() as usize;
    let ceil_idx = position.ceil() as usize;
    if floor_idx == ceil_idx {
        return sorted[floor_idx];
    }
    let frac = position - floor_idx as f64;
    sorted[floor_idx] * (1.0 - frac) + sorted[ceil_idx] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_is_no_values_parsed() {
        let err = aggregate(&[]).unwrap_err();
        assert_eq!(err.kind(), "probe_output_malformed");
    }

    #[test]
    fn mean_min_max_ordering_holds() {
        let stats = aggregate(&[1.0, 5.0, 3.0, 9.0, 2.0]).unwrap();
        assert!(stats.min <= stats.mean);
        assert!(stats.mean <= stats.max);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn percentiles_are_monotone_nondecreasing() {
        let stats = aggregate(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        assert!(stats.percentile_1 <= stats.percentile_5);
        assert!(stats.percentile_5 <= stats.percentile_95);
        assert!(stats.percentile_95 <= stats.percentile_99);
    }

    #[test]
    fn percentile_is_idempotent_on_sorted_singleton_expansion() {
        let sorted = vec![2.0, 2.0, 2.0];
        assert_eq!(percentile(&sorted, 50.0), 2.0);
    }

    #[test]
    fn percentile_matches_known_interpolation() {
        // n=5 -> positions for p=50 is 50*4/100 = 2.0, exactly index 2.
        let sorted = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&sorted, 50.0), 30.0);
    }
}
