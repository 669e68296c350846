use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Vmaf,
    Psnr,
    Ssim,
    #[serde(rename = "MS-SSIM")]
    MsSsim,
    Mse,
    Lpips,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Completed,
    Failed,
}

/// Aggregated statistics for a single metric's per-frame series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityStats {
    pub overall: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub percentile_1: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub percentile_99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityAnalysis {
    pub id: Id,
    pub analysis_id: Id,
    pub metric_type: MetricType,
    pub reference_ref: String,
    pub distorted_ref: String,
    pub stats: Option<QualityStats>,
    pub configuration: Value,
    pub processing_time_ms: u64,
    pub status: QualityStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QualityAnalysis {
    /// For ratio-scale metrics (SSIM/MS-SSIM) all values lie in `[0, 1]`;
    /// PSNR/MSE are non-negative; `min <= mean <= max`; percentiles are
    /// monotone non-decreasing.
    pub fn stats_invariants_hold(metric: MetricType, stats: &QualityStats) -> bool {
        let range_ok = match metric {
            MetricType::Ssim | MetricType::MsSsim => {
                [stats.min, stats.max, stats.mean, stats.overall]
                    .iter()
                    .all(|v| (0.0..=1.0).contains(v))
            }
            MetricType::Psnr | MetricType::Mse => {
                [stats.min, stats.max, stats.mean, stats.overall]
                    .iter()
                    .all(|v| *v >= 0.0)
            }
            MetricType::Vmaf => (0.0..=100.0).contains(&stats.overall),
            MetricType::Lpips => true,
        };
        let ordered = stats.min <= stats.mean && stats.mean <= stats.max;
        let percentiles_monotone = stats.percentile_1 <= stats.percentile_5
            && stats.percentile_5 <= stats.percentile_95
            && stats.percentile_95 <= stats.percentile_99;
        range_ok && ordered && percentiles_monotone
    }
}
