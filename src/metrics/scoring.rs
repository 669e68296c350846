use crate::domain::MetricType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Bad,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Rating {
    fn score(self) -> f64 {
        match self {
            Rating::Bad => 0.0,
            Rating::Poor => 1.0,
            Rating::Fair => 2.0,
            Rating::Good => 3.0,
            Rating::Excellent => 4.0,
        }
    }

    fn from_score(score: f64) -> Rating {
        if score >= 3.5 {
            Rating::Excellent
        } else if score >= 2.5 {
            Rating::Good
        } else if score >= 1.5 {
            Rating::Fair
        } else if score >= 0.5 {
            Rating::Poor
        } else {
            Rating::Bad
        }
    }
}

/// Four descending cutoffs for a higher-is-better metric, or four ascending
/// cutoffs for a lower-is-better metric (MSE); [`rate`] picks the comparison
/// direction from the metric type.
#[derive(Debug, Clone, Copy)]
pub struct RatingThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

/// Default thresholds matching the documented semantic: higher
/// VMAF/SSIM/MS-SSIM/PSNR is better, lower MSE is better.
pub fn default_thresholds(metric: MetricType) -> RatingThresholds {
    match metric {
        MetricType::Vmaf => RatingThresholds { excellent: 90.0, good: 75.0, fair: 60.0, poor: 40.0 },
        MetricType::Psnr => RatingThresholds { excellent: 45.0, good: 35.0, fair: 25.0, poor: 15.0 },
        MetricType::Ssim | MetricType::MsSsim => {
            RatingThresholds { excellent: 0.97, good: 0.92, fair: 0.85, poor: 0.70 }
        }
        MetricType::Mse => RatingThresholds { excellent: 10.0, good: 50.0, fair: 200.0, poor: 800.0 },
        MetricType::Lpips => RatingThresholds { excellent: 0.05, good: 0.15, fair: 0.30, poor: 0.50 },
    }
}

fn lower_is_better(metric: MetricType) -> bool {
    matches!(metric, MetricType::Mse | MetricType::Lpips)
}

/// Pure mapping from a metric's mean value to a qualitative rating. No
/// hidden state: the same `(metric, mean, thresholds)` always yields the
/// same rating.
pub fn rate(metric: MetricType, mean: f64, thresholds: &RatingThresholds) -> Rating {
    if lower_is_better(metric) {
        if mean <= thresholds.excellent {
            Rating::Excellent
        } else if mean <= thresholds.good {
            Rating::Good
        } else if mean <= thresholds.fair {
            Rating::Fair
        } else if mean <= thresholds.poor {
            Rating::Poor
        } else {
            Rating::Bad
        }
    } else if mean >= thresholds.excellent {
        Rating::Excellent
    } else if mean >= thresholds.good {
        Rating::Good
    } else if mean >= thresholds.fair {
        Rating::Fair
    } else if mean >= thresholds.poor {
        Rating::Poor
    } else {
        Rating::Bad
    }
}

/// Weighted average of per-metric ratings, mapped back to a bucket. Metrics
/// absent from `weights` contribute an equal default weight of `1.0`.
pub fn recommend(ratings: &[(MetricType, Rating)], weights: &std::collections::HashMap<MetricType, f64>) -> Rating {
    if ratings.is_empty() {
        return Rating::Bad;
    }
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for (metric, rating) in ratings {
        let weight = weights.get(metric).copied().unwrap_or(1.0);
        weighted_sum += rating.score() * weight;
        total_weight += weight;
    }
    if total_weight <= 0.0 {
        return Rating::Bad;
    }
    Rating::from_score(weighted_sum / total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_vmaf_is_better() {
        let thresholds = default_thresholds(MetricType::Vmaf);
        assert_eq!(rate(MetricType::Vmaf, 95.0, &thresholds), Rating::Excellent);
        assert_eq!(rate(MetricType::Vmaf, 20.0, &thresholds), Rating::Bad);
    }

    #[test]
    fn lower_mse_is_better() {
        let thresholds = default_thresholds(MetricType::Mse);
        assert_eq!(rate(MetricType::Mse, 2.0, &thresholds), Rating::Excellent);
        assert_eq!(rate(MetricType::Mse, 2000.0, &thresholds), Rating::Bad);
    }

    #[test]
    fn recommendation_is_pure_and_weighted() {
        let ratings = vec![(MetricType::Vmaf, Rating::Excellent), (MetricType::Psnr, Rating::Fair)];
        let weights = std::collections::HashMap::new();
        let bucket = recommend(&ratings, &weights);
        assert_eq!(bucket, Rating::Good);
        // Same input always yields the same output.
        assert_eq!(recommend(&ratings, &weights), bucket);
    }
}
