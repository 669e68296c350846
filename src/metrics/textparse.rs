use once_cell::sync::Lazy;
use regex::Regex;

static PSNR_AVERAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PSNR.*?average:([0-9.]+)").unwrap());
static MSE_AVG: Lazy<Regex> = Lazy::new(|| Regex::new(r"mse_avg:([0-9.]+)").unwrap());
static SSIM_ALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"All:([0-9.]+)").unwrap());

/// Scrapes `PSNR ... average:<x>` occurrences, one per frame line.
pub fn parse_psnr_series(lines: &[String]) -> Vec<f64> {
    lines
        .iter()
        .filter_map(|line| PSNR_AVERAGE.captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// Scrapes `mse_avg:<x>` occurrences, present only on renderer builds that
/// emit it alongside PSNR. Absent entirely on most builds; callers derive
/// MSE from PSNR instead when this returns empty.
pub fn parse_mse_avg_series(lines: &[String]) -> Vec<f64> {
    lines
        .iter()
        .filter_map(|line| MSE_AVG.captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// Scrapes `All:<x>` occurrences from SSIM renderer output, one per frame.
pub fn parse_ssim_series(lines: &[String]) -> Vec<f64> {
    lines
        .iter()
        .filter_map(|line| SSIM_ALL.captures(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// `MSE = 255^2 * 10^(-PSNR/10)`, applied when the renderer reports only the
/// PSNR series.
pub fn derive_mse_from_psnr(psnr_db: f64) -> f64 {
    255f64.powi(2) * 10f64.powf(-psnr_db / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_psnr_average_lines() {
        let lines = vec![
            "frame:1 PSNR y:40.1 u:42.0 v:41.5 average:40.80".to_string(),
            "frame:2 PSNR y:39.9 u:41.8 v:41.2 average:40.55".to_string(),
        ];
        let values = parse_psnr_series(&lines);
        assert_eq!(values, vec![40.80, 40.55]);
    }

    #[test]
    fn parses_ssim_all_lines() {
        let lines = vec!["n:1 Y:0.98 U:0.97 V:0.97 All:0.975".to_string()];
        assert_eq!(parse_ssim_series(&lines), vec![0.975]);
    }

    #[test]
    fn derives_mse_from_psnr_matches_formula() {
        let mse = derive_mse_from_psnr(20.0);
        assert!((mse - 255f64.powi(2) * 10f64.powf(-2.0)).abs() < 1e-9);
    }

    #[test]
    fn mse_avg_parses_when_present() {
        let lines = vec!["n:1 mse_avg:12.5 psnr_avg:average:37.15".to_string()];
        assert_eq!(parse_mse_avg_series(&lines), vec![12.5]);
    }
}
