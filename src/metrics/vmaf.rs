use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::domain::QualityStats;
use crate::error::AppError;
use crate::probe::ProbeDriver;

use super::aggregate::aggregate;

#[derive(Debug, Clone, Default)]
pub struct VmafOptions {
    /// Path to a custom VMAF model file. Validated to exist before
    /// invocation; the default built-in model is used when absent.
    pub model_path: Option<std::path::PathBuf>,
}

#[derive(Deserialize)]
struct VmafLog {
    #[serde(default)]
    pooled_metrics: Option<Value>,
    #[serde(default)]
    aggregate_metrics: Option<Value>,
    #[serde(default)]
    frames: Option<Vec<VmafFrame>>,
}

#[derive(Deserialize)]
struct VmafFrame {
    metrics: VmafFrameMetrics,
}

#[derive(Deserialize)]
struct VmafFrameMetrics {
    vmaf: Option<f64>,
}

fn extract_pooled_score(log: &VmafLog) -> Option<f64> {
    let from_pooled = log
        .pooled_metrics
        .as_ref()
        .and_then(|v| v.get("vmaf"))
        .and_then(|v| v.get("mean"))
        .and_then(Value::as_f64);
    if from_pooled.is_some() {
        return from_pooled;
    }
    log.aggregate_metrics
        .as_ref()
        .and_then(|v| v.get("vmaf"))
        .and_then(Value::as_f64)
}

/// Single renderer pass: both inputs are upscaled to 1920x1080 (bicubic)
/// before the libvmaf filter, which writes its result to a temporary JSON
/// log parsed after the process exits. `pooled_metrics.vmaf.mean` is
/// preferred; `aggregate_metrics.vmaf` is the fallback shape; a log carrying
/// neither but a non-empty `frames` array is averaged as a last resort.
pub fn compute_vmaf(
    driver: &ProbeDriver,
    reference: &Path,
    distorted: &Path,
    options: &VmafOptions,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<QualityStats, AppError> {
    if let Some(model_path) = &options.model_path
        && !model_path.is_file()
    {
        return Err(AppError::Validation(format!(
            "VMAF model path does not exist: {}",
            model_path.display()
        )));
    }

    let log_file = tempfile::Builder::new()
        .prefix("qc-vmaf-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create VMAF log temp file: {e}")))?;
    let log_path = log_file.path().to_string_lossy().into_owned();

    let model_clause = options
        .model_path
        .as_ref()
        .map(|p| format!(":model=path={}", p.display()))
        .unwrap_or_default();

    let filter = format!(
        "[0:v]scale=1920:1080:flags=bicubic[ref];[1:v]scale=1920:1080:flags=bicubic[dist];[dist][ref]libvmaf=log_fmt=json:log_path={log_path}{model_clause}"
    );

    let output = driver.run_renderer(&[reference, distorted], &filter, timeout, cancel)?;
    drop(output);

    let raw = std::fs::read_to_string(&log_path)
        .map_err(|e| AppError::ProbeOutputMalformed(format!("VMAF log could not be read: {e}")))?;
    let log: VmafLog = serde_json::from_str(&raw)
        .map_err(|e| AppError::ProbeOutputMalformed(format!("VMAF log is not valid JSON: {e}")))?;

    if let Some(pooled) = extract_pooled_score(&log) {
        return aggregate(&[pooled]);
    }

    let per_frame: Vec<f64> = log
        .frames
        .as_ref()
        .map(|frames| frames.iter().filter_map(|f| f.metrics.vmaf).collect())
        .unwrap_or_default();

    if !per_frame.is_empty() {
        return aggregate(&per_frame);
    }

    Err(AppError::ProbeOutputMalformed(
        "VMAF log had no pooled, aggregate, or per-frame score".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonexistent_model_path() {
        let driver = ProbeDriver::new("/bin/true".into(), "/bin/true".into());
        let options = VmafOptions {
            model_path: Some(std::path::PathBuf::from("/no/such/model.json")),
        };
        let err = compute_vmaf(
            &driver,
            Path::new("a"),
            Path::new("b"),
            &options,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn prefers_pooled_metrics_over_aggregate() {
        let log: VmafLog = serde_json::from_str(
            r#"{"pooled_metrics":{"vmaf":{"mean":91.5}},"aggregate_metrics":{"vmaf":10.0}}"#,
        )
        .unwrap();
        assert_eq!(extract_pooled_score(&log), Some(91.5));
    }

    #[test]
    fn falls_back_to_aggregate_metrics_when_pooled_absent() {
        let log: VmafLog = serde_json::from_str(r#"{"aggregate_metrics":{"vmaf":80.25}}"#).unwrap();
        assert_eq!(extract_pooled_score(&log), Some(80.25));
    }
}
