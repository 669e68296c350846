use crate::error::AppError;

/// LPIPS is a learned perceptual metric that the renderer alone cannot
/// compute; this always fails fast with a remediation note rather than
/// silently succeeding or approximating.
pub fn compute_lpips() -> Result<(), AppError> {
    Err(AppError::ExternalDependencyUnavailable(
        "LPIPS requires a dedicated perceptual-metric model runtime that is not configured; \
         install and configure an LPIPS-capable inference backend to enable this metric"
            .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_fails_with_external_dependency_unavailable() {
        let err = compute_lpips().unwrap_err();
        assert_eq!(err.kind(), "external_dependency_unavailable");
    }
}
