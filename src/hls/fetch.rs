use std::time::Duration;

use crate::error::AppError;
use crate::guard::{UrlGuardConfig, validate_url};

const MAX_REDIRECTS: usize = 10;

/// Fetches `url` with redirects followed manually (up to `MAX_REDIRECTS`)
/// so that every hop, not just the first request, is revalidated by the
/// Input Guard before the client follows it.
pub async fn fetch_text(url: &str, guard_config: &UrlGuardConfig, timeout: Duration) -> Result<String, AppError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

    let mut current = url.to_string();
    for _ in 0..=MAX_REDIRECTS {
        let parsed = url::Url::parse(&current).map_err(|_| AppError::Validation("invalid manifest URL".to_string()))?;
        validate_url(&parsed, guard_config)
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let response = client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::ExternalDependencyUnavailable(format!("manifest fetch failed: {e}")))?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::ProbeFailed("redirect response missing Location header".to_string()))?;
            current = resolve_redirect(&current, location)?;
            continue;
        }

        if !response.status().is_success() {
            return Err(AppError::ProbeFailed(format!(
                "manifest fetch returned HTTP {}",
                response.status()
            )));
        }

        return response
            .text()
            .await
            .map_err(|e| AppError::ProbeOutputMalformed(format!("manifest body was not readable text: {e}")));
    }

    Err(AppError::ProbeFailed(format!(
        "exceeded the maximum of {MAX_REDIRECTS} manifest redirects"
    )))
}

fn resolve_redirect(base: &str, location: &str) -> Result<String, AppError> {
    let base_url =
        url::Url::parse(base).map_err(|_| AppError::Validation("invalid manifest URL".to_string()))?;
    base_url
        .join(location)
        .map(|u| u.to_string())
        .map_err(|_| AppError::ProbeFailed("redirect Location header could not be resolved".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_redirect_against_base() {
        let resolved = resolve_redirect("http://example.com/master.m3u8", "variant.m3u8").unwrap();
        assert_eq!(resolved, "http://example.com/variant.m3u8");
    }

    #[test]
    fn resolves_absolute_redirect() {
        let resolved = resolve_redirect("http://example.com/master.m3u8", "http://cdn.example.com/x.m3u8").unwrap();
        assert_eq!(resolved, "http://cdn.example.com/x.m3u8");
    }
}
