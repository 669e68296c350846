//! AI Commentary Adapter: an optional, time-bounded call to a configured
//! text-generation endpoint. Failure here is never fatal for the analysis
//! that triggered it — the adapter receives a serialized snapshot of the
//! probe output rather than the `Analysis` itself, so there is no cyclic
//! reference between the two.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone)]
pub struct CommentaryConfig {
    pub endpoint_url: Option<String>,
    pub model_id: Option<String>,
    pub timeout: Duration,
}

impl Default for CommentaryConfig {
    fn default() -> Self {
        Self { endpoint_url: None, model_id: None, timeout: DEFAULT_TIMEOUT }
    }
}

#[derive(Serialize)]
struct CommentaryRequest<'a> {
    model: Option<&'a str>,
    prompt: String,
}

#[derive(serde::Deserialize)]
struct CommentaryResponse {
    text: String,
}

/// Builds a deterministic prompt from the filename and probe data, then
/// calls the configured endpoint. Returns `None` on any failure, timeout, or
/// missing configuration — callers log a warning and proceed without
/// commentary; this step never fails an `Analysis`.
pub async fn generate_commentary(file_name: &str, probe_data: &Value, config: &CommentaryConfig) -> Option<String> {
    let endpoint_url = config.endpoint_url.as_ref()?;

    let prompt = build_prompt(file_name, probe_data);
    let client = reqwest::Client::builder().timeout(config.timeout).build().ok()?;

    let request = CommentaryRequest { model: config.model_id.as_deref(), prompt };

    let result = client.post(endpoint_url).json(&request).send().await;
    let response = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "AI commentary call failed");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(status = %response.status(), "AI commentary endpoint returned non-success status");
        return None;
    }

    match response.json::<CommentaryResponse>().await {
        Ok(body) => Some(body.text),
        Err(e) => {
            tracing::warn!(error = %e, "AI commentary response was not parseable");
            None
        }
    }
}

/// Deterministic given the same filename and probe data: no timestamps, no
/// random identifiers.
fn build_prompt(file_name: &str, probe_data: &Value) -> String {
    format!(
        "Provide a short, plain-language quality summary for the media file \"{file_name}\". \
         Here is its technical probe data as JSON:\n{probe_data}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_deterministic_for_same_input() {
        let data = serde_json::json!({"format": {"duration": "10.0"}});
        let a = build_prompt("clip.mp4", &data);
        let b = build_prompt("clip.mp4", &data);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_endpoint_returns_none_without_network_call() {
        let config = CommentaryConfig::default();
        let data = serde_json::json!({});
        let result = generate_commentary("clip.mp4", &data, &config).await;
        assert!(result.is_none());
    }
}
