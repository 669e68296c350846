use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::{Analysis, BatchJob, HlsAnalysis, Id, SourceType};
use crate::error::AppError;
use crate::guard::{self, UrlGuardConfig, sanitize_filename};
use crate::hls::HlsOptions;
use crate::orchestrator::BatchItemSpec;
use crate::probe::ProbeOptions;

use super::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    features: HealthFeatures,
    qc_tools: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthFeatures {
    ai_commentary: bool,
    hls_segment_probing: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        features: HealthFeatures {
            ai_commentary: state.config.ai_endpoint_url.is_some(),
            hls_segment_probing: true,
        },
        qc_tools: vec![state.config.probe_path.clone(), state.config.renderer_path.clone()],
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeResponse {
    analysis_id: Id,
    analysis: Analysis,
}

/// Streams the `file` multipart field to a temp file under the configured
/// root, rejecting the upload the moment it crosses the configured cap
/// rather than trusting a (spoofable) `Content-Length` header.
pub async fn probe_file(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Result<Json<ProbeResponse>, AppError> {
    let mut include_llm = false;
    let mut temp_path: Option<PathBuf> = None;
    let mut file_name = String::new();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "include_llm" => {
                let text = field.text().await.unwrap_or_default();
                include_llm = matches!(text.as_str(), "true" | "1" | "yes");
            }
            "file" => {
                let original = field.file_name().unwrap_or("upload").to_string();
                let sanitized = sanitize_filename(&original);

                tokio::fs::create_dir_all(&state.config.temp_root)
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
                let path = state.config.temp_root.join(format!("{}-{sanitized}", Uuid::new_v4()));
                let mut out = tokio::fs::File::create(&path).await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

                let mut written: u64 = 0;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::Validation(format!("multipart read error: {e}")))?
                {
                    written += chunk.len() as u64;
                    if written > state.config.max_file_size_bytes {
                        drop(out);
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(AppError::SizeExceeded(format!(
                            "upload exceeds the configured maximum of {} bytes",
                            state.config.max_file_size_bytes
                        )));
                    }
                    out.write_all(&chunk).await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
                }

                file_name = sanitized;
                temp_path = Some(path);
            }
            _ => {}
        }
    }

    let temp_path = temp_path.ok_or_else(|| AppError::Validation("multipart body must include a 'file' field".to_string()))?;

    let analysis = Analysis::new(file_name, temp_path.to_string_lossy().to_string(), SourceType::Local);
    let analysis_id = analysis.id;
    let analysis = state
        .orchestrator
        .submit_single(analysis, ProbeOptions::default_survey(), Some(temp_path), include_llm, None)
        .await?;

    Ok(Json(ProbeResponse { analysis_id, analysis }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeUrlRequest {
    url: String,
    #[serde(default)]
    include_llm: bool,
    timeout: Option<u64>,
}

pub async fn probe_url(State(state): State<Arc<AppState>>, Json(body): Json<ProbeUrlRequest>) -> Result<Json<ProbeResponse>, AppError> {
    let parsed = url::Url::parse(&body.url).map_err(|_| AppError::Validation("url is not a valid URL".to_string()))?;
    let guard_config = UrlGuardConfig {
        allow_private_network_targets: state.config.allow_private_network_targets,
    };
    guard::validate_url(&parsed, &guard_config).await.map_err(|e| AppError::Validation(e.to_string()))?;

    let file_name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("remote")
        .to_string();

    let analysis = Analysis::new(file_name, body.url.clone(), SourceType::Url);
    let analysis_id = analysis.id;
    let analysis = state
        .orchestrator
        .submit_single(
            analysis,
            ProbeOptions::default_survey(),
            None,
            body.include_llm,
            body.timeout.map(Duration::from_secs),
        )
        .await?;

    Ok(Json(ProbeResponse { analysis_id, analysis }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeHlsRequest {
    manifest_url: String,
    #[serde(default)]
    analyze_segments: bool,
    max_segments: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HlsResponse {
    analysis_id: Id,
    analysis: HlsAnalysis,
}

pub async fn probe_hls(State(state): State<Arc<AppState>>, Json(body): Json<ProbeHlsRequest>) -> Result<Json<HlsResponse>, AppError> {
    let parsed = url::Url::parse(&body.manifest_url).map_err(|_| AppError::Validation("manifest_url is not a valid URL".to_string()))?;
    let guard_config = UrlGuardConfig {
        allow_private_network_targets: state.config.allow_private_network_targets,
    };
    guard::validate_url(&parsed, &guard_config).await.map_err(|e| AppError::Validation(e.to_string()))?;

    let options = HlsOptions {
        analyze_segments: body.analyze_segments,
        max_segments: body.max_segments.unwrap_or(10),
        guard_config,
    };

    let analysis_id = crate::domain::new_id();
    let analysis = state.orchestrator.analyze_hls_request(analysis_id, &body.manifest_url, &options).await?;
    Ok(Json(HlsResponse { analysis_id, analysis }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchAnalyzeRequest {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    include_llm: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchAnalyzeResponse {
    job_id: Id,
    status_url: String,
    ws_url: String,
}

/// `files[]` names paths already staged under the configured temp root
/// (e.g. by a prior `/probe/file` upload); batch submission never accepts
/// raw bytes inline in a JSON body.
pub async fn batch_analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatchAnalyzeRequest>,
) -> Result<(StatusCode, Json<BatchAnalyzeResponse>), AppError> {
    if body.files.is_empty() && body.urls.is_empty() {
        return Err(AppError::Validation("batch must include at least one file or url".to_string()));
    }

    let mut items = Vec::with_capacity(body.files.len() + body.urls.len());

    for raw_path in &body.files {
        let candidate = PathBuf::from(raw_path);
        let validated = guard::validate_path(&candidate, &state.config.temp_root).map_err(|e| AppError::Validation(e.to_string()))?;
        let metadata = tokio::fs::metadata(&validated)
            .await
            .map_err(|_| AppError::Validation(format!("file not found: {raw_path}")))?;
        if metadata.len() > state.config.max_file_size_bytes {
            return Err(AppError::SizeExceeded(format!(
                "{raw_path} exceeds the configured maximum of {} bytes",
                state.config.max_file_size_bytes
            )));
        }
        let file_name = validated.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        items.push(BatchItemSpec {
            analysis: Analysis::new(file_name, validated.to_string_lossy().to_string(), SourceType::Local),
            options: ProbeOptions::default_survey(),
            temp_path: None,
            include_llm: body.include_llm,
        });
    }

    let guard_config = UrlGuardConfig {
        allow_private_network_targets: state.config.allow_private_network_targets,
    };
    for raw_url in &body.urls {
        let parsed = url::Url::parse(raw_url).map_err(|_| AppError::Validation(format!("invalid URL: {raw_url}")))?;
        guard::validate_url(&parsed, &guard_config).await.map_err(|e| AppError::Validation(e.to_string()))?;
        items.push(BatchItemSpec {
            analysis: Analysis::new(raw_url.clone(), raw_url.clone(), SourceType::Url),
            options: ProbeOptions::default_survey(),
            temp_path: None,
            include_llm: body.include_llm,
        });
    }

    let job_id = state.orchestrator.submit_batch(items).await?;
    let response = BatchAnalyzeResponse {
        job_id,
        status_url: format!("/batch/status/{job_id}"),
        ws_url: format!("/ws/progress/{job_id}"),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn batch_status(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<BatchJob>, AppError> {
    Ok(Json(state.orchestrator.batch_status(id)?))
}

pub async fn ws_progress(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> axum::response::Response {
    ws.on_upgrade(move |socket| forward_progress(socket, state, id))
}

async fn forward_progress(mut socket: WebSocket, state: Arc<AppState>, id: Uuid) {
    let mut receiver = state.progress.subscribe(id);
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
