//! HLS Analyzer: manifest fetch/parse, variant and segment discovery,
//! conditional per-segment probing, and compliance validation.

mod compliance;
mod fetch;
mod parse;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::{HlsAnalysis, HlsManifestType, HlsSegment, HlsStatus, HlsVariant, Id};
use crate::error::AppError;
use crate::guard::UrlGuardConfig;
use crate::probe::{ProbeDriver, ProbeOptions};

const DEFAULT_MAX_SEGMENTS: usize = 10;
const MAX_SEGMENTS_CLAMP: usize = 100;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct HlsOptions {
    pub analyze_segments: bool,
    pub max_segments: usize,
    pub guard_config: UrlGuardConfig,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            analyze_segments: false,
            max_segments: DEFAULT_MAX_SEGMENTS,
            guard_config: UrlGuardConfig::default(),
        }
    }
}

impl HlsOptions {
    fn clamped_max_segments(&self) -> usize {
        self.max_segments.clamp(1, MAX_SEGMENTS_CLAMP)
    }
}

/// Fetches and parses `manifest_ref`, producing a fully populated
/// `HlsAnalysis`. Manifest fetch/parse failure is fatal; individual segment
/// probe failures are downgraded to `validation_issues` entries. `cancel` is
/// checked between segments and variants so a cancelled batch stops issuing
/// new probes without losing the analysis gathered so far.
pub async fn analyze_hls(
    analysis_id: Id,
    manifest_ref: &str,
    options: &HlsOptions,
    driver: &ProbeDriver,
    cancel: &CancellationToken,
) -> Result<HlsAnalysis, AppError> {
    let body = fetch::fetch_text(manifest_ref, &options.guard_config, DEFAULT_FETCH_TIMEOUT).await?;

    let manifest_type = parse::classify(&body)
        .ok_or_else(|| AppError::ProbeOutputMalformed("manifest is neither a master nor a media playlist".to_string()))?;

    let mut analysis = HlsAnalysis::new(analysis_id, manifest_ref.to_string(), manifest_type);

    match manifest_type {
        HlsManifestType::Master => {
            analyze_master(&mut analysis, &body, manifest_ref, options, driver, cancel).await;
        }
        HlsManifestType::Media => {
            analyze_media(&mut analysis, &body, options, driver, cancel).await;
        }
    }

    analysis.updated_at = chrono::Utc::now();
    Ok(analysis)
}

async fn analyze_master(
    analysis: &mut HlsAnalysis,
    body: &str,
    manifest_ref: &str,
    options: &HlsOptions,
    driver: &ProbeDriver,
    cancel: &CancellationToken,
) {
    let max_segments = options.clamped_max_segments();
    let parsed_variants = parse::parse_master_variants(body);

    for parsed in parsed_variants {
        if cancel.is_cancelled() {
            analysis.validation_issues.push("analysis cancelled before all variants were processed".to_string());
            break;
        }

        let variant_url = match resolve_variant_url(manifest_ref, &parsed.uri) {
            Ok(u) => u,
            Err(e) => {
                analysis.validation_issues.push(format!("variant {}: {e}", parsed.uri));
                continue;
            }
        };

        let mut variant = HlsVariant {
            uri: parsed.uri.clone(),
            bandwidth: parsed.bandwidth,
            resolution: parsed.resolution,
            codecs: parsed.codecs.clone(),
            frame_rate: parsed.frame_rate,
            segments: Vec::new(),
        };

        match fetch::fetch_text(&variant_url, &options.guard_config, DEFAULT_FETCH_TIMEOUT).await {
            Ok(variant_body) => {
                let playlist = parse::parse_media_playlist(&variant_body);
                for issue in compliance::validate_media_playlist(&playlist, is_vod_manifest(&variant_body)) {
                    analysis.validation_issues.push(format!("{}: {issue}", parsed.uri));
                }
                let segments = playlist.segments.into_iter().take(max_segments);
                for seg in segments {
                    if cancel.is_cancelled() {
                        analysis.validation_issues.push("analysis cancelled before all segments were probed".to_string());
                        break;
                    }
                    let probe_data = if options.analyze_segments {
                        probe_segment(driver, &variant_url, &seg.uri, analysis, cancel).await
                    } else {
                        None
                    };
                    analysis.total_duration += seg.duration;
                    variant.segments.push(HlsSegment {
                        uri: seg.uri,
                        sequence: seg.sequence,
                        duration: seg.duration,
                        probe_data,
                    });
                }
            }
            Err(e) => {
                analysis.validation_issues.push(format!("failed to fetch variant {}: {e}", parsed.uri));
            }
        }

        analysis.segment_count += variant.segments.len();
        analysis.variants.push(variant);
    }
}

async fn analyze_media(
    analysis: &mut HlsAnalysis,
    body: &str,
    options: &HlsOptions,
    driver: &ProbeDriver,
    cancel: &CancellationToken,
) {
    let max_segments = options.clamped_max_segments();
    let playlist = parse::parse_media_playlist(body);

    for issue in compliance::validate_media_playlist(&playlist, is_vod_manifest(body)) {
        analysis.validation_issues.push(issue);
    }

    for seg in playlist.segments.into_iter().take(max_segments) {
        if cancel.is_cancelled() {
            analysis.validation_issues.push("analysis cancelled before all segments were probed".to_string());
            break;
        }
        let probe_data = if options.analyze_segments {
            probe_segment(driver, &analysis.manifest_ref, &seg.uri, analysis, cancel).await
        } else {
            None
        };
        analysis.total_duration += seg.duration;
        analysis.segments.push(HlsSegment {
            uri: seg.uri,
            sequence: seg.sequence,
            duration: seg.duration,
            probe_data,
        });
    }

    analysis.segment_count = analysis.segments.len();
}

async fn probe_segment(
    driver: &ProbeDriver,
    playlist_url: &str,
    segment_uri: &str,
    analysis: &mut HlsAnalysis,
    cancel: &CancellationToken,
) -> Option<crate::domain::ProbeData> {
    let segment_url = match resolve_variant_url(playlist_url, segment_uri) {
        Ok(u) => u,
        Err(e) => {
            analysis.validation_issues.push(format!("segment {segment_uri}: {e}"));
            return None;
        }
    };

    let driver = driver.clone();
    let options = ProbeOptions::default_survey();
    let cancel = cancel.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        driver.probe(&segment_url, &options, Some(crate::probe::DEFAULT_PROBE_TIMEOUT), &cancel)
    })
    .await;

    match outcome {
        Ok(Ok(probe_data)) => Some(probe_data),
        Ok(Err(e)) => {
            analysis.validation_issues.push(format!("segment {segment_uri}: {e}"));
            None
        }
        Err(e) => {
            analysis.validation_issues.push(format!("segment {segment_uri}: probe task panicked: {e}"));
            None
        }
    }
}

/// A playlist is treated as VOD unless it declares itself a live EVENT
/// stream; the `#EXT-X-ENDLIST` compliance check only applies to VOD.
fn is_vod_manifest(body: &str) -> bool {
    !body.contains("EXT-X-PLAYLIST-TYPE:EVENT")
}

fn resolve_variant_url(base: &str, relative: &str) -> Result<String, String> {
    let base_url = url::Url::parse(base).map_err(|e| format!("invalid base manifest URL: {e}"))?;
    base_url
        .join(relative)
        .map(|u| u.to_string())
        .map_err(|e| format!("could not resolve relative URL: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_segments_clamps_into_range() {
        let mut options = HlsOptions { max_segments: 0, ..Default::default() };
        assert_eq!(options.clamped_max_segments(), 1);
        options.max_segments = 1000;
        assert_eq!(options.clamped_max_segments(), MAX_SEGMENTS_CLAMP);
        options.max_segments = 15;
        assert_eq!(options.clamped_max_segments(), 15);
    }

    #[test]
    fn resolves_relative_variant_url() {
        let resolved = resolve_variant_url("http://example.com/hls/master.m3u8", "720p/index.m3u8").unwrap();
        assert_eq!(resolved, "http://example.com/hls/720p/index.m3u8");
    }
}
