//! Report Aggregator: a pure reducer that merges probe output, quality
//! metrics, HLS results, and commentary into the canonical `Analysis`
//! record. Field ordering is stable; a failed downstream step never
//! discards probe sections already recorded.

use crate::domain::{Analysis, HlsAnalysis, ProbeData, QualityAnalysis};

/// Everything a single processing pass might contribute. Every field is
/// optional; merging `ReportOverlay::default()` into an `Analysis` is a
/// no-op (the round-trip law the orchestrator relies on).
#[derive(Debug, Clone, Default)]
pub struct ReportOverlay {
    pub probe_data: Option<ProbeData>,
    pub quality: Vec<QualityAnalysis>,
    pub hls: Option<HlsAnalysis>,
    pub commentary: Option<String>,
}

impl ReportOverlay {
    fn is_empty(&self) -> bool {
        self.probe_data.is_none() && self.quality.is_empty() && self.hls.is_none() && self.commentary.is_none()
    }
}

/// The assembled, orchestrator-facing result of one analysis pass. Holds
/// the quality/HLS side records alongside the core `Analysis`, since those
/// are distinct persisted entities with their own parent-id linkage.
#[derive(Debug, Clone)]
pub struct AssembledReport {
    pub analysis: Analysis,
    pub quality: Vec<QualityAnalysis>,
    pub hls: Option<HlsAnalysis>,
}

/// Merges `overlay` into `analysis` in place and returns the assembled
/// report: `analysis` carries only probe sections and commentary, while the
/// quality and HLS side-records travel alongside it for the caller to
/// persist into their own tables. Probe sections are merged field-by-field
/// so an overlay carrying only, say, `frames` never erases an
/// already-recorded `format` section.
pub fn merge(analysis: &mut Analysis, overlay: &ReportOverlay) -> AssembledReport {
    if overlay.is_empty() {
        return AssembledReport { analysis: analysis.clone(), quality: Vec::new(), hls: None };
    }

    if let Some(incoming) = &overlay.probe_data {
        merge_probe_data(&mut analysis.probe_data, incoming);
    }

    if let Some(commentary) = &overlay.commentary {
        analysis.commentary = Some(commentary.clone());
    }

    analysis.updated_at = chrono::Utc::now();

    AssembledReport {
        analysis: analysis.clone(),
        quality: overlay.quality.clone(),
        hls: overlay.hls.clone(),
    }
}

fn merge_probe_data(existing: &mut ProbeData, incoming: &ProbeData) {
    if incoming.format.is_some() {
        existing.format = incoming.format.clone();
    }
    if incoming.streams.is_some() {
        existing.streams = incoming.streams.clone();
    }
    if incoming.frames.is_some() {
        existing.frames = incoming.frames.clone();
    }
    if incoming.packets.is_some() {
        existing.packets = incoming.packets.clone();
    }
    if incoming.chapters.is_some() {
        existing.chapters = incoming.chapters.clone();
    }
    if incoming.programs.is_some() {
        existing.programs = incoming.programs.clone();
    }
    if incoming.error.is_some() {
        existing.error = incoming.error.clone();
    }
}

/// Redacts an internal error string before it reaches a client-facing
/// field. Callers should prefer passing an `AppError`'s own client-facing
/// message; this exists as a last line of defense for error strings that
/// arrive from elsewhere (e.g. panic messages caught at a job boundary).
pub fn redact_error_for_client(message: &str) -> String {
    if message.contains('/') || message.contains('\\') || message.len() > 500 {
        "an internal error occurred".to_string()
    } else {
        message.to_string()
    }
}
