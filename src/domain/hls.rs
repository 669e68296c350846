use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Id, ProbeData};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HlsManifestType {
    Master,
    Media,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsVariant {
    pub uri: String,
    pub bandwidth: Option<u64>,
    pub resolution: Option<(u32, u32)>,
    pub codecs: Option<String>,
    pub frame_rate: Option<f64>,
    pub segments: Vec<HlsSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsSegment {
    pub uri: String,
    pub sequence: u64,
    pub duration: f64,
    pub probe_data: Option<ProbeData>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HlsStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsAnalysis {
    pub id: Id,
    pub analysis_id: Id,
    pub manifest_ref: String,
    pub manifest_type: HlsManifestType,
    pub variants: Vec<HlsVariant>,
    /// Populated for a media-playlist manifest; empty for master manifests
    /// where segments live nested under each variant.
    pub segments: Vec<HlsSegment>,
    pub total_duration: f64,
    pub segment_count: usize,
    pub validation_issues: Vec<String>,
    pub status: HlsStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HlsAnalysis {
    pub fn new(analysis_id: Id, manifest_ref: String, manifest_type: HlsManifestType) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            analysis_id,
            manifest_ref,
            manifest_type,
            variants: Vec::new(),
            segments: Vec::new(),
            total_duration: 0.0,
            segment_count: 0,
            validation_issues: Vec::new(),
            status: HlsStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }
}
