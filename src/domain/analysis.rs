use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Local,
    Url,
    Hls,
    S3,
    Stream,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Opaque map keyed by probe section name. Sections absent from probe output
/// are simply not present in the map; their absence is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub programs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ProbeData {
    pub fn is_empty(&self) -> bool {
        self.format.is_none()
            && self.streams.is_none()
            && self.frames.is_none()
            && self.packets.is_none()
            && self.chapters.is_none()
            && self.programs.is_none()
            && self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: Id,
    pub user_id: Option<Id>,
    pub file_name: String,
    pub source_ref: String,
    pub source_type: SourceType,
    pub file_size: Option<u64>,
    /// Hex-encoded SHA-256, set only for locally-stored files.
    pub content_hash: Option<String>,
    pub status: AnalysisStatus,
    pub probe_data: ProbeData,
    pub commentary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Analysis {
    pub fn new(file_name: String, source_ref: String, source_type: SourceType) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            user_id: None,
            file_name,
            source_ref,
            source_type,
            file_size: None,
            content_hash: None,
            status: AnalysisStatus::Pending,
            probe_data: ProbeData::default(),
            commentary: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
            error: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = AnalysisStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, probe_data: ProbeData) {
        self.probe_data = probe_data;
        self.status = AnalysisStatus::Completed;
        self.error = None;
        let now = Utc::now();
        self.updated_at = now;
        self.processed_at = Some(now);
    }

    pub fn mark_failed(&mut self, redacted_error: String) {
        self.status = AnalysisStatus::Failed;
        self.error = Some(redacted_error);
        let now = Utc::now();
        self.updated_at = now;
        self.processed_at = Some(now);
    }

    /// `status=completed` implies `probe_data` present and `error` absent;
    /// `status=failed` implies `error` present. Used by property tests and
    /// as a cheap runtime assertion before handing an `Analysis` to storage.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            AnalysisStatus::Completed => !self.probe_data.is_empty() && self.error.is_none(),
            AnalysisStatus::Failed => self.error.is_some(),
            AnalysisStatus::Pending | AnalysisStatus::Processing => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_analysis_is_pending_with_no_probe_data() {
        let a = Analysis::new("clip.mp4".into(), "/tmp/clip.mp4".into(), SourceType::Local);
        assert_eq!(a.status, AnalysisStatus::Pending);
        assert!(a.probe_data.is_empty());
        assert!(a.invariants_hold());
    }

    #[test]
    fn completed_requires_probe_data_and_no_error() {
        let mut a = Analysis::new("clip.mp4".into(), "/tmp/clip.mp4".into(), SourceType::Local);
        let mut probe_data = ProbeData::default();
        probe_data.format = Some(serde_json::json!({"duration": "10.0"}));
        a.mark_completed(probe_data);
        assert!(a.invariants_hold());
        assert!(a.error.is_none());
    }

    #[test]
    fn failed_requires_error() {
        let mut a = Analysis::new("clip.mp4".into(), "/tmp/clip.mp4".into(), SourceType::Local);
        a.mark_failed("probe failed".into());
        assert!(a.invariants_hold());
        assert_eq!(a.status, AnalysisStatus::Failed);
    }
}
