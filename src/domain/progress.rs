use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: Id,
    /// `0..=100`.
    pub progress: f64,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: Id, progress: f64, status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id,
            progress: progress.clamp(0.0, 100.0),
            status: status.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
