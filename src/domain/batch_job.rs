use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Analysis, Id};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchJobStatus {
    Processing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub analysis_id: Id,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: Id,
    pub status: BatchJobStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<BatchResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            status: BatchJobStatus::Processing,
            total,
            completed: 0,
            failed: 0,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// `completed + failed <= total` at all times; `status=completed` iff
    /// `completed + failed = total`. Once cancelled, no new result may be
    /// appended (checked by the caller before invoking this).
    pub fn record_result(&mut self, analysis: &Analysis, succeeded: bool) {
        debug_assert!(self.completed + self.failed < self.total);
        self.results.push(BatchResult {
            analysis_id: analysis.id,
            succeeded,
            error: analysis.error.clone(),
        });
        if succeeded {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        self.updated_at = Utc::now();
        if self.completed + self.failed == self.total && self.status == BatchJobStatus::Processing
        {
            self.status = BatchJobStatus::Completed;
        }
    }

    pub fn cancel(&mut self) {
        if self.status == BatchJobStatus::Processing {
            self.status = BatchJobStatus::Cancelled;
            self.updated_at = Utc::now();
        }
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = (self.completed + self.failed) as f64 / self.total as f64 * 100.0;
        pct
    }

    pub fn invariants_hold(&self) -> bool {
        if self.completed + self.failed > self.total {
            return false;
        }
        match self.status {
            BatchJobStatus::Completed => self.completed + self.failed == self.total,
            BatchJobStatus::Processing | BatchJobStatus::Cancelled => true,
        }
    }
}
