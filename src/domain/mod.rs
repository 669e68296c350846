//! Core data model: the entities the orchestrator, metrics pipeline, and HLS
//! analyzer hand back and forth, and that the storage collaborator persists.

mod analysis;
mod batch_job;
mod hls;
mod progress;
mod quality;

pub use analysis::{Analysis, AnalysisStatus, ProbeData, SourceType};
pub use batch_job::{BatchJob, BatchJobStatus, BatchResult};
pub use hls::{HlsAnalysis, HlsManifestType, HlsSegment, HlsStatus, HlsVariant};
pub use progress::ProgressEvent;
pub use quality::{MetricType, QualityAnalysis, QualityStatus, QualityStats};

use uuid::Uuid;

/// Opaque 128-bit identifier. A thin wrapper keeps call sites from accepting
/// an arbitrary `Uuid` meant for a different entity.
pub type Id = Uuid;

pub fn new_id() -> Id {
    Uuid::new_v4()
}
