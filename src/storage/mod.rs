//! Storage collaborator: the persisted-state boundary the core treats as an
//! injected capability. `InMemoryStorage` is the default implementation used
//! when no external store is configured.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{Analysis, AnalysisStatus, Id};
use crate::error::AppError;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_analysis(&self, analysis: Analysis) -> Result<(), AppError>;
    async fn update_status(&self, id: Id, status: AnalysisStatus, error: Option<String>) -> Result<(), AppError>;
    async fn attach_commentary(&self, id: Id, commentary: String) -> Result<(), AppError>;
    async fn get(&self, id: Id) -> Result<Analysis, AppError>;
    async fn list_by_user(&self, user_id: Id) -> Result<Vec<Analysis>, AppError>;
    async fn delete(&self, id: Id) -> Result<(), AppError>;
    /// Replaces the stored record wholesale; used by the orchestrator after
    /// the Report Aggregator has merged probe/metrics/HLS output in.
    async fn save(&self, analysis: Analysis) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct InMemoryStorage {
    analyses: RwLock<HashMap<Id, Analysis>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_analysis(&self, analysis: Analysis) -> Result<(), AppError> {
        let mut guard = self.analyses.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(analysis.id, analysis);
        Ok(())
    }

    async fn update_status(&self, id: Id, status: AnalysisStatus, error: Option<String>) -> Result<(), AppError> {
        let mut guard = self.analyses.write().unwrap_or_else(|e| e.into_inner());
        let analysis = guard.get_mut(&id).ok_or_else(|| AppError::NotFound(id.to_string()))?;
        analysis.status = status;
        analysis.error = error;
        analysis.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn attach_commentary(&self, id: Id, commentary: String) -> Result<(), AppError> {
        let mut guard = self.analyses.write().unwrap_or_else(|e| e.into_inner());
        let analysis = guard.get_mut(&id).ok_or_else(|| AppError::NotFound(id.to_string()))?;
        analysis.commentary = Some(commentary);
        analysis.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get(&self, id: Id) -> Result<Analysis, AppError> {
        let guard = self.analyses.read().unwrap_or_else(|e| e.into_inner());
        guard.get(&id).cloned().ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    async fn list_by_user(&self, user_id: Id) -> Result<Vec<Analysis>, AppError> {
        let guard = self.analyses.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.values().filter(|a| a.user_id == Some(user_id)).cloned().collect())
    }

    async fn delete(&self, id: Id) -> Result<(), AppError> {
        let mut guard = self.analyses.write().unwrap_or_else(|e| e.into_inner());
        guard.remove(&id).ok_or_else(|| AppError::NotFound(id.to_string()))?;
        Ok(())
    }

    async fn save(&self, analysis: Analysis) -> Result<(), AppError> {
        let mut guard = self.analyses.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(analysis.id, analysis);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;

    fn sample() -> Analysis {
        Analysis::new("clip.mp4".into(), "/tmp/clip.mp4".into(), SourceType::Local)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let storage = InMemoryStorage::new();
        let analysis = sample();
        let id = analysis.id;
        storage.create_analysis(analysis).await.unwrap();
        let fetched = storage.get(id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage.get(crate::domain::new_id()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn update_status_then_delete() {
        let storage = InMemoryStorage::new();
        let analysis = sample();
        let id = analysis.id;
        storage.create_analysis(analysis).await.unwrap();
        storage.update_status(id, AnalysisStatus::Failed, Some("x".into())).await.unwrap();
        assert_eq!(storage.get(id).await.unwrap().status, AnalysisStatus::Failed);
        storage.delete(id).await.unwrap();
        assert!(storage.get(id).await.is_err());
    }
}
