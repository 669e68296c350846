use std::sync::Arc;

use crate::config::AppConfig;
use crate::orchestrator::JobOrchestrator;
use crate::progress::ProgressBus;

/// Shared state handed to every handler: configuration plus the collaborator
/// handles the orchestrator itself already owns privately. The Progress Bus
/// is held here too so the WebSocket handler can subscribe without going
/// through the orchestrator.
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<JobOrchestrator>,
    pub progress: Arc<ProgressBus>,
}
