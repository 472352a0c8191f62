//! Shared application state handed to every Axum handler.

use crate::services::admin_store::AdminConfigStore;
use crate::services::analyzer::AudioAnalyzer;
use crate::services::job_store::JobStateStore;
use crate::services::orchestrator::JobOrchestrator;
use crate::services::progress_bus::ProgressBus;
use crate::services::renderer::Renderer;
use crate::services::sample_library::SampleLibrary;
use crate::services::session_manager::SessionManager;
use mixcraft_common::config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session_manager: Arc<SessionManager>,
    pub job_store: Arc<dyn JobStateStore>,
    pub progress_bus: Arc<ProgressBus>,
    pub admin_store: Arc<AdminConfigStore>,
    pub sample_library: Arc<SampleLibrary>,
    pub analyzer: Arc<dyn AudioAnalyzer>,
    pub renderer: Arc<dyn Renderer>,
    pub orchestrator: Arc<JobOrchestrator>,
}
