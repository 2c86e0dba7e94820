use std::sync::Arc;

use crate::client::PlatformClient;
use crate::config::Config;
use crate::resume::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Probe, facade and session for the attached platform.
    pub client: Arc<PlatformClient>,
    pub resumes: ResumeStore,
    pub config: Config,
}
