// state.rs — Shared state for HTTP handlers.

use std::path::PathBuf;
use std::sync::Arc;

use sov_engine::{ComplianceEngine, EngineError};

use crate::error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ComplianceEngine>,
    /// Policy YAML re-read by `POST /admin/reload`.
    pub policies_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(engine: ComplianceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            policies_path: None,
        }
    }

    pub fn with_policies_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policies_path = Some(path.into());
        self
    }

    /// Run an engine call off the async runtime.
    ///
    /// Audit appends do file I/O and may sleep between retries.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ComplianceEngine) -> Result<T, EngineError> + Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || f(engine.as_ref()))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(ApiError::from)
    }
}
