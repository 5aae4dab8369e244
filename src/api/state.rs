//! Application state for the API server

use crate::{Config, JobRegistry};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request; both fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Registry that owns every job
    pub registry: Arc<JobRegistry>,

    /// Configuration (read only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(registry: Arc<JobRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }
}
