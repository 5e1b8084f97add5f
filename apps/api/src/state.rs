use std::sync::Arc;

use crate::scheduler::AutomationScheduler;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Owns the per-automation triggers; mutations call `resync()` on it.
    pub scheduler: Arc<AutomationScheduler>,
}
