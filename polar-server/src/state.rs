use std::sync::Arc;

use polar_engine::{PerformanceOutput, TableStore};
use tokio::sync::RwLock;

use crate::engine::PolarEngine;
use crate::persistence::Persister;

/// Everything the tasks and handlers share behind one lock.
pub struct AppState {
    pub engine: PolarEngine,
    /// Result of the last performance tick
    pub latest: Option<PerformanceOutput>,
}

impl AppState {
    pub fn new(engine: PolarEngine) -> Self {
        Self { engine, latest: None }
    }
}

pub type SharedState = Arc<RwLock<AppState>>;

/// Handle given to route handlers and background tasks.
#[derive(Clone)]
pub struct AppContext {
    pub state: SharedState,
    pub store: Arc<dyn TableStore>,
    /// Ordered writer for dynamic table snapshots
    pub persister: Persister,
}

impl AppContext {
    /// Also starts the snapshot writer, so it needs a running tokio runtime.
    pub fn new(state: AppState, store: Arc<dyn TableStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            persister: Persister::spawn(store.clone()),
            store,
        }
    }
}
