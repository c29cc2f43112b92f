//! HTTP API for the monument concierge

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::Database;
use crate::runtime::ProductionRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database, runtime: Arc<ProductionRuntime>) -> Self {
        Self { runtime, db }
    }
}
