pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::pipeline::Pipeline;
use crate::search::DocumentStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn DocumentStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            pipeline,
            store,
            started_at: Instant::now(),
        }
    }
}
