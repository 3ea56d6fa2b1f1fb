use std::sync::Arc;

pub use crate::db::Pool;

// Shared state
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<Pool>,
}
