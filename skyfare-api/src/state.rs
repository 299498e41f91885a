use skyfare_core::AlertRepository;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub alerts: Arc<dyn AlertRepository>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(alerts: Arc<dyn AlertRepository>) -> Self {
        Self {
            alerts,
            started_at: Instant::now(),
        }
    }
}
