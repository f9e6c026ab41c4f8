use crate::session::Recorder;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<Recorder>,
}

impl AppState {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}
