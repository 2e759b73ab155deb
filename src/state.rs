use crate::dispatch::Dispatcher;
use crate::ingest::CallbackService;
use std::sync::Arc;

/// Shared application state accessible to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Fans dispatch requests out to the Analyzer
    pub dispatcher: Arc<Dispatcher>,

    /// Stores callbacks and answers result queries
    pub callbacks: Arc<CallbackService>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, callbacks: CallbackService) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            callbacks: Arc::new(callbacks),
        }
    }
}
