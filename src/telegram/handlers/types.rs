//! Handler types and dependencies

use std::sync::Arc;

use crate::dialogue::Dispatcher;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub dispatcher: Arc<Dispatcher>,
}

impl HandlerDeps {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}
