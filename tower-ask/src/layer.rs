use std::sync::Arc;

use tower::Layer;

use crate::coordinator::RatingCoordinator;
use crate::service::AskService;

/// Gates a UI presenter service behind a [`RatingCoordinator`].
#[derive(Debug, Clone)]
pub struct AskLayer {
    coordinator: Arc<RatingCoordinator>,
}

impl AskLayer {
    /// Create an AskLayer
    pub fn new(coordinator: Arc<RatingCoordinator>) -> Self {
        AskLayer { coordinator }
    }
}

impl<S> Layer<S> for AskLayer {
    type Service = AskService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AskService::new(service, Arc::clone(&self.coordinator))
    }
}
