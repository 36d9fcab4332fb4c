use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use ask_limit::EligibilityStatus;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::warn;

use crate::coordinator::RatingCoordinator;
use crate::coordinator::UserDecision;

/// Runs one ask per call, presenting it through the inner service when eligible.
///
/// The inner service is the UI: it receives the [`EligibilityStatus`] of an
/// eligible evaluation and resolves with the user's [`UserDecision`]. It is
/// never called for an ineligible evaluation, nor when the debug override
/// sends the user straight to the native prompt.
#[derive(Debug, Clone)]
pub struct AskService<S> {
    inner: S,
    coordinator: Arc<RatingCoordinator>,
}

impl<S> AskService<S> {
    pub fn new(inner: S, coordinator: Arc<RatingCoordinator>) -> Self {
        Self { inner, coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RatingCoordinator> {
        &self.coordinator
    }
}

pin_project! {
    #[project = ResponseStateProj]
    enum ResponseState<F> {
        Done,
        Presenting {
            #[pin]
            fut: F,
        },
    }
}

pin_project! {
    /// Resolves with the status of the evaluation once the ask is finished.
    pub struct ResponseFuture<F> {
        #[pin]
        state: ResponseState<F>,
        status: Option<EligibilityStatus>,
        coordinator: Arc<RatingCoordinator>,
    }
}

impl<F, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<UserDecision, E>>,
    E: Into<BoxError>,
{
    type Output = Result<EligibilityStatus, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();

        if let ResponseStateProj::Presenting { fut } = this.state.as_mut().project() {
            let decision = match ready!(fut.poll(cx)) {
                Ok(decision) => decision,
                Err(error) => {
                    let error: BoxError = error.into();
                    warn!(%error, "rating presenter failed, treating the ask as dismissed");
                    UserDecision::Dismissed
                }
            };
            this.state.set(ResponseState::Done);
            if let Some(status) = this.status.as_ref() {
                this.coordinator.complete(status, decision);
            }
        }

        Poll::Ready(
            this.status
                .take()
                .ok_or_else(|| BoxError::from("ResponseFuture polled after completion")),
        )
    }
}

impl<S> Service<()> for AskService<S>
where
    S: Service<EligibilityStatus, Response = UserDecision>,
    S::Error: Into<BoxError>,
{
    type Response = EligibilityStatus;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        let status = self.coordinator.evaluate();

        let state = if !status.is_eligible {
            ResponseState::Done
        } else if status.debug_override_enabled {
            self.coordinator.complete(&status, UserDecision::NativePrompt);
            ResponseState::Done
        } else {
            ResponseState::Presenting {
                fut: self.inner.call(status.clone()),
            }
        };

        ResponseFuture {
            state,
            status: Some(status),
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}
