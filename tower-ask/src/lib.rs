//! # Tower Ask
//!
//! `tower-ask` runs the rating flow of an app on top of [`ask_limit`] and the
//! [Tower](https://github.com/tower-rs/tower) ecosystem.
//!
//! ## The Ask Stack
//! The [`RatingCoordinator`] owns the counters and the policy. Wrapping a UI
//! presenter service in an [`AskLayer`] yields an [`AskService`] that, on every call:
//!
//! 1. **Evaluates**: takes a counter snapshot and runs the eligibility policy.
//! 2. **Short-circuits**: an ineligible ask resolves immediately, after recording
//!    one `NotEligible` analytics event per reason. The presenter is never called.
//! 3. **Presents**: an eligible ask is handed to the presenter, and the user's
//!    [`UserDecision`] updates the counters, the rated versions and analytics.
//!
//! Errors never escape the stack: a failing presenter counts as a dismissal and
//! failing persistence is logged. The returned `EligibilityStatus` is the only outcome.

mod analytics;
mod coordinator;
mod layer;
mod platform;
mod service;


pub use analytics::ChannelAnalytics;
pub use analytics::MeterAnalytics;
pub use coordinator::CoordinatorState;
pub use coordinator::RatingCoordinator;
pub use coordinator::UserDecision;
pub use layer::AskLayer;
pub use platform::NoopPrompt;
pub use platform::PromptTrigger;
pub use platform::StaticVersion;
pub use platform::VersionSource;
pub use service::AskService;
pub use service::ResponseFuture;
