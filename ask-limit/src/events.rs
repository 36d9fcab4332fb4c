use std::fmt;

use crate::policy::IneligibilityReason;

/// Everything the rating flow reports to analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsEvent {
    /// The in-app "do you enjoy the app?" ask was presented.
    AskViewed,
    /// The user picked a star rating in the ask.
    StarsSelected(u8),
    Dismissed,
    NativePromptShown,
    /// One event per failing criterion of an ineligible evaluation.
    NotEligible(IneligibilityReason),
}

impl AnalyticsEvent {
    /// A stable name, suitable as a metric attribute.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AskViewed => "ask_viewed",
            Self::StarsSelected(_) => "stars_selected",
            Self::Dismissed => "dismissed",
            Self::NativePromptShown => "native_prompt_shown",
            Self::NotEligible(_) => "not_eligible",
        }
    }
}

impl fmt::Display for AnalyticsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StarsSelected(stars) => write!(f, "{}({stars})", self.name()),
            Self::NotEligible(reason) => write!(f, "{}({reason})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Receives analytics events.
///
/// Recording is fire-and-forget: implementations must not block and must
/// swallow their own failures.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent);
}

impl<F> AnalyticsSink for F
where
    F: Fn(AnalyticsEvent) + Send + Sync,
{
    fn record(&self, event: AnalyticsEvent) {
        self(event)
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record(&self, _event: AnalyticsEvent) {}
}
