//! # ask-limit
//!
//! `ask-limit` decides whether a rate-limited prompt (an "ask", such as a request
//! for an app rating) may be shown, and keeps the counters that decision needs.
//!
//! ## Core Philosophy
//!
//! Counters are touched from many threads at once: launch counting at start-up
//! races with background evaluations. Every counter therefore lives in its own
//! [`SharedCell`], either lock-free ([`AtomicCell`]) or, for values that do not
//! fit a native atomic, behind a non-poisoning mutex ([`ConcurrentCell`]).
//!
//! The policy itself is a pure function over a [`CounterSnapshot`]. It never
//! reads a clock, so it behaves the same in tests as in production.
//!
//! ## Key Concepts
//!
//! * **Linearizable Cells**: no update is ever lost and no read is ever torn.
//! * **All Reasons**: every failing [`Rule`] is reported, not just the first.
//! * **Injected Time**: callers supply `now`, typically from a monotonic [`Clock`].
//!
//! ## Example
//!
//! ```rust
//! use ask_limit::CounterStore;
//! use ask_limit::EligibilityPolicy;
//! use ask_limit::EligibilityRequirement;
//! use ask_limit::IneligibilityReason;
//! use ask_limit::YearlyReset;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let store = CounterStore::new(now, YearlyReset::CalendarYear);
//! store.increment_launches();
//!
//! let policy = EligibilityPolicy::new(EligibilityRequirement::default());
//! let status = policy.evaluate(&store.snapshot(), now, "1.0.0");
//!
//! assert!(!status.is_eligible);
//! assert!(status.ineligibility_reasons.contains(&IneligibilityReason::UserTooNew));
//! ```

mod cell;
mod clock;
mod config;
mod counters;
mod error;
mod events;
mod policy;
mod store;

pub use cell::AtomicCell;
pub use cell::ConcurrentCell;
pub use cell::SharedCell;
pub use clock::Clock;
pub use config::GateConfig;
pub use counters::CounterSnapshot;
pub use counters::CounterStore;
pub use counters::YearlyReset;
pub use error::ConfigError;
pub use error::StoreError;
pub use events::AnalyticsEvent;
pub use events::AnalyticsSink;
pub use events::NoopAnalytics;
pub use policy::AccountAge;
pub use policy::Cooldown;
pub use policy::EligibilityPolicy;
pub use policy::EligibilityRequirement;
pub use policy::EligibilityStatus;
pub use policy::Facts;
pub use policy::IneligibilityReason;
pub use policy::LaunchCount;
pub use policy::QualifyingActions;
pub use policy::RULES;
pub use policy::RatedVersion;
pub use policy::RequirementConfig;
pub use policy::Rule;
pub use policy::YearlyCap;
pub use policy::evaluate;
pub use store::CounterRepository;
pub use store::JsonFileRepository;
pub use store::MemoryRepository;
