use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use ask_limit::AnalyticsEvent;
use ask_limit::AnalyticsSink;
use ask_limit::Clock;
use ask_limit::ConcurrentCell;
use ask_limit::ConfigError;
use ask_limit::CounterRepository;
use ask_limit::CounterStore;
use ask_limit::EligibilityPolicy;
use ask_limit::EligibilityRequirement;
use ask_limit::EligibilityStatus;
use ask_limit::GateConfig;
use ask_limit::IneligibilityReason;
use ask_limit::JsonFileRepository;
use ask_limit::MemoryRepository;
use ask_limit::SharedCell;
use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::analytics::MeterAnalytics;
use crate::platform::NoopPrompt;
use crate::platform::PromptTrigger;
use crate::platform::VersionSource;

/// Where the coordinator is in the rating flow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    #[default]
    Idle,
    Evaluating,
    /// Waiting for the user's answer to the ask.
    Eligible,
    /// Reporting why the ask was refused. Returns to `Idle` straight after.
    Ineligible,
}

// The public state plus what an open ask needs to be completed.
#[derive(Debug, Default, Clone)]
enum Flow {
    #[default]
    Idle,
    Evaluating,
    Pending {
        status: EligibilityStatus,
        version: String,
    },
    // Claimed by `complete`, not yet counted
    Completing,
    Ineligible,
}

impl Flow {
    fn phase(&self) -> CoordinatorState {
        match self {
            Flow::Idle => CoordinatorState::Idle,
            Flow::Evaluating => CoordinatorState::Evaluating,
            Flow::Pending { .. } | Flow::Completing => CoordinatorState::Eligible,
            Flow::Ineligible => CoordinatorState::Ineligible,
        }
    }
}

/// What the user did with the ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    /// Picked a star rating, 1 to 5. Anything else counts as a dismissal.
    StarsSelected(u8),
    Dismissed,
    /// Skip the ask and go straight to the native prompt.
    NativePrompt,
}

/// Sequences counter reads, the eligibility policy, analytics and counter writes.
///
/// A coordinator is the only writer of prompt accounting. Launch and activation
/// counts may be recorded from any thread at any time.
pub struct RatingCoordinator {
    store: Arc<CounterStore>,
    policy: EligibilityPolicy,
    clock: Clock,
    repository: Arc<dyn CounterRepository>,
    analytics: Arc<dyn AnalyticsSink>,
    trigger: Arc<dyn PromptTrigger>,
    version: Arc<dyn VersionSource>,
    native_prompt_min_stars: u8,
    flow: ConcurrentCell<Flow>,
    // Held across snapshot and save so saves land in snapshot order
    save_lock: Mutex<()>,
}

impl fmt::Debug for RatingCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatingCoordinator")
            .field("store", &self.store)
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .field("repository", &self.repository)
            .field("native_prompt_min_stars", &self.native_prompt_min_stars)
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

impl RatingCoordinator {
    /// Creates a coordinator over `store`.
    ///
    /// Defaults: a real [`Clock`], in-memory persistence, [`MeterAnalytics`], and
    /// no native prompt.
    pub fn new(
        store: Arc<CounterStore>,
        requirement: EligibilityRequirement,
        version: impl VersionSource + 'static,
    ) -> Self {
        if store.yearly_reset() != requirement.yearly_reset {
            warn!(
                store = ?store.yearly_reset(),
                requirement = ?requirement.yearly_reset,
                "counter store and requirement disagree on the yearly reset"
            );
        }
        Self {
            store,
            policy: EligibilityPolicy::new(requirement),
            clock: Clock::new(),
            repository: Arc::new(MemoryRepository::default()),
            analytics: Arc::new(MeterAnalytics::new()),
            trigger: Arc::new(NoopPrompt),
            version: Arc::new(version),
            native_prompt_min_stars: 4,
            flow: ConcurrentCell::default(),
            save_lock: Mutex::new(()),
        }
    }

    /// Builds a coordinator from configuration, restoring counters from
    /// `store_path` when one is set.
    pub fn from_config(
        config: &GateConfig,
        version: impl VersionSource + 'static,
    ) -> Result<Self, ConfigError> {
        let requirement = config.requirement()?;
        let clock = Clock::new();
        let repository: Arc<dyn CounterRepository> = match &config.store_path {
            Some(path) => Arc::new(JsonFileRepository::new(path)),
            None => Arc::new(MemoryRepository::default()),
        };
        let store = CounterStore::load(repository.as_ref(), clock.now(), requirement.yearly_reset);

        Ok(Self::new(Arc::new(store), requirement, version)
            .with_clock(clock)
            .with_repository(repository)
            .with_native_prompt_min_stars(config.native_prompt_min_stars))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn CounterRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_analytics(mut self, analytics: impl AnalyticsSink + 'static) -> Self {
        self.analytics = Arc::new(analytics);
        self
    }

    pub fn with_prompt_trigger(mut self, trigger: impl PromptTrigger + 'static) -> Self {
        self.trigger = Arc::new(trigger);
        self
    }

    /// Star ratings at or above `stars` lead to the native prompt.
    pub fn with_native_prompt_min_stars(mut self, stars: u8) -> Self {
        self.native_prompt_min_stars = stars;
        self
    }

    pub fn store(&self) -> &Arc<CounterStore> {
        &self.store
    }

    pub fn requirement(&self) -> &EligibilityRequirement {
        self.policy.requirement()
    }

    pub fn state(&self) -> CoordinatorState {
        self.flow.update_in_place(|flow| flow.phase())
    }

    /// Counts an app launch and persists it. Returns the new count.
    pub fn record_launch(&self) -> u64 {
        let launches = self.store.increment_launches();
        self.persist();
        launches
    }

    /// Counts a qualifying action and persists it. Returns the new count.
    pub fn record_activation(&self) -> u64 {
        let activations = self.store.increment_activations();
        self.persist();
        activations
    }

    /// Decides whether the ask may be shown now.
    ///
    /// An ineligible outcome records one `NotEligible` event per reason and
    /// leaves every counter untouched. An eligible outcome records `AskViewed`,
    /// unless the debug override is on, and waits for [`complete`](Self::complete).
    ///
    /// Only one ask is open at a time. While one is waiting for its answer,
    /// every other evaluation is refused with `CooldownActive`.
    pub fn evaluate(&self) -> EligibilityStatus {
        let claimed = self.flow.update_in_place(|flow| match flow {
            Flow::Idle => {
                *flow = Flow::Evaluating;
                true
            }
            _ => false,
        });

        let now = self.clock.now();
        let version = self.version.current_version();
        let mut status = self.policy.evaluate(&self.store.snapshot(), now, &version);
        if !claimed {
            // The open ask has not been counted yet
            status.is_eligible = false;
            status
                .ineligibility_reasons
                .insert(IneligibilityReason::CooldownActive);
        }

        debug!(
            eligible = status.is_eligible,
            reasons = ?status.ineligibility_reasons,
            version = %version,
            ask_open = !claimed,
            "evaluated rating eligibility"
        );

        match status.decision() {
            ControlFlow::Break(reasons) => {
                if claimed {
                    self.flow.set(Flow::Ineligible);
                }
                for reason in reasons {
                    self.analytics.record(AnalyticsEvent::NotEligible(*reason));
                }
                if claimed {
                    self.flow.set(Flow::Idle);
                }
            }
            ControlFlow::Continue(()) => {
                if !status.debug_override_enabled {
                    self.analytics.record(AnalyticsEvent::AskViewed);
                }
                self.flow.set(Flow::Pending {
                    status: status.clone(),
                    version,
                });
            }
        }

        status
    }

    /// Applies the user's answer to an eligible ask.
    ///
    /// Whatever the answer, the prompt is counted exactly once against the
    /// cooldown and the yearly cap. The version rated is the one the ask was
    /// evaluated for. A status that is not the open ask, including an
    /// ineligible or already completed one, does nothing.
    pub fn complete(&self, status: &EligibilityStatus, decision: UserDecision) {
        let version = self.flow.update_in_place(|flow| {
            let open = matches!(flow, Flow::Pending { status: pending, .. } if *pending == *status);
            if !open {
                return None;
            }
            match std::mem::replace(flow, Flow::Completing) {
                Flow::Pending { version, .. } => Some(version),
                _ => None,
            }
        });
        let Some(version) = version else {
            debug!(eligible = status.is_eligible, "no open ask for this status");
            return;
        };

        let decision = match decision {
            UserDecision::StarsSelected(stars) if !(1..=5).contains(&stars) => {
                warn!(stars, "star rating out of range, treating the ask as dismissed");
                UserDecision::Dismissed
            }
            decision => decision,
        };

        let now = self.clock.now();
        match decision {
            UserDecision::StarsSelected(stars) => {
                self.analytics.record(AnalyticsEvent::StarsSelected(stars));
                self.store.mark_rated(version);
                if stars >= self.native_prompt_min_stars {
                    self.show_native_prompt();
                }
            }
            UserDecision::Dismissed => self.analytics.record(AnalyticsEvent::Dismissed),
            UserDecision::NativePrompt => self.show_native_prompt(),
        }

        let prompts_this_year = self.store.record_prompt_shown(now);
        info!(?decision, prompts_this_year, "rating prompt completed");

        self.persist();
        self.flow.set(Flow::Idle);
    }

    fn show_native_prompt(&self) {
        self.trigger.show_native_prompt();
        self.analytics.record(AnalyticsEvent::NativePromptShown);
    }

    fn persist(&self) {
        let _guard = self.save_lock.lock();
        if let Err(error) = self.repository.save(&self.store.snapshot()) {
            warn!(%error, "failed to persist rating counters");
        }
    }
}
