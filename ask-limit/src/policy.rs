use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Debug;
use std::ops::ControlFlow;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::counters::CounterSnapshot;
use crate::counters::YearlyReset;
use crate::error::ConfigError;

/// Why a prompt may not be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    UserTooNew,
    NotEnoughLaunches,
    NotEnoughQualifyingActions,
    CooldownActive,
    YearlyLimitReached,
    AlreadyRatedVersion,
}

impl IneligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserTooNew => "user_too_new",
            Self::NotEnoughLaunches => "not_enough_launches",
            Self::NotEnoughQualifyingActions => "not_enough_qualifying_actions",
            Self::CooldownActive => "cooldown_active",
            Self::YearlyLimitReached => "yearly_limit_reached",
            Self::AlreadyRatedVersion => "already_rated_version",
        }
    }
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds a user has to clear before a prompt may be shown.
///
/// Values of this type are always valid. Build one from untrusted input with
/// `EligibilityRequirement::try_from(RequirementConfig)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityRequirement {
    pub max_prompts_per_year: u32,
    pub cooldown_days: u32,
    pub min_account_age_days: u32,
    pub min_launches: u32,
    pub min_qualifying_actions: u32,
    /// Forces every evaluation to be eligible.
    pub debug_override_enabled: bool,
    pub yearly_reset: YearlyReset,
}

impl Default for EligibilityRequirement {
    fn default() -> Self {
        Self {
            max_prompts_per_year: 3,
            cooldown_days: 30,
            min_account_age_days: 7,
            min_launches: 5,
            min_qualifying_actions: 3,
            debug_override_enabled: false,
            yearly_reset: YearlyReset::default(),
        }
    }
}

/// The unvalidated form of [`EligibilityRequirement`], as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementConfig {
    pub max_prompts_per_year: i64,
    pub cooldown_days: i64,
    pub min_account_age_days: i64,
    pub min_launches: i64,
    pub min_qualifying_actions: i64,
    pub debug_override_enabled: bool,
    pub yearly_reset: YearlyReset,
}

impl Default for RequirementConfig {
    fn default() -> Self {
        let requirement = EligibilityRequirement::default();
        Self {
            max_prompts_per_year: requirement.max_prompts_per_year.into(),
            cooldown_days: requirement.cooldown_days.into(),
            min_account_age_days: requirement.min_account_age_days.into(),
            min_launches: requirement.min_launches.into(),
            min_qualifying_actions: requirement.min_qualifying_actions.into(),
            debug_override_enabled: requirement.debug_override_enabled,
            yearly_reset: requirement.yearly_reset,
        }
    }
}

fn threshold(field: &'static str, value: i64) -> Result<u32, ConfigError> {
    if value < 0 {
        return Err(ConfigError::Negative { field, value });
    }
    u32::try_from(value).map_err(|_| ConfigError::OutOfRange { field, value })
}

impl TryFrom<RequirementConfig> for EligibilityRequirement {
    type Error = ConfigError;

    fn try_from(config: RequirementConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            max_prompts_per_year: threshold("max_prompts_per_year", config.max_prompts_per_year)?,
            cooldown_days: threshold("cooldown_days", config.cooldown_days)?,
            min_account_age_days: threshold("min_account_age_days", config.min_account_age_days)?,
            min_launches: threshold("min_launches", config.min_launches)?,
            min_qualifying_actions: threshold(
                "min_qualifying_actions",
                config.min_qualifying_actions,
            )?,
            debug_override_enabled: config.debug_override_enabled,
            yearly_reset: config.yearly_reset,
        })
    }
}

/// Values derived from a snapshot at a given instant. Every rule reads from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facts {
    /// Whole days since the install was first seen, never negative.
    pub account_age_days: i64,
    pub launch_count: u64,
    pub activation_count: u64,
    /// Whole days since the last prompt, `None` if there never was one.
    pub days_since_last_prompt: Option<i64>,
    pub prompts_shown_this_year: u32,
    pub has_rated_current_version: bool,
}

impl Facts {
    pub fn gather(
        snapshot: &CounterSnapshot,
        now: DateTime<Utc>,
        current_version: &str,
        reset: YearlyReset,
    ) -> Self {
        // num_days truncates toward zero. A clock behind the stored
        // timestamp reads as zero days rather than a negative count.
        let whole_days = |since: DateTime<Utc>| now.signed_duration_since(since).num_days().max(0);

        Self {
            account_age_days: whole_days(snapshot.first_seen_at),
            launch_count: snapshot.launch_count,
            activation_count: snapshot.activation_count,
            days_since_last_prompt: snapshot.last_prompt_at.map(whole_days),
            prompts_shown_this_year: snapshot.prompts_in_window(now, reset),
            has_rated_current_version: snapshot.has_rated(current_version),
        }
    }
}

/// A single eligibility criterion.
///
/// Rules are independent: each one looks at the facts on its own and breaks
/// with the reason it fails for.
pub trait Rule: Debug {
    fn check(&self, facts: &Facts, requirement: &EligibilityRequirement)
    -> ControlFlow<IneligibilityReason>;
}

fn fail_if(failed: bool, reason: IneligibilityReason) -> ControlFlow<IneligibilityReason> {
    if failed {
        ControlFlow::Break(reason)
    } else {
        ControlFlow::Continue(())
    }
}

#[derive(Debug)]
pub struct AccountAge;

impl Rule for AccountAge {
    fn check(
        &self,
        facts: &Facts,
        requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        fail_if(
            facts.account_age_days < i64::from(requirement.min_account_age_days),
            IneligibilityReason::UserTooNew,
        )
    }
}

#[derive(Debug)]
pub struct LaunchCount;

impl Rule for LaunchCount {
    fn check(
        &self,
        facts: &Facts,
        requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        fail_if(
            facts.launch_count < u64::from(requirement.min_launches),
            IneligibilityReason::NotEnoughLaunches,
        )
    }
}

#[derive(Debug)]
pub struct QualifyingActions;

impl Rule for QualifyingActions {
    fn check(
        &self,
        facts: &Facts,
        requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        fail_if(
            facts.activation_count < u64::from(requirement.min_qualifying_actions),
            IneligibilityReason::NotEnoughQualifyingActions,
        )
    }
}

/// Vacuously satisfied when no prompt has ever been shown.
#[derive(Debug)]
pub struct Cooldown;

impl Rule for Cooldown {
    fn check(
        &self,
        facts: &Facts,
        requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        let active = facts
            .days_since_last_prompt
            .is_some_and(|days| days < i64::from(requirement.cooldown_days));
        fail_if(active, IneligibilityReason::CooldownActive)
    }
}

#[derive(Debug)]
pub struct YearlyCap;

impl Rule for YearlyCap {
    fn check(
        &self,
        facts: &Facts,
        requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        fail_if(
            facts.prompts_shown_this_year >= requirement.max_prompts_per_year,
            IneligibilityReason::YearlyLimitReached,
        )
    }
}

#[derive(Debug)]
pub struct RatedVersion;

impl Rule for RatedVersion {
    fn check(
        &self,
        facts: &Facts,
        _requirement: &EligibilityRequirement,
    ) -> ControlFlow<IneligibilityReason> {
        fail_if(
            facts.has_rated_current_version,
            IneligibilityReason::AlreadyRatedVersion,
        )
    }
}

/// Every rule, in reporting order.
pub const RULES: [&dyn Rule; 6] = [
    &AccountAge,
    &LaunchCount,
    &QualifyingActions,
    &Cooldown,
    &YearlyCap,
    &RatedVersion,
];

/// The outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityStatus {
    pub is_eligible: bool,
    pub account_age_days: i64,
    pub launch_count: u64,
    pub activation_count: u64,
    pub days_since_last_prompt: Option<i64>,
    pub prompts_shown_this_year: u32,
    pub has_rated_current_version: bool,
    pub debug_override_enabled: bool,
    pub ineligibility_reasons: BTreeSet<IneligibilityReason>,
}

impl EligibilityStatus {
    /// `Continue` when a prompt may be shown, otherwise `Break` with every failing reason.
    pub fn decision(&self) -> ControlFlow<&BTreeSet<IneligibilityReason>> {
        if self.is_eligible {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(&self.ineligibility_reasons)
        }
    }
}

/// Decides whether a prompt may be shown.
///
/// This is a pure function of its arguments: it never reads a clock or touches
/// shared state, so it can be called from any thread.
pub fn evaluate(
    snapshot: &CounterSnapshot,
    requirement: &EligibilityRequirement,
    now: DateTime<Utc>,
    current_version: &str,
) -> EligibilityStatus {
    let facts = Facts::gather(snapshot, now, current_version, requirement.yearly_reset);

    let ineligibility_reasons: BTreeSet<_> = if requirement.debug_override_enabled {
        BTreeSet::new()
    } else {
        RULES
            .iter()
            .filter_map(|rule| rule.check(&facts, requirement).break_value())
            .collect()
    };

    EligibilityStatus {
        is_eligible: ineligibility_reasons.is_empty(),
        account_age_days: facts.account_age_days,
        launch_count: facts.launch_count,
        activation_count: facts.activation_count,
        days_since_last_prompt: facts.days_since_last_prompt,
        prompts_shown_this_year: facts.prompts_shown_this_year,
        has_rated_current_version: facts.has_rated_current_version,
        debug_override_enabled: requirement.debug_override_enabled,
        ineligibility_reasons,
    }
}

/// An [`EligibilityRequirement`] bound to the [`evaluate`] function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EligibilityPolicy {
    requirement: EligibilityRequirement,
}

impl EligibilityPolicy {
    pub fn new(requirement: EligibilityRequirement) -> Self {
        Self { requirement }
    }

    pub fn requirement(&self) -> &EligibilityRequirement {
        &self.requirement
    }

    pub fn evaluate(
        &self,
        snapshot: &CounterSnapshot,
        now: DateTime<Utc>,
        current_version: &str,
    ) -> EligibilityStatus {
        evaluate(snapshot, &self.requirement, now, current_version)
    }
}
