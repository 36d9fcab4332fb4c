use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Datelike;
use chrono::TimeDelta;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::cell::AtomicCell;
use crate::cell::ConcurrentCell;
use crate::cell::SharedCell;
use crate::store::CounterRepository;

/// How the yearly prompt tally is reset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearlyReset {
    /// The tally restarts on the first prompt of a new calendar year (UTC).
    #[default]
    CalendarYear,
    /// The tally restarts on the first prompt 365 days or more after the window opened.
    Rolling365Days,
}

impl YearlyReset {
    /// Returns true if `at` falls in the tally window that opened at `started`.
    ///
    /// A timestamp earlier than `started` is treated as part of the window.
    pub fn same_window(self, started: DateTime<Utc>, at: DateTime<Utc>) -> bool {
        match self {
            Self::CalendarYear => at <= started || at.year() == started.year(),
            Self::Rolling365Days => at.signed_duration_since(started) < TimeDelta::days(365),
        }
    }
}

/// An immutable copy of every counter, used for a single evaluation or for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub launch_count: u64,
    pub activation_count: u64,
    /// When this install was first seen. Account age is measured from here.
    pub first_seen_at: DateTime<Utc>,
    /// Prompts shown in the window that opened at `prompt_year_started_at`.
    pub prompts_shown_this_year: u32,
    #[serde(default)]
    pub prompt_year_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_prompt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rated_versions: BTreeSet<String>,
}

impl CounterSnapshot {
    /// The counters of an install that has never been seen before.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            launch_count: 0,
            activation_count: 0,
            first_seen_at: now,
            prompts_shown_this_year: 0,
            prompt_year_started_at: None,
            last_prompt_at: None,
            rated_versions: BTreeSet::new(),
        }
    }

    /// Prompts that count against the yearly cap at `now`.
    ///
    /// Once `now` has left the stored window the tally no longer applies, even
    /// though nothing has been written yet.
    pub fn prompts_in_window(&self, now: DateTime<Utc>, reset: YearlyReset) -> u32 {
        match self.prompt_year_started_at {
            Some(started) if reset.same_window(started, now) => self.prompts_shown_this_year,
            _ => 0,
        }
    }

    pub fn has_rated(&self, version: &str) -> bool {
        self.rated_versions.contains(version)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct YearlyTally {
    count: u32,
    started_at: Option<DateTime<Utc>>,
}

impl YearlyTally {
    fn record(&self, at: DateTime<Utc>, reset: YearlyReset) -> Self {
        match self.started_at {
            Some(started) if reset.same_window(started, at) => Self {
                count: self.count.saturating_add(1),
                started_at: Some(started),
            },
            _ => Self {
                count: 1,
                started_at: Some(at),
            },
        }
    }
}

/// The named counters the eligibility policy reads.
///
/// Each counter lives in its own cell, so every individual operation is
/// linearizable. A [`snapshot`](Self::snapshot) reads the cells one after the
/// other and is not atomic across counters.
#[derive(Debug)]
pub struct CounterStore {
    launches: AtomicCell,
    activations: AtomicCell,
    first_seen_at: DateTime<Utc>,
    prompts: ConcurrentCell<YearlyTally>,
    last_prompt_at: ConcurrentCell<Option<DateTime<Utc>>>,
    rated_versions: ConcurrentCell<BTreeSet<String>>,
    reset: YearlyReset,
}

impl CounterStore {
    /// Creates the store of a fresh install first seen at `now`.
    pub fn new(now: DateTime<Utc>, reset: YearlyReset) -> Self {
        Self::from_snapshot(CounterSnapshot::fresh(now), reset)
    }

    pub fn from_snapshot(snapshot: CounterSnapshot, reset: YearlyReset) -> Self {
        Self {
            launches: AtomicCell::new(snapshot.launch_count),
            activations: AtomicCell::new(snapshot.activation_count),
            first_seen_at: snapshot.first_seen_at,
            prompts: ConcurrentCell::new(YearlyTally {
                count: snapshot.prompts_shown_this_year,
                started_at: snapshot.prompt_year_started_at,
            }),
            last_prompt_at: ConcurrentCell::new(snapshot.last_prompt_at),
            rated_versions: ConcurrentCell::new(snapshot.rated_versions),
            reset,
        }
    }

    /// Restores counters from `repository`.
    ///
    /// Missing or unreadable data is treated as a fresh install first seen at `now`.
    pub fn load(repository: &dyn CounterRepository, now: DateTime<Utc>, reset: YearlyReset) -> Self {
        match repository.load() {
            Ok(Some(snapshot)) => {
                debug!(launches = snapshot.launch_count, "restored rating counters");
                Self::from_snapshot(snapshot, reset)
            }
            Ok(None) => Self::new(now, reset),
            Err(error) => {
                warn!(%error, "failed to load rating counters, starting fresh");
                Self::new(now, reset)
            }
        }
    }

    pub fn yearly_reset(&self) -> YearlyReset {
        self.reset
    }

    /// Returns the new launch count.
    pub fn increment_launches(&self) -> u64 {
        self.launches.increment()
    }

    /// Returns the new qualifying action count.
    pub fn increment_activations(&self) -> u64 {
        self.activations.increment()
    }

    /// Counts a prompt shown at `at` and returns the tally for its window.
    ///
    /// Opens a new window when `at` lies outside the current one.
    pub fn record_prompt_shown(&self, at: DateTime<Utc>) -> u32 {
        let reset = self.reset;
        let tally = self.prompts.update(|tally| tally.record(at, reset));
        self.last_prompt_at.update(|last| match last {
            Some(last) if *last >= at => Some(*last),
            _ => Some(at),
        });
        tally.count
    }

    /// Records that `version` has been rated. Returns false if it already was.
    pub fn mark_rated(&self, version: impl Into<String>) -> bool {
        let version = version.into();
        self.rated_versions
            .update_in_place(|versions| versions.insert(version))
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let tally = self.prompts.get();
        CounterSnapshot {
            launch_count: self.launches.get(),
            activation_count: self.activations.get(),
            first_seen_at: self.first_seen_at,
            prompts_shown_this_year: tally.count,
            prompt_year_started_at: tally.started_at,
            last_prompt_at: self.last_prompt_at.get(),
            rated_versions: self.rated_versions.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::TimeZone;

    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryRepository;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn snapshot_is_idempotent_without_writes() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        store.increment_launches();
        store.mark_rated("1.0.0");
        store.record_prompt_shown(at(2024, 2, 1));

        assert_eq!(store.snapshot(), store.snapshot());
    }

    #[test]
    fn concurrent_launches_and_activations_are_all_counted() {
        let store = Arc::new(CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear));
        let mut handles = vec![];

        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    if i % 2 == 0 {
                        store.increment_launches();
                    } else {
                        store.increment_activations();
                    }
                    let _ = store.snapshot();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.launch_count, 8_000);
        assert_eq!(snapshot.activation_count, 8_000);
    }

    #[test]
    fn concurrent_prompts_are_all_tallied() {
        let store = Arc::new(CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear));
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    store.record_prompt_shown(at(2024, 6, 1));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().prompts_shown_this_year, 4_000);
    }

    #[test]
    fn calendar_year_boundary_resets_tally() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        assert_eq!(store.record_prompt_shown(at(2024, 3, 1)), 1);
        assert_eq!(store.record_prompt_shown(at(2024, 12, 31)), 2);
        assert_eq!(store.record_prompt_shown(at(2025, 1, 1)), 1);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.prompt_year_started_at, Some(at(2025, 1, 1)));
        assert_eq!(snapshot.last_prompt_at, Some(at(2025, 1, 1)));
    }

    #[test]
    fn rolling_window_ignores_calendar_boundary() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::Rolling365Days);
        assert_eq!(store.record_prompt_shown(at(2024, 12, 31)), 1);
        assert_eq!(store.record_prompt_shown(at(2025, 1, 1)), 2);
        // 365 days after the window opened
        assert_eq!(store.record_prompt_shown(at(2025, 12, 31)), 1);
    }

    #[test]
    fn stale_tally_does_not_count_against_cap() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        for _ in 0..3 {
            store.record_prompt_shown(at(2024, 5, 1));
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.prompts_in_window(at(2024, 11, 1), YearlyReset::CalendarYear), 3);
        assert_eq!(snapshot.prompts_in_window(at(2025, 1, 2), YearlyReset::CalendarYear), 0);
        assert_eq!(snapshot.prompts_in_window(at(2025, 1, 2), YearlyReset::Rolling365Days), 3);
    }

    #[test]
    fn last_prompt_never_moves_backwards() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        store.record_prompt_shown(at(2024, 6, 1));
        store.record_prompt_shown(at(2024, 5, 1));
        assert_eq!(store.snapshot().last_prompt_at, Some(at(2024, 6, 1)));
    }

    #[test]
    fn mark_rated_reports_new_versions() {
        let store = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        assert!(store.mark_rated("2.1.0"));
        assert!(!store.mark_rated("2.1.0"));

        let snapshot = store.snapshot();
        assert!(snapshot.has_rated("2.1.0"));
        assert!(!snapshot.has_rated("2.2.0"));
    }

    #[derive(Debug)]
    struct BrokenRepository;

    impl CounterRepository for BrokenRepository {
        fn load(&self) -> Result<Option<CounterSnapshot>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        fn save(&self, _snapshot: &CounterSnapshot) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn failed_load_starts_fresh() {
        let now = at(2024, 4, 4);
        let store = CounterStore::load(&BrokenRepository, now, YearlyReset::CalendarYear);
        assert_eq!(store.snapshot(), CounterSnapshot::fresh(now));
    }

    #[test]
    fn load_restores_saved_counters() {
        let repository = MemoryRepository::default();
        let original = CounterStore::new(at(2024, 1, 1), YearlyReset::CalendarYear);
        original.increment_launches();
        original.mark_rated("1.2.3");
        repository.save(&original.snapshot()).unwrap();

        let restored = CounterStore::load(&repository, at(2024, 9, 9), YearlyReset::CalendarYear);
        assert_eq!(restored.snapshot(), original.snapshot());
    }
}
