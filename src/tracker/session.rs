use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{classify::ActivityState, storage::entities::SessionSummary};

/// What happened to a money reading once the tracker looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyOutcome {
    /// First reading of the session, only establishes the baseline.
    Baseline,
    /// Delta accepted and attributed to the current activity.
    Accepted(i64),
    /// Delta failed the sanity check; the baseline is kept so a later good
    /// reading produces a correct delta.
    Rejected(i64),
    /// Tracking is paused. The baseline follows the balance but the delta
    /// is not counted as earnings.
    ExcludedPaused,
}

/// Per-session bookkeeping: earnings deltas, time per activity and the
/// pause switch.
pub struct SessionTracker {
    started_at: DateTime<Utc>,
    baseline: Option<i64>,
    total_earned: i64,
    earned_by_state: HashMap<ActivityState, i64>,
    seconds_by_state: HashMap<ActivityState, i64>,
    rejected_readings: u32,
    sanity_threshold: i64,
    paused: bool,
    current_state: ActivityState,
    state_since: DateTime<Utc>,
}

impl SessionTracker {
    pub fn new(started_at: DateTime<Utc>, sanity_threshold: i64) -> Self {
        Self {
            started_at,
            baseline: None,
            total_earned: 0,
            earned_by_state: HashMap::new(),
            seconds_by_state: HashMap::new(),
            rejected_readings: 0,
            sanity_threshold,
            paused: false,
            current_state: ActivityState::Idle,
            state_since: started_at,
        }
    }

    pub fn total_earned(&self) -> i64 {
        self.total_earned
    }

    pub fn rejected_readings(&self) -> u32 {
        self.rejected_readings
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Attributes elapsed time to the state the session was in and switches
    /// to the observed one. Called on every reading, state change or not.
    pub fn observe_state(&mut self, state: ActivityState, at: DateTime<Utc>) {
        let elapsed = (at - self.state_since).num_seconds();
        if elapsed > 0 {
            *self.seconds_by_state.entry(self.current_state).or_default() += elapsed;
            self.state_since = at;
        }
        if state != self.current_state {
            self.current_state = state;
            self.state_since = at;
        }
    }

    /// Applies a balance reading. Deltas are signed, spending counts
    /// against earnings.
    pub fn apply_money(&mut self, total: i64) -> MoneyOutcome {
        let Some(baseline) = self.baseline else {
            self.baseline = Some(total);
            return MoneyOutcome::Baseline;
        };

        let delta = total - baseline;
        if delta.abs() >= self.sanity_threshold {
            self.rejected_readings += 1;
            warn!("Rejecting balance delta of {delta}, over the sanity threshold");
            return MoneyOutcome::Rejected(delta);
        }

        self.baseline = Some(total);
        if self.paused {
            return MoneyOutcome::ExcludedPaused;
        }

        if delta != 0 {
            self.total_earned += delta;
            *self.earned_by_state.entry(self.current_state).or_default() += delta;
        }
        MoneyOutcome::Accepted(delta)
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            info!("Earnings tracking paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            info!("Earnings tracking resumed");
        }
    }

    pub fn summary(&mut self, ended_at: DateTime<Utc>) -> SessionSummary {
        self.observe_state(self.current_state, ended_at);

        let to_named = |map: &HashMap<ActivityState, i64>| {
            map.iter()
                .map(|(state, v)| (state.as_str().to_string(), *v))
                .collect::<BTreeMap<_, _>>()
        };

        SessionSummary {
            started_at: self.started_at,
            ended_at,
            total_earned: self.total_earned,
            earned_by_state: to_named(&self.earned_by_state),
            seconds_by_state: to_named(&self.seconds_by_state),
            rejected_readings: self.rejected_readings,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::*;

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn start() -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE)
    }

    fn tracker() -> SessionTracker {
        SessionTracker::new(start(), 10_000_000)
    }

    #[test]
    fn test_first_reading_is_baseline() {
        let mut tracker = tracker();
        assert_eq!(tracker.apply_money(1_000_000), MoneyOutcome::Baseline);
        assert_eq!(tracker.total_earned(), 0);
    }

    #[test]
    fn test_deltas_are_signed() {
        let mut tracker = tracker();
        tracker.apply_money(1_000_000);
        assert_eq!(tracker.apply_money(1_050_000), MoneyOutcome::Accepted(50_000));
        assert_eq!(tracker.apply_money(1_030_000), MoneyOutcome::Accepted(-20_000));
        assert_eq!(tracker.total_earned(), 30_000);
    }

    #[test]
    fn test_sanity_threshold_keeps_baseline() {
        let mut tracker = tracker();
        tracker.apply_money(1_000_000);
        assert_eq!(
            tracker.apply_money(999_000_000),
            MoneyOutcome::Rejected(998_000_000)
        );
        assert_eq!(tracker.rejected_readings(), 1);
        // A later good reading still deltas off the old baseline.
        assert_eq!(tracker.apply_money(1_010_000), MoneyOutcome::Accepted(10_000));
    }

    #[test]
    fn test_paused_updates_baseline_without_earnings() {
        let mut tracker = tracker();
        tracker.apply_money(1_000_000);
        tracker.pause();
        assert_eq!(tracker.apply_money(500_000), MoneyOutcome::ExcludedPaused);
        tracker.resume();
        // The baseline moved while paused, so only post-resume deltas count.
        assert_eq!(tracker.apply_money(520_000), MoneyOutcome::Accepted(20_000));
        assert_eq!(tracker.total_earned(), 20_000);
    }

    #[test]
    fn test_earnings_attributed_to_current_state() {
        let mut tracker = tracker();
        tracker.apply_money(1_000_000);
        tracker.observe_state(ActivityState::MissionActive, start() + Duration::seconds(10));
        tracker.apply_money(1_020_000);
        tracker.observe_state(ActivityState::Idle, start() + Duration::seconds(40));

        let summary = tracker.summary(start() + Duration::seconds(60));
        assert_eq!(summary.total_earned, 20_000);
        assert_eq!(summary.earned_by_state.get("MissionActive"), Some(&20_000));
        assert_eq!(summary.seconds_by_state.get("MissionActive"), Some(&30));
        assert_eq!(summary.seconds_by_state.get("Idle"), Some(&30));
    }
}
