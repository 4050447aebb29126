//! Finite-state classification of the current game activity. Cues come from
//! the text recognizer and from frame brightness; everything else is a
//! timeout.

pub mod rules;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rules::{best_match, KeywordRule, RuleMatch, KEYWORD_RULES};

/// The closed set of activities the tracker distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityState {
    Idle,
    MissionActive,
    MissionComplete,
    Selling,
    HeistPrep,
    BusinessComputer,
    Loading,
}

impl ActivityState {
    /// States in which the player is earning money through an activity.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ActivityState::MissionActive | ActivityState::Selling | ActivityState::HeistPrep
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Idle => "Idle",
            ActivityState::MissionActive => "MissionActive",
            ActivityState::MissionComplete => "MissionComplete",
            ActivityState::Selling => "Selling",
            ActivityState::HeistPrep => "HeistPrep",
            ActivityState::BusinessComputer => "BusinessComputer",
            ActivityState::Loading => "Loading",
        }
    }
}

/// Record of a state change and the cue that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ActivityState,
    pub to: ActivityState,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub at: DateTime<Utc>,
    pub trigger: String,
}

/// State machine over [ActivityState]. Transitions happen only on a
/// recognized keyword, a dark-frame cue, or expiry of a timeout; conflicting
/// cues in one cycle keep the current state.
pub struct StateClassifier {
    rules: &'static [KeywordRule],
    current: ActivityState,
    /// Last moment any gameplay cue was seen. Drives the grace-period
    /// reversion to Idle.
    last_cue_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    grace_period: Duration,
    complete_linger: Duration,
}

impl StateClassifier {
    pub fn new(grace_period: Duration, complete_linger: Duration) -> Self {
        Self {
            rules: KEYWORD_RULES,
            current: ActivityState::Idle,
            last_cue_at: None,
            completed_at: None,
            grace_period,
            complete_linger,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.current
    }

    /// Feeds one cycle worth of cues through the machine. At most one
    /// transition is produced per cycle.
    pub fn advance(
        &mut self,
        text: Option<&str>,
        dark_frame: bool,
        at: DateTime<Utc>,
    ) -> Option<Transition> {
        if dark_frame {
            return self.observe_dark_frame(at);
        }
        if let Some(text) = text {
            if let Some(transition) = self.observe_text(text, at) {
                return Some(transition);
            }
        }
        self.tick(at)
    }

    /// Classifies recognized text. `text` is normalized to lowercase here.
    pub fn observe_text(&mut self, text: &str, at: DateTime<Utc>) -> Option<Transition> {
        let text = text.to_lowercase();
        match best_match(self.rules, &text) {
            RuleMatch::Unique(rule) => {
                self.last_cue_at = Some(at);
                self.apply_rule(rule, at)
            }
            RuleMatch::Ambiguous => {
                // Conflicting cues of equal specificity. Retaining the state
                // still counts as gameplay activity for the grace period.
                debug!("Ambiguous cues in {text:?}, keeping {:?}", self.current);
                self.last_cue_at = Some(at);
                None
            }
            RuleMatch::None => None,
        }
    }

    fn apply_rule(&mut self, rule: KeywordRule, at: DateTime<Utc>) -> Option<Transition> {
        // A completion banner is only meaningful while an activity runs. A
        // stray "wasted" in freeroam must not open a phantom activity.
        if rule.target == ActivityState::MissionComplete && !self.current.is_active() {
            return None;
        }
        if rule.target == self.current {
            return None;
        }
        if rule.target == ActivityState::MissionComplete {
            self.completed_at = Some(at);
        }
        Some(self.switch_to(rule.target, at, rule.pattern))
    }

    /// Visual cue: the frame is nearly black, the game is loading.
    pub fn observe_dark_frame(&mut self, at: DateTime<Utc>) -> Option<Transition> {
        self.last_cue_at = Some(at);
        if self.current == ActivityState::Loading {
            return None;
        }
        Some(self.switch_to(ActivityState::Loading, at, "dark-frame"))
    }

    /// Timeout handling: completion banners linger briefly, and any non-idle
    /// state falls back to Idle once no cue has been seen for the grace
    /// period.
    pub fn tick(&mut self, at: DateTime<Utc>) -> Option<Transition> {
        if self.current == ActivityState::MissionComplete {
            if let Some(completed) = self.completed_at {
                if at - completed >= self.complete_linger {
                    self.completed_at = None;
                    return Some(self.switch_to(ActivityState::Idle, at, "complete-linger"));
                }
            }
            return None;
        }

        if self.current == ActivityState::Idle {
            return None;
        }

        match self.last_cue_at {
            Some(last_cue) if at - last_cue < self.grace_period => None,
            _ => Some(self.switch_to(ActivityState::Idle, at, "grace-period")),
        }
    }

    fn switch_to(
        &mut self,
        target: ActivityState,
        at: DateTime<Utc>,
        trigger: &str,
    ) -> Transition {
        let transition = Transition {
            from: self.current,
            to: target,
            at,
            trigger: trigger.to_string(),
        };
        info!(
            "State transition: {} -> {} ({trigger})",
            self.current.as_str(),
            target.as_str()
        );
        self.current = target;
        transition
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::*;

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn start() -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE)
    }

    fn classifier() -> StateClassifier {
        StateClassifier::new(Duration::seconds(120), Duration::seconds(15))
    }

    #[test]
    fn test_keyword_sequence_is_deterministic() {
        let mut classifier = classifier();
        let t0 = start();

        let transition = classifier.observe_text("Headhunter", t0).unwrap();
        assert_eq!(transition.from, ActivityState::Idle);
        assert_eq!(transition.to, ActivityState::MissionActive);

        let transition = classifier
            .observe_text("MISSION PASSED", t0 + Duration::seconds(60))
            .unwrap();
        assert_eq!(transition.to, ActivityState::MissionComplete);

        // Completion banner lingers, then reverts to idle.
        assert_eq!(classifier.tick(t0 + Duration::seconds(70)), None);
        let transition = classifier.tick(t0 + Duration::seconds(80)).unwrap();
        assert_eq!(transition.to, ActivityState::Idle);
        assert_eq!(transition.trigger, "complete-linger");
    }

    #[test]
    fn test_specificity_prefers_longer_pattern() {
        let mut classifier = classifier();
        let transition = classifier
            .observe_text("deliver the product to the buyer", start())
            .unwrap();
        assert_eq!(transition.to, ActivityState::Selling);
    }

    #[test]
    fn test_ambiguous_cues_keep_current_state() {
        let mut classifier = classifier();
        classifier.observe_text("headhunter", start());
        // "steal" and "stock" tie on specificity with different targets.
        let result = classifier.observe_text("steal the stock", start() + Duration::seconds(5));
        assert_eq!(result, None);
        assert_eq!(classifier.state(), ActivityState::MissionActive);
    }

    #[test]
    fn test_grace_period_reverts_to_idle() {
        let mut classifier = classifier();
        let t0 = start();
        classifier.observe_text("headhunter", t0);

        assert_eq!(classifier.tick(t0 + Duration::seconds(119)), None);
        let transition = classifier.tick(t0 + Duration::seconds(121)).unwrap();
        assert_eq!(transition.to, ActivityState::Idle);
        assert_eq!(transition.trigger, "grace-period");
    }

    #[test]
    fn test_cues_refresh_grace_period() {
        let mut classifier = classifier();
        let t0 = start();
        classifier.observe_text("headhunter", t0);
        classifier.observe_text("eliminate the targets", t0 + Duration::seconds(100));

        // 121s after start, but only 21s after the last cue.
        assert_eq!(classifier.tick(t0 + Duration::seconds(121)), None);
    }

    #[test]
    fn test_completion_banner_ignored_while_idle() {
        let mut classifier = classifier();
        let result = classifier.observe_text("wasted", start());
        assert_eq!(result, None);
        assert_eq!(classifier.state(), ActivityState::Idle);
    }

    #[test]
    fn test_dark_frame_moves_to_loading() {
        let mut classifier = classifier();
        let t0 = start();
        classifier.observe_text("headhunter", t0);

        let transition = classifier
            .advance(None, true, t0 + Duration::seconds(10))
            .unwrap();
        assert_eq!(transition.to, ActivityState::Loading);

        // A second dark frame is not a new transition.
        assert_eq!(classifier.advance(None, true, t0 + Duration::seconds(12)), None);
    }
}
