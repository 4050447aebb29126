use std::time::Duration;

use crate::classify::ActivityState;

const MIN_FPS: f64 = 0.1;
const MAX_FPS: f64 = 60.0;

/// Maps the current activity to a sampling interval. Freeroam is polled
/// slowly, an active mission faster, and the business laptop fastest since
/// its numbers are only on screen for a few seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct CadenceController {
    idle: Duration,
    active: Duration,
    business: Duration,
}

impl CadenceController {
    pub fn from_rates(idle_fps: f64, active_fps: f64, business_fps: f64) -> Self {
        Self {
            idle: interval_from_fps(idle_fps),
            active: interval_from_fps(active_fps),
            business: interval_from_fps(business_fps),
        }
    }

    pub fn interval_for(&self, state: ActivityState) -> Duration {
        match state {
            ActivityState::Idle | ActivityState::Loading => self.idle,
            ActivityState::BusinessComputer => self.business,
            ActivityState::MissionActive
            | ActivityState::MissionComplete
            | ActivityState::Selling
            | ActivityState::HeistPrep => self.active,
        }
    }
}

fn interval_from_fps(fps: f64) -> Duration {
    Duration::from_secs_f64(1.0 / fps.clamp(MIN_FPS, MAX_FPS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_match_rates() {
        let cadence = CadenceController::from_rates(0.5, 2.0, 4.0);
        assert_eq!(cadence.interval_for(ActivityState::Idle), Duration::from_secs(2));
        assert_eq!(
            cadence.interval_for(ActivityState::MissionActive),
            Duration::from_millis(500)
        );
        assert_eq!(
            cadence.interval_for(ActivityState::BusinessComputer),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_rates_are_clamped() {
        let cadence = CadenceController::from_rates(0.0, 1000.0, 1.0);
        assert_eq!(cadence.interval_for(ActivityState::Idle), Duration::from_secs(10));
        assert_eq!(
            cadence.interval_for(ActivityState::Selling),
            Duration::from_secs_f64(1.0 / 60.0)
        );
    }
}
