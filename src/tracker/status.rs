use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::{advisor::Advisory, commands::TrackerCommand, event::ReadingEvent};
use crate::classify::{ActivityState, Transition};

/// Snapshot of the tracker for display surfaces. Published over a watch
/// channel, readers always see the latest value.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub state: ActivityState,
    pub paused: bool,
    pub overlay_visible: bool,
    pub session_earned: i64,
    pub rejected_readings: u32,
    pub capture_degraded: bool,
    /// True when the daemon runs without an OCR backend. Display surfaces
    /// use this to tell "no earnings" apart from "can't read earnings".
    pub money_tracking_disabled: bool,
    pub last_reading_at: Option<DateTime<Utc>>,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        Self {
            state: ActivityState::Idle,
            paused: false,
            overlay_visible: true,
            session_earned: 0,
            rejected_readings: 0,
            capture_degraded: false,
            money_tracking_disabled: false,
            last_reading_at: None,
        }
    }
}

/// Hooks for anything that wants to follow the pipeline: overlay, status
/// window, audio notifications. All methods default to no-ops so observers
/// only implement what they care about.
pub trait PipelineObserver: Send {
    fn on_reading(&mut self, _event: &ReadingEvent) {}
    fn on_transition(&mut self, _transition: &Transition) {}
    fn on_advisories(&mut self, _advisories: &[Advisory]) {}
    fn on_command(&mut self, _command: &TrackerCommand) {}
}

/// Observer that narrates the pipeline into the log. Doubles as the
/// console display when the daemon runs in the foreground.
pub struct LoggingObserver;

impl PipelineObserver for LoggingObserver {
    fn on_transition(&mut self, transition: &Transition) {
        tracing::info!(
            "Now {} (was {}, trigger {:?})",
            transition.to.as_str(),
            transition.from.as_str(),
            transition.trigger
        );
    }

    fn on_advisories(&mut self, advisories: &[Advisory]) {
        for advisory in advisories {
            tracing::info!("Advisory: {}", advisory.message);
        }
    }
}

/// Thin wrapper over the watch sender that only wakes readers when the
/// status actually changed.
pub struct StatusPublisher {
    sender: watch::Sender<TrackerStatus>,
}

impl StatusPublisher {
    pub fn new(sender: watch::Sender<TrackerStatus>) -> Self {
        Self { sender }
    }

    pub fn publish(&self, status: TrackerStatus) {
        self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn current(&self) -> TrackerStatus {
        self.sender.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::watch;

    use super::*;

    #[test]
    fn test_publish_only_on_change() {
        let (sender, receiver) = watch::channel(TrackerStatus::default());
        let publisher = StatusPublisher::new(sender);

        publisher.publish(TrackerStatus::default());
        assert!(!receiver.has_changed().unwrap());

        let mut changed = TrackerStatus::default();
        changed.session_earned = 50_000;
        publisher.publish(changed.clone());
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow(), changed);
    }
}
