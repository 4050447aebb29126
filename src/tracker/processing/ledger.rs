use anyhow::Result;
use chrono::Duration;
use tracing::{debug, info, warn};

use crate::{
    classify::ActivityState,
    storage::{
        entities::ActivityMark,
        ledger_storage::{DayFileHandle, LedgerStorage},
    },
    tracker::{
        advisor::{evaluate, CooldownGate},
        commands::TrackerCommand,
        event::ReadingEvent,
        session::{MoneyOutcome, SessionTracker},
        snapshot::SnapshotHistory,
        status::{PipelineObserver, StatusPublisher},
    },
    utils::clock::Clock,
};

use super::module::EventProcessor;

/// The session-level processor. Bridges the event stream and [LedgerStorage]
/// while keeping the in-memory session state: earnings, snapshots,
/// advisories and the published status.
pub struct SessionLedger<S: LedgerStorage> {
    storage: S,
    current_handle: Option<S::DayFile>,
    date_provider: Box<dyn Clock>,
    session: SessionTracker,
    history: SnapshotHistory,
    gate: CooldownGate,
    observers: Vec<Box<dyn PipelineObserver>>,
    status: StatusPublisher,
    last_state: ActivityState,
    last_capture_degraded: bool,
    money_tracking_disabled: bool,
    /// Ledger writes failing is not fatal, the session keeps tracking in
    /// memory. Only the first failure is worth a warning.
    storage_degraded: bool,
}

impl<S: LedgerStorage> SessionLedger<S> {
    pub fn new(
        storage: S,
        date_provider: Box<dyn Clock>,
        status: StatusPublisher,
        sanity_threshold: i64,
        advisory_cooldown: Duration,
    ) -> Self {
        let started_at = date_provider.time();
        Self {
            storage,
            current_handle: None,
            session: SessionTracker::new(started_at, sanity_threshold),
            history: SnapshotHistory::new(),
            gate: CooldownGate::new(advisory_cooldown),
            observers: Vec::new(),
            status,
            last_state: ActivityState::Idle,
            last_capture_degraded: false,
            money_tracking_disabled: false,
            storage_degraded: false,
            date_provider,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn PipelineObserver>) {
        self.observers.push(observer);
    }

    /// Appends a mark to the ledger of the current day, rolling over to a
    /// new file at midnight.
    async fn append_mark(&mut self, mark: ActivityMark) -> Result<()> {
        let now = self.date_provider.time().date_naive();
        let reusable = matches!(&self.current_handle, Some(f) if f.get_date() == now);
        if !reusable {
            if let Some(mut old) = self.current_handle.take() {
                old.flush().await?;
            }
            self.current_handle = Some(self.storage.create_or_append(now).await?);
        }
        if let Some(handle) = self.current_handle.as_mut() {
            handle.append(vec![mark]).await?;
        }
        Ok(())
    }

    fn publish_status(&self, last_reading_at: Option<chrono::DateTime<chrono::Utc>>) {
        let mut status = self.status.current();
        status.state = self.last_state;
        status.paused = self.session.is_paused();
        status.session_earned = self.session.total_earned();
        status.rejected_readings = self.session.rejected_readings();
        status.capture_degraded = self.last_capture_degraded;
        status.money_tracking_disabled = self.money_tracking_disabled;
        if last_reading_at.is_some() {
            status.last_reading_at = last_reading_at;
        }
        self.status.publish(status);
    }
}

impl<S: LedgerStorage> EventProcessor for SessionLedger<S> {
    async fn process_next(&mut self, message: ReadingEvent) -> Result<()> {
        self.session.observe_state(message.state, message.timestamp);
        self.last_state = message.state;
        self.last_capture_degraded = message.capture_degraded;
        self.money_tracking_disabled = message.money_tracking_disabled;

        let mut earned = 0;
        if let Some(money) = &message.money {
            match self.session.apply_money(money.total) {
                MoneyOutcome::Accepted(delta) => earned = delta,
                MoneyOutcome::Rejected(delta) => {
                    debug!("Discarded balance delta {delta} from {:?}", money.raw)
                }
                MoneyOutcome::Baseline | MoneyOutcome::ExcludedPaused => {}
            }
        }

        if let Some(business) = &message.business {
            if self.history.record(business, message.timestamp) {
                let advisories = evaluate(&self.history.latest_per_business());
                let surfaced = self.gate.surface(advisories, message.timestamp);
                if !surfaced.is_empty() {
                    info!("Surfacing {} advisories", surfaced.len());
                    for observer in &mut self.observers {
                        observer.on_advisories(&surfaced);
                    }
                }
            }
        }

        for observer in &mut self.observers {
            observer.on_reading(&message);
            if let Some(transition) = &message.transition {
                observer.on_transition(transition);
            }
        }

        let mark = ActivityMark {
            state: message.state,
            at: message.timestamp,
            earned,
        };
        match self.append_mark(mark).await {
            Ok(_) => {
                if self.storage_degraded {
                    self.storage_degraded = false;
                    info!("Ledger writes recovered");
                }
            }
            Err(e) => {
                if !self.storage_degraded {
                    self.storage_degraded = true;
                    warn!("Ledger write failed, continuing without persistence: {e:?}");
                }
            }
        }

        self.publish_status(Some(message.timestamp));
        Ok(())
    }

    async fn handle_command(&mut self, command: TrackerCommand) -> Result<()> {
        match command {
            TrackerCommand::PauseTracking => self.session.pause(),
            TrackerCommand::ResumeTracking => self.session.resume(),
            TrackerCommand::ToggleOverlay => {
                let mut status = self.status.current();
                status.overlay_visible = !status.overlay_visible;
                self.status.publish(status);
            }
            // Window management is up to the display observers.
            TrackerCommand::ShowWindow => {}
        }
        for observer in &mut self.observers {
            observer.on_command(&command);
        }
        self.publish_status(None);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(v) = self.current_handle.as_mut() {
            v.flush().await?;
        }
        let summary = self.session.summary(self.date_provider.time());
        let path = self.storage.save_session(&summary).await?;
        info!(
            "Session summary written to {path:?}, total earned {}",
            summary.total_earned
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use tempfile::tempdir;
    use tokio::sync::watch;

    use crate::{
        classify::Transition,
        recognize::money::MoneyReading,
        storage::ledger_storage::LedgerStorageImpl,
        tracker::{advisor::Advisory, status::TrackerStatus},
        utils::{clock::SystemClock, logging::TEST_LOGGING},
    };

    use super::*;

    fn money(total: i64) -> Option<MoneyReading> {
        Some(MoneyReading {
            cash: None,
            bank: None,
            total,
            raw: format!("${total}"),
        })
    }

    fn reading(state: ActivityState, total: Option<i64>) -> ReadingEvent {
        ReadingEvent {
            timestamp: Utc::now(),
            state,
            transition: None,
            money: total.and_then(money),
            business: None,
            capture_degraded: false,
            money_tracking_disabled: false,
        }
    }

    fn ledger(
        dir: &std::path::Path,
    ) -> (SessionLedger<LedgerStorageImpl>, watch::Receiver<TrackerStatus>) {
        let storage = LedgerStorageImpl::new(dir.to_owned()).unwrap();
        let (sender, receiver) = watch::channel(TrackerStatus::default());
        let ledger = SessionLedger::new(
            storage,
            Box::new(SystemClock),
            StatusPublisher::new(sender),
            10_000_000,
            Duration::seconds(600),
        );
        (ledger, receiver)
    }

    #[derive(Default)]
    struct RecordingObserver {
        transitions: Arc<Mutex<Vec<Transition>>>,
        advisories: Arc<Mutex<Vec<Advisory>>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_transition(&mut self, transition: &Transition) {
            self.transitions.lock().unwrap().push(transition.clone());
        }

        fn on_advisories(&mut self, advisories: &[Advisory]) {
            self.advisories.lock().unwrap().extend_from_slice(advisories);
        }
    }

    #[tokio::test]
    async fn test_earnings_flow_into_ledger_and_status() {
        *TEST_LOGGING;
        let dir = tempdir().unwrap();
        let (mut ledger, status) = ledger(dir.path());

        ledger
            .process_next(reading(ActivityState::Idle, Some(1_000_000)))
            .await
            .unwrap();
        ledger
            .process_next(reading(ActivityState::MissionActive, Some(1_018_000)))
            .await
            .unwrap();
        ledger.finalize().await.unwrap();

        assert_eq!(status.borrow().session_earned, 18_000);

        let storage = LedgerStorageImpl::new(dir.path().to_owned()).unwrap();
        let spans = storage.spans_for(Utc::now().date_naive()).await.unwrap();
        assert_eq!(spans.iter().map(|s| s.earned).sum::<i64>(), 18_000);

        let sessions = std::fs::read_dir(dir.path().join("sessions")).unwrap();
        assert_eq!(sessions.count(), 1);
    }

    #[tokio::test]
    async fn test_pause_command_excludes_earnings() {
        *TEST_LOGGING;
        let dir = tempdir().unwrap();
        let (mut ledger, status) = ledger(dir.path());

        ledger
            .process_next(reading(ActivityState::Idle, Some(1_000_000)))
            .await
            .unwrap();
        ledger
            .handle_command(TrackerCommand::PauseTracking)
            .await
            .unwrap();
        assert!(status.borrow().paused);

        ledger
            .process_next(reading(ActivityState::Idle, Some(900_000)))
            .await
            .unwrap();
        assert_eq!(status.borrow().session_earned, 0);

        ledger
            .handle_command(TrackerCommand::ResumeTracking)
            .await
            .unwrap();
        ledger
            .process_next(reading(ActivityState::Idle, Some(905_000)))
            .await
            .unwrap();
        assert_eq!(status.borrow().session_earned, 5_000);
    }

    #[tokio::test]
    async fn test_observers_see_transitions_and_advisories() {
        *TEST_LOGGING;
        let dir = tempdir().unwrap();
        let (mut ledger, _status) = ledger(dir.path());

        let observer = RecordingObserver::default();
        let transitions = observer.transitions.clone();
        let advisories = observer.advisories.clone();
        ledger.add_observer(Box::new(observer));

        let mut event = reading(ActivityState::BusinessComputer, None);
        event.transition = Some(Transition {
            from: ActivityState::Idle,
            to: ActivityState::BusinessComputer,
            at: event.timestamp,
            trigger: "stock".to_string(),
        });
        event.business = Some(crate::recognize::business::BusinessReading {
            kind: crate::recognize::business::BusinessKind::Cocaine,
            stock_pct: Some(97.0),
            supply_pct: None,
            value: None,
            raw: String::new(),
        });

        ledger.process_next(event).await.unwrap();

        assert_eq!(transitions.lock().unwrap().len(), 1);
        assert_eq!(advisories.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_money_tracking_is_published() {
        *TEST_LOGGING;
        let dir = tempdir().unwrap();
        let (mut ledger, status) = ledger(dir.path());

        let mut event = reading(ActivityState::Idle, None);
        event.money_tracking_disabled = true;
        ledger.process_next(event).await.unwrap();

        assert!(status.borrow().money_tracking_disabled);
        assert_eq!(status.borrow().session_earned, 0);
    }

    #[tokio::test]
    async fn test_toggle_overlay_flips_status() {
        *TEST_LOGGING;
        let dir = tempdir().unwrap();
        let (mut ledger, status) = ledger(dir.path());

        assert!(status.borrow().overlay_visible);
        ledger
            .handle_command(TrackerCommand::ToggleOverlay)
            .await
            .unwrap();
        assert!(!status.borrow().overlay_visible);
    }
}
