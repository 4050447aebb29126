use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;
use collector::CaptureModule;
use processing::{ledger::SessionLedger, ProcessingModule};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    capture::{cadence::CadenceController, region::ScreenRegions, FrameGrabber, GenericFrameGrabber},
    classify::StateClassifier,
    config::AppConfig,
    recognize::{GenericRecognizer, TextRecognizer},
    storage::ledger_storage::LedgerStorageImpl,
    tracker::{
        commands::TrackerCommand,
        event::ReadingEvent,
        status::{LoggingObserver, StatusPublisher, TrackerStatus},
    },
    utils::clock::{Clock, SystemClock},
};

pub mod advisor;
pub mod args;
pub mod collector;
pub mod commands;
pub mod event;
pub mod processing;
pub mod session;
pub mod shutdown;
pub mod snapshot;
pub mod status;

/// Represents the starting point for the tracker daemon.
pub async fn start_tracker(dir: PathBuf, config: AppConfig) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<ReadingEvent>(16);
    let (command_sender, command_receiver) = mpsc::channel::<TrackerCommand>(8);
    let (status_sender, status_receiver) = watch::channel(TrackerStatus::default());

    let grabber = GenericFrameGrabber::new()?;
    let recognizer = match GenericRecognizer::new() {
        Ok(v) => Some(Box::new(v) as Box<dyn TextRecognizer>),
        Err(e) => {
            warn!("Failed to create a text recognizer, running degraded: {e:?}");
            None
        }
    };

    let shutdown_token = CancellationToken::new();

    let collector = create_collector(
        sender,
        Box::new(grabber),
        recognizer,
        &config,
        &shutdown_token,
        SystemClock,
    );

    let processor = create_processor(
        dir,
        receiver,
        command_receiver,
        StatusPublisher::new(status_sender),
        &config,
        SystemClock,
    )?;

    // Held for the daemon lifetime. Display surfaces and hotkey handlers
    // clone these to talk to the pipeline.
    let _command_handle = command_sender;
    let _status_handle = status_receiver;

    let (_, collection_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        collector.run(),
        processor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Capture module got an error {:?}", collection_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<ReadingEvent>,
    grabber: Box<dyn FrameGrabber>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    config: &AppConfig,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> CaptureModule {
    CaptureModule::new(
        sender,
        grabber,
        recognizer,
        ScreenRegions::default(),
        StateClassifier::new(
            Duration::seconds(config.tracking.grace_period_secs as i64),
            Duration::seconds(config.tracking.complete_linger_secs as i64),
        ),
        CadenceController::from_rates(
            config.capture.idle_fps,
            config.capture.active_fps,
            config.capture.business_fps,
        ),
        shutdown_token.clone(),
        config.capture.failure_threshold,
        Box::new(clock),
    )
}

fn create_processor(
    data_dir: PathBuf,
    receiver: mpsc::Receiver<ReadingEvent>,
    commands: mpsc::Receiver<TrackerCommand>,
    status: StatusPublisher,
    config: &AppConfig,
    clock: impl Clock,
) -> Result<ProcessingModule<SessionLedger<LedgerStorageImpl>>, anyhow::Error> {
    let storage = LedgerStorageImpl::new(data_dir)?;
    let mut ledger = SessionLedger::new(
        storage,
        Box::new(clock),
        status,
        config.tracking.sanity_threshold,
        Duration::seconds(config.tracking.advisory_cooldown_secs as i64),
    );
    ledger.add_observer(Box::new(LoggingObserver));
    Ok(ProcessingModule::new(receiver, commands, ledger))
}

#[cfg(test)]
mod tracker_tests {
    use std::{collections::VecDeque, fs, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        capture::{MockFrameGrabber, RegionFrame},
        classify::ActivityState,
        config::AppConfig,
        recognize::{MockTextRecognizer, RecognizedText},
        storage::ledger_storage::{LedgerStorage, LedgerStorageImpl},
        tracker::{
            create_collector, create_processor, commands::TrackerCommand, event::ReadingEvent,
            status::{StatusPublisher, TrackerStatus},
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    /// Scripted recognizer output: one string per OCR call, in the order the
    /// capture module reads regions (money, mission text, center prompt).
    fn scripted_recognizer(script: Vec<&str>) -> MockTextRecognizer {
        let mut script: VecDeque<String> =
            script.into_iter().map(|s| s.to_string()).collect();
        let mut recognizer = MockTextRecognizer::new();
        recognizer.expect_recognize().returning(move |_| {
            Ok(script
                .pop_front()
                .map(RecognizedText::new)
                .unwrap_or_else(RecognizedText::empty))
        });
        recognizer
    }

    /// End to end run of both modules over mocked capture: a mission is
    /// picked up, pays out, completes, and the ledger plus session summary
    /// land on disk.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_tracker() -> Result<()> {
        *TEST_LOGGING;
        let mut grabber = MockFrameGrabber::new();
        grabber
            .expect_grab()
            .returning(|_| Ok(RegionFrame::new(2, 2, vec![255; 16])));

        // Cycle 1: idle, establishes the baseline.
        // Cycle 2: headhunter cue plus a 500 payout.
        // Cycle 3: completion banner.
        let recognizer = scripted_recognizer(vec![
            "$1,000", "", "",
            "$1,500", "Headhunter", "",
            "$1,500", "MISSION PASSED", "",
        ]);

        let shutdown_token = CancellationToken::new();
        let test_clock = TestClock {
            start_time: Utc.from_utc_datetime(&TEST_START_DATE),
            reference: Instant::now(),
        };

        let (sender, receiver) = mpsc::channel::<ReadingEvent>(16);
        let (_command_sender, command_receiver) = mpsc::channel::<TrackerCommand>(8);
        let (status_sender, status_receiver) =
            tokio::sync::watch::channel(TrackerStatus::default());

        let mut config = AppConfig::default();
        // Whole-second cycles keep the stored span boundaries exact.
        config.capture.active_fps = 1.0;
        let collector = create_collector(
            sender,
            Box::new(grabber),
            Some(Box::new(recognizer)),
            &config,
            &shutdown_token,
            test_clock.clone(),
        );

        let dir = tempdir()?;
        let processor = create_processor(
            dir.path().to_path_buf(),
            receiver,
            command_receiver,
            StatusPublisher::new(status_sender),
            &config,
            test_clock.clone(),
        )?;

        let (_, collection_result, processing_result) = tokio::join!(
            async {
                // Idle cycles run at 0.5 fps, active ones at 1 fps: cycles
                // land at 0s, 2s, 4s, 5s.
                tokio::time::sleep(Duration::from_millis(5500)).await;
                shutdown_token.cancel()
            },
            collector.run(),
            processor.run(),
        );

        collection_result?;
        processing_result?;

        assert_eq!(status_receiver.borrow().session_earned, 500);

        let storage = LedgerStorageImpl::new(dir.path().to_path_buf())?;
        let spans = storage.spans_for(TEST_START_DATE.date()).await?;

        let states: Vec<_> = spans.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                ActivityState::Idle,
                ActivityState::MissionActive,
                ActivityState::MissionComplete
            ]
        );

        let mission = &spans[1];
        assert_eq!(mission.earned, 500);
        // The mission span runs from its own start to the completion cue.
        assert_eq!(mission.end(), spans[2].start);

        let sessions = fs::read_dir(dir.path().join("sessions"))?.collect::<Vec<_>>();
        assert_eq!(sessions.len(), 1);

        Ok(())
    }
}
