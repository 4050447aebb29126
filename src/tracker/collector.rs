use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    capture::{
        cadence::CadenceController,
        region::{Region, ScreenRegions},
        FrameGrabber, RegionFrame,
    },
    classify::{ActivityState, StateClassifier},
    recognize::{
        business::{BusinessParser, BusinessReading},
        money::{MoneyParser, MoneyReading},
        preprocess, RecognizedText, TextRecognizer,
    },
    tracker::event::ReadingEvent,
    utils::clock::Clock,
};

/// Frames darker than this are treated as loading screens.
const DARK_FRAME_LUMA: f64 = 15.0;
/// Upscale factor applied before OCR. HUD text is small.
const OCR_SCALE: u32 = 2;

/// The sampling side of the pipeline. Grabs HUD regions, runs them through
/// OCR and the classifier, and ships one [ReadingEvent] per cycle.
pub struct CaptureModule {
    next: mpsc::Sender<ReadingEvent>,
    grabber: Box<dyn FrameGrabber>,
    /// `None` when no OCR backend could be created. The pipeline still runs
    /// on visual cues alone.
    recognizer: Option<Box<dyn TextRecognizer>>,
    regions: ScreenRegions,
    classifier: StateClassifier,
    money_parser: MoneyParser,
    business_parser: BusinessParser,
    cadence: CadenceController,
    shutdown: CancellationToken,
    time_provider: Box<dyn Clock>,
    failure_threshold: u32,
    consecutive_failures: u32,
    degraded: bool,
}

impl CaptureModule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        next: mpsc::Sender<ReadingEvent>,
        grabber: Box<dyn FrameGrabber>,
        recognizer: Option<Box<dyn TextRecognizer>>,
        regions: ScreenRegions,
        classifier: StateClassifier,
        cadence: CadenceController,
        shutdown: CancellationToken,
        failure_threshold: u32,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        if recognizer.is_none() {
            warn!("No text recognizer available, running on visual cues only");
        }
        Self {
            next,
            grabber,
            recognizer,
            regions,
            classifier,
            money_parser: MoneyParser::new(),
            business_parser: BusinessParser::new(),
            cadence,
            shutdown,
            time_provider,
            failure_threshold,
            consecutive_failures: 0,
            degraded: false,
        }
    }

    fn recognize_frame(&mut self, frame: &RegionFrame) -> Result<Option<RecognizedText>> {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return Ok(None);
        };
        let prepared = preprocess(frame, OCR_SCALE, false);
        Ok(Some(recognizer.recognize(&prepared)?))
    }

    fn recognize_region(&mut self, region: Region) -> Result<Option<RecognizedText>> {
        let frame = self.grabber.grab(&region)?;
        self.recognize_frame(&frame)
    }

    fn read_money(&mut self) -> Result<Option<MoneyReading>> {
        let region = self.regions.money_display;
        let Some(text) = self.recognize_region(region)? else {
            return Ok(None);
        };
        if text.is_empty() {
            return Ok(None);
        }
        Ok(self.money_parser.parse(&text.text))
    }

    /// Reads the laptop rows and parses them together with the screen cue
    /// text, which usually carries the business name.
    fn read_business(&mut self, cue: &str) -> Result<Option<BusinessReading>> {
        let mut combined = cue.to_string();
        for (_, region) in self.regions.business_regions() {
            if let Some(text) = self.recognize_region(region)? {
                combined.push(' ');
                combined.push_str(&text.text);
            }
        }
        Ok(self.business_parser.parse(&combined))
    }

    /// Executes one sampling cycle.
    fn collect_cycle(&mut self) -> Result<ReadingEvent> {
        let timestamp = self.time_provider.time();

        let center_frame = self.grabber.grab(&self.regions.center_prompt)?;
        if center_frame.mean_luma() < DARK_FRAME_LUMA {
            let transition = self.classifier.advance(None, true, timestamp);
            return Ok(ReadingEvent {
                timestamp,
                state: self.classifier.state(),
                transition,
                money: None,
                business: None,
                capture_degraded: self.degraded,
                money_tracking_disabled: self.recognizer.is_none(),
            });
        }

        let money = self.read_money()?;

        let mission_text = self.recognize_region(self.regions.mission_text)?;
        let center_text = self.recognize_frame(&center_frame)?;
        let cue = join_texts([mission_text, center_text]);

        let transition = self.classifier.advance(cue.as_deref(), false, timestamp);
        let state = self.classifier.state();

        let business = if state == ActivityState::BusinessComputer {
            self.read_business(cue.as_deref().unwrap_or_default())?
        } else {
            None
        };

        Ok(ReadingEvent {
            timestamp,
            state,
            transition,
            money,
            business,
            capture_degraded: self.degraded,
            money_tracking_disabled: self.recognizer.is_none(),
        })
    }

    /// Executes the capture event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut collection_point = self.time_provider.instant();
        loop {
            collection_point += self.cadence.interval_for(self.classifier.state());

            match self.collect_cycle() {
                Ok(event) => {
                    if self.degraded {
                        self.degraded = false;
                        info!("Capture recovered");
                    }
                    self.consecutive_failures = 0;

                    let span = info_span!("Processing collected readings");
                    debug!("Sending reading {:?}", event);
                    self.next
                        .send(event)
                        .instrument(span)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Err(e) => {
                    error!("Encountered an error during capture {:?}", e);
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= self.failure_threshold && !self.degraded {
                        self.degraded = true;
                        warn!(
                            "Capture failed {} times in a row, money tracking degraded",
                            self.consecutive_failures
                        );
                    }
                }
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel and consequently stop the processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }
    }
}

fn join_texts(texts: impl IntoIterator<Item = Option<RecognizedText>>) -> Option<String> {
    let joined = texts
        .into_iter()
        .flatten()
        .filter(|t| !t.is_empty())
        .map(|t| t.normalized())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
