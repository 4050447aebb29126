use chrono::{DateTime, Utc};

use crate::{
    classify::{ActivityState, Transition},
    recognize::{business::BusinessReading, money::MoneyReading},
};

/// One sampling cycle worth of readings, sent from the capture module to
/// the processing module.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingEvent {
    pub timestamp: DateTime<Utc>,
    /// Activity after this cycle's cues were applied.
    pub state: ActivityState,
    pub transition: Option<Transition>,
    pub money: Option<MoneyReading>,
    pub business: Option<BusinessReading>,
    /// Set while capture keeps failing and money tracking can't be trusted.
    pub capture_degraded: bool,
    /// Set when no OCR backend exists at all, so the session will never see
    /// money readings.
    pub money_tracking_disabled: bool,
}
