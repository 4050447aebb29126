use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::ActivityState;

/// The struct used for storing data on the disk. Only spans are saved to
/// reduce disk usage: one span saying the player sold product for 8 minutes
/// instead of hundreds of per-cycle readings.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivitySpanEntity {
    pub state: ActivityState,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
    /// Money delta accumulated while the span was open. Signed, spending
    /// shows up as a negative value.
    #[serde(default)]
    pub earned: i64,
}

impl ActivitySpanEntity {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }

    pub fn set_end(&mut self, v: DateTime<Utc>) {
        self.duration = v - self.start;
    }

    /// Splits a span into the part before and the part after `split`. The
    /// earned amount stays with the first half since there is no way to
    /// attribute it more precisely.
    pub fn split_by(
        self,
        split: DateTime<Utc>,
    ) -> (Option<ActivitySpanEntity>, Option<ActivitySpanEntity>) {
        let end = self.end();
        if split < self.start {
            (None, Some(self))
        } else if split >= end {
            (Some(self), None)
        } else {
            let before = ActivitySpanEntity {
                state: self.state,
                start: self.start,
                duration: split - self.start,
                earned: self.earned,
            };
            let after = ActivitySpanEntity {
                state: self.state,
                start: split,
                duration: end - split,
                earned: 0,
            };
            (Some(before), Some(after))
        }
    }

    /// Returns only the part of the span inside the given window. Spans can
    /// cross midnight, so reports need this.
    pub fn clamp(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<ActivitySpanEntity> {
        self.split_by(from).1.and_then(|v| v.split_by(to).0)
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(s))
    }
}

/// One observation of the current activity at a point in time. Marks are
/// collapsed into [ActivitySpanEntity] values before hitting the disk.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityMark {
    pub state: ActivityState,
    pub at: DateTime<Utc>,
    /// Accepted money delta since the previous mark.
    pub earned: i64,
}

impl From<ActivityMark> for ActivitySpanEntity {
    fn from(ActivityMark { state, at, earned }: ActivityMark) -> Self {
        ActivitySpanEntity {
            state,
            start: at,
            duration: Duration::zero(),
            earned,
        }
    }
}

/// End-of-session rollup written next to the ledgers when the daemon shuts
/// down or tracking is stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ended_at: DateTime<Utc>,
    pub total_earned: i64,
    pub earned_by_state: BTreeMap<String, i64>,
    pub seconds_by_state: BTreeMap<String, i64>,
    /// Readings thrown away by the sanity checks.
    pub rejected_readings: u32,
}
