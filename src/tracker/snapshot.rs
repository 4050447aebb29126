use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recognize::business::{BusinessKind, BusinessReading};

/// One laptop screen reading with its capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSnapshot {
    pub kind: BusinessKind,
    pub stock_pct: Option<f64>,
    pub supply_pct: Option<f64>,
    pub value: Option<i64>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub at: DateTime<Utc>,
}

/// Append-only history of business snapshots for the session. Snapshots
/// are never edited after the fact, advisories work off the latest one per
/// business.
#[derive(Debug, Default)]
pub struct SnapshotHistory {
    snapshots: Vec<BusinessSnapshot>,
}

impl SnapshotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reading. Out-of-order readings for a business are dropped,
    /// time only moves forward within a kind.
    pub fn record(&mut self, reading: &BusinessReading, at: DateTime<Utc>) -> bool {
        if !reading.has_data() {
            return false;
        }
        let stale = self
            .snapshots
            .iter()
            .rev()
            .find(|s| s.kind == reading.kind)
            .is_some_and(|latest| at < latest.at);
        if stale {
            return false;
        }

        self.snapshots.push(BusinessSnapshot {
            kind: reading.kind,
            stock_pct: reading.stock_pct,
            supply_pct: reading.supply_pct,
            value: reading.value,
            at,
        });
        true
    }

    /// Latest snapshot of every business seen this session.
    pub fn latest_per_business(&self) -> Vec<&BusinessSnapshot> {
        let mut latest: Vec<&BusinessSnapshot> = Vec::new();
        for snapshot in &self.snapshots {
            match latest.iter_mut().find(|s| s.kind == snapshot.kind) {
                Some(slot) => *slot = snapshot,
                None => latest.push(snapshot),
            }
        }
        latest
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
