//! Recommendations derived from business snapshots. Evaluation is a pure
//! function of the latest snapshots; the cooldown gate decides which of the
//! results actually get surfaced to the player.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::snapshot::BusinessSnapshot;
use crate::recognize::business::BusinessKind;

const READY_TO_SELL_PCT: f64 = 95.0;
const SELL_WHEN_READY_PCT: f64 = 50.0;
const SUPPLIES_LOW_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvisoryKind {
    ReadyToSell,
    SellWhenReady,
    SuppliesEmpty,
    SuppliesLow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub business: BusinessKind,
    pub kind: AdvisoryKind,
    pub message: String,
}

fn advisory(business: BusinessKind, kind: AdvisoryKind, message: String) -> Advisory {
    Advisory {
        business,
        kind,
        message,
    }
}

/// Derives advisories from the latest snapshot of every business. Same
/// snapshots in, same advisories out.
pub fn evaluate(latest: &[&BusinessSnapshot]) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    for snapshot in latest {
        let name = snapshot.kind.display_name();
        if let Some(stock) = snapshot.stock_pct {
            if stock >= READY_TO_SELL_PCT {
                advisories.push(advisory(
                    snapshot.kind,
                    AdvisoryKind::ReadyToSell,
                    format!("{name} is full, sell now"),
                ));
            } else if stock >= SELL_WHEN_READY_PCT {
                advisories.push(advisory(
                    snapshot.kind,
                    AdvisoryKind::SellWhenReady,
                    format!("{name} stock at {stock:.0}%, consider selling"),
                ));
            }
        }
        if let Some(supplies) = snapshot.supply_pct {
            if supplies <= 0.0 {
                advisories.push(advisory(
                    snapshot.kind,
                    AdvisoryKind::SuppliesEmpty,
                    format!("{name} is out of supplies"),
                ));
            } else if supplies <= SUPPLIES_LOW_PCT {
                advisories.push(advisory(
                    snapshot.kind,
                    AdvisoryKind::SuppliesLow,
                    format!("{name} supplies at {supplies:.0}%"),
                ));
            }
        }
    }
    advisories
}

/// Keeps a repeated advisory quiet until its cooldown has passed. Keyed per
/// business and advisory kind, so a bunker sell reminder does not silence a
/// cocaine supply warning.
pub struct CooldownGate {
    cooldown: Duration,
    last_surfaced: HashMap<(BusinessKind, AdvisoryKind), DateTime<Utc>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_surfaced: HashMap::new(),
        }
    }

    pub fn surface(&mut self, advisories: Vec<Advisory>, at: DateTime<Utc>) -> Vec<Advisory> {
        advisories
            .into_iter()
            .filter(|a| {
                let key = (a.business, a.kind);
                match self.last_surfaced.get(&key) {
                    Some(last) if at - *last < self.cooldown => false,
                    _ => {
                        self.last_surfaced.insert(key, at);
                        true
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn snapshot(kind: BusinessKind, stock: Option<f64>, supplies: Option<f64>) -> BusinessSnapshot {
        BusinessSnapshot {
            kind,
            stock_pct: stock,
            supply_pct: supplies,
            value: None,
            at: Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_full_stock_and_empty_supplies() {
        let snap = snapshot(BusinessKind::Cocaine, Some(97.0), Some(0.0));
        let advisories = evaluate(&[&snap]);
        let kinds: Vec<_> = advisories.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AdvisoryKind::ReadyToSell, AdvisoryKind::SuppliesEmpty]);
    }

    #[test]
    fn test_midrange_stock_and_low_supplies() {
        let snap = snapshot(BusinessKind::Bunker, Some(60.0), Some(15.0));
        let advisories = evaluate(&[&snap]);
        let kinds: Vec<_> = advisories.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AdvisoryKind::SellWhenReady, AdvisoryKind::SuppliesLow]);
    }

    #[test]
    fn test_healthy_business_is_quiet() {
        let snap = snapshot(BusinessKind::Meth, Some(30.0), Some(70.0));
        assert!(evaluate(&[&snap]).is_empty());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let snap = snapshot(BusinessKind::Nightclub, Some(96.0), None);
        assert_eq!(evaluate(&[&snap]), evaluate(&[&snap]));
    }

    #[test]
    fn test_cooldown_gate_suppresses_repeats() {
        let t0 = Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap();
        let mut gate = CooldownGate::new(Duration::seconds(600));
        let snap = snapshot(BusinessKind::Cocaine, Some(97.0), None);

        let first = gate.surface(evaluate(&[&snap]), t0);
        assert_eq!(first.len(), 1);

        let repeat = gate.surface(evaluate(&[&snap]), t0 + Duration::seconds(30));
        assert!(repeat.is_empty());

        let later = gate.surface(evaluate(&[&snap]), t0 + Duration::seconds(700));
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn test_cooldown_is_scoped_per_business() {
        let t0 = Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap();
        let mut gate = CooldownGate::new(Duration::seconds(600));
        let cocaine = snapshot(BusinessKind::Cocaine, Some(97.0), None);
        let bunker = snapshot(BusinessKind::Bunker, Some(97.0), None);

        assert_eq!(gate.surface(evaluate(&[&cocaine]), t0).len(), 1);
        assert_eq!(gate.surface(evaluate(&[&bunker]), t0).len(), 1);
    }
}
