//! Parsing of business laptop screens: which business is open and its
//! stock, supplies and sell value.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static STOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)stock\s*[:\-]?\s*(\d{1,3})\s*%|stock\s*[:\-]?\s*(\d+)\s*/\s*(\d+)").unwrap()
});
static SUPPLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)suppl\w*\s*[:\-]?\s*(\d{1,3})\s*%|suppl\w*\s*[:\-]?\s*(\d+)\s*/\s*(\d+)")
        .unwrap()
});
static VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)value\s*[:\-]?\s*\$\s*([\d,]+)").unwrap());

/// The businesses the laptop screens identify themselves as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessKind {
    Cocaine,
    Meth,
    CounterfeitCash,
    Weed,
    Documents,
    Bunker,
    Nightclub,
    AcidLab,
    Unknown,
}

impl BusinessKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            BusinessKind::Cocaine => "Cocaine Lockup",
            BusinessKind::Meth => "Meth Lab",
            BusinessKind::CounterfeitCash => "Counterfeit Cash Factory",
            BusinessKind::Weed => "Weed Farm",
            BusinessKind::Documents => "Document Forgery Office",
            BusinessKind::Bunker => "Bunker",
            BusinessKind::Nightclub => "Nightclub",
            BusinessKind::AcidLab => "Acid Lab",
            BusinessKind::Unknown => "Unknown Business",
        }
    }

    /// Identifies the business from laptop screen text. Falls back to
    /// [BusinessKind::Unknown] so stock readings are never discarded just
    /// because the title row was unreadable.
    fn identify(text: &str) -> Self {
        const KINDS: &[(&str, BusinessKind)] = &[
            ("cocaine", BusinessKind::Cocaine),
            ("meth", BusinessKind::Meth),
            ("counterfeit", BusinessKind::CounterfeitCash),
            ("weed", BusinessKind::Weed),
            ("forgery", BusinessKind::Documents),
            ("document", BusinessKind::Documents),
            ("bunker", BusinessKind::Bunker),
            ("disruption logistics", BusinessKind::Bunker),
            ("nightclub", BusinessKind::Nightclub),
            ("tony", BusinessKind::Nightclub),
            ("acid", BusinessKind::AcidLab),
        ];
        for (keyword, kind) in KINDS {
            if text.contains(keyword) {
                return *kind;
            }
        }
        BusinessKind::Unknown
    }
}

/// One parsed laptop screen. `has_data` is false when the screen named a
/// business but none of the gauges were readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessReading {
    pub kind: BusinessKind,
    pub stock_pct: Option<f64>,
    pub supply_pct: Option<f64>,
    pub value: Option<i64>,
    pub raw: String,
}

impl BusinessReading {
    pub fn has_data(&self) -> bool {
        self.stock_pct.is_some() || self.supply_pct.is_some() || self.value.is_some()
    }
}

#[derive(Debug, Default)]
pub struct BusinessParser;

impl BusinessParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses laptop screen text. Returns `None` when the text does not look
    /// like a business screen at all.
    pub fn parse(&self, text: &str) -> Option<BusinessReading> {
        let text = text.to_lowercase();
        let kind = BusinessKind::identify(&text);
        let stock_pct = capture_percentage(&STOCK_RE, &text);
        let supply_pct = capture_percentage(&SUPPLY_RE, &text);
        let value = VALUE_RE
            .captures(&text)
            .and_then(|caps| caps[1].replace(',', "").parse().ok());

        let reading = BusinessReading {
            kind,
            stock_pct,
            supply_pct,
            value,
            raw: text.clone(),
        };
        if kind == BusinessKind::Unknown && !reading.has_data() {
            return None;
        }
        Some(reading)
    }
}

/// Reads a gauge either as a direct percentage or as an `x/y` fraction.
fn capture_percentage(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    if let Some(pct) = caps.get(1) {
        let pct: f64 = pct.as_str().parse().ok()?;
        return Some(pct.clamp(0.0, 100.0));
    }
    let numerator: f64 = caps.get(2)?.as_str().parse().ok()?;
    let denominator: f64 = caps.get(3)?.as_str().parse().ok()?;
    if denominator <= 0.0 {
        return None;
    }
    Some((numerator / denominator * 100.0).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_laptop_screen() {
        let parser = BusinessParser::new();
        let reading = parser
            .parse("Cocaine Lockup  STOCK: 95%  SUPPLIES: 20%  VALUE: $420,000")
            .unwrap();
        assert_eq!(reading.kind, BusinessKind::Cocaine);
        assert_eq!(reading.stock_pct, Some(95.0));
        assert_eq!(reading.supply_pct, Some(20.0));
        assert_eq!(reading.value, Some(420_000));
        assert!(reading.has_data());
    }

    #[test]
    fn test_fraction_gauges() {
        let parser = BusinessParser::new();
        let reading = parser.parse("Bunker stock 50/100 supplies 1/4").unwrap();
        assert_eq!(reading.kind, BusinessKind::Bunker);
        assert_eq!(reading.stock_pct, Some(50.0));
        assert_eq!(reading.supply_pct, Some(25.0));
    }

    #[test]
    fn test_unknown_business_with_gauges_is_kept() {
        let parser = BusinessParser::new();
        let reading = parser.parse("st0ck corrupted STOCK: 40%").unwrap();
        assert_eq!(reading.kind, BusinessKind::Unknown);
        assert_eq!(reading.stock_pct, Some(40.0));
    }

    #[test]
    fn test_unrelated_text_is_rejected() {
        let parser = BusinessParser::new();
        assert_eq!(parser.parse("press right to scroll"), None);
    }
}
