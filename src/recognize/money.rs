//! Parsing of the HUD money display. OCR output is noisy, so digits are
//! corrected for the usual confusions and readings are validated against
//! the previous accepted value.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Largest balance the game can display. Anything above is an OCR artifact.
const MAX_BALANCE: i64 = 2_200_000_000;
/// Readings below this are usually a partially rendered HUD.
const MIN_BALANCE: i64 = 100;
/// A reading this many times larger or smaller than the last accepted one
/// is treated as misrecognition.
const MAX_JUMP_RATIO: i64 = 100;

static MONEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9OoIl|SsBgq,.\s]{3,})").unwrap());
// The HUD renders CASH before BANK but OCR sometimes reorders the rows,
// so both orders are accepted.
static CASH_BANK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cash\s*\$\s*([0-9OoIl|SsBgq,.]+).*?bank\s*\$\s*([0-9OoIl|SsBgq,.]+)").unwrap()
});
static BANK_CASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bank\s*\$\s*([0-9OoIl|SsBgq,.]+).*?cash\s*\$\s*([0-9OoIl|SsBgq,.]+)").unwrap()
});

/// One successfully parsed money display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyReading {
    pub cash: Option<i64>,
    pub bank: Option<i64>,
    /// Combined balance. This is what earnings deltas are computed from.
    pub total: i64,
    pub raw: String,
}

/// Stateful parser. Keeps the last accepted total so one-off OCR spikes
/// do not register as earnings.
#[derive(Debug, Default)]
pub struct MoneyParser {
    last_valid: Option<i64>,
}

impl MoneyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a money reading. Returns `None` when the text
    /// contains no plausible amount; rejected readings leave the stored
    /// baseline untouched.
    pub fn parse(&mut self, text: &str) -> Option<MoneyReading> {
        let reading = extract_reading(text)?;
        if !self.is_plausible(reading.total) {
            debug!("Rejecting implausible money reading {} from {text:?}", reading.total);
            return None;
        }
        self.last_valid = Some(reading.total);
        Some(reading)
    }

    fn is_plausible(&self, total: i64) -> bool {
        if !(MIN_BALANCE..=MAX_BALANCE).contains(&total) {
            return false;
        }
        match self.last_valid {
            Some(last) if last > 0 => {
                total < last.saturating_mul(MAX_JUMP_RATIO) && total > last / MAX_JUMP_RATIO
            }
            _ => true,
        }
    }
}

fn extract_reading(text: &str) -> Option<MoneyReading> {
    if let Some((cash, bank)) = extract_split(text) {
        return Some(MoneyReading {
            cash: Some(cash),
            bank: Some(bank),
            total: bank + cash,
            raw: text.to_string(),
        });
    }

    let total = MONEY_RE
        .captures_iter(text)
        .filter_map(|caps| extract_number(&caps[1]))
        .max()?;
    Some(MoneyReading {
        cash: None,
        bank: None,
        total,
        raw: text.to_string(),
    })
}

/// Finds a split cash/bank display. Returns `(cash, bank)`.
fn extract_split(text: &str) -> Option<(i64, i64)> {
    if let Some(caps) = CASH_BANK_RE.captures(text) {
        return Some((extract_number(&caps[1])?, extract_number(&caps[2])?));
    }
    if let Some(caps) = BANK_CASH_RE.captures(text) {
        return Some((extract_number(&caps[2])?, extract_number(&caps[1])?));
    }
    None
}

/// Turns an OCR digit run into a number. Corrects the usual glyph
/// confusions and strips thousands separators.
fn extract_number(raw: &str) -> Option<i64> {
    let mut digits = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            'O' | 'o' => digits.push('0'),
            'I' | 'l' | '|' => digits.push('1'),
            'S' | 's' => digits.push('5'),
            'B' => digits.push('8'),
            'g' | 'q' => digits.push('9'),
            ',' | '.' | ' ' => {}
            _ => return None,
        }
    }
    if digits.is_empty() || digits.len() > 10 {
        return None;
    }
    digits.parse().ok()
}
