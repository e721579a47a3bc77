// src/quote.rs
use anyhow::{ensure, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_LABEL: &str = "Unknown";

/// One normalized price observation (USD) for a departure/return pair.
///
/// Construction goes through [`PriceQuote::new`], which rejects non-finite or
/// negative prices and return dates that are not after the departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    pub airline: String,
    pub duration: String,
    pub source: String,
}

impl PriceQuote {
    pub fn new(
        price: f64,
        departure_date: NaiveDate,
        return_date: NaiveDate,
        source: impl Into<String>,
    ) -> Result<Self> {
        ensure!(
            price.is_finite() && price >= 0.0,
            "price must be finite and non-negative, got {price}"
        );
        ensure!(
            return_date > departure_date,
            "return date {return_date} is not after departure {departure_date}"
        );
        Ok(Self {
            price,
            departure_date,
            return_date,
            airline: UNKNOWN_LABEL.to_string(),
            duration: UNKNOWN_LABEL.to_string(),
            source: source.into(),
        })
    }

    /// Blank labels keep the "Unknown" default.
    pub fn with_airline(mut self, airline: impl Into<String>) -> Self {
        let a = airline.into();
        if !a.trim().is_empty() {
            self.airline = a.trim().to_string();
        }
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        let d = duration.into();
        if !d.trim().is_empty() {
            self.duration = d.trim().to_string();
        }
        self
    }

    pub fn trip_days(&self) -> i64 {
        (self.return_date - self.departure_date).num_days()
    }
}

/// Result of a single lookup. Only `Found` carries a price; the other
/// variants are normal outcomes, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Found(PriceQuote),
    /// The source answered but had no usable offer (also covers transport
    /// and parse failures absorbed by the adapter, and timeouts).
    Absent,
    RateLimited,
    /// Anti-automation barrier (captcha, security check, 403).
    Blocked,
}

impl QuoteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Absent => "absent",
            Self::RateLimited => "rate_limited",
            Self::Blocked => "blocked",
        }
    }

    /// Blocked / rate-limited sources are skipped until the next cycle.
    pub fn benches_source(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Blocked)
    }
}

/// Extract the first number-like run (`1,234` / `1,234.56`) from display text.
/// Entities such as `&#36;` or `&nbsp;` are decoded first.
pub fn parse_price(text: &str) -> Option<f64> {
    static RE_PRICE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE_PRICE.get_or_init(|| regex::Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

    let decoded = html_escape::decode_html_entities(text);
    let m = re.find(&decoded)?;
    let v: f64 = m.as_str().replace(',', "").parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn rejects_invalid_quotes() {
        assert!(PriceQuote::new(f64::INFINITY, d(1), d(5), "t").is_err());
        assert!(PriceQuote::new(f64::NAN, d(1), d(5), "t").is_err());
        assert!(PriceQuote::new(-1.0, d(1), d(5), "t").is_err());
        assert!(PriceQuote::new(100.0, d(5), d(5), "t").is_err());
        assert!(PriceQuote::new(0.0, d(1), d(2), "t").is_ok());
    }

    #[test]
    fn labels_default_to_unknown() {
        let q = PriceQuote::new(199.0, d(1), d(8), "t")
            .unwrap()
            .with_airline("  ")
            .with_duration("3h 10m");
        assert_eq!(q.airline, "Unknown");
        assert_eq!(q.duration, "3h 10m");
        assert_eq!(q.trip_days(), 7);
    }

    #[test]
    fn parse_price_handles_symbols_and_commas() {
        assert_eq!(parse_price("$1,234"), Some(1234.0));
        assert_eq!(parse_price("&#36;349"), Some(349.0));
        assert_eq!(parse_price("US$ 212.40 round trip"), Some(212.4));
        assert_eq!(parse_price("no price"), None);
    }
}
