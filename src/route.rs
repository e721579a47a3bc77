// src/route.rs
use anyhow::{ensure, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The single origin/destination pair being watched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    /// Codes are trimmed and upper-cased; both must be three ASCII letters
    /// and must differ.
    pub fn new(origin: &str, destination: &str) -> Result<Self> {
        let origin = normalize_iata(origin)?;
        let destination = normalize_iata(destination)?;
        ensure!(
            origin != destination,
            "origin and destination must differ (both {origin})"
        );
        Ok(Self {
            origin,
            destination,
        })
    }

    pub fn label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }

    pub fn google_flights_link(&self, departure: NaiveDate, return_date: NaiveDate) -> String {
        format!(
            "https://www.google.com/flights?hl=en#flt={o}.{d}.{dep}*{d}.{o}.{ret}",
            o = self.origin,
            d = self.destination,
            dep = departure.format("%Y-%m-%d"),
            ret = return_date.format("%Y-%m-%d"),
        )
    }

    pub fn kayak_link(&self, departure: NaiveDate, return_date: NaiveDate) -> String {
        format!(
            "https://www.kayak.com/flights/{}-{}/{}/{}",
            self.origin,
            self.destination,
            departure.format("%Y-%m-%d"),
            return_date.format("%Y-%m-%d"),
        )
    }
}

fn normalize_iata(code: &str) -> Result<String> {
    let c = code.trim().to_ascii_uppercase();
    ensure!(
        c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()),
        "invalid IATA code: {code:?}"
    );
    Ok(c)
}
