//! ledger.rs: persisted all-time best price for the watched route.
//!
//! The file is pretty JSON with camelCase keys. It is replaced atomically
//! (write `<path>.tmp`, fsync, rename), so a reader never sees half a record.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::quote::PriceQuote;
use crate::route::Route;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPriceRecord {
    pub price: f64,
    #[serde(alias = "departure_date")]
    pub departure_date: NaiveDate,
    #[serde(alias = "return_date")]
    pub return_date: NaiveDate,
    #[serde(default, alias = "booking_link", alias = "link", skip_serializing_if = "Option::is_none")]
    pub booking_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, alias = "recorded_at", skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl BestPriceRecord {
    pub fn from_quote(q: &PriceQuote, booking_link: Option<String>) -> Self {
        Self {
            price: q.price,
            departure_date: q.departure_date,
            return_date: q.return_date,
            booking_link,
            airline: Some(q.airline.clone()),
            duration: Some(q.duration.clone()),
            source: Some(q.source.clone()),
            recorded_at: Some(Utc::now()),
        }
    }

    fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price >= 0.0 && self.return_date > self.departure_date
    }
}

/// `NoRecord` stands for "nothing stored yet"; any real quote beats it.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerState {
    NoRecord,
    Recorded(BestPriceRecord),
}

impl LedgerState {
    pub fn price(&self) -> Option<f64> {
        self.record().map(|r| r.price)
    }

    pub fn record(&self) -> Option<&BestPriceRecord> {
        match self {
            Self::NoRecord => None,
            Self::Recorded(r) => Some(r),
        }
    }
}

/// Strict: an equal price is not an improvement.
pub fn is_new_record(candidate: &PriceQuote, current: &LedgerState) -> bool {
    match current {
        LedgerState::NoRecord => true,
        LedgerState::Recorded(r) => candidate.price < r.price,
    }
}

#[derive(Debug, Clone)]
pub struct BestPriceLedger {
    path: PathBuf,
    route: Option<Route>,
}

impl BestPriceLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            route: None,
        }
    }

    /// Committed records get a booking link for this route.
    pub fn with_route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, unreadable, or corrupt files all read as `NoRecord`.
    pub async fn load(&self) -> LedgerState {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LedgerState::NoRecord,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ledger unreadable, treating as no record");
                return LedgerState::NoRecord;
            }
        };
        match serde_json::from_str::<BestPriceRecord>(&raw) {
            Ok(r) if r.is_valid() => LedgerState::Recorded(r),
            Ok(r) => {
                tracing::warn!(path = %self.path.display(), price = r.price, "ledger record invalid, treating as no record");
                LedgerState::NoRecord
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ledger corrupt, treating as no record");
                LedgerState::NoRecord
            }
        }
    }

    /// Persist `candidate` as the record, replacing whatever was stored.
    /// Callers decide whether it is an improvement (see [`is_new_record`]).
    pub async fn commit(&self, candidate: &PriceQuote) -> Result<BestPriceRecord> {
        let link = self
            .route
            .as_ref()
            .map(|r| r.google_flights_link(candidate.departure_date, candidate.return_date));
        let record = BestPriceRecord::from_quote(candidate, link);
        let bytes = serde_json::to_vec_pretty(&record).context("serialize ledger record")?;
        self.write_atomic(&bytes).await?;
        Ok(record)
    }

    /// Startup probe: the ledger directory exists (or can be created) and
    /// accepts writes.
    pub async fn check_writable(&self) -> Result<()> {
        self.ensure_parent().await?;
        let probe = sibling(&self.path, ".probe");
        fs::write(&probe, b"ok")
            .await
            .with_context(|| format!("ledger path not writable: {}", probe.display()))?;
        fs::remove_file(&probe)
            .await
            .with_context(|| format!("removing ledger probe {}", probe.display()))?;
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        }
        Ok(())
    }

    async fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_parent().await?;
        let tmp = sibling(&self.path, ".tmp");

        let mut f = fs::File::create(&tmp)
            .await
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        f.sync_all()
            .await
            .with_context(|| format!("syncing {}", tmp.display()))?;
        drop(f);

        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
