//! history.rs: in-memory log of recent cycle outcomes for the status API.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleEntry {
    pub finished_at: DateTime<Utc>,
    pub pairs_checked: usize,
    pub quotes_found: usize,
    pub blocked: usize,
    pub rate_limited: usize,
    pub cycle_best: Option<f64>,
    pub record_price: Option<f64>,
    /// "no_candidates" | "not_improved" | "new_record" | "commit_failed"
    pub outcome: &'static str,
}

#[derive(Debug)]
pub struct CycleHistory {
    inner: Mutex<Vec<CycleEntry>>,
    cap: usize,
}

impl CycleHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, entry: CycleEntry) {
        // A poisoned lock only means a panic elsewhere mid-push; the Vec is still usable.
        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<CycleEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
