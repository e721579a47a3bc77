// src/scheduler.rs
//! One cycle: load the record, discover, compare, commit, notify.
//! Cycles never overlap; shutdown is honoured between cycles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate, Utc};
use metrics::{counter, gauge};
use tokio::sync::watch;

use crate::discovery::{DiscoveryEngine, DiscoveryReport};
use crate::history::{CycleEntry, CycleHistory};
use crate::ledger::{is_new_record, BestPriceLedger, BestPriceRecord, LedgerState};
use crate::notify::{NotifierMux, RecordAlert};
use crate::quote::PriceQuote;
use crate::route::Route;
use crate::window::SearchWindow;

const DEFAULT_HISTORY_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No pair produced a quote this round.
    NoCandidates,
    NotImproved {
        best: PriceQuote,
        record_price: f64,
    },
    NewRecord {
        record: BestPriceRecord,
        previous_price: Option<f64>,
        /// Sinks that accepted the alert.
        notified: usize,
    },
    /// A better price was found but could not be saved; nothing was announced.
    CommitFailed { best: PriceQuote },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::NotImproved { .. } => "not_improved",
            Self::NewRecord { .. } => "new_record",
            Self::CommitFailed { .. } => "commit_failed",
        }
    }
}

pub struct Scheduler {
    route: Route,
    window: SearchWindow,
    engine: DiscoveryEngine,
    ledger: BestPriceLedger,
    notifier: NotifierMux,
    history: Arc<CycleHistory>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        route: Route,
        window: SearchWindow,
        engine: DiscoveryEngine,
        ledger: BestPriceLedger,
        notifier: NotifierMux,
        interval: Duration,
    ) -> Self {
        Self {
            route,
            window,
            engine,
            ledger,
            notifier,
            history: Arc::new(CycleHistory::with_capacity(DEFAULT_HISTORY_CAPACITY)),
            interval,
        }
    }

    pub fn with_history(mut self, history: Arc<CycleHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> Arc<CycleHistory> {
        self.history.clone()
    }

    pub fn ledger(&self) -> &BestPriceLedger {
        &self.ledger
    }

    /// Refuse to start when the ledger cannot be written or no source is
    /// usable; a loop in that state would fail every cycle.
    pub async fn preflight(self) -> Result<Self> {
        self.ledger.check_writable().await?;
        let engine = self.engine.prepare().await?;
        tracing::info!(
            route = %self.route.label(),
            sources = ?engine.chain().names(),
            ledger = %self.ledger.path().display(),
            "preflight ok"
        );
        Ok(Self { engine, ..self })
    }

    pub async fn run_cycle(&self, today: NaiveDate) -> CycleOutcome {
        let current = self.ledger.load().await;
        match current.price() {
            Some(p) => {
                gauge!("fare_record_price_usd").set(p);
                tracing::info!(record = p, "current all-time best");
            }
            None => tracing::info!("no record yet"),
        }

        let report = self.engine.discover(&self.window, today).await;
        let outcome = self.settle(&report, &current).await;

        counter!("fare_cycles_total").increment(1);
        gauge!("fare_last_cycle_ts").set(Utc::now().timestamp() as f64);
        self.log_cycle(&report, &outcome);

        self.history.push(CycleEntry {
            finished_at: Utc::now(),
            pairs_checked: report.pairs_checked,
            quotes_found: report.quotes_found,
            blocked: report.blocked,
            rate_limited: report.rate_limited,
            cycle_best: report.best.as_ref().map(|q| q.price),
            record_price: match &outcome {
                CycleOutcome::NewRecord { record, .. } => Some(record.price),
                _ => current.price(),
            },
            outcome: outcome.label(),
        });
        outcome
    }

    async fn settle(&self, report: &DiscoveryReport, current: &LedgerState) -> CycleOutcome {
        let Some(best) = report.best.clone() else {
            return CycleOutcome::NoCandidates;
        };
        gauge!("fare_cycle_best_price_usd").set(best.price);

        if !is_new_record(&best, current) {
            return CycleOutcome::NotImproved {
                record_price: current.price().unwrap_or(best.price),
                best,
            };
        }

        let record = match self.ledger.commit(&best).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(price = best.price, error = ?e, "failed to persist new record");
                return CycleOutcome::CommitFailed { best };
            }
        };
        counter!("fare_new_records_total").increment(1);
        gauge!("fare_record_price_usd").set(record.price);

        let alert = RecordAlert {
            route: self.route.clone(),
            record: record.clone(),
            previous_price: current.price(),
        };
        let notified = self.notifier.notify(&alert).await;

        CycleOutcome::NewRecord {
            record,
            previous_price: current.price(),
            notified,
        }
    }

    fn log_cycle(&self, report: &DiscoveryReport, outcome: &CycleOutcome) {
        let cycle_best = report.best.as_ref().map(|q| q.price);
        match outcome {
            CycleOutcome::NoCandidates => tracing::info!(
                pairs = report.pairs_checked,
                skipped = report.skipped,
                blocked = report.blocked,
                rate_limited = report.rate_limited,
                "cycle done: no flights found in the date range"
            ),
            CycleOutcome::NotImproved { best, record_price } => tracing::info!(
                pairs = report.pairs_checked,
                skipped = report.skipped,
                quotes = report.quotes_found,
                best = best.price,
                record = record_price,
                "cycle done: cheapest this round is not better than the all-time best"
            ),
            CycleOutcome::NewRecord {
                record,
                previous_price,
                notified,
            } => tracing::info!(
                pairs = report.pairs_checked,
                quotes = report.quotes_found,
                price = record.price,
                previous = ?previous_price,
                departure = %record.departure_date,
                return_date = %record.return_date,
                notified = notified,
                "cycle done: NEW ALL-TIME BEST PRICE"
            ),
            CycleOutcome::CommitFailed { best } => tracing::warn!(
                pairs = report.pairs_checked,
                best = best.price,
                ?cycle_best,
                "cycle done: new best found but not saved, will retry next cycle"
            ),
        }
    }

    /// Run cycles until `shutdown` flips to `true`. A cycle in progress
    /// always completes first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let today = Local::now().date_naive();
            self.run_cycle(today).await;

            if *shutdown.borrow() {
                break;
            }
            tracing::info!(
                minutes = self.interval.as_secs() / 60,
                "waiting until the next check"
            );
            if wait_or_shutdown(self.interval, &mut shutdown).await {
                break;
            }
        }
        tracing::info!("scheduler stopped");
    }
}

/// Sleep for `interval`; returns `true` if shutdown was requested meanwhile.
async fn wait_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can ask us to stop, just finish waiting.
                    (&mut sleep).await;
                    return false;
                }
                if *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
