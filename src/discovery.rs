//! # Discovery Engine
//! Enumerate the date space, look each pair up through the fallback chain,
//! reduce successful quotes to the cheapest.
//!
//! Lookups are strictly sequential; source failures never stop the sweep.

use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::quote::{PriceQuote, QuoteOutcome};
use crate::sources::{CycleState, FallbackChain};
use crate::window::{self, SearchWindow};

/// What one discovery pass saw. `best` is `None` when no pair produced a
/// quote (including an empty date space).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub best: Option<PriceQuote>,
    /// Pairs at least one source was asked about.
    pub pairs_checked: usize,
    pub quotes_found: usize,
    pub absent: usize,
    pub blocked: usize,
    pub rate_limited: usize,
    /// Pairs left unasked because every source was benched.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct DiscoveryEngine {
    chain: FallbackChain,
    politeness_delay: Duration,
}

impl DiscoveryEngine {
    pub fn new(chain: FallbackChain, politeness_delay: Duration) -> Self {
        Self {
            chain,
            politeness_delay,
        }
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Run every source's setup check; see [`FallbackChain::prepare`].
    pub async fn prepare(self) -> Result<Self> {
        Ok(Self {
            chain: self.chain.prepare().await?,
            politeness_delay: self.politeness_delay,
        })
    }

    pub async fn discover(&self, window: &SearchWindow, today: NaiveDate) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut state = CycleState::default();
        let delay = self.politeness_delay;

        for (departure, return_date) in window::generate(window, today) {
            if self.chain.exhausted(&state) {
                report.skipped += 1;
                continue;
            }
            report.pairs_checked += 1;

            let outcome = self
                .chain
                .lookup(departure, return_date, &mut state, || async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                })
                .await;

            match outcome {
                QuoteOutcome::Found(q) => {
                    report.quotes_found += 1;
                    tracing::debug!(
                        source = %q.source,
                        price = q.price,
                        %departure,
                        %return_date,
                        "quote"
                    );
                    // Strictly lower only: the earliest pair keeps a tie.
                    if report.best.as_ref().map_or(true, |b| q.price < b.price) {
                        report.best = Some(q);
                    }
                }
                QuoteOutcome::Absent => report.absent += 1,
                QuoteOutcome::Blocked => report.blocked += 1,
                QuoteOutcome::RateLimited => report.rate_limited += 1,
            }
        }

        if report.skipped > 0 {
            tracing::warn!(
                skipped = report.skipped,
                "every source benched, remaining pairs not checked"
            );
        } else if report.pairs_checked == 0 {
            tracing::info!("date space is empty, no candidates this cycle");
        }
        report
    }
}
