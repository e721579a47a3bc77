// src/sources/mod.rs
pub mod amadeus;
pub mod kayak;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};

use crate::config::WatchConfig;
use crate::quote::QuoteOutcome;

/// A pluggable price lookup. Implementations must absorb their own transport
/// and parse failures (reporting `Absent`) instead of returning errors.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, departure: NaiveDate, return_date: NaiveDate) -> QuoteOutcome;

    fn name(&self) -> &'static str;

    /// One-off setup check run before the scheduler starts (credentials,
    /// token exchange). An error drops the source from the chain.
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }
}

pub type DynQuoteSource = Arc<dyn QuoteSource>;

/// Build the sources named in `cfg.sources`, in priority order.
pub fn build_sources(cfg: &WatchConfig) -> Result<Vec<DynQuoteSource>> {
    let mut out: Vec<DynQuoteSource> = Vec::with_capacity(cfg.sources.len());
    for name in &cfg.sources {
        match name.trim().to_ascii_lowercase().as_str() {
            "amadeus" => out.push(Arc::new(amadeus::AmadeusSource::from_config(cfg)?)),
            "kayak" => out.push(Arc::new(kayak::KayakSource::from_config(cfg)?)),
            other => bail!("unknown quote source in config: {other}"),
        }
    }
    Ok(out)
}

/// Ordered list of sources tried until one yields a usable quote.
#[derive(Clone)]
pub struct FallbackChain {
    sources: Vec<DynQuoteSource>,
    lookup_timeout: Duration,
}

/// Per-cycle bookkeeping: which sources are benched, and whether a lookup has
/// already happened (the politeness delay applies between lookups).
#[derive(Debug, Default)]
pub struct CycleState {
    benched: HashSet<usize>,
    lookups: usize,
}

impl CycleState {
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    pub fn benched(&self) -> usize {
        self.benched.len()
    }
}

impl FallbackChain {
    pub fn new(sources: Vec<DynQuoteSource>, lookup_timeout: Duration) -> Self {
        Self {
            sources,
            lookup_timeout,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// True once every source is benched for this cycle.
    pub fn exhausted(&self, state: &CycleState) -> bool {
        self.sources
            .iter()
            .enumerate()
            .all(|(idx, _)| state.benched.contains(&idx))
    }

    /// Drop sources whose `prepare` fails. Errors if none survive.
    pub async fn prepare(self) -> Result<Self> {
        let mut ready = Vec::with_capacity(self.sources.len());
        for src in self.sources {
            match src.prepare().await {
                Ok(()) => ready.push(src),
                Err(e) => {
                    tracing::warn!(source = src.name(), error = ?e, "quote source unavailable")
                }
            }
        }
        if ready.is_empty() {
            bail!("no quote source could be prepared (check credentials and the `sources` setting)");
        }
        Ok(Self {
            sources: ready,
            lookup_timeout: self.lookup_timeout,
        })
    }

    /// Look up one pair. The first `Found` wins; `Blocked`/`RateLimited`
    /// bench that source for the rest of the cycle and fall through.
    /// `before_lookup` runs ahead of every lookup after the first one in the
    /// cycle (the engine's politeness delay).
    pub async fn lookup<F, Fut>(
        &self,
        departure: NaiveDate,
        return_date: NaiveDate,
        state: &mut CycleState,
        mut before_lookup: F,
    ) -> QuoteOutcome
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut signal = QuoteOutcome::Absent;

        for (idx, src) in self.sources.iter().enumerate() {
            if state.benched.contains(&idx) {
                continue;
            }
            if state.lookups > 0 {
                before_lookup().await;
            }
            state.lookups += 1;

            let t0 = Instant::now();
            let outcome =
                match tokio::time::timeout(self.lookup_timeout, src.quote(departure, return_date))
                    .await
                {
                    Ok(o) => o,
                    Err(_) => {
                        tracing::warn!(
                            source = src.name(),
                            %departure,
                            %return_date,
                            timeout_ms = self.lookup_timeout.as_millis() as u64,
                            "lookup timed out"
                        );
                        QuoteOutcome::Absent
                    }
                };
            histogram!("fare_lookup_ms", "source" => src.name())
                .record(t0.elapsed().as_secs_f64() * 1_000.0);
            counter!("fare_lookups_total", "source" => src.name(), "outcome" => outcome.label())
                .increment(1);

            match outcome {
                QuoteOutcome::Found(q) => return QuoteOutcome::Found(q),
                QuoteOutcome::Absent => {
                    tracing::debug!(source = src.name(), %departure, %return_date, "no offer");
                }
                other => {
                    tracing::warn!(
                        source = src.name(),
                        outcome = other.label(),
                        "source benched until next cycle"
                    );
                    state.benched.insert(idx);
                    // Blocked outranks RateLimited when both are seen.
                    if signal != QuoteOutcome::Blocked {
                        signal = other;
                    }
                }
            }
        }

        signal
    }
}
