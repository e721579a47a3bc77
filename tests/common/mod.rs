// tests/common/mod.rs
// Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use fare_watch::notify::{NotificationSink, RecordAlert};
use fare_watch::sources::DynQuoteSource;
use fare_watch::{DiscoveryEngine, FallbackChain, PriceQuote, QuoteOutcome, QuoteSource};

/// What a scripted source answers on its next call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Price(f64),
    Absent,
    Blocked,
    RateLimited,
    /// Never answers within any reasonable lookup timeout.
    Hang,
}

pub type CallLog = Arc<Mutex<Vec<(&'static str, NaiveDate, NaiveDate)>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Answers from a fixed script, one step per call; `Absent` once exhausted.
pub struct ScriptedSource {
    name: &'static str,
    steps: Mutex<VecDeque<Step>>,
    log: CallLog,
    fail_prepare: bool,
}

impl ScriptedSource {
    pub fn new(name: &'static str, steps: Vec<Step>, log: CallLog) -> Self {
        Self {
            name,
            steps: Mutex::new(steps.into()),
            log,
            fail_prepare: false,
        }
    }

    pub fn prices(name: &'static str, prices: &[f64], log: CallLog) -> Self {
        Self::new(name, prices.iter().map(|p| Step::Price(*p)).collect(), log)
    }

    pub fn failing_prepare(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn shared(self) -> DynQuoteSource {
        Arc::new(self)
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn quote(&self, departure: NaiveDate, return_date: NaiveDate) -> QuoteOutcome {
        self.log.lock().push((self.name, departure, return_date));
        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Price(p)) => QuoteOutcome::Found(
                PriceQuote::new(p, departure, return_date, self.name).expect("valid scripted quote"),
            ),
            Some(Step::Absent) | None => QuoteOutcome::Absent,
            Some(Step::Blocked) => QuoteOutcome::Blocked,
            Some(Step::RateLimited) => QuoteOutcome::RateLimited,
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                QuoteOutcome::Absent
            }
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }

    async fn prepare(&self) -> anyhow::Result<()> {
        if self.fail_prepare {
            anyhow::bail!("{} credentials missing", self.name);
        }
        Ok(())
    }
}

/// Collects every alert it is handed; optionally fails each delivery.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub alerts: Arc<Mutex<Vec<RecordAlert>>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, alert: &RecordAlert) -> anyhow::Result<()> {
        self.alerts.lock().push(alert.clone());
        if self.fail {
            anyhow::bail!("transport down");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Zero politeness delay, generous timeout.
pub fn engine(sources: Vec<DynQuoteSource>) -> DiscoveryEngine {
    DiscoveryEngine::new(
        FallbackChain::new(sources, Duration::from_secs(5)),
        Duration::ZERO,
    )
}
