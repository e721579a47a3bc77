// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod discovery;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod quote;
pub mod route;
pub mod scheduler;
pub mod sources;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::config::WatchConfig;
pub use crate::discovery::{DiscoveryEngine, DiscoveryReport};
pub use crate::ledger::{is_new_record, BestPriceLedger, BestPriceRecord, LedgerState};
pub use crate::notify::{NotificationSink, NotifierMux, RecordAlert};
pub use crate::quote::{PriceQuote, QuoteOutcome};
pub use crate::scheduler::{CycleOutcome, Scheduler};
pub use crate::sources::{FallbackChain, QuoteSource};
pub use crate::window::{SearchWindow, TripLength};

use std::sync::Arc;

use anyhow::Result;

use crate::history::CycleHistory;

/// Wire config into a ready-to-preflight scheduler: sources in priority
/// order, ledger with booking links for the route, the given notifier.
pub fn build_scheduler(cfg: &WatchConfig, notifier: NotifierMux) -> Result<Scheduler> {
    let route = cfg.route()?;
    let chain = FallbackChain::new(sources::build_sources(cfg)?, cfg.lookup_timeout());
    let engine = DiscoveryEngine::new(chain, cfg.politeness_delay());
    let ledger = BestPriceLedger::new(cfg.ledger_path.clone()).with_route(route.clone());

    Ok(Scheduler::new(
        route,
        cfg.window(),
        engine,
        ledger,
        notifier,
        cfg.check_interval(),
    )
    .with_history(Arc::new(CycleHistory::with_capacity(cfg.history_capacity))))
}
