// src/sources/kayak.rs
use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::StatusCode;

use super::QuoteSource;
use crate::config::WatchConfig;
use crate::quote::{parse_price, PriceQuote, QuoteOutcome};
use crate::route::Route;

pub const SOURCE_NAME: &str = "kayak";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Only the top of the price-sorted list is considered.
const MAX_RESULTS: usize = 5;

/// Scrapes the price-sorted, nonstop-only results page for a date pair.
pub struct KayakSource {
    http: reqwest::Client,
    base_url: String,
    route: Route,
}

impl KayakSource {
    pub fn new(route: Route, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building kayak http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            route,
        })
    }

    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        Self::new(cfg.route()?, cfg.kayak_base_url.clone(), cfg.lookup_timeout())
    }

    fn results_url(&self, departure: NaiveDate, return_date: NaiveDate) -> String {
        format!(
            "{}/flights/{}-{}/{}/{}?sort=price_a&stops=0",
            self.base_url,
            self.route.origin,
            self.route.destination,
            departure.format("%Y-%m-%d"),
            return_date.format("%Y-%m-%d"),
        )
    }

    async fn fetch(&self, departure: NaiveDate, return_date: NaiveDate) -> Result<QuoteOutcome> {
        let resp = self
            .http
            .get(self.results_url(departure, return_date))
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .context("kayak http get()")?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Ok(QuoteOutcome::RateLimited),
            StatusCode::FORBIDDEN => return Ok(QuoteOutcome::Blocked),
            _ => {}
        }
        let body = resp
            .error_for_status()
            .context("kayak non-2xx")?
            .text()
            .await
            .context("kayak http .text()")?;
        Ok(extract_quote(&body, departure, return_date))
    }
}

#[async_trait]
impl QuoteSource for KayakSource {
    async fn quote(&self, departure: NaiveDate, return_date: NaiveDate) -> QuoteOutcome {
        match self.fetch(departure, return_date).await {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(source = SOURCE_NAME, %departure, %return_date, error = ?e, "lookup failed");
                QuoteOutcome::Absent
            }
        }
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Read the cheapest of the first few listed prices from a results page.
/// A page that lists prices is never treated as blocked.
pub fn extract_quote(html: &str, departure: NaiveDate, return_date: NaiveDate) -> QuoteOutcome {
    static RE_PRICE: OnceCell<Regex> = OnceCell::new();
    let re_price = RE_PRICE.get_or_init(|| {
        Regex::new(r#"(?is)class="[^"]*price-text[^"]*"[^>]*>(.*?)</"#).unwrap()
    });

    let best = re_price
        .captures_iter(html)
        .take(MAX_RESULTS)
        .filter_map(|c| c.get(1).and_then(|m| parse_price(&strip_tags(m.as_str()))))
        .fold(None, |acc: Option<f64>, p| match acc {
            Some(b) if b <= p => Some(b),
            _ => Some(p),
        });

    let Some(price) = best else {
        if looks_blocked(html) {
            tracing::warn!(source = SOURCE_NAME, "security check detected");
            return QuoteOutcome::Blocked;
        }
        return QuoteOutcome::Absent;
    };
    match PriceQuote::new(price, departure, return_date, SOURCE_NAME) {
        Ok(q) => QuoteOutcome::Found(q.with_airline(airline_label(html))),
        Err(_) => QuoteOutcome::Absent,
    }
}

/// The bot interstitial. Result pages load captcha scripts too, so only the
/// interstitial's own wording counts.
fn looks_blocked(html: &str) -> bool {
    html.to_ascii_lowercase().contains("security check")
}

fn strip_tags(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    re.replace_all(s, "").to_string()
}

/// One carrier name across the listed results, "Multiple" for several,
/// empty (→ "Unknown") for none.
fn airline_label(html: &str) -> String {
    static RE_AIRLINE: OnceCell<Regex> = OnceCell::new();
    let re = RE_AIRLINE.get_or_init(|| {
        Regex::new(r#"(?is)class="[^"]*airline-names?[^"]*"[^>]*>(.*?)</"#).unwrap()
    });
    let names: BTreeSet<String> = re
        .captures_iter(html)
        .take(MAX_RESULTS)
        .filter_map(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(&strip_tags(m.as_str())).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    match names.len() {
        0 => String::new(),
        1 => names.into_iter().next().unwrap_or_default(),
        _ => "Multiple".to_string(),
    }
}
