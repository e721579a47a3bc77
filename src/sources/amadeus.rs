//! Flight-offers API source (Amadeus self-service shape).
//! OAuth2 client-credentials token, cached until shortly before expiry.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::QuoteSource;
use crate::config::WatchConfig;
use crate::quote::{PriceQuote, QuoteOutcome};
use crate::route::Route;

pub const SOURCE_NAME: &str = "amadeus";

/// Refresh this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Clone)]
pub struct AmadeusCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl AmadeusCredentials {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("AMADEUS_API_KEY").context("AMADEUS_API_KEY missing")?;
        let api_secret =
            std::env::var("AMADEUS_API_SECRET").context("AMADEUS_API_SECRET missing")?;
        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct AmadeusSource {
    http: reqwest::Client,
    base_url: String,
    route: Route,
    credentials: Option<AmadeusCredentials>,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusSource {
    pub fn new(
        route: Route,
        base_url: impl Into<String>,
        credentials: Option<AmadeusCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fare-watch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building amadeus http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            route,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Missing credentials are not an error here; `prepare` reports them.
    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        Self::new(
            cfg.route()?,
            cfg.amadeus_base_url.clone(),
            AmadeusCredentials::from_env().ok(),
            cfg.lookup_timeout(),
        )
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(t) = guard.as_ref() {
            if t.expires_at > Instant::now() {
                return Ok(t.value.clone());
            }
        }

        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("AMADEUS_API_KEY / AMADEUS_API_SECRET not set"))?;

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: String,
            #[serde(default = "default_expires_in")]
            expires_in: u64,
        }

        let resp = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", creds.api_key.as_str()),
                ("client_secret", creds.api_secret.as_str()),
            ])
            .send()
            .await
            .context("amadeus token request")?
            .error_for_status()
            .context("amadeus token non-2xx")?;
        let tok: TokenResp = resp.json().await.context("parse amadeus token json")?;

        let ttl = tok.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS).max(1);
        *guard = Some(CachedToken {
            value: tok.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        tracing::info!(source = SOURCE_NAME, ttl_secs = ttl, "access token retrieved");
        Ok(tok.access_token)
    }

    async fn fetch(&self, departure: NaiveDate, return_date: NaiveDate) -> Result<QuoteOutcome> {
        let token = self.access_token().await?;
        let dep = departure.format("%Y-%m-%d").to_string();
        let ret = return_date.format("%Y-%m-%d").to_string();

        let resp = self
            .http
            .get(format!("{}/v2/shopping/flight-offers", self.base_url))
            .bearer_auth(&token)
            .query(&[
                ("originLocationCode", self.route.origin.as_str()),
                ("destinationLocationCode", self.route.destination.as_str()),
                ("departureDate", dep.as_str()),
                ("returnDate", ret.as_str()),
                ("adults", "1"),
                ("nonStop", "true"),
                ("currencyCode", "USD"),
                ("max", "5"),
            ])
            .send()
            .await
            .context("flight-offers request")?;

        match resp.status() {
            // 400 usually means no flights for these dates.
            StatusCode::BAD_REQUEST => return Ok(QuoteOutcome::Absent),
            StatusCode::TOO_MANY_REQUESTS => return Ok(QuoteOutcome::RateLimited),
            StatusCode::FORBIDDEN => return Ok(QuoteOutcome::Blocked),
            StatusCode::UNAUTHORIZED => {
                *self.token.lock().await = None;
                tracing::warn!(source = SOURCE_NAME, "token rejected, will refresh");
                return Ok(QuoteOutcome::Absent);
            }
            _ => {}
        }

        let body: OffersResponse = resp
            .error_for_status()
            .context("flight-offers non-2xx")?
            .json()
            .await
            .context("parse flight-offers json")?;
        Ok(cheapest_offer(&body, departure, return_date))
    }
}

fn default_expires_in() -> u64 {
    1799
}

#[async_trait]
impl QuoteSource for AmadeusSource {
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

    async fn prepare(&self) -> Result<()> {
        self.access_token().await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<Offer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Offer {
    price: OfferPrice,
    #[serde(default)]
    validating_airline_codes: Vec<String>,
    #[serde(default)]
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Deserialize)]
struct OfferPrice {
    total: String,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    duration: Option<String>,
}

fn cheapest_offer(body: &OffersResponse, departure: NaiveDate, return_date: NaiveDate) -> QuoteOutcome {
    let mut best: Option<(f64, &Offer)> = None;
    for offer in &body.data {
        let Ok(price) = offer.price.total.trim().parse::<f64>() else {
            continue;
        };
        if !price.is_finite() || price < 0.0 {
            continue;
        }
        if best.map_or(true, |(p, _)| price < p) {
            best = Some((price, offer));
        }
    }

    let Some((price, offer)) = best else {
        return QuoteOutcome::Absent;
    };
    let Ok(q) = PriceQuote::new(price, departure, return_date, SOURCE_NAME) else {
        return QuoteOutcome::Absent;
    };
    let airline = offer
        .validating_airline_codes
        .first()
        .cloned()
        .unwrap_or_default();
    let duration = offer
        .itineraries
        .first()
        .and_then(|it| it.duration.as_deref())
        .map(humanize_iso_duration)
        .unwrap_or_default();
    QuoteOutcome::Found(q.with_airline(airline).with_duration(duration))
}

/// "PT3H45M" → "3h 45m". Unparseable input is returned unchanged.
fn humanize_iso_duration(s: &str) -> String {
    static RE_DUR: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE_DUR.get_or_init(|| {
        regex::Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?)?$").unwrap()
    });
    let Some(caps) = re.captures(s.trim()) else {
        return s.to_string();
    };
    let parts: Vec<String> = [(1, "d"), (2, "h"), (3, "m")]
        .iter()
        .filter_map(|(i, unit)| caps.get(*i).map(|m| format!("{}{unit}", m.as_str())))
        .collect();
    if parts.is_empty() {
        s.to_string()
    } else {
        parts.join(" ")
    }
}
