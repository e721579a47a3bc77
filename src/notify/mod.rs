// src/notify/mod.rs
pub mod email;

use anyhow::Result;
use metrics::counter;
use serde::Serialize;

use crate::ledger::BestPriceRecord;
use crate::route::Route;

/// A freshly committed record low, plus the record it replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordAlert {
    pub route: Route,
    pub record: BestPriceRecord,
    /// `None` when this is the first record ever stored.
    pub previous_price: Option<f64>,
}

impl RecordAlert {
    pub fn savings(&self) -> Option<f64> {
        self.previous_price.map(|p| p - self.record.price)
    }

    pub fn trip_days(&self) -> i64 {
        (self.record.return_date - self.record.departure_date).num_days()
    }

    pub fn subject(&self) -> String {
        format!(
            "New cheapest flight {}: ${:.2}",
            self.route.label(),
            self.record.price
        )
    }

    pub fn body(&self) -> String {
        let r = &self.record;
        let savings = match self.savings() {
            Some(s) => format!("${s:.2} below the previous best (${:.2})", r.price + s),
            None => "first record for this route".to_string(),
        };
        let label = |v: &Option<String>| v.clone().unwrap_or_else(|| "Unknown".to_string());
        let google = r
            .booking_link
            .clone()
            .unwrap_or_else(|| self.route.google_flights_link(r.departure_date, r.return_date));

        format!(
            "A new cheapest round trip has been found for {route}.\n\
             \n\
             Price: ${price:.2}\n\
             Savings: {savings}\n\
             \n\
             Departure date: {dep}\n\
             Return date: {ret}\n\
             Trip length: {days} days\n\
             Airline: {airline}\n\
             Duration: {duration}\n\
             Source: {source}\n\
             \n\
             Google Flights: {google}\n\
             Kayak: {kayak}\n\
             \n\
             Prices change quickly; verify on the site before booking.\n",
            route = self.route.label(),
            price = r.price,
            dep = r.departure_date,
            ret = r.return_date,
            days = self.trip_days(),
            airline = label(&r.airline),
            duration = label(&r.duration),
            source = label(&r.source),
            kayak = self.route.kayak_link(r.departure_date, r.return_date),
        )
    }
}

/// Anything that can announce a new record (email, chat webhook, ...).
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, alert: &RecordAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans an alert out to every configured sink. Failures are logged and
/// swallowed; one broken channel never affects the others or the caller.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// Email is enabled when the SMTP settings are present in the env.
    pub fn from_env() -> Self {
        let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
        match email::EmailSender::from_env() {
            Ok(s) => sinks.push(Box::new(s)),
            Err(e) => tracing::warn!(error = ?e, "email notifications disabled"),
        }
        Self { sinks }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns how many sinks accepted the alert.
    pub async fn notify(&self, alert: &RecordAlert) -> usize {
        if self.sinks.is_empty() {
            tracing::info!(price = alert.record.price, "no notification channel configured");
            return 0;
        }
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.notify(alert).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!(sink = sink.name(), price = alert.record.price, "record alert sent");
                }
                Err(e) => {
                    counter!("fare_notify_errors_total", "sink" => sink.name()).increment(1);
                    tracing::warn!(sink = sink.name(), error = ?e, "record alert failed");
                }
            }
        }
        delivered
    }
}
