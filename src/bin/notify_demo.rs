//! Demo that pushes one sample record alert through the configured sinks
//! (SMTP settings from the env; logs only when email is not configured).

use anyhow::Result;
use chrono::{Days, Local, Utc};
use fare_watch::{BestPriceRecord, NotifierMux, RecordAlert, WatchConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = WatchConfig::load_default()?;
    let route = cfg.route()?;
    let mux = NotifierMux::from_env();

    let today = Local::now().date_naive();
    let departure = today.checked_add_days(Days::new(7)).unwrap_or(today);
    let stay = cfg.trip_policy().shortest().unwrap_or(1);
    let return_date = departure
        .checked_add_days(Days::new(u64::from(stay)))
        .unwrap_or(departure);

    let alert = RecordAlert {
        record: BestPriceRecord {
            price: 199.0,
            departure_date: departure,
            return_date,
            booking_link: Some(route.google_flights_link(departure, return_date)),
            airline: Some("Demo Air".into()),
            duration: Some("3h 40m".into()),
            source: Some("notify-demo".into()),
            recorded_at: Some(Utc::now()),
        },
        route,
        previous_price: Some(245.5),
    };

    let delivered = mux.notify(&alert).await;
    println!("notify-demo done ({delivered} sink(s) accepted the alert)");
    Ok(())
}
