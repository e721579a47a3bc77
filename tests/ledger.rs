// tests/ledger.rs
mod common;

use std::fs;

use common::date;
use fare_watch::route::Route;
use fare_watch::{BestPriceLedger, LedgerState, PriceQuote};

fn quote(price: f64) -> PriceQuote {
    PriceQuote::new(price, date(2025, 7, 4), date(2025, 7, 18), "amadeus")
        .unwrap()
        .with_airline("UA")
        .with_duration("4h 5m")
}

#[tokio::test]
async fn missing_file_is_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = BestPriceLedger::new(dir.path().join("best_price.json"));
    assert_eq!(ledger.load().await, LedgerState::NoRecord);
}

#[tokio::test]
async fn commit_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = BestPriceLedger::new(dir.path().join("state").join("best_price.json"))
        .with_route(Route::new("AUS", "SFO").unwrap());
    let q = quote(287.43);

    let committed = ledger.commit(&q).await.unwrap();
    let LedgerState::Recorded(loaded) = ledger.load().await else {
        panic!("expected a record");
    };

    assert_eq!(loaded, committed);
    assert_eq!(loaded.price, q.price);
    assert_eq!(loaded.departure_date, q.departure_date);
    assert_eq!(loaded.return_date, q.return_date);
    assert_eq!(loaded.airline.as_deref(), Some("UA"));
    assert_eq!(
        loaded.booking_link.as_deref(),
        Some("https://www.google.com/flights?hl=en#flt=AUS.SFO.2025-07-04*SFO.AUS.2025-07-18")
    );
}

#[tokio::test]
async fn commit_leaves_no_temp_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best_price.json");
    let ledger = BestPriceLedger::new(&path);

    ledger.commit(&quote(300.0)).await.unwrap();
    ledger.commit(&quote(250.0)).await.unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["best_price.json".to_string()]);
    assert_eq!(ledger.load().await.price(), Some(250.0));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"departureDate\": \"2025-07-04\""), "{raw}");
}

#[tokio::test]
async fn corrupt_or_sentinel_files_read_as_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best_price.json");
    let ledger = BestPriceLedger::new(&path);

    for raw in [
        "{ not json",
        "",
        // What a float-infinity sentinel serializes to.
        r#"{"price": Infinity}"#,
        r#"{"price": -5, "departureDate": "2025-01-01", "returnDate": "2025-01-08"}"#,
        r#"{"price": 200, "departureDate": "2025-01-08", "returnDate": "2025-01-01"}"#,
    ] {
        fs::write(&path, raw).unwrap();
        assert_eq!(ledger.load().await, LedgerState::NoRecord, "{raw:?}");
    }
}

#[tokio::test]
async fn unwritable_location_fails_checks_and_commit() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "file").unwrap();
    let ledger = BestPriceLedger::new(blocker.join("best_price.json"));

    assert!(ledger.check_writable().await.is_err());
    assert!(ledger.commit(&quote(100.0)).await.is_err());
    assert_eq!(ledger.load().await, LedgerState::NoRecord);
}

#[tokio::test]
async fn check_writable_cleans_up_its_probe() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = BestPriceLedger::new(dir.path().join("nested").join("best.json"));

    ledger.check_writable().await.unwrap();

    assert!(dir.path().join("nested").is_dir());
    assert_eq!(fs::read_dir(dir.path().join("nested")).unwrap().count(), 0);
}
