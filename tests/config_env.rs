// tests/config_env.rs
use std::time::Duration;
use std::{env, fs};

use fare_watch::config::{ENV_CHECK_INTERVAL, ENV_CONFIG_PATH, ENV_LEDGER_PATH, ENV_SOURCES};
use fare_watch::{TripLength, WatchConfig};

fn clear_env() {
    for k in [ENV_CONFIG_PATH, ENV_CHECK_INTERVAL, ENV_LEDGER_PATH, ENV_SOURCES] {
        env::remove_var(k);
    }
}

#[test]
fn toml_and_json_files_load() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("watch.toml");
    fs::write(
        &p_toml,
        r#"
origin_code = "lax"
destination_code = "JFK"
search_days = 30
trip_length_range = [3, 5]
politeness_delay_ms = 500
"#,
    )
    .unwrap();
    let cfg = WatchConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.route().unwrap().label(), "LAX → JFK");
    assert_eq!(cfg.window().pair_count(), 30 * 3);
    assert_eq!(cfg.politeness_delay(), Duration::from_millis(500));
    // Untouched keys keep their defaults.
    assert_eq!(cfg.check_interval(), Duration::from_secs(3600));

    let p_json = dir.path().join("watch.json");
    fs::write(&p_json, r#"{"trip_length": 10, "sources": ["kayak"]}"#).unwrap();
    let cfg = WatchConfig::load_from(&p_json).unwrap();
    assert_eq!(cfg.trip_policy(), TripLength::Fixed(10));
    assert_eq!(cfg.sources, vec!["kayak".to_string()]);
}

#[test]
fn invalid_route_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.toml");
    fs::write(&p, r#"origin_code = "AUS"
destination_code = "AUS""#)
        .unwrap();
    assert!(WatchConfig::load_from(&p).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing on disk: built-in defaults.
    let cfg = WatchConfig::load_default().unwrap();
    assert_eq!(cfg, WatchConfig::default());

    // 2) Fallback TOML in ./config/
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config").join("fare_watch.toml"),
        "search_days = 7\n",
    )
    .unwrap();
    assert_eq!(WatchConfig::load_default().unwrap().search_days, 7);

    // 3) Explicit path wins over the fallback.
    let p_env = tmp.path().join("explicit.json");
    fs::write(&p_env, r#"{"search_days": 3}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(WatchConfig::load_default().unwrap().search_days, 3);

    // 4) Explicit path that does not exist is an error, not a silent default.
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(WatchConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_on_top_of_the_file() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    env::set_var(ENV_CHECK_INTERVAL, "90");
    env::set_var(ENV_LEDGER_PATH, "/var/lib/fare-watch/best.json");
    env::set_var(ENV_SOURCES, " Kayak, ,amadeus ");
    let cfg = WatchConfig::load_default().unwrap();
    assert_eq!(cfg.check_interval(), Duration::from_secs(90));
    assert_eq!(
        cfg.ledger_path,
        std::path::PathBuf::from("/var/lib/fare-watch/best.json")
    );
    assert_eq!(cfg.sources, vec!["kayak".to_string(), "amadeus".to_string()]);

    env::set_var(ENV_CHECK_INTERVAL, "soon");
    assert!(WatchConfig::load_default().is_err());

    env::set_var(ENV_CHECK_INTERVAL, "0");
    assert!(WatchConfig::load_default().is_err(), "zero interval must be rejected");

    clear_env();
    env::set_current_dir(&old).unwrap();
}
