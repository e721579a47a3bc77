// src/config/mod.rs
use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::route::Route;
use crate::window::{SearchWindow, TripLength};

pub const ENV_CONFIG_PATH: &str = "FARE_WATCH_CONFIG";
pub const ENV_CHECK_INTERVAL: &str = "CHECK_INTERVAL_SECS";
pub const ENV_LEDGER_PATH: &str = "FARE_WATCH_LEDGER_PATH";
pub const ENV_SOURCES: &str = "FARE_WATCH_SOURCES";

const DEFAULT_TOML_PATH: &str = "config/fare_watch.toml";
const DEFAULT_JSON_PATH: &str = "config/fare_watch.json";
const DEFAULT_TRIP_DAYS: u32 = 14;

/// Watch settings. Every key is optional in the file; missing keys take the
/// defaults below. Secrets never live here (see the adapters' `from_env`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub origin_code: String,
    pub destination_code: String,
    pub search_days: u32,
    /// Fixed stay length in days. Mutually exclusive with `trip_length_range`.
    pub trip_length: Option<u32>,
    /// Inclusive `[min, max]` sweep of stay lengths.
    pub trip_length_range: Option<[u32; 2]>,
    pub check_interval_secs: u64,
    pub ledger_path: PathBuf,
    pub politeness_delay_ms: u64,
    pub lookup_timeout_secs: u64,
    /// Source names in priority order: "amadeus", "kayak".
    pub sources: Vec<String>,
    pub amadeus_base_url: String,
    pub kayak_base_url: String,
    /// e.g. "127.0.0.1:9187"; unset disables the status/metrics listener.
    pub metrics_addr: Option<String>,
    pub history_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            origin_code: "AUS".to_string(),
            destination_code: "SFO".to_string(),
            search_days: 14,
            trip_length: None,
            trip_length_range: None,
            check_interval_secs: 3600,
            ledger_path: PathBuf::from("state/best_price.json"),
            politeness_delay_ms: 3000,
            lookup_timeout_secs: 30,
            sources: vec!["amadeus".to_string()],
            amadeus_base_url: "https://test.api.amadeus.com".to_string(),
            kayak_base_url: "https://www.kayak.com".to_string(),
            metrics_addr: None,
            history_capacity: 500,
        }
    }
}

impl WatchConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading watch config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing watch config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $FARE_WATCH_CONFIG
    /// 2) config/fare_watch.toml
    /// 3) config/fare_watch.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_CHECK_INTERVAL) {
            self.check_interval_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CHECK_INTERVAL} must be an integer, got {v:?}"))?;
        }
        if let Ok(v) = std::env::var(ENV_LEDGER_PATH) {
            if !v.trim().is_empty() {
                self.ledger_path = PathBuf::from(v.trim());
            }
        }
        if let Ok(v) = std::env::var(ENV_SOURCES) {
            let list: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !list.is_empty() {
                self.sources = list;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.route()?;
        ensure!(
            !(self.trip_length.is_some() && self.trip_length_range.is_some()),
            "set either trip_length or trip_length_range, not both"
        );
        if let Some([min, max]) = self.trip_length_range {
            ensure!(min <= max, "trip_length_range min {min} exceeds max {max}");
        }
        ensure!(self.check_interval_secs > 0, "check_interval_secs must be > 0");
        ensure!(self.lookup_timeout_secs > 0, "lookup_timeout_secs must be > 0");
        if self.sources.is_empty() {
            bail!("at least one quote source must be configured");
        }
        if self.search_days == 0 {
            tracing::warn!("search_days is 0: every cycle will have no candidates");
        }
        Ok(())
    }

    pub fn route(&self) -> Result<Route> {
        Route::new(&self.origin_code, &self.destination_code)
    }

    pub fn trip_policy(&self) -> TripLength {
        match (self.trip_length, self.trip_length_range) {
            (_, Some([min, max])) => TripLength::Range { min, max },
            (Some(n), None) => TripLength::Fixed(n),
            (None, None) => TripLength::Fixed(DEFAULT_TRIP_DAYS),
        }
    }

    pub fn window(&self) -> SearchWindow {
        SearchWindow::new(self.search_days, self.trip_policy())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatchConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        // Unknown extension: JSON if it looks like an object, else TOML.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_config("", "toml").unwrap();
        assert_eq!(cfg, WatchConfig::default());
        assert_eq!(cfg.trip_policy(), TripLength::Fixed(14));
    }

    #[test]
    fn range_policy_from_toml() {
        let cfg = parse_config(
            r#"
origin_code = "aus"
destination_code = "sfo"
trip_length_range = [2, 7]
sources = ["kayak", "amadeus"]
"#,
            "toml",
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.trip_policy(), TripLength::Range { min: 2, max: 7 });
        assert_eq!(cfg.trip_policy().shortest(), Some(2));
        assert_eq!(cfg.route().unwrap().origin, "AUS");
        assert_eq!(cfg.sources, vec!["kayak".to_string(), "amadeus".to_string()]);
    }

    #[test]
    fn fixed_and_range_together_is_rejected() {
        let cfg = parse_config(r#"{"trip_length": 14, "trip_length_range": [2, 7]}"#, "json")
            .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = WatchConfig {
            check_interval_secs: 0,
            ..WatchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
