use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use pawmap_core::db::IN_MEMORY_PATH;
use pawmap_core::models::{RegionBounds, DEFAULT_MAX_IMAGE_BYTES};
use pawmap_core::sync::{DEFAULT_BROADCAST_CAPACITY, DEFAULT_STORE_TIMEOUT};
use pawmap_core::util::{is_http_url, normalize_text_option};
use thiserror::Error;

/// Room left in a request body for everything except the image
pub const BODY_HEADROOM_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub seed_sample_data: bool,
    pub region: RegionBounds,
    pub max_image_bytes: usize,
    pub store_timeout: Duration,
    pub broadcast_capacity: usize,
    pub sse_keep_alive: Duration,
    pub cors_allowed_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            db_path: "pawmap.db".to_string(),
            seed_sample_data: true,
            region: RegionBounds::HONG_KONG,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            sse_keep_alive: Duration::from_secs(15),
            cors_allowed_origin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Configuration for tests: in-memory store, no sample data
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            db_path: IN_MEMORY_PATH.to_string(),
            seed_sample_data: false,
            ..Self::default()
        }
    }

    /// Largest request body accepted by the API
    pub const fn body_limit(&self) -> usize {
        self.max_image_bytes + BODY_HEADROOM_BYTES
    }

    pub fn uses_in_memory_store(&self) -> bool {
        self.db_path == IN_MEMORY_PATH
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = value_or_default(&lookup, "PAWMAP_API_BIND_ADDR", &defaults.bind_addr);
        let db_path = value_or_default(&lookup, "PAWMAP_DB_PATH", &defaults.db_path);

        let seed_sample_data = match optional_trimmed(&lookup, "PAWMAP_SEED_SAMPLE_DATA") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::Invalid(
                    "PAWMAP_SEED_SAMPLE_DATA must be true/false, yes/no or 1/0".to_string(),
                )
            })?,
            None => defaults.seed_sample_data,
        };

        let region = RegionBounds {
            lat_min: parse_or_default(&lookup, "REGION_LAT_MIN", defaults.region.lat_min)?,
            lat_max: parse_or_default(&lookup, "REGION_LAT_MAX", defaults.region.lat_max)?,
            lng_min: parse_or_default(&lookup, "REGION_LNG_MIN", defaults.region.lng_min)?,
            lng_max: parse_or_default(&lookup, "REGION_LNG_MAX", defaults.region.lng_max)?,
        };
        validate_region(&region)?;

        let max_image_bytes = parse_in_range(
            &lookup,
            "MAX_IMAGE_BYTES",
            defaults.max_image_bytes,
            1024..=50 * 1024 * 1024,
        )?;

        let store_timeout_ms =
            parse_in_range(&lookup, "STORE_TIMEOUT_MS", 5_000_u64, 100..=60_000)?;

        let broadcast_capacity = parse_in_range(
            &lookup,
            "BROADCAST_CAPACITY",
            defaults.broadcast_capacity,
            16..=65_536,
        )?;

        let sse_keep_alive_secs = parse_in_range(&lookup, "SSE_KEEP_ALIVE_SECS", 15_u64, 5..=300)?;

        let cors_allowed_origin = optional_trimmed(&lookup, "CORS_ALLOWED_ORIGIN")
            .map(|origin| origin.trim_end_matches('/').to_string());
        if let Some(origin) = cors_allowed_origin.as_deref() {
            if !is_http_url(origin) {
                return Err(ConfigError::Invalid(
                    "CORS_ALLOWED_ORIGIN must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(Self {
            bind_addr,
            db_path,
            seed_sample_data,
            region,
            max_image_bytes,
            store_timeout: Duration::from_millis(store_timeout_ms),
            broadcast_capacity,
            sse_keep_alive: Duration::from_secs(sse_keep_alive_secs),
            cors_allowed_origin,
        })
    }
}

fn validate_region(region: &RegionBounds) -> Result<(), ConfigError> {
    let latitudes_valid = (-90.0..=90.0).contains(&region.lat_min)
        && (-90.0..=90.0).contains(&region.lat_max)
        && region.lat_min < region.lat_max;
    if !latitudes_valid {
        return Err(ConfigError::Invalid(
            "REGION_LAT_MIN/REGION_LAT_MAX must lie in [-90, 90] with MIN < MAX".to_string(),
        ));
    }

    let longitudes_valid = (-180.0..=180.0).contains(&region.lng_min)
        && (-180.0..=180.0).contains(&region.lng_max)
        && region.lng_min < region.lng_max;
    if !longitudes_valid {
        return Err(ConfigError::Invalid(
            "REGION_LNG_MIN/REGION_LNG_MAX must lie in [-180, 180] with MIN < MAX".to_string(),
        ));
    }
    Ok(())
}

fn parse_or_default<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    optional_trimmed(lookup, name).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a number")))
    })
}

fn parse_in_range<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
{
    let value = optional_trimmed(lookup, name).map_or(Ok(default), |raw| {
        raw.parse::<T>().map_err(|_| {
            ConfigError::Invalid(format!(
                "{name} must be an integer in [{}, {}]",
                range.start(),
                range.end()
            ))
        })
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{}, {}]",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert_eq!(config.db_path, "pawmap.db");
        assert!(config.seed_sample_data);
        assert_eq!(config.region, RegionBounds::HONG_KONG);
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.broadcast_capacity, 256);
        assert_eq!(config.sse_keep_alive, Duration::from_secs(15));
        assert!(config.cors_allowed_origin.is_none());
        assert_eq!(config.body_limit(), 5 * 1024 * 1024 + 64 * 1024);
    }

    #[test]
    fn config_reads_overrides() {
        let config = config_from(&[
            ("PAWMAP_API_BIND_ADDR", " 0.0.0.0:8080 "),
            ("PAWMAP_DB_PATH", ":memory:"),
            ("PAWMAP_SEED_SAMPLE_DATA", "no"),
            ("REGION_LAT_MIN", "22.0"),
            ("MAX_IMAGE_BYTES", "2048"),
            ("STORE_TIMEOUT_MS", "250"),
            ("CORS_ALLOWED_ORIGIN", "https://map.example.org/"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.uses_in_memory_store());
        assert!(!config.seed_sample_data);
        assert!((config.region.lat_min - 22.0).abs() < f64::EPSILON);
        assert_eq!(config.max_image_bytes, 2048);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(
            config.cors_allowed_origin.as_deref(),
            Some("https://map.example.org")
        );
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let err = config_from(&[("BROADCAST_CAPACITY", "8")]).unwrap_err();
        assert!(err.to_string().contains("BROADCAST_CAPACITY"));

        let err = config_from(&[("SSE_KEEP_ALIVE_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("SSE_KEEP_ALIVE_SECS"));

        let err = config_from(&[("STORE_TIMEOUT_MS", "60001")]).unwrap_err();
        assert!(err.to_string().contains("STORE_TIMEOUT_MS"));

        assert!(config_from(&[("PAWMAP_SEED_SAMPLE_DATA", "maybe")]).is_err());
        assert!(config_from(&[("CORS_ALLOWED_ORIGIN", "example.org")]).is_err());
    }

    #[test]
    fn config_rejects_inverted_region() {
        let err = config_from(&[("REGION_LAT_MIN", "23.0"), ("REGION_LAT_MAX", "22.0")])
            .unwrap_err();
        assert!(err.to_string().contains("REGION_LAT"));

        let err = config_from(&[("REGION_LNG_MAX", "north")]).unwrap_err();
        assert!(err.to_string().contains("REGION_LNG_MAX"));
    }
}
