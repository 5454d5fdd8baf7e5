use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::forecast::types::Units;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub database_url: String,
    pub default_units: Units,
    pub cache_ttl_secs: u64,
    pub upstream_timeout_secs: u64,
    pub bind_addr: String,
    pub use_mock_weather: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openweather_api_key: String::new(),
            openweather_base_url: "https://api.openweathermap.org".to_string(),
            database_url: "sqlite:./weatherpulse.db?mode=rwc".to_string(),
            default_units: Units::Metric,
            cache_ttl_secs: 600,
            upstream_timeout_secs: 10,
            bind_addr: "0.0.0.0:8080".to_string(),
            use_mock_weather: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let use_mock_weather = parse_var(&lookup, "USE_MOCK_WEATHER", defaults.use_mock_weather)?;
        let openweather_api_key = match lookup("OPENWEATHER_API_KEY") {
            Some(key) if !key.trim().is_empty() => key,
            _ if use_mock_weather => String::new(),
            _ => anyhow::bail!("OPENWEATHER_API_KEY not set"),
        };

        Ok(Config {
            openweather_api_key,
            openweather_base_url: lookup("OPENWEATHER_BASE_URL")
                .unwrap_or(defaults.openweather_base_url),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            default_units: parse_var(&lookup, "DEFAULT_UNITS", defaults.default_units)?,
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            upstream_timeout_secs: parse_var(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout_secs,
            )?,
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            use_mock_weather,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}
