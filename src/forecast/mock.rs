use super::types::Units;
use super::ForecastSource;
use crate::error::UpstreamError;
use async_trait::async_trait;
use chrono::{Duration, DurationRound, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Offline forecast source serving fixed payloads.
///
/// Runs the server without an API key and doubles as the test stand-in for
/// OpenWeather: it counts every call so tests can tell cache hits from fetches.
pub struct MockForecastSource {
    current: Value,
    forecast: Value,
    failure: Option<UpstreamError>,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
}

impl MockForecastSource {
    pub fn new() -> Self {
        Self::with_payloads(sample_current(), sample_forecast(40))
    }

    pub fn with_payloads(current: Value, forecast: Value) -> Self {
        Self {
            current,
            forecast,
            failure: None,
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails with `err`.
    pub fn failing(err: UpstreamError) -> Self {
        Self {
            failure: Some(err),
            ..Self::with_payloads(Value::Null, Value::Null)
        }
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn forecast_calls(&self) -> usize {
        self.forecast_calls.load(Ordering::SeqCst)
    }

    fn respond(&self, payload: &Value, city: &str) -> Result<Value, UpstreamError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        tracing::debug!(city, "Serving canned forecast payload");
        Ok(payload.clone())
    }
}

impl Default for MockForecastSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForecastSource for MockForecastSource {
    async fn fetch_current(&self, city: &str, _units: Units) -> Result<Value, UpstreamError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.current, city)
    }

    async fn fetch_forecast(&self, city: &str, _units: Units) -> Result<Value, UpstreamError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(&self.forecast, city)
    }
}

pub fn sample_current() -> Value {
    json!({
        "name": "Tbilisi",
        "sys": {"country": "GE"},
        "main": {"temp": 10.0, "feels_like": 8.0, "humidity": 70},
        "wind": {"speed": 2.5},
        "weather": [{"description": "clear sky"}],
    })
}

/// `slots` entries at 3-hour steps from the current 3-hour boundary.
pub fn sample_forecast(slots: usize) -> Value {
    let start = Utc::now()
        .duration_trunc(Duration::hours(3))
        .unwrap_or_else(|_| Utc::now());

    let list: Vec<Value> = (0..slots)
        .map(|i| {
            let hours_ahead = i as i64 * 3;
            let ts = start + Duration::hours(hours_ahead);
            // Diurnal swing, with a wet slot once a day.
            let temp = 12.0 + 6.0 * (hours_ahead as f64 * 0.26).sin();
            let pop = if i % 8 == 5 { 0.65 } else { 0.05 * (i % 4) as f64 };
            let wind = 1.5 + (i % 5) as f64 * 0.75;
            let description = if pop >= 0.4 { "light rain" } else { "scattered clouds" };

            json!({
                "dt": ts.timestamp(),
                "dt_txt": ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                "main": {
                    "temp": temp,
                    "feels_like": temp - 1.5,
                    "humidity": 60 + (i % 3) * 10,
                },
                "pop": pop,
                "wind": {"speed": wind},
                "weather": [{"description": description}],
            })
        })
        .collect();

    json!({
        "city": {"name": "Tbilisi", "country": "GE"},
        "list": list,
    })
}
