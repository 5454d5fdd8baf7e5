use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::error::UpstreamError;
use crate::forecast::types::{CurrentConditions, ForecastList, Units};
use crate::forecast::ForecastSource;
use crate::insights::{derive_insights, ForecastInsights};
use crate::utils::normalize_city;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Current,
    Forecast,
    Insights,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Current => "current",
            Operation::Forecast => "forecast",
            Operation::Insights => "insights",
        }
    }
}

/// `<operation>:<city>:<units>[:<extra>]`.
///
/// The city is case-folded, trimmed and percent-encoded, so it never contains the
/// separator and the segments always split back unambiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    operation: Operation,
    city: String,
    units: Units,
    extra: Option<String>,
}

impl CacheKey {
    pub fn new(operation: Operation, city: &str, units: Units) -> Self {
        Self {
            operation,
            city: urlencoding::encode(&normalize_city(city)).into_owned(),
            units,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.operation.as_str(), self.city, self.units)?;
        if let Some(extra) = &self.extra {
            write!(f, ":{}", extra)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub city: Option<String>,
    pub country: Option<String>,
    #[serde(flatten)]
    pub insights: ForecastInsights,
}

/// What the cache holds, one variant per operation.
#[derive(Debug, Clone)]
pub enum CachedReport {
    Current(CurrentConditions),
    Forecast(ForecastList),
    Insights(InsightReport),
}

/// Response envelope telling the caller whether the data came from the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(rename = "_cached")]
    pub cached: bool,
}

impl<T> Cached<T> {
    fn hit(data: T) -> Self {
        Self { data, cached: true }
    }

    fn fresh(data: T) -> Self {
        Self {
            data,
            cached: false,
        }
    }
}

/// Cache-or-fetch front for the forecast source.
///
/// Concurrent misses on one key are not coalesced: both fetch, the later write wins.
pub struct WeatherService {
    source: Arc<dyn ForecastSource>,
    cache: TtlCache<String, CachedReport>,
    default_units: Units,
}

impl WeatherService {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        cache: TtlCache<String, CachedReport>,
        default_units: Units,
    ) -> Self {
        Self {
            source,
            cache,
            default_units,
        }
    }

    fn lookup(&self, key: &str) -> Option<CachedReport> {
        let hit = self.cache.get(key);
        if hit.is_some() {
            tracing::debug!(key, "cache hit");
        } else {
            tracing::debug!(key, "cache miss");
        }
        hit
    }

    fn store(&self, key: String, report: CachedReport) {
        tracing::debug!(key = %key, ttl_secs = self.cache.default_ttl().as_secs(), "caching report");
        self.cache.set(key, report);
    }

    pub async fn current(
        &self,
        city: &str,
        units: Option<Units>,
    ) -> Result<Cached<CurrentConditions>, UpstreamError> {
        let units = units.unwrap_or(self.default_units);
        let key = CacheKey::new(Operation::Current, city, units).to_string();

        if let Some(CachedReport::Current(report)) = self.lookup(&key) {
            return Ok(Cached::hit(report));
        }

        let raw = self.source.fetch_current(city.trim(), units).await?;
        let report = CurrentConditions::from_payload(raw).map_err(UpstreamError::malformed)?;

        self.store(key, CachedReport::Current(report.clone()));
        Ok(Cached::fresh(report))
    }

    pub async fn forecast(
        &self,
        city: &str,
        units: Option<Units>,
    ) -> Result<Cached<ForecastList>, UpstreamError> {
        let units = units.unwrap_or(self.default_units);
        let key = CacheKey::new(Operation::Forecast, city, units).to_string();

        if let Some(CachedReport::Forecast(report)) = self.lookup(&key) {
            return Ok(Cached::hit(report));
        }

        let report = self.fetch_forecast_list(city, units).await?;

        self.store(key, CachedReport::Forecast(report.clone()));
        Ok(Cached::fresh(report))
    }

    /// `rain_threshold` is expected to be canonical already (see `utils::parse_rain_threshold`).
    pub async fn insights(
        &self,
        city: &str,
        units: Option<Units>,
        rain_threshold: f64,
    ) -> Result<Cached<InsightReport>, UpstreamError> {
        let units = units.unwrap_or(self.default_units);
        let key = CacheKey::new(Operation::Insights, city, units)
            .with_extra(format!("{:.4}", rain_threshold))
            .to_string();

        if let Some(CachedReport::Insights(report)) = self.lookup(&key) {
            return Ok(Cached::hit(report));
        }

        let forecast = self.fetch_forecast_list(city, units).await?;
        let report = InsightReport {
            insights: derive_insights(&forecast.items, rain_threshold),
            city: forecast.city,
            country: forecast.country,
        };
        if report.insights.window().is_none() {
            tracing::info!(city, "forecast had no slots");
        }

        self.store(key, CachedReport::Insights(report.clone()));
        Ok(Cached::fresh(report))
    }

    async fn fetch_forecast_list(&self, city: &str, units: Units) -> Result<ForecastList, UpstreamError> {
        let raw = self.source.fetch_forecast(city.trim(), units).await?;
        ForecastList::from_payload(&raw).map_err(UpstreamError::malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::forecast::mock::{sample_current, MockForecastSource};
    use crate::insights::NO_DATA_MESSAGE;
    use serde_json::json;

    fn service_with(source: Arc<MockForecastSource>) -> WeatherService {
        WeatherService::new(source, TtlCache::new(DEFAULT_TTL), Units::Metric)
    }

    fn insights_payload() -> serde_json::Value {
        let pair = json!([
            {
                "dt_txt": "2025-01-01 00:00:00",
                "main": {"temp": 5.0, "feels_like": 4.0, "humidity": 80},
                "pop": 0.1,
                "wind": {"speed": 3.0},
                "weather": [{"description": "cloudy"}]
            },
            {
                "dt_txt": "2025-01-01 03:00:00",
                "main": {"temp": 4.0, "feels_like": 3.0, "humidity": 85},
                "pop": 0.7,
                "wind": {"speed": 2.0},
                "weather": [{"description": "rain"}]
            }
        ]);
        let list: Vec<serde_json::Value> = pair.as_array().unwrap().iter().cloned().cycle().take(8).collect();
        json!({"city": {"name": "Tbilisi", "country": "GE"}, "list": list})
    }

    #[test]
    fn test_cache_key_format() {
        let key = CacheKey::new(Operation::Current, "Tbilisi", Units::Metric);
        assert_eq!(key.to_string(), "current:tbilisi:metric");

        let key = CacheKey::new(Operation::Insights, "Tbilisi", Units::Imperial).with_extra("0.4000");
        assert_eq!(key.to_string(), "insights:tbilisi:imperial:0.4000");
    }

    #[test]
    fn test_cache_key_normalizes_city() {
        let a = CacheKey::new(Operation::Forecast, "  TBILISI ", Units::Metric);
        let b = CacheKey::new(Operation::Forecast, "tbilisi", Units::Metric);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_cache_key_escapes_separator() {
        let key = CacheKey::new(Operation::Current, "New York:metric", Units::Metric);
        assert_eq!(key.to_string(), "current:new%20york%3Ametric:metric");
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let source = Arc::new(MockForecastSource::new());
        let service = service_with(source.clone());

        let first = service.current("Tbilisi", Some(Units::Metric)).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.data.temp, Some(10.0));

        let second = service.current("Tbilisi", Some(Units::Metric)).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data, first.data);

        let third = service.current("Tbilisi", Some(Units::Metric)).await.unwrap();
        assert_eq!(third.data, first.data);
        assert_eq!(source.current_calls(), 1);
    }

    #[tokio::test]
    async fn test_city_case_and_whitespace_share_an_entry() {
        let source = Arc::new(MockForecastSource::new());
        let service = service_with(source.clone());

        service.forecast("Tbilisi", None).await.unwrap();
        let again = service.forecast("  tbilisi ", None).await.unwrap();

        assert!(again.cached);
        assert_eq!(source.forecast_calls(), 1);
    }

    #[tokio::test]
    async fn test_default_units_are_part_of_the_key() {
        let source = Arc::new(MockForecastSource::new());
        let service = service_with(source.clone());

        service.current("Tbilisi", None).await.unwrap();
        let explicit_metric = service.current("Tbilisi", Some(Units::Metric)).await.unwrap();
        let imperial = service.current("Tbilisi", Some(Units::Imperial)).await.unwrap();

        assert!(explicit_metric.cached);
        assert!(!imperial.cached);
        assert_eq!(source.current_calls(), 2);
    }

    #[tokio::test]
    async fn test_operations_do_not_share_entries() {
        let source = Arc::new(MockForecastSource::new());
        let service = service_with(source.clone());

        service.forecast("Tbilisi", None).await.unwrap();
        let insights = service.insights("Tbilisi", None, 0.4).await.unwrap();

        assert!(!insights.cached);
        assert_eq!(source.forecast_calls(), 2);
    }

    #[tokio::test]
    async fn test_insights_are_cached_per_threshold() {
        let source = Arc::new(MockForecastSource::with_payloads(sample_current(), insights_payload()));
        let service = service_with(source.clone());

        let first = service.insights("Tbilisi", None, 0.6).await.unwrap();
        assert!(!first.cached);
        let window = first.data.insights.window().unwrap();
        assert_eq!(window.min_temp_24h, Some(4.0));
        assert_eq!(window.max_temp_24h, Some(5.0));
        let rain = window.next_rain_slot.as_ref().unwrap();
        assert_eq!(rain.dt_txt.as_deref(), Some("2025-01-01 03:00:00"));
        assert!(rain.pop >= 0.6);

        assert!(service.insights("Tbilisi", None, 0.6).await.unwrap().cached);
        assert!(!service.insights("Tbilisi", None, 0.8).await.unwrap().cached);
        assert_eq!(source.forecast_calls(), 2);
    }

    #[tokio::test]
    async fn test_signed_zero_threshold_shares_an_entry() {
        let source = Arc::new(MockForecastSource::with_payloads(sample_current(), insights_payload()));
        let service = service_with(source.clone());

        let zero = crate::utils::parse_rain_threshold(Some("0")).unwrap();
        let negative_zero = crate::utils::parse_rain_threshold(Some("-0")).unwrap();

        service.insights("Tbilisi", None, zero).await.unwrap();
        let again = service.insights("Tbilisi", None, negative_zero).await.unwrap();

        assert!(again.cached);
        assert_eq!(source.forecast_calls(), 1);
        let body = serde_json::to_value(&again).unwrap();
        assert_eq!(body["rain_threshold"].as_f64().map(f64::is_sign_positive), Some(true));
    }

    #[tokio::test]
    async fn test_empty_forecast_yields_no_data_report() {
        let payload = json!({"city": {"name": "Tbilisi", "country": "GE"}, "list": []});
        let source = Arc::new(MockForecastSource::with_payloads(sample_current(), payload));
        let service = service_with(source);

        let report = service.insights("Tbilisi", None, 0.4).await.unwrap();
        let body = serde_json::to_value(&report).unwrap();

        assert_eq!(
            body,
            json!({
                "city": "Tbilisi",
                "country": "GE",
                "message": NO_DATA_MESSAGE,
                "_cached": false
            })
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_is_propagated_and_not_cached() {
        let source = Arc::new(MockForecastSource::failing(UpstreamError::new(404, "city not found")));
        let service = service_with(source.clone());

        let err = service.current("Atlantis", None).await.unwrap_err();
        assert_eq!(err, UpstreamError::new(404, "city not found"));

        service.current("Atlantis", None).await.unwrap_err();
        assert_eq!(source.current_calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_upstream_error() {
        let source = Arc::new(MockForecastSource::with_payloads(
            sample_current(),
            json!({"list": "not a list"}),
        ));
        let service = service_with(source.clone());

        let err = service.forecast("Tbilisi", None).await.unwrap_err();
        assert_eq!(err.status, 502);

        service.forecast("Tbilisi", None).await.unwrap_err();
        assert_eq!(source.forecast_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let source = Arc::new(MockForecastSource::new());
        let service = WeatherService::new(
            source.clone(),
            TtlCache::new(std::time::Duration::from_millis(20)),
            Units::Metric,
        );

        service.current("Tbilisi", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let again = service.current("Tbilisi", None).await.unwrap();

        assert!(!again.cached);
        assert_eq!(source.current_calls(), 2);
    }
}
