use super::types::Units;
use super::ForecastSource;
use crate::config::Config;
use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";
const FORECAST_3H_PATH: &str = "/data/2.5/forecast";

pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("WeatherPulse/0.1")
            .timeout(Duration::from_secs(config.upstream_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
        })
    }

    async fn get_by_city(&self, path: &str, city: &str, units: Units) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", units.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(%status, city, path, "OpenWeather request rejected");
            return Err(UpstreamError::new(status.as_u16(), error_text));
        }

        let json: Value = response.json().await?;
        Ok(json)
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherClient {
    async fn fetch_current(&self, city: &str, units: Units) -> Result<Value, UpstreamError> {
        self.get_by_city(CURRENT_WEATHER_PATH, city, units).await
    }

    async fn fetch_forecast(&self, city: &str, units: Units) -> Result<Value, UpstreamError> {
        self.get_by_city(FORECAST_3H_PATH, city, units).await
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        let status = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        UpstreamError::new(status.as_u16(), format!("OpenWeather request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode as AxumStatus, routing::get, Json, Router};
    use std::collections::HashMap;

    async fn fake_current(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        Json(serde_json::json!({
            "name": params.get("q").cloned().unwrap_or_default(),
            "units": params.get("units").cloned().unwrap_or_default(),
            "appid": params.get("appid").cloned().unwrap_or_default(),
        }))
    }

    async fn fake_forecast() -> (AxumStatus, &'static str) {
        (AxumStatus::NOT_FOUND, r#"{"cod":"404","message":"city not found"}"#)
    }

    async fn spawn_fake_openweather() -> String {
        let app = Router::new()
            .route(CURRENT_WEATHER_PATH, get(fake_current))
            .route(FORECAST_3H_PATH, get(fake_forecast));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn client_for(base_url: String) -> OpenWeatherClient {
        let config = Config {
            openweather_api_key: "test-key".to_string(),
            openweather_base_url: base_url,
            ..Config::default()
        };
        OpenWeatherClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_current_sends_city_units_and_key() {
        let client = client_for(spawn_fake_openweather().await);

        let json = client.fetch_current("Tbilisi", Units::Imperial).await.unwrap();
        assert_eq!(json["name"], "Tbilisi");
        assert_eq!(json["units"], "imperial");
        assert_eq!(json["appid"], "test-key");
    }

    #[tokio::test]
    async fn test_non_success_status_is_propagated_verbatim() {
        let client = client_for(spawn_fake_openweather().await);

        let err = client.fetch_forecast("Nowhere", Units::Metric).await.unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.message, r#"{"cod":"404","message":"city not found"}"#);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        let err = client.fetch_current("Tbilisi", Units::Metric).await.unwrap_err();
        assert_eq!(err.status, 502);
    }
}
