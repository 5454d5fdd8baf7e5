use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Units::Standard),
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(format!(
                "Unsupported units '{}'. Expected standard, metric or imperial",
                other
            )),
        }
    }
}

// Upstream OpenWeather payloads. Every field is optional: a missing block decodes
// to None instead of failing the whole response.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentPayload {
    pub name: Option<String>,
    pub sys: Option<SysBlock>,
    pub main: Option<MainBlock>,
    pub wind: Option<WindBlock>,
    pub weather: Option<Vec<WeatherBlock>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SysBlock {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainBlock {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindBlock {
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherBlock {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastPayload {
    pub city: Option<CityBlock>,
    pub list: Option<Vec<ForecastEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityBlock {
    pub name: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastEntry {
    pub dt: Option<i64>,
    pub dt_txt: Option<String>,
    pub main: Option<MainBlock>,
    pub wind: Option<WindBlock>,
    pub weather: Option<Vec<WeatherBlock>>,
    pub pop: Option<f64>,
}

fn first_description(weather: Option<&Vec<WeatherBlock>>) -> Option<String> {
    weather
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.description.clone())
}

/// One 3-hour forecast sample, in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastSlot {
    pub dt: Option<i64>,
    pub dt_txt: Option<String>,
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub pop: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
}

impl From<&ForecastEntry> for ForecastSlot {
    fn from(entry: &ForecastEntry) -> Self {
        let main = entry.main.as_ref();
        Self {
            dt: entry.dt,
            dt_txt: entry.dt_txt.clone(),
            temp: main.and_then(|m| m.temp),
            feels_like: main.and_then(|m| m.feels_like),
            humidity: main.and_then(|m| m.humidity),
            pop: entry.pop,
            wind_speed: entry.wind.as_ref().and_then(|w| w.speed),
            description: first_description(entry.weather.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub city: Option<String>,
    pub country: Option<String>,
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub raw: Value,
}

impl CurrentConditions {
    pub fn from_payload(raw: Value) -> Result<Self, serde_json::Error> {
        let payload = CurrentPayload::deserialize(&raw)?;
        let main = payload.main.as_ref();

        Ok(Self {
            city: payload.name.clone(),
            country: payload.sys.as_ref().and_then(|s| s.country.clone()),
            temp: main.and_then(|m| m.temp),
            feels_like: main.and_then(|m| m.feels_like),
            humidity: main.and_then(|m| m.humidity),
            wind_speed: payload.wind.as_ref().and_then(|w| w.speed),
            description: first_description(payload.weather.as_ref()),
            raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastList {
    pub city: Option<String>,
    pub country: Option<String>,
    pub items: Vec<ForecastSlot>,
}

impl ForecastList {
    pub fn from_payload(raw: &Value) -> Result<Self, serde_json::Error> {
        let payload = ForecastPayload::deserialize(raw)?;
        let city = payload.city.unwrap_or_default();
        let items = payload
            .list
            .unwrap_or_default()
            .iter()
            .map(ForecastSlot::from)
            .collect();

        Ok(Self {
            city: city.name,
            country: city.country,
            items,
        })
    }
}
