use serde::Serialize;

use crate::forecast::types::ForecastSlot;

/// Eight 3-hour slots, roughly the next 24 hours.
pub const INSIGHT_WINDOW_SLOTS: usize = 8;
pub const DEFAULT_RAIN_THRESHOLD: f64 = 0.4;
pub const NO_DATA_MESSAGE: &str = "No forecast data available";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ForecastInsights {
    NoData { message: String },
    Window(WindowInsights),
}

impl ForecastInsights {
    pub fn window(&self) -> Option<&WindowInsights> {
        match self {
            ForecastInsights::Window(window) => Some(window),
            ForecastInsights::NoData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowInsights {
    pub rain_threshold: f64,
    pub min_temp_24h: Option<f64>,
    pub max_temp_24h: Option<f64>,
    pub next_rain_slot: Option<RainSlot>,
    pub best_outdoor_slot: Option<OutdoorSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainSlot {
    pub dt_txt: Option<String>,
    pub pop: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutdoorSlot {
    pub dt_txt: Option<String>,
    pub temp: Option<f64>,
    pub wind_speed: Option<f64>,
    pub pop: f64,
    pub description: Option<String>,
}

fn pop_of(slot: &ForecastSlot) -> f64 {
    slot.pop.unwrap_or(0.0)
}

fn wind_of(slot: &ForecastSlot) -> f64 {
    slot.wind_speed.unwrap_or(0.0)
}

/// Derives the 24h insights from the head of a forecast.
///
/// Only the first [`INSIGHT_WINDOW_SLOTS`] slots are considered and their upstream
/// order is kept. A missing probability of precipitation counts as `0.0`.
pub fn derive_insights(slots: &[ForecastSlot], rain_threshold: f64) -> ForecastInsights {
    let window = &slots[..slots.len().min(INSIGHT_WINDOW_SLOTS)];
    if window.is_empty() {
        return ForecastInsights::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        };
    }

    let (min_temp_24h, max_temp_24h) = temperature_range(window);

    ForecastInsights::Window(WindowInsights {
        rain_threshold,
        min_temp_24h,
        max_temp_24h,
        next_rain_slot: next_rain_slot(window, rain_threshold),
        best_outdoor_slot: best_outdoor_slot(window, rain_threshold),
    })
}

pub fn temperature_range(window: &[ForecastSlot]) -> (Option<f64>, Option<f64>) {
    window
        .iter()
        .filter_map(|slot| slot.temp)
        .filter(|temp| !temp.is_nan())
        .fold((None, None), |(min, max): (Option<f64>, Option<f64>), temp| {
            (
                Some(min.map_or(temp, |m| m.min(temp))),
                Some(max.map_or(temp, |m| m.max(temp))),
            )
        })
}

/// First slot at or above the threshold. Earlier beats wetter.
pub fn next_rain_slot(window: &[ForecastSlot], rain_threshold: f64) -> Option<RainSlot> {
    window
        .iter()
        .find(|slot| pop_of(slot) >= rain_threshold)
        .map(|slot| RainSlot {
            dt_txt: slot.dt_txt.clone(),
            pop: pop_of(slot),
            description: slot.description.clone(),
        })
}

/// Driest, then calmest slot below the threshold; the earliest one wins a full tie.
pub fn best_outdoor_slot(window: &[ForecastSlot], rain_threshold: f64) -> Option<OutdoorSlot> {
    window
        .iter()
        .filter(|slot| pop_of(slot) < rain_threshold)
        .min_by(|a, b| {
            pop_of(a)
                .total_cmp(&pop_of(b))
                .then_with(|| wind_of(a).total_cmp(&wind_of(b)))
        })
        .map(|slot| OutdoorSlot {
            dt_txt: slot.dt_txt.clone(),
            temp: slot.temp,
            wind_speed: slot.wind_speed,
            pop: pop_of(slot),
            description: slot.description.clone(),
        })
}
