use crate::error::AppError;
use crate::forecast::types::Units;
use crate::insights::DEFAULT_RAIN_THRESHOLD;

pub const MIN_CITY_LEN: usize = 2;
pub const MAX_FAVORITE_CITY_LEN: usize = 100;

/// Case-folded, trimmed city used for cache keys.
pub fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Validate a `city` query parameter, returning it trimmed.
pub fn validate_city(city: Option<&str>) -> Result<String, AppError> {
    let city = city.map(str::trim).unwrap_or_default();
    if city.chars().count() < MIN_CITY_LEN {
        return Err(AppError::validation(
            "city",
            format!("must be at least {} characters", MIN_CITY_LEN),
        ));
    }
    Ok(city.to_string())
}

/// Parse an optional `units` parameter. Blank means "use the configured default".
pub fn parse_units(units: Option<&str>) -> Result<Option<Units>, AppError> {
    match units.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<Units>()
            .map(Some)
            .map_err(|msg| AppError::validation("units", msg)),
    }
}

/// Round a threshold to four decimals so near-identical floats share a cache entry.
/// Adding `0.0` folds `-0.0` into `0.0`.
pub fn canonical_threshold(threshold: f64) -> f64 {
    (threshold * 10_000.0).round() / 10_000.0 + 0.0
}

pub fn parse_rain_threshold(raw: Option<&str>) -> Result<f64, AppError> {
    let threshold = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_RAIN_THRESHOLD),
        Some(value) => value
            .parse::<f64>()
            .map_err(|_| AppError::validation("rain_threshold", format!("'{}' is not a number", value)))?,
    };

    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::validation(
            "rain_threshold",
            format!("{} must be within [0, 1]", threshold),
        ));
    }
    Ok(canonical_threshold(threshold))
}

pub fn validate_favorite_city(city: &str) -> Result<String, AppError> {
    let city = city.trim();
    let len = city.chars().count();
    if !(MIN_CITY_LEN..=MAX_FAVORITE_CITY_LEN).contains(&len) {
        return Err(AppError::validation(
            "city",
            format!(
                "must be between {} and {} characters",
                MIN_CITY_LEN, MAX_FAVORITE_CITY_LEN
            ),
        ));
    }
    Ok(city.to_string())
}

/// Validate optional latitude and longitude coordinates
pub fn validate_coordinates(lat: Option<f64>, lon: Option<f64>) -> Result<(), AppError> {
    if let Some(lat) = lat {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::validation(
                "lat",
                format!("Invalid latitude: {}. Must be between -90 and 90", lat),
            ));
        }
    }
    if let Some(lon) = lon {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::validation(
                "lon",
                format!("Invalid longitude: {}. Must be between -180 and 180", lon),
            ));
        }
    }
    Ok(())
}
