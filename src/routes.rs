use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::Config,
    database::{CreateFavorite, Database, Favorite},
    error::AppError,
    forecast::types::{CurrentConditions, ForecastList},
    service::{Cached, InsightReport, WeatherService},
    utils::{
        parse_rain_threshold, parse_units, validate_city, validate_coordinates,
        validate_favorite_city,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub weather: Arc<WeatherService>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
    pub units: Option<String>,
}

// Threshold stays a string so a bad value is reported like every other field.
#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub city: Option<String>,
    pub units: Option<String>,
    pub rain_threshold: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub health: String,
    pub default_units: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: i64,
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "WeatherPulse API is running".to_string(),
        health: "/health".to_string(),
        default_units: state.config.default_units.to_string(),
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn current_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<Cached<CurrentConditions>>, AppError> {
    let city = validate_city(params.city.as_deref())?;
    let units = parse_units(params.units.as_deref())?;

    let report = state.weather.current(&city, units).await?;
    Ok(Json(report))
}

pub async fn forecast(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<Cached<ForecastList>>, AppError> {
    let city = validate_city(params.city.as_deref())?;
    let units = parse_units(params.units.as_deref())?;

    let report = state.weather.forecast(&city, units).await?;
    Ok(Json(report))
}

pub async fn insights(
    State(state): State<AppState>,
    Query(params): Query<InsightsQuery>,
) -> Result<Json<Cached<InsightReport>>, AppError> {
    let city = validate_city(params.city.as_deref())?;
    let units = parse_units(params.units.as_deref())?;
    let rain_threshold = parse_rain_threshold(params.rain_threshold.as_deref())?;

    let report = state.weather.insights(&city, units, rain_threshold).await?;
    Ok(Json(report))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    body: Result<Json<CreateFavorite>, JsonRejection>,
) -> Result<(StatusCode, Json<Favorite>), AppError> {
    let Json(request) = body?;
    let city = validate_favorite_city(&request.city)?;
    validate_coordinates(request.lat, request.lon)?;

    let favorite = state
        .database
        .create_favorite(CreateFavorite { city, ..request })
        .await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

pub async fn list_favorites(State(state): State<AppState>) -> Result<Json<Vec<Favorite>>, AppError> {
    Ok(Json(state.database.list_favorites().await?))
}

pub async fn delete_favorite(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.database.delete_favorite(id).await?;
    Ok(Json(DeleteResponse { deleted: true, id }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/weather/current", get(current_weather))
        .route("/weather/forecast", get(forecast))
        .route("/weather/insights", get(insights))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/:id", delete(delete_favorite))
        .with_state(state)
}
