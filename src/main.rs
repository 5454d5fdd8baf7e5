use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod database;
mod error;
mod forecast;
mod insights;
mod routes;
mod service;
mod utils;

use cache::TtlCache;
use config::Config;
use database::Database;
use forecast::{mock::MockForecastSource, openweather::OpenWeatherClient, ForecastSource};
use routes::{create_router, AppState};
use service::WeatherService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weatherpulse_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::SqlitePool::connect(&config.database_url).await?;
    let database = Arc::new(Database::new(pool));
    database.init_tables().await?;

    let source: Arc<dyn ForecastSource> = if config.use_mock_weather {
        tracing::warn!("USE_MOCK_WEATHER is set, serving canned forecasts");
        Arc::new(MockForecastSource::new())
    } else {
        Arc::new(OpenWeatherClient::new(&config)?)
    };

    let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));
    let weather = Arc::new(WeatherService::new(source, cache, config.default_units));

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        database,
        weather,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
