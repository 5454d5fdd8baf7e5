pub mod mock;
pub mod openweather;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::UpstreamError;
use types::Units;

/// Where raw forecast JSON comes from.
///
/// Implementations make one attempt per call: no retries, and any non-success
/// answer comes back as an [`UpstreamError`].
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_current(&self, city: &str, units: Units) -> Result<Value, UpstreamError>;

    async fn fetch_forecast(&self, city: &str, units: Units) -> Result<Value, UpstreamError>;
}
