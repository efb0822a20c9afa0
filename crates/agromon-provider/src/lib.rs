//! Upstream forecast provider client and reading normalization.
//!
//! The [`ForecastProvider`] trait is the seam between the pipeline and the
//! upstream HTTP API: the production implementation is
//! [`open_meteo::OpenMeteoClient`], tests substitute their own. Raw payloads
//! are converted into canonical [`HourlyReading`] sequences by
//! [`normalize::normalize_hourly`].

pub mod error;
pub mod normalize;
pub mod open_meteo;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agromon_common::types::HourlyReading;
use error::Result;

/// Raw forecast payload as returned by the upstream provider: top-level
/// location metadata plus an optional block of index-aligned hourly arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPayload {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly: Option<HourlySeries>,
}

/// The provider's parallel hourly arrays. All value arrays are index-aligned
/// with `time`; a `null` entry means no data for that hour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_2m: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relativehumidity_2m: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windspeed_10m: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winddirection_10m: Option<Vec<Option<f64>>>,
}

/// An upstream source of hourly forecasts.
///
/// Implementations are handed to the request path and the ingestion worker
/// as trait objects so tests can swap in a canned payload.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Provider tag recorded in persisted rows (e.g. `"open-meteo"`).
    fn name(&self) -> &'static str;

    /// Fetches the hourly forecast for a coordinate pair, covering
    /// `forecast_days` days starting today (UTC).
    async fn fetch_hourly(&self, lat: f64, lng: f64, forecast_days: u8) -> Result<ForecastPayload>;
}

/// Convenience: fetch and normalize in one step.
pub async fn fetch_readings(
    provider: &dyn ForecastProvider,
    lat: f64,
    lng: f64,
    forecast_days: u8,
) -> Result<(ForecastPayload, Vec<HourlyReading>)> {
    let payload = provider.fetch_hourly(lat, lng, forecast_days).await?;
    let readings = normalize::normalize_hourly(&payload)?;
    Ok((payload, readings))
}
