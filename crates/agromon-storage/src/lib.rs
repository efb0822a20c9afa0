//! Durable storage for normalized forecast rows and the farm registry.
//!
//! The default implementation ([`engine::SqliteForecastStore`]) is a single
//! SQLite database in WAL mode. The pipeline only relies on the
//! [`ForecastStore`] contract: idempotent bulk upsert keyed on
//! (farm id, target time) and query-by-range-and-id.

pub mod engine;
pub mod error;
pub mod persister;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agromon_common::types::HourlyReading;
use error::Result;

/// One persisted forecast hour for a farm, plus provenance: the provider
/// tag and the raw upstream payload kept for audit and manual replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ForecastRow {
    pub id: String,
    pub farm_id: String,
    pub lat: f64,
    pub lng: f64,
    pub provider: String,
    pub data_type: String,
    /// The forecast target hour (UTC). Unique per farm.
    pub target_time: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    /// Raw provider payload the row was ingested from.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub raw: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ForecastRow {
    /// Builds a row from a normalized reading, stamping provenance.
    pub fn from_reading(
        farm_id: &str,
        lat: f64,
        lng: f64,
        provider: &str,
        reading: &HourlyReading,
        raw: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: agromon_common::id::next_id(),
            farm_id: farm_id.to_string(),
            lat,
            lng,
            provider: provider.to_string(),
            data_type: "hourly_forecast".to_string(),
            target_time: reading.timestamp,
            temperature_c: reading.temperature_c,
            relative_humidity_pct: reading.relative_humidity_pct,
            precipitation_mm: reading.precipitation_mm,
            wind_speed_kmh: reading.wind_speed_kmh,
            wind_direction_deg: reading.wind_direction_deg,
            raw,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A tracked location. Farms without coordinates are legal; the ingestion
/// worker skips them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FarmRow {
    pub id: String,
    pub name: String,
    pub owner_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence backend for forecast rows and farms.
///
/// Implementations must be safe to share across threads (`Send + Sync`):
/// the store is reached from the HTTP query path and the ingestion worker
/// concurrently.
pub trait ForecastStore: Send + Sync {
    /// Upserts a batch of forecast rows. Re-ingesting an overlapping horizon
    /// overwrites the prior rows for the same (farm, target time) keys.
    /// Returns the number of rows written.
    fn upsert_forecast_rows(&self, rows: &[ForecastRow]) -> Result<usize>;

    /// Returns a farm's rows with `target_time` inside `[from, to]`,
    /// ascending by target time.
    fn query_forecast_range(
        &self,
        farm_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ForecastRow>>;

    fn insert_farm(&self, farm: &FarmRow) -> Result<()>;

    fn get_farm(&self, id: &str) -> Result<Option<FarmRow>>;

    /// All farms, including those without coordinates.
    fn list_farms(&self) -> Result<Vec<FarmRow>>;
}
