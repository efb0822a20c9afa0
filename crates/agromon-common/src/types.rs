use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hour of forecast values at a location, index-aligned with the
/// provider's hourly arrays at normalization time.
///
/// A `None` field means the provider reported no value for that hour; it is
/// deliberately distinct from `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HourlyReading {
    /// Forecast target hour (UTC).
    pub timestamp: DateTime<Utc>,
    /// Air temperature at 2 m, °C.
    pub temperature_c: Option<f64>,
    /// Relative humidity at 2 m, %.
    pub relative_humidity_pct: Option<f64>,
    /// Precipitation over the hour, mm.
    pub precipitation_mm: Option<f64>,
    /// Wind speed at 10 m, km/h.
    pub wind_speed_kmh: Option<f64>,
    /// Wind direction at 10 m, degrees.
    pub wind_direction_deg: Option<f64>,
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use agromon_common::types::Severity;
///
/// assert!(Severity::Severe > Severity::Warning);
/// assert!(Severity::Warning > Severity::Info);
/// assert_eq!(Severity::Warning.to_string(), "warning");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Severe,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

/// The condition an alert rule watches for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Heat,
    Frost,
    HeavyPrecipitation,
    HighWind,
    HighHumidity,
    LowHumidity,
}

impl AlertKind {
    /// Short human-readable label used in alert messages.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Heat => "extreme heat",
            AlertKind::Frost => "frost risk",
            AlertKind::HeavyPrecipitation => "heavy precipitation",
            AlertKind::HighWind => "high wind",
            AlertKind::HighHumidity => "very humid air",
            AlertKind::LowHumidity => "very dry air",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A derived alert covering a contiguous run of hourly readings that all
/// tripped the same rule.
///
/// Alerts are recomputed from the current reading sequence on every engine
/// invocation; they are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WeatherAlert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    /// First hour of the run (UTC).
    pub starts_at: DateTime<Utc>,
    /// Last hour of the run (UTC).
    pub ends_at: DateTime<Utc>,
    /// Run length in hours.
    pub hours: u32,
    /// The most extreme observed value within the run.
    pub peak_value: f64,
    /// The rule bound the run exceeded.
    pub threshold: f64,
    pub generated_at: DateTime<Utc>,
}
