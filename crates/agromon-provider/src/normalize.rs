use chrono::{DateTime, NaiveDateTime, Utc};

use agromon_common::types::HourlyReading;

use crate::error::{ProviderError, Result};
use crate::ForecastPayload;

/// Converts a raw provider payload into an ordered sequence of canonical
/// hourly readings, one per `time` entry, index-aligned across all arrays.
///
/// An absent or empty `time` array is a valid empty forecast, not an error.
/// A present `time` array with a missing required value array, or any array
/// whose length differs from `time`, violates the provider contract and
/// fails with [`ProviderError::MalformedPayload`].
pub fn normalize_hourly(payload: &ForecastPayload) -> Result<Vec<HourlyReading>> {
    let Some(hourly) = payload.hourly.as_ref() else {
        return Ok(Vec::new());
    };
    if hourly.time.is_empty() {
        return Ok(Vec::new());
    }

    let n = hourly.time.len();
    let temperature = required_series(hourly.temperature_2m.as_deref(), "temperature_2m", n)?;
    let humidity = required_series(
        hourly.relativehumidity_2m.as_deref(),
        "relativehumidity_2m",
        n,
    )?;
    let precipitation = required_series(hourly.precipitation.as_deref(), "precipitation", n)?;
    let wind_speed = required_series(hourly.windspeed_10m.as_deref(), "windspeed_10m", n)?;
    let wind_direction =
        optional_series(hourly.winddirection_10m.as_deref(), "winddirection_10m", n)?;

    let mut readings = Vec::with_capacity(n);
    for (i, raw) in hourly.time.iter().enumerate() {
        readings.push(HourlyReading {
            timestamp: parse_hour(raw)?,
            temperature_c: temperature[i],
            relative_humidity_pct: humidity[i],
            precipitation_mm: precipitation[i],
            wind_speed_kmh: wind_speed[i],
            wind_direction_deg: wind_direction.and_then(|s| s[i]),
        });
    }
    Ok(readings)
}

fn required_series<'a>(
    series: Option<&'a [Option<f64>]>,
    name: &str,
    expected: usize,
) -> Result<&'a [Option<f64>]> {
    let series = series
        .ok_or_else(|| ProviderError::MalformedPayload(format!("hourly.{name} is missing")))?;
    check_len(series, name, expected)?;
    Ok(series)
}

fn optional_series<'a>(
    series: Option<&'a [Option<f64>]>,
    name: &str,
    expected: usize,
) -> Result<Option<&'a [Option<f64>]>> {
    match series {
        Some(series) => {
            check_len(series, name, expected)?;
            Ok(Some(series))
        }
        None => Ok(None),
    }
}

fn check_len(series: &[Option<f64>], name: &str, expected: usize) -> Result<()> {
    if series.len() != expected {
        return Err(ProviderError::MalformedPayload(format!(
            "hourly.{name} has {} entries, expected {expected}",
            series.len()
        )));
    }
    Ok(())
}

/// Parse one `hourly.time` entry. With `timezone=UTC` the API returns
/// ISO-8601 at minute precision without a zone suffix (`2026-08-07T13:00`);
/// full RFC 3339 and second-precision forms are accepted as well.
fn parse_hour(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ProviderError::MalformedPayload(format!(
        "unparseable hourly.time entry '{raw}'"
    )))
}
