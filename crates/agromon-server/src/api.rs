use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use agromon_common::types::{HourlyReading, WeatherAlert};
use agromon_provider::error::ProviderError;
use agromon_provider::fetch_readings;
use agromon_storage::ForecastRow;

use crate::cache::forecast_cache_key;
use crate::logging::TraceId;
use crate::state::AppState;

/// Error body returned by every failing request-path response.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub trace_id: String,
}

pub fn error_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiError {
            error: msg.to_string(),
            details: None,
            trace_id: trace_id.to_string(),
        }),
    )
        .into_response()
}

pub fn error_response_with_details(
    status: StatusCode,
    trace_id: &str,
    msg: &str,
    details: String,
) -> Response {
    (
        status,
        Json(ApiError {
            error: msg.to_string(),
            details: Some(details),
            trace_id: trace_id.to_string(),
        }),
    )
        .into_response()
}

/// Full forecast response for one (location, horizon) request. Cached
/// verbatim; only `cache_hit` differs between a fresh computation and a hit.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ForecastResponse {
    /// Grid-point latitude echoed by the provider.
    pub latitude: f64,
    /// Grid-point longitude echoed by the provider.
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    pub hourly: Vec<HourlyReading>,
    pub alerts: Vec<WeatherAlert>,
    pub generated_at: DateTime<Utc>,
    pub cache_hit: bool,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherQuery {
    /// Latitude in [-90, 90] (required).
    #[param(required = true)]
    lat: Option<String>,
    /// Longitude in [-180, 180] (required).
    #[param(required = true)]
    lng: Option<String>,
    /// Forecast horizon in hours, 1-168 (default 48).
    #[param(required = false)]
    hours: Option<String>,
}

/// Live forecast with derived alerts for a coordinate pair.
/// Rate-limited per client IP; responses are cached per (location, horizon).
#[utoipa::path(
    get,
    path = "/weather",
    tag = "Weather",
    params(WeatherQuery),
    responses(
        (status = 200, description = "Hourly forecast plus derived alerts", body = ForecastResponse),
        (status = 400, description = "Missing or invalid parameters", body = ApiError),
        (status = 429, description = "Rate limit exceeded", body = ApiError),
        (status = 500, description = "Upstream fetch or internal failure", body = ApiError)
    )
)]
async fn get_weather(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<WeatherQuery>,
) -> Response {
    // Validation resolves before rate limiting: a malformed request is 400
    // even for a throttled client.
    let (lat, lng) = match parse_coords(&params) {
        Ok(coords) => coords,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };
    let hours = match parse_hours(params.hours.as_deref()) {
        Ok(hours) => hours,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };

    if state.config.rate_limit.enabled && !state.rate_limiter.check(&addr.ip().to_string()) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            &trace_id,
            "Too many requests. Please try again in a minute.",
        );
    }

    let key = forecast_cache_key(lat, lng, hours);
    if let Some(hit) = state.cache.lookup(&key) {
        return serve_cached(hit);
    }

    // Miss: serialize computations for this key so concurrent misses
    // collapse into one upstream fetch.
    let gate = state.cache.flight_gate(&key);
    let _guard = gate.lock().await;
    if let Some(hit) = state.cache.lookup(&key) {
        return serve_cached(hit);
    }

    match compute_forecast(&state, lat, lng, hours).await {
        Ok(payload) => {
            state.cache.insert(&key, payload.clone());
            Json(payload).into_response()
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id, lat, lng, error = %e, "Forecast pipeline failed");
            error_response_with_details(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "Failed to fetch weather data",
                e.to_string(),
            )
        }
    }
}

fn serve_cached(mut payload: ForecastResponse) -> Response {
    payload.cache_hit = true;
    Json(payload).into_response()
}

/// The whole fetch → normalize → alert step, executed on a cache miss.
async fn compute_forecast(
    state: &AppState,
    lat: f64,
    lng: f64,
    hours: u32,
) -> Result<ForecastResponse, ProviderError> {
    let forecast_days = forecast_days_for(hours);
    let (payload, mut readings) =
        fetch_readings(state.provider.as_ref(), lat, lng, forecast_days).await?;
    readings.truncate(hours as usize);
    let generated_at = Utc::now();
    let alerts = state.alert_engine.evaluate(&readings, generated_at);
    Ok(ForecastResponse {
        latitude: payload.latitude,
        longitude: payload.longitude,
        elevation: payload.elevation,
        hourly: readings,
        alerts,
        generated_at,
        cache_hit: false,
    })
}

/// Days of forecast to request upstream so the horizon is covered.
fn forecast_days_for(hours: u32) -> u8 {
    hours.div_ceil(24).clamp(1, 7) as u8
}

fn parse_coords(params: &WeatherQuery) -> Result<(f64, f64), String> {
    let (Some(lat_raw), Some(lng_raw)) = (params.lat.as_deref(), params.lng.as_deref()) else {
        return Err("Latitude and longitude parameters are required".to_string());
    };
    let invalid = || "Invalid latitude or longitude values".to_string();
    let lat: f64 = lat_raw.parse().map_err(|_| invalid())?;
    let lng: f64 = lng_raw.parse().map_err(|_| invalid())?;
    if !lat.is_finite() || !lng.is_finite() || !(-90.0..=90.0).contains(&lat)
        || !(-180.0..=180.0).contains(&lng)
    {
        return Err(invalid());
    }
    Ok((lat, lng))
}

fn parse_hours(raw: Option<&str>) -> Result<u32, String> {
    let hours = match raw {
        None => 48,
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| "Hours parameter must be between 1 and 168".to_string())?,
    };
    if !(1..=168).contains(&hours) {
        return Err("Hours parameter must be between 1 and 168".to_string());
    }
    Ok(hours)
}

// ---- Farm-scoped query path ----

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FarmWeatherQuery {
    /// Forecast horizon in hours, 1-168 (default 48).
    #[param(required = false)]
    hours: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct FarmSummary {
    pub id: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct FarmWeatherResponse {
    pub farm: FarmSummary,
    /// Persisted rows with target_time inside [now, now + hours], ascending.
    pub weather: Vec<ForecastRow>,
}

/// Persisted forecast rows for one farm.
/// Ownership gating is optional: with a bearer token the caller must be the
/// farm's owner; without one the check is skipped.
#[utoipa::path(
    get,
    path = "/farms/{id}/weather",
    tag = "Farms",
    params(
        ("id" = String, Path, description = "Farm id"),
        FarmWeatherQuery
    ),
    responses(
        (status = 200, description = "Stored forecast rows for the farm", body = FarmWeatherResponse),
        (status = 400, description = "Invalid parameters", body = ApiError),
        (status = 403, description = "Caller is not the farm owner", body = ApiError),
        (status = 404, description = "Farm not found", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    )
)]
async fn farm_weather(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<FarmWeatherQuery>,
) -> Response {
    let hours = match parse_hours(params.hours.as_deref()) {
        Ok(hours) => hours,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };

    let farm = match state.store.get_farm(&id) {
        Ok(Some(farm)) => farm,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, &trace_id, "Farm not found"),
        Err(e) => {
            tracing::error!(trace_id = %trace_id, farm_id = %id, error = %e, "Failed to load farm");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "Failed to load farm",
            );
        }
    };

    if let Some(user) = resolve_caller(&state, &headers, &trace_id).await {
        if farm.owner_id.as_deref() != Some(user.id.as_str()) {
            return error_response(StatusCode::FORBIDDEN, &trace_id, "Not owner of farm");
        }
    }

    let from = Utc::now();
    let to = from + Duration::hours(hours as i64);
    match state.store.query_forecast_range(&id, from, to) {
        Ok(rows) => Json(FarmWeatherResponse {
            farm: FarmSummary {
                id: farm.id,
                name: farm.name,
                lat: farm.lat,
                lng: farm.lng,
            },
            weather: rows,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(trace_id = %trace_id, farm_id = %id, error = %e, "Failed to query forecast rows");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "Failed to query weather data",
            )
        }
    }
}

/// Resolves the caller's bearer token, if any. A missing token, an unknown
/// token, or an identity-service failure all yield `None`: the endpoint
/// supports both authenticated and anonymous access, and callers needing
/// strict enforcement must always supply an identity.
async fn resolve_caller(
    state: &AppState,
    headers: &HeaderMap,
    trace_id: &str,
) -> Option<crate::identity::UserIdentity> {
    let token = bearer_token(headers)?;
    let Some(identity) = state.identity.as_ref() else {
        tracing::warn!(trace_id = %trace_id, "Bearer token supplied but no identity service configured");
        return None;
    };
    match identity.resolve(token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, error = %e, "Token resolution failed, treating caller as anonymous");
            None
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// ---- Health ----

#[derive(Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: i64,
    timestamp: DateTime<Utc>,
}

/// Process health and timestamp.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process status", body = HealthResponse)
    )
)]
async fn health(
    Extension(_trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        timestamp: Utc::now(),
    })
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_weather))
        .routes(routes!(farm_weather))
}
