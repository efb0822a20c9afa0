mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use agromon_server::config::ServerConfig;
use agromon_storage::{FarmRow, ForecastRow};

use agromon_server::identity::IdentityProvider;
use agromon_storage::ForecastStore;
use common::{build_server, hourly_payload, MockIdentity, MockProvider};

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get_with_bearer(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap();
    (status, json)
}

// ---- Request path: validation ----

#[tokio::test]
async fn weather_requires_lat_and_lng() {
    let (app, _state, _tmp) =
        build_server(ServerConfig::default(), MockProvider::returning(hourly_payload(48)), None);

    let (status, json) = get(&app, "/weather").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "Latitude and longitude parameters are required"
    );
}

#[tokio::test]
async fn weather_rejects_out_of_range_coordinates() {
    let (app, _state, _tmp) =
        build_server(ServerConfig::default(), MockProvider::returning(hourly_payload(48)), None);

    for uri in [
        "/weather?lat=95&lng=77.59",
        "/weather?lat=12.97&lng=190",
        "/weather?lat=abc&lng=77.59",
        "/weather?lat=NaN&lng=77.59",
    ] {
        let (status, json) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"], "Invalid latitude or longitude values");
    }
}

#[tokio::test]
async fn weather_rejects_out_of_range_hours() {
    let (app, _state, _tmp) =
        build_server(ServerConfig::default(), MockProvider::returning(hourly_payload(48)), None);

    for uri in [
        "/weather?lat=12.97&lng=77.59&hours=0",
        "/weather?lat=12.97&lng=77.59&hours=169",
        "/weather?lat=12.97&lng=77.59&hours=two",
    ] {
        let (status, json) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"], "Hours parameter must be between 1 and 168");
    }
}

// ---- Request path: end-to-end pipeline ----

#[tokio::test]
async fn weather_derives_single_alert_for_consecutive_wet_hours() {
    let mut payload = hourly_payload(48);
    let series = payload.hourly.as_mut().unwrap();
    let precip = series.precipitation.as_mut().unwrap();
    precip[20] = Some(14.0);
    precip[21] = Some(12.5);

    let provider = MockProvider::returning(payload);
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider, None);

    let (status, json) = get(&app, "/weather?lat=12.97&lng=77.59&hours=48").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["latitude"], 12.97);
    assert_eq!(json["longitude"], 77.59);
    assert_eq!(json["cache_hit"], false);
    assert_eq!(json["hourly"].as_array().unwrap().len(), 48);

    let alerts = json["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1, "two wet hours coalesce into one alert");
    let alert = &alerts[0];
    assert_eq!(alert["kind"], "heavy_precipitation");
    assert_eq!(alert["hours"], 2);

    let starts_at = alert["starts_at"].as_str().unwrap();
    let ends_at = alert["ends_at"].as_str().unwrap();
    assert!(starts_at.starts_with("2026-08-07T20:00"), "{starts_at}");
    assert!(ends_at.starts_with("2026-08-07T21:00"), "{ends_at}");
}

#[tokio::test]
async fn weather_truncates_series_to_requested_horizon() {
    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider, None);

    let (status, json) = get(&app, "/weather?lat=12.97&lng=77.59&hours=12").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hourly"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn weather_upstream_failure_is_500_with_details() {
    let provider = MockProvider::failing();
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider, None);

    let (status, json) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Failed to fetch weather data");
    assert!(json["details"].as_str().unwrap().contains("503"));
}

// ---- Request path: cache ----

#[tokio::test]
async fn weather_second_request_within_ttl_is_a_cache_hit() {
    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider.clone(), None);

    let (status, mut first) = get(&app, "/weather?lat=12.97&lng=77.59&hours=48").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cache_hit"], false);

    let (status, mut second) = get(&app, "/weather?lat=12.97&lng=77.59&hours=48").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cache_hit"], true);
    assert_eq!(provider.calls(), 1, "the hit must not refetch upstream");

    // Apart from the cache-hit flag the payload is identical, including the
    // original generation timestamp.
    first.as_object_mut().unwrap().remove("cache_hit");
    second.as_object_mut().unwrap().remove("cache_hit");
    assert_eq!(first, second);
}

#[tokio::test]
async fn weather_cache_is_scoped_to_location_and_horizon() {
    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider.clone(), None);

    get(&app, "/weather?lat=12.97&lng=77.59&hours=48").await;
    get(&app, "/weather?lat=12.97&lng=77.59&hours=24").await;
    assert_eq!(provider.calls(), 2, "a different horizon is a different key");
}

#[tokio::test]
async fn weather_expired_entry_triggers_fresh_fetch() {
    let mut config = ServerConfig::default();
    config.cache.ttl_secs = 0;

    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(config, provider.clone(), None);

    let (_, first) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    let (_, second) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    assert_eq!(first["cache_hit"], false);
    assert_eq!(second["cache_hit"], false);
    assert_eq!(provider.calls(), 2, "an expired entry must be recomputed");
}

// ---- Request path: rate limiting ----

#[tokio::test]
async fn weather_twenty_first_request_in_window_is_denied() {
    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(ServerConfig::default(), provider, None);

    for i in 0..20 {
        let (status, _) = get(&app, "/weather?lat=12.97&lng=77.59").await;
        assert_eq!(status, StatusCode::OK, "request {} must be admitted", i + 1);
    }

    let (status, json) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json["error"],
        "Too many requests. Please try again in a minute."
    );
}

#[tokio::test]
async fn weather_validation_outranks_rate_limiting() {
    let mut config = ServerConfig::default();
    config.rate_limit.max_requests = 1;

    let provider = MockProvider::returning(hourly_payload(48));
    let (app, _state, _tmp) = build_server(config, provider, None);

    let (status, _) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    assert_eq!(status, StatusCode::OK);

    // Malformed requests stay 400 even for a throttled client.
    let (status, _) = get(&app, "/weather?lat=bogus&lng=77.59").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/weather?lat=12.97&lng=77.59").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

// ---- Farm-scoped query path ----

fn seed_farm(state: &agromon_server::state::AppState, id: &str, owner: Option<&str>) {
    let now = Utc::now();
    state
        .store
        .insert_farm(&FarmRow {
            id: id.to_string(),
            name: format!("farm {id}"),
            owner_id: owner.map(str::to_string),
            lat: Some(12.97),
            lng: Some(77.59),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
}

fn seed_rows(state: &agromon_server::state::AppState, farm_id: &str, count: i64) {
    let now = Utc::now();
    let rows: Vec<ForecastRow> = (0..count)
        .map(|i| ForecastRow {
            id: agromon_common::id::next_id(),
            farm_id: farm_id.to_string(),
            lat: 12.97,
            lng: 77.59,
            provider: "mock-meteo".to_string(),
            data_type: "hourly_forecast".to_string(),
            target_time: now + Duration::hours(i + 1),
            temperature_c: Some(24.0 + i as f64),
            relative_humidity_pct: Some(60.0),
            precipitation_mm: Some(0.0),
            wind_speed_kmh: Some(9.0),
            wind_direction_deg: None,
            raw: None,
            created_at: now,
            updated_at: now,
        })
        .collect();
    state.store.upsert_forecast_rows(&rows).unwrap();
}

fn farm_server() -> (Router, agromon_server::state::AppState, tempfile::TempDir) {
    let identity: std::sync::Arc<dyn IdentityProvider> =
        MockIdentity::with_users(&[("tok-1", "user-1"), ("tok-2", "user-2")]);
    build_server(
        ServerConfig::default(),
        MockProvider::returning(hourly_payload(48)),
        Some(identity),
    )
}

#[tokio::test]
async fn farm_weather_unknown_farm_is_404() {
    let (app, _state, _tmp) = farm_server();

    let (status, json) = get(&app, "/farms/nope/weather?hours=48").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Farm not found");
}

#[tokio::test]
async fn farm_weather_mismatched_owner_is_403() {
    let (app, state, _tmp) = farm_server();
    seed_farm(&state, "f1", Some("user-1"));

    let (status, json) = get_with_bearer(&app, "/farms/f1/weather?hours=48", "tok-2").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Not owner of farm");
}

#[tokio::test]
async fn farm_weather_owner_gets_ordered_rows() {
    let (app, state, _tmp) = farm_server();
    seed_farm(&state, "f1", Some("user-1"));
    seed_rows(&state, "f1", 5);

    let (status, json) = get_with_bearer(&app, "/farms/f1/weather?hours=48", "tok-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["farm"]["id"], "f1");

    let rows = json["weather"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    let times: Vec<&str> = rows
        .iter()
        .map(|r| r["target_time"].as_str().unwrap())
        .collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted, "rows must be ascending by target time");
}

#[tokio::test]
async fn farm_weather_horizon_bounds_the_rows() {
    let (app, state, _tmp) = farm_server();
    seed_farm(&state, "f1", Some("user-1"));
    seed_rows(&state, "f1", 12);

    let (status, json) = get_with_bearer(&app, "/farms/f1/weather?hours=6", "tok-1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["weather"].as_array().unwrap().len() <= 6);
}

#[tokio::test]
async fn farm_weather_without_token_skips_ownership_check() {
    let (app, state, _tmp) = farm_server();
    seed_farm(&state, "f1", Some("user-1"));
    seed_rows(&state, "f1", 3);

    let (status, json) = get(&app, "/farms/f1/weather?hours=48").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["weather"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn farm_weather_unresolvable_token_is_treated_as_anonymous() {
    let (app, state, _tmp) = farm_server();
    seed_farm(&state, "f1", Some("user-1"));

    let (status, _) = get_with_bearer(&app, "/farms/f1/weather?hours=48", "tok-unknown").await;
    assert_eq!(status, StatusCode::OK);
}

// ---- Ambient surface ----

#[tokio::test]
async fn health_reports_process_status() {
    let (app, _state, _tmp) =
        build_server(ServerConfig::default(), MockProvider::returning(hourly_payload(1)), None);

    let (status, json) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _state, _tmp) =
        build_server(ServerConfig::default(), MockProvider::returning(hourly_payload(1)), None);

    let (status, json) = get(&app, "/v1/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "agromon API");
}
