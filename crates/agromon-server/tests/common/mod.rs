use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::connect_info::MockConnectInfo;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use agromon_alert::engine::AlertEngine;
use agromon_provider::error::{ProviderError, Result as ProviderResult};
use agromon_provider::{ForecastPayload, ForecastProvider, HourlySeries};
use agromon_server::app::build_http_app;
use agromon_server::cache::ResponseCache;
use agromon_server::config::ServerConfig;
use agromon_server::identity::{IdentityProvider, UserIdentity};
use agromon_server::rate_limit::RateLimiter;
use agromon_server::state::AppState;
use agromon_storage::engine::SqliteForecastStore;
use agromon_storage::ForecastStore;

/// Canned upstream: either always returns the same payload or always fails,
/// counting fetch invocations either way.
pub struct MockProvider {
    payload: Option<ForecastPayload>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn returning(payload: ForecastPayload) -> Arc<Self> {
        Arc::new(Self {
            payload: Some(payload),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            payload: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock-meteo"
    }

    async fn fetch_hourly(
        &self,
        _lat: f64,
        _lng: f64,
        _forecast_days: u8,
    ) -> ProviderResult<ForecastPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.payload {
            Some(payload) => Ok(payload.clone()),
            None => Err(ProviderError::Http {
                status: 503,
                body: "upstream unavailable".to_string(),
            }),
        }
    }
}

/// Token → user-id map standing in for the identity service.
pub struct MockIdentity {
    users: HashMap<String, String>,
}

impl MockIdentity {
    pub fn with_users(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            users: pairs
                .iter()
                .map(|(token, id)| (token.to_string(), id.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn resolve(&self, token: &str) -> anyhow::Result<Option<UserIdentity>> {
        Ok(self
            .users
            .get(token)
            .map(|id| UserIdentity { id: id.clone() }))
    }
}

pub fn base_hour() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap()
}

/// A calm `hours`-long payload: every rule stays well inside its bounds.
pub fn hourly_payload(hours: usize) -> ForecastPayload {
    let time = (0..hours)
        .map(|i| {
            (base_hour() + Duration::hours(i as i64))
                .format("%Y-%m-%dT%H:%M")
                .to_string()
        })
        .collect();
    let fill = |v: f64| Some(vec![Some(v); hours]);
    ForecastPayload {
        latitude: 12.97,
        longitude: 77.59,
        elevation: Some(920.0),
        hourly: Some(HourlySeries {
            time,
            temperature_2m: fill(24.0),
            relativehumidity_2m: fill(60.0),
            precipitation: fill(0.0),
            windspeed_10m: fill(9.0),
            winddirection_10m: fill(180.0),
        }),
    }
}

/// App + state over a fresh temp-dir store. The `MockConnectInfo` layer
/// fakes a single client socket for every request, which is exactly what the
/// rate-limit tests need.
pub fn build_server(
    config: ServerConfig,
    provider: Arc<dyn ForecastProvider>,
    identity: Option<Arc<dyn IdentityProvider>>,
) -> (Router, AppState, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn ForecastStore> = Arc::new(SqliteForecastStore::new(tmp.path()).unwrap());

    let state = AppState {
        store,
        provider,
        identity,
        alert_engine: Arc::new(AlertEngine::with_default_rules()),
        cache: Arc::new(ResponseCache::new(config.cache.ttl_secs)),
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        )),
        start_time: Utc::now(),
        config: Arc::new(config),
    };

    let app = build_http_app(state.clone())
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4321))));
    (app, state, tmp)
}
