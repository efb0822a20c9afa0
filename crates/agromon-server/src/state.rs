use std::sync::Arc;

use chrono::{DateTime, Utc};

use agromon_alert::engine::AlertEngine;
use agromon_provider::ForecastProvider;
use agromon_storage::ForecastStore;

use crate::api::ForecastResponse;
use crate::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::identity::IdentityProvider;
use crate::rate_limit::RateLimiter;

/// Shared handles threaded through every handler. All collaborators are
/// constructed once at process start; tests substitute the trait objects.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ForecastStore>,
    pub provider: Arc<dyn ForecastProvider>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub alert_engine: Arc<AlertEngine>,
    pub cache: Arc<ResponseCache<ForecastResponse>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
