use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            provider: ProviderConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            ingest: IngestConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            request_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Admitted requests per client within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_rate_limit_max_requests(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for cached forecast responses.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval of the background task that drops expired entries.
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_cache_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Run the fan-out ingestion scheduler inside the server process.
    /// The `ingest` CLI subcommand performs one run regardless.
    #[serde(default = "default_ingest_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ingest_interval_secs")]
    pub interval_secs: u64,
    /// Forecast horizon requested per farm, in days.
    #[serde(default = "default_ingest_forecast_days")]
    pub forecast_days: u8,
    /// Pause between farms, capping the outbound request rate.
    #[serde(default = "default_ingest_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: default_ingest_enabled(),
            interval_secs: default_ingest_interval_secs(),
            forecast_days: default_ingest_forecast_days(),
            pause_ms: default_ingest_pause_ms(),
            batch_size: default_ingest_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity service resolving bearer tokens to user ids.
    /// When unset, farm queries are served without ownership gating.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_identity_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ---- Farm seed file types (used by the `init-farms` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSeedFile {
    #[serde(default)]
    pub farms: Vec<SeedFarm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFarm {
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

fn default_http_port() -> u16 {
    3000
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_provider_base_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rate_limit_max_requests() -> usize {
    20
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_cache_sweep_interval_secs() -> u64 {
    300
}

fn default_ingest_enabled() -> bool {
    false
}

fn default_ingest_interval_secs() -> u64 {
    3600
}

fn default_ingest_forecast_days() -> u8 {
    2
}

fn default_ingest_pause_ms() -> u64 {
    300
}

fn default_ingest_batch_size() -> usize {
    100
}

fn default_identity_timeout_secs() -> u64 {
    10
}
