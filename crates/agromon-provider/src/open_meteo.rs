use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ProviderError, Result};
use crate::{ForecastPayload, ForecastProvider};

/// Hourly variables requested from the API. Kept in one place so the request
/// path and the ingestion worker always receive the same arrays.
const HOURLY_FIELDS: &str =
    "temperature_2m,relativehumidity_2m,precipitation,windspeed_10m,winddirection_10m";

/// HTTP client for the Open-Meteo forecast API.
///
/// Open-Meteo docs: <https://open-meteo.com/>
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// Builds a client against `base_url` (e.g. `https://api.open-meteo.com`)
    /// with a per-request timeout.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    fn name(&self) -> &'static str {
        "open-meteo"
    }

    async fn fetch_hourly(&self, lat: f64, lng: f64, forecast_days: u8) -> Result<ForecastPayload> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));

        let res = self
            .http
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("forecast_days", forecast_days.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let payload: ForecastPayload = serde_json::from_str(&body)?;
        Ok(payload)
    }
}

/// Truncate an error body for logs and error messages, snapping to a char
/// boundary so a multi-byte character is never split.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
