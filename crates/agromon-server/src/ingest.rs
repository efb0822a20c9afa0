use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use agromon_provider::{fetch_readings, ForecastProvider};
use agromon_storage::persister::{BulkPersister, PersistReport};
use agromon_storage::{ForecastRow, ForecastStore};

use crate::config::IngestConfig;

/// Fan-out ingestion worker: fetch → normalize → persist for every tracked
/// farm, strictly sequentially, with a fixed pause between farms so the
/// inter-farm delay is effective as a rate control on the upstream provider.
pub struct IngestWorker {
    store: Arc<dyn ForecastStore>,
    provider: Arc<dyn ForecastProvider>,
    forecast_days: u8,
    pause: Duration,
    batch_size: usize,
}

/// Totals for one fan-out run, logged at completion. Ingestion has no
/// synchronous caller; failures are observable only here and in per-farm
/// logs.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub farms_ingested: usize,
    pub farms_skipped: usize,
    pub farms_failed: usize,
    pub rows_offered: usize,
    pub batches_failed: usize,
}

impl IngestWorker {
    pub fn new(
        store: Arc<dyn ForecastStore>,
        provider: Arc<dyn ForecastProvider>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            store,
            provider,
            forecast_days: config.forecast_days,
            pause: Duration::from_millis(config.pause_ms),
            batch_size: config.batch_size,
        }
    }

    /// Periodic scheduler loop; one fan-out run per tick.
    pub async fn run(&self, interval_secs: u64) {
        tracing::info!(
            interval_secs,
            forecast_days = self.forecast_days,
            "Ingestion scheduler started"
        );
        let mut tick = interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            tick.tick().await;
            self.run_once().await;
        }
    }

    /// One fan-out pass over all farms. A farm without coordinates is
    /// skipped; one farm's failure never aborts the rest of the run.
    pub async fn run_once(&self) -> IngestSummary {
        let farms = match self.store.list_farms() {
            Ok(farms) => farms,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list farms, skipping ingestion run");
                return IngestSummary::default();
            }
        };
        tracing::info!(count = farms.len(), "Starting ingestion run");

        let mut summary = IngestSummary::default();
        for farm in farms {
            let (Some(lat), Some(lng)) = (farm.lat, farm.lng) else {
                tracing::debug!(farm_id = %farm.id, "Skipping farm without coordinates");
                summary.farms_skipped += 1;
                continue;
            };

            match self.ingest_farm(&farm.id, lat, lng).await {
                Ok(report) => {
                    summary.farms_ingested += 1;
                    summary.rows_offered += report.rows_offered;
                    summary.batches_failed += report.failures.len();
                    tracing::info!(
                        farm_id = %farm.id,
                        rows = report.rows_offered,
                        failed_batches = report.failures.len(),
                        "Stored hourly rows for farm"
                    );
                }
                Err(e) => {
                    summary.farms_failed += 1;
                    tracing::error!(farm_id = %farm.id, error = %e, "Farm ingestion failed");
                }
            }

            tokio::time::sleep(self.pause).await;
        }

        tracing::info!(
            farms_ingested = summary.farms_ingested,
            farms_skipped = summary.farms_skipped,
            farms_failed = summary.farms_failed,
            rows_offered = summary.rows_offered,
            batches_failed = summary.batches_failed,
            "Ingestion run finished"
        );
        summary
    }

    async fn ingest_farm(&self, farm_id: &str, lat: f64, lng: f64) -> anyhow::Result<PersistReport> {
        let (payload, readings) =
            fetch_readings(self.provider.as_ref(), lat, lng, self.forecast_days).await?;
        if readings.is_empty() {
            tracing::warn!(farm_id, "No hourly payload for farm");
            return Ok(PersistReport::default());
        }

        let raw = serde_json::to_value(&payload)?;
        let now = Utc::now();
        let rows: Vec<ForecastRow> = readings
            .iter()
            .map(|reading| {
                ForecastRow::from_reading(
                    farm_id,
                    lat,
                    lng,
                    self.provider.name(),
                    reading,
                    Some(raw.clone()),
                    now,
                )
            })
            .collect();

        Ok(BulkPersister::new(self.batch_size).persist(self.store.as_ref(), farm_id, &rows))
    }
}
