use crate::{ForecastRow, ForecastStore};

/// Writes forecast rows in bounded contiguous batches, tolerating partial
/// failure.
///
/// A failed batch is recorded and the remaining batches are still attempted,
/// so a failure in a later time-window of a forecast never discards the
/// earlier window's usable data. Stateless across invocations.
pub struct BulkPersister {
    batch_size: usize,
}

/// Outcome of one persistence run.
#[derive(Debug, Clone, Default)]
pub struct PersistReport {
    /// Rows the caller should consider offered for storage, successful and
    /// failed attempts alike.
    pub rows_offered: usize,
    pub batches_attempted: usize,
    pub failures: Vec<BatchFailure>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One failed batch, kept for observability; never aborts the run.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub rows: usize,
    pub error: String,
}

impl BulkPersister {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Splits `rows` into contiguous batches and writes each independently,
    /// in order.
    pub fn persist(
        &self,
        store: &dyn ForecastStore,
        farm_id: &str,
        rows: &[ForecastRow],
    ) -> PersistReport {
        let mut failures = Vec::new();
        let mut batches_attempted = 0;

        for (index, chunk) in rows.chunks(self.batch_size).enumerate() {
            batches_attempted += 1;
            if let Err(e) = store.upsert_forecast_rows(chunk) {
                tracing::error!(
                    farm_id,
                    batch = index,
                    rows = chunk.len(),
                    error = %e,
                    "Forecast batch write failed"
                );
                failures.push(BatchFailure {
                    batch_index: index,
                    rows: chunk.len(),
                    error: e.to_string(),
                });
            }
        }

        PersistReport {
            rows_offered: rows.len(),
            batches_attempted,
            failures,
        }
    }
}
