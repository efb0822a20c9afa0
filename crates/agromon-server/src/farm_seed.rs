use std::collections::HashSet;

use chrono::Utc;

use agromon_storage::{FarmRow, ForecastStore};

use crate::config::FarmSeedFile;

/// Initialize farms from a JSON seed file. Farms whose name already exists
/// are skipped, so re-running the subcommand is harmless.
pub fn init_from_seed_file(store: &dyn ForecastStore, seed_path: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: FarmSeedFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let existing_names: HashSet<String> =
        store.list_farms()?.into_iter().map(|f| f.name).collect();

    let mut created = 0u32;
    let mut skipped = 0u32;

    for farm in &seed.farms {
        if existing_names.contains(&farm.name) {
            tracing::warn!(name = %farm.name, "Farm already exists, skipping");
            skipped += 1;
            continue;
        }

        let now = Utc::now();
        let row = FarmRow {
            id: agromon_common::id::next_id(),
            name: farm.name.clone(),
            owner_id: farm.owner_id.clone(),
            lat: farm.lat,
            lng: farm.lng,
            created_at: now,
            updated_at: now,
        };

        match store.insert_farm(&row) {
            Ok(()) => {
                tracing::info!(name = %farm.name, id = %row.id, "Farm created");
                created += 1;
            }
            Err(e) => {
                tracing::error!(name = %farm.name, error = %e, "Failed to create farm");
            }
        }
    }

    tracing::info!(created, skipped, "init-farms completed");
    Ok(())
}
