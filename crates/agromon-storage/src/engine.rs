use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::Result;
use crate::{FarmRow, ForecastRow, ForecastStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS farms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner_id TEXT,
    lat REAL,
    lng REAL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS weather_data (
    id TEXT PRIMARY KEY,
    farm_id TEXT NOT NULL,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    provider TEXT NOT NULL,
    data_type TEXT NOT NULL,
    target_time INTEGER NOT NULL,
    temp REAL,
    humidity REAL,
    precip REAL,
    wind_speed REAL,
    wind_dir REAL,
    raw TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(farm_id, target_time)
);
CREATE INDEX IF NOT EXISTS idx_weather_farm_time
    ON weather_data(farm_id, target_time);
";

/// SQLite-backed [`ForecastStore`], one database file in WAL mode.
pub struct SqliteForecastStore {
    conn: Mutex<Connection>,
}

impl SqliteForecastStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join("agromon.db"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ForecastStore for SqliteForecastStore {
    fn upsert_forecast_rows(&self, rows: &[ForecastRow]) -> Result<usize> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO weather_data
                     (id, farm_id, lat, lng, provider, data_type, target_time,
                      temp, humidity, precip, wind_speed, wind_dir, raw,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(farm_id, target_time) DO UPDATE SET
                     lat = excluded.lat,
                     lng = excluded.lng,
                     provider = excluded.provider,
                     data_type = excluded.data_type,
                     temp = excluded.temp,
                     humidity = excluded.humidity,
                     precip = excluded.precip,
                     wind_speed = excluded.wind_speed,
                     wind_dir = excluded.wind_dir,
                     raw = excluded.raw,
                     updated_at = excluded.updated_at",
            )?;
            for row in rows {
                let raw_json = row.raw.as_ref().map(serde_json::to_string).transpose()?;
                stmt.execute(rusqlite::params![
                    &row.id,
                    &row.farm_id,
                    row.lat,
                    row.lng,
                    &row.provider,
                    &row.data_type,
                    row.target_time.timestamp_millis(),
                    row.temperature_c,
                    row.relative_humidity_pct,
                    row.precipitation_mm,
                    row.wind_speed_kmh,
                    row.wind_direction_deg,
                    raw_json,
                    row.created_at.timestamp_millis(),
                    row.updated_at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn query_forecast_range(
        &self,
        farm_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ForecastRow>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, farm_id, lat, lng, provider, data_type, target_time,
                    temp, humidity, precip, wind_speed, wind_dir, raw,
                    created_at, updated_at
             FROM weather_data
             WHERE farm_id = ?1 AND target_time >= ?2 AND target_time <= ?3
             ORDER BY target_time ASC",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![farm_id, from.timestamp_millis(), to.timestamp_millis()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, Option<f64>>(7)?,
                    row.get::<_, Option<f64>>(8)?,
                    row.get::<_, Option<f64>>(9)?,
                    row.get::<_, Option<f64>>(10)?,
                    row.get::<_, Option<f64>>(11)?,
                    row.get::<_, Option<String>>(12)?,
                    row.get::<_, i64>(13)?,
                    row.get::<_, i64>(14)?,
                ))
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            let (
                id,
                farm_id,
                lat,
                lng,
                provider,
                data_type,
                target_ms,
                temp,
                humidity,
                precip,
                wind_speed,
                wind_dir,
                raw_json,
                created_ms,
                updated_ms,
            ) = row?;
            let raw = raw_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .unwrap_or_default();
            results.push(ForecastRow {
                id,
                farm_id,
                lat,
                lng,
                provider,
                data_type,
                target_time: DateTime::from_timestamp_millis(target_ms).unwrap_or_default(),
                temperature_c: temp,
                relative_humidity_pct: humidity,
                precipitation_mm: precip,
                wind_speed_kmh: wind_speed,
                wind_direction_deg: wind_dir,
                raw,
                created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
                updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_default(),
            });
        }
        Ok(results)
    }

    fn insert_farm(&self, farm: &FarmRow) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO farms (id, name, owner_id, lat, lng, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &farm.id,
                &farm.name,
                &farm.owner_id,
                farm.lat,
                farm.lng,
                farm.created_at.timestamp_millis(),
                farm.updated_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_farm(&self, id: &str) -> Result<Option<FarmRow>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, owner_id, lat, lng, created_at, updated_at
             FROM farms WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], map_farm_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_farms(&self) -> Result<Vec<FarmRow>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, owner_id, lat, lng, created_at, updated_at
             FROM farms ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], map_farm_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn map_farm_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FarmRow> {
    let created_ms: i64 = row.get(5)?;
    let updated_ms: i64 = row.get(6)?;
    Ok(FarmRow {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        lat: row.get(3)?,
        lng: row.get(4)?,
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_default(),
    })
}
