// src/database.rs
mod models;

use chrono::NaiveDateTime;
use sqlx::{postgres::PgPoolOptions, Connection, PgConnection, PgPool};
use tracing::{debug, error, info, warn};

use crate::{
    config::DatabaseConfig,
    errors::WeatherError,
    models::{
        ForecastBatch, ForecastSample, SensorReading, StoredForecast, StationId, TextForecast,
        WeatherCode,
    },
};
use models::{ForecastRow, SensorReadingRow, WeatherCodeRow};

/// Result of replacing one station's forecast batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Rows of older (or equal) issuances removed
    pub deleted: u64,
    pub inserted: u64,
    /// Rows that failed to insert and were skipped
    pub failed: u64,
    /// The batch was older than what is stored and was not written
    pub stale: bool,
}

/// Database handle of one batch run
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Wrap an existing pool
    pub async fn new(pool: PgPool) -> Result<Self, WeatherError> {
        Ok(Self { pool })
    }

    /// Open a single connection; every flow is sequential.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, WeatherError> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!("Error connecting to database: {}", e);
                e
            })?;
        info!("Connected to database");

        Self::new(pool).await
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), WeatherError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
        info!("Database connection closed");
    }

    /// Replace the stored forecast of a station by `batch`.
    ///
    /// Rows in the batch's time range issued no later than the batch are
    /// deleted and the batch inserted, all in one transaction. If a newer
    /// issuance already covers the range, nothing is touched. Rows failing
    /// to insert are rolled back individually and skipped.
    pub async fn replace_forecast(
        &self,
        batch: &ForecastBatch,
    ) -> Result<ReplaceOutcome, WeatherError> {
        let Some((first, last)) = batch.time_range() else {
            warn!("Forecast batch for station {} is empty", batch.station_id);
            return Ok(ReplaceOutcome::default());
        };
        let station = batch.station_id.as_str();
        let mut outcome = ReplaceOutcome::default();

        let mut tx = self.pool.begin().await?;

        let newest: Option<NaiveDateTime> = sqlx::query_scalar(
            "SELECT MAX(last_update) FROM forecasts
             WHERE station_id = $1 AND ts BETWEEN $2 AND $3",
        )
        .bind(station)
        .bind(first)
        .bind(last)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(newest) = newest {
            if newest > batch.issued_at {
                warn!(
                    "Station {} already has forecast issued {}, skipping older batch issued {}",
                    station, newest, batch.issued_at
                );
                tx.rollback().await?;
                outcome.stale = true;
                return Ok(outcome);
            }
        }

        info!("Deleting superseded forecast rows for station {}", station);
        outcome.deleted = sqlx::query(
            "DELETE FROM forecasts
             WHERE station_id = $1 AND ts BETWEEN $2 AND $3 AND last_update <= $4",
        )
        .bind(station)
        .bind(first)
        .bind(last)
        .bind(batch.issued_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for sample in &batch.samples {
            let mut savepoint = tx.begin().await?;
            match Self::insert_sample(&mut savepoint, &batch.station_id, batch.issued_at, sample)
                .await
            {
                Ok(()) => {
                    savepoint.commit().await?;
                    outcome.inserted += 1;
                }
                Err(e) => {
                    error!("Error when inserting row: {}, sample {:?}", e, sample);
                    savepoint.rollback().await?;
                    outcome.failed += 1;
                }
            }
        }

        tx.commit().await?;
        info!(
            "Station {}: deleted {}, inserted {}, failed {}",
            station, outcome.deleted, outcome.inserted, outcome.failed
        );
        Ok(outcome)
    }

    async fn insert_sample(
        conn: &mut PgConnection,
        station_id: &StationId,
        issued_at: NaiveDateTime,
        sample: &ForecastSample,
    ) -> Result<(), WeatherError> {
        sqlx::query(
            "INSERT INTO forecasts (
                ts, station_id, last_update, temperature, pressure,
                wind_gust_max, weather_code, sunshine_minutes, cloud_cover,
                rain_probability, precipitation_1h, wind_speed,
                soil_temperature, solar_irradiance
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(sample.ts)
        .bind(station_id.as_str())
        .bind(issued_at)
        .bind(sample.temperature)
        .bind(sample.pressure)
        .bind(sample.wind_gust_max)
        .bind(sample.weather_code)
        .bind(sample.sunshine_minutes)
        .bind(sample.cloud_cover)
        .bind(sample.rain_probability)
        .bind(sample.precipitation_1h)
        .bind(sample.wind_speed)
        .bind(sample.soil_temperature)
        .bind(sample.solar_irradiance)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Most recent text stored with `flag`
    pub async fn latest_text(&self, flag: i32) -> Result<Option<String>, WeatherError> {
        let latest = sqlx::query_scalar(
            "SELECT body FROM forecast_texts WHERE flag = $1 ORDER BY ts DESC, id DESC LIMIT 1",
        )
        .bind(flag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(latest)
    }

    /// Insert a text forecast, returning its id
    pub async fn insert_text(&self, text: &TextForecast) -> Result<i64, WeatherError> {
        let id = sqlx::query_scalar(
            "INSERT INTO forecast_texts (ts, flag, body) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(text.ts)
        .bind(text.flag)
        .bind(&text.text)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert a sensor reading, returning its id
    pub async fn insert_reading(&self, reading: &SensorReading) -> Result<i64, WeatherError> {
        let id = sqlx::query_scalar(
            "INSERT INTO sensor_readings (ts, temperature, pressure, light)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(reading.ts)
        .bind(reading.temperature)
        .bind(reading.pressure)
        .bind(reading.light)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Sensor readings taken at or after `since`, oldest first
    pub async fn readings_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<SensorReading>, WeatherError> {
        let rows: Vec<SensorReadingRow> = sqlx::query_as(
            "SELECT ts, temperature, pressure, light FROM sensor_readings
             WHERE ts >= $1 ORDER BY ts",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        debug!("Loaded {} sensor readings", rows.len());
        Ok(rows.into_iter().map(SensorReading::from).collect())
    }

    /// Forecast rows of all stations valid at or after `from`
    pub async fn forecasts_from(
        &self,
        from: NaiveDateTime,
    ) -> Result<Vec<StoredForecast>, WeatherError> {
        let rows: Vec<ForecastRow> = sqlx::query_as(
            "SELECT station_id, ts, last_update, temperature, pressure,
                    wind_gust_max, weather_code, sunshine_minutes, cloud_cover,
                    rain_probability, precipitation_1h, wind_speed,
                    soil_temperature, solar_irradiance
             FROM forecasts WHERE ts >= $1 ORDER BY ts, station_id",
        )
        .bind(from)
        .fetch_all(&self.pool)
        .await?;
        debug!("Loaded {} forecast rows", rows.len());
        Ok(rows.into_iter().map(StoredForecast::from).collect())
    }

    pub async fn weather_codes(&self) -> Result<Vec<WeatherCode>, WeatherError> {
        let rows: Vec<WeatherCodeRow> =
            sqlx::query_as("SELECT code, description FROM weather_codes ORDER BY code")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(WeatherCode::from).collect())
    }
}
