use std::path::Path;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use weather_recorder::{
    config::{
        AppConfig, DatabaseConfig, ForecastConfig, ReportConfig, SensorConfig, TextForecastConfig,
    },
    database::Database,
    jobs,
};

/// Nothing listens on the discard port, so every query fails to connect.
const UNREACHABLE_URL: &str = "postgres://weather@127.0.0.1:9/weather";

fn config_for(dir: &Path) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: UNREACHABLE_URL.to_string(),
            connect_timeout: Duration::from_secs(2),
        },
        forecast: ForecastConfig::default(),
        text_forecast: TextForecastConfig {
            url: "http://127.0.0.1:9/text".to_string(),
            request_timeout: Duration::from_secs(2),
            ..TextForecastConfig::default()
        },
        sensor: SensorConfig {
            gpio_root: dir.join("gpio"),
            barometer_dir: dir.join("iio"),
            retries: 0,
            retry_pause: Duration::ZERO,
            ..SensorConfig::default()
        },
        report: ReportConfig::default(),
    }
}

async fn unreachable_database() -> Database {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy(UNREACHABLE_URL)
        .unwrap();
    Database::new(pool).await.unwrap()
}

#[tokio::test]
async fn test_failed_reading_insert_is_logged_only() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config_for(temp_dir.path());
    let db = unreachable_database().await;

    assert!(jobs::run_sample(&config, &db).await.is_ok());
}

#[tokio::test]
async fn test_failed_text_download_is_logged_only() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config_for(temp_dir.path());
    let db = unreachable_database().await;

    assert!(jobs::run_text(&config, &db).await.is_ok());
}
