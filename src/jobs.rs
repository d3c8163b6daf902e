//! Batch flows run by the subcommands

use chrono::Local;
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    database::Database,
    errors::WeatherError,
    forecast::ForecastClient,
    models::{truncate_to_seconds, StationId, TextForecast},
    report::{self, chart, ReportData},
    sensor::Sampler,
    text::{check_text, TextForecastClient},
};

/// Fetch and store the latest MOSMIX forecast of every configured station.
///
/// A failing station is logged and the next one is processed.
pub async fn run_forecast(config: &AppConfig, db: &Database) -> Result<(), WeatherError> {
    let client = ForecastClient::new(&config.forecast)?;

    for station in &config.forecast.stations {
        let station_id = match StationId::try_from(station.as_str()) {
            Ok(id) => id,
            Err(e) => {
                error!("Skipping station: {}", e);
                continue;
            }
        };

        let batch = match client.fetch(&station_id).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Forecast for station {} failed: {}", station_id, e);
                continue;
            }
        };
        info!(
            "Station {}: {} samples issued {}",
            station_id,
            batch.samples.len(),
            batch.issued_at
        );

        if let Err(e) = db.replace_forecast(&batch).await {
            error!("Storing forecast for station {} failed: {}", station_id, e);
        }
    }

    Ok(())
}

/// Fetch the text forecast and store it unless it is empty, malformed or
/// unchanged.
pub async fn run_text(config: &AppConfig, db: &Database) -> Result<(), WeatherError> {
    let client = TextForecastClient::new(&config.text_forecast)?;
    let text = match client.fetch().await {
        Ok(text) => text,
        Err(e) => {
            error!("Text forecast download failed: {}", e);
            return Ok(());
        }
    };

    let latest = db.latest_text(config.text_forecast.flag).await?;
    if let Err(rejection) = check_text(&text, latest.as_deref()) {
        warn!("Text forecast not stored: {}", rejection);
        return Ok(());
    }

    let forecast = TextForecast {
        ts: truncate_to_seconds(Local::now().naive_local()),
        flag: config.text_forecast.flag,
        text,
    };
    match db.insert_text(&forecast).await {
        Ok(id) => info!("Stored text forecast {}", id),
        Err(e) => error!("Error when inserting text forecast: {}", e),
    }
    Ok(())
}

/// Read the sensors once and store the result. A failed insert is logged
/// only.
pub async fn run_sample(config: &AppConfig, db: &Database) -> Result<(), WeatherError> {
    let mut sampler = Sampler::from_config(&config.sensor)?;
    let reading = sampler.sample().await;
    match db.insert_reading(&reading).await {
        Ok(id) => info!("Stored sensor reading {}", id),
        Err(e) => error!("Error when inserting sensor reading {:?}: {}", reading, e),
    }
    Ok(())
}

/// Render the weather and forecast charts.
pub async fn run_report(config: &AppConfig, db: &Database) -> Result<(), WeatherError> {
    let report_config = &config.report;
    report_config.validate()?;
    let size = (report_config.width, report_config.height);

    let now = Local::now();
    let data = ReportData::load(db, report_config, &now).await?;

    match report::build_weather_chart(&data, report_config, &now) {
        Some(weather) => {
            match chart::draw_weather_chart(&report_config.weather_chart, size, &weather) {
                Ok(()) => info!("Wrote {}", report_config.weather_chart.display()),
                Err(e) => error!("Weather chart failed: {}", e),
            }
        }
        None => warn!("No sensor readings in the last {} h", report_config.measurement_hours),
    }

    match report::build_forecast_chart(&data, &now) {
        Some(forecast) => {
            match chart::draw_forecast_chart(&report_config.forecast_chart, size, &forecast) {
                Ok(()) => info!("Wrote {}", report_config.forecast_chart.display()),
                Err(e) => error!("Forecast chart failed: {}", e),
            }
        }
        None => warn!("No forecasts stored for the time from now on"),
    }

    Ok(())
}
