// src/database/models.rs
use chrono::NaiveDateTime;

use crate::models::{ForecastSample, SensorReading, StoredForecast, WeatherCode};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ForecastRow {
    station_id: String,
    ts: NaiveDateTime,
    last_update: NaiveDateTime,
    temperature: f64,
    pressure: f64,
    wind_gust_max: f64,
    weather_code: i32,
    sunshine_minutes: i32,
    cloud_cover: f64,
    rain_probability: f64,
    precipitation_1h: f64,
    wind_speed: f64,
    soil_temperature: f64,
    solar_irradiance: f64,
}

impl From<ForecastRow> for StoredForecast {
    fn from(row: ForecastRow) -> Self {
        StoredForecast {
            station_id: row.station_id,
            issued_at: row.last_update,
            sample: ForecastSample {
                ts: row.ts,
                temperature: row.temperature,
                pressure: row.pressure,
                wind_gust_max: row.wind_gust_max,
                weather_code: row.weather_code,
                sunshine_minutes: row.sunshine_minutes,
                cloud_cover: row.cloud_cover,
                rain_probability: row.rain_probability,
                precipitation_1h: row.precipitation_1h,
                wind_speed: row.wind_speed,
                soil_temperature: row.soil_temperature,
                solar_irradiance: row.solar_irradiance,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SensorReadingRow {
    ts: NaiveDateTime,
    temperature: Option<f64>,
    pressure: Option<f64>,
    light: Option<bool>,
}

impl From<SensorReadingRow> for SensorReading {
    fn from(row: SensorReadingRow) -> Self {
        SensorReading {
            ts: row.ts,
            temperature: row.temperature,
            pressure: row.pressure,
            light: row.light,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct WeatherCodeRow {
    code: i32,
    description: String,
}

impl From<WeatherCodeRow> for WeatherCode {
    fn from(row: WeatherCodeRow) -> Self {
        WeatherCode {
            code: row.code,
            description: row.description,
        }
    }
}
