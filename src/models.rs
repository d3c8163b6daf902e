//! Data models.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};

use crate::errors::WeatherError;

/// MOSMIX station identifier
///
/// DWD identifies forecast points by short alphanumeric codes, either a WMO
/// number (`10865`) or an internal id (`P830`, `N2147`). The id is also part
/// of the download URL, so anything else is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationId(String);

impl TryFrom<&str> for StationId {
    type Error = WeatherError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty()
            || value.len() > 8
            || !value.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(WeatherError::InvalidStationId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl StationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One forecast time step of a MOSMIX station
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastSample {
    /// Valid time of the forecast (UTC, naive)
    pub ts: NaiveDateTime,
    /// Temperature 2 m above ground in °C
    pub temperature: f64,
    /// Surface pressure reduced to sea level in hPa
    pub pressure: f64,
    /// Maximum wind gust within the last hour in m/s
    pub wind_gust_max: f64,
    /// Significant weather code
    pub weather_code: i32,
    /// Sunshine duration during the last hour in minutes
    pub sunshine_minutes: i32,
    /// Effective cloud cover in %
    pub cloud_cover: f64,
    /// Probability of precipitation > 0.1 mm during the last hour in %
    pub rain_probability: f64,
    /// Total precipitation during the last hour in kg/m²
    pub precipitation_1h: f64,
    /// Mean wind speed in m/s
    pub wind_speed: f64,
    /// Temperature 5 cm above ground in °C
    pub soil_temperature: f64,
    /// Global irradiance within the last hour in kJ/m²
    pub solar_irradiance: f64,
}

/// All samples of one MOSMIX issuance for one station
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBatch {
    pub station_id: StationId,
    /// Time the forecast was produced upstream (UTC, naive)
    pub issued_at: NaiveDateTime,
    /// Samples, ascending by `ts`
    pub samples: Vec<ForecastSample>,
}

impl ForecastBatch {
    /// First and last forecast timestamp covered by the batch
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.ts, last.ts))
    }
}

/// Forecast sample as read back from the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredForecast {
    pub station_id: String,
    pub issued_at: NaiveDateTime,
    pub sample: ForecastSample,
}

/// Free-text forecast as published on the DWD text product page
#[derive(Debug, Clone, PartialEq)]
pub struct TextForecast {
    pub ts: NaiveDateTime,
    pub flag: i32,
    pub text: String,
}

/// One sampling run of the local sensors
///
/// Values that could not be read are `None` and end up as NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub ts: NaiveDateTime,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub light: Option<bool>,
}

/// Significant weather code with its description
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherCode {
    pub code: i32,
    pub description: String,
}

/// Drop sub-second precision; all stored timestamps are whole seconds.
pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
