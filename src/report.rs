//! Weather and forecast charts from stored readings and forecasts.
//!
//! Sensor readings are stamped in local time, forecasts in UTC. Forecast
//! timestamps are shifted into the time zone of the report before they are
//! aggregated so that both end up on the same time axis.

pub mod aggregate;
pub mod chart;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use tracing::{debug, info};

use crate::{
    config::ReportConfig,
    database::Database,
    errors::WeatherError,
    models::{SensorReading, StoredForecast, WeatherCode},
};
use aggregate::{
    dominant_weather, light_transitions, mean_by_time, oldest_issue, pressure_limits,
    resample_readings, temperature_limits,
};
use chart::{ForecastChart, WeatherChart};

/// Pressure axis used when no pressure was measured in the window
const DEFAULT_PRESSURE_LIMITS: (f64, f64) = (980.0, 1040.0);

/// Everything the charts are drawn from
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub readings: Vec<SensorReading>,
    /// Forecasts valid from now on, timestamps in UTC
    pub forecasts: Vec<StoredForecast>,
    pub codes: Vec<WeatherCode>,
}

impl ReportData {
    pub async fn load<Tz: TimeZone>(
        db: &Database,
        config: &ReportConfig,
        now: &DateTime<Tz>,
    ) -> Result<Self, WeatherError> {
        let since = now.naive_local() - Duration::hours(config.measurement_hours.into());
        let data = Self {
            readings: db.readings_since(since).await?,
            forecasts: db.forecasts_from(now.naive_utc()).await?,
            codes: db.weather_codes().await?,
        };
        info!(
            "Loaded {} readings, {} forecast rows and {} weather codes",
            data.readings.len(),
            data.forecasts.len(),
            data.codes.len()
        );
        Ok(data)
    }
}

fn to_local<Tz: TimeZone>(tz: &Tz, ts: NaiveDateTime) -> NaiveDateTime {
    tz.from_utc_datetime(&ts).naive_local()
}

fn localize<'a, Tz: TimeZone>(
    tz: &'a Tz,
    forecasts: impl Iterator<Item = &'a StoredForecast> + 'a,
) -> impl Iterator<Item = StoredForecast> + 'a {
    forecasts.map(move |f| {
        let mut local = f.clone();
        local.issued_at = to_local(tz, f.issued_at);
        local.sample.ts = to_local(tz, f.sample.ts);
        local
    })
}

/// Measured weather of the window plus the forecast for the horizon.
/// `None` when there are no readings to draw.
pub fn build_weather_chart<Tz: TimeZone>(
    data: &ReportData,
    config: &ReportConfig,
    now: &DateTime<Tz>,
) -> Option<WeatherChart> {
    let tz = now.timezone();
    let now_local = now.naive_local();
    let from = now_local - Duration::hours(config.measurement_hours.into());
    let horizon = now.naive_utc() + Duration::hours(config.forecast_hours.into());

    let readings: Vec<SensorReading> = data
        .readings
        .iter()
        .filter(|r| r.ts >= from && r.ts <= now_local)
        .cloned()
        .collect();
    let buckets = resample_readings(&readings, Duration::minutes(30));
    if buckets.is_empty() {
        return None;
    }

    let near: Vec<StoredForecast> = localize(
        &tz,
        data.forecasts
            .iter()
            .filter(|f| f.sample.ts >= now.naive_utc() && f.sample.ts <= horizon),
    )
    .collect();
    debug!("{} forecast rows within the weather chart horizon", near.len());

    Some(WeatherChart {
        title: format!("Weather, {}", now_local.format("%d.%m.%Y %H:%M")),
        from,
        to: to_local(&tz, horizon),
        transitions: light_transitions(&readings),
        forecast: mean_by_time(&near),
        labels: dominant_weather(&near, Duration::hours(2), &data.codes),
        temperature_limits: temperature_limits(&buckets),
        pressure_limits: pressure_limits(&buckets).unwrap_or(DEFAULT_PRESSURE_LIMITS),
        buckets,
    })
}

/// All loaded forecasts; `None` when there are none.
pub fn build_forecast_chart<Tz: TimeZone>(
    data: &ReportData,
    now: &DateTime<Tz>,
) -> Option<ForecastChart> {
    let tz = now.timezone();
    let forecasts: Vec<StoredForecast> = localize(
        &tz,
        data.forecasts.iter().filter(|f| f.sample.ts >= now.naive_utc()),
    )
    .collect();
    let issued = oldest_issue(&forecasts)?;

    Some(ForecastChart {
        title: format!(
            "Forecast, created {}, MOSMIX issued {}",
            now.naive_local().format("%d.%m.%Y %H:%M"),
            issued.format("%d.%m.%Y %H:%M")
        ),
        forecast: mean_by_time(&forecasts),
        labels: dominant_weather(&forecasts, Duration::hours(6), &data.codes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastSample;
    use chrono::{FixedOffset, NaiveDate, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn reading(ts: NaiveDateTime, temperature: f64) -> SensorReading {
        SensorReading {
            ts,
            temperature: Some(temperature),
            pressure: Some(1000.0 + temperature),
            light: Some(true),
        }
    }

    fn forecast(station: &str, issued_at: NaiveDateTime, ts: NaiveDateTime, code: i32) -> StoredForecast {
        StoredForecast {
            station_id: station.to_string(),
            issued_at,
            sample: ForecastSample {
                ts,
                temperature: 5.0,
                weather_code: code,
                ..Default::default()
            },
        }
    }

    fn data() -> ReportData {
        ReportData {
            readings: vec![
                reading(at(1, 9, 0), 4.0),
                reading(at(1, 9, 10), 6.0),
                reading(at(1, 11, 40), 8.0),
                // older than the measurement window
                reading(at(1, 0, 0), -20.0),
            ],
            forecasts: vec![
                forecast("P830", at(1, 3, 0), at(1, 12, 0), 61),
                forecast("10865", at(1, 6, 0), at(1, 12, 0), 61),
                forecast("P830", at(1, 3, 0), at(2, 6, 0), 2),
                forecast("P830", at(1, 3, 0), at(3, 6, 0), 2),
            ],
            codes: vec![
                WeatherCode {
                    code: 2,
                    description: "partly cloudy".to_string(),
                },
                WeatherCode {
                    code: 61,
                    description: "light rain".to_string(),
                },
            ],
        }
    }

    fn config() -> ReportConfig {
        ReportConfig {
            measurement_hours: 6,
            forecast_hours: 36,
            ..ReportConfig::default()
        }
    }

    #[test]
    fn weather_chart_in_utc() {
        let now = Utc.from_utc_datetime(&at(1, 12, 0));
        let chart = build_weather_chart(&data(), &config(), &now).unwrap();

        assert_eq!(chart.from, at(1, 6, 0));
        assert_eq!(chart.to, at(3, 0, 0));
        assert_eq!(
            chart.buckets.iter().map(|b| b.start).collect::<Vec<_>>(),
            vec![at(1, 9, 0), at(1, 11, 30)]
        );
        assert_eq!(chart.buckets[0].temperature, Some(5.0));
        assert_eq!(chart.temperature_limits, (-2.0, 10.0));
        let (p_lo, p_hi) = chart.pressure_limits;
        assert!((p_lo - 1004.85).abs() < 1e-9);
        assert!((p_hi - 1008.15).abs() < 1e-9);
        // the forecast for day 3 is beyond the 36 h horizon
        assert_eq!(chart.forecast.len(), 2);
        assert_eq!(chart.labels.len(), 2);
        assert_eq!(chart.labels[0].description, "light rain");
    }

    #[test]
    fn weather_chart_shifts_forecasts_to_local_time() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let now = tz.from_utc_datetime(&at(1, 11, 0));
        let chart = build_weather_chart(&data(), &config(), &now).unwrap();

        assert_eq!(chart.forecast[0].ts, at(1, 13, 0));
        assert_eq!(chart.labels[0].start, at(1, 12, 0));
    }

    #[test]
    fn weather_chart_needs_readings() {
        let now = Utc.from_utc_datetime(&at(5, 12, 0));
        assert!(build_weather_chart(&data(), &config(), &now).is_none());
    }

    #[test]
    fn forecast_chart_caption_names_oldest_issue() {
        let now = Utc.from_utc_datetime(&at(1, 12, 0));
        let chart = build_forecast_chart(&data(), &now).unwrap();

        assert_eq!(
            chart.title,
            "Forecast, created 01.03.2024 12:00, MOSMIX issued 01.03.2024 03:00"
        );
        assert_eq!(chart.forecast.len(), 3);
        assert_eq!(
            chart.labels.iter().map(|l| l.start).collect::<Vec<_>>(),
            vec![at(1, 12, 0), at(2, 6, 0), at(3, 6, 0)]
        );
    }

    #[test]
    fn forecast_chart_needs_forecasts() {
        let now = Utc.from_utc_datetime(&at(9, 0, 0));
        assert!(build_forecast_chart(&data(), &now).is_none());
    }
}
