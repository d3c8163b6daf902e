//! Resampling and aggregation of readings and forecasts for the charts.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};

use crate::models::{SensorReading, StoredForecast, WeatherCode};

/// Sensor readings of one resampling bucket
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementBucket {
    pub start: NaiveDateTime,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    /// Median of the light flags, 0 (dark) to 1 (light)
    pub light: Option<f64>,
}

/// Forecast values averaged over all stations for one time step
#[derive(Debug, Clone, PartialEq)]
pub struct MeanForecast {
    pub ts: NaiveDateTime,
    pub temperature: f64,
    pub pressure: f64,
    pub wind_gust_max: f64,
    pub wind_speed: f64,
    pub sunshine_minutes: f64,
    pub precipitation_1h: f64,
    pub rain_probability: f64,
}

/// Dominant significant weather of one bucket
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherLabel {
    pub start: NaiveDateTime,
    pub code: i32,
    pub description: String,
}

/// Start of the `bucket`-sized interval containing `ts`, aligned to midnight
pub fn bucket_start(ts: NaiveDateTime, bucket: Duration) -> NaiveDateTime {
    let size = bucket.num_seconds().max(1);
    let midnight = ts.date().and_time(chrono::NaiveTime::MIN);
    let offset = (ts - midnight).num_seconds();
    midnight + Duration::seconds(offset - offset.rem_euclid(size))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value; on a tie the value seen first wins.
pub fn most_frequent<T: Copy + Eq + std::hash::Hash>(values: &[T]) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for v in values {
        *counts.entry(*v).or_default() += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for v in values {
        let count = counts[v];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((*v, count));
        }
    }
    best.map(|(v, _)| v)
}

/// Mean temperature and pressure and median light per bucket. Buckets
/// without any reading are left out.
pub fn resample_readings(readings: &[SensorReading], bucket: Duration) -> Vec<MeasurementBucket> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<&SensorReading>> = BTreeMap::new();
    for r in readings {
        groups.entry(bucket_start(r.ts, bucket)).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(start, rs)| {
            let temperature: Vec<f64> = rs.iter().filter_map(|r| r.temperature).collect();
            let pressure: Vec<f64> = rs.iter().filter_map(|r| r.pressure).collect();
            let light: Vec<f64> = rs
                .iter()
                .filter_map(|r| r.light)
                .map(|l| if l { 1.0 } else { 0.0 })
                .collect();
            MeasurementBucket {
                start,
                temperature: mean(&temperature),
                pressure: mean(&pressure),
                light: median(&light),
            }
        })
        .collect()
}

/// Timestamps of the last reading before the light flag changes
pub fn light_transitions(readings: &[SensorReading]) -> Vec<NaiveDateTime> {
    let flags: Vec<(NaiveDateTime, bool)> = readings
        .iter()
        .filter_map(|r| r.light.map(|l| (r.ts, l)))
        .collect();
    flags
        .windows(2)
        .filter(|w| w[0].1 != w[1].1)
        .map(|w| w[0].0)
        .collect()
}

fn span(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Pressure axis: measured range padded by 5 % on both sides
pub fn pressure_limits(buckets: &[MeasurementBucket]) -> Option<(f64, f64)> {
    let (lo, hi) = span(buckets.iter().filter_map(|b| b.pressure))?;
    let pad = 0.05 * (hi - lo);
    Some((lo - pad, hi + pad))
}

/// Temperature axis: padded measured range, covering at least −2…10 °C
pub fn temperature_limits(buckets: &[MeasurementBucket]) -> (f64, f64) {
    match span(buckets.iter().filter_map(|b| b.temperature)) {
        Some((lo, hi)) => {
            let pad = 0.05 * (hi - lo);
            ((lo - pad).min(-2.0), (hi + pad).max(10.0))
        }
        None => (-2.0, 10.0),
    }
}

/// Average all stations per forecast time step
pub fn mean_by_time(forecasts: &[StoredForecast]) -> Vec<MeanForecast> {
    let mut groups: BTreeMap<NaiveDateTime, Vec<&StoredForecast>> = BTreeMap::new();
    for f in forecasts {
        groups.entry(f.sample.ts).or_default().push(f);
    }

    groups
        .into_iter()
        .map(|(ts, fs)| {
            let avg = |field: fn(&StoredForecast) -> f64| {
                fs.iter().map(|f| field(f)).sum::<f64>() / fs.len() as f64
            };
            MeanForecast {
                ts,
                temperature: avg(|f| f.sample.temperature),
                pressure: avg(|f| f.sample.pressure),
                wind_gust_max: avg(|f| f.sample.wind_gust_max),
                wind_speed: avg(|f| f.sample.wind_speed),
                sunshine_minutes: avg(|f| f.sample.sunshine_minutes as f64),
                precipitation_1h: avg(|f| f.sample.precipitation_1h),
                rain_probability: avg(|f| f.sample.rain_probability),
            }
        })
        .collect()
}

/// Most frequent weather code per bucket, first across stations per time
/// step, then across the time steps of the bucket. Codes missing from the
/// lookup table are dropped.
pub fn dominant_weather(
    forecasts: &[StoredForecast],
    bucket: Duration,
    codes: &[WeatherCode],
) -> Vec<WeatherLabel> {
    let mut per_step: BTreeMap<NaiveDateTime, Vec<i32>> = BTreeMap::new();
    for f in forecasts {
        per_step.entry(f.sample.ts).or_default().push(f.sample.weather_code);
    }

    let mut per_bucket: BTreeMap<NaiveDateTime, Vec<i32>> = BTreeMap::new();
    for (ts, step_codes) in per_step {
        if let Some(code) = most_frequent(&step_codes) {
            per_bucket.entry(bucket_start(ts, bucket)).or_default().push(code);
        }
    }

    let descriptions: HashMap<i32, &str> = codes
        .iter()
        .map(|c| (c.code, c.description.as_str()))
        .collect();

    per_bucket
        .into_iter()
        .filter_map(|(start, bucket_codes)| {
            let code = most_frequent(&bucket_codes)?;
            let description = descriptions.get(&code)?;
            Some(WeatherLabel {
                start,
                code,
                description: description.to_string(),
            })
        })
        .collect()
}

/// Oldest issue time among the loaded forecast rows
pub fn oldest_issue(forecasts: &[StoredForecast]) -> Option<NaiveDateTime> {
    forecasts.iter().map(|f| f.issued_at).min()
}
