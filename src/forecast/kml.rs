//! Extraction of MOSMIX series from the KML document inside a KMZ bundle.
//!
//! The document carries one shared time axis (`dwd:ForecastTimeSteps`) and one
//! `dwd:Forecast` element per parameter, whose `dwd:value` child holds a
//! whitespace separated list of numbers, one per time step. Missing values
//! are published as a lone `-`.

use chrono::{DateTime, NaiveDateTime};
use roxmltree::{Document, Node};
use tracing::debug;

use crate::{
    errors::WeatherError,
    models::{truncate_to_seconds, ForecastBatch, ForecastSample, StationId},
};

/// A single parsed value token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    /// Decimal value, rounded to one decimal place
    Decimal(f64),
}

impl Numeric {
    pub fn value(self) -> f64 {
        match self {
            Numeric::Integer(v) => v as f64,
            Numeric::Decimal(v) => v,
        }
    }
}

/// Round the exact binary value to one decimal, ties to even. `284.45` is
/// stored as 284.4499… and becomes 284.4.
fn round_one_decimal(v: f64) -> f64 {
    format!("{:.1}", v).parse().unwrap_or(v)
}

/// Parse one value token of series `element`.
///
/// A lone hyphen marks a missing value and is read as 0.
pub fn parse_token(element: &str, token: &str) -> Result<Numeric, WeatherError> {
    if token == "-" {
        return Ok(Numeric::Integer(0));
    }
    if let Ok(v) = token.parse::<i64>() {
        return Ok(Numeric::Integer(v));
    }
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Numeric::Decimal(round_one_decimal(v))),
        _ => Err(WeatherError::InvalidToken {
            element: element.to_string(),
            token: token.to_string(),
        }),
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.1
}

pub fn pascal_to_hectopascal(pascal: f64) -> f64 {
    pascal / 100.0
}

/// Seconds of sunshine per hour to whole minutes, ties rounded to even
pub fn seconds_to_minutes(seconds: f64) -> i32 {
    (seconds / 60.0).round_ties_even() as i32
}

/// Parse a MOSMIX timestamp (`2024-03-01T04:00:00.000Z`) into naive UTC.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, WeatherError> {
    let value = value.trim();
    let naive = match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.naive_utc(),
        Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|_| WeatherError::InvalidTimestamp(value.to_string()))?,
    };
    Ok(truncate_to_seconds(naive))
}

fn is_element(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn find_element<'a, 'input>(
    doc: &'a Document<'input>,
    name: &str,
) -> Result<Node<'a, 'input>, WeatherError> {
    doc.descendants()
        .find(|n| is_element(n, name))
        .ok_or_else(|| WeatherError::MissingElement(name.to_string()))
}

fn issue_time(doc: &Document) -> Result<NaiveDateTime, WeatherError> {
    let node = find_element(doc, "IssueTime")?;
    parse_timestamp(node.text().unwrap_or_default())
}

fn time_steps(doc: &Document) -> Result<Vec<NaiveDateTime>, WeatherError> {
    find_element(doc, "ForecastTimeSteps")?
        .children()
        .filter(|n| is_element(n, "TimeStep"))
        .map(|n| parse_timestamp(n.text().unwrap_or_default()))
        .collect()
}

/// Values of series `element`, which must have exactly `expected` entries.
fn series(doc: &Document, element: &str, expected: usize) -> Result<Vec<f64>, WeatherError> {
    let forecast = doc
        .descendants()
        .find(|n| {
            is_element(n, "Forecast")
                && n.attributes()
                    .any(|a| a.name() == "elementName" && a.value() == element)
        })
        .ok_or_else(|| WeatherError::MissingSeries(element.to_string()))?;

    let text = forecast
        .children()
        .find(|n| n.is_element())
        .and_then(|n| n.text())
        .unwrap_or_default();

    let values = text
        .split_whitespace()
        .map(|token| parse_token(element, token).map(Numeric::value))
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() != expected {
        return Err(WeatherError::InconsistentSeriesLength {
            element: element.to_string(),
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Extract all forecast samples of one KML document.
pub fn extract_forecast(xml: &str, station_id: StationId) -> Result<ForecastBatch, WeatherError> {
    let doc = Document::parse(xml)?;

    let issued_at = issue_time(&doc)?;
    let steps = time_steps(&doc)?;
    let n = steps.len();
    debug!("Station {} issued {}: {} time steps", station_id, issued_at, n);

    let temperature = series(&doc, "TTT", n)?;
    let pressure = series(&doc, "PPPP", n)?;
    let wind_gust_max = series(&doc, "FX1", n)?;
    let weather_code = series(&doc, "ww", n)?;
    let sunshine = series(&doc, "SunD1", n)?;
    let cloud_cover = series(&doc, "Neff", n)?;
    let rain_probability = series(&doc, "R101", n)?;
    let precipitation_1h = series(&doc, "RR1c", n)?;
    let wind_speed = series(&doc, "FF", n)?;
    let soil_temperature = series(&doc, "T5cm", n)?;
    let solar_irradiance = series(&doc, "Rad1h", n)?;

    let mut samples: Vec<ForecastSample> = steps
        .into_iter()
        .enumerate()
        .map(|(i, ts)| ForecastSample {
            ts,
            temperature: kelvin_to_celsius(temperature[i]),
            pressure: pascal_to_hectopascal(pressure[i]),
            wind_gust_max: wind_gust_max[i],
            weather_code: weather_code[i].round() as i32,
            sunshine_minutes: seconds_to_minutes(sunshine[i]),
            cloud_cover: cloud_cover[i],
            rain_probability: rain_probability[i],
            precipitation_1h: precipitation_1h[i],
            wind_speed: wind_speed[i],
            soil_temperature: kelvin_to_celsius(soil_temperature[i]),
            solar_irradiance: solar_irradiance[i],
        })
        .collect();
    samples.sort_by_key(|s| s.ts);

    Ok(ForecastBatch {
        station_id,
        issued_at,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = include_str!("../../tests/fixtures/mosmix_sample.kml");

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn p830() -> StationId {
        StationId::try_from("P830").unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn token_hyphen_is_zero() {
        assert_eq!(parse_token("TTT", "-").unwrap(), Numeric::Integer(0));
    }

    #[test]
    fn token_integer() {
        assert_eq!(parse_token("ww", "123").unwrap(), Numeric::Integer(123));
    }

    #[test]
    fn token_decimal_rounded_to_one_place() {
        assert_eq!(parse_token("FF", "45.6").unwrap(), Numeric::Decimal(45.6));
        assert_eq!(parse_token("FF", "45.66").unwrap(), Numeric::Decimal(45.7));
        assert_eq!(parse_token("TTT", "284.45").unwrap(), Numeric::Decimal(284.4));
        assert_eq!(parse_token("TTT", "273.65").unwrap(), Numeric::Decimal(273.6));
        assert_eq!(parse_token("RR1c", "0.25").unwrap(), Numeric::Decimal(0.2));
        assert_eq!(parse_token("RR1c", "0.15").unwrap(), Numeric::Decimal(0.1));
        assert_eq!(parse_token("FF", "2.05").unwrap(), Numeric::Decimal(2.0));
    }

    #[test]
    fn token_garbage_is_error() {
        let err = parse_token("FF", "n/a").unwrap_err();
        assert!(matches!(err, WeatherError::InvalidToken { ref element, .. } if element == "FF"));
        assert!(parse_token("FF", "NaN").is_err());
    }

    #[test]
    fn unit_conversions() {
        assert_close(kelvin_to_celsius(300.0), 26.9);
        assert_close(pascal_to_hectopascal(101325.0), 1013.25);
        assert_eq!(seconds_to_minutes(1800.0), 30);
        assert_eq!(seconds_to_minutes(150.0), 2);
        assert_eq!(seconds_to_minutes(210.0), 4);
    }

    #[test]
    fn timestamps_are_naive_utc() {
        assert_eq!(parse_timestamp("2024-03-01T04:00:00.000Z").unwrap(), at(4));
        assert_eq!(parse_timestamp("2024-03-01T05:00:00+01:00").unwrap(), at(4));
        assert_eq!(parse_timestamp(" 2024-03-01T04:00:00 ").unwrap(), at(4));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn extract_sample_document() {
        let batch = extract_forecast(SAMPLE, p830()).unwrap();

        assert_eq!(batch.station_id, p830());
        assert_eq!(batch.issued_at, at(3));
        assert_eq!(batch.samples.len(), 3);
        assert_eq!(
            batch.samples.iter().map(|s| s.ts).collect::<Vec<_>>(),
            vec![at(4), at(5), at(6)]
        );

        let first = &batch.samples[0];
        assert_close(first.temperature, 26.9);
        assert_close(first.pressure, 1013.25);
        assert_close(first.wind_gust_max, 4.6);
        assert_eq!(first.weather_code, 2);
        assert_eq!(first.sunshine_minutes, 0);
        assert_close(first.cloud_cover, 88.0);
        assert_close(first.rain_probability, 12.0);
        assert_close(first.precipitation_1h, 0.0);
        assert_close(first.wind_speed, 2.1);
        assert_close(first.solar_irradiance, 0.0);

        let second = &batch.samples[1];
        assert_eq!(second.weather_code, 61);
        assert_eq!(second.sunshine_minutes, 30);
        assert_close(second.precipitation_1h, 0.4);

        let last = &batch.samples[2];
        assert_close(last.temperature, -273.1);
        assert_eq!(last.weather_code, 0);
        assert_eq!(last.sunshine_minutes, 2);
        assert_close(last.solar_irradiance, 410.0);
    }

    #[test]
    fn extract_sorts_by_timestamp() {
        let shuffled = SAMPLE
            .replace("2024-03-01T04:00:00.000Z</dwd:TimeStep>", "2024-03-01T07:00:00.000Z</dwd:TimeStep>");
        let batch = extract_forecast(&shuffled, p830()).unwrap();

        assert_eq!(
            batch.samples.iter().map(|s| s.ts).collect::<Vec<_>>(),
            vec![at(5), at(6), at(7)]
        );
        // the 300 K value belonged to the step that moved to the end
        assert_close(batch.samples[2].temperature, 26.9);
    }

    #[test]
    fn ragged_series_is_an_error() {
        let ragged = SAMPLE.replace("0.00   0.44   0.10", "0.00   0.44");
        let err = extract_forecast(&ragged, p830()).unwrap_err();

        match err {
            WeatherError::InconsistentSeriesLength {
                element,
                expected,
                actual,
            } => {
                assert_eq!(element, "RR1c");
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_series_is_an_error() {
        let missing = SAMPLE.replace("elementName=\"Neff\"", "elementName=\"N\"");
        let err = extract_forecast(&missing, p830()).unwrap_err();
        assert!(matches!(err, WeatherError::MissingSeries(ref e) if e == "Neff"));
    }

    #[test]
    fn missing_issue_time_is_an_error() {
        let missing = SAMPLE
            .replace("<dwd:IssueTime>", "<dwd:Issued>")
            .replace("</dwd:IssueTime>", "</dwd:Issued>");
        let err = extract_forecast(&missing, p830()).unwrap_err();
        assert!(matches!(err, WeatherError::MissingElement(ref e) if e == "IssueTime"));
    }
}
