//! Chart rendering with plotters.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use plotters::coord::types::RangedDateTime;
use plotters::prelude::*;
use plotters::style::FontTransform;

use super::aggregate::{MeanForecast, MeasurementBucket, WeatherLabel};
use crate::errors::WeatherError;

const INDIGO: RGBColor = RGBColor(75, 0, 130);
const DEEP_SKY_BLUE: RGBColor = RGBColor(0, 191, 255);
const TURQUOISE: RGBColor = RGBColor(64, 224, 208);
const LIGHT_BLUE: RGBColor = RGBColor(173, 216, 230);
const GOLD: RGBColor = RGBColor(255, 215, 0);

/// Measured weather with the near-term forecast overlaid
#[derive(Debug, Clone)]
pub struct WeatherChart {
    pub title: String,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub buckets: Vec<MeasurementBucket>,
    /// Times at which the light sensor switched
    pub transitions: Vec<NaiveDateTime>,
    pub forecast: Vec<MeanForecast>,
    pub labels: Vec<WeatherLabel>,
    pub temperature_limits: (f64, f64),
    pub pressure_limits: (f64, f64),
}

/// Full-range forecast in two panels
#[derive(Debug, Clone)]
pub struct ForecastChart {
    pub title: String,
    pub forecast: Vec<MeanForecast>,
    pub labels: Vec<WeatherLabel>,
}

fn chart_error<E: std::fmt::Display>(e: E) -> WeatherError {
    WeatherError::ChartError(e.to_string())
}

fn label_style<'a>() -> TextStyle<'a> {
    ("sans-serif", 13)
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&BLACK.mix(0.6))
}

fn time_label(dt: &NaiveDateTime) -> String {
    dt.format("%a %d.%m. %H:%M").to_string()
}

/// Caption size for a drawing area of `height` pixels
fn title_font_size(height: u32) -> u32 {
    (height * 3 / 100).max(12)
}

fn upper_bound(values: impl Iterator<Item = f64>, floor: f64) -> f64 {
    values.fold(floor, f64::max) * 1.1
}

pub fn draw_weather_chart(
    path: &Path,
    size: (u32, u32),
    chart: &WeatherChart,
) -> Result<(), WeatherError> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let (p_lo, p_hi) = chart.pressure_limits;
    let (t_lo, t_hi) = chart.temperature_limits;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 3.percent_height()))
        .margin(1.percent())
        .x_label_area_size(8.percent_height())
        .y_label_area_size(7.percent_width())
        .right_y_label_area_size(7.percent_width())
        .build_cartesian_2d(RangedDateTime::from(chart.from..chart.to), p_lo..p_hi)
        .map_err(chart_error)?
        .set_secondary_coord(RangedDateTime::from(chart.from..chart.to), t_lo..t_hi);

    ctx.configure_mesh()
        .y_desc("Pressure in hPa")
        .x_label_formatter(&time_label)
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(chart_error)?;
    ctx.configure_secondary_axes()
        .y_desc("Temperature in °C")
        .draw()
        .map_err(chart_error)?;

    // Daylight shading, scaled to the full pressure axis
    ctx.draw_series(
        AreaSeries::new(
            chart
                .buckets
                .iter()
                .filter_map(|b| b.light.map(|l| (b.start, p_lo + l * (p_hi - p_lo)))),
            p_lo,
            GOLD.mix(0.2),
        )
        .border_style(GOLD.mix(0.4)),
    )
    .map_err(chart_error)?;

    ctx.draw_series(
        chart
            .transitions
            .iter()
            .map(|t| PathElement::new(vec![(*t, p_lo), (*t, p_hi)], GOLD.stroke_width(1))),
    )
    .map_err(chart_error)?;

    ctx.draw_series(LineSeries::new(
        chart
            .buckets
            .iter()
            .filter_map(|b| b.pressure.map(|p| (b.start, p))),
        INDIGO.stroke_width(2),
    ))
    .map_err(chart_error)?
    .label("Pressure")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], INDIGO));

    ctx.draw_secondary_series(LineSeries::new(
        chart
            .buckets
            .iter()
            .filter_map(|b| b.temperature.map(|t| (b.start, t))),
        RED.stroke_width(2),
    ))
    .map_err(chart_error)?
    .label("Temperature")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    ctx.draw_secondary_series(LineSeries::new(
        chart.forecast.iter().map(|f| (f.ts, f.temperature)),
        RED.mix(0.5).stroke_width(1),
    ))
    .map_err(chart_error)?
    .label("Forecast temperature")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.mix(0.5)));

    // Rain probability 0…100 % mapped onto the temperature axis
    ctx.draw_secondary_series(LineSeries::new(
        chart
            .forecast
            .iter()
            .map(|f| (f.ts, t_lo + f.rain_probability / 100.0 * (t_hi - t_lo))),
        DEEP_SKY_BLUE.stroke_width(1),
    ))
    .map_err(chart_error)?
    .label("Rain probability")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], DEEP_SKY_BLUE));

    ctx.draw_series(chart.labels.iter().map(|l| {
        Text::new(
            format!("{} ({})", l.description, l.code),
            (l.start, p_hi),
            label_style(),
        )
    }))
    .map_err(chart_error)?;

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}

pub fn draw_forecast_chart(
    path: &Path,
    size: (u32, u32),
    chart: &ForecastChart,
) -> Result<(), WeatherError> {
    let (Some(first), Some(last)) = (chart.forecast.first(), chart.forecast.last()) else {
        return Err(WeatherError::ChartError("No forecast to draw".to_string()));
    };
    let from = first.ts;
    let to = if last.ts > from { last.ts } else { from + Duration::hours(1) };

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;
    let root = root
        .titled(&chart.title, ("sans-serif", title_font_size(size.1)))
        .map_err(chart_error)?;
    let (upper, lower) = root.split_vertically(50.percent());

    let t_lo = chart.forecast.iter().map(|f| f.temperature).fold(f64::INFINITY, f64::min) - 1.0;
    let t_hi = chart
        .forecast
        .iter()
        .map(|f| f.temperature)
        .fold(f64::NEG_INFINITY, f64::max)
        + 1.0;
    let wind_hi = upper_bound(
        chart.forecast.iter().map(|f| f.wind_gust_max.max(f.wind_speed)),
        5.0,
    );

    let mut top = ChartBuilder::on(&upper)
        .margin(1.percent())
        .x_label_area_size(6.percent_height())
        .y_label_area_size(7.percent_width())
        .right_y_label_area_size(7.percent_width())
        .build_cartesian_2d(RangedDateTime::from(from..to), t_lo..t_hi)
        .map_err(chart_error)?
        .set_secondary_coord(RangedDateTime::from(from..to), 0.0..wind_hi);

    top.configure_mesh()
        .y_desc("Temperature in °C")
        .x_label_formatter(&time_label)
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(chart_error)?;
    top.configure_secondary_axes()
        .y_desc("Wind in m/s")
        .draw()
        .map_err(chart_error)?;

    // Sunshine minutes of the hour, scaled to the temperature axis
    top.draw_series(
        AreaSeries::new(
            chart
                .forecast
                .iter()
                .map(|f| (f.ts, t_lo + f.sunshine_minutes / 60.0 * (t_hi - t_lo))),
            t_lo,
            GOLD.mix(0.3),
        )
        .border_style(GOLD.mix(0.5)),
    )
    .map_err(chart_error)?
    .label("Sunshine")
    .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], GOLD.mix(0.3).filled()));

    top.draw_series(LineSeries::new(
        chart.forecast.iter().map(|f| (f.ts, f.temperature)),
        RED.stroke_width(2),
    ))
    .map_err(chart_error)?
    .label("Temperature")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    top.draw_secondary_series(LineSeries::new(
        chart.forecast.iter().map(|f| (f.ts, f.wind_gust_max)),
        GREEN.stroke_width(1),
    ))
    .map_err(chart_error)?
    .label("Gusts")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

    top.draw_secondary_series(LineSeries::new(
        chart.forecast.iter().map(|f| (f.ts, f.wind_speed)),
        TURQUOISE.stroke_width(1),
    ))
    .map_err(chart_error)?
    .label("Wind")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], TURQUOISE));

    top.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;

    let rain_hi = upper_bound(chart.forecast.iter().map(|f| f.precipitation_1h), 1.0);

    let mut bottom = ChartBuilder::on(&lower)
        .margin(1.percent())
        .x_label_area_size(6.percent_height())
        .y_label_area_size(7.percent_width())
        .right_y_label_area_size(7.percent_width())
        .build_cartesian_2d(RangedDateTime::from(from..to), 0.0..rain_hi)
        .map_err(chart_error)?
        .set_secondary_coord(RangedDateTime::from(from..to), 0.0..100.0);

    bottom
        .configure_mesh()
        .y_desc("Precipitation in mm/h")
        .x_label_formatter(&time_label)
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(chart_error)?;
    bottom
        .configure_secondary_axes()
        .y_desc("Rain probability in %")
        .draw()
        .map_err(chart_error)?;

    bottom
        .draw_series(
            AreaSeries::new(
                chart.forecast.iter().map(|f| (f.ts, f.precipitation_1h)),
                0.0,
                LIGHT_BLUE.mix(0.6),
            )
            .border_style(LIGHT_BLUE),
        )
        .map_err(chart_error)?
        .label("Precipitation")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], LIGHT_BLUE.filled()));

    bottom
        .draw_secondary_series(LineSeries::new(
            chart.forecast.iter().map(|f| (f.ts, f.rain_probability)),
            BLUE.stroke_width(1),
        ))
        .map_err(chart_error)?
        .label("Rain probability")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    bottom
        .draw_series(chart.labels.iter().map(|l| {
            Text::new(
                format!("{} ({})", l.description, l.code),
                (l.start, rain_hi),
                label_style(),
            )
        }))
        .map_err(chart_error)?;

    bottom
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}
