//! Application configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::WeatherError;

/// Configuration file read when no other path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub text_forecast: TextForecastConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string, e.g. `postgres://pi@localhost/weather`
    pub url: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

/// MOSMIX download settings
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Station identifiers, fetched in this order
    #[serde(default = "default_stations")]
    pub stations: Vec<String>,
    /// Download URL; `{station}` is replaced by the station id
    #[serde(default = "default_forecast_url")]
    pub url_template: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct TextForecastConfig {
    #[serde(default = "default_text_url")]
    pub url: String,
    /// Value of the `forecast` flag column for texts written by this tool
    #[serde(default = "default_text_flag")]
    pub flag: i32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

/// Sensor wiring
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    /// BCM number of the pin the digital light sensor is connected to
    #[serde(default = "default_light_pin")]
    pub light_pin: u32,
    /// Root of the GPIO sysfs tree
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    /// IIO device directory of the BMP280
    #[serde(default = "default_barometer_dir")]
    pub barometer_dir: PathBuf,
    /// Additional reads after an empty first read
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_retry_pause")]
    pub retry_pause: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// How far back sensor readings are charted
    #[serde(default = "default_measurement_hours")]
    pub measurement_hours: u32,
    /// How far ahead the forecast overlay of the weather chart reaches
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,
    #[serde(default = "default_weather_chart")]
    pub weather_chart: PathBuf,
    #[serde(default = "default_forecast_chart")]
    pub forecast_chart: PathBuf,
    #[serde(default = "default_image_width")]
    pub width: u32,
    #[serde(default = "default_image_height")]
    pub height: u32,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_stations() -> Vec<String> {
    vec!["N2147".to_string(), "P830".to_string(), "10865".to_string()]
}

fn default_forecast_url() -> String {
    "https://opendata.dwd.de/weather/local_forecasts/mos/MOSMIX_L/single_stations/{station}/kml/MOSMIX_L_LATEST_{station}.kmz".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_text_url() -> String {
    "http://141.38.2.26/weather/text_forecasts/html/VHDL50_DWMG_LATEST_html".to_string()
}

fn default_text_flag() -> i32 {
    1
}

fn default_light_pin() -> u32 {
    24
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_barometer_dir() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices/iio:device0")
}

fn default_retries() -> u32 {
    5
}

fn default_retry_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_measurement_hours() -> u32 {
    72
}

fn default_forecast_hours() -> u32 {
    36
}

fn default_weather_chart() -> PathBuf {
    PathBuf::from("/var/www/html/img/weather.png")
}

fn default_forecast_chart() -> PathBuf {
    PathBuf::from("/var/www/html/img/forecast.png")
}

fn default_image_width() -> u32 {
    1200
}

fn default_image_height() -> u32 {
    800
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            stations: default_stations(),
            url_template: default_forecast_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for TextForecastConfig {
    fn default() -> Self {
        Self {
            url: default_text_url(),
            flag: default_text_flag(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            light_pin: default_light_pin(),
            gpio_root: default_gpio_root(),
            barometer_dir: default_barometer_dir(),
            retries: default_retries(),
            retry_pause: default_retry_pause(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            measurement_hours: default_measurement_hours(),
            forecast_hours: default_forecast_hours(),
            weather_chart: default_weather_chart(),
            forecast_chart: default_forecast_chart(),
            width: default_image_width(),
            height: default_image_height(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `file` (or [`DEFAULT_CONFIG_FILE`]), then
    /// overlay `WEATHER__`-prefixed environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix("WEATHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("forecast.stations"),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.url.trim().is_empty() {
            return Err(WeatherError::ConfigurationError {
                message: "Database url cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.stations.is_empty() {
            return Err(WeatherError::ConfigurationError {
                message: "At least one forecast station is required".to_string(),
            });
        }
        if !self.url_template.contains("{station}") {
            return Err(WeatherError::ConfigurationError {
                message: "Forecast url template must contain {station}".to_string(),
            });
        }
        Ok(())
    }

    /// Download URL for a single station
    pub fn url_for(&self, station_id: &str) -> String {
        self.url_template.replace("{station}", station_id)
    }
}

impl TextForecastConfig {
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.url.trim().is_empty() {
            return Err(WeatherError::ConfigurationError {
                message: "Text forecast url cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), WeatherError> {
        if !self.gpio_root.exists() {
            warn!(
                "GPIO root {} does not exist, light readings will be empty",
                self.gpio_root.display()
            );
        }
        if !crate::sensor::is_barometer_dir(&self.barometer_dir) {
            warn!(
                "{} is not a barometer device, temperature and pressure will be empty",
                self.barometer_dir.display()
            );
        }
        Ok(())
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), WeatherError> {
        if self.measurement_hours == 0 || self.forecast_hours == 0 {
            return Err(WeatherError::ConfigurationError {
                message: "Report windows must be greater than zero".to_string(),
            });
        }
        if self.width == 0 || self.height == 0 {
            return Err(WeatherError::ConfigurationError {
                message: "Chart size must be greater than zero".to_string(),
            });
        }
        self.ensure_directory_exists(&self.weather_chart)?;
        self.ensure_directory_exists(&self.forecast_chart)?;
        Ok(())
    }

    fn ensure_directory_exists(&self, image: &Path) -> Result<(), WeatherError> {
        let dir = match image.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => return Ok(()),
        };
        if !dir.exists() {
            warn!("Chart directory {} does not exist, attempting to create it", dir.display());
            std::fs::create_dir_all(dir).map_err(|e| WeatherError::ConfigurationError {
                message: format!("Could not create chart directory: {}", e),
            })?;
        }
        Ok(())
    }
}
