//! Local sensors: a digital light sensor on a GPIO pin and a BMP280
//! temperature/pressure sensor on I2C.
//!
//! Both are read through the Linux sysfs interfaces. The sensors get stuck
//! now and then, so every read is retried a bounded number of times before
//! the value is given up and stored as NULL.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::{
    config::SensorConfig,
    errors::WeatherError,
    models::{truncate_to_seconds, SensorReading},
};

/// Digital light sensor
pub trait LightSensor {
    /// Raw pin level, `None` if the sensor returned nothing
    fn read_level(&mut self) -> Result<Option<bool>, WeatherError>;
}

/// Temperature and pressure sensor
pub trait Barometer {
    /// `(temperature °C, pressure hPa)`, `None` if the sensor returned nothing
    fn read(&mut self) -> Result<Option<(f64, f64)>, WeatherError>;
}

/// GPIO input read through `/sys/class/gpio`
pub struct SysfsGpio {
    root: PathBuf,
    pin: u32,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>, pin: u32) -> Self {
        Self {
            root: root.into(),
            pin,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn export(&self) -> Result<(), WeatherError> {
        if self.pin_dir().exists() {
            return Ok(());
        }
        info!("Exporting GPIO pin {}", self.pin);
        fs::write(self.root.join("export"), self.pin.to_string())?;
        if let Err(e) = fs::write(self.pin_dir().join("direction"), "in") {
            warn!("Could not set GPIO pin {} to input: {}", self.pin, e);
        }
        Ok(())
    }
}

impl LightSensor for SysfsGpio {
    fn read_level(&mut self) -> Result<Option<bool>, WeatherError> {
        self.export()?;
        let raw = fs::read_to_string(self.pin_dir().join("value"))?;
        match raw.trim() {
            "" => Ok(None),
            "0" => Ok(Some(false)),
            "1" => Ok(Some(true)),
            other => Err(WeatherError::SensorError(format!(
                "unexpected GPIO value {:?} on pin {}",
                other, self.pin
            ))),
        }
    }
}

/// BMP280 bound to the kernel `bmp280` IIO driver
pub struct IioBarometer {
    dir: PathBuf,
}

impl IioBarometer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_channel(&self, name: &str) -> Result<Option<f64>, WeatherError> {
        let path = self.dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            // the driver returns EAGAIN/EIO while a conversion is pending
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>().map(Some).map_err(|_| {
            WeatherError::SensorError(format!("unexpected value {:?} in {}", raw, path.display()))
        })
    }
}

impl Barometer for IioBarometer {
    fn read(&mut self) -> Result<Option<(f64, f64)>, WeatherError> {
        // milli-degrees Celsius and kilopascal
        let temperature = self.read_channel("in_temp_input")?;
        let pressure = self.read_channel("in_pressure_input")?;
        Ok(temperature
            .zip(pressure)
            .map(|(t, p)| (t / 1000.0, p * 10.0)))
    }
}

/// Call `read` until it yields a value, at most `retries` more times after
/// the first attempt, pausing before each retry. Errors count as empty reads.
pub async fn read_with_retry<T, F>(what: &str, retries: u32, pause: Duration, mut read: F) -> Option<T>
where
    F: FnMut() -> Result<Option<T>, WeatherError>,
{
    let mut attempt = 0;
    loop {
        match read() {
            Ok(Some(value)) => return Some(value),
            Ok(None) => debug!("Empty {} reading (attempt {})", what, attempt + 1),
            Err(e) => warn!("Reading {} failed (attempt {}): {}", what, attempt + 1, e),
        }
        if attempt >= retries {
            break;
        }
        attempt += 1;
        tokio::time::sleep(pause).await;
    }
    warn!("Could not read {} after {} attempts", what, retries + 1);
    None
}

/// Round to `digits` decimal places; `None` stays `None` and values that
/// cannot be rounded become `None`.
pub fn round_or_null(value: Option<f64>, digits: i32) -> Option<f64> {
    let value = value?;
    if !value.is_finite() {
        error!("Could not round value {}", value);
        return None;
    }
    let factor = 10f64.powi(digits);
    Some((value * factor).round() / factor)
}

/// One sampling run over both sensors
pub struct Sampler<L, B> {
    light: L,
    barometer: B,
    retries: u32,
    retry_pause: Duration,
}

impl Sampler<SysfsGpio, IioBarometer> {
    pub fn from_config(config: &SensorConfig) -> Result<Self, WeatherError> {
        config.validate()?;
        Ok(Self::new(
            SysfsGpio::new(&config.gpio_root, config.light_pin),
            IioBarometer::new(&config.barometer_dir),
            config.retries,
            config.retry_pause,
        ))
    }
}

impl<L: LightSensor, B: Barometer> Sampler<L, B> {
    pub fn new(light: L, barometer: B, retries: u32, retry_pause: Duration) -> Self {
        Self {
            light,
            barometer,
            retries,
            retry_pause,
        }
    }

    pub async fn sample(&mut self) -> SensorReading {
        let (retries, pause) = (self.retries, self.retry_pause);

        let level = read_with_retry("light", retries, pause, || self.light.read_level()).await;
        // the sensor pulls the pin high when it is dark
        let light = level.map(|dark| !dark);

        let climate = read_with_retry("temperature/pressure", retries, pause, || {
            self.barometer.read()
        })
        .await;
        let (temperature, pressure) = climate.unzip();

        let reading = SensorReading {
            ts: truncate_to_seconds(Local::now().naive_local()),
            temperature: round_or_null(temperature, 2),
            pressure: round_or_null(pressure, 2),
            light,
        };
        info!(
            "Sampled light={:?} temperature={:?} pressure={:?}",
            reading.light, reading.temperature, reading.pressure
        );
        reading
    }
}

/// Whether `path` looks like an IIO pressure sensor directory
pub fn is_barometer_dir(path: &Path) -> bool {
    path.join("in_temp_input").exists() && path.join("in_pressure_input").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeLight(VecDeque<Result<Option<bool>, WeatherError>>);

    impl LightSensor for FakeLight {
        fn read_level(&mut self) -> Result<Option<bool>, WeatherError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    struct FakeBarometer {
        reads: VecDeque<Option<(f64, f64)>>,
        calls: usize,
    }

    impl Barometer for FakeBarometer {
        fn read(&mut self) -> Result<Option<(f64, f64)>, WeatherError> {
            self.calls += 1;
            Ok(self.reads.pop_front().flatten())
        }
    }

    fn barometer(reads: Vec<Option<(f64, f64)>>) -> FakeBarometer {
        FakeBarometer {
            reads: reads.into(),
            calls: 0,
        }
    }

    #[tokio::test]
    async fn retry_stops_at_first_value() {
        let mut calls = 0;
        let value = read_with_retry("test", 5, Duration::ZERO, || {
            calls += 1;
            Ok(if calls < 3 { None } else { Some(calls) })
        })
        .await;

        assert_eq!(value, Some(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_retries() {
        let mut calls = 0;
        let value: Option<u32> = read_with_retry("test", 5, Duration::ZERO, || {
            calls += 1;
            Err(WeatherError::SensorError("stuck".to_string()))
        })
        .await;

        assert_eq!(value, None);
        assert_eq!(calls, 6);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_or_null(Some(21.456), 2), Some(21.46));
        assert_eq!(round_or_null(Some(1013.2049), 2), Some(1013.2));
        assert_eq!(round_or_null(None, 2), None);
        assert_eq!(round_or_null(Some(f64::NAN), 2), None);
        assert_eq!(round_or_null(Some(f64::INFINITY), 2), None);
    }

    #[tokio::test]
    async fn sample_inverts_light_and_rounds() {
        let light = FakeLight(vec![Ok(None), Ok(Some(false))].into());
        let mut sampler = Sampler::new(
            light,
            barometer(vec![Some((21.456, 1013.2049))]),
            5,
            Duration::ZERO,
        );

        let reading = sampler.sample().await;
        assert_eq!(reading.light, Some(true));
        assert_eq!(reading.temperature, Some(21.46));
        assert_eq!(reading.pressure, Some(1013.2));
    }

    #[tokio::test]
    async fn sample_null_fills_after_retries() {
        let light = FakeLight(VecDeque::new());
        let mut sampler = Sampler::new(light, barometer(vec![]), 5, Duration::ZERO);

        let reading = sampler.sample().await;
        assert_eq!(reading.light, None);
        assert_eq!(reading.temperature, None);
        assert_eq!(reading.pressure, None);
        assert_eq!(sampler.barometer.calls, 6);
    }

    #[test]
    fn sysfs_gpio_reads_level() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("gpio24")).unwrap();
        fs::write(root.path().join("gpio24/value"), "1\n").unwrap();

        let mut gpio = SysfsGpio::new(root.path(), 24);
        assert_eq!(gpio.read_level().unwrap(), Some(true));

        fs::write(root.path().join("gpio24/value"), "").unwrap();
        assert_eq!(gpio.read_level().unwrap(), None);

        fs::write(root.path().join("gpio24/value"), "x").unwrap();
        assert!(gpio.read_level().is_err());
    }

    #[test]
    fn sysfs_gpio_exports_missing_pin() {
        let root = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::new(root.path(), 24);

        // no kernel behind the tempdir, so the pin never appears
        assert!(gpio.read_level().is_err());
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "24");
    }

    #[test]
    fn iio_barometer_converts_units() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_temp_input"), "21456\n").unwrap();
        fs::write(dir.path().join("in_pressure_input"), "101.325000000\n").unwrap();
        assert!(is_barometer_dir(dir.path()));

        let (t, p) = IioBarometer::new(dir.path()).read().unwrap().unwrap();
        assert!((t - 21.456).abs() < 1e-9);
        assert!((p - 1013.25).abs() < 1e-9);
    }

    #[test]
    fn iio_barometer_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_barometer_dir(dir.path()));
        assert!(IioBarometer::new(dir.path().join("iio:device0")).read().is_err());
    }
}
