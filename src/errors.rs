//! Errors for the weather recorder
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    XmlError(#[from] roxmltree::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    ConfigurationError { message: String },

    #[error("Invalid station id: {0}")]
    InvalidStationId(String),

    #[error("Forecast archive contains no documents")]
    EmptyArchive,

    #[error("Element {0} not found in forecast document")]
    MissingElement(String),

    #[error("Series {0} not found in forecast document")]
    MissingSeries(String),

    #[error("Inconsistent series length for {element}: expected {expected}, got {actual}")]
    InconsistentSeriesLength {
        element: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid token {token:?} in series {element}")]
    InvalidToken { element: String, token: String },

    #[error("Invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("Sensor error: {0}")]
    SensorError(String),

    #[error("Chart rendering failed: {0}")]
    ChartError(String),

    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}
