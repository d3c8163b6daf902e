//! MOSMIX download
//!
//! Each station publishes its latest forecast as a KMZ bundle, a zip archive
//! holding a single KML document.

pub mod kml;

use std::io::{Cursor, Read};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::{
    config::ForecastConfig,
    errors::WeatherError,
    models::{ForecastBatch, StationId},
};

/// HTTP client for the MOSMIX single-station products
pub struct ForecastClient {
    client: reqwest::Client,
    config: ForecastConfig,
}

impl ForecastClient {
    pub fn new(config: &ForecastConfig) -> Result<Self, WeatherError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Download and extract the latest forecast of `station_id`
    pub async fn fetch(&self, station_id: &StationId) -> Result<ForecastBatch, WeatherError> {
        let url = self.config.url_for(station_id.as_str());
        info!("Downloading forecast for station {} from {}", station_id, url);

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        debug!("Received {} bytes", body.len());

        let document = unpack_kmz(&body)?;
        kml::extract_forecast(&document, station_id.clone())
    }
}

/// Return the first document of a KMZ archive as text.
pub fn unpack_kmz(bytes: &[u8]) -> Result<String, WeatherError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.is_empty() {
        return Err(WeatherError::EmptyArchive);
    }

    let mut entry = archive.by_index(0)?;
    debug!("Reading {} from archive", entry.name());
    // the declared size comes from the archive header and is not trusted
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;

    Ok(decode_document(buf))
}

/// MOSMIX documents are declared ISO-8859-1; fall back to Latin-1 when the
/// bytes are not valid UTF-8.
fn decode_document(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}
