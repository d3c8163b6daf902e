//! Home weather station: MOSMIX and text forecast collection, sensor
//! sampling and chart reporting on top of PostgreSQL.

pub mod config;
pub mod database;
pub mod errors;
pub mod forecast;
pub mod jobs;
pub mod models;
pub mod report;
pub mod sensor;
pub mod text;
