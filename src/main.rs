//! Weather recorder utility

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use weather_recorder::{config::AppConfig, database::Database, errors::WeatherError, jobs};

#[derive(Parser)]
#[command(name = "weather-recorder", version, about = "Home weather station recorder")]
struct Cli {
    /// Configuration file, defaults to config/default.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Download MOSMIX forecasts of all configured stations
    Forecast,
    /// Download the text forecast
    Text,
    /// Read the local sensors once
    Sample,
    /// Render the weather and forecast charts
    Report,
    /// Apply database migrations
    Migrate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), WeatherError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let db = Database::connect(&config.database).await?;

    info!("Running {:?}", cli.command);
    let result = match cli.command {
        Command::Forecast => jobs::run_forecast(&config, &db).await,
        Command::Text => jobs::run_text(&config, &db).await,
        Command::Sample => jobs::run_sample(&config, &db).await,
        Command::Report => jobs::run_report(&config, &db).await,
        Command::Migrate => db.migrate().await,
    };

    db.close().await;
    result
}
