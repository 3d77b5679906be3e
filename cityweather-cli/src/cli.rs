use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use cityweather_core::{
    BundleStore, CitySelector, Config, Coordinates, CycleOutcome, FileStore, FixedLocation,
    LocationResolver, PipelineOptions, WeatherPipeline, WeatherView, provider::source_from_config,
};

use crate::{
    console::ConsoleNotifier,
    render::{render_state, render_view},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Current weather and forecast for a city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the OpenWeather API key and default city.
    Configure,

    /// Fetch and show weather; falls back to saved data when offline.
    Show {
        /// City name; the configured default city if absent.
        city: Option<String>,

        /// Latitude of the current position (used with --lon).
        #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of the current position (used with --lat).
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Show the last saved weather without going online.
    Cached,

    /// Delete the saved weather.
    ClearCache,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Show { city, lat, lon } => {
                let position = lat.zip(lon).map(|(latitude, longitude)| Coordinates { latitude, longitude });
                show(&config, city, position).await
            }
            Command::Cached => {
                let store = FileStore::new(config.cache_file_path()?);
                match store.load() {
                    Some(bundle) => {
                        let projection = PipelineOptions::from_config(&config)?.projection();
                        print!("{}", render_view(&WeatherView::project(bundle, &projection, true)));
                    }
                    None => println!("No saved weather data."),
                }
                Ok(())
            }
            Command::ClearCache => {
                let store = FileStore::new(config.cache_file_path()?);
                debug!(path = %store.path().display(), "Clearing weather cache");
                store
                    .clear()
                    .with_context(|| format!("Failed to remove {}", store.path().display()))?;
                println!("Saved weather data removed.");
                Ok(())
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let city = inquire::Text::new("Default city:").with_default(&config.default_city).prompt()?;
    if !city.trim().is_empty() {
        config.default_city = city.trim().to_string();
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(
    config: &Config,
    city: Option<String>,
    position: Option<Coordinates>,
) -> anyhow::Result<()> {
    let source = Arc::new(source_from_config(config)?);
    let store = Arc::new(FileStore::new(config.cache_file_path()?));
    let pipeline = WeatherPipeline::new(
        source.clone(),
        store,
        Arc::new(ConsoleNotifier),
        PipelineOptions::from_config(config)?,
    );

    pipeline.cold_start().await;

    let outcome = match (city, position) {
        (Some(city), _) => pipeline.refresh(CitySelector::Name(city)).await,
        (None, Some(at)) => {
            let resolver = LocationResolver::new(Arc::new(FixedLocation(at)), source);
            pipeline.locate_and_refresh(&resolver).await
        }
        (None, None) => pipeline.reload().await,
    };

    match &outcome {
        CycleOutcome::Fresh { alerts } => {
            info!(city = %pipeline.city(), alerts = alerts.len(), "Weather updated");
        }
        other => info!(city = %pipeline.city(), outcome = ?other, "Weather not updated"),
    }

    // Alerts were printed above the report.
    if matches!(&outcome, CycleOutcome::Fresh { alerts } if !alerts.is_empty()) {
        println!();
    }

    print!("{}", render_state(&pipeline.state()));
    Ok(())
}
