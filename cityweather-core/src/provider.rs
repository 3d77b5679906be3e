use crate::{
    Config,
    error::FetchError,
    model::{CachedBundle, Coordinates},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Remote source of weather data.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Current conditions and forecast for `city`. Either both succeed or the
    /// whole call fails; a half result is never returned.
    async fn fetch_weather(&self, city: &str) -> Result<CachedBundle, FetchError>;

    /// Name of the city closest to `at`.
    async fn city_for_coordinates(&self, at: Coordinates) -> Result<String, FetchError>;
}

/// Construct the OpenWeather client from config.
pub fn source_from_config(config: &Config) -> anyhow::Result<OpenWeatherClient> {
    let api_key = config.api_key()?;
    let client = OpenWeatherClient::new(api_key, config.base_url.clone(), config.timeout())?;
    Ok(client)
}
