use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    error::FetchError,
    model::{CachedBundle, Coordinates, CurrentSnapshot, ForecastStep},
};

use super::WeatherSource;

const UNKNOWN_CONDITION: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), timeout, http })
    }

    /// GET `path` with the key and metric units appended, decoding the body as `T`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body: truncate_body(&body) });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Parse(format!("{path}: {e}")))
    }

    fn transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() { FetchError::Timeout(self.timeout) } else { FetchError::Network(e) }
    }

    async fn fetch_current(&self, city: &str) -> Result<CurrentSnapshot, FetchError> {
        let parsed: OwCurrentResponse =
            self.get_json("/data/2.5/weather", &[("q", city.to_string())]).await?;
        parsed.into_snapshot()
    }

    async fn fetch_forecast(&self, city: &str) -> Result<Vec<ForecastStep>, FetchError> {
        let parsed: OwForecastResponse =
            self.get_json("/data/2.5/forecast", &[("q", city.to_string())]).await?;
        parsed.list.into_iter().map(OwForecastEntry::into_step).collect()
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: u8,
    #[serde(default)]
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    main: OwMain,
    #[serde(default)]
    visibility: u32,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwCityName {
    name: String,
}

impl OwCurrentResponse {
    fn into_snapshot(self) -> Result<CurrentSnapshot, FetchError> {
        let temperature_c = finite("main.temp", self.main.temp)?;
        let wind_speed_mps = finite("wind.speed", self.wind.speed)?;
        let observed_at = unix_to_utc(self.dt)?;

        let (condition, description) = match self.weather.into_iter().next() {
            Some(w) => (w.main, w.description),
            None => (UNKNOWN_CONDITION.to_string(), String::new()),
        };

        Ok(CurrentSnapshot {
            city: self.name,
            country: self.sys.country.unwrap_or_default(),
            observed_at,
            temperature_c,
            feels_like_c: self.main.feels_like.unwrap_or(temperature_c),
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            visibility_m: self.visibility,
            wind_speed_mps,
            condition,
            description,
        })
    }
}

impl OwForecastEntry {
    fn into_step(self) -> Result<ForecastStep, FetchError> {
        Ok(ForecastStep {
            at: unix_to_utc(self.dt)?,
            temperature_c: finite("list.main.temp", self.main.temp)?,
            temp_min_c: finite("list.main.temp_min", self.main.temp_min)?,
            temp_max_c: finite("list.main.temp_max", self.main.temp_max)?,
            condition: self
                .weather
                .into_iter()
                .next()
                .map(|w| w.main)
                .unwrap_or_else(|| UNKNOWN_CONDITION.to_string()),
        })
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch_weather(&self, city: &str) -> Result<CachedBundle, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::EmptyCity);
        }

        debug!(city, "Fetching current conditions and forecast");

        let both = async { tokio::try_join!(self.fetch_current(city), self.fetch_forecast(city)) };
        let (current, forecast) = tokio::time::timeout(self.timeout, both)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        Ok(CachedBundle { current, forecast })
    }

    async fn city_for_coordinates(&self, at: Coordinates) -> Result<String, FetchError> {
        let query = [("lat", at.latitude.to_string()), ("lon", at.longitude.to_string())];
        let lookup = self.get_json::<OwCityName>("/data/2.5/weather", &query);
        let parsed = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        if parsed.name.trim().is_empty() {
            return Err(FetchError::Parse("reverse lookup returned an empty city name".into()));
        }
        Ok(parsed.name)
    }
}

fn finite(field: &str, value: f64) -> Result<f64, FetchError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FetchError::Parse(format!("{field} is not a finite number")))
    }
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| FetchError::Parse(format!("invalid timestamp {ts}")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
