use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{alerts::AlertKind, icon::IconKey};

/// What a fetch cycle is asked to show: a city name or a coordinate fix.
///
/// Coordinates are resolved to a name once; the name is then used for every
/// following cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CitySelector {
    Name(String),
    Coordinates(Coordinates),
}

impl CitySelector {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self::Coordinates(Coordinates { latitude, longitude })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions for one city at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub city: String,
    pub country: String,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub visibility_m: u32,
    pub wind_speed_mps: f64,
    /// Provider's primary category, e.g. "Clear", "Rain".
    pub condition: String,
    pub description: String,
}

impl CurrentSnapshot {
    pub fn location_name(&self) -> String {
        if self.country.is_empty() {
            self.city.clone()
        } else {
            format!("{}, {}", self.city, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub at: DateTime<Utc>,
    pub temperature_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub condition: String,
}

/// Forecast steps in provider order (ascending time). Never re-sorted.
pub type ForecastSeries = Vec<ForecastStep>;

/// The last successfully fetched pair; the unit of offline persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBundle {
    pub current: CurrentSnapshot,
    pub forecast: ForecastSeries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourlyEntry {
    /// Local `HH:MM`.
    pub time: String,
    pub temperature: i64,
    pub icon: IconKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyEntry {
    pub date: NaiveDate,
    /// Short weekday, e.g. "Mon".
    pub weekday: String,
    pub temp_min: i64,
    pub temp_max: i64,
    pub icon: IconKey,
}

pub type HourlyView = Vec<HourlyEntry>;
pub type DailyView = Vec<DailyEntry>;

/// A notification to hand to the OS surface. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRequest {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    /// Auxiliary data delivered alongside the notification.
    pub snapshot: CurrentSnapshot,
}
