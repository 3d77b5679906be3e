//! Core library for the `cityweather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client and its reverse city lookup
//! - The offline cache of the last successful fetch
//! - Forecast projection, icon resolution and weather alerts
//! - The fetch-cycle pipeline and the view state it drives
//!
//! It is used by `cityweather-cli`, but can also be reused by other front ends.

pub mod alerts;
pub mod cache;
pub mod config;
pub mod error;
pub mod icon;
pub mod location;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod projector;
pub mod provider;
pub mod state;

pub use alerts::{AlertKind, evaluate};
pub use cache::{BundleStore, FileStore, MemoryStore};
pub use config::Config;
pub use error::{CacheError, FailureKind, FetchError, LocationError, NotifyError};
pub use icon::{IconKey, NightRule, resolve_icon};
pub use location::{FixedLocation, LocationProvider, LocationResolver, NoLocation};
pub use model::{
    AlertRequest, CachedBundle, CitySelector, Coordinates, CurrentSnapshot, DailyEntry, ForecastStep,
    HourlyEntry,
};
pub use notify::{NotificationPermission, Notifier, TracingNotifier};
pub use pipeline::{CycleOutcome, PipelineOptions, WeatherPipeline};
pub use projector::{ProjectionOptions, project};
pub use provider::{WeatherSource, openweather::OpenWeatherClient};
pub use state::{ViewState, WeatherView};
