//! Device position → city name, best effort.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::{debug, info, warn};

use crate::{error::LocationError, model::Coordinates, provider::WeatherSource};

/// Platform location service.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn request_permission(&self) -> Result<(), LocationError>;

    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// A position supplied up front, e.g. from flags or configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> Result<(), LocationError> {
        Ok(())
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// No location service on this host; behaves like a denied prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn request_permission(&self) -> Result<(), LocationError> {
        Err(LocationError::PermissionDenied)
    }

    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    source: Arc<dyn WeatherSource>,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>, source: Arc<dyn WeatherSource>) -> Self {
        Self { provider, source }
    }

    /// City at the device position, or `None` on any failure along the way.
    pub async fn resolve_current_city(&self) -> Option<String> {
        match self.try_resolve().await {
            Ok(city) => {
                info!(%city, "Resolved current city");
                Some(city)
            }
            Err(LocationError::PermissionDenied) => {
                debug!("Location permission denied, keeping current city");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not resolve current city");
                None
            }
        }
    }

    pub async fn try_resolve(&self) -> Result<String, LocationError> {
        self.provider.request_permission().await?;
        let at = self.provider.current_position().await?;
        Ok(self.source.city_for_coordinates(at).await?)
    }
}
