//! One fetch cycle: city → fetch → cache + project + alert, or fall back to
//! the cached bundle.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Config,
    alerts::evaluate,
    cache::BundleStore,
    error::{FailureKind, FetchError},
    icon::NightRule,
    location::LocationResolver,
    model::{AlertRequest, CachedBundle, CitySelector},
    notify::{NotificationPermission, Notifier},
    projector::ProjectionOptions,
    provider::WeatherSource,
    state::{ViewState, WeatherView},
};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub default_city: String,
    pub offset: FixedOffset,
    pub night_rule: NightRule,
    pub fetch_timeout: Duration,
    pub notifications: bool,
    /// Source of "now" for night icons.
    pub clock: fn() -> DateTime<Utc>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_city: crate::config::DEFAULT_CITY.to_string(),
            offset: Utc.fix(),
            night_rule: NightRule::default(),
            fetch_timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            notifications: true,
            clock: Utc::now,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            default_city: config.default_city.clone(),
            offset: config.utc_offset()?,
            night_rule: config.night_rule,
            fetch_timeout: config.timeout(),
            notifications: config.notifications,
            clock: Utc::now,
        })
    }

    /// Projection settings as of now.
    pub fn projection(&self) -> ProjectionOptions {
        ProjectionOptions { offset: self.offset, now: (self.clock)(), night_rule: self.night_rule }
    }
}

/// How a call to [`WeatherPipeline::refresh`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// New data is on screen; these alerts were raised for it.
    Fresh { alerts: Vec<AlertRequest> },
    /// Fetch failed, the cached bundle is on screen.
    Fallback { kind: FailureKind },
    /// Fetch failed and nothing was cached.
    Empty { kind: FailureKind },
    /// A newer cycle started before this one finished; nothing was written.
    Superseded,
}

#[derive(Debug)]
struct Shared {
    state: ViewState,
    city: String,
    cycle: Option<CancellationToken>,
    permission: Option<NotificationPermission>,
}

#[derive(Debug)]
struct Inner {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn BundleStore>,
    notifier: Arc<dyn Notifier>,
    options: PipelineOptions,
    shared: Mutex<Shared>,
    /// Held from the token check until the cache write is done, so cycles
    /// reach the view and the cache in the same order.
    commit: tokio::sync::Mutex<()>,
}

/// Owns the view state. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct WeatherPipeline {
    inner: Arc<Inner>,
}

impl WeatherPipeline {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn BundleStore>,
        notifier: Arc<dyn Notifier>,
        options: PipelineOptions,
    ) -> Self {
        let shared = Shared {
            state: ViewState::Idle,
            city: options.default_city.clone(),
            cycle: None,
            permission: None,
        };
        let inner = Inner {
            source,
            store,
            notifier,
            options,
            shared: Mutex::new(shared),
            commit: tokio::sync::Mutex::new(()),
        };
        Self { inner: Arc::new(inner) }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ViewState {
        self.lock().state.clone()
    }

    pub fn city(&self) -> String {
        self.lock().city.clone()
    }

    /// Restore the cached bundle (if any) and ask for notification permission.
    /// Returns whether something was restored.
    pub async fn cold_start(&self) -> bool {
        let restored = match self.load_cached().await {
            Some(bundle) => {
                let view = WeatherView::project(bundle, &self.inner.options.projection(), true);
                self.lock().state.restore(view);
                true
            }
            None => false,
        };

        if self.inner.options.notifications {
            let permission = self.inner.notifier.request_permission().await;
            if permission == NotificationPermission::Denied {
                warn!("Notification permission denied; alerts will not be delivered");
            }
            self.lock().permission = Some(permission);
        }

        restored
    }

    /// Switch to the device's city when it can be found, then refresh.
    pub async fn locate_and_refresh(&self, resolver: &LocationResolver) -> CycleOutcome {
        let token = self.begin_cycle();
        let Some(located) = until_superseded(&token, resolver.resolve_current_city()).await else {
            debug!("Location lookup superseded");
            return CycleOutcome::Superseded;
        };
        let city = located.unwrap_or_else(|| self.city());
        self.run_cycle(token, city).await
    }

    /// Refresh the city currently on screen.
    pub async fn reload(&self) -> CycleOutcome {
        self.refresh(CitySelector::Name(self.city())).await
    }

    /// Run one fetch cycle. Starting a cycle cancels the one in flight.
    pub async fn refresh(&self, selector: CitySelector) -> CycleOutcome {
        let token = self.begin_cycle();
        let Some(city) = until_superseded(&token, self.resolve_selector(selector)).await else {
            debug!("Reverse lookup superseded");
            return CycleOutcome::Superseded;
        };
        self.run_cycle(token, city).await
    }

    /// Claims the cycle slot. Must run before the cycle's first await.
    fn begin_cycle(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut shared = self.lock();
        if let Some(previous) = shared.cycle.replace(token.clone()) {
            previous.cancel();
        }
        shared.state.start_loading();
        token
    }

    async fn run_cycle(&self, token: CancellationToken, city: String) -> CycleOutcome {
        {
            let mut shared = self.lock();
            if token.is_cancelled() {
                return CycleOutcome::Superseded;
            }
            shared.city = city.clone();
        }

        info!(%city, "Refreshing weather");

        let timeout = self.inner.options.fetch_timeout;
        let fetch = tokio::time::timeout(timeout, self.inner.source.fetch_weather(&city));
        let Some(result) = until_superseded(&token, fetch).await else {
            debug!(%city, "Weather cycle superseded");
            return CycleOutcome::Superseded;
        };

        match result.unwrap_or(Err(FetchError::Timeout(timeout))) {
            Ok(bundle) => self.apply_fresh(&token, bundle).await,
            Err(e) => self.apply_failure(&token, e).await,
        }
    }

    async fn resolve_selector(&self, selector: CitySelector) -> String {
        match selector {
            CitySelector::Name(name) if name.trim().is_empty() => self.city(),
            CitySelector::Name(name) => name.trim().to_string(),
            CitySelector::Coordinates(at) => match self.inner.source.city_for_coordinates(at).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "Reverse lookup failed, keeping current city");
                    self.city()
                }
            },
        }
    }

    async fn apply_fresh(&self, token: &CancellationToken, bundle: CachedBundle) -> CycleOutcome {
        let view = WeatherView::project(bundle, &self.inner.options.projection(), false);
        let alerts = evaluate(&view.bundle.current);

        let permission = {
            let _commit = self.inner.commit.lock().await;
            let permission = {
                let mut shared = self.lock();
                if token.is_cancelled() {
                    return CycleOutcome::Superseded;
                }
                shared.state.succeed(view.clone());
                shared.permission
            };
            self.save_cached(view.bundle).await;
            permission
        };

        self.dispatch(&alerts, permission).await;
        CycleOutcome::Fresh { alerts }
    }

    async fn apply_failure(&self, token: &CancellationToken, error: FetchError) -> CycleOutcome {
        let kind = error.kind();
        warn!(error = %error, %kind, "Weather fetch failed");

        let _commit = self.inner.commit.lock().await;
        let fallback = self
            .load_cached()
            .await
            .map(|bundle| WeatherView::project(bundle, &self.inner.options.projection(), true));
        let outcome = match fallback {
            Some(_) => CycleOutcome::Fallback { kind },
            None => CycleOutcome::Empty { kind },
        };

        let mut shared = self.lock();
        if token.is_cancelled() {
            return CycleOutcome::Superseded;
        }
        shared.state.fail(kind, fallback);
        outcome
    }

    async fn load_cached(&self) -> Option<CachedBundle> {
        let store = Arc::clone(&self.inner.store);
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(error = %e, "Weather cache read did not complete");
                None
            }
        }
    }

    async fn save_cached(&self, bundle: CachedBundle) {
        let store = Arc::clone(&self.inner.store);
        match tokio::task::spawn_blocking(move || store.save(&bundle)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to save weather cache"),
            Err(e) => warn!(error = %e, "Weather cache write did not complete"),
        }
    }

    async fn dispatch(&self, alerts: &[AlertRequest], permission: Option<NotificationPermission>) {
        if alerts.is_empty() || !self.inner.options.notifications {
            return;
        }
        if permission != Some(NotificationPermission::Granted) {
            warn!(count = alerts.len(), "Skipping weather alerts without notification permission");
            return;
        }

        for alert in alerts {
            if let Err(e) = self.inner.notifier.notify(alert).await {
                warn!(kind = %alert.kind, error = %e, "Failed to deliver weather alert");
            }
        }
    }
}

/// `None` once `token` is cancelled, whichever finishes first.
async fn until_superseded<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}
