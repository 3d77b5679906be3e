//! What the screen shows, as an explicit state machine.
//!
//! ```text
//! Idle ──start──▶ Loading ──success──▶ Ready
//!   ▲                │  └──failure──▶ Error { last_good }
//!   └── cold start with empty cache
//! ```

use crate::{
    error::FailureKind,
    icon::IconKey,
    model::{CachedBundle, DailyView, HourlyView},
    projector::{ProjectionOptions, current_icon, project},
};

/// A bundle together with the views derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub bundle: CachedBundle,
    /// Icon for `bundle.current`, night-aware like the series entries.
    pub current_icon: IconKey,
    pub hourly: HourlyView,
    pub daily: DailyView,
    /// Came from the offline cache rather than a fetch in this session.
    pub stale: bool,
}

impl WeatherView {
    pub fn project(bundle: CachedBundle, opts: &ProjectionOptions, stale: bool) -> Self {
        let (hourly, daily) = project(&bundle.forecast, opts);
        let current_icon = current_icon(&bundle.current, opts);
        Self { bundle, current_icon, hourly, daily, stale }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    /// Nothing fetched and nothing cached yet.
    #[default]
    Idle,
    Loading {
        previous: Option<WeatherView>,
    },
    Ready(WeatherView),
    /// The last fetch failed. `last_good: None` is the explicit empty state.
    Error {
        kind: FailureKind,
        last_good: Option<WeatherView>,
    },
}

impl ViewState {
    /// The view to render, if any.
    pub fn view(&self) -> Option<&WeatherView> {
        match self {
            ViewState::Idle => None,
            ViewState::Loading { previous } => previous.as_ref(),
            ViewState::Ready(view) => Some(view),
            ViewState::Error { last_good, .. } => last_good.as_ref(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading { .. })
    }

    /// Fetch started; keep showing whatever was on screen.
    pub fn start_loading(&mut self) {
        let previous = self.view().cloned();
        *self = ViewState::Loading { previous };
    }

    pub fn succeed(&mut self, view: WeatherView) {
        *self = ViewState::Ready(view);
    }

    /// Fetch failed; `fallback` is the cached view, if one exists.
    pub fn fail(&mut self, kind: FailureKind, fallback: Option<WeatherView>) {
        *self = ViewState::Error { kind, last_good: fallback };
    }

    /// Cache restored before any fetch finished. Never replaces fresher data.
    pub fn restore(&mut self, view: WeatherView) {
        match self {
            ViewState::Idle => *self = ViewState::Ready(view),
            ViewState::Loading { previous } if previous.is_none() => *previous = Some(view),
            _ => {}
        }
    }
}
