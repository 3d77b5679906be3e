//! Hourly and daily views derived from a forecast series.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};

use crate::{
    icon::{IconKey, NightRule, is_night_hour, resolve_icon},
    model::{CurrentSnapshot, DailyEntry, DailyView, ForecastStep, HourlyEntry, HourlyView},
};

pub const HOURLY_STEPS: usize = 7;
pub const DAILY_LIMIT: usize = 9;

/// Local time-of-day used to pick one reading per day: 12:00:00.
pub const NOON_HMS: (u32, u32, u32) = (12, 0, 0);

fn is_noon(t: NaiveTime) -> bool {
    (t.hour(), t.minute(), t.second()) == NOON_HMS
}

/// Inputs the projection needs besides the series itself.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionOptions {
    /// Offset used for "local" time: formatting, weekday and the noon marker.
    pub offset: FixedOffset,
    pub now: DateTime<Utc>,
    pub night_rule: NightRule,
}

impl ProjectionOptions {
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self { offset: Utc.fix(), now, night_rule: NightRule::default() }
    }

    fn is_night(&self, step_at: DateTime<Utc>) -> bool {
        let instant = match self.night_rule {
            NightRule::WallClock => self.now,
            NightRule::StepTime => step_at,
        };
        is_night_hour(instant.with_timezone(&self.offset).hour())
    }
}

/// Pure: same series and options always give the same views.
pub fn project(series: &[ForecastStep], opts: &ProjectionOptions) -> (HourlyView, DailyView) {
    (hourly(series, opts), daily(series, opts))
}

pub fn hourly(series: &[ForecastStep], opts: &ProjectionOptions) -> HourlyView {
    series
        .iter()
        .take(HOURLY_STEPS)
        .map(|step| HourlyEntry {
            time: step.at.with_timezone(&opts.offset).format("%H:%M").to_string(),
            temperature: round_temp(step.temperature_c),
            icon: resolve_icon(&step.condition, opts.is_night(step.at)),
        })
        .collect()
}

pub fn daily(series: &[ForecastStep], opts: &ProjectionOptions) -> DailyView {
    series
        .iter()
        .filter(|step| is_noon(step.at.with_timezone(&opts.offset).time()))
        .take(DAILY_LIMIT)
        .map(|step| {
            let local = step.at.with_timezone(&opts.offset);
            DailyEntry {
                date: local.date_naive(),
                weekday: local.format("%a").to_string(),
                temp_min: round_temp(step.temp_min_c),
                temp_max: round_temp(step.temp_max_c),
                icon: resolve_icon(&step.condition, opts.is_night(step.at)),
            }
        })
        .collect()
}

/// Icon for the current conditions. Under `StepTime` the observation time counts as the step.
pub fn current_icon(current: &CurrentSnapshot, opts: &ProjectionOptions) -> IconKey {
    resolve_icon(&current.condition, opts.is_night(current.observed_at))
}

/// Halves round up (towards +inf), so -2.5 becomes -2.
pub fn round_temp(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
