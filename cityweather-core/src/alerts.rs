//! Threshold checks over the current conditions.

use crate::model::{AlertRequest, CurrentSnapshot};

/// Strictly above this temperature (°C) a heat advisory fires.
pub const HEAT_THRESHOLD_C: f64 = 27.0;
/// Strictly above this wind speed (m/s) a wind advisory fires.
pub const WIND_THRESHOLD_MPS: f64 = 4.0;
pub const RAIN_CONDITION: &str = "Rain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Heat,
    Rain,
    Wind,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Heat => "heat-advisory",
            AlertKind::Rain => "rain-advisory",
            AlertKind::Wind => "wind-advisory",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every rule is checked independently; the result is always in
/// heat, rain, wind order. No state is kept between calls.
pub fn evaluate(snapshot: &CurrentSnapshot) -> Vec<AlertRequest> {
    let mut alerts = Vec::new();

    if snapshot.temperature_c > HEAT_THRESHOLD_C {
        alerts.push(request(
            AlertKind::Heat,
            "High temperature warning 🌡️",
            format!("Current temperature is {}°C. Stay hydrated!", snapshot.temperature_c),
            snapshot,
        ));
    }

    if snapshot.condition == RAIN_CONDITION {
        alerts.push(request(
            AlertKind::Rain,
            "It's raining ☔",
            "Remember to take an umbrella when you go out!".to_string(),
            snapshot,
        ));
    }

    if snapshot.wind_speed_mps > WIND_THRESHOLD_MPS {
        alerts.push(request(
            AlertKind::Wind,
            "Strong wind warning 💨",
            format!("Wind speed: {} m/s. Limit time outdoors!", snapshot.wind_speed_mps),
            snapshot,
        ));
    }

    alerts
}

fn request(kind: AlertKind, title: &str, body: String, snapshot: &CurrentSnapshot) -> AlertRequest {
    AlertRequest { kind, title: title.to_string(), body, snapshot: snapshot.clone() }
}
