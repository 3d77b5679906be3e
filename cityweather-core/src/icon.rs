//! Condition label → icon asset key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconKey {
    Sunny,
    Cloudy,
    PartlyCloudy,
    Overcast,
    Rainy,
    LightRain,
    ModerateRain,
    HeavyRain,
    Thunderstorm,
    ThunderstormRain,
    Snow,
    Mist,
    Fog,
    Tornado,
    ClearNight,
    PartlyCloudyNight,
    Default,
}

impl IconKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            IconKey::Sunny => "sunny",
            IconKey::Cloudy => "cloudy",
            IconKey::PartlyCloudy => "partly-cloudy",
            IconKey::Overcast => "overcast",
            IconKey::Rainy => "rainy",
            IconKey::LightRain => "light-rain",
            IconKey::ModerateRain => "moderate-rain",
            IconKey::HeavyRain => "heavy-rain",
            IconKey::Thunderstorm => "thunderstorm",
            IconKey::ThunderstormRain => "thunderstorm-rain",
            IconKey::Snow => "snow",
            IconKey::Mist => "mist",
            IconKey::Fog => "fog",
            IconKey::Tornado => "tornado",
            IconKey::ClearNight => "clear-night",
            IconKey::PartlyCloudyNight => "partly-cloudy-night",
            IconKey::Default => "default",
        }
    }
}

impl std::fmt::Display for IconKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which instant decides whether a forecast entry gets a night icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NightRule {
    /// The wall-clock time at projection, for every entry.
    #[default]
    WallClock,
    /// Each forecast step's own timestamp.
    StepTime,
}

/// Night is 18:00 up to (not including) 05:00.
pub fn is_night_hour(hour: u32) -> bool {
    hour >= 18 || hour < 5
}

/// Never fails: unknown labels map to [`IconKey::Default`].
pub fn resolve_icon(condition: &str, is_night: bool) -> IconKey {
    if is_night {
        match condition {
            "Clear" => return IconKey::ClearNight,
            "Few clouds" => return IconKey::PartlyCloudyNight,
            _ => {}
        }
    }

    match condition {
        "Clear" | "Sunny" => IconKey::Sunny,
        "Clouds" => IconKey::Cloudy,
        "Few clouds" => IconKey::PartlyCloudy,
        "Overcast clouds" => IconKey::Overcast,
        "Rain" => IconKey::Rainy,
        "Light rain" => IconKey::LightRain,
        "Moderate rain" => IconKey::ModerateRain,
        "Heavy rain" => IconKey::HeavyRain,
        "Thunderstorm" => IconKey::Thunderstorm,
        "Thunderstorm with light rain" => IconKey::ThunderstormRain,
        "Snow" => IconKey::Snow,
        "Mist" => IconKey::Mist,
        "Fog" => IconKey::Fog,
        "Tornado" => IconKey::Tornado,
        _ => IconKey::Default,
    }
}
