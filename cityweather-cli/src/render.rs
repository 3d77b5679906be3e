use cityweather_core::{FailureKind, IconKey, ViewState, WeatherView, projector::round_temp};
use std::fmt::{self, Write};

fn icon_glyph(icon: IconKey) -> &'static str {
    match icon {
        IconKey::Sunny => "☀",
        IconKey::ClearNight => "☾",
        IconKey::PartlyCloudy | IconKey::PartlyCloudyNight => "⛅",
        IconKey::Cloudy | IconKey::Overcast => "☁",
        IconKey::Rainy | IconKey::LightRain | IconKey::ModerateRain | IconKey::HeavyRain => "☂",
        IconKey::Thunderstorm | IconKey::ThunderstormRain => "⚡",
        IconKey::Snow => "❄",
        IconKey::Mist | IconKey::Fog => "≋",
        IconKey::Tornado => "🌪",
        IconKey::Default => "·",
    }
}

pub fn render_view(view: &WeatherView) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_view(&mut out, view);
    out
}

fn write_view(out: &mut impl Write, view: &WeatherView) -> fmt::Result {
    let current = &view.bundle.current;

    writeln!(out, "{}", current.location_name())?;
    writeln!(
        out,
        "  {} {}°C  {}",
        icon_glyph(view.current_icon),
        round_temp(current.temperature_c),
        current.description
    )?;
    if view.stale {
        writeln!(out, "  (offline data from {})", current.observed_at.format("%Y-%m-%d %H:%M UTC"))?;
    }

    if !view.hourly.is_empty() {
        writeln!(out, "\nHourly")?;
        for hour in &view.hourly {
            writeln!(out, "  {}  {} {:>3}°C", hour.time, icon_glyph(hour.icon), hour.temperature)?;
        }
    }

    if !view.daily.is_empty() {
        writeln!(out, "\nDaily")?;
        for day in &view.daily {
            writeln!(
                out,
                "  {} {}  {} {:>3}°C / {:>3}°C",
                day.weekday,
                day.date.format("%d/%m"),
                icon_glyph(day.icon),
                day.temp_min,
                day.temp_max
            )?;
        }
    }

    writeln!(out, "\nDetails")?;
    writeln!(out, "  Humidity    {}%", current.humidity_pct)?;
    writeln!(out, "  Pressure    {} hPa", current.pressure_hpa)?;
    writeln!(out, "  Visibility  {:.1} km", f64::from(current.visibility_m) / 1000.0)?;
    writeln!(out, "  Wind        {} m/s", current.wind_speed_mps)
}

pub fn render_state(state: &ViewState) -> String {
    match state {
        ViewState::Idle => "No weather data yet.\n".to_string(),
        ViewState::Loading { previous: Some(view) } => render_view(view),
        ViewState::Loading { previous: None } => "Loading...\n".to_string(),
        ViewState::Ready(view) => render_view(view),
        ViewState::Error { kind, last_good: Some(view) } => {
            format!("Could not refresh ({}); showing saved data.\n\n{}", kind, render_view(view))
        }
        ViewState::Error { kind, last_good: None } => empty_message(*kind),
    }
}

fn empty_message(kind: FailureKind) -> String {
    format!("Weather unavailable ({kind}) and no saved data to show.\n")
}
