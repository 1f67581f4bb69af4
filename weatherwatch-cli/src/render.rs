//! Reply formatting for the chat console.

use weatherwatch_core::{AirQualitySummary, Report, WatchChange};

pub const HELP: &str = "\
Commands:
  !weather <place>   current weather, last year's comparison and air quality
  !aqi [place]       air quality index only
  !add <place>       watch a place for severe weather
  !remove <place>    stop watching a place
  !list              show watched places
  !help              this message";

pub fn report(report: &Report) -> String {
    let current = &report.current;
    let mut lines = vec![
        format!("🌍 Weather in {}", report.canonical_name),
        format!(
            "Now: {:.1} °C, {}, precipitation {:.1} mm",
            current.temperature_c, current.description, current.precipitation_mm
        ),
    ];

    lines.push(match &report.historical {
        Some(sample) => {
            let diff = current.temperature_c - sample.max_temperature_c;
            format!(
                "A year ago ({}): max {:.1} °C ({:+.1} °C today)",
                sample.date.format("%Y-%m-%d"),
                sample.max_temperature_c,
                diff
            )
        }
        None => "A year ago: data not available".to_string(),
    });

    lines.push(air_quality_line(&report.air_quality));
    lines.join("\n")
}

pub fn air_quality(place: &str, summary: &AirQualitySummary) -> String {
    format!("💨 {place}\n{}", air_quality_line(summary))
}

fn air_quality_line(summary: &AirQualitySummary) -> String {
    match summary.aqi {
        Some(aqi) => format!("Air quality: {} (AQI {}, {})", summary.label, aqi, summary.color),
        None => format!("Air quality: {}", summary.label),
    }
}

pub fn watch_change(change: &WatchChange) -> String {
    match change {
        WatchChange::Added(name) => format!("✅ {name} added to the watch list."),
        WatchChange::AlreadyPresent(name) => format!("{name} is already on the watch list."),
        WatchChange::Removed(name) => format!("🗑️ {name} removed from the watch list."),
        WatchChange::NotPresent(name) => format!("{name} is not on the watch list."),
        WatchChange::Blank => "Please give a place name.".to_string(),
    }
}

pub fn watch_list(names: &[String]) -> String {
    if names.is_empty() {
        return "The watch list is empty.".to_string();
    }

    let mut out = String::from("👀 Watched places:");
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, name));
    }
    out
}
