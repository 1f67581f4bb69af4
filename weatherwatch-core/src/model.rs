use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// How far back the historical comparison looks. A fixed offset, so leap
/// years shift the compared calendar date by one day.
pub const HISTORICAL_OFFSET_DAYS: i64 = 365;

/// Coordinates and display name of a place, as returned by geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub canonical_name: String,
}

/// WMO weather interpretation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherCode(pub u16);

impl WeatherCode {
    /// Codes that trigger an alert: heavy rain, violent showers and
    /// thunderstorms (with or without hail).
    pub const SEVERE: &'static [u16] = &[65, 82, 95, 96, 99];

    /// Human-readable description, grouped by code range.
    pub fn description(self) -> &'static str {
        match self.0 {
            0 | 1 => "Clear",
            2 | 3 => "Partly cloudy / overcast",
            51 | 53 | 55 => "Drizzle",
            61 | 63 | 65 => "Rain",
            71 | 73 | 75 => "Snow",
            80..=82 => "Showers",
            _ => "Unknown phenomenon",
        }
    }

    pub fn is_severe(self) -> bool {
        Self::SEVERE.contains(&self.0)
    }

    /// Wording used in alert messages. Only meaningful for severe codes.
    pub fn severity_label(self) -> &'static str {
        match self.0 {
            65 => "Heavy rain",
            82 => "Violent rain showers",
            95 => "Thunderstorm",
            96 | 99 => "Thunderstorm with hail",
            _ => self.description(),
        }
    }
}

impl std::fmt::Display for WeatherCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub weather_code: WeatherCode,
    pub description: String,
}

impl CurrentConditions {
    pub fn new(temperature_c: f64, precipitation_mm: f64, weather_code: WeatherCode) -> Self {
        Self {
            temperature_c,
            precipitation_mm,
            weather_code,
            description: weather_code.description().to_string(),
        }
    }
}

/// Daily maximum temperature on the reference date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSample {
    pub date: NaiveDate,
    pub max_temperature_c: f64,
}

/// Air-quality part of a report. `aqi` is `None` when the upstream failed and
/// the label/color are the fallback values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySummary {
    pub aqi: Option<u32>,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub canonical_name: String,
    pub current: CurrentConditions,
    pub historical: Option<HistoricalSample>,
    pub air_quality: AirQualitySummary,
}

/// Date the historical comparison is taken from.
pub fn reference_date(today: NaiveDate) -> NaiveDate {
    today - Duration::days(HISTORICAL_OFFSET_DAYS)
}

/// Normalize a free-text place name: collapse whitespace, upper-case the first
/// letter of every alphabetic run and lower-case the rest.
pub fn title_case(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut prev_alpha = false;
    for ch in collapsed.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_groups() {
        assert_eq!(WeatherCode(0).description(), "Clear");
        assert_eq!(WeatherCode(3).description(), "Partly cloudy / overcast");
        assert_eq!(WeatherCode(53).description(), "Drizzle");
        assert_eq!(WeatherCode(65).description(), "Rain");
        assert_eq!(WeatherCode(75).description(), "Snow");
        assert_eq!(WeatherCode(81).description(), "Showers");
        assert_eq!(WeatherCode(95).description(), "Unknown phenomenon");
        assert_eq!(WeatherCode(52).description(), "Unknown phenomenon");
    }

    #[test]
    fn severe_set() {
        assert!(WeatherCode(95).is_severe());
        assert!(WeatherCode(99).is_severe());
        assert!(WeatherCode(65).is_severe());
        assert!(!WeatherCode(63).is_severe());
        assert!(!WeatherCode(0).is_severe());
        assert_eq!(WeatherCode(96).severity_label(), "Thunderstorm with hail");
    }

    #[test]
    fn reference_date_is_fixed_offset() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        // 2024 is a leap year, so 365 days back lands on 2 March 2023.
        assert_eq!(reference_date(today), NaiveDate::from_ymd_opt(2023, 3, 2).unwrap());
    }

    #[test]
    fn title_case_normalizes() {
        assert_eq!(title_case("  hradec   KRÁLOVÉ "), "Hradec Králové");
        assert_eq!(title_case("UnknownCity"), "Unknowncity");
        assert_eq!(title_case("frýdek-místek"), "Frýdek-Místek");
        assert_eq!(title_case(""), "");
    }
}
