//! One-shot travel tool commands; print the tool's JSON result

use std::io::{self, Write};

use serde::Serialize;

use crate::error::Result;
use crate::storage::config::TravelConfig;
use crate::travel::{flights, weather, ToolOutcome};

/// `trellis weather`; returns whether the tool succeeded
pub fn weather(config: &TravelConfig, destination: &str, travel_dates: &str) -> Result<bool> {
    let outcome = weather::get_weather_forecast(config, destination, travel_dates);
    print_outcome(&outcome, &mut io::stdout().lock())
}

/// `trellis flights`; returns whether the tool succeeded
pub fn flights(
    config: &TravelConfig,
    origin: &str,
    destination: &str,
    departure_date: &str,
) -> Result<bool> {
    let outcome = flights::search_flights(config, origin, destination, departure_date);
    print_outcome(&outcome, &mut io::stdout().lock())
}

fn print_outcome<T: Serialize, W: Write>(outcome: &ToolOutcome<T>, out: &mut W) -> Result<bool> {
    let json = serde_json::to_string_pretty(outcome)?;
    writeln!(out, "{}", json)?;
    Ok(outcome.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_outcome_error() {
        let outcome: ToolOutcome<()> = ToolOutcome::error("nope");
        let mut out = Vec::new();
        let ok = print_outcome(&outcome, &mut out).unwrap();
        assert!(!ok);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error_message"], "nope");
    }

    #[test]
    fn test_flights_validation_prints_error() {
        let config = TravelConfig {
            aviationstack_api_key: Some("k".to_string()),
            ..TravelConfig::default()
        };
        let ok = flights(&config, "JF", "LAX", "2099-01-01").unwrap();
        assert!(!ok);
    }
}
