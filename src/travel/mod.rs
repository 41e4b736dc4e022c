//! Travel planning tools backed by third-party HTTP APIs
//!
//! - `weather`: AccuWeather location lookup + 5-day forecast + packing list
//! - `flights`: Aviation Stack flight search with a mock-data fallback
//!
//! Every tool returns a `ToolOutcome`, which serializes to the flat
//! `{"status": "success", ...}` / `{"status": "error", "error_message": ...}`
//! shape that MCP clients read.

pub mod flights;
mod http;
pub mod weather;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Upstream API provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    AccuWeather,
    AviationStack,
}

impl Provider {
    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::AccuWeather => crate::storage::config::ACCUWEATHER_KEY_ENV,
            Provider::AviationStack => crate::storage::config::AVIATION_STACK_KEY_ENV,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::AccuWeather => f.write_str("AccuWeather"),
            Provider::AviationStack => f.write_str("Aviation Stack"),
        }
    }
}

/// Travel tool failures, worded for the end user
#[derive(Debug, Error)]
pub enum TravelError {
    #[error("{key} not found in environment variables. Please check your .env file.", key = .0.key_var())]
    MissingApiKey(Provider),

    #[error("Invalid {provider} API key. Please check your {key} in .env file.", provider = .0, key = .0.key_var())]
    InvalidApiKey(Provider),

    #[error("{0} API is temporarily unavailable. Please try again in a few moments.")]
    Unavailable(Provider),

    #[error("{provider} API error: {status}. Please try again later.")]
    Status { provider: Provider, status: u16 },

    #[error("{0} API request timed out. Please check your internet connection and try again.")]
    Timeout(Provider),

    #[error("Could not connect to {0} API. Please check your internet connection.")]
    Connection(Provider),

    #[error("Unexpected error {context}: {detail}")]
    Unexpected {
        context: &'static str,
        detail: String,
    },

    #[error("Location '{0}' not found. Please check the city name and try again with a more specific name (e.g., 'Paris, France').")]
    LocationNotFound(String),

    #[error("Invalid airport code '{0}'. Airport codes must be 3 letters (e.g., JFK, LAX, LHR).")]
    InvalidAirportCode(String),

    #[error("Airport code '{0}' not found in database. Please use common airport codes like JFK, LAX, LHR, CDG, NRT, DEL, BOM, etc.")]
    UnknownAirport(String),

    #[error("Invalid date format '{0}'. Please use YYYY-MM-DD format (e.g., '2025-06-15').")]
    InvalidDate(String),

    #[error("Cannot search flights for past date '{0}'. Please provide a current or future date.")]
    PastDate(String),

    #[error(transparent)]
    Forecast(#[from] weather::ForecastError),
}

/// Result of a tool invocation as seen by the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome<T> {
    Success(T),
    Error {
        error_message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_type: Option<String>,
    },
}

impl<T> ToolOutcome<T> {
    pub fn error(message: impl Into<String>) -> Self {
        ToolOutcome::Error {
            error_message: message.into(),
            error_type: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    #[cfg(test)]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolOutcome::Success(_) => None,
            ToolOutcome::Error { error_message, .. } => Some(error_message),
        }
    }
}

impl<T> From<Result<T, TravelError>> for ToolOutcome<T> {
    fn from(result: Result<T, TravelError>) -> Self {
        match result {
            Ok(value) => ToolOutcome::Success(value),
            Err(e) => {
                tracing::info!(error = %e, "travel tool returned an error");
                ToolOutcome::error(e.to_string())
            }
        }
    }
}
