//! AccuWeather 天气预报 + 行李建议

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::http::{get_json, FetchError};
use super::{Provider, ToolOutcome, TravelError};
use crate::storage::config::TravelConfig;

pub const DATA_SOURCE: &str = "AccuWeather API";

/// A resolved AccuWeather location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub location_key: String,
    pub city_name: String,
    pub country: String,
    pub administrative_area: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemperatureSummary {
    pub overall_min_celsius: f64,
    pub overall_max_celsius: f64,
    pub overall_min_fahrenheit: i64,
    pub overall_max_fahrenheit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyForecast {
    pub date: String,
    pub temperature_min_celsius: f64,
    pub temperature_max_celsius: f64,
    pub temperature_min_fahrenheit: i64,
    pub temperature_max_fahrenheit: i64,
    pub day_condition: String,
    pub night_condition: String,
    pub precipitation_probability_day: u32,
    pub precipitation_probability_night: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub destination: String,
    pub country: String,
    pub dates: String,
    pub forecast_period: String,
    pub temperature_summary: TemperatureSummary,
    pub conditions_summary: String,
    pub daily_forecasts: Vec<DailyForecast>,
    pub packing_suggestions: Vec<String>,
    pub data_source: &'static str,
}

// ========== AccuWeather wire types ==========

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiLocation {
    key: String,
    localized_name: String,
    country: ApiNamed,
    #[serde(default)]
    administrative_area: Option<ApiNamed>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiNamed {
    localized_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiForecast {
    #[serde(default)]
    daily_forecasts: Vec<ApiDay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ApiDay {
    date: String,
    temperature: ApiTemperature,
    day: ApiHalfDay,
    night: ApiHalfDay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ApiTemperature {
    minimum: ApiValue,
    maximum: ApiValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ApiValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ApiHalfDay {
    icon_phrase: String,
    precipitation_probability: u32,
}

impl Default for ApiHalfDay {
    fn default() -> Self {
        Self {
            icon_phrase: "Unknown".to_string(),
            precipitation_probability: 0,
        }
    }
}

// ========== Tool ==========

/// 查询目的地天气并生成行李建议
pub fn get_weather_forecast(
    config: &TravelConfig,
    destination: &str,
    travel_dates: &str,
) -> ToolOutcome<WeatherReport> {
    forecast_report(config, destination, travel_dates).into()
}

fn forecast_report(
    config: &TravelConfig,
    destination: &str,
    travel_dates: &str,
) -> Result<WeatherReport, TravelError> {
    let location = get_location_key(config, destination)?;
    let forecast = get_forecast(config, api_key(config)?, &location.location_key)?;
    Ok(build_report(&location, travel_dates, forecast))
}

fn api_key(config: &TravelConfig) -> Result<&str, TravelError> {
    config
        .accuweather_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(TravelError::MissingApiKey(Provider::AccuWeather))
}

/// Forecast 请求失败（措辞比城市查询一步更简短）
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Invalid AccuWeather API key.")]
    InvalidApiKey,

    #[error("AccuWeather API is temporarily unavailable. Please try again later.")]
    Unavailable,

    #[error("AccuWeather API error: {0}")]
    Status(u16),

    #[error("AccuWeather API request timed out. Please try again.")]
    Timeout,

    #[error("Could not connect to AccuWeather API. Please check your internet connection.")]
    Connection,

    #[error("Unexpected error fetching forecast: {0}")]
    Unexpected(String),
}

impl From<FetchError> for ForecastError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status(401) => ForecastError::InvalidApiKey,
            FetchError::Status(503) => ForecastError::Unavailable,
            FetchError::Status(status) => ForecastError::Status(status),
            FetchError::Timeout => ForecastError::Timeout,
            FetchError::Connection => ForecastError::Connection,
            FetchError::Other(detail) => ForecastError::Unexpected(detail),
        }
    }
}

fn lookup_error(err: FetchError) -> TravelError {
    let provider = Provider::AccuWeather;
    match err {
        FetchError::Status(401) => TravelError::InvalidApiKey(provider),
        FetchError::Status(503) => TravelError::Unavailable(provider),
        FetchError::Status(status) => TravelError::Status { provider, status },
        FetchError::Timeout => TravelError::Timeout(provider),
        FetchError::Connection => TravelError::Connection(provider),
        FetchError::Other(detail) => TravelError::Unexpected {
            context: "while looking up location",
            detail,
        },
    }
}

/// Resolve a city name to its AccuWeather location key (first hit wins)
pub fn get_location_key(config: &TravelConfig, city: &str) -> Result<Location, TravelError> {
    let key = api_key(config)?;
    let url = format!(
        "{}/locations/v1/cities/search",
        config.accuweather_base_url.trim_end_matches('/')
    );
    let locations: Vec<ApiLocation> = get_json(
        Provider::AccuWeather,
        &url,
        &[("apikey", key), ("q", city)],
        config.timeout(),
    )
    .map_err(lookup_error)?;

    let first = locations
        .into_iter()
        .next()
        .ok_or_else(|| TravelError::LocationNotFound(city.to_string()))?;

    tracing::debug!(city, key = %first.key, "resolved location");
    Ok(Location {
        location_key: first.key,
        city_name: first.localized_name,
        country: first.country.localized_name,
        administrative_area: first
            .administrative_area
            .map(|a| a.localized_name)
            .unwrap_or_default(),
    })
}

fn get_forecast(
    config: &TravelConfig,
    key: &str,
    location_key: &str,
) -> Result<ApiForecast, ForecastError> {
    let url = format!(
        "{}/forecasts/v1/daily/5day/{}",
        config.accuweather_base_url.trim_end_matches('/'),
        location_key
    );
    get_json(
        Provider::AccuWeather,
        &url,
        &[("apikey", key), ("details", "true"), ("metric", "true")],
        config.timeout(),
    )
    .map_err(ForecastError::from)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> i64 {
    (celsius * 9.0 / 5.0 + 32.0).round() as i64
}

fn build_report(location: &Location, travel_dates: &str, forecast: ApiForecast) -> WeatherReport {
    let daily: Vec<DailyForecast> = forecast
        .daily_forecasts
        .into_iter()
        .map(|day| {
            let min = day.temperature.minimum.value;
            let max = day.temperature.maximum.value;
            DailyForecast {
                date: day.date.split('T').next().unwrap_or_default().to_string(),
                temperature_min_celsius: min,
                temperature_max_celsius: max,
                temperature_min_fahrenheit: celsius_to_fahrenheit(min),
                temperature_max_fahrenheit: celsius_to_fahrenheit(max),
                day_condition: day.day.icon_phrase,
                night_condition: day.night.icon_phrase,
                precipitation_probability_day: day.day.precipitation_probability,
                precipitation_probability_night: day.night.precipitation_probability,
            }
        })
        .collect();

    let overall_min = daily
        .iter()
        .map(|d| d.temperature_min_celsius)
        .reduce(f64::min)
        .unwrap_or(0.0);
    let overall_max = daily
        .iter()
        .map(|d| d.temperature_max_celsius)
        .reduce(f64::max)
        .unwrap_or(0.0);

    let conditions_summary = summarize_conditions(&daily);
    let packing_suggestions =
        generate_packing_suggestions(overall_min, overall_max, &conditions_summary);

    WeatherReport {
        destination: location.city_name.clone(),
        country: location.country.clone(),
        dates: travel_dates.to_string(),
        forecast_period: format!("{}-day forecast", daily.len()),
        temperature_summary: TemperatureSummary {
            overall_min_celsius: overall_min,
            overall_max_celsius: overall_max,
            overall_min_fahrenheit: celsius_to_fahrenheit(overall_min),
            overall_max_fahrenheit: celsius_to_fahrenheit(overall_max),
        },
        conditions_summary,
        daily_forecasts: daily,
        packing_suggestions,
        data_source: DATA_SOURCE,
    }
}

/// Distinct day conditions of the first three days, first-seen order
fn summarize_conditions(daily: &[DailyForecast]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for day in daily.iter().take(3) {
        if !seen.contains(&day.day_condition.as_str()) {
            seen.push(&day.day_condition);
        }
    }
    seen.join(", ")
}

/// 根据温度（摄氏）和天气描述生成行李清单，去重并保持顺序
pub fn generate_packing_suggestions(temp_min: f64, temp_max: f64, conditions: &str) -> Vec<String> {
    let mut items: Vec<&str> = Vec::new();

    if temp_max >= 30.0 {
        items.extend([
            "Light, breathable clothing",
            "Sunscreen",
            "Hat",
            "Sunglasses",
            "Water bottle",
        ]);
    } else if temp_max >= 20.0 {
        items.extend(["Light clothing", "Sunglasses", "Light jacket for evenings"]);
    } else if temp_max >= 10.0 {
        items.extend(["Layers", "Medium jacket", "Comfortable walking shoes"]);
    } else {
        items.extend(["Warm coat", "Gloves", "Scarf", "Warm layers"]);
    }

    if temp_min <= 0.0 {
        items.extend(["Heavy winter coat", "Thermal underwear", "Warm boots"]);
    } else if temp_min <= 10.0 {
        items.push("Warm jacket");
    }

    let conditions = conditions.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| conditions.contains(w));
    if mentions(&["rain", "shower", "storm"]) {
        items.extend(["Umbrella", "Waterproof jacket", "Waterproof shoes"]);
    }
    if mentions(&["snow"]) {
        items.extend(["Snow boots", "Waterproof gloves", "Winter accessories"]);
    }
    if mentions(&["sun", "clear", "hot"]) {
        items.extend(["Sunscreen", "Sunglasses"]);
    }

    let mut unique: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.iter().any(|u| u == item) {
            unique.push(item.to_string());
        }
    }
    unique
}
