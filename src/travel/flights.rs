//! Aviation Stack 航班搜索
//!
//! Real API first; any non-fatal failure (bad status, bad body, no data)
//! falls back to generated mock flights. Only an invalid key, a timeout or a
//! connection failure is reported as an error.

use chrono::{Local, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::http::{get_json, FetchError};
use super::{Provider, ToolOutcome, TravelError};
use crate::storage::config::TravelConfig;

pub const REAL_DATA_SOURCE: &str = "Aviation Stack API (Real-time)";
pub const MOCK_DATA_SOURCE: &str = "Mock Data (Real API did not return results)";

const MAX_REAL_FLIGHTS: usize = 5;

/// Built-in airport table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Airport {
    pub code: &'static str,
    pub name: &'static str,
    pub city: &'static str,
    pub country: &'static str,
}

const fn airport(
    code: &'static str,
    name: &'static str,
    city: &'static str,
    country: &'static str,
) -> Airport {
    Airport {
        code,
        name,
        city,
        country,
    }
}

pub const AIRPORTS: &[Airport] = &[
    airport("JFK", "John F. Kennedy International", "New York", "USA"),
    airport("LAX", "Los Angeles International", "Los Angeles", "USA"),
    airport("LHR", "London Heathrow", "London", "UK"),
    airport("CDG", "Charles de Gaulle", "Paris", "France"),
    airport("NRT", "Narita International", "Tokyo", "Japan"),
    airport("DXB", "Dubai International", "Dubai", "UAE"),
    airport("DEL", "Indira Gandhi International", "Delhi", "India"),
    airport(
        "BOM",
        "Chhatrapati Shivaji Maharaj International",
        "Mumbai",
        "India",
    ),
    airport("SFO", "San Francisco International", "San Francisco", "USA"),
    airport("ORD", "O'Hare International", "Chicago", "USA"),
    airport("FRA", "Frankfurt Airport", "Frankfurt", "Germany"),
    airport("AMS", "Amsterdam Airport Schiphol", "Amsterdam", "Netherlands"),
    airport("HND", "Tokyo Haneda", "Tokyo", "Japan"),
    airport("SIN", "Singapore Changi", "Singapore", "Singapore"),
    airport("SYD", "Sydney Kingsford Smith", "Sydney", "Australia"),
];

/// Approximate block times in hours; looked up in both directions
const ROUTE_HOURS: &[(&str, &str, f64)] = &[
    ("JFK", "LAX", 6.0),
    ("JFK", "LHR", 7.0),
    ("JFK", "CDG", 7.0),
    ("LAX", "NRT", 11.0),
    ("LHR", "CDG", 1.5),
    ("LHR", "DXB", 7.0),
    ("DEL", "BOM", 2.0),
    ("JFK", "DEL", 14.0),
    ("LAX", "DEL", 16.0),
];
const DEFAULT_ROUTE_HOURS: f64 = 8.0;

const MOCK_AIRLINES: &[(&str, &str)] = &[
    ("Delta Air Lines", "DL"),
    ("American Airlines", "AA"),
    ("United Airlines", "UA"),
    ("Emirates", "EK"),
    ("Lufthansa", "LH"),
    ("British Airways", "BA"),
    ("Air France", "AF"),
];

const MOCK_AIRCRAFT: &[&str] = &["Boeing 737", "Airbus A320", "Boeing 777", "Airbus A350"];
const QUARTER_HOURS: &[u32] = &[0, 15, 30, 45];

// ========== Result types ==========

#[derive(Debug, Clone, Serialize)]
pub struct AirportSummary {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

impl From<&Airport> for AirportSummary {
    fn from(a: &Airport) -> Self {
        Self {
            code: a.code.to_string(),
            name: a.name.to_string(),
            city: a.city.to_string(),
            country: a.country.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Route {
    pub origin: AirportSummary,
    pub destination: AirportSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Airline {
    pub name: String,
    pub iata: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightEndpoint {
    pub airport: String,
    pub iata: String,
    pub city: String,
    pub scheduled_time: String,
}

/// One flight option; real results carry `status`, mock ones carry
/// duration, price, aircraft and stops.
#[derive(Debug, Clone, Serialize)]
pub struct Flight {
    pub flight_date: String,
    pub airline: Airline,
    pub flight_number: String,
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stops: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightSearch {
    pub route: Route,
    pub departure_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights_found: Option<usize>,
    pub flights: Vec<Flight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data_source: String,
}

// ========== Aviation Stack wire types ==========

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<Vec<ApiFlight>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiFlight {
    flight_date: Option<String>,
    flight_status: Option<String>,
    airline: Option<ApiAirline>,
    flight: Option<ApiFlightNumber>,
    departure: Option<ApiEndpoint>,
    arrival: Option<ApiEndpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiAirline {
    name: Option<String>,
    iata: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiFlightNumber {
    iata: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiEndpoint {
    airport: Option<String>,
    iata: Option<String>,
    scheduled: Option<String>,
}

// ========== Validation ==========

pub fn find_airport(code: &str) -> Option<&'static Airport> {
    let code = code.trim();
    AIRPORTS.iter().find(|a| a.code.eq_ignore_ascii_case(code))
}

/// 校验 IATA 机场代码（3 个字符且在内置表中）
pub fn validate_airport_code(code: &str) -> Result<&'static Airport, TravelError> {
    if code.chars().count() != 3 {
        return Err(TravelError::InvalidAirportCode(code.to_string()));
    }
    find_airport(code).ok_or_else(|| TravelError::UnknownAirport(code.to_uppercase()))
}

fn validate_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, TravelError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| TravelError::InvalidDate(raw.to_string()))?;
    if date < today {
        return Err(TravelError::PastDate(raw.to_string()));
    }
    Ok(date)
}

// ========== Tool ==========

/// 搜索两个机场之间的航班
pub fn search_flights(
    config: &TravelConfig,
    origin: &str,
    destination: &str,
    departure_date: &str,
) -> ToolOutcome<FlightSearch> {
    let today = Local::now().date_naive();
    search_flights_with(
        config,
        origin,
        destination,
        departure_date,
        today,
        &mut rand::thread_rng(),
    )
    .into()
}

/// Same as [`search_flights`] with the clock and random source supplied
pub fn search_flights_with<R: Rng>(
    config: &TravelConfig,
    origin: &str,
    destination: &str,
    departure_date: &str,
    today: NaiveDate,
    rng: &mut R,
) -> Result<FlightSearch, TravelError> {
    let key = config
        .aviationstack_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(TravelError::MissingApiKey(Provider::AviationStack))?;

    let from = validate_airport_code(origin)?;
    let to = validate_airport_code(destination)?;
    validate_date(departure_date, today)?;

    let (flights, data_source) = match fetch_real_flights(config, key, from, to, departure_date)? {
        Some(flights) => (flights, REAL_DATA_SOURCE),
        None => {
            tracing::info!(
                origin = from.code,
                destination = to.code,
                "no real flight data, using mock flights"
            );
            (
                generate_mock_flights(rng, from, to, departure_date),
                MOCK_DATA_SOURCE,
            )
        }
    };

    let route = Route {
        origin: from.into(),
        destination: to.into(),
    };

    if flights.is_empty() {
        return Ok(FlightSearch {
            route,
            departure_date: departure_date.to_string(),
            flights_found: None,
            flights,
            message: Some(format!(
                "No flights found between {} and {} for {}.",
                from.code, to.code, departure_date
            )),
            data_source: data_source.to_string(),
        });
    }

    Ok(FlightSearch {
        route,
        departure_date: departure_date.to_string(),
        flights_found: Some(flights.len()),
        flights,
        message: None,
        data_source: data_source.to_string(),
    })
}

/// `Ok(None)` means "fall back to mock data"
fn fetch_real_flights(
    config: &TravelConfig,
    key: &str,
    from: &Airport,
    to: &Airport,
    departure_date: &str,
) -> Result<Option<Vec<Flight>>, TravelError> {
    let provider = Provider::AviationStack;
    let url = format!(
        "{}/flights",
        config.aviationstack_base_url.trim_end_matches('/')
    );
    let response: ApiResponse = match get_json(
        provider,
        &url,
        &[
            ("access_key", key),
            ("dep_iata", from.code),
            ("arr_iata", to.code),
            ("flight_date", departure_date),
            ("limit", "10"),
        ],
        config.timeout(),
    ) {
        Ok(response) => response,
        Err(FetchError::Status(401)) => return Err(TravelError::InvalidApiKey(provider)),
        Err(FetchError::Timeout) => return Err(TravelError::Timeout(provider)),
        Err(FetchError::Connection) => return Err(TravelError::Connection(provider)),
        Err(FetchError::Status(_)) | Err(FetchError::Other(_)) => return Ok(None),
    };

    let data = response.data.unwrap_or_default();
    if data.is_empty() {
        return Ok(None);
    }

    let flights = data
        .into_iter()
        .take(MAX_REAL_FLIGHTS)
        .map(|f| real_flight(f, from, to))
        .collect();
    Ok(Some(flights))
}

/// `2026-06-15T08:30:00+00:00` -> `08:30`
fn clock_time(scheduled: Option<&str>) -> String {
    scheduled
        .and_then(|s| s.split_once('T'))
        .map(|(_, time)| time.chars().take(5).collect())
        .unwrap_or_default()
}

fn real_flight(flight: ApiFlight, from: &Airport, to: &Airport) -> Flight {
    let airline = flight.airline.unwrap_or_default();
    let departure = flight.departure.unwrap_or_default();
    let arrival = flight.arrival.unwrap_or_default();

    Flight {
        flight_date: flight.flight_date.unwrap_or_default(),
        airline: Airline {
            name: airline.name.unwrap_or_else(|| "Unknown".to_string()),
            iata: airline.iata.unwrap_or_default(),
        },
        flight_number: flight.flight.and_then(|f| f.iata).unwrap_or_default(),
        departure: FlightEndpoint {
            scheduled_time: clock_time(departure.scheduled.as_deref()),
            airport: departure.airport.unwrap_or_default(),
            iata: departure.iata.unwrap_or_else(|| from.code.to_string()),
            city: from.city.to_string(),
        },
        arrival: FlightEndpoint {
            scheduled_time: clock_time(arrival.scheduled.as_deref()),
            airport: arrival.airport.unwrap_or_default(),
            iata: arrival.iata.unwrap_or_else(|| to.code.to_string()),
            city: to.city.to_string(),
        },
        status: Some(
            flight
                .flight_status
                .unwrap_or_else(|| "scheduled".to_string()),
        ),
        duration_hours: None,
        price_usd: None,
        aircraft_type: None,
        stops: None,
    }
}

// ========== Mock data ==========

pub fn route_hours(from: &str, to: &str) -> f64 {
    ROUTE_HOURS
        .iter()
        .find(|(a, b, _)| {
            (a.eq_ignore_ascii_case(from) && b.eq_ignore_ascii_case(to))
                || (a.eq_ignore_ascii_case(to) && b.eq_ignore_ascii_case(from))
        })
        .map(|(_, _, hours)| *hours)
        .unwrap_or(DEFAULT_ROUTE_HOURS)
}

fn pick<'a, T, R: Rng>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// 生成 3-5 个模拟航班，按起飞时间排序
pub fn generate_mock_flights<R: Rng>(
    rng: &mut R,
    from: &Airport,
    to: &Airport,
    departure_date: &str,
) -> Vec<Flight> {
    let hours = route_hours(from.code, to.code);
    let count = rng.gen_range(3..=5);

    let mut flights: Vec<Flight> = (0..count)
        .map(|i: u32| {
            let (airline_name, airline_iata) = *pick(rng, MOCK_AIRLINES);
            let number = rng.gen_range(100..=999);

            let hour = 6 + i * 3 + rng.gen_range(0..=2);
            let minute = *pick(rng, QUARTER_HOURS);
            let departs = hour * 60 + minute;
            // arrival wraps past midnight
            let arrives = (departs + (hours * 60.0).round() as u32) % (24 * 60);

            let price = (300.0 + hours * 50.0) as i64 + rng.gen_range(-100..=200);
            let aircraft = *pick(rng, MOCK_AIRCRAFT);
            let stops = if hours < 10.0 { 0 } else { rng.gen_range(0..=1) };

            Flight {
                flight_date: departure_date.to_string(),
                airline: Airline {
                    name: airline_name.to_string(),
                    iata: airline_iata.to_string(),
                },
                flight_number: format!("{}{}", airline_iata, number),
                departure: FlightEndpoint {
                    airport: from.name.to_string(),
                    iata: from.code.to_string(),
                    city: from.city.to_string(),
                    scheduled_time: format!("{:02}:{:02}", departs / 60, departs % 60),
                },
                arrival: FlightEndpoint {
                    airport: to.name.to_string(),
                    iata: to.code.to_string(),
                    city: to.city.to_string(),
                    scheduled_time: format!("{:02}:{:02}", arrives / 60, arrives % 60),
                },
                status: None,
                duration_hours: Some((hours * 10.0).round() / 10.0),
                price_usd: Some(price),
                aircraft_type: Some(aircraft.to_string()),
                stops: Some(stops),
            }
        })
        .collect();

    flights.sort_by(|a, b| a.departure.scheduled_time.cmp(&b.departure.scheduled_time));
    flights
}
