//! Current-weather lookups via the OpenWeatherMap API.
//!
//! Resolution is two-step: geocode the place name to coordinates, then
//! fetch current conditions for those coordinates. Both steps can fail
//! independently, and the error type keeps "no such place" distinct from
//! transient service trouble so callers can phrase degradation accurately.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const GEO_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";
const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Deadline for each upstream request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum WeatherError {
    /// The place name did not resolve to any location.
    #[error("location not found: {0}")]
    LocationNotFound(String),

    /// The request exceeded its deadline.
    #[error("weather service timed out")]
    Timeout,

    /// Upstream failure: auth, rate limit, 5xx, or a garbled payload.
    #[error("weather service unavailable: {0}")]
    Unavailable(String),
}

/// Temperature/wind unit system, matching the OpenWeatherMap `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    /// Parse the tool-facing unit string; unknown values fall back to metric.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "imperial" => Units::Imperial,
            "standard" => Units::Standard,
            _ => Units::Metric,
        }
    }

    pub fn as_query_param(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn wind_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

/// A geocoded place.
#[derive(Debug, Clone)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub country: String,
}

/// Current conditions for a resolved location.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub location_name: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub conditions: String,
    pub humidity: u64,
    pub wind_speed: f64,
    pub units: Units,
}

impl WeatherReport {
    /// Human-readable summary, the shape the agent feeds into synthesis.
    pub fn format(&self) -> String {
        format!(
            "Current weather in {}, {}:\n\
             Temperature: {:.1}{} (feels like {:.1}{})\n\
             Conditions: {}\n\
             Humidity: {}%\n\
             Wind Speed: {} {}",
            self.location_name,
            self.country,
            self.temperature,
            self.units.temperature_symbol(),
            self.feels_like,
            self.units.temperature_symbol(),
            capitalize(&self.conditions),
            self.humidity,
            self.wind_speed,
            self.units.wind_symbol(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    lat: f64,
    lon: f64,
    name: String,
    #[serde(default)]
    country: Option<String>,
}

/// Client for the OpenWeatherMap geocoding and current-weather endpoints.
pub struct WeatherService {
    client: reqwest::Client,
    api_key: String,
    geo_url: String,
    weather_url: String,
}

impl WeatherService {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            geo_url: GEO_URL.to_string(),
            weather_url: WEATHER_URL.to_string(),
        }
    }

    /// Resolve a place name to coordinates.
    pub async fn geocode(&self, location: &str) -> Result<GeoLocation, WeatherError> {
        let response = self
            .client
            .get(&self.geo_url)
            .query(&[
                ("q", location),
                ("limit", "1"),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let entries: Vec<GeoEntry> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| WeatherError::Unavailable(e.to_string()))?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::LocationNotFound(location.to_string()))?;

        tracing::debug!(
            location = %location,
            resolved = %entry.name,
            lat = entry.lat,
            lon = entry.lon,
            "Geocoded location"
        );

        Ok(GeoLocation {
            latitude: entry.lat,
            longitude: entry.lon,
            name: entry.name,
            country: entry.country.unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    /// Fetch current conditions for already-resolved coordinates.
    pub async fn current_by_coordinates(
        &self,
        location: &GeoLocation,
        units: Units,
    ) -> Result<WeatherReport, WeatherError> {
        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();
        let response = self
            .client
            .get(&self.weather_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("units", units.as_query_param()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let payload: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| WeatherError::Unavailable(e.to_string()))?;

        parse_conditions(&payload, location, units)
    }

    /// Two-step lookup: geocode, then current conditions.
    pub async fn current(
        &self,
        location: &str,
        units: Units,
    ) -> Result<WeatherReport, WeatherError> {
        let resolved = self.geocode(location).await?;
        self.current_by_coordinates(&resolved, units).await
    }
}

fn map_request_error(e: reqwest::Error) -> WeatherError {
    if e.is_timeout() {
        WeatherError::Timeout
    } else {
        WeatherError::Unavailable(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, WeatherError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(WeatherError::LocationNotFound(
            "requested location".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(WeatherError::Unavailable(format!(
            "upstream returned {}",
            status
        )));
    }
    Ok(response)
}

/// Pull the fields we present out of the current-weather payload.
fn parse_conditions(
    payload: &Value,
    location: &GeoLocation,
    units: Units,
) -> Result<WeatherReport, WeatherError> {
    let main = payload
        .get("main")
        .ok_or_else(|| WeatherError::Unavailable("missing 'main' block".to_string()))?;

    let temperature = main
        .get("temp")
        .and_then(Value::as_f64)
        .ok_or_else(|| WeatherError::Unavailable("missing temperature".to_string()))?;
    let feels_like = main
        .get("feels_like")
        .and_then(Value::as_f64)
        .unwrap_or(temperature);
    let humidity = main.get("humidity").and_then(Value::as_u64).unwrap_or(0);

    let conditions = payload
        .get("weather")
        .and_then(|w| w.get(0))
        .and_then(|w| w.get("description"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let wind_speed = payload
        .get("wind")
        .and_then(|w| w.get("speed"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Ok(WeatherReport {
        location_name: location.name.clone(),
        country: location.country.clone(),
        temperature,
        feels_like,
        conditions,
        humidity,
        wind_speed,
        units,
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paris() -> GeoLocation {
        GeoLocation {
            latitude: 48.85,
            longitude: 2.35,
            name: "Paris".to_string(),
            country: "FR".to_string(),
        }
    }

    #[test]
    fn units_parse_with_metric_fallback() {
        assert_eq!(Units::parse("imperial"), Units::Imperial);
        assert_eq!(Units::parse("Standard"), Units::Standard);
        assert_eq!(Units::parse("metric"), Units::Metric);
        assert_eq!(Units::parse("kelvinish"), Units::Metric);
    }

    #[test]
    fn unit_symbols() {
        assert_eq!(Units::Metric.temperature_symbol(), "°C");
        assert_eq!(Units::Imperial.temperature_symbol(), "°F");
        assert_eq!(Units::Standard.temperature_symbol(), "K");
        assert_eq!(Units::Imperial.wind_symbol(), "mph");
        assert_eq!(Units::Metric.wind_symbol(), "m/s");
    }

    #[test]
    fn parses_current_conditions_payload() {
        let payload = json!({
            "main": {"temp": 15.3, "feels_like": 14.1, "humidity": 62},
            "weather": [{"main": "Clouds", "description": "scattered clouds"}],
            "wind": {"speed": 4.2}
        });

        let report = parse_conditions(&payload, &paris(), Units::Metric).unwrap();
        assert_eq!(report.location_name, "Paris");
        assert_eq!(report.temperature, 15.3);
        assert_eq!(report.humidity, 62);
        assert_eq!(report.conditions, "scattered clouds");
    }

    #[test]
    fn missing_temperature_is_unavailable() {
        let payload = json!({"main": {"humidity": 50}});
        assert!(matches!(
            parse_conditions(&payload, &paris(), Units::Metric),
            Err(WeatherError::Unavailable(_))
        ));
    }

    #[test]
    fn report_formats_with_unit_symbols() {
        let report = WeatherReport {
            location_name: "Paris".to_string(),
            country: "FR".to_string(),
            temperature: 15.0,
            feels_like: 13.5,
            conditions: "light rain".to_string(),
            humidity: 70,
            wind_speed: 3.6,
            units: Units::Metric,
        };

        let text = report.format();
        assert!(text.contains("Current weather in Paris, FR"));
        assert!(text.contains("15.0°C"));
        assert!(text.contains("feels like 13.5°C"));
        assert!(text.contains("Light rain"));
        assert!(text.contains("70%"));
        assert!(text.contains("3.6 m/s"));
    }
}
