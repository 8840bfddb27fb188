//! Live weather tool backed by [`crate::weather::WeatherService`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::weather::{Units, WeatherError, WeatherService};

use super::{required_str_arg, Tool, ToolError};

/// Fetch current weather for a named place.
pub struct GetWeather {
    service: Arc<WeatherService>,
}

impl GetWeather {
    pub fn new(service: Arc<WeatherService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather for a city or location. Use the modern name of the city \
         (e.g. \"Livorno\" not \"Leghorn\", \"Istanbul\" not \"Constantinople\"). Returns \
         temperature, feels-like, conditions, humidity, and wind speed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Modern city or location name, e.g. \"Paris\" or \"Rome, Italy\""
                },
                "units": {
                    "type": "string",
                    "enum": ["metric", "imperial", "standard"],
                    "description": "Temperature units. Defaults to metric (Celsius)."
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let location = required_str_arg(&args, "location")?;
        let units = args
            .get("units")
            .and_then(Value::as_str)
            .map(Units::parse)
            .unwrap_or_default();

        tracing::info!(location = %location, "Fetching weather");
        match self.service.current(location, units).await {
            Ok(report) => Ok(report.format()),
            Err(WeatherError::LocationNotFound(_)) => Err(ToolError::NotFound(format!(
                "I couldn't find the location '{}'. The city name may be misspelled or not \
                 recognized; please verify the modern city name.",
                location
            ))),
            Err(WeatherError::Timeout) => Err(ToolError::Timeout),
            Err(WeatherError::Unavailable(detail)) => {
                tracing::warn!(location = %location, error = %detail, "Weather lookup failed");
                Err(ToolError::Service(detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> GetWeather {
        GetWeather::new(Arc::new(WeatherService::new("test-key".to_string())))
    }

    #[tokio::test]
    async fn missing_location_is_invalid() {
        let result = tool().execute(json!({"units": "metric"})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn blank_location_is_invalid() {
        let result = tool().execute(json!({"location": "  "})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn schema_requires_location() {
        let schema = tool().parameters_schema();
        assert_eq!(schema["required"][0], "location");
        assert!(schema["properties"]["units"]["enum"].is_array());
    }
}
