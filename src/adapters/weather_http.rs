use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::domain::weather::Location;

const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

const CURRENT_FIELDS: &str =
    "shortwave_radiation,direct_normal_irradiance,diffuse_radiation,temperature_2m,cloud_cover";
const DAILY_FIELDS: &str =
    "shortwave_radiation_sum,temperature_2m_max,temperature_2m_min,cloud_cover_mean";
const RADIATION_FIELDS: &str =
    "shortwave_radiation,direct_normal_irradiance,diffuse_radiation,temperature_2m,cloud_cover";

pub trait WeatherProvider: Send + Sync + 'static {
    fn fetch(&self, location: Location) -> Result<Value, WeatherError>;
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request timed out")]
    Timeout,
    #[error("weather request failed: {0}")]
    Network(String),
    #[error("weather provider responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("weather response is not valid JSON: {0}")]
    Decode(String),
}

/// Which Open-Meteo section is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherMode {
    Current,
    Daily,
    Radiation,
}

impl FromStr for WeatherMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "daily" => Ok(Self::Daily),
            "radiation" | "hourly" => Ok(Self::Radiation),
            other => Err(format!("unknown weather mode: {other}")),
        }
    }
}

impl WeatherMode {
    fn query(self) -> Vec<(&'static str, String)> {
        match self {
            Self::Current => vec![("current", CURRENT_FIELDS.to_string())],
            Self::Daily => vec![
                ("daily", DAILY_FIELDS.to_string()),
                ("forecast_days", "1".to_string()),
            ],
            Self::Radiation => vec![
                ("hourly", RADIATION_FIELDS.to_string()),
                ("forecast_hours", "1".to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    timezone: String,
    mode: WeatherMode,
    client: Client,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str, timezone: &str, mode: WeatherMode) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(WEATHER_TIMEOUT)
            .build()
            .map_err(|error| WeatherError::Network(error.to_string()))?;

        Ok(Self {
            base_url: base_url.to_string(),
            timezone: timezone.to_string(),
            mode,
            client,
        })
    }

    fn query(&self, location: Location) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("timezone", self.timezone.clone()),
        ];
        query.extend(self.mode.query());
        query
    }
}

impl WeatherProvider for OpenMeteoProvider {
    fn fetch(&self, location: Location) -> Result<Value, WeatherError> {
        let response = self
            .client
            .get(self.base_url.as_str())
            .query(&self.query(location))
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|error| WeatherError::Decode(error.to_string()))
    }
}

fn map_reqwest_error(error: reqwest::Error) -> WeatherError {
    if error.is_timeout() {
        WeatherError::Timeout
    } else {
        WeatherError::Network(error.to_string())
    }
}
