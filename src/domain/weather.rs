use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::models::NewWeatherSnapshot;
use crate::domain::numeric::parse_f64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("weather payload must be a JSON object")]
    InvalidPayloadType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Readings {
    ghi: Option<f64>,
    dni: Option<f64>,
    dhi: Option<f64>,
    temperature: Option<f64>,
    temperature_max: Option<f64>,
    temperature_min: Option<f64>,
    clouds: Option<f64>,
}

/// Flattens a provider response into snapshot fields. Accepts the instant
/// (`current`), daily aggregate (`daily`) and detailed radiation (`hourly`)
/// shapes; the first section present wins. Irradiance defaults to zero.
pub fn normalize(
    payload: &Value,
    location: Location,
    captured_at: i64,
    created_at: &str,
) -> Result<NewWeatherSnapshot, NormalizeError> {
    let object = payload.as_object().ok_or(NormalizeError::InvalidPayloadType)?;

    let readings = section(object, "current")
        .map(read_current)
        .or_else(|| section(object, "daily").map(read_daily))
        .or_else(|| section(object, "hourly").map(read_hourly))
        .unwrap_or_default();

    Ok(NewWeatherSnapshot {
        latitude: location.latitude,
        longitude: location.longitude,
        ghi: readings.ghi.unwrap_or(0.0),
        dni: readings.dni.unwrap_or(0.0),
        dhi: readings.dhi.unwrap_or(0.0),
        temperature: readings.temperature,
        temperature_max: readings.temperature_max,
        temperature_min: readings.temperature_min,
        clouds: readings.clouds,
        raw_json: payload.to_string(),
        captured_at,
        created_at: created_at.to_string(),
    })
}

fn section<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

fn read_current(current: &Map<String, Value>) -> Readings {
    let scalar = |key: &str| current.get(key).and_then(parse_f64);

    Readings {
        ghi: scalar("shortwave_radiation"),
        dni: scalar("direct_normal_irradiance"),
        dhi: scalar("diffuse_radiation"),
        temperature: scalar("temperature_2m"),
        temperature_max: None,
        temperature_min: None,
        clouds: scalar("cloud_cover"),
    }
}

fn read_daily(daily: &Map<String, Value>) -> Readings {
    let temperature_max = first_of(daily, "temperature_2m_max");
    let temperature_min = first_of(daily, "temperature_2m_min");
    let temperature = match (temperature_max, temperature_min) {
        (Some(max), Some(min)) => Some((max + min) / 2.0),
        (max, min) => max.or(min),
    };

    Readings {
        ghi: first_of(daily, "shortwave_radiation_sum"),
        dni: None,
        dhi: None,
        temperature,
        temperature_max,
        temperature_min,
        clouds: first_of(daily, "cloud_cover_mean"),
    }
}

fn read_hourly(hourly: &Map<String, Value>) -> Readings {
    Readings {
        ghi: first_of(hourly, "shortwave_radiation"),
        dni: first_of(hourly, "direct_normal_irradiance"),
        dhi: first_of(hourly, "diffuse_radiation"),
        temperature: first_of(hourly, "temperature_2m"),
        temperature_max: None,
        temperature_min: None,
        clouds: first_of(hourly, "cloud_cover"),
    }
}

fn first_of(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object
        .get(key)
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(parse_f64)
}
