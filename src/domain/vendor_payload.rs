use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::models::DataPoint;
use crate::domain::numeric::{parse_f64, parse_i64};

pub const INVERTER_DEVICE_TYPE: &str = "INVERTER";

pub const AC_POWER_KEY: &str = "APo_t1";
pub const DAILY_PRODUCTION_KEY: &str = "Etdy_ge1";
pub const CUMULATIVE_PRODUCTION_KEY: &str = "Et_ge0";

#[derive(Debug, Clone, PartialEq)]
pub struct StationPayload {
    pub id: i64,
    pub name: Option<String>,
    pub station_type: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub region_timezone: Option<String>,
    pub installed_capacity: Option<f64>,
    pub last_update_time: Option<i64>,
    pub station_image: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DevicePayload {
    pub device_id: i64,
    pub device_sn: String,
    pub device_type: Option<String>,
    pub connect_status: Option<i64>,
    pub collection_time: Option<i64>,
    pub raw: Value,
}

impl DevicePayload {
    pub fn is_inverter(&self) -> bool {
        self.device_type.as_deref() == Some(INVERTER_DEVICE_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentData {
    pub collection_time: Option<i64>,
    pub data_list: Vec<DataPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryMetrics {
    pub ac_power: f64,
    pub daily_production: f64,
    pub cumulative_production: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("payload must be a JSON object")]
    InvalidPayloadType,
    #[error("field {0} must be a JSON array")]
    NotAnArray(&'static str),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// One element of a vendor list. A malformed element is reported on its own
/// so its siblings still parse.
pub type ListEntry<T> = Result<T, PayloadError>;

pub fn parse_station_list(
    payload: &Value,
) -> Result<Vec<ListEntry<StationPayload>>, PayloadError> {
    let object = payload.as_object().ok_or(PayloadError::InvalidPayloadType)?;

    Ok(list_field(object, "stationList")?
        .iter()
        .map(parse_station)
        .collect())
}

pub fn parse_device_list(
    payload: &Value,
) -> Result<Vec<ListEntry<DevicePayload>>, PayloadError> {
    let object = payload.as_object().ok_or(PayloadError::InvalidPayloadType)?;

    Ok(list_field(object, "deviceListItems")?
        .iter()
        .map(parse_device)
        .collect())
}

pub fn parse_current_data(payload: &Value) -> Result<CurrentData, PayloadError> {
    let object = payload.as_object().ok_or(PayloadError::InvalidPayloadType)?;

    let data_list = list_field(object, "dataList")?
        .iter()
        .filter_map(Value::as_object)
        .map(|item| DataPoint {
            key: string_field(item, "key"),
            name: string_field(item, "name"),
            value: string_field(item, "value"),
            unit: string_field(item, "unit"),
        })
        .collect();

    Ok(CurrentData {
        collection_time: object.get("collectionTime").and_then(parse_i64),
        data_list,
    })
}

/// Scans the raw parameter list for the three fields the dashboard charts.
/// Absent or unparseable values read as zero.
pub fn derive_metrics(data_list: &[DataPoint]) -> TelemetryMetrics {
    TelemetryMetrics {
        ac_power: metric_value(data_list, AC_POWER_KEY),
        daily_production: metric_value(data_list, DAILY_PRODUCTION_KEY),
        cumulative_production: metric_value(data_list, CUMULATIVE_PRODUCTION_KEY),
    }
}

fn metric_value(data_list: &[DataPoint], key: &str) -> f64 {
    data_list
        .iter()
        .find(|point| point.key.as_deref() == Some(key))
        .and_then(|point| point.value.as_deref())
        .and_then(|value| parse_f64(&Value::String(value.to_string())))
        .unwrap_or(0.0)
}

fn parse_station(item: &Value) -> Result<StationPayload, PayloadError> {
    let object = item.as_object().ok_or(PayloadError::InvalidPayloadType)?;

    Ok(StationPayload {
        id: object
            .get("id")
            .and_then(parse_i64)
            .ok_or(PayloadError::MissingField("id"))?,
        name: string_field(object, "name"),
        station_type: string_field(object, "type"),
        location_lat: object.get("locationLat").and_then(parse_f64),
        location_lng: object.get("locationLng").and_then(parse_f64),
        location_address: string_field(object, "locationAddress"),
        region_timezone: string_field(object, "regionTimezone"),
        installed_capacity: object.get("installedCapacity").and_then(parse_f64),
        last_update_time: object.get("lastUpdateTime").and_then(parse_i64),
        station_image: string_field(object, "stationImage"),
        raw: item.clone(),
    })
}

fn parse_device(item: &Value) -> Result<DevicePayload, PayloadError> {
    let object = item.as_object().ok_or(PayloadError::InvalidPayloadType)?;

    Ok(DevicePayload {
        device_id: object
            .get("deviceId")
            .and_then(parse_i64)
            .ok_or(PayloadError::MissingField("deviceId"))?,
        device_sn: string_field(object, "deviceSn")
            .filter(|sn| !sn.trim().is_empty())
            .ok_or(PayloadError::MissingField("deviceSn"))?,
        device_type: string_field(object, "deviceType"),
        connect_status: object.get("connectStatus").and_then(parse_i64),
        collection_time: object.get("collectionTime").and_then(parse_i64),
        raw: item.clone(),
    })
}

fn list_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a [Value], PayloadError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(PayloadError::NotAnArray(field)),
    }
}

fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
