use serde::{Deserialize, Serialize};

/// One entry of a vendor telemetry `dataList`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub key: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    pub station_id: i64,
    pub name: Option<String>,
    pub station_type: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub region_timezone: Option<String>,
    pub installed_capacity: Option<f64>,
    pub last_update_time: Option<i64>,
    pub station_image: Option<String>,
    pub raw_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_id: i64,
    pub device_sn: String,
    pub station_id: Option<i64>,
    pub device_type: Option<String>,
    pub connect_status: Option<i64>,
    pub collection_time: Option<i64>,
    pub raw_json: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetryRecord {
    pub device_sn: String,
    pub device_id: Option<i64>,
    pub collection_time: i64,
    pub weather_snapshot_id: Option<i64>,
    pub data_list: Vec<DataPoint>,
    pub ac_power: f64,
    pub daily_production: f64,
    pub cumulative_production: f64,
    pub synced_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub id: i64,
    pub device_sn: String,
    pub device_id: Option<i64>,
    pub collection_time: i64,
    pub weather_snapshot_id: Option<i64>,
    pub data_list: Vec<DataPoint>,
    pub ac_power: f64,
    pub daily_production: f64,
    pub cumulative_production: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub temperature: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub clouds: Option<f64>,
    pub raw_json: String,
    pub captured_at: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub temperature: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub clouds: Option<f64>,
    pub raw_json: String,
    pub captured_at: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_stations: i64,
    pub total_inverters: i64,
    pub total_capacity: f64,
    pub latest_weather: Option<WeatherSnapshot>,
}
