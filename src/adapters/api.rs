use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, get, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::app::runtime::timestamp_to_iso8601;
use crate::app::services::{ServiceError, SolarQueryHandler, SqliteSyncStore};
use crate::domain::credential::TimestampMs;
use crate::domain::models::{DataPoint, DeviceRecord, StationRecord, TelemetryRecord};

#[derive(Clone)]
pub struct ApiState {
    pub queries: SqliteSyncStore,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsResponse {
    pub total_stations: i64,
    pub total_inverters: i64,
    pub total_capacity: f64,
    pub current_ghi: f64,
    pub current_temperature: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationResponse {
    pub station_id: i64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub station_type: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub region_timezone: Option<String>,
    pub installed_capacity: Option<f64>,
    pub last_update_time: Option<i64>,
    pub station_image: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub device_id: i64,
    pub device_sn: String,
    pub device_type: Option<String>,
    pub connect_status: Option<i64>,
    pub collection_time: Option<i64>,
    pub station: Option<StationResponse>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IrradianceResponse {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    pub collection_time: i64,
    pub ac_power: f64,
    pub daily_production: f64,
    pub cumulative_production: f64,
    pub data_list: Vec<DataPoint>,
    pub weather: Option<IrradianceResponse>,
    pub synced_at: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLatestResponse {
    pub device: DeviceResponse,
    pub latest_telemetry: Option<TelemetryResponse>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportWeather {
    pub ghi: f64,
    pub dni: f64,
}

impl ReportWeather {
    const MISSING: Self = Self { ghi: 0.0, dni: 0.0 };
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPoint {
    pub timestamp: i64,
    pub time: String,
    pub ac_power: f64,
    pub daily_production: f64,
    pub cumulative_production: f64,
    pub parameters: Vec<DataPoint>,
    pub weather: ReportWeather,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub device_sn: String,
    pub range: ReportRange,
    pub count: usize,
    pub data: Vec<ReportPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub device_sn: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsDbResponse {
    pub schema_version: u32,
    pub stations_count: i64,
    pub devices_count: i64,
    pub telemetry_records_count: i64,
    pub weather_snapshots_count: i64,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health)
            .service(get_dashboard_stats_endpoint)
            .service(list_stations_endpoint)
            .service(list_devices_endpoint)
            .service(get_device_latest_endpoint)
            .service(get_report_endpoint)
            .service(get_db_diagnostics_endpoint),
    );
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/dashboard-stats")]
async fn get_dashboard_stats_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.queries.dashboard_stats() {
        Ok(stats) => {
            let weather = stats.latest_weather.as_ref();
            HttpResponse::Ok().json(DashboardStatsResponse {
                total_stations: stats.total_stations,
                total_inverters: stats.total_inverters,
                total_capacity: stats.total_capacity,
                current_ghi: weather.map_or(0.0, |snapshot| snapshot.ghi),
                current_temperature: weather
                    .and_then(|snapshot| snapshot.temperature)
                    .unwrap_or(0.0),
            })
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/stations")]
async fn list_stations_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.queries.list_stations() {
        Ok(stations) => {
            let mapped: Vec<StationResponse> =
                stations.into_iter().map(station_response).collect();
            HttpResponse::Ok().json(mapped)
        }
        Err(error) => service_error_response(error),
    }
}

#[get("/devices")]
async fn list_devices_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let devices = match state.queries.list_devices() {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };
    let stations: HashMap<i64, StationRecord> = match state.queries.list_stations() {
        Ok(value) => value
            .into_iter()
            .map(|station| (station.station_id, station))
            .collect(),
        Err(error) => return service_error_response(error),
    };

    let mapped: Vec<DeviceResponse> = devices
        .into_iter()
        .map(|device| {
            let station = device
                .station_id
                .and_then(|id| stations.get(&id).cloned())
                .map(station_response);
            device_response(device, station)
        })
        .collect();

    HttpResponse::Ok().json(mapped)
}

#[get("/device/{device_sn}/latest")]
async fn get_device_latest_endpoint(
    state: web::Data<ApiState>,
    path: web::Path<String>,
) -> impl Responder {
    let device_sn = path.into_inner();

    let device = match state.queries.get_device_by_sn(&device_sn) {
        Ok(Some(device)) => device,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "device not found"
            }));
        }
        Err(error) => return service_error_response(error),
    };
    let station = match device.station_id {
        Some(station_id) => match state.queries.get_station(station_id) {
            Ok(value) => value.map(station_response),
            Err(error) => return service_error_response(error),
        },
        None => None,
    };
    let latest = match state.queries.get_latest_telemetry(&device_sn) {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };

    let latest_telemetry = match latest {
        Some(record) => {
            let weather = match record.weather_snapshot_id {
                Some(id) => match state.queries.get_weather_snapshot(id) {
                    Ok(snapshot) => snapshot.map(|snapshot| IrradianceResponse {
                        ghi: snapshot.ghi,
                        dni: snapshot.dni,
                        dhi: snapshot.dhi,
                    }),
                    Err(error) => return service_error_response(error),
                },
                None => None,
            };
            Some(telemetry_response(record, weather))
        }
        None => None,
    };

    HttpResponse::Ok().json(DeviceLatestResponse {
        device: device_response(device, station),
        latest_telemetry,
    })
}

#[get("/report")]
async fn get_report_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ReportQuery>,
) -> impl Responder {
    let query = query.into_inner();
    let (Some(device_sn), Some(from_date), Some(to_date)) =
        (query.device_sn, query.from_date, query.to_date)
    else {
        return bad_request("deviceSn, fromDate and toDate are required");
    };
    let Some((from, to)) = parse_report_range(&from_date, &to_date) else {
        return bad_request("fromDate and toDate must be formatted as YYYY-MM-DD");
    };

    let records = match state.queries.list_telemetry_in_range(&device_sn, from, to) {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };

    let mut weather_cache: HashMap<i64, ReportWeather> = HashMap::new();
    let mut points = Vec::with_capacity(records.len());
    for record in records {
        let weather = match record.weather_snapshot_id {
            None => ReportWeather::MISSING,
            Some(id) => match weather_cache.get(&id) {
                Some(cached) => *cached,
                None => {
                    let resolved = match state.queries.get_weather_snapshot(id) {
                        Ok(snapshot) => snapshot.map_or(ReportWeather::MISSING, |snapshot| {
                            ReportWeather {
                                ghi: snapshot.ghi,
                                dni: snapshot.dni,
                            }
                        }),
                        Err(error) => return service_error_response(error),
                    };
                    weather_cache.insert(id, resolved);
                    resolved
                }
            },
        };

        points.push(ReportPoint {
            timestamp: record.collection_time,
            time: timestamp_to_iso8601(TimestampMs(record.collection_time.saturating_mul(1000))),
            ac_power: record.ac_power,
            daily_production: record.daily_production,
            cumulative_production: record.cumulative_production,
            parameters: record.data_list,
            weather,
        });
    }

    HttpResponse::Ok().json(ReportResponse {
        device_sn,
        range: ReportRange {
            from: from_date,
            to: to_date,
        },
        count: points.len(),
        data: points,
    })
}

#[get("/diagnostics/db")]
async fn get_db_diagnostics_endpoint(state: web::Data<ApiState>) -> impl Responder {
    let schema_version = match state.queries.get_schema_version() {
        Ok(value) => value,
        Err(error) => return service_error_response(error),
    };

    let mut counts = [0_i64; 4];
    for (slot, table) in counts.iter_mut().zip([
        "stations",
        "devices",
        "telemetry_records",
        "weather_snapshots",
    ]) {
        *slot = match state.queries.count_rows(table) {
            Ok(value) => value,
            Err(error) => return service_error_response(error),
        };
    }

    HttpResponse::Ok().json(DiagnosticsDbResponse {
        schema_version,
        stations_count: counts[0],
        devices_count: counts[1],
        telemetry_records_count: counts[2],
        weather_snapshots_count: counts[3],
    })
}

/// Whole UTC days: `from 00:00:00 ..= to 23:59:59`, as epoch seconds.
fn parse_report_range(from_date: &str, to_date: &str) -> Option<(i64, i64)> {
    let from = NaiveDate::parse_from_str(from_date.trim(), "%Y-%m-%d").ok()?;
    let to = NaiveDate::parse_from_str(to_date.trim(), "%Y-%m-%d").ok()?;
    let start_of_day = NaiveTime::from_hms_opt(0, 0, 0)?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)?;

    Some((
        from.and_time(start_of_day).and_utc().timestamp(),
        to.and_time(end_of_day).and_utc().timestamp(),
    ))
}

fn station_response(station: StationRecord) -> StationResponse {
    StationResponse {
        station_id: station.station_id,
        name: station.name,
        station_type: station.station_type,
        location_lat: station.location_lat,
        location_lng: station.location_lng,
        location_address: station.location_address,
        region_timezone: station.region_timezone,
        installed_capacity: station.installed_capacity,
        last_update_time: station.last_update_time,
        station_image: station.station_image,
    }
}

fn device_response(device: DeviceRecord, station: Option<StationResponse>) -> DeviceResponse {
    DeviceResponse {
        device_id: device.device_id,
        device_sn: device.device_sn,
        device_type: device.device_type,
        connect_status: device.connect_status,
        collection_time: device.collection_time,
        station,
    }
}

fn telemetry_response(
    record: TelemetryRecord,
    weather: Option<IrradianceResponse>,
) -> TelemetryResponse {
    TelemetryResponse {
        collection_time: record.collection_time,
        ac_power: record.ac_power,
        daily_production: record.daily_production,
        cumulative_production: record.cumulative_production,
        data_list: record.data_list,
        weather,
        synced_at: record.updated_at,
    }
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": message }))
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match error {
        ServiceError::DbLockPoisoned => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "database lock poisoned"
            }))
        }
        ServiceError::Database(error) => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("database query failed: {error}")
            }))
        }
    }
}
