use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::models::{
    DashboardStats, DeviceRecord, NewTelemetryRecord, NewWeatherSnapshot, StationRecord,
    TelemetryRecord, WeatherSnapshot,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    Database(#[from] DbError),
}

/// Idempotent writes keyed by vendor identity.
pub trait EntityUpsertStore {
    fn upsert_station(&self, station: &StationRecord) -> Result<(), ServiceError>;
    fn upsert_device(&self, device: &DeviceRecord) -> Result<(), ServiceError>;
    fn upsert_telemetry(&self, record: &NewTelemetryRecord) -> Result<i64, ServiceError>;
}

/// Append-only weather history.
pub trait WeatherSnapshotStore {
    fn insert_snapshot(&self, snapshot: &NewWeatherSnapshot) -> Result<i64, ServiceError>;
    fn latest_id(&self) -> Result<Option<i64>, ServiceError>;
}

pub trait SolarQueryHandler {
    fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError>;
    fn list_stations(&self) -> Result<Vec<StationRecord>, ServiceError>;
    fn get_station(&self, station_id: i64) -> Result<Option<StationRecord>, ServiceError>;
    fn list_devices(&self) -> Result<Vec<DeviceRecord>, ServiceError>;
    fn get_device_by_sn(&self, device_sn: &str) -> Result<Option<DeviceRecord>, ServiceError>;
    fn get_latest_telemetry(
        &self,
        device_sn: &str,
    ) -> Result<Option<TelemetryRecord>, ServiceError>;
    fn list_telemetry_in_range(
        &self,
        device_sn: &str,
        from_inclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<TelemetryRecord>, ServiceError>;
    fn get_weather_snapshot(&self, id: i64) -> Result<Option<WeatherSnapshot>, ServiceError>;
    fn get_schema_version(&self) -> Result<u32, ServiceError>;
    fn count_rows(&self, table: &'static str) -> Result<i64, ServiceError>;
}

#[derive(Clone)]
pub struct SqliteSyncStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSyncStore {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, ServiceError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| ServiceError::DbLockPoisoned)?;
        op(&connection).map_err(ServiceError::from)
    }
}

impl EntityUpsertStore for SqliteSyncStore {
    fn upsert_station(&self, station: &StationRecord) -> Result<(), ServiceError> {
        self.with_connection(|connection| db::upsert_station(connection, station))
    }

    fn upsert_device(&self, device: &DeviceRecord) -> Result<(), ServiceError> {
        self.with_connection(|connection| db::upsert_device(connection, device))
    }

    fn upsert_telemetry(&self, record: &NewTelemetryRecord) -> Result<i64, ServiceError> {
        self.with_connection(|connection| db::upsert_telemetry(connection, record))
    }
}

impl WeatherSnapshotStore for SqliteSyncStore {
    fn insert_snapshot(&self, snapshot: &NewWeatherSnapshot) -> Result<i64, ServiceError> {
        self.with_connection(|connection| db::insert_weather_snapshot(connection, snapshot))
    }

    fn latest_id(&self) -> Result<Option<i64>, ServiceError> {
        self.with_connection(db::latest_weather_snapshot_id)
    }
}

impl SolarQueryHandler for SqliteSyncStore {
    fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        self.with_connection(db::dashboard_stats)
    }

    fn list_stations(&self) -> Result<Vec<StationRecord>, ServiceError> {
        self.with_connection(db::list_stations)
    }

    fn get_station(&self, station_id: i64) -> Result<Option<StationRecord>, ServiceError> {
        self.with_connection(|connection| db::get_station(connection, station_id))
    }

    fn list_devices(&self) -> Result<Vec<DeviceRecord>, ServiceError> {
        self.with_connection(db::list_devices)
    }

    fn get_device_by_sn(&self, device_sn: &str) -> Result<Option<DeviceRecord>, ServiceError> {
        self.with_connection(|connection| db::get_device_by_sn(connection, device_sn))
    }

    fn get_latest_telemetry(
        &self,
        device_sn: &str,
    ) -> Result<Option<TelemetryRecord>, ServiceError> {
        self.with_connection(|connection| db::get_latest_telemetry(connection, device_sn))
    }

    fn list_telemetry_in_range(
        &self,
        device_sn: &str,
        from_inclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<TelemetryRecord>, ServiceError> {
        self.with_connection(|connection| {
            db::list_telemetry_in_range(connection, device_sn, from_inclusive, to_inclusive)
        })
    }

    fn get_weather_snapshot(&self, id: i64) -> Result<Option<WeatherSnapshot>, ServiceError> {
        self.with_connection(|connection| db::get_weather_snapshot(connection, id))
    }

    fn get_schema_version(&self) -> Result<u32, ServiceError> {
        self.with_connection(db::schema_version)
    }

    fn count_rows(&self, table: &'static str) -> Result<i64, ServiceError> {
        self.with_connection(|connection| db::count_rows(connection, table))
    }
}
