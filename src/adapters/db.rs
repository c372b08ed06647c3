use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use crate::domain::models::{
    DashboardStats, DataPoint, DeviceRecord, NewTelemetryRecord, NewWeatherSnapshot,
    StationRecord, TelemetryRecord, WeatherSnapshot,
};
use crate::domain::vendor_payload::INVERTER_DEVICE_TYPE;

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS stations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    station_id INTEGER NOT NULL UNIQUE,
    name TEXT,
    station_type TEXT,
    location_lat REAL,
    location_lng REAL,
    location_address TEXT,
    region_timezone TEXT,
    installed_capacity REAL,
    last_update_time INTEGER,
    station_image TEXT,
    raw_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL UNIQUE,
    device_sn TEXT NOT NULL UNIQUE,
    station_id INTEGER,
    device_type TEXT,
    connect_status INTEGER,
    collection_time INTEGER,
    raw_json TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_devices_station_id
ON devices (station_id);

CREATE TABLE IF NOT EXISTS weather_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    ghi REAL NOT NULL DEFAULT 0,
    dni REAL NOT NULL DEFAULT 0,
    dhi REAL NOT NULL DEFAULT 0,
    temperature REAL,
    temperature_max REAL,
    temperature_min REAL,
    clouds REAL,
    raw_json TEXT NOT NULL,
    captured_at INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_weather_snapshots_captured_at_desc
ON weather_snapshots (captured_at DESC);

CREATE TABLE IF NOT EXISTS telemetry_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_sn TEXT NOT NULL,
    device_id INTEGER,
    collection_time INTEGER NOT NULL,
    weather_snapshot_id INTEGER REFERENCES weather_snapshots (id),
    data_list_json TEXT NOT NULL,
    ac_power REAL NOT NULL DEFAULT 0,
    daily_production REAL NOT NULL DEFAULT 0,
    cumulative_production REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (device_sn, collection_time)
);
"#,
)];

const STATION_COLUMNS: &str = "station_id, name, station_type, location_lat, location_lng, \
     location_address, region_timezone, installed_capacity, last_update_time, station_image, \
     raw_json, created_at, updated_at";

const DEVICE_COLUMNS: &str = "device_id, device_sn, station_id, device_type, connect_status, \
     collection_time, raw_json, created_at, updated_at";

const TELEMETRY_COLUMNS: &str = "id, device_sn, device_id, collection_time, weather_snapshot_id, \
     data_list_json, ac_power, daily_production, cumulative_production, created_at, updated_at";

const WEATHER_COLUMNS: &str = "id, latitude, longitude, ghi, dni, dhi, temperature, \
     temperature_max, temperature_min, clouds, raw_json, captured_at, created_at";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("stored data list is not valid JSON: {0}")]
    DataListJson(#[from] serde_json::Error),
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    let connection = Connection::open(path)?;
    connection.pragma_update(None, "foreign_keys", true)?;
    Ok(connection)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

pub fn upsert_station(connection: &Connection, station: &StationRecord) -> Result<(), DbError> {
    connection.execute(
        &format!(
            "INSERT INTO stations ({STATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT (station_id) DO UPDATE SET
                name = excluded.name,
                station_type = excluded.station_type,
                location_lat = excluded.location_lat,
                location_lng = excluded.location_lng,
                location_address = excluded.location_address,
                region_timezone = excluded.region_timezone,
                installed_capacity = excluded.installed_capacity,
                last_update_time = excluded.last_update_time,
                station_image = excluded.station_image,
                raw_json = excluded.raw_json,
                updated_at = excluded.updated_at"
        ),
        params![
            station.station_id,
            station.name,
            station.station_type,
            station.location_lat,
            station.location_lng,
            station.location_address,
            station.region_timezone,
            station.installed_capacity,
            station.last_update_time,
            station.station_image,
            station.raw_json,
            station.created_at,
            station.updated_at,
        ],
    )?;

    Ok(())
}

pub fn upsert_device(connection: &Connection, device: &DeviceRecord) -> Result<(), DbError> {
    connection.execute(
        &format!(
            "INSERT INTO devices ({DEVICE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (device_id) DO UPDATE SET
                device_sn = excluded.device_sn,
                station_id = excluded.station_id,
                device_type = excluded.device_type,
                connect_status = excluded.connect_status,
                collection_time = excluded.collection_time,
                raw_json = excluded.raw_json,
                updated_at = excluded.updated_at"
        ),
        params![
            device.device_id,
            device.device_sn,
            device.station_id,
            device.device_type,
            device.connect_status,
            device.collection_time,
            device.raw_json,
            device.created_at,
            device.updated_at,
        ],
    )?;

    Ok(())
}

/// Writes or overwrites the record keyed by (device_sn, collection_time)
/// and returns its row id.
pub fn upsert_telemetry(
    connection: &Connection,
    record: &NewTelemetryRecord,
) -> Result<i64, DbError> {
    let data_list_json = serde_json::to_string(&record.data_list)?;

    let id = connection.query_row(
        "INSERT INTO telemetry_records (
            device_sn, device_id, collection_time, weather_snapshot_id, data_list_json,
            ac_power, daily_production, cumulative_production, created_at, updated_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT (device_sn, collection_time) DO UPDATE SET
            device_id = excluded.device_id,
            weather_snapshot_id = excluded.weather_snapshot_id,
            data_list_json = excluded.data_list_json,
            ac_power = excluded.ac_power,
            daily_production = excluded.daily_production,
            cumulative_production = excluded.cumulative_production,
            updated_at = excluded.updated_at
         RETURNING id",
        params![
            record.device_sn,
            record.device_id,
            record.collection_time,
            record.weather_snapshot_id,
            data_list_json,
            record.ac_power,
            record.daily_production,
            record.cumulative_production,
            record.synced_at,
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub fn insert_weather_snapshot(
    connection: &Connection,
    snapshot: &NewWeatherSnapshot,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO weather_snapshots (
            latitude, longitude, ghi, dni, dhi, temperature, temperature_max, temperature_min,
            clouds, raw_json, captured_at, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            snapshot.latitude,
            snapshot.longitude,
            snapshot.ghi,
            snapshot.dni,
            snapshot.dhi,
            snapshot.temperature,
            snapshot.temperature_max,
            snapshot.temperature_min,
            snapshot.clouds,
            snapshot.raw_json,
            snapshot.captured_at,
            snapshot.created_at,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn latest_weather_snapshot_id(connection: &Connection) -> Result<Option<i64>, DbError> {
    let id = connection
        .query_row(
            "SELECT id FROM weather_snapshots
             ORDER BY captured_at DESC, id DESC
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id)
}

pub fn get_latest_weather_snapshot(
    connection: &Connection,
) -> Result<Option<WeatherSnapshot>, DbError> {
    let snapshot = connection
        .query_row(
            &format!(
                "SELECT {WEATHER_COLUMNS} FROM weather_snapshots
                 ORDER BY captured_at DESC, id DESC
                 LIMIT 1"
            ),
            [],
            weather_from_row,
        )
        .optional()?;

    Ok(snapshot)
}

pub fn get_weather_snapshot(
    connection: &Connection,
    id: i64,
) -> Result<Option<WeatherSnapshot>, DbError> {
    let snapshot = connection
        .query_row(
            &format!("SELECT {WEATHER_COLUMNS} FROM weather_snapshots WHERE id = ?1"),
            params![id],
            weather_from_row,
        )
        .optional()?;

    Ok(snapshot)
}

pub fn list_stations(connection: &Connection) -> Result<Vec<StationRecord>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {STATION_COLUMNS} FROM stations ORDER BY station_id ASC"
    ))?;

    let rows = statement.query_map([], station_from_row)?;
    let mut stations = Vec::new();
    for row in rows {
        stations.push(row?);
    }

    Ok(stations)
}

pub fn get_station(
    connection: &Connection,
    station_id: i64,
) -> Result<Option<StationRecord>, DbError> {
    let station = connection
        .query_row(
            &format!("SELECT {STATION_COLUMNS} FROM stations WHERE station_id = ?1"),
            params![station_id],
            station_from_row,
        )
        .optional()?;

    Ok(station)
}

pub fn list_devices(connection: &Connection) -> Result<Vec<DeviceRecord>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY station_id ASC, device_id ASC"
    ))?;

    let rows = statement.query_map([], device_from_row)?;
    let mut devices = Vec::new();
    for row in rows {
        devices.push(row?);
    }

    Ok(devices)
}

pub fn get_device_by_sn(
    connection: &Connection,
    device_sn: &str,
) -> Result<Option<DeviceRecord>, DbError> {
    let device = connection
        .query_row(
            &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_sn = ?1"),
            params![device_sn],
            device_from_row,
        )
        .optional()?;

    Ok(device)
}

pub fn get_latest_telemetry(
    connection: &Connection,
    device_sn: &str,
) -> Result<Option<TelemetryRecord>, DbError> {
    let row = connection
        .query_row(
            &format!(
                "SELECT {TELEMETRY_COLUMNS} FROM telemetry_records
                 WHERE device_sn = ?1
                 ORDER BY collection_time DESC
                 LIMIT 1"
            ),
            params![device_sn],
            telemetry_row,
        )
        .optional()?;

    row.map(TelemetryRow::into_record).transpose()
}

/// Records of one device with `from <= collection_time <= to`, oldest first.
pub fn list_telemetry_in_range(
    connection: &Connection,
    device_sn: &str,
    from_inclusive: i64,
    to_inclusive: i64,
) -> Result<Vec<TelemetryRecord>, DbError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {TELEMETRY_COLUMNS} FROM telemetry_records
         WHERE device_sn = ?1 AND collection_time >= ?2 AND collection_time <= ?3
         ORDER BY collection_time ASC"
    ))?;

    let rows = statement.query_map(
        params![device_sn, from_inclusive, to_inclusive],
        telemetry_row,
    )?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }

    Ok(records)
}

pub fn dashboard_stats(connection: &Connection) -> Result<DashboardStats, DbError> {
    let total_stations = count_rows(connection, "stations")?;
    let total_inverters: i64 = connection.query_row(
        "SELECT COUNT(*) FROM devices WHERE device_type = ?1",
        params![INVERTER_DEVICE_TYPE],
        |row| row.get(0),
    )?;
    let total_capacity: f64 = connection.query_row(
        "SELECT COALESCE(SUM(installed_capacity), 0.0) FROM stations",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        total_stations,
        total_inverters,
        total_capacity,
        latest_weather: get_latest_weather_snapshot(connection)?,
    })
}

pub fn count_rows(connection: &Connection, table: &'static str) -> Result<i64, DbError> {
    let count = connection.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<StationRecord> {
    Ok(StationRecord {
        station_id: row.get(0)?,
        name: row.get(1)?,
        station_type: row.get(2)?,
        location_lat: row.get(3)?,
        location_lng: row.get(4)?,
        location_address: row.get(5)?,
        region_timezone: row.get(6)?,
        installed_capacity: row.get(7)?,
        last_update_time: row.get(8)?,
        station_image: row.get(9)?,
        raw_json: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    Ok(DeviceRecord {
        device_id: row.get(0)?,
        device_sn: row.get(1)?,
        station_id: row.get(2)?,
        device_type: row.get(3)?,
        connect_status: row.get(4)?,
        collection_time: row.get(5)?,
        raw_json: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn weather_from_row(row: &Row<'_>) -> rusqlite::Result<WeatherSnapshot> {
    Ok(WeatherSnapshot {
        id: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        ghi: row.get(3)?,
        dni: row.get(4)?,
        dhi: row.get(5)?,
        temperature: row.get(6)?,
        temperature_max: row.get(7)?,
        temperature_min: row.get(8)?,
        clouds: row.get(9)?,
        raw_json: row.get(10)?,
        captured_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

struct TelemetryRow {
    id: i64,
    device_sn: String,
    device_id: Option<i64>,
    collection_time: i64,
    weather_snapshot_id: Option<i64>,
    data_list_json: String,
    ac_power: f64,
    daily_production: f64,
    cumulative_production: f64,
    created_at: String,
    updated_at: String,
}

impl TelemetryRow {
    fn into_record(self) -> Result<TelemetryRecord, DbError> {
        let data_list: Vec<DataPoint> = serde_json::from_str(&self.data_list_json)?;

        Ok(TelemetryRecord {
            id: self.id,
            device_sn: self.device_sn,
            device_id: self.device_id,
            collection_time: self.collection_time,
            weather_snapshot_id: self.weather_snapshot_id,
            data_list,
            ac_power: self.ac_power,
            daily_production: self.daily_production,
            cumulative_production: self.cumulative_production,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn telemetry_row(row: &Row<'_>) -> rusqlite::Result<TelemetryRow> {
    Ok(TelemetryRow {
        id: row.get(0)?,
        device_sn: row.get(1)?,
        device_id: row.get(2)?,
        collection_time: row.get(3)?,
        weather_snapshot_id: row.get(4)?,
        data_list_json: row.get(5)?,
        ac_power: row.get(6)?,
        daily_production: row.get(7)?,
        cumulative_production: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{
        LATEST_SCHEMA_VERSION, count_rows, dashboard_stats, get_device_by_sn,
        get_latest_telemetry, insert_weather_snapshot, latest_weather_snapshot_id,
        list_stations, list_telemetry_in_range, open_connection, run_migrations, schema_version,
        upsert_device, upsert_station, upsert_telemetry,
    };
    use crate::domain::models::{
        DataPoint, DeviceRecord, NewTelemetryRecord, NewWeatherSnapshot, StationRecord,
    };

    fn temp_db_path(name: &str) -> PathBuf {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join(name);
        std::mem::forget(dir);
        path
    }

    fn migrated_connection(name: &str) -> rusqlite::Connection {
        let db_path = temp_db_path(name);
        let mut connection =
            open_connection(db_path.to_string_lossy().as_ref()).expect("db connection should open");
        run_migrations(&mut connection).expect("migrations should succeed");
        connection
    }

    fn station(station_id: i64, name: &str, at: &str) -> StationRecord {
        StationRecord {
            station_id,
            name: Some(name.to_string()),
            station_type: None,
            location_lat: None,
            location_lng: None,
            location_address: None,
            region_timezone: None,
            installed_capacity: Some(10.0),
            last_update_time: None,
            station_image: None,
            raw_json: None,
            created_at: at.to_string(),
            updated_at: at.to_string(),
        }
    }

    fn device(device_id: i64, device_sn: &str, device_type: &str) -> DeviceRecord {
        DeviceRecord {
            device_id,
            device_sn: device_sn.to_string(),
            station_id: Some(1),
            device_type: Some(device_type.to_string()),
            connect_status: Some(1),
            collection_time: None,
            raw_json: None,
            created_at: "2026-10-19T10:00:00.000Z".to_string(),
            updated_at: "2026-10-19T10:00:00.000Z".to_string(),
        }
    }

    fn telemetry(collection_time: i64, ac_power: f64, weather: Option<i64>) -> NewTelemetryRecord {
        NewTelemetryRecord {
            device_sn: "X1".to_string(),
            device_id: Some(10),
            collection_time,
            weather_snapshot_id: weather,
            data_list: vec![DataPoint {
                key: Some("APo_t1".to_string()),
                name: Some("Total AC Output Power".to_string()),
                value: Some(ac_power.to_string()),
                unit: Some("W".to_string()),
            }],
            ac_power,
            daily_production: 0.0,
            cumulative_production: 0.0,
            synced_at: "2026-10-19T10:00:00.000Z".to_string(),
        }
    }

    fn snapshot(captured_at: i64, ghi: f64) -> NewWeatherSnapshot {
        NewWeatherSnapshot {
            latitude: 40.7128,
            longitude: -74.006,
            ghi,
            dni: 0.0,
            dhi: 0.0,
            temperature: None,
            temperature_max: None,
            temperature_min: None,
            clouds: None,
            raw_json: "{}".to_string(),
            captured_at,
            created_at: "2026-10-19T10:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn migrates_fresh_database_to_latest_version() {
        let connection = migrated_connection("fresh.sqlite");

        let version = schema_version(&connection).expect("schema version should be queryable");
        assert_eq!(version, LATEST_SCHEMA_VERSION);

        for table in ["stations", "devices", "telemetry_records", "weather_snapshots"] {
            let table_exists: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .expect("table check should work");
            assert_eq!(table_exists, 1, "{table} should exist");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let db_path = temp_db_path("idempotent.sqlite");
        let mut connection =
            open_connection(db_path.to_string_lossy().as_ref()).expect("db connection should open");

        run_migrations(&mut connection).expect("first migration run should succeed");
        run_migrations(&mut connection).expect("second migration run should succeed");

        let version = schema_version(&connection).expect("schema version should be queryable");
        assert_eq!(version, LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn station_upsert_keeps_one_row_with_second_payload() {
        let connection = migrated_connection("station-upsert.sqlite");

        upsert_station(&connection, &station(1, "first", "2026-10-19T10:00:00.000Z"))
            .expect("first upsert should succeed");
        upsert_station(&connection, &station(1, "second", "2026-10-19T10:05:00.000Z"))
            .expect("second upsert should succeed");

        let stations = list_stations(&connection).expect("query should succeed");
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name.as_deref(), Some("second"));
        assert_eq!(stations[0].created_at, "2026-10-19T10:00:00.000Z");
        assert_eq!(stations[0].updated_at, "2026-10-19T10:05:00.000Z");
    }

    #[test]
    fn device_upsert_is_keyed_by_vendor_id() {
        let connection = migrated_connection("device-upsert.sqlite");

        upsert_device(&connection, &device(10, "X1", "INVERTER")).expect("insert should work");
        upsert_device(&connection, &device(10, "X1", "INVERTER")).expect("repeat should work");

        assert_eq!(count_rows(&connection, "devices").expect("count"), 1);
        let stored = get_device_by_sn(&connection, "X1")
            .expect("query should succeed")
            .expect("device should exist");
        assert_eq!(stored.device_id, 10);
    }

    #[test]
    fn device_upsert_keeps_one_row_with_second_payload() {
        let connection = migrated_connection("device-upsert-overwrite.sqlite");

        upsert_device(&connection, &device(10, "X1", "INVERTER")).expect("insert should work");
        let second = DeviceRecord {
            station_id: Some(2),
            connect_status: Some(0),
            collection_time: Some(1_700_000_000),
            updated_at: "2026-10-19T10:05:00.000Z".to_string(),
            ..device(10, "X1", "COLLECTOR")
        };
        upsert_device(&connection, &second).expect("overwrite should work");

        assert_eq!(count_rows(&connection, "devices").expect("count"), 1);
        let stored = get_device_by_sn(&connection, "X1")
            .expect("query should succeed")
            .expect("device should exist");
        assert_eq!(stored.device_type.as_deref(), Some("COLLECTOR"));
        assert_eq!(stored.station_id, Some(2));
        assert_eq!(stored.connect_status, Some(0));
        assert_eq!(stored.collection_time, Some(1_700_000_000));
        assert_eq!(stored.created_at, "2026-10-19T10:00:00.000Z");
        assert_eq!(stored.updated_at, "2026-10-19T10:05:00.000Z");
    }

    #[test]
    fn device_serial_number_stays_unique_across_vendor_ids() {
        let connection = migrated_connection("device-sn-unique.sqlite");

        upsert_device(&connection, &device(10, "X1", "INVERTER")).expect("insert should work");
        let result = upsert_device(&connection, &device(11, "X1", "INVERTER"));

        assert!(result.is_err());
    }

    #[test]
    fn telemetry_upsert_deduplicates_on_serial_and_collection_time() {
        let connection = migrated_connection("telemetry-upsert.sqlite");

        let first = upsert_telemetry(&connection, &telemetry(1_700_000_000, 5.2, None))
            .expect("first upsert should succeed");
        let second = upsert_telemetry(&connection, &telemetry(1_700_000_000, 6.1, None))
            .expect("second upsert should succeed");

        assert_eq!(first, second);
        assert_eq!(count_rows(&connection, "telemetry_records").expect("count"), 1);

        let latest = get_latest_telemetry(&connection, "X1")
            .expect("query should succeed")
            .expect("record should exist");
        assert_eq!(latest.ac_power, 6.1);
        assert_eq!(latest.data_list[0].key.as_deref(), Some("APo_t1"));
    }

    #[test]
    fn latest_snapshot_id_follows_capture_time_not_insert_order() {
        let connection = migrated_connection("weather-latest.sqlite");

        assert_eq!(
            latest_weather_snapshot_id(&connection).expect("query should succeed"),
            None
        );

        let newer = insert_weather_snapshot(&connection, &snapshot(1_700_000_600, 500.0))
            .expect("insert should succeed");
        insert_weather_snapshot(&connection, &snapshot(1_700_000_000, 300.0))
            .expect("backfill insert should succeed");

        assert_eq!(
            latest_weather_snapshot_id(&connection).expect("query should succeed"),
            Some(newer)
        );
    }

    #[test]
    fn snapshots_are_never_deduplicated() {
        let connection = migrated_connection("weather-append.sqlite");

        insert_weather_snapshot(&connection, &snapshot(1_700_000_000, 1.0)).expect("insert");
        insert_weather_snapshot(&connection, &snapshot(1_700_000_000, 1.0)).expect("insert");

        assert_eq!(count_rows(&connection, "weather_snapshots").expect("count"), 2);
    }

    #[test]
    fn lists_telemetry_in_inclusive_range_oldest_first() {
        let connection = migrated_connection("telemetry-range.sqlite");

        for (time, power) in [(100, 1.0), (200, 2.0), (300, 3.0), (400, 4.0)] {
            upsert_telemetry(&connection, &telemetry(time, power, None)).expect("insert");
        }

        let records = list_telemetry_in_range(&connection, "X1", 200, 300).expect("query");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].collection_time, 200);
        assert_eq!(records[1].collection_time, 300);
    }

    #[test]
    fn computes_dashboard_stats() {
        let connection = migrated_connection("dashboard-stats.sqlite");

        upsert_station(&connection, &station(1, "a", "t")).expect("insert");
        upsert_station(&connection, &station(2, "b", "t")).expect("insert");
        upsert_device(&connection, &device(10, "X1", "INVERTER")).expect("insert");
        upsert_device(&connection, &device(11, "L1", "COLLECTOR")).expect("insert");
        insert_weather_snapshot(&connection, &snapshot(1_700_000_000, 640.0)).expect("insert");

        let stats = dashboard_stats(&connection).expect("stats should compute");

        assert_eq!(stats.total_stations, 2);
        assert_eq!(stats.total_inverters, 1);
        assert_eq!(stats.total_capacity, 20.0);
        assert_eq!(stats.latest_weather.map(|weather| weather.ghi), Some(640.0));
    }
}
