use thiserror::Error;
use uuid::Uuid;

use crate::app::client::{VendorApi, VendorError};
use crate::app::job_lock::JobLock;
use crate::app::runtime::timestamp_to_iso8601;
use crate::app::services::{EntityUpsertStore, ServiceError, WeatherSnapshotStore};
use crate::domain::credential::Clock;
use crate::domain::models::{DeviceRecord, NewTelemetryRecord, StationRecord};
use crate::domain::sync_summary::{EntityOutcome, RunStatus, SyncSummary};
use crate::domain::vendor_payload::{DevicePayload, ListEntry, StationPayload, derive_metrics};

#[derive(Debug, Error)]
enum TelemetryError {
    #[error("failed to fetch current data: {0}")]
    Fetch(#[source] VendorError),
    #[error("current data has parameters but no collectionTime")]
    MissingCollectionTime,
    #[error("failed to resolve latest weather snapshot: {0}")]
    LatestWeather(#[source] ServiceError),
    #[error("failed to store telemetry: {0}")]
    Store(#[source] ServiceError),
}

/// Runs the stations -> devices -> telemetry cascade against the vendor
/// cloud. Every failure below the station list is absorbed per entity.
pub struct SyncOrchestrator<V, S, W, Cl> {
    vendor: V,
    entities: S,
    weather: W,
    clock: Cl,
    lock: JobLock,
}

impl<V, S, W, Cl> SyncOrchestrator<V, S, W, Cl>
where
    V: VendorApi,
    S: EntityUpsertStore,
    W: WeatherSnapshotStore,
    Cl: Clock,
{
    pub fn new(vendor: V, entities: S, weather: W, clock: Cl) -> Self {
        Self {
            vendor,
            entities,
            weather,
            clock,
            lock: JobLock::new(),
        }
    }

    pub fn run_full_sync(&self) -> SyncSummary {
        let run_id = Uuid::new_v4();
        let mut summary = SyncSummary::new(run_id, self.now_iso());

        let Some(_guard) = self.lock.try_acquire() else {
            tracing::warn!(%run_id, "full sync still running, skipping trigger");
            summary.status = RunStatus::SkippedOverlap;
            return summary;
        };

        tracing::info!(%run_id, "full sync started");

        match self.vendor.list_stations() {
            Ok(stations) => {
                for (index, entry) in stations.iter().enumerate() {
                    match entry {
                        Ok(station) => self.sync_station(run_id, station, &mut summary),
                        Err(error) => {
                            tracing::warn!(
                                %run_id,
                                index,
                                error = %error,
                                "skipping malformed station entry"
                            );
                            summary.stations.record(EntityOutcome::Failed);
                        }
                    }
                }
            }
            Err(error) => {
                tracing::error!(%run_id, error = %error, "failed to fetch station list, aborting run");
                summary.status = RunStatus::Aborted(error.to_string());
            }
        }

        summary.finished_at = self.now_iso();
        tracing::info!(
            %run_id,
            stations_processed = summary.stations.processed,
            stations_failed = summary.stations.failed,
            devices_processed = summary.devices.processed,
            devices_failed = summary.devices.failed,
            device_list_failures = summary.device_list_failures,
            telemetry_processed = summary.telemetry.processed,
            telemetry_skipped = summary.telemetry.skipped,
            telemetry_failed = summary.telemetry.failed,
            "full sync finished"
        );

        summary
    }

    fn sync_station(&self, run_id: Uuid, station: &StationPayload, summary: &mut SyncSummary) {
        let now = self.now_iso();
        let outcome = match self.entities.upsert_station(&station_record(station, &now)) {
            Ok(()) => EntityOutcome::Processed,
            Err(error) => {
                tracing::warn!(%run_id, station_id = station.id, error = %error, "station upsert failed");
                EntityOutcome::Failed
            }
        };
        summary.stations.record(outcome);

        let devices = match self.vendor.list_devices(station.id) {
            Ok(devices) => devices,
            Err(error) => {
                tracing::warn!(
                    %run_id,
                    station_id = station.id,
                    error = %error,
                    "failed to fetch device list"
                );
                summary.device_list_failures += 1;
                return;
            }
        };

        for (index, entry) in devices.iter().enumerate() {
            let device = match entry {
                Ok(device) => device,
                Err(error) => {
                    tracing::warn!(
                        %run_id,
                        station_id = station.id,
                        index,
                        error = %error,
                        "skipping malformed device entry"
                    );
                    summary.devices.record(EntityOutcome::Failed);
                    continue;
                }
            };
            let now = self.now_iso();
            let outcome = match self
                .entities
                .upsert_device(&device_record(device, station.id, &now))
            {
                Ok(()) => EntityOutcome::Processed,
                Err(error) => {
                    tracing::warn!(
                        %run_id,
                        device_sn = %device.device_sn,
                        error = %error,
                        "device upsert failed"
                    );
                    EntityOutcome::Failed
                }
            };
            summary.devices.record(outcome);
            summary.telemetry.record(self.sync_telemetry(run_id, device));
        }
    }

    fn sync_telemetry(&self, run_id: Uuid, device: &DevicePayload) -> EntityOutcome {
        if !device.is_inverter() {
            tracing::debug!(
                %run_id,
                device_sn = %device.device_sn,
                device_type = device.device_type.as_deref().unwrap_or("unknown"),
                "not an inverter, telemetry skipped"
            );
            return EntityOutcome::Skipped;
        }

        match self.store_telemetry(device) {
            Ok(Some(record_id)) => {
                tracing::debug!(%run_id, device_sn = %device.device_sn, record_id, "telemetry stored");
                EntityOutcome::Processed
            }
            Ok(None) => {
                tracing::info!(%run_id, device_sn = %device.device_sn, "no telemetry data available");
                EntityOutcome::Skipped
            }
            Err(error) => {
                tracing::warn!(%run_id, device_sn = %device.device_sn, error = %error, "telemetry sync failed");
                EntityOutcome::Failed
            }
        }
    }

    fn store_telemetry(&self, device: &DevicePayload) -> Result<Option<i64>, TelemetryError> {
        let data = self
            .vendor
            .current_data(&device.device_sn)
            .map_err(TelemetryError::Fetch)?;

        if data.data_list.is_empty() {
            return Ok(None);
        }

        let collection_time = data
            .collection_time
            .ok_or(TelemetryError::MissingCollectionTime)?;
        let metrics = derive_metrics(&data.data_list);
        let weather_snapshot_id = self.weather.latest_id().map_err(TelemetryError::LatestWeather)?;

        let record = NewTelemetryRecord {
            device_sn: device.device_sn.clone(),
            device_id: Some(device.device_id),
            collection_time,
            weather_snapshot_id,
            data_list: data.data_list,
            ac_power: metrics.ac_power,
            daily_production: metrics.daily_production,
            cumulative_production: metrics.cumulative_production,
            synced_at: self.now_iso(),
        };

        self.entities
            .upsert_telemetry(&record)
            .map(Some)
            .map_err(TelemetryError::Store)
    }

    fn now_iso(&self) -> String {
        timestamp_to_iso8601(self.clock.now())
    }
}

fn station_record(station: &StationPayload, now: &str) -> StationRecord {
    StationRecord {
        station_id: station.id,
        name: station.name.clone(),
        station_type: station.station_type.clone(),
        location_lat: station.location_lat,
        location_lng: station.location_lng,
        location_address: station.location_address.clone(),
        region_timezone: station.region_timezone.clone(),
        installed_capacity: station.installed_capacity,
        last_update_time: station.last_update_time,
        station_image: station.station_image.clone(),
        raw_json: Some(station.raw.to_string()),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

fn device_record(device: &DevicePayload, station_id: i64, now: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: device.device_id,
        device_sn: device.device_sn.clone(),
        station_id: Some(station_id),
        device_type: device.device_type.clone(),
        connect_status: device.connect_status,
        collection_time: device.collection_time,
        raw_json: Some(device.raw.to_string()),
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}
