use crate::adapters::weather_http::WeatherProvider;
use crate::app::job_lock::JobLock;
use crate::app::runtime::timestamp_to_iso8601;
use crate::app::services::WeatherSnapshotStore;
use crate::domain::credential::Clock;
use crate::domain::weather::{Location, normalize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherSyncStatus {
    Stored { snapshot_id: i64 },
    Failed(String),
    SkippedOverlap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSyncReport {
    /// Epoch seconds stamped on the snapshot.
    pub captured_at: i64,
    pub status: WeatherSyncStatus,
}

pub struct WeatherSyncJob<P, W, Cl> {
    provider: P,
    store: W,
    clock: Cl,
    location: Location,
    lock: JobLock,
}

impl<P, W, Cl> WeatherSyncJob<P, W, Cl>
where
    P: WeatherProvider,
    W: WeatherSnapshotStore,
    Cl: Clock,
{
    pub fn new(provider: P, store: W, clock: Cl, location: Location) -> Self {
        Self {
            provider,
            store,
            clock,
            location,
            lock: JobLock::new(),
        }
    }

    pub fn fetch_and_store(&self) -> WeatherSyncReport {
        let now = self.clock.now();
        let captured_at = now.as_epoch_seconds();

        let Some(_guard) = self.lock.try_acquire() else {
            tracing::warn!("weather sync still running, skipping trigger");
            return WeatherSyncReport {
                captured_at,
                status: WeatherSyncStatus::SkippedOverlap,
            };
        };

        let status = match self.store_snapshot(captured_at, &timestamp_to_iso8601(now)) {
            Ok(snapshot_id) => {
                tracing::info!(
                    snapshot_id,
                    captured_at,
                    latitude = self.location.latitude,
                    longitude = self.location.longitude,
                    "weather snapshot stored"
                );
                WeatherSyncStatus::Stored { snapshot_id }
            }
            Err(reason) => {
                tracing::warn!(error = %reason, "weather sync failed");
                WeatherSyncStatus::Failed(reason)
            }
        };

        WeatherSyncReport {
            captured_at,
            status,
        }
    }

    fn store_snapshot(&self, captured_at: i64, created_at: &str) -> Result<i64, String> {
        let payload = self
            .provider
            .fetch(self.location)
            .map_err(|error| error.to_string())?;
        let snapshot = normalize(&payload, self.location, captured_at, created_at)
            .map_err(|error| error.to_string())?;

        self.store
            .insert_snapshot(&snapshot)
            .map_err(|error| error.to_string())
    }
}
