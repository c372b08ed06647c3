use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::{SecondsFormat, Utc};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::vendor_http::ReqwestVendorTransport;
use crate::adapters::weather_http::OpenMeteoProvider;
use crate::app::client::AuthenticatedClient;
use crate::app::config::{AppConfig, VendorConfig};
use crate::app::error::AppError;
use crate::app::orchestrator::SyncOrchestrator;
use crate::app::services::SqliteSyncStore;
use crate::app::token::ServiceCredentials;
use crate::app::weather_job::WeatherSyncJob;
use crate::domain::credential::{Clock, TimestampMs};

const STOP_CHECK_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimestampMs {
        TimestampMs(Utc::now().timestamp_millis())
    }
}

pub type LiveOrchestrator = SyncOrchestrator<
    AuthenticatedClient<ReqwestVendorTransport, SystemClock>,
    SqliteSyncStore,
    SqliteSyncStore,
    SystemClock,
>;

pub type LiveWeatherJob = WeatherSyncJob<OpenMeteoProvider, SqliteSyncStore, SystemClock>;

pub fn open_store(db_path: &str) -> Result<SqliteSyncStore, AppError> {
    let mut connection = open_connection(db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;
    Ok(SqliteSyncStore::new(Arc::new(Mutex::new(connection))))
}

pub fn build_orchestrator(
    vendor: &VendorConfig,
    store: &SqliteSyncStore,
) -> Result<LiveOrchestrator, AppError> {
    let transport = ReqwestVendorTransport::new(&vendor.base_url).map_err(AppError::runtime)?;
    let client = AuthenticatedClient::new(
        transport,
        SystemClock,
        ServiceCredentials {
            app_id: vendor.app_id.clone(),
            app_secret: vendor.app_secret.clone(),
            email: vendor.email.clone(),
            password: vendor.password.clone(),
        },
    );

    Ok(SyncOrchestrator::new(
        client,
        store.clone(),
        store.clone(),
        SystemClock,
    ))
}

pub fn build_weather_job(
    config: &AppConfig,
    store: &SqliteSyncStore,
) -> Result<LiveWeatherJob, AppError> {
    let provider = OpenMeteoProvider::new(
        &config.weather.base_url,
        &config.weather.timezone,
        config.weather.mode,
    )
    .map_err(AppError::runtime)?;

    Ok(WeatherSyncJob::new(
        provider,
        store.clone(),
        SystemClock,
        config.weather.location,
    ))
}

/// Runs `job` immediately and then once per `interval` until `stop_flag`
/// is set. The wait is sliced so a stop request is noticed quickly.
pub fn start_job<F>(
    name: &str,
    interval: Duration,
    stop_flag: Arc<AtomicBool>,
    mut job: F,
) -> Result<JoinHandle<()>, AppError>
where
    F: FnMut() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                job();

                let deadline = Instant::now() + interval;
                while !stop_flag.load(Ordering::Relaxed) {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    std::thread::sleep(remaining.min(STOP_CHECK_SLICE));
                }
            }
        })
        .map_err(AppError::runtime)
}

pub struct ScheduledJobs {
    stop_flag: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ScheduledJobs {
    pub fn start(
        config: &AppConfig,
        vendor: &VendorConfig,
        store: &SqliteSyncStore,
    ) -> Result<Self, AppError> {
        let orchestrator = build_orchestrator(vendor, store)?;
        let weather_job = build_weather_job(config, store)?;
        let stop_flag = Arc::new(AtomicBool::new(false));

        let sync_handle = start_job(
            "full-sync",
            Duration::from_secs(config.sync_interval_secs),
            Arc::clone(&stop_flag),
            move || {
                orchestrator.run_full_sync();
            },
        )?;
        let weather_handle = start_job(
            "weather-sync",
            Duration::from_secs(config.weather_interval_secs),
            Arc::clone(&stop_flag),
            move || {
                weather_job.fetch_and_store();
            },
        )?;

        tracing::info!(
            sync_interval_secs = config.sync_interval_secs,
            weather_interval_secs = config.weather_interval_secs,
            "scheduled jobs started"
        );

        Ok(Self {
            stop_flag,
            handles: vec![sync_handle, weather_handle],
        })
    }

    pub fn stop(self) -> Result<(), AppError> {
        self.stop_flag.store(true, Ordering::Relaxed);

        let mut panicked = false;
        for handle in self.handles {
            panicked |= handle.join().is_err();
        }

        if panicked {
            return Err(AppError::runtime("job thread panicked"));
        }
        tracing::info!("scheduled jobs stopped");
        Ok(())
    }
}

pub fn run(config: AppConfig, vendor: VendorConfig) -> Result<(), AppError> {
    let store = open_store(&config.db_path)?;
    let jobs = ScheduledJobs::start(&config, &vendor, &store)?;

    let server_result = serve_api(&config.http_bind, store);
    let stop_result = jobs.stop();

    server_result?;
    stop_result
}

pub fn run_service(config: AppConfig, vendor: VendorConfig) -> Result<(), AppError> {
    let store = open_store(&config.db_path)?;
    let jobs = ScheduledJobs::start(&config, &vendor, &store)?;

    let signal_result =
        actix_web::rt::System::new().block_on(async { actix_web::rt::signal::ctrl_c().await });
    tracing::info!("shutdown requested");
    let stop_result = jobs.stop();

    signal_result.map_err(AppError::runtime)?;
    stop_result
}

pub fn run_api(config: AppConfig) -> Result<(), AppError> {
    let store = open_store(&config.db_path)?;
    serve_api(&config.http_bind, store)
}

fn serve_api(http_bind: &str, store: SqliteSyncStore) -> Result<(), AppError> {
    let api_state = ApiState { queries: store };
    let http_bind = http_bind.to_string();

    tracing::info!(bind = %http_bind, "http server starting");

    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .wrap(Cors::permissive())
                    .app_data(web::Data::new(api_state.clone()))
                    .configure(configure_routes)
            })
            .bind(&http_bind)?
            .run()
            .await
        })
        .map_err(AppError::runtime)
}

pub(crate) fn timestamp_to_iso8601(timestamp: TimestampMs) -> String {
    let datetime = chrono::DateTime::<Utc>::from_timestamp_millis(timestamp.0)
        .unwrap_or_else(|| chrono::DateTime::<Utc>::from(std::time::UNIX_EPOCH));
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::adapters::weather_http::WeatherMode;
    use crate::app::config::{AppConfig, VendorConfig, WeatherConfig};
    use crate::app::services::{SolarQueryHandler, WeatherSnapshotStore};
    use crate::app::weather_job::WeatherSyncStatus;
    use crate::domain::credential::TimestampMs;
    use crate::domain::sync_summary::RunStatus;
    use crate::domain::weather::Location;
    use crate::test_support::{CannedResponse, spawn_http_responder};

    use super::{
        build_orchestrator, build_weather_job, open_store, start_job, timestamp_to_iso8601,
    };

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join(name);
        std::mem::forget(dir);
        path
    }

    fn vendor_config(base_url: &str) -> VendorConfig {
        VendorConfig {
            base_url: base_url.to_string(),
            app_id: "app-1".to_string(),
            app_secret: "secret".to_string(),
            email: "ops@example.com".to_string(),
            password: "hashed".to_string(),
        }
    }

    fn app_config(db_path: &str, weather_base_url: &str) -> AppConfig {
        AppConfig {
            db_path: db_path.to_string(),
            http_bind: "127.0.0.1:0".to_string(),
            sync_interval_secs: 300,
            weather_interval_secs: 300,
            weather: WeatherConfig {
                base_url: weather_base_url.to_string(),
                location: Location {
                    latitude: 40.7128,
                    longitude: -74.006,
                },
                timezone: "UTC".to_string(),
                mode: WeatherMode::Current,
            },
        }
    }

    #[test]
    fn formats_timestamps_as_utc_millis() {
        assert_eq!(
            timestamp_to_iso8601(TimestampMs(1_700_000_000_000)),
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn job_runs_immediately_and_stops_on_flag() {
        let runs = Arc::new(AtomicUsize::new(0));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let counter = Arc::clone(&runs);

        let handle = start_job(
            "test-job",
            Duration::from_secs(3600),
            Arc::clone(&stop_flag),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .expect("job thread should spawn");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        stop_flag.store(true, Ordering::Relaxed);
        handle.join().expect("job thread should stop cleanly");

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn syncs_simulated_vendor_into_sqlite() {
        let responder = spawn_http_responder(vec![
            CannedResponse::json(200, r#"{"access_token":"tok-1","expires_in":"5183999"}"#),
            CannedResponse::json(
                200,
                r#"{"stationList":[{"id":1,"name":"Roof","installedCapacity":12.5}]}"#,
            ),
            CannedResponse::json(
                200,
                r#"{"deviceListItems":[{"deviceId":10,"deviceSn":"X1","deviceType":"INVERTER"}]}"#,
            ),
            CannedResponse::json(401, r#"{"msg":"token invalid"}"#),
            CannedResponse::json(200, r#"{"access_token":"tok-2","expires_in":7200}"#),
            CannedResponse::json(
                200,
                r#"{"collectionTime":1700000000,"dataList":[{"key":"APo_t1","value":"5.2"},{"key":"Et_ge0","value":"1024.5"}]}"#,
            ),
        ]);
        let db_path = temp_db_path("runtime-sync.sqlite");
        let store = open_store(db_path.to_string_lossy().as_ref()).expect("store should open");
        let orchestrator =
            build_orchestrator(&vendor_config(&responder.base_url()), &store).expect("builds");

        let summary = orchestrator.run_full_sync();
        drop(orchestrator);
        let requests = responder.finish();

        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.telemetry.processed, 1);
        assert!(!summary.has_failures());

        assert!(requests[0].path().starts_with("/account/v1.0/token?appId=app-1"));
        assert_eq!(requests[1].header("authorization").as_deref(), Some("Bearer tok-1"));
        assert!(requests[3].path().starts_with("/device/v1.0/currentData"));
        assert_eq!(requests[5].header("authorization").as_deref(), Some("Bearer tok-2"));
        assert_eq!(requests[5].body, r#"{"deviceSn":"X1"}"#);

        let record = store
            .get_latest_telemetry("X1")
            .expect("query should succeed")
            .expect("telemetry should exist");
        assert_eq!(record.ac_power, 5.2);
        assert_eq!(record.cumulative_production, 1024.5);
        assert_eq!(record.weather_snapshot_id, None);
        let station = store
            .get_station(1)
            .expect("query should succeed")
            .expect("station should exist");
        assert_eq!(station.name.as_deref(), Some("Roof"));
    }

    #[test]
    fn stores_weather_from_simulated_provider() {
        let responder = spawn_http_responder(vec![CannedResponse::json(
            200,
            r#"{"current":{"shortwave_radiation":612.0,"direct_normal_irradiance":410.0,"diffuse_radiation":120.0,"temperature_2m":24.5,"cloud_cover":10}}"#,
        )]);
        let db_path = temp_db_path("runtime-weather.sqlite");
        let db_path = db_path.to_string_lossy().to_string();
        let store = open_store(&db_path).expect("store should open");
        let job = build_weather_job(&app_config(&db_path, &responder.base_url()), &store)
            .expect("job builds");

        let report = job.fetch_and_store();
        drop(job);
        responder.finish();

        let WeatherSyncStatus::Stored { snapshot_id } = report.status else {
            panic!("expected stored snapshot, got {:?}", report.status);
        };
        assert_eq!(store.latest_id().expect("query"), Some(snapshot_id));
        let snapshot = store
            .get_weather_snapshot(snapshot_id)
            .expect("query")
            .expect("snapshot exists");
        assert_eq!(snapshot.ghi, 612.0);
        assert_eq!(snapshot.dhi, 120.0);
        assert_eq!(snapshot.clouds, Some(10.0));
    }
}
