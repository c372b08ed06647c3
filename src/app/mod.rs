pub mod client;
pub mod config;
mod error;
pub mod job_lock;
mod logging;
pub mod orchestrator;
pub mod runtime;
pub mod services;
pub mod token;
pub mod weather_job;

pub use error::AppError;

use crate::app::config::{AppConfig, VendorConfig};
use crate::app::weather_job::WeatherSyncReport;
use crate::domain::sync_summary::SyncSummary;

/// Which jobs a manual trigger runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceTarget {
    Both,
    VendorOnly,
    WeatherOnly,
}

#[derive(Debug, Clone)]
pub struct OnceReport {
    pub weather: Option<WeatherSyncReport>,
    pub sync: Option<SyncSummary>,
}

pub fn run() -> Result<(), AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;
    let vendor = VendorConfig::from_env()?;
    log_bootstrap(&config, Some(&vendor));

    runtime::run(config, vendor)
}

pub fn run_service() -> Result<(), AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;
    let vendor = VendorConfig::from_env()?;
    log_bootstrap(&config, Some(&vendor));

    runtime::run_service(config, vendor)
}

pub fn run_api() -> Result<(), AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;
    log_bootstrap(&config, None);

    runtime::run_api(config)
}

/// Runs the selected jobs once, weather first so the telemetry of the same
/// trigger links to the fresh snapshot.
pub fn run_once(target: OnceTarget) -> Result<OnceReport, AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;
    let vendor = match target {
        OnceTarget::WeatherOnly => None,
        OnceTarget::Both | OnceTarget::VendorOnly => Some(VendorConfig::from_env()?),
    };
    log_bootstrap(&config, vendor.as_ref());

    let store = runtime::open_store(&config.db_path)?;

    let weather = match target {
        OnceTarget::Both | OnceTarget::WeatherOnly => {
            Some(runtime::build_weather_job(&config, &store)?.fetch_and_store())
        }
        OnceTarget::VendorOnly => None,
    };
    let sync = match &vendor {
        Some(vendor) => Some(runtime::build_orchestrator(vendor, &store)?.run_full_sync()),
        None => None,
    };

    Ok(OnceReport { weather, sync })
}

fn log_bootstrap(config: &AppConfig, vendor: Option<&VendorConfig>) {
    tracing::info!(
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        sync_interval_secs = config.sync_interval_secs,
        weather_interval_secs = config.weather_interval_secs,
        weather_mode = ?config.weather.mode,
        latitude = config.weather.location.latitude,
        longitude = config.weather.location.longitude,
        vendor_base_url = vendor.map(|vendor| vendor.base_url.as_str()),
        "application bootstrap initialized"
    );
}
