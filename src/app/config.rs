use crate::adapters::weather_http::WeatherMode;
use crate::app::AppError;
use crate::domain::weather::Location;

const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub http_bind: String,
    pub sync_interval_secs: u64,
    pub weather_interval_secs: u64,
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub location: Location,
    pub timezone: String,
    pub mode: WeatherMode,
}

/// Service credentials for the vendor token endpoint. Only the sync jobs
/// need them, so they are loaded separately from [`AppConfig`].
#[derive(Clone)]
pub struct VendorConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match non_empty(&lookup, "WEATHER_MODE") {
            Some(raw) => raw.parse::<WeatherMode>().map_err(AppError::config)?,
            None => WeatherMode::Current,
        };

        Ok(Self {
            db_path: non_empty(&lookup, "DB_PATH")
                .unwrap_or_else(|| "/var/lib/solar-sync/solar_sync.db".to_string()),
            http_bind: non_empty(&lookup, "HTTP_BIND")
                .unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            sync_interval_secs: interval_secs(&lookup, "SYNC_INTERVAL_SECS")?,
            weather_interval_secs: interval_secs(&lookup, "WEATHER_INTERVAL_SECS")?,
            weather: WeatherConfig {
                base_url: non_empty(&lookup, "WEATHER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.to_string()),
                location: Location {
                    latitude: parse_or_default(&lookup, "WEATHER_LATITUDE", 40.7128_f64)?,
                    longitude: parse_or_default(&lookup, "WEATHER_LONGITUDE", -74.006_f64)?,
                },
                timezone: non_empty(&lookup, "WEATHER_TIMEZONE")
                    .unwrap_or_else(|| "Asia/Kolkata".to_string()),
                mode,
            },
        })
    }
}

impl VendorConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            base_url: required(&lookup, "SOLARMAN_BASE_URL")?,
            app_id: required(&lookup, "SOLARMAN_APP_ID")?,
            app_secret: required(&lookup, "SOLARMAN_APP_SECRET")?,
            email: required(&lookup, "SOLARMAN_EMAIL")?,
            password: required(&lookup, "SOLARMAN_PASSWORD")?,
        })
    }
}

fn load_dotenv() {
    if let Err(error) = dotenvy::dotenv()
        && !error.not_found()
    {
        tracing::warn!(error = %error, "failed to load .env file");
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn interval_secs<F>(lookup: &F, key: &str) -> Result<u64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or_default(lookup, key, 300_u64)?;
    if value == 0 {
        return Err(AppError::config(format!("{key} must be greater than zero")));
    }
    Ok(value)
}
