use serde_json::{Value, json};
use thiserror::Error;

use crate::adapters::vendor_http::{TransportError, VendorRequest, VendorResponse, VendorTransport};
use crate::app::token::{ServiceCredentials, TokenManager};
use crate::domain::credential::{Clock, TokenState};
use crate::domain::vendor_payload::{
    CurrentData, DevicePayload, ListEntry, PayloadError, StationPayload, parse_current_data,
    parse_device_list, parse_station_list,
};

pub const STATION_LIST_PATH: &str = "/station/v1.0/list";
pub const DEVICE_LIST_PATH: &str = "/station/v1.0/device";
pub const CURRENT_DATA_PATH: &str = "/device/v1.0/currentData";

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("vendor authentication failed: {0}")]
    Auth(String),
    #[error("vendor request timed out")]
    Timeout,
    #[error("vendor request failed: {0}")]
    Network(String),
    #[error("vendor responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("vendor response could not be decoded: {0}")]
    Decode(String),
    #[error("credential lock poisoned")]
    CredentialLockPoisoned,
}

impl From<TransportError> for VendorError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::Timeout,
            TransportError::Network(message) => Self::Network(message),
            TransportError::Decode(message) => Self::Decode(message),
        }
    }
}

impl From<PayloadError> for VendorError {
    fn from(error: PayloadError) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Read side of the vendor cloud the sync cascade depends on. List calls
/// fail as a whole only when the response itself is unusable.
pub trait VendorApi {
    fn list_stations(&self) -> Result<Vec<ListEntry<StationPayload>>, VendorError>;
    fn list_devices(&self, station_id: i64) -> Result<Vec<ListEntry<DevicePayload>>, VendorError>;
    fn current_data(&self, device_sn: &str) -> Result<CurrentData, VendorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

pub struct AuthenticatedClient<T, C> {
    transport: T,
    tokens: TokenManager<T, C>,
}

impl<T, C> AuthenticatedClient<T, C>
where
    T: VendorTransport + Clone,
    C: Clock,
{
    pub fn new(transport: T, clock: C, credentials: ServiceCredentials) -> Self {
        Self {
            tokens: TokenManager::new(transport.clone(), clock, credentials),
            transport,
        }
    }

    pub fn token_state(&self) -> Result<TokenState, VendorError> {
        self.tokens.state()
    }

    /// Issues one authenticated POST. A 401 on the first attempt drops the
    /// credential, logs in again and reissues the request exactly once.
    pub fn call(&self, path: &str, body: Value) -> Result<Value, VendorError> {
        let mut attempt = Attempt::First;
        let mut token = self.tokens.ensure_valid()?;

        loop {
            let request = VendorRequest::post(path, body.clone()).with_bearer(&token);
            let response = self.transport.send(&request)?;

            if response.is_unauthorized() {
                match attempt {
                    Attempt::First => {
                        tracing::info!(path, "vendor rejected bearer token, refreshing once");
                        self.tokens.invalidate()?;
                        token = self.tokens.refresh()?;
                        attempt = Attempt::Retry;
                        continue;
                    }
                    Attempt::Retry => {
                        tracing::warn!(path, "vendor rejected refreshed bearer token");
                        return Err(VendorError::Auth(
                            "request unauthorized after token refresh".to_string(),
                        ));
                    }
                }
            }

            return into_body(response);
        }
    }
}

fn into_body(response: VendorResponse) -> Result<Value, VendorError> {
    if response.is_success() {
        return Ok(response.body);
    }

    let body = match response.body {
        Value::String(text) => text,
        other => other.to_string(),
    };
    Err(VendorError::Status {
        status: response.status,
        body,
    })
}

impl<T, C> VendorApi for AuthenticatedClient<T, C>
where
    T: VendorTransport + Clone,
    C: Clock,
{
    fn list_stations(&self) -> Result<Vec<ListEntry<StationPayload>>, VendorError> {
        let payload = self.call(STATION_LIST_PATH, json!({}))?;
        Ok(parse_station_list(&payload)?)
    }

    fn list_devices(
        &self,
        station_id: i64,
    ) -> Result<Vec<ListEntry<DevicePayload>>, VendorError> {
        let payload = self.call(DEVICE_LIST_PATH, json!({ "stationId": station_id }))?;
        Ok(parse_device_list(&payload)?)
    }

    fn current_data(&self, device_sn: &str) -> Result<CurrentData, VendorError> {
        let payload = self.call(CURRENT_DATA_PATH, json!({ "deviceSn": device_sn }))?;
        Ok(parse_current_data(&payload)?)
    }
}
