use std::sync::{Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::adapters::vendor_http::{VendorRequest, VendorTransport};
use crate::app::client::VendorError;
use crate::domain::credential::{Clock, Credential, TokenState, token_state};
use crate::domain::numeric::parse_i64;

pub const TOKEN_PATH: &str = "/account/v1.0/token";

#[derive(Clone)]
pub struct ServiceCredentials {
    pub app_id: String,
    pub app_secret: String,
    pub email: String,
    pub password: String,
}

/// Owns the vendor bearer token. The stored credential sits behind a mutex
/// so the manager can be shared by `&self`; refreshes are expected to come
/// from one job at a time.
pub struct TokenManager<T, C> {
    transport: T,
    clock: C,
    credentials: ServiceCredentials,
    credential: Mutex<Option<Credential>>,
}

impl<T, C> TokenManager<T, C>
where
    T: VendorTransport,
    C: Clock,
{
    pub fn new(transport: T, clock: C, credentials: ServiceCredentials) -> Self {
        Self {
            transport,
            clock,
            credentials,
            credential: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Result<TokenState, VendorError> {
        let credential = self.lock()?;
        Ok(token_state(credential.as_ref(), self.clock.now()))
    }

    /// Returns the stored token, refreshing first when it is absent or past
    /// its (margin-adjusted) expiry.
    pub fn ensure_valid(&self) -> Result<String, VendorError> {
        {
            let credential = self.lock()?;
            if let Some(credential) = credential.as_ref()
                && !credential.is_expired(self.clock.now())
            {
                return Ok(credential.token().to_string());
            }
        }

        self.refresh()
    }

    pub fn refresh(&self) -> Result<String, VendorError> {
        let mut slot = self.lock()?;
        *slot = None;

        let request = VendorRequest::post(
            TOKEN_PATH,
            json!({
                "appSecret": self.credentials.app_secret,
                "email": self.credentials.email,
                "password": self.credentials.password,
            }),
        )
        .with_query("appId", &self.credentials.app_id)
        .with_query("language", "en");

        let response = self.transport.send(&request).map_err(|error| {
            tracing::warn!(error = %error, "vendor token request failed");
            VendorError::Auth(format!("token request failed: {error}"))
        })?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "vendor token endpoint rejected login");
            return Err(VendorError::Auth(format!(
                "token endpoint responded with status {}",
                response.status
            )));
        }

        let token = response
            .body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| VendorError::Auth("no access token in response".to_string()))?
            .to_string();
        let ttl_seconds = response
            .body
            .get("expires_in")
            .and_then(parse_i64)
            .unwrap_or(0);

        let credential = Credential::issue(token.clone(), ttl_seconds, self.clock.now());
        tracing::info!(
            ttl_seconds,
            expires_at_ms = credential.expires_at().0,
            "vendor credential refreshed"
        );
        *slot = Some(credential);

        Ok(token)
    }

    pub fn invalidate(&self) -> Result<(), VendorError> {
        *self.lock()? = None;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Credential>>, VendorError> {
        self.credential
            .lock()
            .map_err(|_| VendorError::CredentialLockPoisoned)
    }
}
