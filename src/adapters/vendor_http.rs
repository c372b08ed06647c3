use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

/// Upper bound for every vendor request, token endpoint included.
pub const VENDOR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct VendorRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Value,
}

impl VendorRequest {
    pub fn post(path: &str, body: Value) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
            bearer: None,
            body,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }
}

/// Any HTTP status is a response; only transport failures are errors.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorResponse {
    pub status: u16,
    pub body: Value,
}

impl VendorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failed: {0}")]
    Network(String),
    #[error("response body is not valid JSON: {0}")]
    Decode(String),
}

pub trait VendorTransport: Send + Sync + 'static {
    fn send(&self, request: &VendorRequest) -> Result<VendorResponse, TransportError>;
}

impl<T: VendorTransport> VendorTransport for Arc<T> {
    fn send(&self, request: &VendorRequest) -> Result<VendorResponse, TransportError> {
        self.as_ref().send(request)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestVendorTransport {
    base_url: String,
    client: Client,
}

impl ReqwestVendorTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(VENDOR_TIMEOUT)
            .build()
            .map_err(|error| TransportError::Network(error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl VendorTransport for ReqwestVendorTransport {
    fn send(&self, request: &VendorRequest) -> Result<VendorResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .post(url)
            .query(&request.query)
            .json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(map_reqwest_error)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(_) if !(200..300).contains(&status) => Value::String(text),
                Err(error) => return Err(TransportError::Decode(error.to_string())),
            }
        };

        Ok(VendorResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(error.to_string())
    }
}
