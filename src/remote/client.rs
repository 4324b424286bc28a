//! Bearer-authenticated JSON client for one sibling service.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::remote::{parse_retry_after, RemoteError, ServiceTokenSigner};

/// Response envelope used by every sibling service.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// HTTP client bound to one remote service.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    service: String,
    base_url: String,
    http: reqwest::Client,
    signer: Arc<ServiceTokenSigner>,
}

impl ServiceClient {
    /// Builds a client whose every request times out after `timeout`.
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        signer: Arc<ServiceTokenSigner>,
    ) -> Result<Self, RemoteError> {
        let service = service.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::from_reqwest(&service, &e))?;

        Ok(Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            signer,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    // == Get Data ==
    /// GETs `path` and unwraps the `{ "data": ... }` envelope.
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.signer.issue()?;

        debug!(service = %self.service, url = %url, "Calling remote service");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteError::from_reqwest(&self.service, &e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            return Err(RemoteError::RateLimited {
                service: self.service.clone(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Http {
                service: self.service.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::from_reqwest(&self.service, &e))?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&body).map_err(|e| RemoteError::Malformed {
                service: self.service.clone(),
                message: e.to_string(),
            })?;

        Ok(envelope.data)
    }
}
