//! Service-to-service bearer tokens.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::remote::RemoteError;

/// Token lifetime in seconds.
pub const SERVICE_TOKEN_TTL_SECS: i64 = 3600;

/// Claims carried by a service token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaims {
    pub service: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues HS256 tokens identifying this process to its siblings.
#[derive(Clone)]
pub struct ServiceTokenSigner {
    service_name: String,
    key: EncodingKey,
}

impl std::fmt::Debug for ServiceTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTokenSigner")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl ServiceTokenSigner {
    pub fn new(service_name: impl Into<String>, secret: &str) -> Self {
        Self {
            service_name: service_name.into(),
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn claims(&self) -> ServiceClaims {
        let now = Utc::now().timestamp();
        ServiceClaims {
            service: self.service_name.clone(),
            role: "SERVICE".to_string(),
            iat: now,
            exp: now + SERVICE_TOKEN_TTL_SECS,
        }
    }

    /// Signs a fresh token valid for one hour.
    pub fn issue(&self) -> Result<String, RemoteError> {
        encode(&Header::default(), &self.claims(), &self.key)
            .map_err(|e| RemoteError::Token(e.to_string()))
    }
}
