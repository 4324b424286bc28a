//! Remote Module
//!
//! Outbound HTTP to sibling services: service tokens, `{ "data": ... }`
//! envelopes and the error taxonomy the retry loop classifies.

mod client;
mod error;
mod source;
mod token;

pub use client::{Envelope, ServiceClient};
pub use error::{parse_retry_after, RemoteError};
pub use source::{
    CatalogSource, HttpCatalogSource, AUTH_SERVICE, COURSE_SERVICE, EMAIL_SERVICE, KNOWN_SERVICES,
    PACKAGE_SERVICE,
};
pub use token::{ServiceClaims, ServiceTokenSigner, SERVICE_TOKEN_TTL_SECS};
