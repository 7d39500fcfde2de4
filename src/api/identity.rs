//! Caller identity.
//!
//! Authentication happens upstream; this service only reads the user id
//! the gateway forwards in a request header.

use anyhow::{Context, Result};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, HeaderName},
};
use uuid::Uuid;

use super::routes::AppState;
use crate::types::{SportsbookError, SportsbookResult};

/// Resolves the authenticated user for a request.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, headers: &HeaderMap) -> SportsbookResult<Uuid>;
}

/// Reads a UUID from a fixed header, `x-user-id` by default.
pub struct HeaderIdentity {
    header: HeaderName,
}

impl HeaderIdentity {
    pub fn new(header: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.to_ascii_lowercase().as_bytes())
            .with_context(|| format!("Invalid identity header name: {header}"))?;
        Ok(Self { header })
    }
}

impl IdentityProvider for HeaderIdentity {
    fn identify(&self, headers: &HeaderMap) -> SportsbookResult<Uuid> {
        let raw = headers
            .get(&self.header)
            .ok_or_else(|| SportsbookError::Unauthorized(format!("missing {} header", self.header)))?;
        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| SportsbookError::Unauthorized(format!("malformed {} header", self.header)))
    }
}

/// Extractor for the authenticated user id.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = SportsbookError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.identity.identify(&parts.headers).map(CurrentUser)
    }
}
