//! Identity adapter
//!
//! Turns the identity token forwarded by the authenticating gateway into a
//! [`UserContext`]. The gateway has already verified the token; only the
//! payload is decoded here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use wfdispatch_core::UserContext;

use crate::api::errors::ApiError;
use crate::config::ServerConfig;
use crate::server::DispatchServer;

/// Reasons a request carries no usable identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Auth header absent or not valid text
    #[error("Missing {0} header")]
    MissingHeader(String),

    /// Token is not a decodable JWT
    #[error("Malformed identity token: {0}")]
    MalformedToken(String),

    /// Required claim absent or of the wrong type
    #[error("Identity token has no usable '{0}' claim")]
    MissingClaim(String),
}

/// Builds a [`UserContext`] from request headers
#[derive(Debug, Clone)]
pub struct IdentityExtractor {
    header_name: String,
    username_claim: String,
    groups_claim: String,
}

impl IdentityExtractor {
    /// Create an extractor
    pub fn new(
        header_name: impl Into<String>,
        username_claim: impl Into<String>,
        groups_claim: impl Into<String>,
    ) -> Self {
        Self {
            header_name: header_name.into(),
            username_claim: username_claim.into(),
            groups_claim: groups_claim.into(),
        }
    }

    /// Create an extractor from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.auth_header_name.clone(),
            config.username_claim.clone(),
            config.groups_claim.clone(),
        )
    }

    /// Extract the caller identity from request headers
    pub fn extract(&self, headers: &HeaderMap) -> Result<UserContext, IdentityError> {
        let raw = headers
            .get(self.header_name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| IdentityError::MissingHeader(self.header_name.clone()))?;

        let token = raw
            .strip_prefix("Bearer ")
            .or_else(|| raw.strip_prefix("bearer "))
            .unwrap_or(raw)
            .trim();

        let claims = decode_claims(token)?;
        self.user_from_claims(token, claims)
    }

    fn user_from_claims(&self, token: &str, claims: Map<String, Value>) -> Result<UserContext, IdentityError> {
        let name = claims
            .get(&self.username_claim)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| IdentityError::MissingClaim(self.username_claim.clone()))?
            .to_string();

        let groups = match claims.get(&self.groups_claim) {
            Some(Value::Array(items)) => items.iter().filter_map(group_name).collect(),
            _ => Vec::new(),
        };

        debug!(user = %name, groups = groups.len(), "Extracted identity");

        let mut auth_state = HashMap::new();
        auth_state.insert("access_token".to_string(), Value::String(token.to_string()));
        auth_state.insert("claims".to_string(), Value::Object(claims));

        Ok(UserContext::new(name, groups).with_auth_state(auth_state))
    }
}

/// Group entries are either plain names or `{"name": ..., "id": ...}` objects
fn group_name(item: &Value) -> Option<String> {
    match item {
        Value::String(name) => Some(name.clone()),
        Value::Object(group) => group.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Decode the payload segment of a JWT without verifying it
fn decode_claims(token: &str) -> Result<Map<String, Value>, IdentityError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(IdentityError::MalformedToken("expected three segments".to_string())),
    };

    let bytes = base64::decode_config(payload.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
        .map_err(|e| IdentityError::MalformedToken(format!("payload is not base64url: {}", e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(IdentityError::MalformedToken("payload is not a JSON object".to_string())),
        Err(e) => Err(IdentityError::MalformedToken(format!("payload is not JSON: {}", e))),
    }
}

/// Authenticated caller of an API handler
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserContext);

#[async_trait]
impl FromRequestParts<Arc<DispatchServer>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, server: &Arc<DispatchServer>) -> Result<Self, Self::Rejection> {
        server
            .identity()
            .extract(&parts.headers)
            .map(AuthenticatedUser)
            .map_err(|err| ApiError::Unauthorized(err.to_string()))
    }
}
