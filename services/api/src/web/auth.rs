//! services/api/src/web/auth.rs
//!
//! Reading the session credential. Sessions are issued elsewhere; this service
//! only resolves the `session` cookie into a `SessionUser`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::error;
use vet_consult_core::domain::SessionUser;
use vet_consult_core::ports::{IdentityService, PortError};

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session";

/// The value of the `session` cookie, if the request carries one.
pub fn session_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Resolves the request's credential. Lookup failures count as anonymous.
pub async fn resolve_user(identity: &dyn IdentityService, headers: &HeaderMap) -> Option<SessionUser> {
    let credential = session_credential(headers)?;
    match identity.resolve_session_user(credential).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to validate auth session: {}", e);
            None
        }
    }
}

/// The authenticated caller. Rejects anonymous requests with 401.
pub struct CurrentUser(pub SessionUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Port(PortError::Unauthorized))
    }
}
