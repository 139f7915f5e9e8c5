use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::Authorization;
use headers::authorization::Bearer;
use subtle::ConstantTimeEq;

use crate::db::SubjectId;
use crate::error::RegistryError;
use crate::router::RegistryState;
use crate::service::Caller;

/// Header naming the acting subject once the bearer key has been accepted.
pub const SUBJECT_HEADER: &str = "x-subject-id";

/// Constant-time comparison of a presented key against the configured one.
/// An unconfigured (empty) key never matches.
pub fn key_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

/// Resolves the caller of a request.
///
/// Requires:
/// - Header: `Authorization: Bearer <access key>`
/// - Header: `x-subject-id: <uuid>` naming an existing credential
///
/// The caller's role is read from the store, never from the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCaller(pub Caller);

impl FromRequestParts<RegistryState> for AuthenticatedCaller {
    type Rejection = RegistryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RegistryState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| RegistryError::Unauthenticated)?;
        if !key_matches(bearer.token(), &state.access_key) {
            return Err(RegistryError::Unauthenticated);
        }

        let id = parts
            .headers
            .get(SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<SubjectId>().ok())
            .ok_or(RegistryError::Unauthenticated)?;
        let credential = state
            .storage
            .credential(id)
            .await?
            .ok_or(RegistryError::Unauthenticated)?;

        Ok(Self(Caller {
            id,
            role: credential.role,
        }))
    }
}
