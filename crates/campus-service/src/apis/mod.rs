//! API modules for the campus delivery service.
//!
//! Each module translates between the HTTP surface and one lifecycle
//! engine, mapping engine errors to [`ApiError`] so the four-way
//! taxonomy (validation / authorization / conflict / not-found) survives
//! all the way to the client.

pub mod listings;
pub mod orders;

use axum::http::{header, HeaderMap};
use campus_identity::IdentityError;
use campus_types::{ApiError, RequestContext};

use crate::server::AppState;

/// Resolves the bearer token once per request into an explicit context.
pub(crate) async fn authenticate(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<RequestContext, ApiError> {
	let token = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.unwrap_or_default();

	state.identity.authenticate(token).await.map_err(|e| match e {
		IdentityError::Unauthenticated => ApiError::Forbidden {
			error_type: "UNAUTHENTICATED".to_string(),
			message: "a valid session token is required".to_string(),
		},
		other => {
			tracing::error!("identity resolution failed: {}", other);
			ApiError::InternalServerError {
				error_type: "IDENTITY_ERROR".to_string(),
				message: "identity provider failure".to_string(),
			}
		},
	})
}
