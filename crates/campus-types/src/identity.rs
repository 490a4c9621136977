//! Identity types for authenticated callers.
//!
//! The identity collaborator resolves a session token into a
//! [`UserProfile`] once at the request boundary; the resulting
//! [`RequestContext`] is then threaded explicitly through the lifecycle
//! engines. No ambient session state exists anywhere in the system.

use serde::{Deserialize, Serialize};

/// Profile of an authenticated user as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
	/// Stable user identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Contact email address.
	pub email: String,
	/// Contact phone number. May be empty if the user never provided one.
	#[serde(default)]
	pub phone: String,
	/// Whether the identity provider has verified the email address.
	#[serde(default)]
	pub email_verified: bool,
}

/// Per-request context carrying the resolved caller identity.
///
/// Constructed exactly once per request by the HTTP layer and passed by
/// reference into every lifecycle operation that needs authorization.
#[derive(Debug, Clone)]
pub struct RequestContext {
	/// The authenticated caller.
	pub user: UserProfile,
}

impl RequestContext {
	/// Creates a context for the given caller.
	pub fn new(user: UserProfile) -> Self {
		Self { user }
	}

	/// Identifier of the authenticated caller.
	pub fn user_id(&self) -> &str {
		&self.user.id
	}
}
