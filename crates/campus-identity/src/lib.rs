//! Identity module for the campus delivery system.
//!
//! This module provides abstractions for the identity collaborator: the
//! component that answers "who is the current caller" for a given session
//! token. The lifecycle engines consume the resolved identity through an
//! explicit per-request context; this crate defines the interface and a
//! reference implementation backed by statically configured tokens.

use async_trait::async_trait;
use campus_types::{ConfigSchema, ImplementationRegistry, RequestContext, UserProfile};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
	/// Error that occurs when a session token does not resolve to a user.
	#[error("Unauthenticated")]
	Unauthenticated,
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs in the identity backend.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the interface for identity providers.
///
/// This trait must be implemented by any identity provider that wants to
/// integrate with the system. It resolves opaque session tokens into user
/// profiles; session issuance itself is out of scope and belongs to the
/// external provider.
#[async_trait]
pub trait IdentityInterface: Send + Sync {
	/// Returns the configuration schema for this identity implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Resolves a session token into the authenticated user's profile.
	///
	/// Fails with [`IdentityError::Unauthenticated`] when the token is
	/// unknown or no longer valid.
	async fn resolve(&self, session_token: &str) -> Result<UserProfile, IdentityError>;
}

/// Type alias for identity factory functions.
pub type IdentityFactory = fn(&toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError>;

/// Registry trait for identity implementations.
pub trait IdentityRegistry: ImplementationRegistry<Factory = IdentityFactory> {}

/// Get all registered identity implementations.
///
/// Returns a vector of (name, factory) tuples for all available identity
/// implementations.
pub fn get_all_implementations() -> Vec<(&'static str, IdentityFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages identity resolution.
///
/// This struct provides a high-level interface for authentication,
/// wrapping an underlying identity implementation. The HTTP layer calls
/// [`IdentityService::authenticate`] once per request and threads the
/// resulting context through the lifecycle engines.
pub struct IdentityService {
	/// The underlying identity implementation.
	implementation: Box<dyn IdentityInterface>,
}

impl IdentityService {
	/// Creates a new IdentityService with the specified implementation.
	pub fn new(implementation: Box<dyn IdentityInterface>) -> Self {
		Self { implementation }
	}

	/// Resolves a session token into a per-request context.
	pub async fn authenticate(&self, session_token: &str) -> Result<RequestContext, IdentityError> {
		let user = self.implementation.resolve(session_token).await?;
		tracing::debug!(user_id = %user.id, "session token resolved");
		Ok(RequestContext::new(user))
	}
}
