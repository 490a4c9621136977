//! Static-token identity implementation.
//!
//! This module resolves session tokens against a list of users declared in
//! the configuration file. It stands in for the hosted identity provider
//! in development and test deployments; tokens are held as `SecretString`
//! so they never appear in logs.

use crate::{IdentityError, IdentityInterface};
use async_trait::async_trait;
use campus_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString, UserProfile,
	ValidationError,
};

/// An identity provider backed by statically configured tokens.
pub struct LocalIdentity {
	/// Configured (token, profile) pairs.
	users: Vec<(SecretString, UserProfile)>,
}

impl LocalIdentity {
	/// Creates a provider from configured (token, profile) pairs.
	pub fn new(users: Vec<(SecretString, UserProfile)>) -> Self {
		Self { users }
	}
}

#[async_trait]
impl IdentityInterface for LocalIdentity {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalIdentitySchema)
	}

	async fn resolve(&self, session_token: &str) -> Result<UserProfile, IdentityError> {
		if session_token.is_empty() {
			return Err(IdentityError::Unauthenticated);
		}
		self.users
			.iter()
			.find(|(token, _)| token.expose_secret() == session_token)
			.map(|(_, profile)| profile.clone())
			.ok_or(IdentityError::Unauthenticated)
	}
}

/// Configuration schema for LocalIdentity.
pub struct LocalIdentitySchema;

impl ConfigSchema for LocalIdentitySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let user_schema = Schema::new(
			vec![
				Field::new("token", FieldType::String).with_validator(|v| {
					if v.as_str().is_some_and(|s| !s.is_empty()) {
						Ok(())
					} else {
						Err("token must be non-empty".to_string())
					}
				}),
				Field::new("id", FieldType::String),
				Field::new("name", FieldType::String),
				Field::new("email", FieldType::String),
			],
			vec![
				Field::new("phone", FieldType::String),
				Field::new("email_verified", FieldType::Boolean),
			],
		);

		let schema = Schema::new(
			vec![Field::new(
				"users",
				FieldType::Array(Box::new(FieldType::Table(user_schema))),
			)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Registry entry for the static-token identity provider.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::IdentityFactory;

	fn factory() -> Self::Factory {
		create_identity
	}
}

impl crate::IdentityRegistry for Registry {}

/// Factory function to create a static-token identity provider from
/// configuration.
///
/// Configuration parameters:
/// - `users`: array of tables with `token`, `id`, `name`, `email` and
///   optional `phone`, `email_verified`
pub fn create_identity(config: &toml::Value) -> Result<Box<dyn IdentityInterface>, IdentityError> {
	LocalIdentitySchema
		.validate(config)
		.map_err(|e| IdentityError::Configuration(e.to_string()))?;

	let mut users = Vec::new();
	if let Some(entries) = config.get("users").and_then(|v| v.as_array()) {
		for entry in entries {
			let get = |field: &str| {
				entry
					.get(field)
					.and_then(|v| v.as_str())
					.unwrap_or_default()
					.to_string()
			};
			let profile = UserProfile {
				id: get("id"),
				name: get("name"),
				email: get("email"),
				phone: get("phone"),
				email_verified: entry
					.get("email_verified")
					.and_then(|v| v.as_bool())
					.unwrap_or(false),
			};
			users.push((SecretString::from(get("token")), profile));
		}
	}

	Ok(Box::new(LocalIdentity::new(users)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::IdentityService;

	fn config() -> toml::Value {
		toml::from_str(
			r#"
			[[users]]
			token = "tok-customer"
			id = "u-customer"
			name = "Customer"
			email = "customer@campus.edu"
			phone = "555-0100"
			email_verified = true

			[[users]]
			token = "tok-courier"
			id = "u-courier"
			name = "Courier"
			email = "courier@campus.edu"
			phone = "555-0101"
			"#,
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_resolves_known_token() {
		let identity = create_identity(&config()).unwrap();
		let profile = identity.resolve("tok-courier").await.unwrap();
		assert_eq!(profile.id, "u-courier");
		assert!(!profile.email_verified);
	}

	#[tokio::test]
	async fn test_rejects_unknown_and_empty_tokens() {
		let identity = create_identity(&config()).unwrap();
		assert!(matches!(
			identity.resolve("tok-nobody").await,
			Err(IdentityError::Unauthenticated)
		));
		assert!(matches!(
			identity.resolve("").await,
			Err(IdentityError::Unauthenticated)
		));
	}

	#[tokio::test]
	async fn test_service_builds_request_context() {
		let service = IdentityService::new(create_identity(&config()).unwrap());
		let ctx = service.authenticate("tok-customer").await.unwrap();
		assert_eq!(ctx.user_id(), "u-customer");
		assert!(ctx.user.email_verified);
	}

	#[test]
	fn test_schema_rejects_missing_token() {
		let config: toml::Value = toml::from_str(
			r#"
			[[users]]
			id = "u-1"
			name = "User"
			email = "user@campus.edu"
			"#,
		)
		.unwrap();
		assert!(create_identity(&config).is_err());
	}
}
