//! Storage module for the campus delivery system.
//!
//! This module provides abstractions for persisting order and listing
//! documents, supporting different backend implementations such as
//! in-memory or file-based storage. Beyond plain key-value access the
//! interface requires a compare-and-swap primitive: every lifecycle
//! transition is a read followed by a conditional write, and two callers
//! racing the same document must not both succeed.

use async_trait::async_trait;
use campus_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when a guarded write loses a race: the document
	/// changed between the read and the conditional write.
	#[error("Conflict: document was modified concurrently")]
	Conflict,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the system. It provides basic key-value operations plus
/// the compare-and-swap write the lifecycle engines rely on for
/// read-modify-write consistency.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes unconditionally, creating or overwriting.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Replaces the value only if the currently stored bytes equal
	/// `expected`. Fails with [`StorageError::Conflict`] when they do not
	/// and [`StorageError::NotFound`] when the key is absent.
	async fn compare_and_swap_bytes(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all keys starting with the given prefix.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must
/// provide to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used to wire up the configured backend at startup.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed document operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed documents with
/// automatic JSON serialization. For guarded updates the raw bytes read
/// from storage act as the snapshot the conditional write is checked
/// against.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl std::fmt::Debug for StorageService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorageService").finish_non_exhaustive()
	}
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable document.
	///
	/// The namespace and id are combined to form a unique key. The data
	/// is serialized to JSON before storage.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await?;
		tracing::debug!(%key, "stored document");
		Ok(())
	}

	/// Retrieves and deserializes a document from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves a document together with the raw bytes it was read from.
	///
	/// The returned bytes are the snapshot to pass to
	/// [`StorageService::update_guarded`] so the write only succeeds if
	/// nobody else modified the document in between.
	pub async fn retrieve_raw<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<(T, Vec<u8>), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		let value = serde_json::from_slice(&bytes)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok((value, bytes))
	}

	/// Conditionally replaces a document.
	///
	/// Succeeds only when the stored bytes still equal `snapshot`,
	/// otherwise fails with [`StorageError::Conflict`] and leaves the
	/// document untouched. This is the primitive that makes lifecycle
	/// transitions atomic: either the whole updated document commits, or
	/// none of it does.
	pub async fn update_guarded<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		snapshot: &[u8],
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		match self.backend.compare_and_swap_bytes(&key, snapshot, bytes).await {
			Ok(()) => Ok(()),
			Err(StorageError::Conflict) => {
				tracing::debug!(%key, "guarded update lost the race");
				Err(StorageError::Conflict)
			},
			Err(e) => Err(e),
		}
	}

	/// Retrieves all documents in a namespace.
	///
	/// Documents deleted while the listing is in progress are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let keys = self.backend.list_keys(&prefix).await?;

		let mut documents = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => {
					let value = serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?;
					documents.push(value);
				},
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(documents)
	}

	/// Removes a document from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.delete(&key).await
	}

	/// Checks if a document exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.exists(&key).await
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemoryStorage;
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
	struct Doc {
		id: String,
		value: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_typed_round_trip() {
		let storage = service();
		let doc = Doc {
			id: "d1".to_string(),
			value: 7,
		};

		storage.store("docs", "d1", &doc).await.unwrap();
		let loaded: Doc = storage.retrieve("docs", "d1").await.unwrap();
		assert_eq!(loaded, doc);
	}

	#[tokio::test]
	async fn test_update_guarded_detects_interleaved_write() {
		let storage = service();
		let doc = Doc {
			id: "d1".to_string(),
			value: 1,
		};
		storage.store("docs", "d1", &doc).await.unwrap();

		let (mut loaded, snapshot): (Doc, Vec<u8>) =
			storage.retrieve_raw("docs", "d1").await.unwrap();

		// Another writer gets in between the read and the guarded write.
		let other = Doc {
			id: "d1".to_string(),
			value: 99,
		};
		storage.store("docs", "d1", &other).await.unwrap();

		loaded.value = 2;
		let result = storage.update_guarded("docs", "d1", &snapshot, &loaded).await;
		assert!(matches!(result, Err(StorageError::Conflict)));

		// The interleaved write survives untouched.
		let current: Doc = storage.retrieve("docs", "d1").await.unwrap();
		assert_eq!(current.value, 99);
	}

	#[tokio::test]
	async fn test_retrieve_all_scopes_to_namespace() {
		let storage = service();
		for i in 0..3u32 {
			let doc = Doc {
				id: format!("d{}", i),
				value: i,
			};
			storage.store("docs", &doc.id.clone(), &doc).await.unwrap();
		}
		storage
			.store(
				"other",
				"x",
				&Doc {
					id: "x".to_string(),
					value: 42,
				},
			)
			.await
			.unwrap();

		let docs: Vec<Doc> = storage.retrieve_all("docs").await.unwrap();
		assert_eq!(docs.len(), 3);
	}
}
