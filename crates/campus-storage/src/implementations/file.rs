//! File-based storage backend implementation.
//!
//! This module stores each document as a JSON file under
//! `<base_path>/<namespace>/<id>.json`, providing simple persistence
//! without external dependencies. Writes go through a temp-file rename so
//! a crash cannot leave a half-written document, and all mutating
//! operations are serialized behind a single mutex so compare-and-swap
//! keeps its one-winner guarantee.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use campus_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Serializes mutating operations. Coarse, but the write volume of a
	/// campus deployment does not justify per-key locking.
	write_lock: Mutex<()>,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			write_lock: Mutex::new(()),
		}
	}

	/// Converts a storage key of the form `namespace:id` to a file path.
	///
	/// Path separators in either part are replaced so a crafted id cannot
	/// escape the base directory.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("", key));
		let safe_namespace = namespace.replace(['/', '\\'], "_");
		let safe_id = id.replace(['/', '\\'], "_");
		self.base_path
			.join(safe_namespace)
			.join(format!("{}.json", safe_id))
	}

	/// Reads the current bytes for a path, mapping a missing file to
	/// [`StorageError::NotFound`].
	async fn read_current(path: &Path) -> Result<Vec<u8>, StorageError> {
		match fs::read(path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	/// Writes bytes atomically by writing to a temp file then renaming.
	async fn write_atomic(path: &Path, value: &[u8]) -> Result<(), StorageError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		Ok(())
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);
		Self::read_current(&path).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let path = self.get_file_path(key);
		Self::write_atomic(&path, &value).await
	}

	async fn compare_and_swap_bytes(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let path = self.get_file_path(key);

		let current = Self::read_current(&path).await?;
		if current != expected {
			return Err(StorageError::Conflict);
		}
		Self::write_atomic(&path, &value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		Ok(path.exists())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		// Prefixes are namespace-shaped ("orders:"), which maps to one
		// directory of the layout.
		let namespace = prefix.strip_suffix(':').unwrap_or(prefix);
		let dir = self.base_path.join(namespace.replace(['/', '\\'], "_"));

		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() == Some(std::ffi::OsStr::new("json")) {
				if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
					keys.push(format!("{}:{}", namespace, stem));
				}
			}
		}
		keys.sort();
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![], // No required fields
			vec![Field::new("storage_path", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Registry entry for the file storage backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	tracing::info!(path = %storage_path, "file storage initialized");
	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.set_bytes("orders:o1", b"payload".to_vec())
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("orders:o1").await.unwrap(), b"payload");
		assert!(storage.exists("orders:o1").await.unwrap());

		storage.delete("orders:o1").await.unwrap();
		assert!(matches!(
			storage.get_bytes("orders:o1").await,
			Err(StorageError::NotFound)
		));
		// Deleting a missing key is not an error
		storage.delete("orders:o1").await.unwrap();
	}

	#[tokio::test]
	async fn test_compare_and_swap_rejects_stale_snapshot() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage.set_bytes("orders:o1", b"v1".to_vec()).await.unwrap();
		storage
			.compare_and_swap_bytes("orders:o1", b"v1", b"v2".to_vec())
			.await
			.unwrap();

		let result = storage
			.compare_and_swap_bytes("orders:o1", b"v1", b"v3".to_vec())
			.await;
		assert!(matches!(result, Err(StorageError::Conflict)));
		assert_eq!(storage.get_bytes("orders:o1").await.unwrap(), b"v2");
	}

	#[tokio::test]
	async fn test_list_keys_per_namespace() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage.set_bytes("orders:a", b"1".to_vec()).await.unwrap();
		storage.set_bytes("orders:b", b"2".to_vec()).await.unwrap();
		storage.set_bytes("listings:c", b"3".to_vec()).await.unwrap();

		let keys = storage.list_keys("orders:").await.unwrap();
		assert_eq!(keys, vec!["orders:a".to_string(), "orders:b".to_string()]);

		let empty = storage.list_keys("sessions:").await.unwrap();
		assert!(empty.is_empty());
	}

	#[tokio::test]
	async fn test_key_sanitization_stays_under_base() {
		let dir = tempdir().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		storage
			.set_bytes("orders:../escape", b"x".to_vec())
			.await
			.unwrap();
		let keys = storage.list_keys("orders:").await.unwrap();
		assert_eq!(keys.len(), 1);
		assert!(!dir.path().parent().unwrap().join("escape.json").exists());
	}
}
