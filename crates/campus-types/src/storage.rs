//! Storage-related types for the campus delivery system.

/// Storage keys for the document collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Collection of food-delivery orders.
	Orders,
	/// Collection of exchange listings.
	Listings,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Listings => "listings",
		}
	}
}
