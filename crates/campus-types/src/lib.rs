//! Common types module for the campus delivery system.
//!
//! This module defines the core data types and structures shared across
//! the lifecycle engines, the storage and identity collaborators, and the
//! HTTP API. It provides a centralized location for shared types to ensure
//! consistency across all components.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Exchange listing types including the listing lifecycle status.
pub mod exchange;
/// Identity types for authenticated callers and per-request context.
pub mod identity;
/// Order types including the order lifecycle status.
pub mod order;
/// Registry trait for self-registering backend implementations.
pub mod registry;
/// Secure string type for sensitive configuration values.
pub mod secret_string;
/// Storage types for managing persistent data.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use exchange::*;
pub use identity::*;
pub use order::*;
pub use registry::*;
pub use secret_string::*;
pub use storage::*;
pub use validation::*;
