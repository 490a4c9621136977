//! Registry trait for self-registering backend implementations.
//!
//! Each pluggable module (storage, identity) provides a Registry struct per
//! implementation that declares its configuration name and factory function.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a Registry struct that implements
/// this trait, so that every backend declares the name it is referenced by in
/// configuration files together with a factory that can construct it.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// for example "memory" for storage.implementations.memory.
	const NAME: &'static str;

	/// The factory function type this implementation provides. Each module
	/// defines its own factory type (e.g. StorageFactory, IdentityFactory).
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
