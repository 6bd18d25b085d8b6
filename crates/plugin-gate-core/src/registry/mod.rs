//! Registry Module
//!
//! - `types`: registry document (marketplace.json) model
//! - `generator`: scan, validate, aggregate, atomic write
//! - `lock`: advisory lock callers wrap generation in
//! - `check`: verify a published document against the plugin trees

pub mod check;
pub mod generator;
pub mod lock;
pub mod types;

pub use check::{check_marketplace, MarketplaceCheck};
pub use generator::{write_atomic, GenerationReport, RegistryGenerator, ENTRY_FIELDS};
pub use lock::RegistryLock;
pub use types::{PluginSource, RegistryDocument, RegistryEntry, RegistryOwner, StructuredSource};
