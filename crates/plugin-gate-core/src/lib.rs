pub mod config;
pub mod error;
pub mod harness;
pub mod plugin;
pub mod registry;
pub mod scaffold;
pub mod score;
pub mod validate;

pub use config::{Config, ScoreBar, ScoringConfig};
pub use error::{GateError, Result};
pub use harness::{
    E2eReport, E2eRunner, E2eStep, FixtureCase, FixtureReport, FixtureRunner, ScaffoldHandle,
};
pub use plugin::{Author, Category, ComponentKind, ComponentPaths, PluginManifest};
pub use registry::{
    check_marketplace, GenerationReport, MarketplaceCheck, RegistryDocument, RegistryEntry,
    RegistryGenerator, RegistryLock, ENTRY_FIELDS,
};
pub use scaffold::{ScaffoldRequest, Scaffolder, TemplateScaffolder, INITIAL_VERSION};
pub use score::{CategoryScore, ScoreCategory, ScoreReport, Scorer, TOTAL_MAX};
pub use validate::{validate_plugin, ValidationResult, Violation, ViolationKind};
