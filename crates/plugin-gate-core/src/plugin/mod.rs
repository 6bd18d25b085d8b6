//! Plugin Module
//!
//! - `manifest`: typed `.claude-plugin/plugin.json` model
//! - `schema`: draft-07 schema validation of raw manifests

pub mod manifest;
pub mod schema;

pub use manifest::{
    is_kebab_case, Author, Category, ComponentKind, ComponentPaths, DeclaredPath, PluginManifest,
    PLUGIN_DIR, PLUGIN_JSON,
};
pub use schema::{check_manifest_slice, check_manifest_value};
