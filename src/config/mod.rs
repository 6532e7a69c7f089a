// src/config/mod.rs

//! Catalog configuration: TOML model, loading and validation.
//!
//! The catalog file describes which scripts exist and how to launch them.
//! Deserialization produces a [`RawCatalogFile`]; semantic validation turns
//! it into a [`CatalogFile`] via `TryFrom`, which is what the rest of the
//! crate consumes.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_catalog_path, load_and_validate, load_from_path};
pub use model::{
    AssistantSection, CatalogFile, ConfigSection, DefaultSection, InterpreterEnv,
    RawCatalogFile, ScriptConfig,
};
