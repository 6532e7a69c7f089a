// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{CatalogFile, RawCatalogFile};
use crate::errors::Result;

/// Load a catalog file from a given path and return the raw `RawCatalogFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (interpreter_env references, etc.). Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawCatalogFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let catalog: RawCatalogFile = toml::from_str(&contents)?;

    Ok(catalog)
}

/// Load a catalog file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - empty script paths,
///   - conflicting or dangling interpreter settings,
///   - basic engine config sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<CatalogFile> {
    let raw = load_from_path(&path)?;
    let catalog = CatalogFile::try_from(raw)?;
    Ok(catalog)
}

/// Default catalog path: `ScriptDeck.toml` in the current working directory.
pub fn default_catalog_path() -> PathBuf {
    PathBuf::from("ScriptDeck.toml")
}
