// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::exec::SpawnError;
use crate::types::{ScriptId, SessionId};

#[derive(Error, Debug)]
pub enum ScriptdeckError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown script: {0}")]
    UnknownScript(ScriptId),

    #[error("Script '{0}' already has a live session")]
    AlreadyRunning(ScriptId),

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ScriptdeckError>;
