// src/config/validate.rs

use crate::config::model::{CatalogFile, RawCatalogFile};
use crate::errors::{Result, ScriptdeckError};

impl TryFrom<RawCatalogFile> for CatalogFile {
    type Error = crate::errors::ScriptdeckError;

    fn try_from(raw: RawCatalogFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_catalog(&raw)?;
        Ok(CatalogFile::new_unchecked(raw))
    }
}

fn validate_raw_catalog(cat: &RawCatalogFile) -> Result<()> {
    validate_engine_config(cat)?;
    validate_interpreter_envs(cat)?;
    validate_scripts(cat)?;
    validate_assistant(cat)?;
    Ok(())
}

fn validate_engine_config(cat: &RawCatalogFile) -> Result<()> {
    if cat.config.event_capacity == 0 {
        return Err(ScriptdeckError::ConfigError(
            "[config].event_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_interpreter_envs(cat: &RawCatalogFile) -> Result<()> {
    for (name, env) in cat.interpreter_env.iter() {
        if env.path.trim().is_empty() {
            return Err(ScriptdeckError::ConfigError(format!(
                "interpreter_env '{name}' has an empty `path`"
            )));
        }
    }
    Ok(())
}

fn validate_scripts(cat: &RawCatalogFile) -> Result<()> {
    for (id, script) in cat.script.iter() {
        if script.path.trim().is_empty() {
            return Err(ScriptdeckError::ConfigError(format!(
                "script '{id}' has an empty `path`"
            )));
        }

        if script.interpreter.is_some() && script.interpreter_env.is_some() {
            return Err(ScriptdeckError::ConfigError(format!(
                "script '{id}' sets both `interpreter` and `interpreter_env`; pick one"
            )));
        }

        if let Some(env_name) = &script.interpreter_env {
            if !cat.interpreter_env.contains_key(env_name) {
                return Err(ScriptdeckError::ConfigError(format!(
                    "script '{id}' references unknown interpreter_env '{env_name}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_assistant(cat: &RawCatalogFile) -> Result<()> {
    if cat.assistant.timeout_secs == 0 {
        return Err(ScriptdeckError::ConfigError(
            "[assistant].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if cat.assistant.api_key_env.trim().is_empty() {
        return Err(ScriptdeckError::ConfigError(
            "[assistant].api_key_env must not be empty".to_string(),
        ));
    }
    Ok(())
}
