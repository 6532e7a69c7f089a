// src/registry.rs

//! In-memory script registry.
//!
//! Built once from the validated catalog, the registry answers two questions
//! for the rest of the engine:
//!
//! - which scripts exist ([`ScriptEntry`] lookup and iteration), and
//! - how to launch one ([`ScriptRegistry::run_config`], which applies the
//!   defaulting rules: script-local value, then `[default]` section, then
//!   built-in default).
//!
//! It also keeps per-script run bookkeeping (`run_count`, `last_run`) for the
//! lifetime of the process. Entries are immutable during a session.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::CatalogFile;
use crate::errors::{Result, ScriptdeckError};
use crate::exec::RunConfig;
use crate::types::ScriptId;

/// Built-in interpreter fallback when neither the script nor `[default]`
/// names one.
const FALLBACK_INTERPRETER: &str = "python3";

/// One catalogued script.
#[derive(Debug, Clone)]
pub struct ScriptEntry {
    pub id: ScriptId,
    pub display_name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// Session-lifetime run bookkeeping for one script.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub run_count: u64,
    pub last_run: Option<DateTime<Utc>>,
}

/// Launch settings for one script with `[default]` merging already applied.
#[derive(Debug, Clone)]
struct LaunchDefaults {
    /// Interpreter executable, or a virtualenv directory resolved lazily at
    /// launch time.
    interpreter: PathBuf,
    working_dir: Option<PathBuf>,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    unbuffered: bool,
}

/// In-memory catalog of scripts and their launch defaults.
pub struct ScriptRegistry {
    entries: BTreeMap<ScriptId, ScriptEntry>,
    launch: BTreeMap<ScriptId, LaunchDefaults>,
    stats: Mutex<HashMap<ScriptId, RunStats>>,
}

impl ScriptRegistry {
    /// Build the registry from a validated catalog.
    pub fn from_catalog(catalog: &CatalogFile) -> Self {
        let mut entries = BTreeMap::new();
        let mut launch = BTreeMap::new();

        for (id, script) in catalog.script.iter() {
            let path = PathBuf::from(&script.path);
            let display_name = script.name.clone().unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| script.path.clone())
            });

            entries.insert(
                id.clone(),
                ScriptEntry {
                    id: id.clone(),
                    display_name,
                    path,
                    description: script.description.clone(),
                    tags: script.tags.clone(),
                },
            );

            // Interpreter precedence: script-local path, then a named
            // interpreter_env, then [default], then the built-in fallback.
            let interpreter = if let Some(direct) = &script.interpreter {
                PathBuf::from(direct)
            } else if let Some(env_name) = &script.interpreter_env {
                // Validation guarantees the reference resolves.
                PathBuf::from(&catalog.interpreter_env[env_name].path)
            } else if let Some(default) = &catalog.default.interpreter {
                PathBuf::from(default)
            } else {
                PathBuf::from(FALLBACK_INTERPRETER)
            };

            let working_dir = script
                .working_dir
                .clone()
                .or_else(|| catalog.default.working_dir.clone())
                .map(PathBuf::from);

            let unbuffered = script
                .unbuffered
                .or(catalog.default.unbuffered)
                .unwrap_or(true);

            launch.insert(
                id.clone(),
                LaunchDefaults {
                    interpreter,
                    working_dir,
                    args: script.args.clone(),
                    env: script.env.clone(),
                    unbuffered,
                },
            );
        }

        Self {
            entries,
            launch,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ScriptEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the full launch configuration for one script.
    ///
    /// `extra_args` are appended after the script's configured arguments.
    /// When no working directory is configured anywhere, the script's parent
    /// directory is used so relative paths inside the script behave the same
    /// as launching it by hand from there.
    pub fn run_config(&self, id: &str, extra_args: &[String]) -> Result<RunConfig> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ScriptdeckError::UnknownScript(id.to_string()))?;
        let launch = &self.launch[id];

        let interpreter_path = resolve_interpreter(&launch.interpreter)?;

        let working_directory = match &launch.working_dir {
            Some(dir) => dir.clone(),
            None => entry
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let mut arguments = launch.args.clone();
        arguments.extend(extra_args.iter().cloned());

        Ok(RunConfig {
            interpreter_path,
            script_path: entry.path.clone(),
            working_directory,
            arguments,
            environment_overrides: launch.env.clone(),
            unbuffered: launch.unbuffered,
        })
    }

    /// Bump run bookkeeping for a script whose session reached a terminal
    /// state.
    pub fn record_run(&self, id: &str, at: DateTime<Utc>) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let entry = stats.entry(id.to_string()).or_default();
        entry.run_count += 1;
        entry.last_run = Some(at);
    }

    pub fn stats(&self, id: &str) -> RunStats {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.get(id).copied().unwrap_or_default()
    }
}

/// Resolve a configured interpreter path to an executable.
///
/// A directory is treated as a virtualenv root and resolved to its
/// `bin/python` (`Scripts/python.exe` on Windows). Anything else is used
/// as-is; bare names like `python3` are left to PATH lookup at spawn time.
fn resolve_interpreter(configured: &Path) -> Result<PathBuf> {
    if !configured.is_dir() {
        return Ok(configured.to_path_buf());
    }

    let candidate = if cfg!(windows) {
        configured.join("Scripts").join("python.exe")
    } else {
        configured.join("bin").join("python")
    };

    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(ScriptdeckError::ConfigError(format!(
            "interpreter path '{}' is a directory but not a virtualenv (no {})",
            configured.display(),
            candidate.display(),
        )))
    }
}
