// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::ConcurrentRunPolicy;

/// Top-level catalog as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// concurrent_runs = "deny"
/// terminate_grace_ms = 3000
///
/// [default]
/// interpreter = "python3"
/// unbuffered = true
///
/// [interpreter_env.ml]
/// path = "/home/me/venvs/ml"
///
/// [script.train]
/// path = "scripts/train.py"
/// interpreter_env = "ml"
/// args = ["--epochs", "10"]
///
/// [script.train.env]
/// CUDA_VISIBLE_DEVICES = "0"
///
/// [assistant]
/// model = "gpt-4o-mini"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCatalogFile {
    /// Engine behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Launch defaults from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// Named interpreter environments from `[interpreter_env.<name>]`.
    #[serde(default)]
    pub interpreter_env: BTreeMap<String, InterpreterEnv>,

    /// All scripts from `[script.<id>]`.
    ///
    /// Keys are the script ids used by `start`/`status` and the CLI.
    #[serde(default)]
    pub script: BTreeMap<String, ScriptConfig>,

    /// Remote assistant settings from `[assistant]`.
    #[serde(default)]
    pub assistant: AssistantSection,
}

/// Validated catalog. Construct via `CatalogFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub interpreter_env: BTreeMap<String, InterpreterEnv>,
    pub script: BTreeMap<String, ScriptConfig>,
    pub assistant: AssistantSection,
}

impl CatalogFile {
    /// Build a `CatalogFile` without running validation.
    ///
    /// Only `validate.rs` should call this, after the raw catalog passed all
    /// checks.
    pub(crate) fn new_unchecked(raw: RawCatalogFile) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            interpreter_env: raw.interpreter_env,
            script: raw.script,
            assistant: raw.assistant,
        }
    }
}

/// `[config]` section: engine-level behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// `"deny"` (default) or `"allow"`: whether a script may have more than
    /// one live session at a time.
    #[serde(default)]
    pub concurrent_runs: ConcurrentRunPolicy,

    /// Grace period between the polite stop signal and the forced kill,
    /// in milliseconds.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,

    /// Capacity of each session's event channel. A full channel blocks the
    /// stream readers instead of dropping lines.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_terminate_grace_ms() -> u64 {
    3000
}

fn default_event_capacity() -> usize {
    256
}

impl ConfigSection {
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrent_runs: ConcurrentRunPolicy::default(),
            terminate_grace_ms: default_terminate_grace_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// `[default]` section: launch defaults applied to scripts that do not
/// override them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Default interpreter; falls back to `"python3"` when absent.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Default working directory. When neither this nor the script sets one,
    /// the script's parent directory is used.
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Default unbuffered-output behaviour; if `None`, the global default is
    /// `true` (real-time line display needs unbuffered children).
    #[serde(default)]
    pub unbuffered: Option<bool>,
}

/// `[interpreter_env.<name>]` section.
///
/// `path` may point either at an interpreter executable or at a virtualenv
/// directory; directories are resolved to their `bin/python` at launch time.
#[derive(Debug, Clone, Deserialize)]
pub struct InterpreterEnv {
    pub path: String,
}

/// `[script.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// Path to the script file.
    pub path: String,

    /// Display name; defaults to the file name of `path`.
    #[serde(default)]
    pub name: Option<String>,

    /// Free-form description, shown by `--list`.
    #[serde(default)]
    pub description: Option<String>,

    /// Free-form tags, shown by `--list`.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Interpreter executable for this script. Mutually exclusive with
    /// `interpreter_env`.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Name of an `[interpreter_env.<name>]` entry to run under. Mutually
    /// exclusive with `interpreter`.
    #[serde(default)]
    pub interpreter_env: Option<String>,

    /// Arguments passed after the script path, in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variable overrides; overrides win over the inherited
    /// environment on key collision.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory override.
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Unbuffered-output override.
    #[serde(default)]
    pub unbuffered: Option<bool>,
}

/// `[assistant]` section: settings for the remote assistant collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSection {
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model name override.
    #[serde(default = "default_model")]
    pub model: String,

    /// Chat-completions endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Network timeout for one query, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl AssistantSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
