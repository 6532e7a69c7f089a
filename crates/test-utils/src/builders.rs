#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scriptdeck::exec::RunConfig;

/// Write a shell script into `dir` and return its path.
///
/// The file is plain text run via `sh <path>`, so no exec bit is needed.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("failed to write test script");
    path
}

/// Builder for `RunConfig` to simplify test setup.
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// A config that runs `script` through `/bin/sh`, with the script's
    /// parent directory as working directory.
    pub fn shell(script: impl Into<PathBuf>) -> Self {
        let script: PathBuf = script.into();
        let working_directory = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config: RunConfig {
                interpreter_path: PathBuf::from("/bin/sh"),
                script_path: script,
                working_directory,
                arguments: vec![],
                environment_overrides: BTreeMap::new(),
                unbuffered: false,
            },
        }
    }

    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.interpreter_path = path.into();
        self
    }

    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = path.into();
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.config.arguments.push(arg.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config
            .environment_overrides
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn unbuffered(mut self, val: bool) -> Self {
        self.config.unbuffered = val;
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}
