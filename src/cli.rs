// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scriptdeck`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptdeck",
    version,
    about = "Catalog scripts, run them as subprocesses and stream their output live.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the script catalog file (TOML).
    ///
    /// Default: `ScriptDeck.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "ScriptDeck.toml")]
    pub catalog: String,

    /// List catalogued scripts and exit.
    ///
    /// This is also the default action when no `--script` is given.
    #[arg(long)]
    pub list: bool,

    /// Run the script with this catalog id.
    #[arg(long, value_name = "ID")]
    pub script: Option<String>,

    /// Extra argument appended after the script's configured arguments.
    ///
    /// May be given multiple times; order is preserved.
    #[arg(long = "arg", value_name = "ARG")]
    pub args: Vec<String>,

    /// Ask the remote assistant a question about the selected script.
    ///
    /// Requires `--script`. When combined with a run, the query is dispatched
    /// alongside the running session and the answer is printed whenever it
    /// arrives.
    #[arg(long, value_name = "QUESTION")]
    pub ask: Option<String>,

    /// Resolve and print the launch command line, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTDECK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
