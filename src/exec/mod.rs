// src/exec/mod.rs

//! Process execution layer.
//!
//! This module owns everything that touches the OS process:
//!
//! - [`config`] is the immutable [`RunConfig`] value describing one launch
//!   (interpreter, script, working directory, arguments, environment,
//!   unbuffered output) and its translation into a `tokio::process::Command`.
//! - [`supervisor`] spawns the child with pre-flight validation and provides
//!   graceful termination with forced-kill escalation.
//! - [`stream`] drains stdout and stderr concurrently, decodes them into
//!   ordered, timestamped line events and pushes them to the session's event
//!   channel.
//!
//! Lifecycle orchestration (session states, the active-session map) lives in
//! `manager`; this layer reports back to it via `SessionEvent`s.

pub mod config;
pub mod stream;
pub mod supervisor;

pub use config::RunConfig;
pub use stream::{LineDecoder, LogEvent, StreamKind};
pub use supervisor::{SpawnError, SpawnedProcess, TerminateRequest};
