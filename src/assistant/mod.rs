// src/assistant/mod.rs

//! Remote assistant queries.
//!
//! A query is a `(script, question)` pair answered by a remote model,
//! completely independent of any running session: each query is its own
//! Tokio task, several may be in flight at once, and a failing or slow query
//! can never disturb a streaming run.
//!
//! - [`client`] defines the `AssistantClient` seam the dispatcher talks to.
//!   Production uses [`HttpAssistantClient`]; tests substitute a fake.
//! - [`dispatcher`] owns query ids, prompt construction, the per-query
//!   timeout and cancellation, and delivers exactly one [`AssistantResult`]
//!   per dispatched query.

pub mod client;
pub mod dispatcher;

pub use client::{AssistantClient, AssistantError, HttpAssistantClient};
pub use dispatcher::{AssistantResult, QueryDispatcher, QueryHandle, QueryId};
