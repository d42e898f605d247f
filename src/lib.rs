//! Chorewheel: recurring household chores with rotating assignees.
//!
//! # Architecture
//!
//! - **Chores**: due-date arithmetic, assignee rotation and the task
//!   lifecycle (create, update, complete, delete).
//! - **Channels**: Telegram direct messages, group webhooks, connect codes
//!   and the long-poll ingest loop answering bot commands.
//! - **Scheduler**: a daily sweep sending digests of due tasks.
//! - **Store**: persistence contracts with in-memory and SQLite backends.
//!
//! [`runtime::start`] wires the pieces together and spawns the background
//! loops under a single cancellation token.

pub mod channels;
pub mod chores;
pub mod config;
pub mod error;
pub mod runtime;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::ChoreConfig;
pub use error::{ChoreError, Result};
pub use runtime::{ServiceHandle, start};
