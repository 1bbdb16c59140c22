// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling for the task planner and executor.
//!
//! ```text
//!             ModprobeError
//!                   |
//!   +------+--------+--------+------+------+
//!   |      |        |        |      |      |
//!   v      v        v        v      v      v
//! NotFound Invalid  Cycle   InUse  TaskFail Rpc
//!  Arg     Argument
//! ```
//!
//! `NotFound`, `InvalidArgument`, `Cycle` and `InUse` are structural: they
//! abort the run before any task body executes. `TaskFailure` and `Rpc`
//! are recoverable at the run level — a failing task does not stop its
//! unrelated siblings (see `executor`).

use thiserror::Error;

/// Convenience alias for the crate's fallible operations.
pub type Result<T> = anyhow::Result<T>;

/// Result type using the typed [`ModprobeError`].
pub type ModprobeResult<T> = std::result::Result<T, ModprobeError>;

/// Structural and task-level errors produced by the planner and executor.
#[derive(Debug, Error)]
pub enum ModprobeError {
    /// Unknown task/service name, or a dangling reference in `after`/`before`/`requires`.
    #[error("no such task or module '{0}'")]
    NotFound(String),

    /// Bad rank expression, unknown TOML key, duplicate registration, bad `provides` target.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A dependency cycle was detected before any task body ran.
    #[error("dependency cycle detected among tasks: {0:?}")]
    Cycle(Vec<String>),

    /// Removal would leave a live module's dependents dangling.
    #[error("{name} still in use by {}", .dependents.join(", "))]
    InUse {
        name: String,
        dependents: Vec<String>,
    },

    /// A task body raised; captured so the run can continue best-effort.
    #[error("{name}: {message}")]
    TaskFailure { name: String, message: String },

    /// A broker RPC failed outside of the idempotent-remove case.
    #[error("rpc '{topic}' failed: {message}")]
    Rpc { topic: String, message: String },
}

impl ModprobeError {
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn task_failure(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailure {
            name: name.into(),
            message: message.into(),
        }
    }

    /// One-line diagnostic in `"<name>: <error>"` form, suitable for a run
    /// summary's failure list.
    #[must_use]
    pub fn failure_line(&self) -> String {
        match self {
            Self::TaskFailure { name, message } => format!("{name}: {message}"),
            other => other.to_string(),
        }
    }
}
