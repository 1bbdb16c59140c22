// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The [`Task`] record and its body variants.
//!
//! ```text
//! Task
//!  |-- name, provides, requires, needs
//!  |-- after / before (+ wildcard "*" bit)
//!  |-- ranks, requires_attrs, requires_config, disabled
//!  '-- body: Code(closure) | ModuleLoad(args) | ModuleRemove
//! ```
//!
//! `body` is a tagged variant rather than a trait object hierarchy: avoid
//! deep inheritance, the `Task` record carries the same metadata fields
//! regardless of body kind.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::error::Result;
use crate::rank::RankPredicate;

/// A function invoked with the run [`Context`]. Boxed and cloneable so a
/// `Task` can be freely shared across the `TaskDb`'s alias lists without
/// re-registering the closure.
pub type CodeFn = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// The three body kinds a task may have.
#[derive(Clone)]
pub enum TaskBody {
    /// Invoke an injected function with the [`Context`].
    Code(CodeFn),
    /// Load a module via `module.load`, with catalogue-declared base args.
    ModuleLoad { args: Vec<String> },
    /// Remove a module via `module.remove`.
    ModuleRemove,
}

impl std::fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(_) => write!(f, "Code(..)"),
            Self::ModuleLoad { args } => f.debug_struct("ModuleLoad").field("args", args).finish(),
            Self::ModuleRemove => write!(f, "ModuleRemove"),
        }
    }
}

/// A uniquely named unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub needs: Vec<String>,
    /// Concrete predecessor names from `after =`. Does not include the `*` sentinel.
    pub after: Vec<String>,
    /// `after = ["*"]` was given: must run after every other task in the final set.
    pub after_all: bool,
    /// Concrete successor names from `before =`.
    pub before: Vec<String>,
    /// `before = ["*"]` was given: must run before every other task (subject
    /// to the mutual-exclusion rule in the builder).
    pub before_all: bool,
    pub ranks: RankPredicate,
    pub requires_attrs: Vec<String>,
    pub requires_config: Vec<String>,
    pub disabled: bool,
    pub body: TaskBody,
}

impl Task {
    /// Starts building a task named `name` with a code body.
    #[must_use]
    pub fn code(name: impl Into<String>, f: CodeFn) -> TaskBuilder {
        TaskBuilder::new(name.into(), TaskBody::Code(f))
    }

    /// Starts building a module-load task.
    #[must_use]
    pub fn module_load(name: impl Into<String>, args: Vec<String>) -> TaskBuilder {
        TaskBuilder::new(name.into(), TaskBody::ModuleLoad { args })
    }

    /// True if this task is a module (load or remove body), as opposed to a code task.
    #[must_use]
    pub const fn is_module(&self) -> bool {
        matches!(self.body, TaskBody::ModuleLoad { .. } | TaskBody::ModuleRemove)
    }

    /// Produces the teardown counterpart of this task:
    /// body becomes `ModuleRemove`, `before`/`after` (and their wildcard
    /// bits) are swapped, and `needs`/`requires` are cleared since they
    /// don't apply during removal.
    #[must_use]
    pub fn as_removal(&self) -> Self {
        Self {
            name: self.name.clone(),
            provides: self.provides.clone(),
            requires: Vec::new(),
            needs: Vec::new(),
            after: self.before.clone(),
            after_all: self.before_all,
            before: self.after.clone(),
            before_all: self.after_all,
            ranks: self.ranks.clone(),
            requires_attrs: self.requires_attrs.clone(),
            requires_config: self.requires_config.clone(),
            disabled: self.disabled,
            body: TaskBody::ModuleRemove,
        }
    }
}

/// Fluent builder for [`Task`], mirroring the optional-field grab-bag of
/// a task registration decorator and the module TOML table.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    fn new(name: String, body: TaskBody) -> Self {
        Self {
            task: Task {
                name,
                provides: Vec::new(),
                requires: Vec::new(),
                needs: Vec::new(),
                after: Vec::new(),
                after_all: false,
                before: Vec::new(),
                before_all: false,
                ranks: RankPredicate::All,
                requires_attrs: Vec::new(),
                requires_config: Vec::new(),
                disabled: false,
                body,
            },
        }
    }

    #[must_use]
    pub fn provides(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.task.provides = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn requires(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.task.requires = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn needs(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.task.needs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets `after`. The sentinel `"*"` is pulled out into `after_all`.
    #[must_use]
    pub fn after(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let (all, rest) = split_wildcard(names);
        self.task.after_all = all;
        self.task.after = rest;
        self
    }

    /// Sets `before`. The sentinel `"*"` is pulled out into `before_all`.
    #[must_use]
    pub fn before(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let (all, rest) = split_wildcard(names);
        self.task.before_all = all;
        self.task.before = rest;
        self
    }

    #[must_use]
    pub fn ranks(mut self, ranks: RankPredicate) -> Self {
        self.task.ranks = ranks;
        self
    }

    #[must_use]
    pub fn requires_attrs(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.task.requires_attrs = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn requires_config(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.task.requires_config = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.task.disabled = disabled;
        self
    }

    #[must_use]
    pub fn build(self) -> Task {
        self.task
    }
}

fn split_wildcard(names: impl IntoIterator<Item = impl Into<String>>) -> (bool, Vec<String>) {
    let mut all = false;
    let mut rest = Vec::new();
    for name in names {
        let name = name.into();
        if name == "*" {
            all = true;
        } else {
            rest.push(name);
        }
    }
    (all, rest)
}
