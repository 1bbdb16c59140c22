// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The broker RPC contract the core consumes.
//!
//! The broker itself — reconnection, wire transport, the real
//! `module.load`/`module.remove`/`module.list`/`config.reload` RPCs, and
//! broker-attribute/config storage — is an external collaborator. This
//! module only fixes the *shape* of that
//! collaborator as a trait so the planner and executor can be written,
//! tested, and driven against a fake broker without depending on a real
//! one.

use futures_util::future::BoxFuture;

use crate::error::ModprobeResult;

/// One entry of a `module.list` response.
#[derive(Debug, Clone)]
pub struct ModuleListEntry {
    pub name: String,
    pub services: Vec<String>,
}

/// Broker RPC surface consumed by the core.
///
/// Implementations must be safe to call from multiple concurrently
/// spawned tasks; each worker is expected to acquire its *own* handle to
/// talk to the broker rather than share one, so a
/// `Broker` implementation is typically a thin, cheaply cloneable handle
/// (e.g. an `Arc` around a connection pool) rather than a single
/// connection.
pub trait Broker: Send + Sync {
    /// This process's position in the broker overlay.
    fn rank(&self) -> u32;

    /// Reads a broker attribute; `None` if unset.
    fn attr_get<'a>(&'a self, attr: &'a str) -> BoxFuture<'a, Option<String>>;

    /// Reads a configuration key; `None` if unset.
    fn conf_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;

    /// `module.load { path, args }`.
    fn module_load<'a>(&'a self, path: &'a str, args: Vec<String>) -> BoxFuture<'a, ModprobeResult<()>>;

    /// `module.remove { name }`. Callers swallow a [`crate::error::ModprobeError::NotFound`]
    /// result themselves (teardown is idempotent); this method should
    /// return that variant rather than panicking or logging on its own.
    fn module_remove<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ModprobeResult<()>>;

    /// `module.list` — currently loaded modules and the services they provide.
    fn module_list<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<Vec<ModuleListEntry>>>;

    /// `config.reload`.
    fn config_reload<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<()>>;
}
