// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-run shared state passed to every task body.
//!
//! ```text
//! Context (Arc-backed, Clone is cheap)
//!   |-- broker: Arc<dyn Broker>        per-run RPC handle
//!   |-- data: Mutex<Map>               set()/get() scratch state
//!   |-- module_args: Mutex<Map>        setopt()/getopts() accumulation
//!   '-- db: Arc<Mutex<TaskDb>>         set_alternative() during setup hooks
//! ```
//!
//! By convention `data` and `module_args` are written during
//! single-threaded setup hooks and then read-mostly during parallel
//! execution; a task that needs to mutate them concurrently with peers
//! must order itself with `after`. The mutexes here only guard against
//! undefined behavior, not against a caller racing itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::broker::Broker;
use crate::db::TaskDb;
use crate::error::Result;

/// Modules/tasks enqueued by a task body via `load_modules`/`remove_modules`
/// before the graph is finalized.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingActivation {
    pub(crate) load: Vec<String>,
    pub(crate) remove: Option<Vec<String>>,
}

struct ContextInner {
    broker: Arc<dyn Broker>,
    db: Arc<Mutex<TaskDb>>,
    data: Mutex<HashMap<String, Value>>,
    module_args: Mutex<HashMap<String, Vec<String>>>,
    pending: Mutex<PendingActivation>,
}

/// Cheaply cloneable handle to per-run shared state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new(broker: Arc<dyn Broker>, db: Arc<Mutex<TaskDb>>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                broker,
                db,
                data: Mutex::new(HashMap::new()),
                module_args: Mutex::new(HashMap::new()),
                pending: Mutex::new(PendingActivation::default()),
            }),
        }
    }

    /// This process's broker rank.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.inner.broker.rank()
    }

    /// Access to the broker RPC handle, for task bodies that need more
    /// than the convenience methods below.
    #[must_use]
    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.inner.broker
    }

    /// Sets arbitrary data at `key` for later retrieval by other tasks.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.data.lock().unwrap().insert(key.into(), value);
    }

    /// Gets data previously set by another task, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.lock().unwrap().get(key).cloned()
    }

    /// Reads a broker attribute, or `default` if unset.
    pub async fn attr_get(&self, attr: &str, default: Option<String>) -> Option<String> {
        self.inner.broker.attr_get(attr).await.or(default)
    }

    /// Reads a broker config key, or `default` if unset.
    pub async fn conf_get(&self, key: &str, default: Option<String>) -> Option<String> {
        self.inner.broker.conf_get(key).await.or(default)
    }

    /// Appends `option` to the CLI-style argument list accumulated for `module`.
    pub fn setopt(&self, module: impl Into<String>, option: impl Into<String>) {
        self.inner
            .module_args
            .lock()
            .unwrap()
            .entry(module.into())
            .or_default()
            .push(option.into());
    }

    /// Returns accumulated options for `name`, plus for every name in `also`,
    /// plus any `FLUX_MODPROBE_MODULE_<NAME>_ARGS_APPEND` override for `name`
    /// itself.
    #[must_use]
    pub fn getopts(&self, name: &str, also: &[String]) -> Vec<String> {
        let args = self.inner.module_args.lock().unwrap();
        let mut result = Vec::new();
        if let Some(v) = args.get(name) {
            result.extend(v.iter().cloned());
        }
        for other in also {
            if let Some(v) = args.get(other) {
                result.extend(v.iter().cloned());
            }
        }
        result.extend(env_args_append(name));
        result
    }

    /// Requests that `modules` be added to the active set before the graph
    /// is finalized.
    pub fn load_modules(&self, modules: impl IntoIterator<Item = impl Into<String>>) {
        self.inner
            .pending
            .lock()
            .unwrap()
            .load
            .extend(modules.into_iter().map(Into::into));
    }

    /// Requests removal of `modules` (or every loaded module known to the
    /// DB, if `None`) the next time a teardown run is planned.
    pub fn remove_modules(&self, modules: Option<Vec<String>>) {
        self.inner.pending.lock().unwrap().remove = Some(modules.unwrap_or_default());
    }

    /// Forces the alternative for `name` to `alternative` (or disables it
    /// if `alternative` is `None`). Must be called before solving begins.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::ModprobeError::NotFound`]/`InvalidArgument`
    /// from the underlying `TaskDb::set_alternative`.
    pub fn set_alternative(&self, name: &str, alternative: Option<&str>) -> Result<()> {
        self.inner.db.lock().unwrap().set_alternative(name, alternative)
    }

    pub(crate) fn take_pending(&self) -> PendingActivation {
        std::mem::take(&mut self.inner.pending.lock().unwrap())
    }
}

/// Reads `FLUX_MODPROBE_MODULE_<UPPER_UNDERSCORE_NAME>_ARGS_APPEND` for
/// `module` and splits it on commas.
fn env_args_append(module: &str) -> Vec<String> {
    let var = format!(
        "FLUX_MODPROBE_MODULE_{}_ARGS_APPEND",
        module.replace('-', "_").to_uppercase()
    );
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => value.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ModuleListEntry;
    use futures_util::future::BoxFuture;

    struct FakeBroker;
    impl Broker for FakeBroker {
        fn rank(&self) -> u32 {
            0
        }
        fn attr_get<'a>(&'a self, _attr: &'a str) -> BoxFuture<'a, Option<String>> {
            Box::pin(async { None })
        }
        fn conf_get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Option<String>> {
            Box::pin(async { None })
        }
        fn module_load<'a>(
            &'a self,
            _path: &'a str,
            _args: Vec<String>,
        ) -> BoxFuture<'a, crate::error::ModprobeResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn module_remove<'a>(&'a self, _name: &'a str) -> BoxFuture<'a, crate::error::ModprobeResult<()>> {
            Box::pin(async { Ok(()) })
        }
        fn module_list<'a>(&'a self) -> BoxFuture<'a, crate::error::ModprobeResult<Vec<ModuleListEntry>>> {
            Box::pin(async { Ok(vec![]) })
        }
        fn config_reload<'a>(&'a self) -> BoxFuture<'a, crate::error::ModprobeResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn ctx() -> Context {
        Context::new(Arc::new(FakeBroker), Arc::new(Mutex::new(TaskDb::new())))
    }

    #[test]
    fn data_roundtrips() {
        let ctx = ctx();
        ctx.set("k", Value::from(42));
        assert_eq!(ctx.get("k"), Some(Value::from(42)));
        assert_eq!(ctx.get("missing"), None);
    }

    #[test]
    fn getopts_merges_module_and_also_list() {
        let ctx = ctx();
        ctx.setopt("kvs", "-o");
        ctx.setopt("kvs", "foo");
        ctx.setopt("content", "-v");

        let opts = ctx.getopts("kvs", &["content".to_string()]);
        assert_eq!(opts, vec!["-o", "foo", "-v"]);
    }

    #[test]
    fn getopts_includes_env_var_append_for_primary_name_only() {
        // SAFETY: test-local env var, no other test reads this key.
        unsafe {
            std::env::set_var("FLUX_MODPROBE_MODULE_KVS_ARGS_APPEND", "-o,max-rpc=64");
        }
        let ctx = ctx();
        ctx.setopt("kvs", "-v");
        let opts = ctx.getopts("kvs", &["content".to_string()]);
        unsafe {
            std::env::remove_var("FLUX_MODPROBE_MODULE_KVS_ARGS_APPEND");
        }
        assert_eq!(opts, vec!["-v", "-o", "max-rpc=64"]);
    }

    #[test]
    fn load_modules_and_remove_modules_queue_pending() {
        let ctx = ctx();
        ctx.load_modules(["extra"]);
        ctx.remove_modules(Some(vec!["gone".to_string()]));

        let pending = ctx.take_pending();
        assert_eq!(pending.load, vec!["extra".to_string()]);
        assert_eq!(pending.remove, Some(vec!["gone".to_string()]));
        // Draining clears it for the next read.
        assert!(ctx.take_pending().load.is_empty());
    }
}
