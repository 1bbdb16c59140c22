// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! An in-process [`Broker`] implementation for the demo binary. Not part
//! of the library surface: this module is declared only by `main.rs`,
//! never by `lib.rs`.
//!
//! Loaded-module state is persisted to a small JSON file so that separate
//! `load`/`rc1` and `remove`/`rc3` process invocations agree on what is
//! currently loaded, the way a real Flux broker would remember across
//! `modprobe` invocations even though each invocation is its own process.
//! Broker attributes and config keys are seeded from the environment
//! (`MODPROBE_DEMO_ATTR_<KEY>` / `MODPROBE_DEMO_CONFIG_<KEY>`), since the
//! demo has no real attribute/config store to query.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use modprobe_core::broker::{Broker, ModuleListEntry};
use modprobe_core::error::{ModprobeError, ModprobeResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    loaded: Vec<PersistedModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedModule {
    name: String,
    services: Vec<String>,
}

struct LocalBrokerState {
    loaded: Vec<ModuleListEntry>,
}

/// In-memory broker backed by a state file on disk, plus environment-seeded
/// attributes/config.
pub struct LocalBroker {
    rank: u32,
    state_file: PathBuf,
    state: Mutex<LocalBrokerState>,
    attrs: HashMap<String, String>,
    config: HashMap<String, String>,
}

impl LocalBroker {
    /// Loads prior state from `state_file` if it exists (a fresh process's
    /// first `rc1`/`load` starts from an empty loaded set).
    pub fn open(rank: u32, state_file: PathBuf) -> Self {
        let loaded = std::fs::read_to_string(&state_file)
            .ok()
            .and_then(|text| serde_json::from_str::<PersistedState>(&text).ok())
            .map(|state| {
                state
                    .loaded
                    .into_iter()
                    .map(|m| ModuleListEntry {
                        name: m.name,
                        services: m.services,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            rank,
            state_file,
            state: Mutex::new(LocalBrokerState { loaded }),
            attrs: env_map("MODPROBE_DEMO_ATTR_"),
            config: env_map("MODPROBE_DEMO_CONFIG_"),
        }
    }

    fn persist(&self, loaded: &[ModuleListEntry]) {
        let state = PersistedState {
            loaded: loaded
                .iter()
                .map(|m| PersistedModule {
                    name: m.name.clone(),
                    services: m.services.clone(),
                })
                .collect(),
        };
        if let Ok(text) = serde_json::to_string_pretty(&state) {
            let _ = std::fs::write(&self.state_file, text);
        }
    }
}

/// Collects `<PREFIX><UPPER_KEY>=value` environment variables into a
/// lower-kebab-cased key map, e.g. `MODPROBE_DEMO_CONFIG_SCHED_ENABLE=1`
/// becomes the config key `sched-enable`.
fn env_map(prefix: &str) -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(k, v)| {
            k.strip_prefix(prefix)
                .map(|rest| (rest.to_lowercase().replace('_', "-"), v))
        })
        .collect()
}

impl Broker for LocalBroker {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn attr_get<'a>(&'a self, attr: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { self.attrs.get(attr).cloned() })
    }

    fn conf_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { self.config.get(key).cloned() })
    }

    fn module_load<'a>(&'a self, path: &'a str, _args: Vec<String>) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.loaded.iter().any(|m| m.name == path) {
                state.loaded.push(ModuleListEntry {
                    name: path.to_string(),
                    services: Vec::new(),
                });
            }
            self.persist(&state.loaded);
            Ok(())
        })
    }

    fn module_remove<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let before = state.loaded.len();
            state.loaded.retain(|m| m.name != name);
            if state.loaded.len() == before {
                return Err(ModprobeError::not_found(name));
            }
            self.persist(&state.loaded);
            Ok(())
        })
    }

    fn module_list<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<Vec<ModuleListEntry>>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().loaded.clone()) })
    }

    fn config_reload<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
