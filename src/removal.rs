// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The removal planner: inverts the graph to compute a safe teardown order
//! and refuses to unload a module something else still depends on.
//!
//! Reverse-dependency safety is computed over `requires` edges among
//! *currently loaded* modules, not the `after`/`before` load-order graph
//! the builder (`crate::builder`) fuses for scheduling: `requires` is what
//! expresses "X cannot function without Y",
//! while `after`/`before` only encode relative run order. See DESIGN.md for
//! the full reasoning, including why this planner does not auto-expand a
//! requested removal set to "orphaned" modules a naive transitive walk
//! would pull in.

use std::collections::{HashMap, HashSet};

use crate::broker::Broker;
use crate::builder::{self, DepGraph};
use crate::db::TaskDb;
use crate::error::{ModprobeError, Result};
use crate::task::Task;

/// The result of planning a removal: a scratch [`TaskDb`] holding the
/// removal-variant tasks (see [`Task::as_removal`]) plus any included
/// teardown code tasks, and the predecessor graph to drive them with.
pub struct RemovalPlan {
    pub db: TaskDb,
    pub graph: DepGraph,
}

/// Plans a safe removal of `requested` module/task names (or every loaded
/// module known to the database, if `requested` is empty).
///
/// # Errors
///
/// [`ModprobeError::NotFound`] if an explicitly requested name is neither a
/// currently loaded module nor a registered task. [`ModprobeError::InUse`]
/// if removing a requested module would leave a live dependent dangling.
pub async fn plan_removal(db: &TaskDb, broker: &dyn Broker, requested: &[String]) -> Result<RemovalPlan> {
    let loaded = broker.module_list().await?;

    let mut service_map: HashMap<String, String> = HashMap::new();
    for entry in &loaded {
        service_map.insert(entry.name.clone(), entry.name.clone());
        for service in &entry.services {
            service_map.insert(service.clone(), entry.name.clone());
        }
    }

    let known_loaded: Vec<String> = loaded
        .iter()
        .map(|entry| entry.name.clone())
        .filter(|name| db.contains(name))
        .collect();

    let mut module_targets: Vec<String> = Vec::new();
    let mut extra_tasks: Vec<String> = Vec::new();

    if requested.is_empty() {
        module_targets = known_loaded.clone();
    } else {
        for name in requested {
            if let Some(canonical) = service_map.get(name) {
                if known_loaded.contains(canonical) {
                    module_targets.push(canonical.clone());
                } else {
                    return Err(ModprobeError::not_found(format!("module {name} is not loaded")).into());
                }
            } else if db.contains(name) {
                extra_tasks.push(name.clone());
            } else {
                return Err(ModprobeError::not_found(name.clone()).into());
            }
        }
    }

    // Reverse-dependency map over `requires`: rdeps[x] = set of loaded
    // modules that require x.
    let mut rdeps: HashMap<String, HashSet<String>> =
        known_loaded.iter().map(|n| (n.clone(), HashSet::new())).collect();
    for name in &known_loaded {
        let task = db.get(name)?;
        for req in &task.requires {
            let resolved = db.get(req)?.name.clone();
            if let Some(set) = rdeps.get_mut(&resolved) {
                set.insert(name.clone());
            }
        }
    }

    let target: HashSet<String> = module_targets.iter().cloned().collect();
    for name in &module_targets {
        let dependents = &rdeps[name];
        let live: Vec<String> = dependents.iter().filter(|d| !target.contains(*d)).cloned().collect();
        if !live.is_empty() {
            return Err(ModprobeError::InUse {
                name: name.clone(),
                dependents: live,
            }
            .into());
        }
    }

    let mut removal_db = TaskDb::new();
    for name in &target {
        removal_db.add(db.get(name)?.as_removal());
    }
    for name in &extra_tasks {
        removal_db.add(extend_teardown_task(db.get(name)?.as_ref(), &target, db)?);
    }

    let full_set: HashSet<String> = target.iter().cloned().chain(extra_tasks.iter().cloned()).collect();
    let graph = DepGraph {
        deps: builder::fuse(&removal_db, &full_set)?,
    };

    Ok(RemovalPlan { db: removal_db, graph })
}

/// A teardown task distinct from the modules being removed keeps its
/// explicit `after` entries that still resolve into `removed`; if it had
/// none, every removed module becomes a predecessor so it only runs once
/// teardown is complete.
fn extend_teardown_task(task: &Task, removed: &HashSet<String>, db: &TaskDb) -> Result<Task> {
    let mut extended = task.clone();
    extended.requires.clear();
    extended.needs.clear();

    if task.after.is_empty() && !task.after_all {
        extended.after = removed.iter().cloned().collect();
    } else {
        let mut kept = Vec::new();
        for name in &task.after {
            let resolved = db.get(name)?.name.clone();
            if removed.contains(&resolved) {
                kept.push(resolved);
            }
        }
        extended.after = kept;
    }
    Ok(extended)
}
