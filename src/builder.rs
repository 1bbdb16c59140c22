// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fuses `after`/`before` into a single predecessor map.
//!
//! Rules, applied in order:
//! 1. `after = [a, b]` adds `a`, `b` as predecessors of the task; `after =
//!    ["*"]` adds every other task in the final set as a predecessor.
//! 2. `before = [a, b]` adds the task as a predecessor of `a`, `b`;
//!    `before = ["*"]` adds the task as a predecessor of every other task
//!    in the final set, *except* a task that itself carries `before =
//!    ["*"]` (two "run first" tasks don't order against each other).
//! 3. Needs-pruning: drop any task whose `needs` aren't satisfied by the
//!    surviving set, then rebuild the predecessor map restricted to what's
//!    left, repeating until a fixed point (delegated to
//!    [`crate::solver::prune_unmet_needs`]).

use std::collections::{HashMap, HashSet};

use crate::db::TaskDb;
use crate::error::Result;
use crate::solver::prune_unmet_needs;

/// A finalized dependency graph: every surviving task name mapped to the
/// set of task names that must complete before it runs.
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    pub deps: HashMap<String, HashSet<String>>,
}

impl DepGraph {
    #[must_use]
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.deps.keys().map(String::as_str)
    }

    #[must_use]
    pub fn predecessors(&self, name: &str) -> &HashSet<String> {
        static EMPTY: std::sync::OnceLock<HashSet<String>> = std::sync::OnceLock::new();
        self.deps.get(name).unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }
}

/// Builds the final dependency graph over `active`: fuses `after`/`before`
/// (with wildcard handling), then prunes tasks with unmet `needs` to a
/// fixed point, rebuilding the graph over whatever remains.
///
/// # Errors
///
/// [`crate::error::ModprobeError::NotFound`] if `active` names a task not
/// registered in `db`.
pub fn build_deps(db: &TaskDb, active: HashSet<String>) -> Result<DepGraph> {
    let survivors = prune_unmet_needs(db, active)?;
    Ok(DepGraph {
        deps: fuse(db, &survivors)?,
    })
}

pub(crate) fn fuse(db: &TaskDb, set: &HashSet<String>) -> Result<HashMap<String, HashSet<String>>> {
    let mut deps: HashMap<String, HashSet<String>> = set.iter().map(|n| (n.clone(), HashSet::new())).collect();

    // Tasks with `before = ["*"]` are exempt from *receiving* other
    // `before_all` tasks as a predecessor: two run-first tasks don't
    // order against one another.
    let before_all_names: HashSet<String> = {
        let mut names = HashSet::new();
        for name in set {
            if db.get(name)?.before_all {
                names.insert(name.clone());
            }
        }
        names
    };

    for name in set {
        let task = db.get(name)?;

        // Rule 1: after.
        if task.after_all {
            for other in set {
                if other != name {
                    deps.get_mut(name).unwrap().insert(other.clone());
                }
            }
        }
        for pred in &task.after {
            let resolved = db.get(pred)?.name.clone();
            if set.contains(&resolved) {
                deps.get_mut(name).unwrap().insert(resolved);
            }
        }

        // Rule 2: before.
        if task.before_all {
            for other in set {
                if other != name && !before_all_names.contains(other) {
                    deps.get_mut(other).unwrap().insert(name.clone());
                }
            }
        }
        for succ in &task.before {
            let resolved = db.get(succ)?.name.clone();
            if let Some(entry) = deps.get_mut(&resolved) {
                entry.insert(name.clone());
            }
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn after_adds_named_predecessors() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("a", vec![]).build());
        db.add(Task::module_load("b", vec![]).after(["a"]).build());

        let graph = build_deps(&db, set(&["a", "b"])).unwrap();
        assert_eq!(graph.predecessors("b"), &set(&["a"]));
        assert!(graph.predecessors("a").is_empty());
    }

    #[test]
    fn before_adds_self_as_successors_predecessor() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("a", vec![]).before(["b"]).build());
        db.add(Task::module_load("b", vec![]).build());

        let graph = build_deps(&db, set(&["a", "b"])).unwrap();
        assert_eq!(graph.predecessors("b"), &set(&["a"]));
    }

    #[test]
    fn after_all_orders_behind_every_other_task() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("a", vec![]).build());
        db.add(Task::module_load("b", vec![]).build());
        db.add(Task::module_load("finalize", vec![]).after(["*"]).build());

        let graph = build_deps(&db, set(&["a", "b", "finalize"])).unwrap();
        assert_eq!(graph.predecessors("finalize"), &set(&["a", "b"]));
    }

    #[test]
    fn before_all_does_not_order_against_another_before_all_task() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("early1", vec![]).before(["*"]).build());
        db.add(Task::module_load("early2", vec![]).before(["*"]).build());
        db.add(Task::module_load("main", vec![]).build());

        let graph = build_deps(&db, set(&["early1", "early2", "main"])).unwrap();
        assert_eq!(graph.predecessors("main"), &set(&["early1", "early2"]));
        assert!(graph.predecessors("early1").is_empty());
        assert!(graph.predecessors("early2").is_empty());
    }

    #[test]
    fn after_and_before_resolve_through_provides_alias() {
        // "disk" is the current provider of "store"; referencing the
        // service alias in `after`/`before` must resolve to disk's
        // canonical name.
        let mut db = TaskDb::new();
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());
        db.add(Task::module_load("b", vec![]).after(["store"]).build());
        db.add(Task::module_load("c", vec![]).before(["store"]).build());

        let graph = build_deps(&db, set(&["disk", "b", "c"])).unwrap();
        assert_eq!(graph.predecessors("b"), &set(&["disk"]));
        assert_eq!(graph.predecessors("disk"), &set(&["c"]));
    }

    #[test]
    fn needs_pruning_runs_before_fusing_and_drops_dependents_transitively() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("b", vec![]).needs(["a"]).build());
        db.add(Task::module_load("c", vec![]).needs(["b"]).after(["b"]).build());

        let graph = build_deps(&db, set(&["b", "c"])).unwrap();
        assert!(graph.deps.is_empty());
    }
}
