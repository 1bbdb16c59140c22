// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The dependency solver: reachability over `requires` plus enable
//! filtering, and the `needs`-pruning fixed point.

use std::collections::{HashSet, VecDeque};

use crate::context::Context;
use crate::db::TaskDb;
use crate::error::Result;
use crate::predicates::enabled;

/// Walks `requires` edges breadth-first from `seed`, returning the set of
/// canonical task names that are both reachable and enabled.
///
/// Disabled tasks still contribute their `requires` to the walk (their
/// transitive requirements may satisfy a `needs` elsewhere through
/// `provides`), they just don't appear in the returned set themselves.
///
/// # Errors
///
/// [`crate::error::ModprobeError::NotFound`] if `seed` or any transitive
/// `requires` entry names an unregistered task/service.
pub async fn solve(db: &TaskDb, seed: &[String], ctx: &Context) -> Result<HashSet<String>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut result = HashSet::new();
    let mut queue: VecDeque<String> = seed.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if visited.contains(&name) {
            continue;
        }
        visited.insert(name.clone());

        let task = db.get(&name)?;
        if enabled(&task, ctx).await {
            result.insert(task.name.clone());
        }
        for req in &task.requires {
            if !visited.contains(req) {
                queue.push_back(req.clone());
            }
        }
    }

    Ok(result)
}

/// Repeatedly removes any task in `tasks` whose `needs` are not satisfied
/// by the remaining set, until a fixed point is reached.
///
/// # Errors
///
/// [`crate::error::ModprobeError::NotFound`] if a surviving task names an
/// unregistered task in `needs`.
pub fn prune_unmet_needs(db: &TaskDb, mut tasks: HashSet<String>) -> Result<HashSet<String>> {
    loop {
        let snapshot: Vec<String> = tasks.iter().cloned().collect();
        let mut to_remove = Vec::new();

        for name in &snapshot {
            let task = db.get(name)?;
            for need in &task.needs {
                if !db.any_provides(&snapshot, need) {
                    to_remove.push(name.clone());
                    break;
                }
            }
        }

        if to_remove.is_empty() {
            return Ok(tasks);
        }
        for name in to_remove {
            tasks.remove(&name);
        }
    }
}
