// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The task database: named entries plus alias lists with tail-selection.
//!
//! ```text
//! tasks["store"] = [mem, disk]   <- disk is current (tail)
//! set_alternative("store", "mem") -> tasks["store"] = [disk, mem]
//! disable("store")                -> every provider under "store" is disabled,
//!                                    by canonical name, visible through any alias
//! ```
//!
//! `disabled` is tracked out-of-band, keyed by canonical task name, rather
//! than as a field mutated in place on `Task`: the same task is reachable
//! through several independent alias lists (its own name plus each
//! `provides` entry), and `disable()`/`set_alternative()` must be visible
//! no matter which list a later `get()` walks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModprobeError, Result};
use crate::task::Task;

/// Maps every task name and every `provides` alias to an ordered list of
/// providers; the list's tail is the currently selected provider.
#[derive(Default)]
pub struct TaskDb {
    entries: HashMap<String, Vec<Arc<Task>>>,
    disabled: HashMap<String, bool>,
}

impl TaskDb {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            disabled: HashMap::new(),
        }
    }

    /// Appends `task` under its own name and under each of its `provides` aliases.
    pub fn add(&mut self, task: Task) {
        if task.disabled {
            self.disabled.insert(task.name.clone(), true);
        }
        let task = Arc::new(task);
        self.entries
            .entry(task.name.clone())
            .or_default()
            .push(Arc::clone(&task));
        for alias in &task.provides {
            if *alias == task.name {
                continue;
            }
            self.entries.entry(alias.clone()).or_default().push(Arc::clone(&task));
        }
    }

    /// Returns the currently selected provider for `service`, with the
    /// out-of-band `disabled` override (if any) applied.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::NotFound`] if there is no entry, or its list is empty.
    pub fn get(&self, service: &str) -> Result<Arc<Task>> {
        let task = self
            .entries
            .get(service)
            .and_then(|list| list.last())
            .cloned()
            .ok_or_else(|| ModprobeError::not_found(service))?;

        if self.disabled.get(&task.name).copied().unwrap_or(false) && !task.disabled {
            let mut overridden = (*task).clone();
            overridden.disabled = true;
            return Ok(Arc::new(overridden));
        }
        Ok(task)
    }

    /// True if `service` has at least one registered provider.
    #[must_use]
    pub fn contains(&self, service: &str) -> bool {
        self.entries.get(service).is_some_and(|l| !l.is_empty())
    }

    /// Rotates the provider named `name` to the tail of `service`'s list,
    /// making it current. If `name` is `None`, disables the service instead.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::NotFound`] if no provider named `name` exists under `service`.
    pub fn set_alternative(&mut self, service: &str, name: Option<&str>) -> Result<()> {
        let Some(name) = name else {
            self.disable(service);
            return Ok(());
        };
        let list = self
            .entries
            .get_mut(service)
            .ok_or_else(|| ModprobeError::not_found(service))?;
        let index = list
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| ModprobeError::not_found(format!("no module {name} provides {service}")))?;
        let entry = list.remove(index);
        list.push(entry);
        Ok(())
    }

    /// Marks every provider registered under `service` as disabled.
    pub fn disable(&mut self, service: &str) {
        if let Some(list) = self.entries.get(service) {
            for task in list {
                self.disabled.insert(task.name.clone(), true);
            }
        }
    }

    /// True iff any currently-selected, non-disabled task among `names`
    /// has `target` as its name or one of its `provides`.
    #[must_use]
    pub fn any_provides(&self, names: &[String], target: &str) -> bool {
        names.iter().filter_map(|n| self.get(n).ok()).any(|task| {
            !task.disabled && (task.name == target || task.provides.iter().any(|p| p == target))
        })
    }

    /// Iterates every distinct key currently registered in the database
    /// (task names and aliases alike).
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every distinct canonical task name (`task.name`, not alias keys),
    /// for surfaces like `show-tasks` that want one row per task rather
    /// than one per alias.
    #[must_use]
    pub fn canonical_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .flatten()
            .map(|task| task.name.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn module(name: &str) -> Task {
        Task::module_load(name, vec![]).build()
    }

    #[test]
    fn tail_selection_picks_last_added() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("mem", vec![]).provides(["store"]).build());
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());

        assert_eq!(db.get("store").unwrap().name, "disk");
    }

    #[test]
    fn set_alternative_rotates_named_provider_to_tail() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("mem", vec![]).provides(["store"]).build());
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());

        db.set_alternative("store", Some("mem")).unwrap();
        assert_eq!(db.get("store").unwrap().name, "mem");
    }

    #[test]
    fn set_alternative_unknown_provider_is_not_found() {
        let mut db = TaskDb::new();
        db.add(module("mem"));
        let err = db.set_alternative("store", Some("mem")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ModprobeError>(),
            Some(ModprobeError::NotFound(_))
        ));
    }

    #[test]
    fn disable_is_visible_through_every_alias() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("mem", vec![]).provides(["store"]).build());
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());

        db.disable("store");
        assert!(db.get("store").unwrap().disabled);
        // Same providers are still disabled when looked up by their own name.
        assert!(db.get("mem").unwrap().disabled);
        assert!(db.get("disk").unwrap().disabled);

        db.set_alternative("store", Some("mem")).unwrap();
        assert!(db.get("store").unwrap().disabled);
    }

    #[test]
    fn any_provides_checks_name_and_aliases() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());
        db.add(module("other"));

        assert!(db.any_provides(&["disk".to_string()], "store"));
        assert!(!db.any_provides(&["other".to_string()], "store"));
    }

    #[test]
    fn get_missing_is_not_found() {
        let db = TaskDb::new();
        assert!(db.get("nope").is_err());
    }

    #[test]
    fn canonical_names_dedupes_aliases_and_sorts() {
        let mut db = TaskDb::new();
        db.add(Task::module_load("disk", vec![]).provides(["store"]).build());
        db.add(module("kvs"));

        assert_eq!(db.canonical_names(), vec!["disk".to_string(), "kvs".to_string()]);
    }
}
