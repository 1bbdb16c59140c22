// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! [`Modprobe`]: the orchestrator tying the task database, context,
//! solver, builder, executor and removal planner together.
//!
//! ```text
//! register tasks/modules --> run setup hooks --> drain pending loads
//!        --> solve() --> build_deps() --> Executor::run()
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::broker::Broker;
use crate::builder::{self, DepGraph};
use crate::catalogue::load_catalogue_file;
use crate::context::Context;
use crate::db::TaskDb;
use crate::error::{ModprobeError, Result};
use crate::executor::{Executor, RunReport};
use crate::removal::plan_removal;
use crate::solver::solve;
use crate::task::Task;
use crate::timing::{PhaseTimer, TimingEntry, TimingSink, TIMING_KVS_KEY};

type SetupHook = Box<dyn FnOnce(&Context) -> Result<()> + Send>;

/// One node of a [`Modprobe::requires_tree`] result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepTree {
    pub name: String,
    /// Empty if `name` was elided as an already-visited repeat.
    pub children: Vec<DepTree>,
}

/// `ancestors` guards against a `requires` cycle recursing forever
/// regardless of `full`; `seen` additionally elides repeats anywhere
/// earlier in the tree (not just on the current path) unless `full` is set.
fn build_tree(
    db: &TaskDb,
    name: &str,
    full: bool,
    ancestors: &mut HashSet<String>,
    seen: &mut HashSet<String>,
) -> Result<DepTree> {
    let task = db.get(name)?;
    if ancestors.contains(&task.name) || (!full && seen.contains(&task.name)) {
        return Ok(DepTree {
            name: task.name.clone(),
            children: Vec::new(),
        });
    }
    seen.insert(task.name.clone());
    ancestors.insert(task.name.clone());
    let mut children = Vec::new();
    for req in &task.requires {
        children.push(build_tree(db, req, full, ancestors, seen)?);
    }
    ancestors.remove(&task.name);
    Ok(DepTree {
        name: task.name.clone(),
        children,
    })
}

/// Per-run orchestrator. One instance drives one bringup or teardown.
pub struct Modprobe {
    db: Arc<Mutex<TaskDb>>,
    ctx: Context,
    active_tasks: Mutex<Vec<String>>,
    setup_hooks: Mutex<Vec<SetupHook>>,
    timer: Mutex<Option<PhaseTimer>>,
    max_concurrency: usize,
}

impl Modprobe {
    /// `max_concurrency` bounds the executor's worker pool; `timing` enables
    /// phase + per-task timing capture (`FLUX_MODPROBE_TIMING`).
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, max_concurrency: usize, timing: bool) -> Self {
        let db = Arc::new(Mutex::new(TaskDb::new()));
        let ctx = Context::new(broker, Arc::clone(&db));
        Self {
            db,
            ctx,
            active_tasks: Mutex::new(Vec::new()),
            setup_hooks: Mutex::new(Vec::new()),
            timer: Mutex::new(if timing { Some(PhaseTimer::start()) } else { None }),
            max_concurrency,
        }
    }

    /// The shared run context, for callers constructing code task closures.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// Registers `task` in the database without activating it.
    pub fn add_task(&self, task: Task) {
        self.db.lock().unwrap().add(task);
    }

    /// Registers `task` and adds it to the active set.
    pub fn add_active_task(&self, task: Task) {
        let name = task.name.clone();
        self.add_task(task);
        self.active_tasks.lock().unwrap().push(name);
    }

    /// True if `name` resolves to a registered task/service.
    #[must_use]
    pub fn has_task(&self, name: &str) -> bool {
        self.db.lock().unwrap().contains(name)
    }

    /// Loads a module catalogue file and registers every entry as a task,
    /// recorded under the `configure` timing span.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::catalogue::load_catalogue_file`] parse errors.
    pub fn configure_modules(&self, path: impl AsRef<Path>) -> Result<()> {
        let started = self.timestamp();
        for task in load_catalogue_file(path)? {
            self.add_task(task);
        }
        self.record_phase("configure", started);
        Ok(())
    }

    /// Registers a one-shot setup hook run by [`Self::run_setup_hooks`]
    /// before solving begins.
    pub fn register_setup_hook(&self, hook: impl FnOnce(&Context) -> Result<()> + Send + 'static) {
        self.setup_hooks.lock().unwrap().push(Box::new(hook));
    }

    /// Runs every registered setup hook once, then drains any modules
    /// `Context::load_modules` queued during those hooks into the active set.
    ///
    /// # Errors
    ///
    /// The first hook to return an error aborts the remaining hooks and
    /// propagates that error.
    pub fn run_setup_hooks(&self) -> Result<()> {
        let hooks: Vec<SetupHook> = std::mem::take(&mut self.setup_hooks.lock().unwrap());
        for hook in hooks {
            hook(&self.ctx)?;
        }
        let pending = self.ctx.take_pending();
        self.active_tasks.lock().unwrap().extend(pending.load);
        Ok(())
    }

    /// Activates `modules` by name, failing if any is not a module task.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::NotFound`] if a name is unregistered;
    /// [`ModprobeError::InvalidArgument`] if it resolves to a non-module task.
    pub fn activate_modules(&self, modules: impl IntoIterator<Item = impl Into<String>>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let mut names = Vec::new();
        for module in modules {
            let module = module.into();
            let task = db.get(&module)?;
            if !task.is_module() {
                return Err(ModprobeError::invalid_argument(format!("{module} is not a module")).into());
            }
            names.push(module);
        }
        drop(db);
        self.active_tasks.lock().unwrap().extend(names);
        Ok(())
    }

    /// Every distinct registered task name, sorted (for `show-tasks`).
    #[must_use]
    pub fn canonical_task_names(&self) -> Vec<String> {
        self.db.lock().unwrap().canonical_names()
    }

    /// Activates every registered module task.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::activate_modules`] errors (none expected in
    /// practice, since every name here was already confirmed a module).
    pub fn activate_all_modules(&self) -> Result<()> {
        let module_names: Vec<String> = {
            let db = self.db.lock().unwrap();
            db.canonical_names()
                .into_iter()
                .filter(|name| db.get(name).is_ok_and(|t| t.is_module()))
                .collect()
        };
        self.activate_modules(module_names)
    }

    fn active_snapshot(&self) -> Vec<String> {
        self.active_tasks.lock().unwrap().clone()
    }

    /// Resolves the reachable, enabled subset of the active set, after
    /// needs-pruning. Named `solve` timing span.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::solver::solve`] / needs-pruning `NotFound` errors.
    pub async fn solve_active(&self) -> Result<HashSet<String>> {
        let started = self.timestamp();
        let db = self.db.lock().unwrap();
        let seed = self.active_snapshot();
        let result = solve(&db, &seed, &self.ctx).await?;
        drop(db);
        self.record_phase("solve", started);
        Ok(result)
    }

    /// Builds the final predecessor map over the solved active set without
    /// running anything. Named `deps`
    /// timing span.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::builder::build_deps`] errors.
    pub async fn dependency_map(&self) -> Result<DepGraph> {
        let solved = self.solve_active().await?;
        let started = self.timestamp();
        let db = self.db.lock().unwrap();
        let graph = builder::build_deps(&db, solved)?;
        drop(db);
        self.record_phase("deps", started);
        Ok(graph)
    }

    /// Runs every registered setup hook, solves and builds the dependency
    /// graph over the active set, then drives it through the executor.
    ///
    /// # Errors
    ///
    /// Propagates setup hook, solver, builder, or [`ModprobeError::Cycle`]
    /// errors from the executor's prepare step. A task body failing does
    /// *not* produce an `Err`; see [`RunReport::ok`].
    pub async fn load(&self) -> Result<RunReport> {
        self.run_setup_hooks()?;
        let graph = self.dependency_map().await?;
        let started = self.timestamp();
        let report = {
            let db = self.db.lock().unwrap();
            Executor::new(self.max_concurrency).run(&db, &graph, &self.ctx).await?
        };
        self.record_phase("prepare", started);
        self.record_task_timings(&report);
        Ok(report)
    }

    /// Plans and runs a safe teardown of `requested` modules (or every
    /// loaded module known to the database, if empty).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::removal::plan_removal`] (`NotFound`/`InUse`) and
    /// executor errors.
    pub async fn remove(&self, requested: &[String]) -> Result<RunReport> {
        let plan = {
            let db = self.db.lock().unwrap();
            plan_removal(&db, self.ctx.broker().as_ref(), requested).await?
        };
        let report = Executor::new(self.max_concurrency)
            .run(&plan.db, &plan.graph, &self.ctx)
            .await?;
        self.record_task_timings(&report);
        Ok(report)
    }

    /// Prints the transitive `requires` tree rooted at `name`. Unless `full` is set, a name
    /// that has already appeared elsewhere in the tree is elided (just its
    /// name, no further children) to keep cyclic or diamond-shaped
    /// `requires` graphs finite and readable.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::NotFound`] if `name` or any transitive `requires`
    /// entry is unregistered.
    pub fn requires_tree(&self, name: &str, full: bool) -> Result<DepTree> {
        let db = self.db.lock().unwrap();
        let mut ancestors = HashSet::new();
        let mut seen = HashSet::new();
        build_tree(&db, name, full, &mut ancestors, &mut seen)
    }

    /// Commits the accumulated timing array to `sink`, if timing is enabled
    /// and this process is rank 0.
    pub fn commit_timing(&self, sink: &dyn TimingSink) {
        if self.ctx.rank() != 0 {
            return;
        }
        if let Some(timer) = self.timer.lock().unwrap().take() {
            let entries: Vec<TimingEntry> = timer.into_sorted().iter().map(TimingEntry::from).collect();
            sink.put(TIMING_KVS_KEY, entries);
        }
    }

    fn timestamp(&self) -> f64 {
        self.timer.lock().unwrap().as_ref().map_or(0.0, PhaseTimer::timestamp)
    }

    fn record_phase(&self, name: &str, started_at: f64) {
        if let Some(timer) = self.timer.lock().unwrap().as_mut() {
            timer.record_phase(name, started_at);
        }
    }

    fn record_task_timings(&self, report: &RunReport) {
        if let Some(timer) = self.timer.lock().unwrap().as_mut() {
            timer.record_tasks(&report.timings);
        }
    }
}
