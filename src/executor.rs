// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Runs a [`DepGraph`] with bounded parallelism, best-effort on failure.
//!
//! There's no crate here playing the role of Python's
//! `graphlib.TopologicalSorter`; the frontier bookkeeping below (an
//! in-degree count per node, draining as predecessors finish) is the
//! direct Rust equivalent, driven by a `tokio::task::JoinSet` capped at
//! `max_concurrency` in-flight tasks.

use std::collections::HashMap;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::builder::DepGraph;
use crate::context::Context;
use crate::db::TaskDb;
use crate::error::{ModprobeError, Result};
use crate::task::{Task, TaskBody};

/// One task's wall-clock timing, captured separately from the `Task`
/// record itself so the hot path never takes a lock to record it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    pub name: String,
    pub starttime: f64,
    pub duration: f64,
}

/// The outcome of a run: which tasks failed (in one-line diagnostic
/// form) and per-task timing, sorted by start time.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub failures: Vec<String>,
    pub timings: Vec<TimingRecord>,
}

impl RunReport {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

type JoinOutcome = (String, f64, f64, Result<(), ModprobeError>);

/// Drives a finalized [`DepGraph`] to completion.
pub struct Executor {
    max_concurrency: usize,
}

impl Executor {
    #[must_use]
    pub const fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: if max_concurrency == 0 { 1 } else { max_concurrency },
        }
    }

    /// Detects cycles, then runs every node in `graph`, invoking each
    /// task's body through `ctx`. A task whose predecessor failed still
    /// runs: this executor is best-effort, not fail-fast.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::Cycle`] if `graph` is not a DAG. [`ModprobeError::NotFound`]
    /// if a node names a task absent from `db`.
    pub async fn run(&self, db: &TaskDb, graph: &DepGraph, ctx: &Context) -> Result<RunReport> {
        detect_cycle(graph)?;

        let t0 = Instant::now();
        let mut indegree: HashMap<String, usize> = graph
            .nodes()
            .map(|n| (n.to_string(), graph.predecessors(n).len()))
            .collect();

        // successors[p] = nodes that have p as a predecessor.
        let mut successors: HashMap<String, Vec<String>> =
            graph.nodes().map(|n| (n.to_string(), Vec::new())).collect();
        for node in graph.nodes() {
            for pred in graph.predecessors(node) {
                successors.entry(pred.clone()).or_default().push(node.to_string());
            }
        }

        let mut ready: Vec<String> = indegree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(name, _)| name.clone())
            .collect();

        let mut report = RunReport::default();
        let mut join_set: JoinSet<JoinOutcome> = JoinSet::new();
        let mut in_flight = 0usize;

        loop {
            while in_flight < self.max_concurrency {
                let Some(name) = ready.pop() else { break };
                let task = db.get(&name)?;
                let ctx = ctx.clone();
                let start = t0.elapsed().as_secs_f64();
                join_set.spawn(async move {
                    let began = Instant::now();
                    let outcome = run_body(&task, ctx).await;
                    (name, start, began.elapsed().as_secs_f64(), outcome)
                });
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            in_flight -= 1;

            let (name, starttime, duration, outcome) =
                joined.map_err(|e| ModprobeError::task_failure("executor", e.to_string()))?;
            report.timings.push(TimingRecord {
                name: name.clone(),
                starttime,
                duration,
            });
            if let Err(err) = outcome {
                report.failures.push(err.failure_line());
            }

            for succ in successors.get(&name).into_iter().flatten() {
                let count = indegree.get_mut(succ).expect("successor must be in indegree map");
                *count -= 1;
                if *count == 0 {
                    ready.push(succ.clone());
                }
            }
        }

        report
            .timings
            .sort_by(|a, b| a.starttime.partial_cmp(&b.starttime).unwrap_or(std::cmp::Ordering::Equal));
        Ok(report)
    }
}

async fn run_body(task: &Task, ctx: Context) -> Result<(), ModprobeError> {
    match &task.body {
        TaskBody::Code(f) => f(ctx)
            .await
            .map_err(|e| ModprobeError::task_failure(task.name.clone(), e.to_string())),
        TaskBody::ModuleLoad { args } => {
            let mut full_args = args.clone();
            full_args.extend(ctx.getopts(&task.name, &task.provides));
            ctx.broker()
                .module_load(&task.name, full_args)
                .await
                .map_err(|e| ModprobeError::task_failure(task.name.clone(), e.to_string()))
        }
        TaskBody::ModuleRemove => ctx.broker().module_remove(&task.name).await.or_else(|err| {
            if matches!(err, ModprobeError::NotFound(_)) {
                Ok(())
            } else {
                Err(ModprobeError::task_failure(task.name.clone(), err.to_string()))
            }
        }),
    }
}

/// Kahn's algorithm over in-degrees, purely to detect a cycle before any
/// task body runs.
fn detect_cycle(graph: &DepGraph) -> Result<()> {
    let mut indegree: HashMap<&str, usize> = graph.nodes().map(|n| (n, graph.predecessors(n).len())).collect();
    let mut successors: HashMap<&str, Vec<&str>> = graph.nodes().map(|n| (n, Vec::new())).collect();
    for node in graph.nodes() {
        for pred in graph.predecessors(node) {
            successors.entry(pred.as_str()).or_default().push(node);
        }
    }

    let mut queue: Vec<&str> = indegree.iter().filter(|(_, &c)| c == 0).map(|(n, _)| *n).collect();
    let mut visited = 0usize;
    while let Some(node) = queue.pop() {
        visited += 1;
        for succ in successors.get(node).into_iter().flatten() {
            let count = indegree.get_mut(succ).unwrap();
            *count -= 1;
            if *count == 0 {
                queue.push(succ);
            }
        }
    }

    if visited != indegree.len() {
        let stuck: Vec<String> = indegree
            .into_iter()
            .filter(|(_, c)| *c > 0)
            .map(|(n, _)| n.to_string())
            .collect();
        return Err(ModprobeError::Cycle(stuck).into());
    }
    Ok(())
}
