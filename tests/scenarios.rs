// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end scenarios driven through the public `Modprobe` orchestrator
//! and a small in-memory fake broker.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use modprobe_core::broker::{Broker, ModuleListEntry};
use modprobe_core::db::TaskDb;
use modprobe_core::error::ModprobeResult;
use modprobe_core::modprobe::Modprobe;
use modprobe_core::task::Task;

/// A broker that tracks loaded modules in memory and can be told to fail
/// `module.load` for specific names.
struct FakeBroker {
    loaded: Mutex<Vec<ModuleListEntry>>,
    fail_load: Vec<String>,
}

impl FakeBroker {
    fn new() -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            fail_load: Vec::new(),
        }
    }

    fn preloaded(names: &[&str]) -> Self {
        Self {
            loaded: Mutex::new(
                names
                    .iter()
                    .map(|n| ModuleListEntry {
                        name: (*n).to_string(),
                        services: vec![],
                    })
                    .collect(),
            ),
            fail_load: Vec::new(),
        }
    }

    fn failing(names: &[&str]) -> Self {
        Self {
            loaded: Mutex::new(Vec::new()),
            fail_load: names.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

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

    fn module_load<'a>(&'a self, path: &'a str, _args: Vec<String>) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async move {
            if self.fail_load.iter().any(|n| n == path) {
                return Err(modprobe_core::error::ModprobeError::Rpc {
                    topic: "module.load".to_string(),
                    message: "boom".to_string(),
                });
            }
            self.loaded.lock().unwrap().push(ModuleListEntry {
                name: path.to_string(),
                services: vec![],
            });
            Ok(())
        })
    }

    fn module_remove<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async move {
            let mut loaded = self.loaded.lock().unwrap();
            let before = loaded.len();
            loaded.retain(|m| m.name != name);
            if loaded.len() == before {
                return Err(modprobe_core::error::ModprobeError::not_found(name));
            }
            Ok(())
        })
    }

    fn module_list<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<Vec<ModuleListEntry>>> {
        Box::pin(async { Ok(self.loaded.lock().unwrap().clone()) })
    }

    fn config_reload<'a>(&'a self) -> BoxFuture<'a, ModprobeResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn code(name: &str) -> modprobe_core::task::TaskBuilder {
    Task::code(name, Arc::new(|_ctx| Box::pin(async { Ok(()) })))
}

fn noop_code(name: &str) -> Task {
    code(name).build()
}

// S1 - Linear chain: A, B.after=[A], C.after=[B]. Expected order A, B, C,
// with strictly increasing starttimes.
#[tokio::test]
async fn s1_linear_chain_runs_in_order() {
    let broker = Arc::new(FakeBroker::new());
    let mp = Modprobe::new(broker, 4, false);

    mp.add_active_task(noop_code("a"));
    mp.add_active_task(code("b").after(["a"]).build());
    mp.add_active_task(code("c").after(["b"]).build());

    let report = mp.load().await.unwrap();
    assert!(report.ok());

    let order: Vec<&str> = report.timings.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    for pair in report.timings.windows(2) {
        assert!(pair[0].starttime < pair[1].starttime);
    }
}

// S2 - Wildcard bracket: init.before=["*"], finalize.after=["*"]. init must
// complete before A/B start; A/B must complete before finalize starts.
#[tokio::test]
async fn s2_wildcard_bracket_orders_init_before_and_finalize_after() {
    let broker = Arc::new(FakeBroker::new());
    let mp = Modprobe::new(broker, 4, false);

    mp.add_active_task(code("init").before(["*"]).build());
    mp.add_active_task(noop_code("a"));
    mp.add_active_task(noop_code("b"));
    mp.add_active_task(code("finalize").after(["*"]).build());

    let report = mp.load().await.unwrap();
    assert!(report.ok());

    let end = |name: &str| -> f64 {
        let r = report.timings.iter().find(|t| t.name == name).unwrap();
        r.starttime + r.duration
    };
    let start = |name: &str| -> f64 { report.timings.iter().find(|t| t.name == name).unwrap().starttime };

    assert!(end("init") <= start("a"));
    assert!(end("init") <= start("b"));
    assert!(end("a") <= start("finalize"));
    assert!(end("b") <= start("finalize"));
}

// S3 - Alternative selection over the `store` service.
#[tokio::test]
async fn s3_alternative_selection() {
    let mut db = TaskDb::new();
    db.add(Task::module_load("mem", vec![]).provides(["store"]).build());
    db.add(Task::module_load("disk", vec![]).provides(["store"]).build());

    assert_eq!(db.get("store").unwrap().name, "disk");

    db.set_alternative("store", Some("mem")).unwrap();
    assert_eq!(db.get("store").unwrap().name, "mem");

    db.disable("store");
    assert!(db.get("store").unwrap().disabled);
    assert!(!db.any_provides(&["mem".to_string(), "disk".to_string()], "store"));
}

// S4 - Needs pruning: T needs "idx", nothing provides it, T is dropped.
#[tokio::test]
async fn s4_needs_pruning_drops_unsatisfied_task() {
    let broker = Arc::new(FakeBroker::new());
    let mp = Modprobe::new(broker, 4, false);

    mp.add_active_task(code("t").needs(["idx"]).build());

    let report = mp.load().await.unwrap();
    assert!(report.ok());
    assert!(report.timings.iter().all(|t| t.name != "t"));
}

// S5 - Removal safety: kvs.requires=[content], content.requires=[content-backing].
#[tokio::test]
async fn s5_removal_refuses_to_orphan_a_live_dependent() {
    let mut db = TaskDb::new();
    db.add(Task::module_load("kvs", vec![]).requires(["content"]).build());
    db.add(
        Task::module_load("content", vec![])
            .requires(["content-backing"])
            .build(),
    );
    db.add(Task::module_load("content-backing", vec![]).build());

    let broker = FakeBroker::preloaded(&["kvs", "content", "content-backing"]);
    let err = modprobe_core::removal::plan_removal(&db, &broker, &["content-backing".to_string()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("still in use"));
}

#[tokio::test]
async fn s5_removal_of_a_leaf_consumer_succeeds_alone() {
    let mut db = TaskDb::new();
    db.add(Task::module_load("kvs", vec![]).requires(["content"]).build());
    db.add(
        Task::module_load("content", vec![])
            .requires(["content-backing"])
            .build(),
    );
    db.add(Task::module_load("content-backing", vec![]).build());

    let broker = FakeBroker::preloaded(&["kvs", "content", "content-backing"]);
    let plan = modprobe_core::removal::plan_removal(&db, &broker, &["kvs".to_string()])
        .await
        .unwrap();
    let names: Vec<&str> = plan.graph.nodes().collect();
    assert_eq!(names, vec!["kvs"]);
}

// S6 - Best-effort execution: B fails, C.after=[A,B] still runs after both.
#[tokio::test]
async fn s6_best_effort_runs_successor_of_a_failed_predecessor() {
    let broker = Arc::new(FakeBroker::failing(&["b"]));
    let mp = Modprobe::new(broker, 4, false);

    mp.add_task(Task::module_load("a", vec![]).build());
    mp.add_task(Task::module_load("b", vec![]).build());
    mp.add_task(Task::module_load("c", vec![]).after(["a", "b"]).build());
    mp.activate_modules(["a", "b", "c"]).unwrap();

    let report = mp.load().await.unwrap();
    assert!(!report.ok());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0], "b: rpc 'module.load' failed: boom");

    let ran: Vec<&str> = report.timings.iter().map(|t| t.name.as_str()).collect();
    assert!(ran.contains(&"a"));
    assert!(ran.contains(&"b"));
    assert!(ran.contains(&"c"));

    let b_end = {
        let r = report.timings.iter().find(|t| t.name == "b").unwrap();
        r.starttime + r.duration
    };
    let a_end = {
        let r = report.timings.iter().find(|t| t.name == "a").unwrap();
        r.starttime + r.duration
    };
    let c_start = report.timings.iter().find(|t| t.name == "c").unwrap().starttime;
    assert!(b_end <= c_start);
    assert!(a_end <= c_start);
}
