// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Whether a task is enabled for the current run.

use crate::context::Context;
use crate::task::Task;

/// Returns `false` if the task is explicitly disabled, its rank predicate
/// rejects the local rank, or any required config key/broker attribute is
/// absent or empty. The broker is queried lazily, once per key, and only
/// as far as needed to short-circuit.
pub async fn enabled(task: &Task, ctx: &Context) -> bool {
    if task.disabled {
        return false;
    }
    if !task.ranks.test(ctx.rank()) {
        return false;
    }
    for key in &task.requires_config {
        match ctx.conf_get(key, None).await {
            Some(v) if !v.is_empty() => {}
            _ => return false,
        }
    }
    for attr in &task.requires_attrs {
        match ctx.attr_get(attr, None).await {
            Some(v) if !v.is_empty() => {}
            _ => return false,
        }
    }
    true
}
