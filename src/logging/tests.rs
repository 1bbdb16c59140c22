// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{LogContext, LogLevel};

#[test]
fn log_level_from_int_saturates_at_dump() {
    assert_eq!(LogLevel::from_int(0), LogLevel::SILENT);
    assert_eq!(LogLevel::from_int(3), LogLevel::INFO);
    assert_eq!(LogLevel::from_int(5), LogLevel::TRACE);
    assert_eq!(LogLevel::from_int(100), LogLevel::DUMP);
}

#[test]
fn log_level_new_rejects_out_of_range() {
    assert!(LogLevel::new(6).is_ok());
    assert!(LogLevel::new(7).is_err());
}

#[test]
fn log_context_prefix_includes_task_name() {
    let ctx = LogContext::with_task("kvs");
    assert_eq!(ctx.prefix(), "[kvs] ");
    assert_eq!(ctx.task(), Some("kvs"));
}

#[test]
fn log_context_prefix_is_empty_by_default() {
    let ctx = LogContext::default();
    assert_eq!(ctx.prefix(), "");
    assert_eq!(ctx.task(), None);
}
