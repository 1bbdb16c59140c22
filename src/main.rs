// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Demo driver for `modprobe_core`: wires the library's
//! solver/builder/executor/removal-planner to an in-process [`LocalBroker`]
//! so the crate is exercisable end to end without a real Flux broker.
//!
//! ```text
//! cli::parse() --> init_logging --> LocalBroker::open --> Modprobe
//!        --> rc1 | rc3 | load | remove | list-dependencies | show-tasks
//! ```

mod local_broker;

use std::process::ExitCode;
use std::sync::Arc;

use mimalloc::MiMalloc;

use modprobe_core::cli::{self, Command};
use modprobe_core::error::Result;
use modprobe_core::logging::{LogConfig, LogLevel, init_logging};
use modprobe_core::modprobe::{DepTree, Modprobe};
use modprobe_core::timing::{TimingEntry, TimingSink};

use local_broker::LocalBroker;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let log_config = build_log_config(&cli);
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_log_config(cli: &cli::Cli) -> LogConfig {
    let console_level = cli
        .global
        .log_level
        .and_then(LogLevel::from_u8)
        .unwrap_or(LogLevel::INFO);

    LogConfig::builder()
        .with_console_level(console_level)
        .with_file_level(console_level)
        .maybe_with_log_file(cli.global.log_file.as_ref().map(|p| p.display().to_string()))
        .build()
}

/// A run's exit code is 0 iff every executed task succeeded.
fn exit_code_for(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

async fn dispatch(cli: &cli::Cli) -> Result<ExitCode> {
    let broker = Arc::new(LocalBroker::open(cli.global.rank, cli.global.state_file.clone()));
    let mp = Modprobe::new(broker, cli.global.max_concurrency, cli.global.timing);

    let code = match &cli.command {
        Command::Rc1(args) => {
            mp.configure_modules(&args.catalogue)?;
            mp.activate_all_modules()?;
            run_or_show_deps(&mp, args.show_deps).await?
        }
        Command::Rc3 => {
            load_catalogue_if_given(&mp, cli)?;
            run_removal(&mp, &[]).await?
        }
        Command::Load(args) => {
            load_catalogue_if_given(&mp, cli)?;
            if args.modules.is_empty() {
                mp.activate_all_modules()?;
            } else {
                mp.activate_modules(args.modules.clone())?;
            }
            run_or_show_deps(&mp, args.show_deps).await?
        }
        Command::Remove(args) => {
            load_catalogue_if_given(&mp, cli)?;
            run_removal(&mp, &args.modules).await?
        }
        Command::ListDependencies(args) => {
            load_catalogue_if_given(&mp, cli)?;
            let tree = mp.requires_tree(&args.name, args.full)?;
            print_tree(&tree, 0);
            ExitCode::SUCCESS
        }
        Command::ShowTasks => {
            load_catalogue_if_given(&mp, cli)?;
            for name in mp.canonical_task_names() {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
    };

    mp.commit_timing(&PrintTimingSink);
    Ok(code)
}

fn load_catalogue_if_given(mp: &Modprobe, cli: &cli::Cli) -> Result<()> {
    if let Some(path) = &cli.global.catalogue {
        mp.configure_modules(path)?;
    }
    Ok(())
}

async fn run_or_show_deps(mp: &Modprobe, show_deps: bool) -> Result<ExitCode> {
    if show_deps {
        let graph = mp.dependency_map().await?;
        let mut names: Vec<&str> = graph.nodes().collect();
        names.sort_unstable();
        for name in names {
            let mut preds: Vec<&str> = graph.predecessors(name).iter().map(String::as_str).collect();
            preds.sort_unstable();
            println!("{name}: [{}]", preds.join(", "));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = mp.load().await?;
    for failure in &report.failures {
        eprintln!("{failure}");
    }
    Ok(exit_code_for(report.ok()))
}

async fn run_removal(mp: &Modprobe, modules: &[String]) -> Result<ExitCode> {
    let report = mp.remove(modules).await?;
    for failure in &report.failures {
        eprintln!("{failure}");
    }
    Ok(exit_code_for(report.ok()))
}

fn print_tree(tree: &DepTree, depth: usize) {
    println!("{}{}", "  ".repeat(depth), tree.name);
    for child in &tree.children {
        print_tree(child, depth + 1);
    }
}

/// Prints the committed timing array as JSON.
struct PrintTimingSink;

impl TimingSink for PrintTimingSink {
    fn put(&self, key: &str, entries: Vec<TimingEntry>) {
        match serde_json::to_string(&entries) {
            Ok(json) => println!("{key}: {json}"),
            Err(e) => eprintln!("failed to serialize timing entries: {e}"),
        }
    }
}
