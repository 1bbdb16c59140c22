// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI surface for the demo binary: the command-line surfaces treated as
//! external collaborators (`rc1`, `rc3`, `load`, `remove`, `list-dependencies`,
//! `show-tasks`) plus `--show-deps`/`--full` introspection flags.
//!
//! # Command Structure
//!
//! ```text
//! modprobe-demo [global options] <command>
//! rc1 <catalogue.toml>
//! rc3
//! load [module...] [--show-deps]
//! remove [module...]
//! list-dependencies <name> [--full]
//! show-tasks
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Global options shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Console log level (0=silent, 1=errors, ..., 6=dump).
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=6))]
    pub log_level: Option<u8>,

    /// Path to a log file; if unset, only console output is produced.
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Bounds the executor's worker pool.
    #[arg(long = "max-concurrency", value_name = "N", default_value_t = 8)]
    pub max_concurrency: usize,

    /// Enables phase + per-task timing, committed to the timing sink on exit.
    #[arg(long = "timing")]
    pub timing: bool,

    /// Module catalogue TOML file consulted by `load`, `remove`,
    /// `list-dependencies` and `show-tasks` (ignored by `rc1`, which takes
    /// its own catalogue argument, and by `rc3`, which only tears down
    /// whatever the broker reports loaded).
    #[arg(long = "catalogue", value_name = "FILE")]
    pub catalogue: Option<PathBuf>,

    /// Path the demo's in-process broker persists its loaded-module state
    /// to, so a `load` and a later `remove` invocation (separate process
    /// runs) agree on what is loaded.
    #[arg(long = "state-file", value_name = "FILE", default_value = "modprobe-demo-state.json")]
    pub state_file: PathBuf,

    /// This process's broker rank, for the demo's in-process broker.
    #[arg(long = "rank", default_value_t = 0)]
    pub rank: u32,
}

#[derive(Debug, Parser)]
#[command(
    name = "modprobe-demo",
    author,
    version,
    about = "Demo driver for the modprobe task planner and executor"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs rc1-equivalent bringup: loads a catalogue, then activates and
    /// runs every module.
    Rc1(Rc1Args),

    /// Runs rc3-equivalent teardown: removes every currently loaded module
    /// known to the catalogue.
    Rc3,

    /// Loads (activates and runs) specific modules, or every catalogued
    /// module if none are named.
    Load(LoadArgs),

    /// Safely tears down specific modules, or every loaded module if none
    /// are named.
    Remove(RemoveArgs),

    /// Prints the transitive `requires` tree for a module.
    #[command(name = "list-dependencies")]
    ListDependencies(ListDependenciesArgs),

    /// Lists every task/module name currently registered.
    #[command(name = "show-tasks")]
    ShowTasks,
}

#[derive(Debug, Args)]
pub struct Rc1Args {
    /// Path to the module catalogue TOML file.
    pub catalogue: PathBuf,

    /// Prints the resolved predecessor graph instead of running it.
    #[arg(long = "show-deps")]
    pub show_deps: bool,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Modules to activate; every catalogued module if empty.
    pub modules: Vec<String>,

    /// Prints the resolved predecessor graph instead of running it.
    #[arg(long = "show-deps")]
    pub show_deps: bool,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Modules to tear down; every loaded module if empty.
    pub modules: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ListDependenciesArgs {
    /// Task/module name to root the tree at.
    pub name: String,

    /// Includes already-visited nodes again at each occurrence, instead of
    /// eliding repeats the first time a name reappears.
    #[arg(long)]
    pub full: bool,
}

/// Parses command-line arguments.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses command-line arguments from an iterator, for tests and embedding.
pub fn parse_from<I, T>(iter: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::parse_from(iter)
}
