// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The module catalogue TOML schema and loader, external to
//! the core's public contract but shipped so the crate is exercisable
//! end-to-end.
//!
//! ```text
//! modules.toml
//!   [[modules]]
//!   name = "content-backing"
//!   [[modules]]
//!   name = "content"
//!   requires = ["content-backing"]
//!   after = ["content-backing"]
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{ModprobeError, Result};
use crate::rank::RankPredicate;
use crate::task::Task;

/// One `[[modules]]` table entry. Unknown keys are rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_ranks")]
    pub ranks: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
    #[serde(rename = "requires-attrs", default)]
    pub requires_attrs: Vec<String>,
    #[serde(rename = "requires-config", default)]
    pub requires_config: Vec<String>,
}

fn default_ranks() -> String {
    "all".to_string()
}

/// Top-level shape of a module catalogue TOML file: a `modules` array.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Catalogue {
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl ModuleSpec {
    /// Builds the [`Task`] this catalogue entry describes.
    ///
    /// # Errors
    ///
    /// [`ModprobeError::InvalidArgument`] if `ranks` is not a valid rank expression.
    pub fn into_task(self) -> Result<Task> {
        let ranks = RankPredicate::parse(&self.ranks)?;
        Ok(Task::module_load(self.name, self.args)
            .provides(self.provides)
            .requires(self.requires)
            .needs(self.needs)
            .before(self.before)
            .after(self.after)
            .requires_attrs(self.requires_attrs)
            .requires_config(self.requires_config)
            .ranks(ranks)
            .build())
    }
}

/// Parses a catalogue from a TOML string already read into memory.
///
/// # Errors
///
/// [`ModprobeError::InvalidArgument`] if the TOML is malformed, has an
/// unknown key, or any entry's `ranks` expression is invalid.
pub fn load_catalogue_str(contents: &str) -> Result<Vec<Task>> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(contents, config::FileFormat::Toml))
        .build()
        .map_err(|e| ModprobeError::invalid_argument(e.to_string()))?;
    let catalogue: Catalogue = config
        .try_deserialize()
        .map_err(|e| ModprobeError::invalid_argument(e.to_string()))?;
    catalogue.modules.into_iter().map(ModuleSpec::into_task).collect()
}

/// Loads and parses a single catalogue file.
///
/// # Errors
///
/// Propagates [`load_catalogue_str`] errors, plus an `InvalidArgument` if
/// the file cannot be read.
pub fn load_catalogue_file(path: impl AsRef<Path>) -> Result<Vec<Task>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ModprobeError::invalid_argument(format!("{}: {e}", path.display())))?;
    load_catalogue_str(&contents)
}

/// Directories to additionally scan for `modules.d/*.toml` overlays, drawn
/// from `FLUX_MODPROBE_PATH` (colon-separated).
#[must_use]
pub fn modprobe_path_dirs() -> Vec<std::path::PathBuf> {
    std::env::var("FLUX_MODPROBE_PATH")
        .ok()
        .into_iter()
        .flat_map(|v| v.split(':').map(str::to_string).collect::<Vec<_>>())
        .filter(|s| !s.trim().is_empty())
        .map(std::path::PathBuf::from)
        .collect()
}
