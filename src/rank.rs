// modprobe-core: task planner and concurrent executor
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Rank predicates: `all`, an RFC-22-style idset (`"0-3,7"`), or a
//! relational expression (`">0"`, `"<4"`).

use crate::error::{ModprobeError, Result};
use anyhow::Context as _;

/// A predicate tested against the local broker rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankPredicate {
    /// Always true.
    All,
    /// True iff the local rank falls in one of the listed inclusive ranges.
    IdSet(Vec<(u32, u32)>),
    /// True iff the local rank is strictly greater than the bound.
    GreaterThan(u32),
    /// True iff the local rank is strictly less than the bound.
    LessThan(u32),
}

impl RankPredicate {
    /// Parses a rank expression as accepted by the `ranks` task field.
    ///
    /// # Errors
    ///
    /// Returns [`ModprobeError::InvalidArgument`] if `expr` is neither
    /// `"all"`, a valid comma-separated range list, nor a `>N`/`<N` form.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr == "all" {
            return Ok(Self::All);
        }
        if let Some(rest) = expr.strip_prefix('>') {
            let rank: u32 = rest
                .parse()
                .with_context(|| format!("invalid rank condition '{expr}'"))?;
            return Ok(Self::GreaterThan(rank));
        }
        if let Some(rest) = expr.strip_prefix('<') {
            let rank: u32 = rest
                .parse()
                .with_context(|| format!("invalid rank condition '{expr}'"))?;
            return Ok(Self::LessThan(rank));
        }
        let mut ranges = Vec::new();
        for part in expr.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (lo, hi) = match part.split_once('-') {
                Some((lo, hi)) => (
                    lo.parse::<u32>()
                        .map_err(|_| ModprobeError::invalid_argument(format!("bad idset '{expr}'")))?,
                    hi.parse::<u32>()
                        .map_err(|_| ModprobeError::invalid_argument(format!("bad idset '{expr}'")))?,
                ),
                None => {
                    let v = part
                        .parse::<u32>()
                        .map_err(|_| ModprobeError::invalid_argument(format!("bad idset '{expr}'")))?;
                    (v, v)
                }
            };
            if lo > hi {
                return Err(ModprobeError::invalid_argument(format!(
                    "invalid range '{part}' in idset '{expr}'"
                ))
                .into());
            }
            ranges.push((lo, hi));
        }
        if ranges.is_empty() {
            return Err(ModprobeError::invalid_argument(format!("empty idset '{expr}'")).into());
        }
        Ok(Self::IdSet(ranges))
    }

    /// Tests this predicate against a rank.
    #[must_use]
    pub fn test(&self, rank: u32) -> bool {
        match self {
            Self::All => true,
            Self::IdSet(ranges) => ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&rank)),
            Self::GreaterThan(bound) => rank > *bound,
            Self::LessThan(bound) => rank < *bound,
        }
    }
}

impl Default for RankPredicate {
    fn default() -> Self {
        Self::All
    }
}
