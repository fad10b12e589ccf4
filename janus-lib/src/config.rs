// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Engine configuration, read from a TOML file. Every option has a
//! default so an empty configuration is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ExecError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteEqualitiesPolicy {
    None,
    /// Lightweight syntactic substitution.
    Simple,
    /// Additionally evaluates select conditions against the already
    /// simplified constraints.
    Full,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCalculateBy {
    /// Looks for the closest uncovered block.
    Default,
    /// Looks for the closest uncovered block by state blocks history.
    Blocks,
    /// Looks for the closest uncovered block by state transitions
    /// history.
    Transitions,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreSearch {
    #[serde(rename = "dfs")]
    Dfs,
    #[serde(rename = "bfs")]
    Bfs,
    #[serde(rename = "random-state")]
    RandomState,
    #[serde(rename = "random-path")]
    RandomPath,
    #[serde(rename = "nurs:covnew")]
    NursCovNew,
    #[serde(rename = "nurs:md2u")]
    NursMd2u,
    #[serde(rename = "nurs:depth")]
    NursDepth,
    #[serde(rename = "nurs:rp")]
    NursRp,
    #[serde(rename = "nurs:icnt")]
    NursICnt,
    #[serde(rename = "nurs:cpicnt")]
    NursCpICnt,
    #[serde(rename = "nurs:qc")]
    NursQc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threshold after which a state is considered stuck and eligible
    /// for targeting.
    pub max_cycles_before_stuck: u64,
    /// Upper bound on per-(state, proof obligation) reuse; pairs past
    /// the bound are paused. Zero means no limit.
    pub max_propagations: u64,
    pub rewrite_equalities: RewriteEqualitiesPolicy,
    pub target_calculator_kind: TargetCalculateBy,
    pub use_batching_search: bool,
    pub batch_instructions: u64,
    pub batch_time: f64,
    pub use_iterative_deepening_time_search: bool,
    /// Core searchers, interleaved in order.
    pub search: Vec<CoreSearch>,
    /// Path to the lemma file; empty selects the output directory
    /// default.
    pub ksummary_file: String,
    /// Ticks per scheduler slot (forward, branch, backward,
    /// initialize).
    pub ticks: Vec<u32>,
    pub max_depth: u64,
    pub max_stepped_instructions: u64,
    pub max_forks: u64,
    pub max_memory_mb: u64,
    pub rng_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_cycles_before_stuck: 4,
            max_propagations: 0,
            rewrite_equalities: RewriteEqualitiesPolicy::Simple,
            target_calculator_kind: TargetCalculateBy::Default,
            use_batching_search: false,
            batch_instructions: 10000,
            batch_time: 5.0,
            use_iterative_deepening_time_search: false,
            search: vec![CoreSearch::RandomPath, CoreSearch::NursCovNew],
            ksummary_file: String::new(),
            ticks: vec![0, 30, 30, 30],
            max_depth: 0,
            max_stepped_instructions: 0,
            max_forks: 0,
            max_memory_mb: 0,
            rng_seed: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ExecError> {
        let config: EngineConfig =
            toml::from_str(contents).map_err(|e| ExecError::BadConfig(e.to_string()))?;
        if config.ticks.iter().all(|&t| t == 0) {
            return Err(ExecError::BadConfig("ticks must contain a non-zero quota".to_string()));
        }
        if config.ticks.len() != 4 {
            return Err(ExecError::BadConfig("ticks must list quotas for all four slots".to_string()));
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ExecError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.rewrite_equalities, RewriteEqualitiesPolicy::Simple);
        assert_eq!(config.ticks, vec![0, 30, 30, 30]);
        assert_eq!(config.search, vec![CoreSearch::RandomPath, CoreSearch::NursCovNew])
    }

    #[test]
    fn test_parse() {
        let config = EngineConfig::from_toml(
            r#"
            max_cycles_before_stuck = 8
            rewrite_equalities = "full"
            target_calculator_kind = "transitions"
            search = ["dfs", "nurs:qc"]
            ticks = [10, 0, 10, 10]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_cycles_before_stuck, 8);
        assert_eq!(config.rewrite_equalities, RewriteEqualitiesPolicy::Full);
        assert_eq!(config.target_calculator_kind, TargetCalculateBy::Transitions);
        assert_eq!(config.search, vec![CoreSearch::Dfs, CoreSearch::NursQc]);
        assert_eq!(config.ticks, vec![10, 0, 10, 10])
    }

    #[test]
    fn test_rejects_zero_ticks() {
        assert!(EngineConfig::from_toml("ticks = [0, 0, 0, 0]").is_err())
    }
}
