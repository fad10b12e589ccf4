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

//! Forward state-selection policies. All searchers receive the same
//! (added, removed) deltas from the hub's states event and must not
//! retain references beyond them; [GuidedSearcher] additionally
//! consumes the per-(history, target) buckets the target manager
//! collected on the hub.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use crate::config::{CoreSearch, EngineConfig};
use crate::distance::{DistanceCalculator, WeightResult};
use crate::forest::History;
use crate::hub::ObjectManager;
use crate::state::StateId;
use crate::target::Target;
use crate::targeting::GuidanceKind;
use crate::weights::{DiscretePdf, WeightedQueue};

pub trait Searcher {
    /// Select the state to run next. Calling this on an empty
    /// searcher is a programming error.
    fn select_state(&mut self, om: &ObjectManager) -> StateId;

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]);

    fn is_empty(&self) -> bool;

    fn name(&self) -> String;
}

pub struct DfsSearcher {
    states: Vec<StateId>,
}

impl DfsSearcher {
    pub fn new() -> Self {
        DfsSearcher { states: Vec::new() }
    }
}

impl Searcher for DfsSearcher {
    fn select_state(&mut self, _: &ObjectManager) -> StateId {
        *self.states.last().expect("select_state on empty searcher")
    }

    fn update(&mut self, _: &ObjectManager, _: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        for state in removed {
            if let Some(at) = self.states.iter().position(|s| s == state) {
                self.states.remove(at);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn name(&self) -> String {
        "DFSSearcher".to_string()
    }
}

pub struct BfsSearcher {
    states: VecDeque<StateId>,
}

impl BfsSearcher {
    pub fn new() -> Self {
        BfsSearcher { states: VecDeque::new() }
    }
}

impl Searcher for BfsSearcher {
    fn select_state(&mut self, _: &ObjectManager) -> StateId {
        *self.states.front().expect("select_state on empty searcher")
    }

    fn update(&mut self, _: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        // Scheduling decisions are taken at fork granularity: a
        // stepped state goes to the back of the queue
        if let Some(modified) = modified {
            if self.states.front() == Some(&modified) && !removed.contains(&modified) {
                self.states.rotate_left(1);
            }
        }
        self.states.extend(added.iter().copied());
        for state in removed {
            if let Some(at) = self.states.iter().position(|s| s == state) {
                self.states.remove(at);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn name(&self) -> String {
        "BFSSearcher".to_string()
    }
}

pub struct RandomSearcher {
    states: Vec<StateId>,
    rng: SmallRng,
}

impl RandomSearcher {
    pub fn new(seed: u64) -> Self {
        RandomSearcher { states: Vec::new(), rng: SmallRng::seed_from_u64(seed) }
    }
}

impl Searcher for RandomSearcher {
    fn select_state(&mut self, _: &ObjectManager) -> StateId {
        assert!(!self.states.is_empty(), "select_state on empty searcher");
        self.states[self.rng.gen_range(0..self.states.len())]
    }

    fn update(&mut self, _: &ObjectManager, _: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        for state in removed {
            if let Some(at) = self.states.iter().position(|s| s == state) {
                self.states.swap_remove(at);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn name(&self) -> String {
        "RandomSearcher".to_string()
    }
}

/// Walks the process forest from a random root, flipping a coin at
/// every fork node, which favours states that forked recently.
pub struct RandomPathSearcher {
    states: BTreeSet<StateId>,
    rng: SmallRng,
}

impl RandomPathSearcher {
    pub fn new(seed: u64) -> Self {
        RandomPathSearcher { states: BTreeSet::new(), rng: SmallRng::seed_from_u64(seed) }
    }
}

impl Searcher for RandomPathSearcher {
    fn select_state(&mut self, om: &ObjectManager) -> StateId {
        assert!(!self.states.is_empty(), "select_state on empty searcher");
        let states = &self.states;
        let valid = |s: StateId| states.contains(&s);
        let roots: Vec<_> = om
            .process_forest
            .roots()
            .iter()
            .copied()
            .filter(|root| om.process_forest.subtree_has(*root, valid))
            .collect();
        assert!(!roots.is_empty());
        let root = roots[self.rng.gen_range(0..roots.len())];
        let rng = &mut self.rng;
        om.process_forest
            .select(root, valid, &mut || rng.gen_bool(0.5))
            .expect("a live root must contain a valid state")
    }

    fn update(&mut self, _: &ObjectManager, _: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend(added.iter().copied());
        for state in removed {
            self.states.remove(state);
        }
    }

    fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn name(&self) -> String {
        "RandomPathSearcher".to_string()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WeightMode {
    CoveringNew,
    MinDistToUncovered,
    Depth,
    /// 1 / 2^depth.
    Rp,
    InstCount,
    CpInstCount,
    QueryCost,
}

pub struct WeightedRandomSearcher {
    mode: WeightMode,
    pdf: DiscretePdf<StateId>,
    rng: SmallRng,
}

impl WeightedRandomSearcher {
    pub fn new(mode: WeightMode, seed: u64) -> Self {
        WeightedRandomSearcher { mode, pdf: DiscretePdf::new(), rng: SmallRng::seed_from_u64(seed) }
    }

    fn weight(&self, om: &ObjectManager, state: StateId) -> f64 {
        let state = om.state(state);
        match self.mode {
            WeightMode::CoveringNew => 1.0 / (1.0 + state.insts_since_cov_new as f64),
            WeightMode::MinDistToUncovered => {
                let md2u = state
                    .stack
                    .info_stack()
                    .last()
                    .map(|frame| frame.min_dist_to_uncovered_on_return)
                    .unwrap_or(0);
                let inv = 1.0 / (1.0 + md2u as f64);
                inv * inv
            }
            WeightMode::Depth => 1.0 + state.depth as f64,
            WeightMode::Rp => 0.5f64.powi(state.depth.min(1000) as i32),
            WeightMode::InstCount => 1.0 / (1.0 + state.stepped_instructions as f64),
            WeightMode::CpInstCount => {
                let in_frame =
                    state.stack.info_stack().last().map(|frame| frame.instructions_in_frame).unwrap_or(0);
                1.0 / (1.0 + in_frame as f64)
            }
            WeightMode::QueryCost => {
                if state.query_cost < 0.1 {
                    1.0
                } else {
                    1.0 / state.query_cost
                }
            }
        }
    }
}

impl Searcher for WeightedRandomSearcher {
    fn select_state(&mut self, _: &ObjectManager) -> StateId {
        *self.pdf.choose(self.rng.gen_range(0.0..1.0))
    }

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if let Some(modified) = modified {
            if self.pdf.contains(&modified) && !removed.contains(&modified) {
                let weight = self.weight(om, modified);
                self.pdf.update(&modified, weight)
            }
        }
        for state in added {
            let weight = self.weight(om, *state);
            self.pdf.insert(*state, weight)
        }
        for state in removed {
            if self.pdf.contains(state) {
                self.pdf.remove(state)
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.pdf.is_empty()
    }

    fn name(&self) -> String {
        format!("WeightedRandomSearcher({:?})", self.mode)
    }
}

/// Keeps the last selection for a number of instructions or a span of
/// time before consulting the underlying searcher again.
pub struct BatchingSearcher {
    base: Box<dyn Searcher>,
    time_budget: Duration,
    instruction_budget: u64,
    last_state: Option<StateId>,
    last_start_time: Instant,
    last_start_instructions: u64,
}

impl BatchingSearcher {
    pub fn new(base: Box<dyn Searcher>, time_budget: Duration, instruction_budget: u64) -> Self {
        BatchingSearcher {
            base,
            time_budget,
            instruction_budget,
            last_state: None,
            last_start_time: Instant::now(),
            last_start_instructions: 0,
        }
    }

    fn budget_exhausted(&self, om: &ObjectManager, state: StateId) -> bool {
        if !self.time_budget.is_zero() && self.last_start_time.elapsed() > self.time_budget {
            return true;
        }
        if self.instruction_budget > 0 {
            let executed = om.state(state).stepped_instructions.saturating_sub(self.last_start_instructions);
            if executed > self.instruction_budget {
                return true;
            }
        }
        false
    }
}

impl Searcher for BatchingSearcher {
    fn select_state(&mut self, om: &ObjectManager) -> StateId {
        if let Some(state) = self.last_state {
            if om.try_state(state).is_some() && !self.budget_exhausted(om, state) {
                return state;
            }
        }
        let state = self.base.select_state(om);
        self.last_state = Some(state);
        self.last_start_time = Instant::now();
        self.last_start_instructions = om.state(state).stepped_instructions;
        state
    }

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if let Some(last) = self.last_state {
            if removed.contains(&last) {
                self.last_state = None
            }
        }
        self.base.update(om, modified, added, removed)
    }

    fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    fn name(&self) -> String {
        format!("BatchingSearcher({})", self.base.name())
    }
}

/// Runs the base searcher under a time budget per state; states that
/// exhaust it are paused, and when the base searcher starves the
/// budget doubles and the paused states come back.
pub struct IterativeDeepeningTimeSearcher {
    base: Box<dyn Searcher>,
    budget: Duration,
    paused: BTreeSet<StateId>,
    start: Option<(StateId, Instant)>,
}

impl IterativeDeepeningTimeSearcher {
    pub fn new(base: Box<dyn Searcher>) -> Self {
        IterativeDeepeningTimeSearcher { base, budget: Duration::from_secs(1), paused: BTreeSet::new(), start: None }
    }
}

impl Searcher for IterativeDeepeningTimeSearcher {
    fn select_state(&mut self, om: &ObjectManager) -> StateId {
        let state = self.base.select_state(om);
        self.start = Some((state, Instant::now()));
        state
    }

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        let mut paused_now: Vec<StateId> = Vec::new();
        if let Some((state, started)) = self.start {
            if modified == Some(state) && !removed.contains(&state) && started.elapsed() > self.budget {
                self.paused.insert(state);
                paused_now.push(state);
                self.start = None;
            }
        }
        for state in removed {
            self.paused.remove(state);
        }
        let mut removed_for_base: Vec<StateId> = removed.to_vec();
        removed_for_base.extend(paused_now);
        self.base.update(om, modified, added, &removed_for_base);

        if self.base.is_empty() && !self.paused.is_empty() {
            self.budget *= 2;
            let resumed: Vec<StateId> = std::mem::take(&mut self.paused).into_iter().collect();
            self.base.update(om, None, &resumed, &[]);
        }
    }

    fn is_empty(&self) -> bool {
        self.base.is_empty() && self.paused.is_empty()
    }

    fn name(&self) -> String {
        format!("IterativeDeepeningTimeSearcher({})", self.base.name())
    }
}

/// Keeps targeted states in per-(history, target) buckets ordered by
/// distance to the target; untargeted states fall through to the base
/// searcher.
pub struct GuidedSearcher {
    base: Box<dyn Searcher>,
    distance: DistanceCalculator,
    targeted: BTreeMap<(History, Target), WeightedQueue<StateId>>,
    in_base: BTreeSet<StateId>,
    rng: SmallRng,
}

impl GuidedSearcher {
    pub fn new(base: Box<dyn Searcher>, distance: DistanceCalculator, seed: u64) -> Self {
        GuidedSearcher {
            base,
            distance,
            targeted: BTreeMap::new(),
            in_base: BTreeSet::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn target_weight(&self, om: &ObjectManager, state: StateId, target: &Target) -> Option<u32> {
        let module = om.module();
        let state = om.state(state);
        if state.pc.is_none() {
            return None;
        }
        let result = self.distance.distance_to_state(module, state, target.block());
        match result.result {
            WeightResult::Done => Some(0),
            WeightResult::Continue => Some(result.weight.saturating_add(1)),
            WeightResult::Miss => None,
        }
    }

    fn insert_targeted(&mut self, om: &ObjectManager, state: StateId, history: &History, target: &Target) -> bool {
        if let Some(weight) = self.target_weight(om, state, target) {
            let bucket = self.targeted.entry((history.clone(), target.clone())).or_insert_with(WeightedQueue::new);
            if bucket.contains(&state) {
                bucket.update(&state, weight)
            } else {
                bucket.insert(state, weight)
            }
            true
        } else {
            false
        }
    }

    fn remove_targeted(&mut self, state: StateId, history: &History, target: &Target) {
        let key = (history.clone(), target.clone());
        if let Some(bucket) = self.targeted.get_mut(&key) {
            if bucket.contains(&state) {
                bucket.remove(&state)
            }
            if bucket.is_empty() {
                self.targeted.remove(&key);
            }
        }
    }

    fn remove_everywhere(&mut self, state: StateId) {
        let mut dead = Vec::new();
        for (key, bucket) in self.targeted.iter_mut() {
            if bucket.contains(&state) {
                bucket.remove(&state)
            }
            if bucket.is_empty() {
                dead.push(key.clone())
            }
        }
        for key in dead {
            self.targeted.remove(&key);
        }
    }
}

impl Searcher for GuidedSearcher {
    fn select_state(&mut self, om: &ObjectManager) -> StateId {
        if !self.targeted.is_empty() {
            let index = self.rng.gen_range(0..self.targeted.len());
            let bucket = self.targeted.values().nth(index).unwrap();
            // The closest state in the chosen bucket
            return *bucket.choose(0);
        }
        self.base.select_state(om)
    }

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        for state in added {
            let mut bucketed = false;
            if om.state(*state).is_targeted() {
                let history = om.state(*state).history().clone();
                let targets: Vec<Target> = om.state(*state).targets().iter().cloned().collect();
                for target in targets {
                    bucketed |= self.insert_targeted(om, *state, &history, &target)
                }
            }
            if !bucketed {
                self.in_base.insert(*state);
                self.base.update(om, None, &[*state], &[])
            }
        }

        // Bucket transitions the target manager collected this tick
        let moves_removed: Vec<((History, Target), Vec<StateId>)> =
            om.targeting_removed.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for ((history, target), states) in &moves_removed {
            for state in states {
                self.remove_targeted(*state, history, target)
            }
        }
        let moves_added: Vec<((History, Target), Vec<StateId>)> =
            om.targeting_added.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for ((history, target), states) in moves_added {
            for state in states {
                if removed.contains(&state) {
                    continue;
                }
                if self.insert_targeted(om, state, &history, &target) && self.in_base.remove(&state) {
                    self.base.update(om, None, &[], &[state])
                }
            }
        }

        // A state whose targets ran out drops back to the base
        for (_, states) in &moves_removed {
            for state in states {
                if removed.contains(state) {
                    continue;
                }
                if om.try_state(*state).map_or(false, |s| !s.is_targeted()) && !self.in_base.contains(state) {
                    self.in_base.insert(*state);
                    self.base.update(om, None, &[*state], &[])
                }
            }
        }

        if let Some(modified) = modified {
            if !removed.contains(&modified) && om.try_state(modified).is_some() {
                if om.state(modified).is_targeted() {
                    let history = om.state(modified).history().clone();
                    let targets: Vec<Target> = om.state(modified).targets().iter().cloned().collect();
                    for target in targets {
                        self.insert_targeted(om, modified, &history, &target);
                    }
                } else if self.in_base.contains(&modified) {
                    self.base.update(om, Some(modified), &[], &[])
                }
            }
        }

        for state in removed {
            self.remove_everywhere(*state);
            if self.in_base.remove(state) {
                self.base.update(om, None, &[], &[*state])
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.targeted.is_empty() && self.base.is_empty()
    }

    fn name(&self) -> String {
        format!("GuidedSearcher({})", self.base.name())
    }
}

/// Round-robins between several searchers holding the same states.
pub struct InterleavedSearcher {
    searchers: Vec<Box<dyn Searcher>>,
    index: usize,
}

impl InterleavedSearcher {
    pub fn new(searchers: Vec<Box<dyn Searcher>>) -> Self {
        assert!(!searchers.is_empty());
        let index = searchers.len();
        InterleavedSearcher { searchers, index }
    }
}

impl Searcher for InterleavedSearcher {
    fn select_state(&mut self, om: &ObjectManager) -> StateId {
        self.index -= 1;
        let chosen = self.index;
        if self.index == 0 {
            self.index = self.searchers.len()
        }
        self.searchers[chosen].select_state(om)
    }

    fn update(&mut self, om: &ObjectManager, modified: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        for searcher in &mut self.searchers {
            searcher.update(om, modified, added, removed)
        }
    }

    fn is_empty(&self) -> bool {
        self.searchers.iter().all(|s| s.is_empty())
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.searchers.iter().map(|s| s.name()).collect();
        format!("InterleavedSearcher({})", names.join(", "))
    }
}

fn core_searcher(kind: CoreSearch, seed: u64) -> Box<dyn Searcher> {
    match kind {
        CoreSearch::Dfs => Box::new(DfsSearcher::new()),
        CoreSearch::Bfs => Box::new(BfsSearcher::new()),
        CoreSearch::RandomState => Box::new(RandomSearcher::new(seed)),
        CoreSearch::RandomPath => Box::new(RandomPathSearcher::new(seed)),
        CoreSearch::NursCovNew => Box::new(WeightedRandomSearcher::new(WeightMode::CoveringNew, seed)),
        CoreSearch::NursMd2u => Box::new(WeightedRandomSearcher::new(WeightMode::MinDistToUncovered, seed)),
        CoreSearch::NursDepth => Box::new(WeightedRandomSearcher::new(WeightMode::Depth, seed)),
        CoreSearch::NursRp => Box::new(WeightedRandomSearcher::new(WeightMode::Rp, seed)),
        CoreSearch::NursICnt => Box::new(WeightedRandomSearcher::new(WeightMode::InstCount, seed)),
        CoreSearch::NursCpICnt => Box::new(WeightedRandomSearcher::new(WeightMode::CpInstCount, seed)),
        CoreSearch::NursQc => Box::new(WeightedRandomSearcher::new(WeightMode::QueryCost, seed)),
    }
}

/// Build the configured searcher stack: interleaved cores, optionally
/// batched and time-deepened, and guided when exploration is steered.
pub fn construct_searcher(
    config: &EngineConfig,
    guidance: GuidanceKind,
    distance: DistanceCalculator,
    seed_offset: u64,
) -> Box<dyn Searcher> {
    let seed = config.rng_seed.wrapping_add(seed_offset);
    let mut searcher: Box<dyn Searcher> = if config.search.len() > 1 {
        let searchers: Vec<Box<dyn Searcher>> =
            config.search.iter().enumerate().map(|(i, kind)| core_searcher(*kind, seed.wrapping_add(i as u64))).collect();
        Box::new(InterleavedSearcher::new(searchers))
    } else {
        core_searcher(*config.search.first().unwrap_or(&CoreSearch::RandomPath), seed)
    };

    if config.use_batching_search {
        searcher = Box::new(BatchingSearcher::new(
            searcher,
            Duration::from_secs_f64(config.batch_time),
            config.batch_instructions,
        ))
    }

    if config.use_iterative_deepening_time_search {
        searcher = Box::new(IterativeDeepeningTimeSearcher::new(searcher))
    }

    if guidance != GuidanceKind::NoGuidance {
        searcher = Box::new(GuidedSearcher::new(searcher, distance, seed.wrapping_add(97)))
    }

    searcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Context;
    use crate::ir::{BlockKind, ModuleBuilder};
    use crate::state::ExecutionState;
    use std::sync::Arc;

    fn om_with_states(n: usize) -> (ObjectManager, Vec<StateId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let module = Arc::new(b.finish());
        let ctx = Arc::new(Context::new());
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut ids = Vec::new();
        for _ in 0..n {
            let state = ExecutionState::initial(&ctx, &module, f);
            ids.push(om.add_initial_state(state));
        }
        (om, ids)
    }

    #[test]
    fn test_dfs_order() {
        let (om, ids) = om_with_states(3);
        let mut dfs = DfsSearcher::new();
        dfs.update(&om, None, &ids, &[]);
        assert_eq!(dfs.select_state(&om), ids[2]);
        dfs.update(&om, None, &[], &[ids[2]]);
        assert_eq!(dfs.select_state(&om), ids[1])
    }

    #[test]
    fn test_bfs_rotates() {
        let (om, ids) = om_with_states(3);
        let mut bfs = BfsSearcher::new();
        bfs.update(&om, None, &ids, &[]);
        assert_eq!(bfs.select_state(&om), ids[0]);
        bfs.update(&om, Some(ids[0]), &[], &[]);
        assert_eq!(bfs.select_state(&om), ids[1])
    }

    #[test]
    #[should_panic]
    fn test_empty_searcher_aborts() {
        let (om, _) = om_with_states(0);
        let mut dfs = DfsSearcher::new();
        dfs.select_state(&om);
    }

    #[test]
    fn test_weighted_random_tracks_weights() {
        let (om, ids) = om_with_states(2);
        let mut nurs = WeightedRandomSearcher::new(WeightMode::Depth, 7);
        nurs.update(&om, None, &ids, &[]);
        assert!(!nurs.is_empty());
        let chosen = nurs.select_state(&om);
        assert!(ids.contains(&chosen));
        nurs.update(&om, None, &[], &ids);
        assert!(nurs.is_empty())
    }

    #[test]
    fn test_random_path_over_forest() {
        let (mut om, ids) = om_with_states(1);
        let mut rp = RandomPathSearcher::new(3);
        rp.update(&om, None, &ids, &[]);

        // Fork the state a few times inside one tick
        om.set_current_state(ids[0]);
        let forked = om.branch_state(ids[0]);
        rp.update(&om, Some(ids[0]), &[forked], &[]);
        let selected = rp.select_state(&om);
        assert!(selected == ids[0] || selected == forked)
    }

    #[test]
    fn test_interleaved_round_robin() {
        let (om, ids) = om_with_states(2);
        let mut interleaved =
            InterleavedSearcher::new(vec![Box::new(DfsSearcher::new()), Box::new(BfsSearcher::new())]);
        interleaved.update(&om, None, &ids, &[]);
        // Second sub-searcher (BFS) answers first, then DFS
        assert_eq!(interleaved.select_state(&om), ids[0]);
        assert_eq!(interleaved.select_state(&om), ids[1])
    }
}
