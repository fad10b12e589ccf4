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

//! Target bookkeeping: which targets each state still pursues, which
//! were reached, and how states flow between the per-(history,
//! target) buckets the guided searchers select from. The target
//! manager subscribes to the hub; the target calculator elects fresh
//! targets for states that got stuck under coverage guidance.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::TargetCalculateBy;
use crate::distance::{DistanceCalculator, WeightResult};
use crate::expr::Context;
use crate::graph::CodeGraph;
use crate::hub::{Event, ObjectManager, Subscriber};
use crate::ir::{Block, BlockId, BlockPredicate, FunctionId, Module};
use crate::log;
use crate::pob::PobId;
use crate::state::{ExecutionState, StateId};
use crate::target::{ReachWithError, Target, TargetKind};

/// How exploration is steered: not at all, towards uncovered code, or
/// towards the error locations of a report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GuidanceKind {
    NoGuidance,
    CoverageGuidance,
    ErrorGuidance,
}

/// The completion predicate of each target variant against a state.
/// Returns what classifying the state at its exact location yields,
/// or `None` when the state is not at the target's block at all.
pub fn reached_result(
    _ctx: &Context,
    module: &Module,
    state: &ExecutionState,
    target: &Target,
) -> Option<WeightResult> {
    if state.constraints.path().is_empty() && state.error == ReachWithError::None {
        return None;
    }

    match target.kind() {
        TargetKind::ReachBlock { block, at_end: true } => {
            if state.prev_pc_block() == Some(*block) || state.pc_block() == Some(*block) {
                let complete = !state.constraints.path().is_empty()
                    && state.constraints.path().last_instruction() == module.block(*block).last_instruction();
                Some(if complete { WeightResult::Done } else { WeightResult::Continue })
            } else {
                None
            }
        }
        TargetKind::ReachBlock { block, at_end: false } => {
            if state.pc == Some(module.block(*block).first_instruction()) {
                Some(WeightResult::Done)
            } else {
                None
            }
        }
        TargetKind::CoverBranch { block, branch } => {
            if state.prev_pc_block() == Some(*block) {
                let covered = match (module.block(*block).successors.get(*branch as usize), state.pc_block()) {
                    (Some(succ), Some(pc_block)) => {
                        state.prev_pc == Some(module.block(*block).last_instruction()) && *succ == pc_block
                    }
                    _ => false,
                };
                Some(if covered { WeightResult::Done } else { WeightResult::Continue })
            } else {
                None
            }
        }
        TargetKind::ReproduceError { .. } => {
            let block = target.block();
            if state.pc_block() == Some(block) {
                if target.is_that_error(state.error) {
                    Some(WeightResult::Done)
                } else if state.isolated
                    && state.error == ReachWithError::MayBeNullPointer
                    && target.is_that_error(ReachWithError::MustBeNullPointer)
                {
                    // A may-be-null inside an isolated segment can
                    // become must-be-null once composed with the
                    // outer context
                    Some(WeightResult::Done)
                } else {
                    Some(WeightResult::Continue)
                }
            } else {
                None
            }
        }
    }
}

pub fn is_reached_target(ctx: &Context, module: &Module, state: &ExecutionState, target: &Target) -> bool {
    reached_result(ctx, module, state, target) == Some(WeightResult::Done)
}

/// Elects fresh targets for stuck states by finding the nearest
/// blocks whose coverage the state could still improve.
pub struct TargetCalculator {
    mode: TargetCalculateBy,
    graph: Arc<CodeGraph>,
    blocks_history: BTreeMap<FunctionId, BTreeMap<BlockId, BTreeSet<BlockId>>>,
    transitions_history: BTreeMap<FunctionId, BTreeMap<BlockId, BTreeSet<(BlockId, BlockId)>>>,
    covered_blocks: BTreeMap<FunctionId, BTreeSet<BlockId>>,
    covered_branches: BTreeMap<FunctionId, BTreeMap<BlockId, BTreeSet<u32>>>,
}

impl TargetCalculator {
    pub fn new(mode: TargetCalculateBy, graph: Arc<CodeGraph>) -> Self {
        TargetCalculator {
            mode,
            graph,
            blocks_history: BTreeMap::new(),
            transitions_history: BTreeMap::new(),
            covered_blocks: BTreeMap::new(),
            covered_branches: BTreeMap::new(),
        }
    }

    pub fn update(&mut self, module: &Module, state: &ExecutionState) {
        let initial_function = module.function_of(state.init_pc_block()).id;
        let prev_block = match state.prev_pc_block() {
            None => return,
            Some(block) => block,
        };
        match self.mode {
            TargetCalculateBy::Default => {
                self.blocks_history
                    .entry(initial_function)
                    .or_default()
                    .entry(prev_block)
                    .or_default()
                    .insert(state.init_pc_block());
                let prev_pc = state.prev_pc.unwrap();
                if prev_pc == module.block(prev_block).last_instruction() {
                    let function = module.block(prev_block).function;
                    self.covered_blocks.entry(function).or_default().insert(prev_block);
                    let branches = self.covered_branches.entry(function).or_default().entry(prev_block).or_default();
                    if let Some(pc_block) = state.pc_block() {
                        for (index, succ) in module.block(prev_block).successors.iter().enumerate() {
                            if *succ == pc_block {
                                branches.insert(index as u32);
                                break;
                            }
                        }
                    }
                }
            }
            TargetCalculateBy::Blocks => {
                self.blocks_history
                    .entry(initial_function)
                    .or_default()
                    .entry(prev_block)
                    .or_default()
                    .extend(state.level.iter().copied());
            }
            TargetCalculateBy::Transitions => {
                self.blocks_history
                    .entry(initial_function)
                    .or_default()
                    .entry(prev_block)
                    .or_default()
                    .extend(state.level.iter().copied());
                self.transitions_history
                    .entry(initial_function)
                    .or_default()
                    .entry(prev_block)
                    .or_default()
                    .extend(state.transition_level.iter().copied());
            }
        }
    }

    fn uncovered_block(&self, module: &Module, state: &ExecutionState, block: &Block) -> bool {
        let initial_function = module.function_of(state.init_pc_block()).id;
        match self.mode {
            TargetCalculateBy::Default => {
                match self.covered_branches.get(&block.function).and_then(|per| per.get(&block.id)) {
                    None => true,
                    Some(covered) => block.successors.len() > covered.len(),
                }
            }
            TargetCalculateBy::Blocks => {
                match self.blocks_history.get(&initial_function).and_then(|h| h.get(&block.id)) {
                    Some(history) if !history.is_empty() => {
                        state.level.iter().any(|visited| !history.contains(visited))
                    }
                    _ => false,
                }
            }
            TargetCalculateBy::Transitions => {
                match self.transitions_history.get(&initial_function).and_then(|h| h.get(&block.id)) {
                    Some(history) if !history.is_empty() => {
                        state.transition_level.iter().any(|visited| !history.contains(visited))
                    }
                    _ => false,
                }
            }
        }
    }

    /// Walk outward through the call stack looking for the nearest
    /// blocks whose coverage this state could improve, and turn them
    /// into targets.
    pub fn calculate(&self, ctx: &Context, module: &Module, state: &ExecutionState) -> BTreeSet<Target> {
        let mut block = match state.pc_block() {
            None => return BTreeSet::new(),
            Some(block) => block,
        };

        for frame in state.stack.call_stack().iter().rev() {
            let predicate = UncoveredPredicate { calculator: self, state };
            let blocks = self.graph.nearest_predicate_satisfying(block, &predicate, true);

            if !blocks.is_empty() {
                let mut targets = BTreeSet::new();
                for candidate in blocks {
                    let covered =
                        self.covered_branches.get(&module.block(candidate).function).and_then(|per| per.get(&candidate));
                    match covered {
                        None => {
                            targets.insert(ctx.targets.reach_block(candidate, true));
                        }
                        Some(covered) => {
                            for index in 0..module.block(candidate).successors.len() as u32 {
                                if !covered.contains(&index) {
                                    targets.insert(ctx.targets.cover_branch(candidate, index));
                                }
                            }
                        }
                    }
                }
                return targets;
            }

            match frame.caller {
                Some(caller) => block = caller.block,
                None => (),
            }
        }
        BTreeSet::new()
    }
}

struct UncoveredPredicate<'a> {
    calculator: &'a TargetCalculator,
    state: &'a ExecutionState,
}

impl<'a> BlockPredicate for UncoveredPredicate<'a> {
    fn test(&self, module: &Module, block: &Block) -> bool {
        self.calculator.uncovered_block(module, self.state, block)
    }
}

/// The target manager: a hub subscriber that keeps every state's
/// target forest in step with what was reached, blocks globally
/// completed targets, and feeds the guided searchers their
/// per-(history, target) state buckets.
pub struct TargetManager {
    guidance: GuidanceKind,
    distance: DistanceCalculator,
    calculator: TargetCalculator,
    max_cycles_before_stuck: u64,
    pub reached_targets: BTreeSet<Target>,
    states: BTreeSet<StateId>,
    pub target_to_states: BTreeMap<Target, BTreeSet<StateId>>,
}

impl TargetManager {
    pub fn new(
        guidance: GuidanceKind,
        distance: DistanceCalculator,
        calculator: TargetCalculator,
        max_cycles_before_stuck: u64,
    ) -> Self {
        TargetManager {
            guidance,
            distance,
            calculator,
            max_cycles_before_stuck,
            reached_targets: BTreeSet::new(),
            states: BTreeSet::new(),
            target_to_states: BTreeMap::new(),
        }
    }

    pub fn guidance(&self) -> GuidanceKind {
        self.guidance
    }

    pub fn distance_calculator(&self) -> &DistanceCalculator {
        &self.distance
    }

    fn update_miss_state(&mut self, om: &mut ObjectManager, state: StateId, target: &Target) {
        let isolated = {
            let state = om.state_mut(state);
            state.target_forest.remove(target);
            let targets = state.target_forest.targets();
            state.set_targets(targets);
            state.isolated
        };
        if isolated {
            return;
        }
        if self.guidance == GuidanceKind::CoverageGuidance {
            let state = om.state_mut(state);
            if state.targets().is_empty() {
                state.set_targeted(false)
            }
        }
    }

    fn update_done_state(&mut self, om: &mut ObjectManager, state: StateId, target: &Target) {
        let ctx = om.ctx().clone();
        let isolated = {
            let state = om.state_mut(state);
            state.target_forest.step_to(&ctx, target);
            let targets = state.target_forest.targets();
            let history = state.target_forest.history().clone();
            state.set_targets(targets);
            state.set_history(history);
            state.isolated
        };
        if isolated {
            return;
        }

        if self.guidance == GuidanceKind::CoverageGuidance || target.should_fail_on_this_target() {
            self.reached_targets.insert(target.clone());
            let others: Vec<StateId> = self.states.iter().copied().collect();
            for other in others {
                let skip = om.try_state(other).map_or(true, |s| !s.is_targeted() || s.isolated);
                if skip {
                    continue;
                }
                let state = om.state_mut(other);
                state.target_forest.block(target);
                let targets = state.target_forest.targets();
                state.set_targets(targets);
                if self.guidance == GuidanceKind::CoverageGuidance && state.targets().is_empty() {
                    state.set_targeted(false)
                }
            }
        }
        if self.guidance == GuidanceKind::CoverageGuidance {
            let state = om.state_mut(state);
            if state.targets().is_empty() {
                state.set_targeted(false)
            }
        }
    }

    /// Mark what a terminator covered: the taken edge as a covered
    /// branch, or the block itself when the terminator has no
    /// successors.
    fn update_reached(&mut self, om: &mut ObjectManager, state: StateId) {
        let module = om.module().clone();
        let ctx = om.ctx().clone();
        let state_ref = om.state(state);
        if state_ref.isolated {
            return;
        }
        let prev_ki = match state_ref.prev_pc.or(state_ref.pc) {
            None => return,
            Some(ki) => ki,
        };
        let function = module.function_of(prev_ki.block);
        if !module.is_terminator(prev_ki) || !function.in_main_module {
            return;
        }
        self.calculator.update(&module, state_ref);

        let prev_block = prev_ki.block;
        let target = if module.block(prev_block).successors.is_empty() {
            Some(ctx.targets.reach_block(prev_block, true))
        } else {
            state_ref.pc_block().and_then(|pc_block| {
                module
                    .block(prev_block)
                    .successors
                    .iter()
                    .position(|succ| *succ == pc_block)
                    .map(|index| ctx.targets.cover_branch(prev_block, index as u32))
            })
        };

        if let Some(target) = target {
            if self.guidance == GuidanceKind::CoverageGuidance {
                self.reached_targets.insert(target);
            }
        }
    }

    fn update_targets(&mut self, om: &mut ObjectManager, state: StateId) {
        let module = om.module().clone();
        let ctx = om.ctx().clone();

        if self.guidance == GuidanceKind::CoverageGuidance && !om.state(state).isolated {
            let stuck = {
                let s = om.state(state);
                s.targets().is_empty() && s.is_stuck(&module, self.max_cycles_before_stuck)
            };
            if stuck {
                om.state_mut(state).set_targeted(true)
            }
            let needs_targets = {
                let s = om.state(state);
                s.is_targeted() && s.targets().is_empty()
            };
            if needs_targets {
                let targets = self.calculator.calculate(&ctx, &module, om.state(state));
                if !targets.is_empty() {
                    log!(log::TARGET, format!("elected {} targets for a stuck state", targets.len()));
                    let set = ctx.target_sets.intern(targets.into_iter().collect());
                    let s = om.state_mut(state);
                    s.target_forest.add_set(set);
                    let targets = s.target_forest.targets();
                    s.set_targets(targets);
                }
            }
        }

        if !om.state(state).is_targeted() {
            return;
        }

        let targets: Vec<Target> = om.state(state).targets().iter().cloned().collect();
        for target in targets {
            if !om.state(state).target_forest.contains(&target) {
                continue;
            }
            let result = match reached_result(&ctx, &module, om.state(state), &target) {
                Some(result) => result,
                None if om.state(state).pc.is_none() => WeightResult::Continue,
                None => self.distance.distance_to_state(&module, om.state(state), target.block()).result,
            };
            match result {
                WeightResult::Continue => (),
                WeightResult::Miss => self.update_miss_state(om, state, &target),
                WeightResult::Done => self.update_done_state(om, state, &target),
            }
        }
    }

    /// Record which (history, target) buckets the state left and
    /// entered, for delivery to the guided searchers.
    fn collect(&mut self, om: &mut ObjectManager, state: StateId) {
        let state_ref = om.state(state);
        if !state_ref.are_targets_changed() {
            return;
        }
        let prev_history = state_ref.prev_history().clone();
        let history = state_ref.history().clone();
        let prev_targets: Vec<Target> = state_ref.prev_targets().iter().cloned().collect();
        let targets: Vec<Target> = state_ref.targets().iter().cloned().collect();

        if prev_history != history {
            for target in prev_targets {
                om.targeting_removed.entry((prev_history.clone(), target)).or_default().push(state);
            }
            for target in targets {
                om.targeting_added.entry((history.clone(), target)).or_default().push(state);
            }
        } else {
            let prev_set: BTreeSet<Target> = prev_targets.iter().cloned().collect();
            let new_set: BTreeSet<Target> = targets.iter().cloned().collect();
            for target in prev_set.difference(&new_set) {
                om.targeting_removed.entry((history.clone(), target.clone())).or_default().push(state);
            }
            for target in new_set.difference(&prev_set) {
                om.targeting_added.entry((history.clone(), target.clone())).or_default().push(state);
            }
        }
    }

    fn update_states(
        &mut self,
        om: &mut ObjectManager,
        current: Option<StateId>,
        added: &[StateId],
        removed: &[StateId],
    ) {
        self.states.extend(added.iter().copied());

        let mut local: BTreeSet<StateId> = BTreeSet::new();
        if let Some(current) = current {
            if !removed.contains(&current) {
                local.insert(current);
            }
        }
        local.extend(added.iter().copied());
        local.extend(removed.iter().copied());

        for state in added {
            if om.state(*state).isolated {
                for target in om.state(*state).targets().clone() {
                    self.target_to_states.entry(target).or_default().insert(*state);
                }
            }
        }

        let mut changed: Vec<StateId> = Vec::new();
        for state in &local {
            if om.try_state(*state).is_none() {
                continue;
            }
            self.update_reached(om, *state);
            self.update_targets(om, *state);
            if om.state(*state).are_targets_changed() {
                changed.push(*state)
            }
        }

        for state in changed {
            if !added.contains(&state) {
                self.collect(om, state)
            }
            om.state_mut(state).step_targets_and_history()
        }

        for state in removed {
            if let Some(state_ref) = om.try_state(*state) {
                if state_ref.isolated {
                    for target in state_ref.targets().clone() {
                        if let Some(states) = self.target_to_states.get_mut(&target) {
                            states.remove(state);
                        }
                    }
                }
            }
            self.states.remove(state);
        }
    }

    fn update_pobs(&mut self, om: &mut ObjectManager, context: Option<StateId>, added: &[PobId]) {
        let context = match context {
            None => return,
            Some(context) => context,
        };
        let ctx = om.ctx().clone();
        let module = om.module().clone();

        for pob in added {
            if om.try_pob(*pob).is_none() {
                continue;
            }
            // Replay the context state's history through the pob's
            // forest
            let mut history = Some(om.state(context).history().clone());
            while let Some(h) = history {
                if let Some(target) = h.target() {
                    if om.pob(*pob).target_forest.contains(target) {
                        let p = om.pob_mut(*pob);
                        p.target_forest.step_to(&ctx, target);
                    }
                }
                history = h.next().cloned();
            }

            // Classify the remaining targets from the pob's position
            let targets: Vec<Target> = om.pob(*pob).target_forest.targets().iter().cloned().collect();
            for target in targets {
                if !om.pob(*pob).target_forest.contains(&target) {
                    continue;
                }
                let result = self.distance.distance_to_pob(&module, om.pob(*pob), target.block());
                match result.result {
                    WeightResult::Continue => (),
                    WeightResult::Miss => {
                        om.pob_mut(*pob).target_forest.remove(&target);
                    }
                    WeightResult::Done => {
                        om.pob_mut(*pob).target_forest.step_to(&ctx, &target);
                    }
                }
            }
        }
    }

    pub fn update_calculator(&mut self, module: &Module, state: &ExecutionState) {
        self.calculator.update(module, state)
    }
}

impl Subscriber for TargetManager {
    fn update(&mut self, event: &Event, om: &mut ObjectManager) {
        match event {
            Event::States { modified, added, removed, .. } => {
                self.update_states(om, *modified, added, removed)
            }
            Event::ProofObligations { context, added, .. } => self.update_pobs(om, *context, added),
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, InstId, ModuleBuilder};

    fn module() -> (Arc<Context>, Arc<Module>, FunctionId, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Base, 2);
        let b2 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        b.add_edge(b0, b2);
        b.add_edge(b1, b2);
        (Arc::new(Context::new()), Arc::new(b.finish()), f, vec![b0, b1, b2])
    }

    #[test]
    fn test_reach_block_at_start() {
        let (ctx, module, f, blocks) = module();
        let mut state = ExecutionState::initial(&ctx, &module, f);
        let target = ctx.targets.reach_block(blocks[1], false);

        // Untouched state: empty path, no error
        assert!(!is_reached_target(&ctx, &module, &state, &target));

        state.constraints.advance_path(&module, InstId::new(blocks[0], 0), Some(InstId::new(blocks[0], 1)));
        state.constraints.advance_path(&module, InstId::new(blocks[0], 1), Some(InstId::new(blocks[1], 0)));
        state.prev_pc = Some(InstId::new(blocks[0], 1));
        state.pc = Some(InstId::new(blocks[1], 0));
        assert!(is_reached_target(&ctx, &module, &state, &target))
    }

    #[test]
    fn test_reach_block_at_end_and_branch() {
        let (ctx, module, f, blocks) = module();
        let mut state = ExecutionState::initial(&ctx, &module, f);
        state.constraints.advance_path(&module, InstId::new(blocks[0], 0), Some(InstId::new(blocks[0], 1)));
        state.constraints.advance_path(&module, InstId::new(blocks[0], 1), Some(InstId::new(blocks[1], 0)));
        state.prev_pc = Some(InstId::new(blocks[0], 1));
        state.pc = Some(InstId::new(blocks[1], 0));

        let at_end = ctx.targets.reach_block(blocks[0], true);
        assert!(is_reached_target(&ctx, &module, &state, &at_end));

        // The edge b0 -> b1 is successor index 0
        let branch0 = ctx.targets.cover_branch(blocks[0], 0);
        let branch1 = ctx.targets.cover_branch(blocks[0], 1);
        assert!(is_reached_target(&ctx, &module, &state, &branch0));
        assert_eq!(reached_result(&ctx, &module, &state, &branch1), Some(WeightResult::Continue))
    }

    #[test]
    fn test_isolated_null_pointer_collapse() {
        let (ctx, module, f, blocks) = module();
        let mut state = ExecutionState::initial(&ctx, &module, f);
        state.constraints.advance_path(&module, InstId::new(blocks[0], 0), Some(InstId::new(blocks[1], 0)));
        state.pc = Some(InstId::new(blocks[1], 0));
        state.error = ReachWithError::MayBeNullPointer;

        let target = ctx.targets.reproduce_error(
            vec![ReachWithError::MustBeNullPointer],
            "null0".to_string(),
            Default::default(),
            blocks[1],
        );
        assert!(!is_reached_target(&ctx, &module, &state, &target));
        state.isolated = true;
        assert!(is_reached_target(&ctx, &module, &state, &target))
    }

    #[test]
    fn test_calculator_elects_uncovered_branches() {
        let (ctx, module, f, blocks) = module();
        let graph = Arc::new(CodeGraph::new(module.clone()));
        let mut calculator = TargetCalculator::new(TargetCalculateBy::Default, graph);

        // The state covered only the edge b0 -> b1
        let mut state = ExecutionState::initial(&ctx, &module, f);
        state.prev_pc = Some(InstId::new(blocks[0], 1));
        state.pc = Some(InstId::new(blocks[1], 0));
        calculator.update(&module, &state);

        let targets = calculator.calculate(&ctx, &module, &state);
        // b0 still has its second branch uncovered; it is among the
        // nearest uncovered blocks reachable from b1
        assert!(!targets.is_empty());
        let branch1 = ctx.targets.cover_branch(blocks[0], 1);
        let all: BTreeSet<Target> = targets;
        assert!(
            all.contains(&branch1) || all.iter().any(|t| matches!(t.kind(), TargetKind::ReachBlock { .. }))
        )
    }
}
