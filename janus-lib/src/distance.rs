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

//! Distances from a state (or proof obligation) to a target block,
//! combining hops inside the current function with call-graph hops
//! (counted double) and a surcharge for how deep in the stack the
//! profitable frame sits. Results are cached per target and
//! speculative position.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::graph::CodeGraph;
use crate::ir::{BlockId, FunctionId, Module};
use crate::path::CallStackFrame;
use crate::pob::ProofObligation;
use crate::state::ExecutionState;

/// Outcome of classifying a position against a target: the target is
/// complete, progress is possible, or the target is unreachable from
/// here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeightResult {
    Done,
    Continue,
    Miss,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DistanceResult {
    pub result: WeightResult,
    pub weight: u32,
    pub is_inside_function: bool,
}

impl DistanceResult {
    fn new(result: WeightResult, weight: u32, is_inside_function: bool) -> Self {
        DistanceResult { result, weight, is_inside_function }
    }

    /// Orders candidates for the guided searchers: in-function beats
    /// out-of-function, then completed beats continuing beats missed,
    /// with ties between continuing candidates broken by weight.
    pub fn better_than(&self, other: &DistanceResult) -> bool {
        if self.is_inside_function != other.is_inside_function {
            return self.is_inside_function;
        }
        if self.result == WeightResult::Continue && other.result == WeightResult::Continue {
            return self.weight < other.weight;
        }
        self.result < other.result
    }
}

impl fmt::Display for DistanceResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {:?}, {})", !self.is_inside_function as u32, self.result, self.weight)
    }
}

/// Where the profitable frame sits relative to the target's function:
/// in it, before a call leading to it, or after it up the stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetClass {
    Local,
    Pre,
    Post,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SpeculativeState {
    block: BlockId,
    class: TargetClass,
    reversed: bool,
}

pub struct DistanceCalculator {
    graph: Arc<CodeGraph>,
    cache: RefCell<HashMap<BlockId, HashMap<SpeculativeState, DistanceResult, ahash::RandomState>, ahash::RandomState>>,
}

impl DistanceCalculator {
    pub fn new(graph: Arc<CodeGraph>) -> Self {
        DistanceCalculator { graph, cache: RefCell::new(HashMap::default()) }
    }

    pub fn graph(&self) -> &Arc<CodeGraph> {
        &self.graph
    }

    /// Distance from a state's next instruction. Inside the branch
    /// instruction of a call block the call already happened, so the
    /// position is taken after the block.
    pub fn distance_to_state(&self, module: &Module, state: &ExecutionState, target: BlockId) -> DistanceResult {
        let pc = state.pc.expect("distance query on a finished state");
        let block = module.block(pc.block);
        let position = if block.is_call() && pc.index == 1 && !block.successors.is_empty() {
            block.successors[0]
        } else {
            pc.block
        };
        self.distance(module, position, state.stack.call_stack(), target, false)
    }

    /// Distance from a proof obligation, walking the CFG backwards.
    pub fn distance_to_pob(&self, module: &Module, pob: &ProofObligation, target: BlockId) -> DistanceResult {
        self.distance(module, pob.location.block(), &pob.stack, target, true)
    }

    pub fn distance(
        &self,
        module: &Module,
        pc_block: BlockId,
        frames: &[CallStackFrame],
        target: BlockId,
        reversed: bool,
    ) -> DistanceResult {
        let target_function = module.block(target).function;
        let to_target_function = if reversed {
            self.graph.function_distance(target_function)
        } else {
            self.graph.function_backward_distance(target_function)
        };

        let mut min_call_weight = u32::MAX;
        let mut min_sf_num = u32::MAX;
        let mut sf_num: u32 = 0;
        let mut kb = pc_block;

        let strictly_after = frames
            .last()
            .map_or(false, |frame| module.function(frame.function).in_main_module);

        for frame in frames.iter().rev() {
            if let Some(mut call_weight) = self.distance_in_call_graph_after(
                module,
                frame.function,
                kb,
                &to_target_function,
                target,
                strictly_after && sf_num != 0,
                reversed,
            ) {
                call_weight = call_weight.saturating_mul(2).saturating_add(sf_num);
                if call_weight < u32::MAX {
                    min_call_weight = call_weight;
                    min_sf_num = sf_num;
                }
            }

            if let Some(caller) = frame.caller {
                kb = caller.block
            }
            sf_num += 1;

            if min_call_weight < u32::MAX {
                break;
            }
        }

        if min_call_weight == u32::MAX && reversed {
            let function = module.block(pc_block).function;
            if let Some(d) = to_target_function.get(&function) {
                min_call_weight = 2 * d + sf_num;
                min_sf_num = if sf_num == 0 { 1 } else { sf_num };
            }
        }

        let class = if min_call_weight == 0 {
            TargetClass::Local
        } else if min_sf_num == 0 {
            TargetClass::Pre
        } else if min_sf_num != u32::MAX {
            TargetClass::Post
        } else {
            TargetClass::None
        };

        self.classified_distance(module, pc_block, class, target, reversed)
    }

    fn classified_distance(
        &self,
        module: &Module,
        block: BlockId,
        class: TargetClass,
        target: BlockId,
        reversed: bool,
    ) -> DistanceResult {
        let speculative = SpeculativeState { block, class, reversed };
        if let Some(cached) = self.cache.borrow().get(&target).and_then(|per| per.get(&speculative)) {
            return *cached;
        }
        let result = self.compute_distance(module, block, class, target, reversed);
        self.cache
            .borrow_mut()
            .entry(target)
            .or_insert_with(HashMap::default)
            .insert(speculative, result);
        result
    }

    fn compute_distance(
        &self,
        module: &Module,
        block: BlockId,
        class: TargetClass,
        target: BlockId,
        reversed: bool,
    ) -> DistanceResult {
        let target_function = module.block(target).function;
        let to_target_function = if reversed {
            self.graph.function_distance(target_function)
        } else {
            self.graph.function_backward_distance(target_function)
        };
        match class {
            TargetClass::Local => {
                let (result, weight) = self.local_weight(module, block, &[target], reversed);
                DistanceResult::new(result, weight, true)
            }
            TargetClass::Pre => {
                let (result, weight) = self.pre_target_weight(module, block, &to_target_function, reversed);
                DistanceResult::new(result, weight, false)
            }
            TargetClass::Post => {
                let (result, weight) = self.post_target_weight(module, block, reversed);
                DistanceResult::new(result, weight, false)
            }
            TargetClass::None => DistanceResult::new(WeightResult::Miss, 0, true),
        }
    }

    /// Shortest hops from `block` to any of `local_targets` within the
    /// function.
    fn local_weight(
        &self,
        _module: &Module,
        block: BlockId,
        local_targets: &[BlockId],
        reversed: bool,
    ) -> (WeightResult, u32) {
        let dist =
            if reversed { self.graph.backward_distance(block) } else { self.graph.distance(block) };
        let mut weight = u32::MAX;
        for end in local_targets {
            if let Some(w) = dist.get(end) {
                weight = weight.min(*w)
            }
        }
        if weight == u32::MAX {
            (WeightResult::Miss, 0)
        } else if weight == 0 {
            (WeightResult::Done, 0)
        } else {
            (WeightResult::Continue, weight)
        }
    }

    /// Weight towards a call block whose callee leads to the target's
    /// function.
    fn pre_target_weight(
        &self,
        module: &Module,
        block: BlockId,
        to_target_function: &HashMap<FunctionId, u32, ahash::RandomState>,
        reversed: bool,
    ) -> (WeightResult, u32) {
        let function = module.function_of(block);
        let mut local_targets = Vec::new();
        for call_block in &function.call_blocks {
            for called in &module.block(*call_block).called {
                if to_target_function.contains_key(called) {
                    local_targets.push(*call_block)
                }
            }
        }
        if local_targets.is_empty() {
            return (WeightResult::Miss, 0);
        }
        let (result, weight) = self.local_weight(module, block, &local_targets, reversed);
        (if result == WeightResult::Done { WeightResult::Continue } else { result }, weight)
    }

    /// Weight towards leaving the current function (its returns going
    /// forward, its entry going backward).
    fn post_target_weight(&self, module: &Module, block: BlockId, reversed: bool) -> (WeightResult, u32) {
        let function = module.function_of(block);
        let (result, weight) = if reversed {
            self.local_weight(module, block, &[function.entry], true)
        } else {
            if function.return_blocks.is_empty() {
                return (WeightResult::Miss, 0);
            }
            self.local_weight(module, block, &function.return_blocks, false)
        };
        (if result == WeightResult::Done { WeightResult::Continue } else { result }, weight)
    }

    fn distance_in_call_graph_after(
        &self,
        module: &Module,
        function: FunctionId,
        orig_block: BlockId,
        to_target_function: &HashMap<FunctionId, u32, ahash::RandomState>,
        target: BlockId,
        strictly_after: bool,
        reversed: bool,
    ) -> Option<u32> {
        let dist =
            if reversed { self.graph.backward_distance(orig_block) } else { self.graph.distance(orig_block) };
        let target_function = module.block(target).function;

        if function == target_function && dist.contains_key(&target) {
            return Some(0);
        }

        if !strictly_after {
            return self.distance_in_call_graph(module, function, orig_block, to_target_function, reversed);
        }

        let block = module.block(orig_block);
        let neighbours = if reversed { &block.predecessors } else { &block.successors };
        let mut min_distance = None;
        for neighbour in neighbours {
            if let Some(d) =
                self.distance_in_call_graph(module, function, *neighbour, to_target_function, reversed)
            {
                min_distance = Some(min_distance.map_or(d, |m: u32| m.min(d)))
            }
        }
        min_distance
    }

    /// Call-graph hops via any call block reachable from `block`.
    fn distance_in_call_graph(
        &self,
        module: &Module,
        function: FunctionId,
        block: BlockId,
        to_target_function: &HashMap<FunctionId, u32, ahash::RandomState>,
        reversed: bool,
    ) -> Option<u32> {
        let dist = if reversed { self.graph.backward_distance(block) } else { self.graph.distance(block) };
        let mut distance = None;
        for call_block in &module.function(function).call_blocks {
            if !dist.contains_key(call_block) {
                continue;
            }
            for called in &module.block(*call_block).called {
                if let Some(d) = to_target_function.get(called) {
                    let candidate = d + 1;
                    if distance.map_or(true, |m: u32| candidate < m) {
                        distance = Some(candidate)
                    }
                }
            }
        }
        distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, ModuleBuilder};

    #[test]
    fn test_local_distance() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Base, 2);
        let b2 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        b.add_edge(b1, b2);
        let module = Arc::new(b.finish());
        let calc = DistanceCalculator::new(Arc::new(CodeGraph::new(module.clone())));

        let frames = vec![CallStackFrame::new(None, f)];
        let result = calc.distance(&module, b0, &frames, b2, false);
        assert_eq!(result.result, WeightResult::Continue);
        assert_eq!(result.weight, 2);
        assert!(result.is_inside_function);

        let done = calc.distance(&module, b2, &frames, b2, false);
        assert_eq!(done.result, WeightResult::Done);

        // b2 cannot flow back to b0
        let miss = calc.distance(&module, b2, &frames, b0, false);
        assert_eq!(miss.result, WeightResult::Miss);

        // Backwards the direction flips
        let back = calc.distance(&module, b2, &frames, b0, true);
        assert_eq!(back.result, WeightResult::Continue);
        assert_eq!(back.weight, 2)
    }

    #[test]
    fn test_interprocedural_distance() {
        let mut b = ModuleBuilder::new();
        let g = b.add_function("g", 0, true);
        let g0 = b.add_block(g, BlockKind::Base, 1);
        let g1 = b.add_block(g, BlockKind::Return, 1);
        b.add_edge(g0, g1);
        let f = b.add_function("f", 0, true);
        let f0 = b.add_block(f, BlockKind::Base, 1);
        let f1 = b.add_call_block(f, &[g]);
        let f2 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(f0, f1);
        b.add_edge(f1, f2);
        let module = Arc::new(b.finish());
        let calc = DistanceCalculator::new(Arc::new(CodeGraph::new(module.clone())));

        // From f0, the target g1 sits behind the call at f1
        let frames = vec![CallStackFrame::new(None, f)];
        let result = calc.distance(&module, f0, &frames, g1, false);
        assert_eq!(result.result, WeightResult::Continue);
        assert!(!result.is_inside_function);

        let comparison = calc.distance(&module, f0, &frames, f2, false);
        assert!(comparison.better_than(&result))
    }

    #[test]
    fn test_better_than_ordering() {
        let inside = DistanceResult::new(WeightResult::Continue, 10, true);
        let outside = DistanceResult::new(WeightResult::Continue, 1, false);
        assert!(inside.better_than(&outside));
        let near = DistanceResult::new(WeightResult::Continue, 1, true);
        assert!(near.better_than(&inside));
        let done = DistanceResult::new(WeightResult::Done, 0, true);
        assert!(done.better_than(&near))
    }
}
