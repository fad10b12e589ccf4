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

//! The initializer decides where isolated execution should begin
//! next. For every open proof obligation it back-steps to the nearest
//! predicate-satisfying predecessors and schedules isolated runs from
//! there towards the obligation (and towards the region boundaries in
//! between). Instructions whose targets have no live obligation wait
//! in `awaiting`; they move to `queued` once a matching obligation
//! appears.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use crate::expr::Context;
use crate::graph::CodeGraph;
use crate::hub::{Conflict, ObjectManager};
use crate::ir::{BlockId, BlockPredicate, FunctionId, InstId, Module};
use crate::log;
use crate::pob::PobId;
use crate::target::{ReachWithError, Target};

pub struct ConflictCoreInitializer {
    ctx: Arc<Context>,
    graph: Arc<CodeGraph>,
    predicate: Arc<dyn BlockPredicate>,
    error_guided: bool,
    /// Functions isolated execution may start from when an obligation
    /// sits at a function entry.
    allowed: BTreeSet<FunctionId>,
    known_targets: BTreeMap<Target, u32>,
    target_map: BTreeMap<InstId, BTreeSet<Target>>,
    instruction_map: BTreeMap<Target, BTreeSet<InstId>>,
    initialized: BTreeMap<InstId, BTreeSet<Target>>,
    awaiting: VecDeque<InstId>,
    queued: VecDeque<InstId>,
    dismantled: BTreeSet<FunctionId>,
}

impl ConflictCoreInitializer {
    pub fn new(
        ctx: Arc<Context>,
        graph: Arc<CodeGraph>,
        predicate: Arc<dyn BlockPredicate>,
        error_guided: bool,
    ) -> Self {
        ConflictCoreInitializer {
            ctx,
            graph,
            predicate,
            error_guided,
            allowed: BTreeSet::new(),
            known_targets: BTreeMap::new(),
            target_map: BTreeMap::new(),
            instruction_map: BTreeMap::new(),
            initialized: BTreeMap::new(),
            awaiting: VecDeque::new(),
            queued: VecDeque::new(),
            dismantled: BTreeSet::new(),
        }
    }

    pub fn initialize_functions(&mut self, functions: BTreeSet<FunctionId>) {
        self.allowed = functions
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Pop the next scheduled start instruction with its targets.
    pub fn select_action(&mut self) -> (InstId, BTreeSet<Target>) {
        let ki = self.queued.pop_front().expect("select_action on empty initializer");
        let targets = self.target_map.remove(&ki).unwrap_or_default();
        assert!(!targets.is_empty());
        for target in &targets {
            if let Some(instructions) = self.instruction_map.get_mut(target) {
                instructions.remove(&ki);
            }
        }
        (ki, targets)
    }

    pub fn update(&mut self, om: &ObjectManager, added: &[PobId], removed: &[PobId]) {
        for pob in added {
            if om.try_pob(*pob).is_some() {
                self.add_pob(om, *pob)
            }
        }
        for pob in removed {
            if om.try_pob(*pob).is_some() {
                self.remove_pob(om, *pob)
            }
        }
    }

    /// The instruction isolated execution starts from inside a block:
    /// past the call of an interesting call block, else the first
    /// instruction.
    fn start_instruction(&self, module: &Module, block: BlockId) -> InstId {
        if self.predicate.interesting_call_block(module, module.block(block)) {
            InstId::new(block, 1)
        } else {
            InstId::new(block, 0)
        }
    }

    fn add_pob(&mut self, om: &ObjectManager, pob: PobId) {
        let target = om.pob(pob).location.clone();
        let module = om.module().clone();
        let known = self.known_targets.entry(target.clone()).or_insert(0);
        *known += 1;
        if *known > 1 {
            // There has been such a target already
            return;
        }

        let block = target.block();
        let function = module.function_of(block);

        if function.entry != block {
            let backstep = self.graph.nearest_predicate_satisfying(block, &*self.predicate, false);
            for from in backstep {
                let from_inst = self.start_instruction(&module, from);
                let to_blocks = self.graph.nearest_predicate_satisfying(from, &*self.predicate, true);
                for to in to_blocks {
                    let reach = self.ctx.targets.reach_block(to, false);
                    self.add_init(&module, from_inst, reach);
                }
                self.add_init(&module, from_inst, target.clone());
            }
        } else {
            // Obligations at a function entry restart from the
            // allowed callers' call blocks
            for caller in self.allowed.clone() {
                for call_block in &module.function(caller).call_blocks {
                    if module.block(*call_block).called.contains(&function.id) {
                        let from_inst = module.block(*call_block).first_instruction();
                        let reach = self.ctx.targets.reach_block(block, false);
                        self.add_init(&module, from_inst, reach);
                        self.add_init(&module, from_inst, target.clone());
                    }
                }
            }
        }

        // Awaiting instructions aimed at this target are now worth
        // running
        let ready: Vec<InstId> = self
            .awaiting
            .iter()
            .copied()
            .filter(|ki| self.target_map.get(ki).map_or(false, |targets| targets.contains(&target)))
            .collect();
        for ki in ready {
            self.awaiting.retain(|other| *other != ki);
            self.queued.push_back(ki);
        }
    }

    fn remove_pob(&mut self, om: &ObjectManager, pob: PobId) {
        let target = om.pob(pob).location.clone();
        let known = self.known_targets.entry(target).or_insert(0);
        assert!(*known != 0);
        *known -= 1;
        if *known > 0 {
            return;
        }

        // Queued instructions with no live target go back to waiting
        let stale: Vec<InstId> = self
            .queued
            .iter()
            .copied()
            .filter(|ki| {
                let targets = match self.target_map.get(ki) {
                    None => return true,
                    Some(targets) => targets,
                };
                !targets.iter().any(|t| self.known_targets.get(t).copied().unwrap_or(0) != 0)
            })
            .collect();
        for ki in stale {
            self.queued.retain(|other| *other != ki);
            self.awaiting.push_back(ki);
        }
    }

    /// Seed isolated runs reproducing an error target: back-step from
    /// the error location and run towards it and the region
    /// boundaries.
    pub fn add_error_init(&mut self, module: &Module, target: &Target) {
        let location = target.block();
        let mut nearest: BTreeSet<BlockId> = BTreeSet::new();
        let at_predicate = self.predicate.test(module, module.block(location));
        if at_predicate && !target.is_that_error(ReachWithError::Reachable) {
            nearest.insert(location);
        } else {
            nearest = self.graph.nearest_predicate_satisfying(location, &*self.predicate, false);
        }
        for from in nearest {
            let from_inst = self.start_instruction(module, from);
            let to_blocks = self.graph.nearest_predicate_satisfying(from, &*self.predicate, true);
            for to in to_blocks {
                let reach = self.ctx.targets.reach_block(to, false);
                self.add_init(module, from_inst, reach);
            }
            if target.is_that_error(ReachWithError::Reachable) {
                let reach = self.ctx.targets.reach_block(location, false);
                self.add_init(module, from_inst, reach);
            } else {
                self.add_init(module, from_inst, target.clone());
            }
        }
    }

    /// A conflict names a path whose constraints cannot all hold.
    /// Dismantle the functions on it so isolated execution covers the
    /// regions the conflicting branch runs through, and bridge the
    /// calls between them.
    pub fn add_conflict_init(&mut self, module: &Module, conflict: &Conflict, target: BlockId) {
        if self.error_guided {
            return;
        }

        let mut functions: BTreeSet<FunctionId> = BTreeSet::new();
        for entry in conflict.path.entries() {
            let function = module.block(entry.block).function;
            if !self.dismantled.contains(&function) {
                functions.insert(function);
                self.dismantled.insert(function);
            }
        }

        for function in &functions {
            let regions = self.graph.dismantle_function(*function, &*self.predicate);
            for (from, to) in regions {
                let from_inst = self.start_instruction(module, from);
                let reach = self.ctx.targets.reach_block(to, false);
                self.add_init(module, from_inst, reach);
            }
            // Bridge the calls: a region ending at a call continues
            // at the callee's entry
            for call_block in &module.function(*function).call_blocks {
                if !self.predicate.interesting_call_block(module, module.block(*call_block)) {
                    continue;
                }
                for called in module.block(*call_block).called.clone() {
                    if module.function(called).is_declaration {
                        continue;
                    }
                    let from_inst = module.block(*call_block).first_instruction();
                    let entry = module.function(called).entry;
                    let reach = self.ctx.targets.reach_block(entry, false);
                    self.add_init(module, from_inst, reach);
                }
            }
        }

        let nearest = self.graph.nearest_predicate_satisfying(target, &*self.predicate, false);
        for from in nearest {
            if from != target {
                let from_inst = self.start_instruction(module, from);
                let reach = self.ctx.targets.reach_block(target, false);
                self.add_init(module, from_inst, reach);
            }
        }
    }

    fn add_init(&mut self, module: &Module, from: InstId, to: Target) {
        let seen = self.initialized.entry(from).or_default();
        if seen.contains(&to) {
            return;
        }
        seen.insert(to.clone());

        log!(
            log::INIT,
            format!("from {} to {} scheduled", module.inst_to_string(from), to.to_string(module))
        );

        self.target_map.entry(from).or_default().insert(to.clone());
        self.instruction_map.entry(to.clone()).or_default().insert(from);

        let awaits = self.awaiting.contains(&from);
        let enqueued = self.queued.contains(&from);
        let known = self.known_targets.get(&to).copied().unwrap_or(0) > 0;

        if !awaits && !enqueued {
            if known {
                self.queued.push_back(from)
            } else {
                self.awaiting.push_back(from)
            }
        } else if awaits && known {
            self.awaiting.retain(|other| *other != from);
            self.queued.push_back(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ObjectManager;
    use crate::ir::{BlockKind, JointBlockPredicate, ModuleBuilder};
    use crate::pob::ProofObligation;

    fn setup() -> (Arc<Context>, Arc<Module>, Arc<CodeGraph>, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Base, 2);
        let b2 = b.add_block(f, BlockKind::Base, 2);
        let b3 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        b.add_edge(b1, b2);
        b.add_edge(b2, b3);
        let module = Arc::new(b.finish());
        let graph = Arc::new(CodeGraph::new(module.clone()));
        (Arc::new(Context::new()), module, graph, vec![b0, b1, b2, b3])
    }

    #[test]
    fn test_pob_schedules_backstep() {
        let (ctx, module, graph, blocks) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut initializer =
            ConflictCoreInitializer::new(ctx.clone(), graph, Arc::new(JointBlockPredicate), false);

        // A pob in the middle of the function: the nearest predicate
        // block backwards is the entry
        let target = ctx.targets.reach_block(blocks[2], false);
        let pob = om.insert_pob(ProofObligation::new_root(&ctx, target.clone()));
        initializer.update(&om, &[pob], &[]);

        assert!(!initializer.is_empty());
        let (ki, targets) = initializer.select_action();
        assert_eq!(ki.block, blocks[0]);
        assert!(targets.contains(&target));

        // The forward step towards the return was scheduled too
        let reach_return = ctx.targets.reach_block(blocks[3], false);
        assert!(targets.contains(&reach_return));
        assert!(initializer.is_empty())
    }

    #[test]
    fn test_entry_pob_uses_allowed_callers() {
        let (ctx, _, _, _) = setup();
        let mut b = ModuleBuilder::new();
        let g = b.add_function("g", 0, true);
        let g0 = b.add_block(g, BlockKind::Base, 2);
        let g1 = b.add_block(g, BlockKind::Return, 1);
        b.add_edge(g0, g1);
        let f = b.add_function("f", 0, true);
        let f0 = b.add_call_block(f, &[g]);
        let f1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(f0, f1);
        let module = Arc::new(b.finish());
        let graph = Arc::new(CodeGraph::new(module.clone()));

        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut initializer =
            ConflictCoreInitializer::new(ctx.clone(), graph, Arc::new(JointBlockPredicate), false);
        let mut allowed = BTreeSet::new();
        allowed.insert(f);
        initializer.initialize_functions(allowed);

        let target = ctx.targets.reach_block(g0, false);
        let pob = om.insert_pob(ProofObligation::new_root(&ctx, target.clone()));
        initializer.update(&om, &[pob], &[]);

        assert!(!initializer.is_empty());
        let (ki, targets) = initializer.select_action();
        assert_eq!(ki, module.block(f0).first_instruction());
        assert!(targets.contains(&target))
    }

    #[test]
    fn test_awaiting_moves_to_queued() {
        let (ctx, module, graph, blocks) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut initializer =
            ConflictCoreInitializer::new(ctx.clone(), graph, Arc::new(JointBlockPredicate), false);

        // Seed an instruction aimed at a target nobody wants yet
        let lonely = ctx.targets.reach_block(blocks[1], false);
        initializer.add_init(&module, InstId::new(blocks[0], 0), lonely.clone());
        assert!(initializer.is_empty());

        // Once a pob at that target appears, the instruction queues up
        let pob = om.insert_pob(ProofObligation::new_root(&ctx, lonely));
        initializer.update(&om, &[pob], &[]);
        assert!(!initializer.is_empty());

        // And parks again when the pob goes away
        initializer.update(&om, &[], &[pob]);
        assert!(initializer.is_empty())
    }
}
