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

//! The bidirectional scheduler interleaves four kinds of work with a
//! quota ticker: stepping a regular state forward, stepping an
//! isolated state (branch mode), propagating a reached state back
//! into a proof obligation, and initializing a new isolated state.
//! Each call to [BidirectionalSearcher::select_action] produces one
//! action for the executor.

use std::collections::BTreeSet;

use crate::backward::BackwardSearcher;
use crate::hub::{Event, ObjectManager, Propagation, Subscriber};
use crate::initializer::ConflictCoreInitializer;
use crate::ir::InstId;
use crate::searcher::Searcher;
use crate::state::StateId;
use crate::target::Target;
use crate::ticker::Ticker;

#[derive(Clone, Debug)]
pub enum Action {
    Forward(StateId),
    Backward(Propagation),
    Initialize(InstId, BTreeSet<Target>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StepKind {
    Forward,
    Branch,
    Backward,
    Initialize,
}

pub struct BidirectionalSearcher {
    ticker: Ticker,
    forward: Box<dyn Searcher>,
    branch: Box<dyn Searcher>,
    backward: Box<dyn BackwardSearcher>,
    initializer: ConflictCoreInitializer,
}

impl BidirectionalSearcher {
    /// The default quotas skip the forward slot; plain forward
    /// exploration is driven by the coverage engine, not the
    /// bidirectional core.
    pub fn new(
        ticks: Vec<u32>,
        forward: Box<dyn Searcher>,
        branch: Box<dyn Searcher>,
        backward: Box<dyn BackwardSearcher>,
        initializer: ConflictCoreInitializer,
    ) -> Self {
        BidirectionalSearcher { ticker: Ticker::new(ticks), forward, branch, backward, initializer }
    }

    fn slot_available(&self, slot: StepKind) -> bool {
        match slot {
            StepKind::Forward => !self.forward.is_empty(),
            StepKind::Branch => !self.branch.is_empty(),
            StepKind::Backward => !self.backward.is_empty(),
            StepKind::Initialize => !self.initializer.is_empty(),
        }
    }

    fn select_step(&mut self, _om: &ObjectManager) -> StepKind {
        let slots = [StepKind::Forward, StepKind::Branch, StepKind::Backward, StepKind::Initialize];
        let initial_choice = self.ticker.get_current();
        let mut choice = initial_choice;

        loop {
            let slot = slots[choice];
            if self.slot_available(slot) {
                return slot;
            }
            self.ticker.move_to_next();
            choice = self.ticker.get_current();
            if choice == initial_choice {
                break;
            }
        }
        panic!("Empty searcher queried for an action")
    }

    pub fn select_action(&mut self, om: &ObjectManager) -> Action {
        match self.select_step(om) {
            StepKind::Forward => Action::Forward(self.forward.select_state(om)),
            StepKind::Branch => Action::Forward(self.branch.select_state(om)),
            StepKind::Backward => Action::Backward(self.backward.select_action(om)),
            StepKind::Initialize => {
                let (location, targets) = self.initializer.select_action();
                Action::Initialize(location, targets)
            }
        }
    }

    pub fn is_empty(&self, _om: &ObjectManager) -> bool {
        let ticks = self.ticker.ticks();
        (self.forward.is_empty() || ticks[0] == 0)
            && (self.branch.is_empty() || ticks[1] == 0)
            && (self.backward.is_empty() || ticks[2] == 0)
            && (self.initializer.is_empty() || ticks[3] == 0)
    }

    pub fn initializer_mut(&mut self) -> &mut ConflictCoreInitializer {
        &mut self.initializer
    }
}

impl Subscriber for BidirectionalSearcher {
    fn update(&mut self, event: &Event, om: &mut ObjectManager) {
        match event {
            Event::States { modified, added, removed, isolated } => {
                if *isolated {
                    self.branch.update(om, *modified, added, removed)
                } else {
                    self.forward.update(om, *modified, added, removed)
                }
            }
            Event::Propagations { added, removed } => self.backward.update_propagations(om, added, removed),
            Event::ProofObligations { added, removed, .. } => {
                self.initializer.update(om, added, removed);
                self.backward.update_pobs(om, added, removed)
            }
            Event::Conflicts { conflicts } => {
                let module = om.module().clone();
                for targeted in conflicts {
                    self.initializer.add_conflict_init(&module, &targeted.conflict, targeted.target)
                }
            }
        }
    }
}

/// A plain forward scheduler with the same action interface, used
/// when exploration is not bidirectional.
pub struct ForwardOnlySearcher {
    searcher: Box<dyn Searcher>,
}

impl ForwardOnlySearcher {
    pub fn new(searcher: Box<dyn Searcher>) -> Self {
        ForwardOnlySearcher { searcher }
    }

    pub fn select_action(&mut self, om: &ObjectManager) -> Action {
        Action::Forward(self.searcher.select_state(om))
    }

    pub fn is_empty(&self) -> bool {
        self.searcher.is_empty()
    }
}

impl Subscriber for ForwardOnlySearcher {
    fn update(&mut self, event: &Event, om: &mut ObjectManager) {
        if let Event::States { modified, added, removed, isolated } = event {
            assert!(!isolated);
            self.searcher.update(om, *modified, added, removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backward::RecencyRankedSearcher;
    use crate::expr::Context;
    use crate::graph::CodeGraph;
    use crate::ir::{BlockKind, JointBlockPredicate, ModuleBuilder};
    use crate::pob::ProofObligation;
    use crate::searcher::DfsSearcher;
    use crate::state::ExecutionState;
    use std::sync::Arc;

    fn scheduler(om: &ObjectManager, ticks: Vec<u32>) -> BidirectionalSearcher {
        let graph = Arc::new(CodeGraph::new(om.module().clone()));
        let initializer = ConflictCoreInitializer::new(
            om.ctx().clone(),
            graph,
            Arc::new(JointBlockPredicate),
            false,
        );
        BidirectionalSearcher::new(
            ticks,
            Box::new(DfsSearcher::new()),
            Box::new(DfsSearcher::new()),
            Box::new(RecencyRankedSearcher::new(u64::MAX)),
            initializer,
        )
    }

    fn setup() -> (Arc<Context>, Arc<crate::ir::Module>, crate::ir::FunctionId) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        (Arc::new(Context::new()), Arc::new(b.finish()), f)
    }

    #[test]
    #[should_panic]
    fn test_empty_scheduler_aborts() {
        let (ctx, module, _) = setup();
        let om = ObjectManager::new(ctx, module);
        let mut sched = scheduler(&om, vec![0, 30, 30, 30]);
        sched.select_action(&om);
    }

    #[test]
    fn test_skips_empty_slots() {
        let (ctx, module, f) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut sched = scheduler(&om, vec![0, 30, 30, 30]);

        // Only the backward slot has work
        let state = ExecutionState::initial(&ctx, &module, f);
        let state_id = om.add_initial_state(state);
        let target = ctx.targets.reach_block(module.function(f).entry, false);
        let pob_id = om.insert_pob(ProofObligation::new_root(&ctx, target));
        let prop = Propagation { state: state_id, pob: pob_id };
        sched.backward.update_propagations(&mut om, &[prop], &[]);

        match sched.select_action(&om) {
            Action::Backward(selected) => assert_eq!(selected, prop),
            other => panic!("expected a backward action, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_slot_selected_when_enabled() {
        let (ctx, module, f) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        let mut sched = scheduler(&om, vec![10, 10, 10, 10]);

        let state = ExecutionState::initial(&ctx, &module, f);
        let state_id = om.add_initial_state(state);
        sched.forward.update(&om, None, &[state_id], &[]);

        assert!(!sched.is_empty(&om));
        match sched.select_action(&om) {
            Action::Forward(selected) => assert_eq!(selected, state_id),
            other => panic!("expected a forward action, got {:?}", other),
        }
    }
}
