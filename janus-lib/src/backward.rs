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

//! Backward selection: which (reached state, proof obligation) pair
//! to try composing next. The recency-ranked policy prefers pairs
//! that were propagated least, pausing pairs past the configured
//! bound; the random-path policy walks the pob trees, biased towards
//! subtrees that still have propagations to offer.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use std::collections::{BTreeMap, BTreeSet};

use crate::hub::{ObjectManager, Propagation};
use crate::pob::PobId;
use crate::state::StateId;

pub trait BackwardSearcher {
    /// Pick the next propagation. Calling this on an empty searcher
    /// is a programming error.
    fn select_action(&mut self, om: &ObjectManager) -> Propagation;

    fn update_propagations(&mut self, om: &mut ObjectManager, added: &[Propagation], removed: &[Propagation]);

    fn update_pobs(&mut self, om: &mut ObjectManager, added: &[PobId], removed: &[PobId]);

    fn is_empty(&self) -> bool;
}

/// Selects the propagation whose per-(state, pob) use count is least,
/// stopping early at zero. Pairs past `max_propagations` uses are
/// paused rather than dropped.
pub struct RecencyRankedSearcher {
    max_propagations: u64,
    propagations: Vec<Propagation>,
    paused: Vec<Propagation>,
}

impl RecencyRankedSearcher {
    pub fn new(max_propagations: u64) -> Self {
        RecencyRankedSearcher { max_propagations, propagations: Vec::new(), paused: Vec::new() }
    }

    fn count(om: &ObjectManager, prop: &Propagation) -> u64 {
        om.try_pob(prop.pob)
            .and_then(|pob| pob.propagation_count.get(&prop.state))
            .copied()
            .unwrap_or(0) as u64
    }
}

impl BackwardSearcher for RecencyRankedSearcher {
    fn select_action(&mut self, om: &ObjectManager) -> Propagation {
        let mut least = u64::MAX;
        let mut chosen = None;
        for prop in &self.propagations {
            let count = Self::count(om, prop);
            if count < least {
                least = count;
                chosen = Some(*prop);
                if least == 0 {
                    break;
                }
            }
        }
        chosen.expect("select_action on empty backward searcher")
    }

    fn update_propagations(&mut self, om: &mut ObjectManager, added: &[Propagation], removed: &[Propagation]) {
        for prop in removed {
            self.propagations.retain(|other| other != prop);
            self.paused.retain(|other| other != prop);
        }
        for prop in added {
            if Self::count(om, prop) <= self.max_propagations {
                self.propagations.push(*prop)
            } else {
                self.paused.push(*prop)
            }
        }
    }

    fn update_pobs(&mut self, _: &mut ObjectManager, _: &[PobId], _: &[PobId]) {}

    fn is_empty(&self) -> bool {
        self.propagations.is_empty()
    }
}

/// Walks a random live pob tree from its root, descending into
/// subtrees that still carry propagations, then picks a random state
/// among the chosen pob's candidates.
pub struct RandomPathBackwardSearcher {
    root_pobs: BTreeSet<PobId>,
    propagations: BTreeMap<PobId, BTreeSet<StateId>>,
    propagation_count: usize,
    rng: SmallRng,
}

impl RandomPathBackwardSearcher {
    pub fn new(seed: u64) -> Self {
        RandomPathBackwardSearcher {
            root_pobs: BTreeSet::new(),
            propagations: BTreeMap::new(),
            propagation_count: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn has_props(&self, pob: PobId) -> bool {
        self.propagations.get(&pob).map_or(false, |states| !states.is_empty())
    }
}

impl BackwardSearcher for RandomPathBackwardSearcher {
    fn select_action(&mut self, om: &ObjectManager) -> Propagation {
        // Choose a tree among the roots that can still propagate
        let live_roots: Vec<PobId> = self
            .root_pobs
            .iter()
            .copied()
            .filter(|root| om.try_pob(*root).map_or(false, |pob| pob.subtree_propagation_count > 0))
            .collect();
        assert!(!live_roots.is_empty(), "select_action on empty backward searcher");
        let mut current = live_roots[self.rng.gen_range(0..live_roots.len())];

        // Random path through the tree
        let chosen = loop {
            let mut live_children: Vec<PobId> = Vec::new();
            for child in &om.pob(current).children {
                if om.try_pob(*child).map_or(false, |pob| pob.subtree_propagation_count > 0) {
                    live_children.push(*child)
                }
            }
            let here = self.has_props(current) as usize;
            assert!(here + live_children.len() > 0);
            let choice = self.rng.gen_range(0..here + live_children.len());
            if choice == 0 && here == 1 {
                break current;
            }
            current = live_children[choice - here];
        };

        let states = &self.propagations[&chosen];
        assert!(!states.is_empty());
        let index = self.rng.gen_range(0..states.len());
        let state = *states.iter().nth(index).unwrap();
        Propagation { state, pob: chosen }
    }

    fn update_propagations(&mut self, om: &mut ObjectManager, added: &[Propagation], removed: &[Propagation]) {
        for prop in removed {
            if let Some(states) = self.propagations.get_mut(&prop.pob) {
                if states.remove(&prop.state) {
                    self.propagation_count -= 1;
                }
                if states.is_empty() {
                    // The pob lost its last candidate; the whole
                    // ancestor chain has one fewer propagatable node
                    let mut cursor = Some(prop.pob);
                    while let Some(pob) = cursor {
                        match om.pob_arena_mut().get_mut(&pob) {
                            None => break,
                            Some(node) => {
                                node.subtree_propagation_count = node.subtree_propagation_count.saturating_sub(1);
                                cursor = node.parent
                            }
                        }
                    }
                }
            }
        }

        for prop in added {
            let states = self.propagations.entry(prop.pob).or_insert_with(BTreeSet::new);
            if states.is_empty() {
                let mut cursor = Some(prop.pob);
                while let Some(pob) = cursor {
                    match om.pob_arena_mut().get_mut(&pob) {
                        None => break,
                        Some(node) => {
                            node.subtree_propagation_count += 1;
                            cursor = node.parent
                        }
                    }
                }
            }
            if states.insert(prop.state) {
                self.propagation_count += 1;
            }
        }
    }

    fn update_pobs(&mut self, om: &mut ObjectManager, added: &[PobId], removed: &[PobId]) {
        for pob in added {
            if om.try_pob(*pob).map_or(false, |p| p.parent.is_none()) {
                self.root_pobs.insert(*pob);
            }
        }
        for pob in removed {
            self.root_pobs.remove(pob);
            if let Some(states) = self.propagations.remove(pob) {
                self.propagation_count -= states.len();
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.propagation_count == 0
    }
}

/// Round-robins across several backward searchers.
pub struct InterleavedBackwardSearcher {
    searchers: Vec<Box<dyn BackwardSearcher>>,
    index: usize,
    propagation_count: usize,
}

impl InterleavedBackwardSearcher {
    pub fn new(searchers: Vec<Box<dyn BackwardSearcher>>) -> Self {
        assert!(!searchers.is_empty());
        let index = searchers.len();
        InterleavedBackwardSearcher { searchers, index, propagation_count: 0 }
    }
}

impl BackwardSearcher for InterleavedBackwardSearcher {
    fn select_action(&mut self, om: &ObjectManager) -> Propagation {
        self.index -= 1;
        let chosen = self.index;
        if self.index == 0 {
            self.index = self.searchers.len()
        }
        self.searchers[chosen].select_action(om)
    }

    fn update_propagations(&mut self, om: &mut ObjectManager, added: &[Propagation], removed: &[Propagation]) {
        for searcher in &mut self.searchers {
            searcher.update_propagations(om, added, removed)
        }
        self.propagation_count += added.len();
        self.propagation_count -= removed.len().min(self.propagation_count);
    }

    fn update_pobs(&mut self, om: &mut ObjectManager, added: &[PobId], removed: &[PobId]) {
        for searcher in &mut self.searchers {
            searcher.update_pobs(om, added, removed)
        }
    }

    fn is_empty(&self) -> bool {
        self.propagation_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Context;
    use crate::ir::{BlockKind, ModuleBuilder};
    use crate::pob::ProofObligation;
    use crate::state::ExecutionState;
    use std::sync::Arc;

    fn setup() -> (ObjectManager, Vec<StateId>, Vec<PobId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let module = Arc::new(b.finish());
        let ctx = Arc::new(Context::new());
        let mut om = ObjectManager::new(ctx.clone(), module.clone());

        let s1 = om.add_initial_state(ExecutionState::initial(&ctx, &module, f));
        let s2 = om.add_initial_state(ExecutionState::initial(&ctx, &module, f));

        let target = ctx.targets.reach_block(b0, false);
        let p1 = om.insert_pob(ProofObligation::new_root(&ctx, target.clone()));
        let p2 = om.insert_pob(ProofObligation::new_root(&ctx, target));
        (om, vec![s1, s2], vec![p1, p2])
    }

    #[test]
    fn test_recency_ranked_prefers_least_used() {
        let (mut om, states, pobs) = setup();
        let mut searcher = RecencyRankedSearcher::new(u64::MAX);

        let p1 = Propagation { state: states[0], pob: pobs[0] };
        let p2 = Propagation { state: states[1], pob: pobs[0] };
        om.pob_mut(pobs[0]).propagation_count.insert(states[0], 3);
        searcher.update_propagations(&mut om, &[p1, p2], &[]);

        // The unused pair wins
        assert_eq!(searcher.select_action(&om), p2);
        searcher.update_propagations(&mut om, &[], &[p2]);
        assert_eq!(searcher.select_action(&om), p1)
    }

    #[test]
    fn test_recency_ranked_pauses_over_limit() {
        let (mut om, states, pobs) = setup();
        let mut searcher = RecencyRankedSearcher::new(1);
        om.pob_mut(pobs[0]).propagation_count.insert(states[0], 5);
        let over = Propagation { state: states[0], pob: pobs[0] };
        searcher.update_propagations(&mut om, &[over], &[]);
        assert!(searcher.is_empty())
    }

    #[test]
    fn test_random_path_backward() {
        let (mut om, states, pobs) = setup();
        let mut searcher = RandomPathBackwardSearcher::new(11);
        searcher.update_pobs(&mut om, &pobs, &[]);
        assert!(searcher.is_empty());

        let prop = Propagation { state: states[0], pob: pobs[0] };
        searcher.update_propagations(&mut om, &[prop], &[]);
        assert!(!searcher.is_empty());
        assert_eq!(om.pob(pobs[0]).subtree_propagation_count, 1);
        assert_eq!(searcher.select_action(&om), prop);

        searcher.update_propagations(&mut om, &[], &[prop]);
        assert!(searcher.is_empty());
        assert_eq!(om.pob(pobs[0]).subtree_propagation_count, 0)
    }
}
