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

//! The object manager is the single event bus of the engine. It owns
//! every live state and proof obligation, buffers the mutations a
//! scheduling cycle performs, and fans them out to the subscribers in
//! a fixed order (states, propagations, proof obligations, conflicts)
//! when [ObjectManager::update_subscribers] runs.
//!
//! While handling the states event for isolated states, the hub
//! detects states that reached the target at the head of their
//! history, snapshots them into the reached-state index, and pairs
//! them with matching proof obligations as new propagations (gated by
//! [ObjectManager::check_stack]). For regular states it closes any
//! parent-less obligation whose location was reached outright, which
//! is a true positive found by plain forward execution.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::expr::{Context, ExprRef};
use crate::ir::{BlockId, BlockPredicate, InstId, Module};
use crate::log;
use crate::path::Path;
use crate::pob::{self, PobArena, PobId, ProofObligation};
use crate::process::PForest;
use crate::state::{ExecutionState, StateId};
use crate::target::Target;
use crate::targeting::is_reached_target;

/// A candidate match between a reached isolated state and an open
/// proof obligation, awaiting composition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Propagation {
    pub state: StateId,
    pub pob: PobId,
}

/// An infeasibility core discovered on some path, pointing backward
/// execution at the block it conflicts with.
#[derive(Clone, Debug)]
pub struct Conflict {
    pub path: Path,
    pub core: Vec<ExprRef>,
}

#[derive(Clone, Debug)]
pub struct TargetedConflict {
    pub conflict: Conflict,
    pub target: BlockId,
}

#[derive(Clone, Debug)]
pub enum Event {
    States { modified: Option<StateId>, added: Vec<StateId>, removed: Vec<StateId>, isolated: bool },
    Propagations { added: Vec<Propagation>, removed: Vec<Propagation> },
    ProofObligations { context: Option<StateId>, added: Vec<PobId>, removed: Vec<PobId> },
    Conflicts { conflicts: Vec<TargetedConflict> },
}

pub trait Subscriber {
    fn update(&mut self, event: &Event, om: &mut ObjectManager);
}

pub struct ObjectManager {
    ctx: Arc<Context>,
    module: Arc<Module>,
    predicate: Option<Arc<dyn BlockPredicate>>,

    state_arena: BTreeMap<StateId, ExecutionState>,
    pob_arena: PobArena,
    pub process_forest: PForest,
    empty_state: Option<ExecutionState>,

    pub states: BTreeSet<StateId>,
    pub isolated_states: BTreeSet<StateId>,
    pub leaf_pobs: BTreeSet<PobId>,
    pub root_pobs: BTreeSet<PobId>,
    pub reached_states: BTreeMap<Target, BTreeSet<StateId>>,
    pub pobs_at: BTreeMap<Target, BTreeSet<PobId>>,
    pathed_pobs: HashMap<(Path, Target), PobId, ahash::RandomState>,
    pub propagations: BTreeMap<Target, BTreeSet<Propagation>>,
    pub propagation_count: BTreeMap<PobId, u32>,

    /// Per-(history, target) state deltas the target manager collects
    /// while handling a states event, consumed by the guided
    /// searchers during the same event and cleared afterwards.
    pub targeting_added: BTreeMap<(crate::forest::History, Target), Vec<StateId>>,
    pub targeting_removed: BTreeMap<(crate::forest::History, Target), Vec<StateId>>,

    // Buffered mutations, applied when subscribers are updated
    states_updated: bool,
    state_update_isolated: Option<bool>,
    current: Option<StateId>,
    added_states: Vec<StateId>,
    removed_states: Vec<StateId>,
    context_state: Option<StateId>,
    added_pobs: BTreeSet<PobId>,
    removed_pobs: BTreeSet<PobId>,
    added_propagations: BTreeSet<Propagation>,
    removed_propagations: BTreeSet<Propagation>,
    added_conflicts: Vec<TargetedConflict>,
}

impl ObjectManager {
    pub fn new(ctx: Arc<Context>, module: Arc<Module>) -> Self {
        ObjectManager {
            ctx,
            module,
            predicate: None,
            state_arena: BTreeMap::new(),
            pob_arena: PobArena::new(),
            process_forest: PForest::new(),
            empty_state: None,
            states: BTreeSet::new(),
            isolated_states: BTreeSet::new(),
            leaf_pobs: BTreeSet::new(),
            root_pobs: BTreeSet::new(),
            reached_states: BTreeMap::new(),
            pobs_at: BTreeMap::new(),
            pathed_pobs: HashMap::default(),
            propagations: BTreeMap::new(),
            propagation_count: BTreeMap::new(),
            targeting_added: BTreeMap::new(),
            targeting_removed: BTreeMap::new(),
            states_updated: false,
            state_update_isolated: None,
            current: None,
            added_states: Vec::new(),
            removed_states: Vec::new(),
            context_state: None,
            added_pobs: BTreeSet::new(),
            removed_pobs: BTreeSet::new(),
            added_propagations: BTreeSet::new(),
            removed_propagations: BTreeSet::new(),
            added_conflicts: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn set_predicate(&mut self, predicate: Arc<dyn BlockPredicate>) {
        self.predicate = Some(predicate)
    }

    pub fn set_empty_state(&mut self, state: ExecutionState) {
        self.empty_state = Some(state)
    }

    pub fn state(&self, id: StateId) -> &ExecutionState {
        &self.state_arena[&id]
    }

    pub fn try_state(&self, id: StateId) -> Option<&ExecutionState> {
        self.state_arena.get(&id)
    }

    pub fn state_mut(&mut self, id: StateId) -> &mut ExecutionState {
        self.state_arena.get_mut(&id).expect("unknown state")
    }

    pub fn pob(&self, id: PobId) -> &ProofObligation {
        &self.pob_arena[&id]
    }

    pub fn try_pob(&self, id: PobId) -> Option<&ProofObligation> {
        self.pob_arena.get(&id)
    }

    pub fn pob_mut(&mut self, id: PobId) -> &mut ProofObligation {
        self.pob_arena.get_mut(&id).expect("unknown pob")
    }

    pub fn pob_arena(&self) -> &PobArena {
        &self.pob_arena
    }

    pub fn pob_arena_mut(&mut self) -> &mut PobArena {
        &mut self.pob_arena
    }

    /// Register the entry state of an exploration. A final-composing
    /// isolated snapshot of it is immediately considered reached at
    /// its own location, so backward propagation can finish at the
    /// program entry.
    pub fn add_initial_state(&mut self, mut state: ExecutionState) -> StateId {
        let mut snapshot = state.copy();
        snapshot.isolated = true;
        snapshot.final_composing = true;
        let location = snapshot
            .location_target(&self.ctx, &self.module)
            .expect("initial state must start at a block boundary");
        let snapshot_id = snapshot.id;
        self.state_arena.insert(snapshot_id, snapshot);
        self.reached_states.entry(location).or_default().insert(snapshot_id);

        let id = state.id;
        let node = self.process_forest.add_root(id);
        state.ptree_node = Some(node);
        self.state_arena.insert(id, state);
        self.states.insert(id);
        id
    }

    pub fn set_current_state(&mut self, id: StateId) {
        assert!(self.current.is_none());
        self.current = Some(id);
        self.states_updated = true;
        self.state_update_isolated = Some(self.state_arena[&id].isolated);
    }

    pub fn set_context_state(&mut self, id: StateId) {
        assert!(self.context_state.is_none());
        self.context_state = Some(id);
    }

    /// Fork a state; the copy enters the pending added set and the
    /// process forest.
    pub fn branch_state(&mut self, id: StateId) -> StateId {
        let isolated = self.state_arena[&id].isolated;
        assert_eq!(
            self.state_update_isolated,
            Some(isolated),
            "a branch must happen inside a tick of its own kind"
        );
        let mut new_state = self.state_arena[&id].branch();
        let new_id = new_state.id;
        let at = self.state_arena[&id].ptree_node.expect("branching a state outside the process forest");
        let (left, right) = self.process_forest.attach(at, new_id, id);
        new_state.ptree_node = Some(left);
        self.state_arena.get_mut(&id).unwrap().ptree_node = Some(right);
        self.state_arena.insert(new_id, new_state);
        self.added_states.push(new_id);
        new_id
    }

    pub fn remove_state(&mut self, id: StateId) {
        assert!(!self.removed_states.contains(&id), "state removed twice in one tick");
        let isolated = self.state_arena[&id].isolated;
        if !self.states_updated {
            self.states_updated = true;
            self.state_update_isolated = Some(isolated);
        } else {
            assert_eq!(self.state_update_isolated, Some(isolated));
        }
        self.removed_states.push(id)
    }

    /// Start an isolated state at an interior instruction, aimed at a
    /// set of targets.
    pub fn initialize_state(&mut self, location: InstId, targets: BTreeSet<Target>) -> StateId {
        let empty = self.empty_state.as_ref().expect("no empty state installed");
        let mut state = empty.with_instruction(&self.ctx, &self.module, location);
        state.set_targeted(true);
        for target in targets {
            state.target_forest.add_target(&self.ctx, target)
        }
        let history = state.target_forest.history().clone();
        let targets = state.target_forest.targets();
        state.set_history(history);
        state.set_targets(targets);

        let id = state.id;
        let node = self.process_forest.add_root(id);
        state.ptree_node = Some(node);
        self.state_arena.insert(id, state);
        self.states_updated = true;
        self.state_update_isolated = Some(true);
        self.added_states.push(id);
        id
    }

    /// Place a freshly built pob into the arena. It only becomes
    /// visible to subscribers through [ObjectManager::add_pob].
    pub fn insert_pob(&mut self, pob: ProofObligation) -> PobId {
        let id = pob.id;
        self.pob_arena.insert(id, pob);
        id
    }

    pub fn pob_exists(&self, pob: PobId) -> bool {
        let pob = &self.pob_arena[&pob];
        self.pathed_pobs.contains_key(&(pob.constraints.path().clone(), pob.location.clone()))
    }

    pub fn add_pob(&mut self, id: PobId) {
        assert!(!self.pob_exists(id), "a pob with this path and location is already live");
        let (path, location, parentless) = {
            let pob = &self.pob_arena[&id];
            (pob.constraints.path().clone(), pob.location.clone(), pob.parent.is_none())
        };
        if parentless {
            log!(log::POB, format!("new root proof obligation at {}", location.to_string(&self.module)));
            self.root_pobs.insert(id);
        }
        self.added_pobs.insert(id);
        self.pathed_pobs.insert((path, location.clone()), id);

        if let Some(reached) = self.reached_states.get(&location) {
            let candidates: Vec<StateId> = reached.iter().copied().collect();
            for state in candidates {
                if self.check_stack(state, id) {
                    self.added_propagations.insert(Propagation { state, pob: id });
                }
            }
        }
    }

    /// Remove an obligation and its whole subtree; the deletion is
    /// deferred to the end of the tick.
    pub fn remove_pob(&mut self, id: PobId) {
        for pob in pob::subtree(&self.pob_arena, id) {
            if self.pob_arena[&pob].parent.is_none() {
                self.root_pobs.remove(&pob);
            }
            self.removed_pobs.insert(pob);
            let key =
                (self.pob_arena[&pob].constraints.path().clone(), self.pob_arena[&pob].location.clone());
            self.pathed_pobs.remove(&key);
            if let Some(props) = self.propagations.get(&self.pob_arena[&pob].location) {
                for prop in props.iter().filter(|prop| prop.pob == pob) {
                    self.removed_propagations.insert(*prop);
                }
            }
        }
    }

    pub fn add_targeted_conflict(&mut self, conflict: TargetedConflict) {
        self.added_conflicts.push(conflict)
    }

    pub fn remove_propagation(&mut self, prop: Propagation) {
        self.removed_propagations.insert(prop);
    }

    /// Whether a reached state's calling context is compatible with a
    /// pob's: the shared tail frames must agree on the function, and
    /// on the callsite when the pob knows one.
    pub fn check_stack(&self, state: StateId, pob: PobId) -> bool {
        let state = &self.state_arena[&state];
        let pob = &self.pob_arena[&pob];
        if state.stack.size() == 0 {
            return true;
        }

        let calls = state.stack.call_stack();
        let range = std::cmp::min(calls.len() - 1, pob.stack.len());
        for i in 0..range {
            let ours = calls[calls.len() - 1 - i];
            let theirs = pob.stack[pob.stack.len() - 1 - i];
            if ours.function != theirs.function {
                return false;
            }
            if let Some(callsite) = theirs.caller {
                if Some(callsite) != ours.caller {
                    return false;
                }
            }
        }
        true
    }

    /// Fan the buffered mutations out. `target_managers` receive the
    /// states event before reached targets are examined (their forest
    /// stepping is what the reached check observes) and the pobs event
    /// alongside everyone else.
    pub fn update_subscribers(
        &mut self,
        target_managers: &mut [&mut dyn Subscriber],
        subscribers: &mut [&mut dyn Subscriber],
    ) {
        if self.states_updated {
            let isolated = self.state_update_isolated.expect("state update without a kind");

            let event = Event::States {
                modified: self.current,
                added: self.added_states.clone(),
                removed: self.removed_states.clone(),
                isolated,
            };
            for tgms in target_managers.iter_mut() {
                tgms.update(&event, self)
            }

            if isolated {
                self.check_reached_states();
            } else {
                self.check_reached_pobs();
            }

            // The reached checks may have scheduled more removals
            let event = Event::States {
                modified: self.current,
                added: self.added_states.clone(),
                removed: self.removed_states.clone(),
                isolated,
            };
            for subscriber in subscribers.iter_mut() {
                subscriber.update(&event, self)
            }
            self.targeting_added.clear();
            self.targeting_removed.clear();

            for state in self.added_states.clone() {
                if isolated {
                    self.isolated_states.insert(state);
                } else {
                    self.states.insert(state);
                }
            }
            for state in self.removed_states.clone() {
                if let Some(node) = self.state_arena[&state].ptree_node {
                    self.process_forest.remove(node)
                }
                if isolated {
                    self.isolated_states.remove(&state);
                } else {
                    self.states.remove(&state);
                }
                self.state_arena.remove(&state);
            }

            self.current = None;
            self.added_states.clear();
            self.removed_states.clear();
            self.states_updated = false;
            self.state_update_isolated = None;
        }

        {
            let event = Event::Propagations {
                added: self.added_propagations.iter().copied().collect(),
                removed: self.removed_propagations.iter().copied().collect(),
            };
            for subscriber in subscribers.iter_mut() {
                subscriber.update(&event, self)
            }
            for prop in std::mem::take(&mut self.added_propagations) {
                self.propagations.entry(self.pob_arena[&prop.pob].location.clone()).or_default().insert(prop);
                *self.propagation_count.entry(prop.pob).or_insert(0) += 1;
            }
            for prop in std::mem::take(&mut self.removed_propagations) {
                if let Some(pob) = self.pob_arena.get(&prop.pob) {
                    if let Some(props) = self.propagations.get_mut(&pob.location) {
                        props.remove(&prop);
                    }
                }
                if let Some(count) = self.propagation_count.get_mut(&prop.pob) {
                    assert!(*count > 0);
                    *count -= 1;
                }
            }
        }

        {
            let event = Event::ProofObligations {
                context: self.context_state,
                added: self.added_pobs.iter().copied().collect(),
                removed: self.removed_pobs.iter().copied().collect(),
            };
            for tgms in target_managers.iter_mut() {
                tgms.update(&event, self)
            }
            for subscriber in subscribers.iter_mut() {
                subscriber.update(&event, self)
            }

            for id in std::mem::take(&mut self.added_pobs) {
                let (location, parent, childless) = {
                    let pob = &self.pob_arena[&id];
                    (pob.location.clone(), pob.parent, pob.children.is_empty())
                };
                self.pobs_at.entry(location).or_default().insert(id);
                if let Some(parent) = parent {
                    self.leaf_pobs.remove(&parent);
                }
                if childless {
                    self.leaf_pobs.insert(id);
                }
            }
            let removed = std::mem::take(&mut self.removed_pobs);
            for id in &removed {
                self.leaf_pobs.remove(id);
                let (location, parent) = {
                    let pob = &self.pob_arena[id];
                    (pob.location.clone(), pob.parent)
                };
                if let Some(pobs) = self.pobs_at.get_mut(&location) {
                    pobs.remove(id);
                }
                if let Some(parent) = parent {
                    let lone_child = self.pob_arena.get(&parent).map_or(false, |p| p.children.len() == 1);
                    if lone_child && !removed.contains(&parent) {
                        self.leaf_pobs.insert(parent);
                    }
                }
                self.propagation_count.remove(id);
                pob::unlink(&mut self.pob_arena, *id);
            }
            self.context_state = None;
        }

        {
            let event = Event::Conflicts { conflicts: std::mem::take(&mut self.added_conflicts) };
            for subscriber in subscribers.iter_mut() {
                subscriber.update(&event, self)
            }
        }
    }

    /// Deliver the pre-existing states as an added batch, used once
    /// after setup.
    pub fn initial_update(
        &mut self,
        target_managers: &mut [&mut dyn Subscriber],
        subscribers: &mut [&mut dyn Subscriber],
    ) {
        self.added_states = self.states.iter().copied().collect();
        self.states_updated = true;
        self.state_update_isolated = Some(false);
        self.update_subscribers(target_managers, subscribers)
    }

    /// For each isolated state of this tick that completed the target
    /// at the head of its history, snapshot it as reached and pair it
    /// with every stack-compatible pob at that target. States sitting
    /// on a predicate block are reaped once their snapshot is taken.
    fn check_reached_states(&mut self) {
        assert!(self.states_updated && self.state_update_isolated == Some(true));
        let mut involved: BTreeSet<StateId> = self.added_states.iter().copied().collect();
        involved.extend(self.current.iter().copied());
        involved.extend(self.removed_states.iter().copied());

        let mut to_remove = Vec::new();
        for id in involved {
            let (reached, at_predicate_point) = {
                let state = &self.state_arena[&id];
                let mut reached = None;
                if let Some(target) = state.history().target() {
                    if is_reached_target(&self.ctx, &self.module, state, target) {
                        reached = Some(target.clone())
                    }
                }
                let at_predicate_point = match state.location_target(&self.ctx, &self.module) {
                    Some(location) => {
                        let block = self.module.block(location.block());
                        self.predicate.as_ref().map_or(false, |p| p.test(&self.module, block))
                            && !state.constraints.path().is_empty()
                    }
                    None => false,
                };
                (reached, at_predicate_point)
            };

            if let Some(target) = &reached {
                log!(
                    log::REACHED,
                    format!(
                        "isolated state reached {}: {}",
                        target.to_string(&self.module),
                        self.state_arena[&id].constraints.path().to_string(&self.module)
                    )
                );
                let copy = self.state_arena[&id].copy();
                let copy_id = copy.id;
                self.state_arena.insert(copy_id, copy);
                self.reached_states.entry(target.clone()).or_default().insert(copy_id);
                if let Some(pobs) = self.pobs_at.get(target) {
                    let candidates: Vec<PobId> = pobs.iter().copied().collect();
                    for pob in candidates {
                        if self.check_stack(copy_id, pob) {
                            self.added_propagations.insert(Propagation { state: copy_id, pob });
                        }
                    }
                }
            }

            if at_predicate_point && reached.is_some() {
                to_remove.push(id)
            }
        }

        for id in to_remove {
            if !self.removed_states.contains(&id) {
                self.remove_state(id)
            }
        }
    }

    /// Close parent-less pobs whose location a regular state reached:
    /// forward execution alone proved them.
    fn check_reached_pobs(&mut self) {
        assert!(self.states_updated && self.state_update_isolated == Some(false));
        let mut involved: BTreeSet<StateId> = self.added_states.iter().copied().collect();
        involved.extend(self.current.iter().copied());

        let mut to_close: BTreeSet<PobId> = BTreeSet::new();
        for id in involved {
            let location = match self.state_arena[&id].location_target(&self.ctx, &self.module) {
                None => continue,
                Some(location) => location,
            };
            if let Some(pobs) = self.pobs_at.get(&location) {
                for pob in pobs {
                    if self.pob_arena[pob].parent.is_none() {
                        log!(
                            log::POB,
                            format!(
                                "pob closed due to forward reach at {}",
                                self.pob_arena[pob].location.to_string(&self.module)
                            )
                        );
                        eprintln!(
                            "[TRUE POSITIVE] found true positive via forward at: {}",
                            self.pob_arena[&self.pob_arena[pob].root].location.to_string(&self.module)
                        );
                        eprintln!(
                            "[TRUE POSITIVE] state path: {}",
                            self.state_arena[&id].constraints.path().to_string(&self.module)
                        );
                        to_close.insert(*pob);
                    }
                }
            }
        }

        for pob in to_close {
            self.remove_pob(pob)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, JointBlockPredicate, ModuleBuilder};
    use crate::path::CallStackFrame;

    fn setup() -> (Arc<Context>, Arc<Module>, crate::ir::FunctionId, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Base, 2);
        let b2 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        b.add_edge(b1, b2);
        (Arc::new(Context::new()), Arc::new(b.finish()), f, vec![b0, b1, b2])
    }

    #[test]
    fn test_forward_closes_parentless_pob() {
        let (ctx, module, f, blocks) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        om.set_predicate(Arc::new(JointBlockPredicate));

        let target = ctx.targets.reach_block(blocks[0], false);
        let pob = ProofObligation::new_root(&ctx, target.clone());
        let id = om.insert_pob(pob);
        om.add_pob(id);
        om.update_subscribers(&mut [], &mut []);
        assert!(om.root_pobs.contains(&id));
        assert!(om.pobs_at[&target].contains(&id));

        // A regular state sitting at the pob's location closes it
        let state = ExecutionState::initial(&ctx, &module, f);
        om.add_initial_state(state);
        om.initial_update(&mut [], &mut []);

        assert!(om.root_pobs.is_empty());
        assert!(om.try_pob(id).is_none());
        assert!(om.pobs_at[&target].is_empty())
    }

    #[test]
    fn test_reached_isolated_state_creates_propagation() {
        let (ctx, module, f, blocks) = setup();
        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        om.set_predicate(Arc::new(JointBlockPredicate));
        om.set_empty_state(ExecutionState::initial(&ctx, &module, f));

        let target = ctx.targets.reach_block(blocks[1], false);
        let pob = ProofObligation::new_root(&ctx, target.clone());
        let pob_id = om.insert_pob(pob);
        om.add_pob(pob_id);
        om.update_subscribers(&mut [], &mut []);

        // An isolated state walks from b0 into b1 and completes the
        // target at the head of its history
        let mut targets = BTreeSet::new();
        targets.insert(target.clone());
        let state_id = om.initialize_state(InstId::new(blocks[0], 0), targets);
        {
            let history = {
                let state = om.state(state_id);
                ctx.histories.extend(state.history(), target.clone())
            };
            let module = module.clone();
            let state = om.state_mut(state_id);
            state.constraints.advance_path(&module, InstId::new(blocks[0], 0), Some(InstId::new(blocks[0], 1)));
            state.constraints.advance_path(&module, InstId::new(blocks[0], 1), Some(InstId::new(blocks[1], 0)));
            state.prev_pc = Some(InstId::new(blocks[0], 1));
            state.pc = Some(InstId::new(blocks[1], 0));
            state.set_history(history);
        }
        om.update_subscribers(&mut [], &mut []);

        assert_eq!(om.reached_states[&target].len(), 1);
        let props = &om.propagations[&target];
        assert_eq!(props.len(), 1);
        let prop = *props.iter().next().unwrap();
        assert_eq!(prop.pob, pob_id);
        assert_eq!(om.propagation_count[&pob_id], 1);
        // The snapshot, not the walking state, carries the propagation
        assert_ne!(prop.state, state_id)
    }

    #[test]
    fn test_check_stack_gating() {
        let (ctx, _, _, _) = setup();

        let mut b = ModuleBuilder::new();
        let main = b.add_function("m", 0, true);
        let f = b.add_function("f", 0, true);
        let g = b.add_function("g", 0, true);
        let mb = b.add_call_block(main, &[f]);
        let fb = b.add_call_block(f, &[g]);
        let fb2 = b.add_call_block(f, &[g]);
        let gb = b.add_block(g, BlockKind::Return, 1);
        let call_module = Arc::new(b.finish());

        let mut om = ObjectManager::new(ctx.clone(), call_module.clone());
        let c1 = call_module.block(mb).call_instruction();
        let c2 = call_module.block(fb).call_instruction();
        let c3 = call_module.block(fb2).call_instruction();

        let mut state = ExecutionState::initial(&ctx, &call_module, main);
        state.push_frame(&call_module, Some(c1), f);
        state.push_frame(&call_module, Some(c2), g);
        let state_id = om.add_initial_state(state);

        let target = ctx.targets.reach_block(gb, false);
        let mut pob = ProofObligation::new_root(&ctx, target.clone());
        pob.stack = vec![CallStackFrame::new(Some(c2), g)];
        let matching = om.insert_pob(pob);

        let mut pob = ProofObligation::new_root(&ctx, target);
        pob.stack = vec![CallStackFrame::new(Some(c3), g)];
        let mismatched = om.insert_pob(pob);

        assert!(om.check_stack(state_id, matching));
        assert!(!om.check_stack(state_id, mismatched))
    }
}
