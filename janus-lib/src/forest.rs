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

//! The target forest tracks which combinations of targets a state (or
//! proof obligation) still has to satisfy. Each layer maps an
//! unordered target set to the child layer that remains once any of
//! its targets is reached, so the forest is a lazy product automaton
//! over the remaining targets. Target sets are content-uniqued, as are
//! the histories of targets already stepped through.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::expr::Context;
use crate::ir::FunctionId;
use crate::target::Target;

const MAGIC_HASH_CONSTANT: u64 = 39916801;

#[derive(Debug)]
pub struct TargetSetNode {
    id: u64,
    hash: u64,
    targets: Vec<Target>,
}

/// An unordered set of targets, content-uniqued so equality is
/// pointer identity.
#[derive(Clone, Debug)]
pub struct TargetSet(Arc<TargetSetNode>);

impl TargetSet {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn targets(&self) -> &[Target] {
        &self.0.targets
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.0.targets.contains(target)
    }

    pub fn len(&self) -> usize {
        self.0.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.targets.is_empty()
    }
}

impl PartialEq for TargetSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TargetSet {}

impl Hash for TargetSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state)
    }
}

impl PartialOrd for TargetSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TargetSet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

pub struct TargetSetInterner {
    sets: RefCell<HashMap<u64, Vec<TargetSet>, ahash::RandomState>>,
    next_id: Cell<u64>,
}

impl TargetSetInterner {
    pub fn new() -> Self {
        TargetSetInterner { sets: RefCell::new(HashMap::default()), next_id: Cell::new(0) }
    }

    pub fn intern(&self, mut targets: Vec<Target>) -> TargetSet {
        targets.sort();
        targets.dedup();
        let mut hash = targets.len() as u64;
        for target in &targets {
            hash = hash.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(target.id())
        }
        let mut sets = self.sets.borrow_mut();
        let bucket = sets.entry(hash).or_insert_with(Vec::new);
        for existing in bucket.iter() {
            if existing.targets() == targets.as_slice() {
                return existing.clone();
            }
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let set = TargetSet(Arc::new(TargetSetNode { id, hash, targets }));
        bucket.push(set.clone());
        set
    }

    pub fn singleton(&self, target: Target) -> TargetSet {
        self.intern(vec![target])
    }
}

impl Default for TargetSetInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct HistoryNode {
    id: u64,
    target: Option<Target>,
    next: Option<History>,
    size: u32,
}

/// The linked list of targets a state has stepped through, uniqued so
/// histories can be compared and used as keys cheaply.
#[derive(Clone, Debug)]
pub struct History(Arc<HistoryNode>);

impl History {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn target(&self) -> Option<&Target> {
        self.0.target.as_ref()
    }

    pub fn next(&self) -> Option<&History> {
        self.0.next.as_ref()
    }

    pub fn size(&self) -> u32 {
        self.0.size
    }

    pub fn is_empty(&self) -> bool {
        self.0.target.is_none()
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for History {}

impl Hash for History {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl PartialOrd for History {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for History {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

pub struct HistoryInterner {
    nodes: RefCell<HashMap<(u64, u64), History, ahash::RandomState>>,
    empty: RefCell<Option<History>>,
    next_id: Cell<u64>,
}

impl HistoryInterner {
    pub fn new() -> Self {
        HistoryInterner { nodes: RefCell::new(HashMap::default()), empty: RefCell::new(None), next_id: Cell::new(0) }
    }

    pub fn empty(&self) -> History {
        if let Some(history) = self.empty.borrow().as_ref() {
            return history.clone();
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let history = History(Arc::new(HistoryNode { id, target: None, next: None, size: 0 }));
        *self.empty.borrow_mut() = Some(history.clone());
        history
    }

    pub fn extend(&self, history: &History, target: Target) -> History {
        let key = (target.id(), history.id());
        if let Some(existing) = self.nodes.borrow().get(&key) {
            return existing.clone();
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let extended = History(Arc::new(HistoryNode {
            id,
            target: Some(target),
            next: Some(history.clone()),
            size: history.size() + 1,
        }));
        self.nodes.borrow_mut().insert(key, extended.clone());
        extended
    }
}

impl Default for HistoryInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// One layer of the forest: child layers keyed by target set, plus an
/// index from each live target to the sets containing it. The
/// confidence of a layer is relative to its parent.
#[derive(Clone, Debug)]
pub struct Layer {
    children: BTreeMap<TargetSet, Arc<Layer>>,
    target_links: BTreeMap<Target, BTreeSet<TargetSet>>,
    confidence: f64,
}

impl Layer {
    pub fn new() -> Self {
        Layer { children: BTreeMap::new(), target_links: BTreeMap::new(), confidence: 1.0 }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn confidence(&self, parent: f64) -> f64 {
        self.confidence * parent
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.target_links.keys()
    }

    pub fn contains_target(&self, target: &Target) -> bool {
        self.target_links.contains_key(target)
    }

    pub fn sets_containing(&self, target: &Target) -> Option<&BTreeSet<TargetSet>> {
        self.target_links.get(target)
    }

    pub fn children(&self) -> &BTreeMap<TargetSet, Arc<Layer>> {
        &self.children
    }

    fn insert(&mut self, set: TargetSet, child: Arc<Layer>) {
        for target in set.targets() {
            self.target_links.entry(target.clone()).or_insert_with(BTreeSet::new).insert(set.clone());
        }
        self.children.insert(set, child);
    }

    fn remove_set_links(&mut self, set: &TargetSet) {
        for target in set.targets() {
            if let Some(sets) = self.target_links.get_mut(target) {
                sets.remove(set);
                if sets.is_empty() {
                    self.target_links.remove(target);
                }
            }
        }
    }

    /// Unlink a target; child sets left with no live target are
    /// dropped.
    fn remove_target(&mut self, target: &Target) {
        let sets = match self.target_links.remove(target) {
            None => return,
            Some(sets) => sets,
        };
        for set in sets {
            let mut should_delete = true;
            for local in set.targets() {
                if self.target_links.contains_key(local) {
                    should_delete = false
                }
            }
            if should_delete {
                self.children.remove(&set);
            }
        }
    }

    pub fn deep_find(&self, target: &Target) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.target_links.contains_key(target) {
            return true;
        }
        self.children.values().any(|child| child.deep_find(target))
    }

    pub fn deep_find_in(&self, child: &Target, target: &Target) -> bool {
        let sets = match self.target_links.get(child) {
            None => return false,
            Some(sets) => sets,
        };
        if child == target {
            return true;
        }
        sets.iter().any(|set| self.children[set].deep_find(target))
    }

    /// Scale the children's confidences by this layer's own, so they
    /// stay meaningful when merged under another parent.
    fn propagate_confidence_to_children(&mut self) {
        let parent = self.confidence;
        let children = std::mem::take(&mut self.children);
        self.children = children
            .into_iter()
            .map(|(set, child)| {
                let mut inner = (*child).clone();
                inner.confidence *= parent;
                (set, Arc::new(inner))
            })
            .collect();
    }

    pub fn union_with(&mut self, other: &Layer) {
        if other.children.is_empty() {
            return;
        }
        let mut other = other.clone();
        other.propagate_confidence_to_children();
        for (set, layer) in &other.children {
            match self.children.get(set) {
                None => {
                    self.children.insert(set.clone(), layer.clone());
                }
                Some(existing) => {
                    let mut merged = (**existing).clone();
                    merged.union_with(layer);
                    self.children.insert(set.clone(), Arc::new(merged));
                }
            }
        }
        for (target, sets) in &other.target_links {
            self.target_links.entry(target.clone()).or_insert_with(BTreeSet::new).extend(sets.iter().cloned());
        }
    }

    /// Remove a target everywhere in the subtree. A child whose
    /// subtree becomes empty because of the blocking is dropped with
    /// it.
    pub fn block(&mut self, target: &Target) {
        if self.is_empty() {
            return;
        }
        self.remove_target(target);
        let children = std::mem::take(&mut self.children);
        let mut kept = BTreeMap::new();
        for (set, child) in children {
            let was_empty = child.is_empty();
            let mut inner = (*child).clone();
            inner.block(target);
            if inner.is_empty() && !was_empty {
                self.remove_set_links(&set);
            } else {
                kept.insert(set, Arc::new(inner));
            }
        }
        self.children = kept;
    }

    /// Block `target` only below the child sets containing
    /// `subtarget`.
    pub fn block_in(&mut self, subtarget: &Target, target: &Target) {
        let sets = match self.target_links.get(subtarget) {
            None => return,
            Some(sets) => sets.clone(),
        };
        for set in sets {
            let child = match self.children.get(&set) {
                None => continue,
                Some(child) => child.clone(),
            };
            if child.is_empty() {
                let linked = self.target_links.get(target).map_or(false, |sets| sets.contains(&set));
                if linked {
                    self.remove_target(target);
                }
            } else {
                let mut inner = (*child).clone();
                inner.block(target);
                if inner.is_empty() {
                    self.children.remove(&set);
                    self.remove_set_links(&set);
                } else {
                    self.children.insert(set, Arc::new(inner));
                }
            }
        }
    }

    /// Spread confidence over children proportionally to how many
    /// distinct states can reach their targets.
    pub fn divide_confidence_by<S: Ord>(&mut self, reachable: &BTreeMap<Target, BTreeSet<S>>) {
        if self.children.is_empty() || reachable.is_empty() {
            return;
        }
        let children = std::mem::take(&mut self.children);
        self.children = children
            .into_iter()
            .map(|(set, child)| {
                let mut states: BTreeSet<&S> = BTreeSet::new();
                for target in set.targets() {
                    if let Some(reaching) = reachable.get(target) {
                        states.extend(reaching.iter())
                    }
                }
                let count = states.len();
                if count > 1 {
                    let mut inner = (*child).clone();
                    inner.confidence /= count as f64;
                    (set, Arc::new(inner))
                } else if count == 1 {
                    (set, child)
                } else {
                    let mut inner = (*child).clone();
                    inner.divide_confidence_by(reachable);
                    (set, Arc::new(inner))
                }
            })
            .collect();
    }

    fn add_leafs(&self, out: &mut Vec<(TargetSet, f64)>, parent_confidence: f64) {
        for (set, child) in &self.children {
            let confidence = child.confidence(parent_confidence);
            if child.is_empty() {
                out.push((set.clone(), confidence))
            } else {
                child.add_leafs(out, confidence)
            }
        }
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct TargetForest {
    root: Layer,
    history: History,
    entry_function: Option<FunctionId>,
}

impl TargetForest {
    pub fn new(ctx: &Context, entry_function: Option<FunctionId>) -> Self {
        TargetForest { root: Layer::new(), history: ctx.histories.empty(), entry_function }
    }

    pub fn entry_function(&self) -> Option<FunctionId> {
        self.entry_function
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn set_history(&mut self, history: History) {
        self.history = history
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn root(&self) -> &Layer {
        &self.root
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.root.contains_target(target)
    }

    /// The targets of the current layer.
    pub fn targets(&self) -> BTreeSet<Target> {
        self.root.targets().cloned().collect()
    }

    /// Extend the forest along a linear sequence of target sets.
    pub fn add_trace(&mut self, ctx: &Context, trace: &[Vec<Target>]) {
        add_trace_rec(ctx, &mut self.root, trace)
    }

    pub fn add_target(&mut self, ctx: &Context, target: Target) {
        if self.root.contains_target(&target) {
            return;
        }
        let set = ctx.target_sets.singleton(target);
        self.add_set(set)
    }

    pub fn add_set(&mut self, set: TargetSet) {
        if self.root.children.contains_key(&set) {
            return;
        }
        self.root.insert(set, Arc::new(Layer::new()))
    }

    pub fn remove(&mut self, target: &Target) {
        if !self.root.contains_target(target) {
            return;
        }
        self.root.remove_target(target)
    }

    /// Reaching `target` replaces the root with the union of the
    /// child layers behind every set containing it, and appends the
    /// target to the history.
    pub fn step_to(&mut self, ctx: &Context, target: &Target) {
        if self.root.is_empty() {
            return;
        }
        let sets = match self.root.sets_containing(target) {
            None => return,
            Some(sets) => sets.clone(),
        };
        self.history = ctx.histories.extend(&self.history, target.clone());
        let layers: Vec<Arc<Layer>> = sets.iter().filter_map(|set| self.root.children.get(set).cloned()).collect();
        for set in &sets {
            self.root.children.remove(set);
            self.root.remove_set_links(set);
        }
        for layer in layers {
            self.root.union_with(&layer)
        }
    }

    pub fn block(&mut self, target: &Target) {
        if !self.root.deep_find(target) {
            return;
        }
        self.root.block(target)
    }

    pub fn block_in(&mut self, subtarget: &Target, target: &Target) {
        if !self.root.deep_find_in(subtarget, target) {
            return;
        }
        self.root.block_in(subtarget, target)
    }

    pub fn divide_confidence_by<S: Ord>(&mut self, reachable: &BTreeMap<Target, BTreeSet<S>>) {
        self.root.divide_confidence_by(reachable)
    }

    pub fn confidence(&self) -> f64 {
        self.root.confidence
    }

    /// The remaining leaf target sets with their effective
    /// confidences.
    pub fn leafs(&self) -> Vec<(TargetSet, f64)> {
        let mut out = Vec::new();
        self.root.add_leafs(&mut out, self.root.confidence);
        out
    }
}

fn add_trace_rec(ctx: &Context, layer: &mut Layer, trace: &[Vec<Target>]) {
    if trace.is_empty() {
        return;
    }
    let set = ctx.target_sets.intern(trace[0].clone());
    if !layer.children.contains_key(&set) {
        layer.insert(set.clone(), Arc::new(Layer::new()));
    }
    let child = layer.children.get(&set).unwrap().clone();
    let mut inner = (*child).clone();
    add_trace_rec(ctx, &mut inner, &trace[1..]);
    layer.children.insert(set, Arc::new(inner));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, ModuleBuilder};

    fn blocks(n: u32) -> Vec<crate::ir::BlockId> {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(b.add_block(f, BlockKind::Base, 1))
        }
        let _ = b.finish();
        out
    }

    #[test]
    fn test_set_uniquing() {
        let ctx = Context::new();
        let bs = blocks(2);
        let t1 = ctx.targets.reach_block(bs[0], false);
        let t2 = ctx.targets.reach_block(bs[1], false);
        let a = ctx.target_sets.intern(vec![t1.clone(), t2.clone()]);
        let b = ctx.target_sets.intern(vec![t2, t1]);
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id())
    }

    #[test]
    fn test_history_uniquing() {
        let ctx = Context::new();
        let bs = blocks(1);
        let t = ctx.targets.reach_block(bs[0], false);
        let h0 = ctx.histories.empty();
        let h1 = ctx.histories.extend(&h0, t.clone());
        let h2 = ctx.histories.extend(&h0, t.clone());
        assert_eq!(h1, h2);
        assert_eq!(h1.size(), 1);
        assert_eq!(h1.target(), Some(&t))
    }

    #[test]
    fn test_step_to_then_block() {
        let ctx = Context::new();
        let bs = blocks(3);
        let t1 = ctx.targets.reach_block(bs[0], false);
        let t2 = ctx.targets.reach_block(bs[1], false);
        let t3 = ctx.targets.reach_block(bs[2], false);

        let mut forest = TargetForest::new(&ctx, None);
        forest.add_trace(&ctx, &[vec![t1.clone()], vec![t2.clone()]]);
        forest.add_trace(&ctx, &[vec![t1.clone()], vec![t3.clone()]]);

        assert!(forest.contains(&t1));
        assert!(!forest.contains(&t2));

        forest.step_to(&ctx, &t1);
        assert_eq!(forest.history().target(), Some(&t1));
        assert!(forest.contains(&t2));
        assert!(forest.contains(&t3));

        // Blocking t2 leaves every other target's membership alone
        forest.block(&t2);
        assert!(!forest.contains(&t2));
        assert!(forest.contains(&t3))
    }

    #[test]
    fn test_block_drops_dead_subtrees() {
        let ctx = Context::new();
        let bs = blocks(3);
        let t1 = ctx.targets.reach_block(bs[0], false);
        let t2 = ctx.targets.reach_block(bs[1], false);
        let t3 = ctx.targets.reach_block(bs[2], false);

        let mut forest = TargetForest::new(&ctx, None);
        // t1 leads only to t2; t3 is independent
        forest.add_trace(&ctx, &[vec![t1.clone()], vec![t2.clone()]]);
        forest.add_trace(&ctx, &[vec![t3.clone()]]);

        forest.block(&t2);
        // The continuation behind t1 died, so t1's subtree went with
        // it, while t3 survives
        assert!(!forest.contains(&t1));
        assert!(forest.contains(&t3))
    }

    #[test]
    fn test_leafs_and_confidence() {
        let ctx = Context::new();
        let bs = blocks(2);
        let t1 = ctx.targets.reach_block(bs[0], false);
        let t2 = ctx.targets.reach_block(bs[1], false);

        let mut forest = TargetForest::new(&ctx, None);
        forest.add_trace(&ctx, &[vec![t1.clone()], vec![t2.clone()]]);
        let leafs = forest.leafs();
        assert_eq!(leafs.len(), 1);
        assert!(leafs[0].0.contains(&t2));
        assert!((leafs[0].1 - 1.0).abs() < 1e-9)
    }
}
