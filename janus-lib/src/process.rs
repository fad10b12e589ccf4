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

//! The process forest records how states forked from one another: one
//! binary tree per root state, with live states at the leaves. The
//! random-path searcher walks it making random choices at the
//! branching nodes, which weights states by the inverse of their fork
//! depth.

use std::collections::{BTreeSet, HashMap};

use crate::state::StateId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessNodeId {
    id: u64,
}

#[derive(Clone, Debug)]
pub struct ProcessNode {
    pub id: ProcessNodeId,
    pub parent: Option<ProcessNodeId>,
    pub left: Option<ProcessNodeId>,
    pub right: Option<ProcessNodeId>,
    pub state: Option<StateId>,
}

#[derive(Clone, Debug, Default)]
pub struct PForest {
    nodes: HashMap<ProcessNodeId, ProcessNode, ahash::RandomState>,
    roots: BTreeSet<ProcessNodeId>,
    next_id: u64,
}

impl PForest {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self) -> ProcessNodeId {
        let id = ProcessNodeId { id: self.next_id };
        self.next_id += 1;
        id
    }

    pub fn node(&self, id: ProcessNodeId) -> &ProcessNode {
        &self.nodes[&id]
    }

    pub fn roots(&self) -> &BTreeSet<ProcessNodeId> {
        &self.roots
    }

    /// Start a new tree for a root state, returning the leaf node the
    /// state should remember.
    pub fn add_root(&mut self, state: StateId) -> ProcessNodeId {
        let id = self.fresh();
        self.nodes.insert(id, ProcessNode { id, parent: None, left: None, right: None, state: Some(state) });
        self.roots.insert(id);
        id
    }

    /// Record a fork: the leaf holding `original` becomes an interior
    /// node with two fresh leaves. Returns the leaves for
    /// (`new_state`, `original`).
    pub fn attach(
        &mut self,
        at: ProcessNodeId,
        new_state: StateId,
        original: StateId,
    ) -> (ProcessNodeId, ProcessNodeId) {
        assert_eq!(self.nodes[&at].state, Some(original), "attach must happen at the original state's leaf");
        let left = self.fresh();
        let right = self.fresh();
        self.nodes
            .insert(left, ProcessNode { id: left, parent: Some(at), left: None, right: None, state: Some(new_state) });
        self.nodes
            .insert(right, ProcessNode { id: right, parent: Some(at), left: None, right: None, state: Some(original) });
        let node = self.nodes.get_mut(&at).unwrap();
        node.state = None;
        node.left = Some(left);
        node.right = Some(right);
        (left, right)
    }

    /// Remove a leaf, unlinking interior nodes that become childless.
    pub fn remove(&mut self, at: ProcessNodeId) {
        let node = match self.nodes.remove(&at) {
            None => return,
            Some(node) => node,
        };
        self.roots.remove(&at);
        if let Some(parent) = node.parent {
            let childless = {
                let p = self.nodes.get_mut(&parent).expect("parent of a live node must exist");
                if p.left == Some(at) {
                    p.left = None
                }
                if p.right == Some(at) {
                    p.right = None
                }
                p.left.is_none() && p.right.is_none()
            };
            if childless {
                self.remove(parent)
            }
        }
    }

    /// Whether any leaf under `at` satisfies the predicate.
    pub fn subtree_has<F: Fn(StateId) -> bool + Copy>(&self, at: ProcessNodeId, valid: F) -> bool {
        let node = match self.nodes.get(&at) {
            None => return false,
            Some(node) => node,
        };
        if let Some(state) = node.state {
            return valid(state);
        }
        node.left.map_or(false, |left| self.subtree_has(left, valid))
            || node.right.map_or(false, |right| self.subtree_has(right, valid))
    }

    /// Descend from `at` making the supplied binary choices at live
    /// nodes until a valid leaf is found.
    pub fn select<F, R>(&self, at: ProcessNodeId, valid: F, flip: &mut R) -> Option<StateId>
    where
        F: Fn(StateId) -> bool + Copy,
        R: FnMut() -> bool,
    {
        let node = self.nodes.get(&at)?;
        if let Some(state) = node.state {
            return if valid(state) { Some(state) } else { None };
        }
        let mut live: Vec<ProcessNodeId> = Vec::new();
        if let Some(left) = node.left {
            if self.subtree_has(left, valid) {
                live.push(left)
            }
        }
        if let Some(right) = node.right {
            if self.subtree_has(right, valid) {
                live.push(right)
            }
        }
        match live.len() {
            0 => None,
            1 => self.select(live[0], valid, flip),
            _ => {
                let choice = if flip() { live[0] } else { live[1] };
                self.select(choice, valid, flip)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> StateId {
        StateId::fresh()
    }

    #[test]
    fn test_attach_remove() {
        let mut forest = PForest::new();
        let a = sid();
        let b = sid();
        let root = forest.add_root(a);
        let (left, right) = forest.attach(root, b, a);
        assert_eq!(forest.node(left).state, Some(b));
        assert_eq!(forest.node(right).state, Some(a));
        assert_eq!(forest.node(root).state, None);

        forest.remove(left);
        assert!(forest.subtree_has(root, |s| s == a));
        assert!(!forest.subtree_has(root, |s| s == b));

        // Removing the last leaf collapses the tree
        forest.remove(right);
        assert!(forest.roots().is_empty())
    }

    #[test]
    fn test_select_respects_validity() {
        let mut forest = PForest::new();
        let a = sid();
        let b = sid();
        let c = sid();
        let root = forest.add_root(a);
        let (_, right) = forest.attach(root, b, a);
        forest.attach(right, c, a);

        let mut flip = || true;
        let selected = forest.select(root, |s| s == c, &mut flip);
        assert_eq!(selected, Some(c));
        let selected = forest.select(root, |_| false, &mut flip);
        assert_eq!(selected, None)
    }
}
