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

//! A proof obligation (pob) is a backward goal: reach a location under
//! certain constraints with a given call-stack context. Pobs form a
//! tree rooted at the original goal; children are created when a
//! reached isolated state is composed against a pob. The tree is an
//! arena of records keyed by id, owned by the object manager, with
//! parent and child links stored as ids.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::constraints::PathConstraints;
use crate::expr::{Context, ExprRef};
use crate::forest::TargetForest;
use crate::ir::{BlockId, InstId, Module};
use crate::path::CallStackFrame;
use crate::state::{ExecutionState, StateId};
use crate::target::Target;

static POB_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PobId {
    id: u32,
}

impl PobId {
    pub fn fresh() -> Self {
        PobId { id: POB_COUNTER.fetch_add(1, Ordering::SeqCst) }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

#[derive(Clone, Debug)]
pub struct ProofObligation {
    pub id: PobId,
    pub parent: Option<PobId>,
    pub root: PobId,
    pub children: BTreeSet<PobId>,
    /// The calling context still to be unwound above this pob.
    pub stack: Vec<CallStackFrame>,
    /// How many times each reached state was propagated to this pob.
    pub propagation_count: BTreeMap<StateId, u32>,
    /// Propagations available anywhere in this pob's subtree, kept up
    /// to date by the backward searchers.
    pub subtree_propagation_count: u32,
    pub location: Target,
    pub target_forest: TargetForest,
    pub constraints: PathConstraints,
    pub null_pointer_expr: Option<ExprRef>,
    pub is_targeted: bool,
}

impl ProofObligation {
    /// A root obligation at a location target.
    pub fn new_root(ctx: &Context, location: Target) -> Self {
        let id = PobId::fresh();
        ProofObligation {
            id,
            parent: None,
            root: id,
            children: BTreeSet::new(),
            stack: Vec::new(),
            propagation_count: BTreeMap::new(),
            subtree_propagation_count: 0,
            location,
            target_forest: TargetForest::new(ctx, None),
            constraints: PathConstraints::default(),
            null_pointer_expr: None,
            is_targeted: false,
        }
    }

    pub fn at_return(&self, module: &Module) -> bool {
        module.block(self.location.block()).is_return()
    }
}

pub type PobArena = BTreeMap<PobId, ProofObligation>;

/// Child construction: the child inherits the parent's propagation
/// counts, forest and targeting, and is linked into the tree.
pub fn make_child(arena: &mut PobArena, parent: PobId, location: Target) -> PobId {
    let id = PobId::fresh();
    let parent_pob = arena.get(&parent).expect("make_child: unknown parent");
    let child = ProofObligation {
        id,
        parent: Some(parent),
        root: parent_pob.root,
        children: BTreeSet::new(),
        stack: parent_pob.stack.clone(),
        propagation_count: parent_pob.propagation_count.clone(),
        subtree_propagation_count: 0,
        location: location.clone(),
        target_forest: parent_pob.target_forest.clone(),
        constraints: PathConstraints::default(),
        null_pointer_expr: None,
        is_targeted: parent_pob.is_targeted,
    };
    arena.insert(id, child);
    arena.get_mut(&parent).unwrap().children.insert(id);
    id
}

/// Build the child obligation produced by composing a reached
/// isolated state against `parent`: located at the front of the
/// state's path, carrying the composed constraints, with the frames
/// the state already covers subtracted from the parent's stack.
pub fn create(
    arena: &mut PobArena,
    ctx: &Context,
    module: &Module,
    parent: PobId,
    state: &ExecutionState,
    composed: PathConstraints,
    null_pointer_expr: Option<ExprRef>,
) -> PobId {
    let front = state
        .constraints
        .path()
        .front_block()
        .expect("create: reached state must have a non-empty path");
    let location = ctx.targets.reach_block(front, false);
    let child = make_child(arena, parent, location);

    let state_stack = state.constraints.path().get_stack(module, false);
    let pob = arena.get_mut(&child).unwrap();
    pob.stack = subtract_frames(&pob.stack, &state_stack);
    pob.constraints = composed;
    pob.null_pointer_expr = null_pointer_expr;
    *pob.propagation_count.entry(state.id).or_insert(0) += 1;
    child
}

/// Rewrite an obligation at a function entry to the return block of
/// one of its callers, pushing the callsite on its stack.
pub fn propagate_to_return(
    arena: &mut PobArena,
    ctx: &Context,
    module: &Module,
    pob: PobId,
    callsite: InstId,
    return_block: BlockId,
) {
    let target = ctx.targets.reach_block(return_block, true);
    let pob = arena.get_mut(&pob).expect("propagate_to_return: unknown pob");
    pob.location = target;
    pob.stack.push(CallStackFrame::new(Some(callsite), module.block(return_block).function));
}

/// The obligation together with all of its descendants, in BFS order.
pub fn subtree(arena: &PobArena, pob: PobId) -> Vec<PobId> {
    let mut result = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(pob);
    while let Some(current) = queue.pop_front() {
        result.push(current);
        if let Some(node) = arena.get(&current) {
            for child in &node.children {
                queue.push_back(*child)
            }
        }
    }
    result
}

/// Unlink and drop an obligation: the parent forgets it and its
/// children are orphaned (their reaping is the caller's business).
pub fn unlink(arena: &mut PobArena, pob: PobId) {
    let node = match arena.remove(&pob) {
        None => return,
        Some(node) => node,
    };
    if let Some(parent) = node.parent {
        if let Some(parent) = arena.get_mut(&parent) {
            parent.children.remove(&pob);
        }
    }
    for child in node.children {
        if let Some(child) = arena.get_mut(&child) {
            child.parent = None
        }
    }
}

/// Drop the longest common stack suffix: the frames the state's call
/// stack already accounts for are not part of the child's context.
pub fn subtract_frames(stack: &[CallStackFrame], covered: &[CallStackFrame]) -> Vec<CallStackFrame> {
    let mut shared = 0;
    while shared < stack.len() && shared < covered.len() {
        let ours = stack[stack.len() - 1 - shared];
        let theirs = covered[covered.len() - 1 - shared];
        let callsites_match = match (ours.caller, theirs.caller) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if ours.function == theirs.function && callsites_match {
            shared += 1
        } else {
            break;
        }
    }
    stack[..stack.len() - shared].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, FunctionId, ModuleBuilder};

    fn module() -> (Module, FunctionId, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        (b.finish(), f, vec![b0, b1])
    }

    #[test]
    fn test_subtree_and_unlink() {
        let ctx = Context::new();
        let (module, _, blocks) = module();
        let target = ctx.targets.reach_block(blocks[0], false);

        let mut arena = PobArena::new();
        let root = ProofObligation::new_root(&ctx, target.clone());
        let root_id = root.id;
        arena.insert(root_id, root);
        let child = make_child(&mut arena, root_id, target.clone());
        let grandchild = make_child(&mut arena, child, target);

        let all = subtree(&arena, root_id);
        assert_eq!(all, vec![root_id, child, grandchild]);
        assert_eq!(arena[&child].root, root_id);

        unlink(&mut arena, child);
        assert!(!arena[&root_id].children.contains(&child));
        assert_eq!(arena[&grandchild].parent, None);
        let _ = module;
    }

    #[test]
    fn test_subtract_frames() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let g = b.add_function("g", 0, true);
        let h = b.add_function("h", 0, true);
        let fb = b.add_call_block(f, &[g]);
        let gb = b.add_call_block(g, &[h]);
        let hb = b.add_block(h, BlockKind::Return, 1);
        let _ = hb;
        let module = b.finish();

        let call_g = module.block(fb).call_instruction();
        let call_h = module.block(gb).call_instruction();

        let stack =
            vec![CallStackFrame::new(None, f), CallStackFrame::new(Some(call_g), g), CallStackFrame::new(Some(call_h), h)];
        let covered = vec![CallStackFrame::new(Some(call_h), h)];
        let rest = subtract_frames(&stack, &covered);
        assert_eq!(rest, vec![CallStackFrame::new(None, f), CallStackFrame::new(Some(call_g), g)]);

        let mismatched = vec![CallStackFrame::new(Some(call_g), h)];
        let rest = subtract_frames(&stack, &mismatched);
        assert_eq!(rest.len(), 3)
    }
}
