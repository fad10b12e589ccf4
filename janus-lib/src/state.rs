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

//! An execution state is one path under exploration: its program
//! counters, the three aligned stacks (values, calls, bookkeeping),
//! the path constraints collected so far, the address space, and the
//! target forest guiding it. Isolated states start at an interior
//! instruction with an empty stack and are composed with an outer
//! context later.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::constraints::{Assignment, PathConstraints};
use crate::expr::{Context, ExprRef};
use crate::forest::{History, TargetForest};
use crate::ir::{BlockId, FunctionId, InstId, Module};
use crate::memory::{AddressSpace, ObjectId};
use crate::path::CallStackFrame;
use crate::process::ProcessNodeId;
use crate::target::{ReachWithError, Target};

static STATE_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId {
    id: u32,
}

impl StateId {
    pub fn fresh() -> Self {
        StateId { id: STATE_COUNTER.fetch_add(1, Ordering::SeqCst) }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

/// Why a state stopped being explored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    NotHalt,
    MaxDepth,
    MaxSteppedInstructions,
    MaxForks,
    MaxMemory,
    TargetReached,
    ErrorReproduced,
    SolverTimeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    NearestTiesToEven,
    TowardPositive,
    TowardNegative,
    TowardZero,
}

/// A frame of the value stack: the register file of one activation,
/// plus the allocations that die with it.
#[derive(Clone, Debug)]
pub struct StackFrame {
    pub function: FunctionId,
    pub registers: Vec<Option<ExprRef>>,
    pub allocas: Vec<ObjectId>,
}

impl StackFrame {
    pub fn new(module: &Module, function: FunctionId) -> Self {
        let registers = vec![None; module.function(function).num_registers as usize];
        StackFrame { function, registers, allocas: Vec::new() }
    }
}

#[derive(Clone, Debug)]
pub struct InfoStackFrame {
    pub function: FunctionId,
    /// Minimum distance to an uncovered instruction once the function
    /// returns; updated periodically by the statistics pass.
    pub min_dist_to_uncovered_on_return: u32,
    pub instructions_in_frame: u64,
}

impl InfoStackFrame {
    fn new(function: FunctionId) -> Self {
        InfoStackFrame { function, min_dist_to_uncovered_on_return: 0, instructions_in_frame: 0 }
    }
}

/// The three aligned stacks of a state.
#[derive(Clone, Debug, Default)]
pub struct ExecutionStack {
    value_stack: Vec<StackFrame>,
    call_stack: Vec<CallStackFrame>,
    info_stack: Vec<InfoStackFrame>,
    stack_balance: i32,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, module: &Module, caller: Option<InstId>, function: FunctionId) {
        self.value_stack.push(StackFrame::new(module, function));
        self.call_stack.push(CallStackFrame::new(caller, function));
        self.info_stack.push(InfoStackFrame::new(function));
        self.stack_balance += 1;
    }

    /// Pop all three stacks, handing back the value frame so the
    /// caller can reap its allocas from the address space.
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.call_stack.pop();
        self.info_stack.pop();
        self.stack_balance -= 1;
        self.value_stack.pop()
    }

    pub fn value_stack(&self) -> &[StackFrame] {
        &self.value_stack
    }

    pub fn value_stack_mut(&mut self) -> &mut Vec<StackFrame> {
        &mut self.value_stack
    }

    pub fn call_stack(&self) -> &[CallStackFrame] {
        &self.call_stack
    }

    pub fn info_stack(&self) -> &[InfoStackFrame] {
        &self.info_stack
    }

    pub fn info_stack_mut(&mut self) -> &mut Vec<InfoStackFrame> {
        &mut self.info_stack
    }

    pub fn stack_balance(&self) -> i32 {
        self.stack_balance
    }

    pub fn reset_stack_balance(&mut self) {
        self.stack_balance = 0
    }

    pub fn size(&self) -> usize {
        self.call_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.call_stack.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionState {
    pub id: StateId,
    /// The instruction this state started at.
    pub init_pc: InstId,
    /// Next instruction to execute.
    pub pc: Option<InstId>,
    /// Instruction currently being executed.
    pub prev_pc: Option<InstId>,
    pub stack: ExecutionStack,
    pub incoming_bb_index: i32,
    /// Number of times exploration branched for this state.
    pub depth: u32,
    /// Per-block visit counters and the per-cycle visit sets feeding
    /// the target calculator.
    pub multilevel: HashMap<BlockId, u64, ahash::RandomState>,
    pub level: HashSet<BlockId, ahash::RandomState>,
    pub transition_level: HashSet<(BlockId, BlockId), ahash::RandomState>,
    pub address_space: AddressSpace,
    pub constraints: PathConstraints,
    pub target_forest: TargetForest,
    pub stepped_instructions: u64,
    pub stepped_memory_instructions: u64,
    pub insts_since_cov_new: u32,
    pub query_cost: f64,
    pub rounding_mode: RoundingMode,
    pub covered_new: bool,
    pub fork_disabled: bool,
    pub isolated: bool,
    pub final_composing: bool,
    pub return_value: Option<ExprRef>,
    pub error: ReachWithError,
    pub null_pointer_expr: Option<ExprRef>,
    pub some_execution_happened: bool,
    pub assumptions: BTreeSet<ExprRef>,
    pub termination_reason: HaltReason,
    /// Memory accesses already resolved to objects.
    pub resolved_pointers: HashMap<ExprRef, BTreeSet<ObjectId>, ahash::RandomState>,
    /// Ordered symbolic objects, used to generate test cases.
    pub symbolics: Vec<(ObjectId, crate::expr::ArrayRef)>,
    /// Used array names, to avoid version collisions.
    pub array_names: BTreeMap<String, u64>,
    pub ptree_node: Option<ProcessNodeId>,
    prev_targets: BTreeSet<Target>,
    targets: BTreeSet<Target>,
    prev_history: History,
    history: History,
    is_targeted: bool,
    are_targets_changed: bool,
}

impl ExecutionState {
    /// The initial state of an entry function.
    pub fn initial(ctx: &Context, module: &Module, function: FunctionId) -> Self {
        let entry = module.block(module.function(function).entry).first_instruction();
        let mut stack = ExecutionStack::new();
        stack.push_frame(module, None, function);
        ExecutionState {
            id: StateId::fresh(),
            init_pc: entry,
            pc: Some(entry),
            prev_pc: None,
            stack,
            incoming_bb_index: -1,
            depth: 0,
            multilevel: HashMap::default(),
            level: HashSet::default(),
            transition_level: HashSet::default(),
            address_space: AddressSpace::new(),
            constraints: PathConstraints::new(Some(entry)),
            target_forest: TargetForest::new(ctx, Some(function)),
            stepped_instructions: 0,
            stepped_memory_instructions: 0,
            insts_since_cov_new: 0,
            query_cost: 0.0,
            rounding_mode: RoundingMode::NearestTiesToEven,
            covered_new: false,
            fork_disabled: false,
            isolated: false,
            final_composing: false,
            return_value: None,
            error: ReachWithError::None,
            null_pointer_expr: None,
            some_execution_happened: false,
            assumptions: BTreeSet::new(),
            termination_reason: HaltReason::NotHalt,
            resolved_pointers: HashMap::default(),
            symbolics: Vec::new(),
            array_names: BTreeMap::new(),
            ptree_node: None,
            prev_targets: BTreeSet::new(),
            targets: BTreeSet::new(),
            prev_history: ctx.histories.empty(),
            history: ctx.histories.empty(),
            is_targeted: false,
            are_targets_changed: false,
        }
    }

    /// Fork a copy with a fresh id; coverage novelty does not carry
    /// over.
    pub fn branch(&self) -> Self {
        let mut copy = self.clone();
        copy.id = StateId::fresh();
        copy.depth += 1;
        copy.covered_new = false;
        copy.ptree_node = None;
        copy
    }

    /// A plain copy under a fresh id (used when a reached isolated
    /// state is snapshotted).
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = StateId::fresh();
        copy.ptree_node = None;
        copy
    }

    /// Restart this state at an interior instruction with an empty
    /// stack; the result is an isolated state to be composed later.
    pub fn with_instruction(&self, ctx: &Context, module: &Module, ki: InstId) -> Self {
        let mut state = self.clone();
        state.id = StateId::fresh();
        state.stack = ExecutionStack::new();
        state.stack.push_frame(module, None, module.block(ki.block).function);
        state.init_pc = ki;
        state.pc = Some(ki);
        state.prev_pc = None;
        state.constraints = PathConstraints::new(Some(ki));
        state.target_forest = TargetForest::new(ctx, None);
        state.multilevel = HashMap::default();
        state.level = HashSet::default();
        state.transition_level = HashSet::default();
        state.isolated = true;
        state.error = ReachWithError::None;
        state.covered_new = false;
        state.depth = 0;
        state.stepped_instructions = 0;
        state.some_execution_happened = false;
        state.ptree_node = None;
        state.prev_targets = BTreeSet::new();
        state.targets = BTreeSet::new();
        state.prev_history = ctx.histories.empty();
        state.history = ctx.histories.empty();
        state.is_targeted = false;
        state.are_targets_changed = false;
        state
    }

    pub fn push_frame(&mut self, module: &Module, caller: Option<InstId>, function: FunctionId) {
        self.stack.push_frame(module, caller, function)
    }

    /// Pop a frame, reaping its allocas from the address space.
    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.stack.pop_frame() {
            for alloca in frame.allocas {
                self.address_space.unbind(alloca)
            }
        }
    }

    pub fn init_pc_block(&self) -> BlockId {
        self.init_pc.block
    }

    pub fn prev_pc_block(&self) -> Option<BlockId> {
        self.prev_pc.map(|ki| ki.block)
    }

    pub fn pc_block(&self) -> Option<BlockId> {
        self.pc.map(|ki| ki.block)
    }

    pub fn is_transfered(&self) -> bool {
        self.prev_pc_block() != self.pc_block()
    }

    /// Bump the cycle counters on a block-to-block transition in the
    /// main module.
    pub fn increase_level(&mut self, module: &Module) {
        let (prev, pc) = match (self.prev_pc_block(), self.pc_block()) {
            (Some(prev), Some(pc)) => (prev, pc),
            _ => return,
        };
        if prev == pc {
            return;
        }
        if !module.function_of(prev).in_main_module {
            return;
        }
        *self.multilevel.entry(prev).or_insert(0) += 1;
        self.level.insert(prev);
        self.transition_level.insert((prev, pc));
    }

    /// A state is stuck when it keeps revisiting its current block.
    pub fn is_stuck(&self, module: &Module, bound: u64) -> bool {
        let prev_pc = match self.prev_pc {
            None => return false,
            Some(prev_pc) => prev_pc,
        };
        if !module.is_terminator(prev_pc) {
            return false;
        }
        match self.pc_block() {
            None => false,
            Some(block) => self.multilevel.get(&block).copied().unwrap_or(0) > bound.saturating_sub(1),
        }
    }

    pub fn visited(&self, block: BlockId) -> bool {
        self.multilevel.contains_key(&block)
    }

    pub fn add_constraint(
        &mut self,
        ctx: &Context,
        policy: crate::config::RewriteEqualitiesPolicy,
        expr: ExprRef,
        delta: &Assignment,
    ) -> BTreeSet<ExprRef> {
        self.constraints.add_constraint(ctx, policy, expr, delta)
    }

    /// A fresh version number for a named symbolic array.
    pub fn version_array_name(&mut self, name: &str) -> u64 {
        let counter = self.array_names.entry(name.to_string()).or_insert(0);
        let version = *counter;
        *counter += 1;
        version
    }

    /// The target standing for this state's current location, if it
    /// sits at a block boundary.
    pub fn location_target(&self, ctx: &Context, module: &Module) -> Option<Target> {
        if self.error != ReachWithError::None {
            if let Some(pc) = self.pc {
                return Some(ctx.targets.reach_block(pc.block, false));
            }
        }
        let pc = self.pc?;
        if pc == module.block(pc.block).first_instruction() {
            Some(ctx.targets.reach_block(pc.block, false))
        } else if let Some(prev_pc) = self.prev_pc {
            if prev_pc == module.block(prev_pc.block).last_instruction() {
                Some(ctx.targets.reach_block(prev_pc.block, true))
            } else {
                None
            }
        } else {
            None
        }
    }

    pub fn prev_targets(&self) -> &BTreeSet<Target> {
        &self.prev_targets
    }

    pub fn targets(&self) -> &BTreeSet<Target> {
        &self.targets
    }

    pub fn prev_history(&self) -> &History {
        &self.prev_history
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_targeted(&self) -> bool {
        self.is_targeted
    }

    pub fn set_targeted(&mut self, targeted: bool) {
        self.is_targeted = targeted
    }

    pub fn are_targets_changed(&self) -> bool {
        self.are_targets_changed
    }

    pub fn set_targets(&mut self, targets: BTreeSet<Target>) {
        self.targets = targets;
        self.are_targets_changed = true
    }

    pub fn set_history(&mut self, history: History) {
        self.history = history;
        self.are_targets_changed = true
    }

    pub fn step_targets_and_history(&mut self) {
        self.prev_history = self.history.clone();
        self.prev_targets = self.targets.clone();
        self.are_targets_changed = false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, ModuleBuilder};

    fn simple_module() -> (Module, FunctionId, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Base, 2);
        let b2 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        b.add_edge(b1, b0);
        b.add_edge(b1, b2);
        (b.finish(), f, vec![b0, b1, b2])
    }

    #[test]
    fn test_branch_fresh_id() {
        let ctx = Context::new();
        let (module, f, _) = simple_module();
        let state = ExecutionState::initial(&ctx, &module, f);
        let branched = state.branch();
        assert_ne!(state.id, branched.id);
        assert_eq!(branched.depth, state.depth + 1);
        assert!(!branched.covered_new)
    }

    #[test]
    fn test_with_instruction_isolated() {
        let ctx = Context::new();
        let (module, f, blocks) = simple_module();
        let state = ExecutionState::initial(&ctx, &module, f);
        let ki = InstId::new(blocks[1], 0);
        let isolated = state.with_instruction(&ctx, &module, ki);
        assert!(isolated.isolated);
        assert_eq!(isolated.pc, Some(ki));
        assert_eq!(isolated.stack.size(), 1);
        assert!(isolated.constraints.path().is_empty())
    }

    #[test]
    fn test_is_stuck() {
        let ctx = Context::new();
        let (module, f, blocks) = simple_module();
        let mut state = ExecutionState::initial(&ctx, &module, f);

        // Cycle b0 -> b1 -> b0 enough times to look stuck
        for _ in 0..4 {
            state.prev_pc = Some(InstId::new(blocks[0], 1));
            state.pc = Some(InstId::new(blocks[1], 0));
            state.increase_level(&module);
            state.prev_pc = Some(InstId::new(blocks[1], 1));
            state.pc = Some(InstId::new(blocks[0], 0));
            state.increase_level(&module);
        }
        assert!(state.is_stuck(&module, 4));
        assert!(!state.is_stuck(&module, 10))
    }

    #[test]
    fn test_pop_frame_reaps_allocas() {
        use crate::expr::SymbolicSource;
        use crate::memory::{MemoryObject, ObjectState};
        use std::sync::Arc;

        let ctx = Context::new();
        let (module, f, _) = simple_module();
        let mut state = ExecutionState::initial(&ctx, &module, f);

        let size = ctx.constant(4, 32);
        let array = ctx.array(SymbolicSource::Constant { values: vec![0, 0, 0, 0] }, 32, 8, size.clone());
        let object = Arc::new(MemoryObject::new(ctx.constant(0x100, 64), size));
        let id = state.address_space.bind(ObjectState::new(object, array));
        state.stack.value_stack_mut().last_mut().unwrap().allocas.push(id);

        state.pop_frame();
        assert!(state.address_space.find(id).is_none());
        assert!(state.stack.is_empty())
    }
}
