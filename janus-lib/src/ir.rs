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

//! This module defines the shadow model of the analyzed program's IR.
//! The engine never interprets instructions itself; it only navigates
//! functions, blocks and instruction positions, so the shadow carries
//! exactly the caches the exploration needs: dense function and block
//! identifiers, block kinds (base, call, return), per-block first/last
//! instruction positions, per-function entry/return block lists,
//! call-block callee sets and label maps.
//!
//! Identifiers are dense within a module and stable for the lifetime
//! of an engine session. The external IR loader populates a [Module]
//! through the [ModuleBuilder] API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId {
    id: u32,
}

impl FunctionId {
    pub fn from_u32(id: u32) -> Self {
        FunctionId { id }
    }

    pub fn as_usize(self) -> usize {
        self.id as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    id: u32,
}

impl BlockId {
    pub fn from_u32(id: u32) -> Self {
        BlockId { id }
    }

    pub fn as_usize(self) -> usize {
        self.id as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId {
    id: u32,
}

impl GlobalId {
    pub fn from_u32(id: u32) -> Self {
        GlobalId { id }
    }

    pub fn as_usize(self) -> usize {
        self.id as usize
    }
}

/// A position in the instruction stream, identified by its block and
/// the instruction index within that block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId {
    pub block: BlockId,
    pub index: u32,
}

impl InstId {
    pub fn new(block: BlockId, index: u32) -> Self {
        InstId { block, index }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Base,
    /// A block consisting of a call instruction (index 0) followed by
    /// its unconditional branch (index 1).
    Call,
    Return,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub function: FunctionId,
    pub kind: BlockKind,
    pub label: String,
    pub num_instructions: u32,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    /// For call blocks, the functions the call can resolve to.
    pub called: Vec<FunctionId>,
    /// Dense register index of this block's first instruction.
    pub first_register: u32,
}

impl Block {
    pub fn first_instruction(&self) -> InstId {
        InstId { block: self.id, index: 0 }
    }

    pub fn last_instruction(&self) -> InstId {
        InstId { block: self.id, index: self.num_instructions - 1 }
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, BlockKind::Call)
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, BlockKind::Return)
    }

    /// The call instruction of a call block.
    pub fn call_instruction(&self) -> InstId {
        assert!(self.is_call());
        InstId { block: self.id, index: 0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub num_args: u32,
    pub num_registers: u32,
    pub entry: BlockId,
    pub blocks: Vec<BlockId>,
    pub return_blocks: Vec<BlockId>,
    pub call_blocks: Vec<BlockId>,
    pub in_main_module: bool,
    /// A declaration has no body; the call graph does not traverse it.
    pub is_declaration: bool,
    label_map: HashMap<String, BlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Global {
    pub id: GlobalId,
    pub name: String,
    pub size: u64,
}

/// A constant encountered while loading the module, identified by a
/// dense id so states can reference the evaluated value cheaply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Constant {
    pub id: u32,
    pub width: u32,
    pub value: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Module {
    functions: Vec<Function>,
    blocks: Vec<Block>,
    globals: Vec<Global>,
    constants: Vec<Constant>,
    function_name_map: HashMap<String, FunctionId>,
    /// For each function, the functions containing a call block that
    /// can call it. Kept as an association list so a serialized
    /// module stays readable.
    callers: Vec<(FunctionId, Vec<FunctionId>)>,
}

impl Module {
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.as_usize()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.as_usize()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.as_usize()]
    }

    pub fn constant(&self, id: u32) -> &Constant {
        &self.constants[id as usize]
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn function_named(&self, name: &str) -> Option<FunctionId> {
        self.function_name_map.get(name).copied()
    }

    pub fn global_named(&self, name: &str) -> Option<GlobalId> {
        self.globals.iter().find(|g| g.name == name).map(|g| g.id)
    }

    pub fn block_labelled(&self, function: FunctionId, label: &str) -> Option<BlockId> {
        self.function(function).label_map.get(label).copied()
    }

    pub fn callers(&self, function: FunctionId) -> &[FunctionId] {
        self.callers
            .iter()
            .find(|(callee, _)| *callee == function)
            .map(|(_, callers)| callers.as_slice())
            .unwrap_or(&[])
    }

    pub fn function_of(&self, block: BlockId) -> &Function {
        self.function(self.block(block).function)
    }

    pub fn entry_of(&self, function: FunctionId) -> BlockId {
        self.function(function).entry
    }

    pub fn is_terminator(&self, inst: InstId) -> bool {
        inst.index + 1 == self.block(inst.block).num_instructions
    }

    /// The dense register index holding the result of an instruction.
    pub fn register_of(&self, inst: InstId) -> u32 {
        self.block(inst.block).first_register + inst.index
    }

    /// The kind of block-to-block transition executing this
    /// instruction causes: entering a callee when it is the call
    /// instruction of a regular call block, returning past one when it
    /// is that block's terminator, and a plain transfer otherwise.
    pub fn transition_kind(&self, inst: InstId) -> TransitionKind {
        let block = self.block(inst.block);
        if regular_call_block(self, block) {
            if inst.index == 0 {
                TransitionKind::In
            } else {
                TransitionKind::Out
            }
        } else {
            TransitionKind::None
        }
    }

    pub fn inst_to_string(&self, inst: InstId) -> String {
        let block = self.block(inst.block);
        let function = self.function(block.function);
        format!("{}:{}:{}", function.name, block.label, inst.index)
    }

    pub fn block_to_string(&self, block: BlockId) -> String {
        let block = self.block(block);
        format!("{}:{}", self.function(block.function).name, block.label)
    }
}

/// Transition tag recorded on path entries; see [crate::path].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    In,
    Out,
    None,
}

/// A call block whose callee has a body we will step into. Calls to
/// declarations are handled like ordinary instructions.
pub fn regular_call_block(module: &Module, block: &Block) -> bool {
    block.is_call() && block.called.iter().any(|f| !module.function(*f).is_declaration)
}

/// Predicates over blocks used by the initializer and the dismantling
/// pass to choose where isolated execution may begin and end.
pub trait BlockPredicate {
    fn test(&self, module: &Module, block: &Block) -> bool;

    /// Whether isolated execution started at this call block should
    /// skip the call instruction and begin at the branch behind it.
    fn interesting_call_block(&self, module: &Module, block: &Block) -> bool {
        regular_call_block(module, block)
    }
}

/// Joint blocks separate a function into its natural regions: entry
/// and return blocks, calls with bodies, and join points with more
/// than one predecessor.
pub struct JointBlockPredicate;

impl BlockPredicate for JointBlockPredicate {
    fn test(&self, module: &Module, block: &Block) -> bool {
        let function = module.function(block.function);
        block.id == function.entry
            || block.is_return()
            || regular_call_block(module, block)
            || block.predecessors.len() > 1
    }
}

/// Restricts the joint predicate to a set of special points (plus
/// entries and returns), used when verifying an error trace.
pub struct SpecialPointPredicate {
    pub special: std::collections::HashSet<BlockId, ahash::RandomState>,
}

impl BlockPredicate for SpecialPointPredicate {
    fn test(&self, module: &Module, block: &Block) -> bool {
        let function = module.function(block.function);
        block.id == function.entry || block.is_return() || self.special.contains(&block.id)
    }
}

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder { module: Module::default() }
    }

    pub fn add_function(&mut self, name: &str, num_args: u32, in_main_module: bool) -> FunctionId {
        let id = FunctionId::from_u32(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            id,
            name: name.to_string(),
            num_args,
            num_registers: num_args,
            entry: BlockId::from_u32(u32::MAX),
            blocks: Vec::new(),
            return_blocks: Vec::new(),
            call_blocks: Vec::new(),
            in_main_module,
            is_declaration: false,
            label_map: HashMap::new(),
        });
        self.module.function_name_map.insert(name.to_string(), id);
        id
    }

    pub fn add_declaration(&mut self, name: &str, num_args: u32) -> FunctionId {
        let id = self.add_function(name, num_args, false);
        self.module.functions[id.as_usize()].is_declaration = true;
        id
    }

    pub fn add_block(&mut self, function: FunctionId, kind: BlockKind, num_instructions: u32) -> BlockId {
        assert!(num_instructions > 0);
        if let BlockKind::Call = kind {
            assert!(num_instructions == 2, "call blocks hold a call and its branch")
        }
        let id = BlockId::from_u32(self.module.blocks.len() as u32);
        let f = &mut self.module.functions[function.as_usize()];
        let label = format!("%{}", f.blocks.len());
        let first_register = f.num_registers;
        f.num_registers += num_instructions;
        if f.blocks.is_empty() {
            f.entry = id
        }
        f.blocks.push(id);
        f.label_map.insert(label.clone(), id);
        match kind {
            BlockKind::Return => f.return_blocks.push(id),
            BlockKind::Call => f.call_blocks.push(id),
            BlockKind::Base => (),
        }
        self.module.blocks.push(Block {
            id,
            function,
            kind,
            label,
            num_instructions,
            successors: Vec::new(),
            predecessors: Vec::new(),
            called: Vec::new(),
            first_register,
        });
        id
    }

    pub fn add_call_block(&mut self, function: FunctionId, called: &[FunctionId]) -> BlockId {
        let id = self.add_block(function, BlockKind::Call, 2);
        self.module.blocks[id.as_usize()].called = called.to_vec();
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        assert_eq!(self.module.block(from).function, self.module.block(to).function);
        self.module.blocks[from.as_usize()].successors.push(to);
        self.module.blocks[to.as_usize()].predecessors.push(from);
    }

    pub fn add_global(&mut self, name: &str, size: u64) -> GlobalId {
        let id = GlobalId::from_u32(self.module.globals.len() as u32);
        self.module.globals.push(Global { id, name: name.to_string(), size });
        id
    }

    pub fn add_constant(&mut self, width: u32, value: u64) -> u32 {
        let id = self.module.constants.len() as u32;
        self.module.constants.push(Constant { id, width, value });
        id
    }

    pub fn set_entry(&mut self, function: FunctionId, entry: BlockId) {
        self.module.functions[function.as_usize()].entry = entry
    }

    pub fn finish(mut self) -> Module {
        let mut callers: Vec<(FunctionId, Vec<FunctionId>)> = Vec::new();
        for block in &self.module.blocks {
            for called in &block.called {
                let at = match callers.iter().position(|(callee, _)| callee == called) {
                    Some(at) => at,
                    None => {
                        callers.push((*called, Vec::new()));
                        callers.len() - 1
                    }
                };
                let entry = &mut callers[at].1;
                if !entry.contains(&block.function) {
                    entry.push(block.function)
                }
            }
        }
        self.module.callers = callers;
        for f in &self.module.functions {
            assert!(f.is_declaration || !f.blocks.is_empty(), "function {} has no blocks", f.name)
        }
        self.module
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BlockKind::Base => write!(f, "base"),
            BlockKind::Call => write!(f, "call"),
            BlockKind::Return => write!(f, "return"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes() {
        let mut b = ModuleBuilder::new();
        let g = b.add_function("g", 1, true);
        let g_entry = b.add_block(g, BlockKind::Base, 3);
        let g_ret = b.add_block(g, BlockKind::Return, 1);
        b.add_edge(g_entry, g_ret);

        let f = b.add_function("f", 0, true);
        let f_entry = b.add_block(f, BlockKind::Base, 2);
        let f_call = b.add_call_block(f, &[g]);
        let f_ret = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(f_entry, f_call);
        b.add_edge(f_call, f_ret);

        let m = b.finish();
        assert_eq!(m.function(f).entry, f_entry);
        assert_eq!(m.function(g).return_blocks, vec![g_ret]);
        assert_eq!(m.function(f).call_blocks, vec![f_call]);
        assert_eq!(m.callers(g), &[f]);
        assert_eq!(m.function_named("g"), Some(g));
        assert_eq!(m.block_labelled(f, "%1"), Some(f_call));
        assert!(m.is_terminator(m.block(f_call).last_instruction()));
        assert!(!m.is_terminator(m.block(f_call).call_instruction()));
        assert!(regular_call_block(&m, m.block(f_call)));
        assert_eq!(m.transition_kind(m.block(f_call).call_instruction()), TransitionKind::In);
        assert_eq!(m.transition_kind(m.block(f_call).last_instruction()), TransitionKind::Out);
        assert_eq!(m.transition_kind(InstId::new(f_entry, 0)), TransitionKind::None);
    }

    #[test]
    fn test_registers_dense() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 2, true);
        let b0 = b.add_block(f, BlockKind::Base, 4);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let m = b.finish();
        assert_eq!(m.register_of(InstId::new(b0, 0)), 2);
        assert_eq!(m.register_of(InstId::new(b1, 0)), 6);
        assert_eq!(m.function(f).num_registers, 7);
    }
}
