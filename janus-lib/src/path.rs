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

//! Execution paths are append-only sequences of blocks tagged with the
//! kind of transition that entered them, together with the index of
//! the first executed instruction in the head block, the index of the
//! last executed instruction in the tail block, and the next
//! instruction to execute. Only the head and tail block can be
//! partially executed. The call stack at any point of a path can be
//! reconstructed by replaying its transitions, in either direction.

use serde::{Deserialize, Serialize};

use crate::ir::{BlockId, FunctionId, InstId, Module, TransitionKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathEntry {
    pub block: BlockId,
    pub kind: TransitionKind,
}

/// A position within a path: the index of the entry plus the index of
/// an instruction inside that entry's block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathIndex {
    pub block: usize,
    pub instruction: u32,
}

/// A frame of the reconstructed call stack: the callsite instruction
/// (if known) and the function it called into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallStackFrame {
    pub caller: Option<InstId>,
    pub function: FunctionId,
}

impl CallStackFrame {
    pub fn new(caller: Option<InstId>, function: FunctionId) -> Self {
        CallStackFrame { caller, function }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path {
    first: u32,
    last: u32,
    entries: Vec<PathEntry>,
    next: Option<InstId>,
}

impl Path {
    /// An empty path for a state about to execute `next`.
    pub fn new(next: Option<InstId>) -> Self {
        Path { first: 0, last: 0, entries: Vec::new(), next }
    }

    pub fn from_parts(first: u32, entries: Vec<PathEntry>, last: u32, next: Option<InstId>) -> Self {
        Path { first, last, entries, next }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn empty_with_next(&self) -> bool {
        self.entries.is_empty() && self.next.is_some()
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    pub fn first_index(&self) -> u32 {
        self.first
    }

    pub fn last_index(&self) -> u32 {
        self.last
    }

    pub fn next(&self) -> Option<InstId> {
        self.next
    }

    pub fn front_block(&self) -> Option<BlockId> {
        self.entries.first().map(|entry| entry.block)
    }

    /// If the path starts by leaving a call block, that block.
    pub fn from_out_transition(&self) -> Option<BlockId> {
        match self.entries.first() {
            Some(entry) if entry.kind == TransitionKind::Out => Some(entry.block),
            _ => None,
        }
    }

    pub fn first_instruction(&self) -> InstId {
        let entry = self.entries.first().expect("first_instruction on empty path");
        InstId::new(entry.block, self.first)
    }

    pub fn last_instruction(&self) -> InstId {
        let entry = self.entries.last().expect("last_instruction on empty path");
        InstId::new(entry.block, self.last)
    }

    pub fn current_index(&self) -> PathIndex {
        PathIndex { block: self.entries.len().wrapping_sub(1), instruction: self.last }
    }

    /// Record that `prev_pc` was executed, with `pc` to execute next.
    pub fn step_instruction(&mut self, module: &Module, prev_pc: InstId, pc: Option<InstId>) {
        assert_eq!(self.next, Some(prev_pc));

        if self.entries.is_empty() {
            self.entries.push(PathEntry { block: prev_pc.block, kind: module.transition_kind(prev_pc) });
            self.first = prev_pc.index;
        } else if prev_pc.block != self.entries.last().unwrap().block {
            self.entries.push(PathEntry { block: prev_pc.block, kind: module.transition_kind(prev_pc) });
        }
        self.last = prev_pc.index;
        self.next = pc
    }

    /// Undo a single [Path::step_instruction].
    pub fn retract_instruction(&mut self, module: &Module) {
        assert!(!self.entries.is_empty());
        let last_executed = self.last_instruction();

        if self.entries.len() == 1 && self.first == self.last {
            // Only one instruction executed
            self.entries.pop();
            self.first = 0;
            self.last = 0;
            self.next = Some(last_executed)
        } else {
            let kind = module.transition_kind(last_executed);
            let first_of_block = module.block(last_executed.block).first_instruction() == last_executed;
            if kind == TransitionKind::In || kind == TransitionKind::Out || first_of_block {
                self.entries.pop();
                let back = *self.entries.last().unwrap();
                self.last = last_entry_instruction(module, back).index;
            } else {
                assert!(self.last > 0);
                self.last -= 1;
                assert!(self.last < module.block(last_executed.block).num_instructions);
            }
            self.next = Some(last_executed)
        }
    }

    /// Whether the block at `index` was executed to its boundary. A
    /// non-tail entry always is; the tail entry is complete when the
    /// last executed instruction sits on the block boundary the
    /// transition kind requires.
    pub fn block_completed(&self, module: &Module, index: usize) -> bool {
        assert!(index < self.entries.len());
        if index + 1 < self.entries.len() {
            return true;
        }
        let entry = self.entries[index];
        if entry.kind == TransitionKind::In {
            self.last == module.block(entry.block).first_instruction().index
        } else {
            self.last == module.block(entry.block).last_instruction().index
        }
    }

    pub fn called_function(&self, module: &Module, index: usize) -> FunctionId {
        assert!(index < self.entries.len());
        assert!(module.block(self.entries[index].block).is_call());
        if index + 1 < self.entries.len() {
            module.block(self.entries[index + 1].block).function
        } else {
            let next = self.next.expect("called_function at path tail without next");
            module.block(next.block).function
        }
    }

    pub fn callsite_from_return(&self, module: &Module, index: usize) -> InstId {
        assert!(index + 1 < self.entries.len());
        module.block(self.entries[index + 1].block).call_instruction()
    }

    /// Reconstruct the call stack by replaying the path. Forwards, an
    /// `In` transition pushes the callee frame and a completed return
    /// block pops; reversed, the operations swap, with the callsite
    /// recovered from the return's successor entry.
    pub fn get_stack(&self, module: &Module, reversed: bool) -> Vec<CallStackFrame> {
        let mut stack = Vec::new();
        for i in 0..self.entries.len() {
            let index = if reversed { self.entries.len() - 1 - i } else { i };
            let current = self.entries[index];

            if i == 0 {
                stack.push(CallStackFrame::new(None, module.block(current.block).function));
                continue;
            }

            if reversed {
                if current.kind == TransitionKind::In {
                    stack.pop();
                } else if module.block(current.block).is_return() && self.block_completed(module, index) {
                    stack.push(CallStackFrame::new(
                        Some(self.callsite_from_return(module, index)),
                        module.block(current.block).function,
                    ));
                }
            } else if current.kind == TransitionKind::In {
                stack.push(CallStackFrame::new(
                    Some(module.block(current.block).call_instruction()),
                    self.called_function(module, index),
                ));
            } else if module.block(current.block).is_return() && self.block_completed(module, index) {
                stack.pop();
            }
        }
        stack
    }

    /// Join two paths end to end. Either `l.next` is `r`'s first
    /// instruction, or `l` ends at a completed return block of a
    /// function called by the call block `r` leaves from (the bridge
    /// between an isolated segment and its caller). The boundary
    /// blocks coalesce iff `l` completed its tail block.
    pub fn concat(module: &Module, l: &Path, r: &Path) -> Path {
        if l.is_empty() && !l.empty_with_next() {
            return r.clone();
        }
        if r.is_empty() && !r.empty_with_next() {
            return l.clone();
        }

        if l.empty_with_next() {
            if r.empty_with_next() {
                assert_eq!(l.next, r.next);
                return l.clone();
            } else {
                assert_eq!(l.next, Some(r.first_instruction()));
                return r.clone();
            }
        }

        if r.empty_with_next() {
            assert_eq!(l.next, r.next);
            return l.clone();
        }

        if l.next.is_none() {
            // A state with nowhere to go after a return
            assert!(l.block_completed(module, l.entries.len() - 1));
            let tail = module.block(l.entries.last().unwrap().block);
            assert!(tail.is_return());
            let out = r.from_out_transition().expect("concat: right path must leave a call block");
            assert!(module.block(out).called.contains(&tail.function));
        } else {
            assert_eq!(l.next, Some(r.first_instruction()));
        }

        let left_whole = l.block_completed(module, l.entries.len() - 1);
        let mut entries =
            Vec::with_capacity(l.entries.len() + r.entries.len() - if left_whole { 0 } else { 1 });
        entries.extend_from_slice(&l.entries);
        for (i, entry) in r.entries.iter().enumerate() {
            if i == 0 && !left_whole {
                continue;
            }
            entries.push(*entry)
        }
        Path { first: l.first, last: r.last, entries, next: r.next }
    }

    pub fn to_string(&self, module: &Module) -> String {
        let mut stack: Vec<FunctionId> = Vec::new();
        let mut understack: Vec<FunctionId> = Vec::new();
        for (i, current) in self.entries.iter().enumerate() {
            if current.kind == TransitionKind::In {
                stack.push(self.called_function(module, i));
            } else if module.block(current.block).is_return() && self.block_completed(module, i) {
                if !stack.is_empty() {
                    stack.pop();
                } else if i != self.entries.len() - 1 {
                    let callsite = self.callsite_from_return(module, i);
                    understack.push(module.block(callsite.block).function);
                }
            }
        }

        let mut out = String::from("path: (");
        if self.entries.is_empty() {
            out.push_str("Empty");
        } else {
            out.push_str(&format!("{} ", self.first));
            let mut balance = 0i32;
            for f in understack.iter().rev() {
                out.push_str(&format!("({}: ", module.function(*f).name));
                balance += 1;
            }
            for (i, current) in self.entries.iter().enumerate() {
                let block = module.block(current.block);
                if i == 0 || self.entries[i - 1].kind == TransitionKind::In {
                    out.push_str(&format!("({}: ", module.function(block.function).name));
                    balance += 1;
                }
                if current.kind == TransitionKind::Out {
                    out.push_str("-> ");
                }
                out.push_str(&block.label);
                if current.kind == TransitionKind::In {
                    out.push_str(" ->");
                }
                if block.is_return() || i == self.entries.len() - 1 {
                    out.push(')');
                    balance -= 1;
                    if i != self.entries.len() - 1 {
                        out.push(' ');
                    }
                } else {
                    out.push(' ');
                }
            }
            while balance > 0 {
                out.push(')');
                balance -= 1;
            }
            out.push_str(&format!(" {}", self.last));
        }
        match self.next {
            Some(next) => out.push_str(&format!(") @ {}", module.inst_to_string(next))),
            None => out.push_str(") @ None"),
        }
        out
    }
}

fn last_entry_instruction(module: &Module, entry: PathEntry) -> InstId {
    match entry.kind {
        TransitionKind::In => module.block(entry.block).first_instruction(),
        TransitionKind::Out | TransitionKind::None => module.block(entry.block).last_instruction(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, ModuleBuilder};

    fn call_module() -> (Module, Vec<BlockId>, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let g = b.add_function("g", 0, true);
        let g0 = b.add_block(g, BlockKind::Base, 3);
        let g1 = b.add_block(g, BlockKind::Return, 2);
        b.add_edge(g0, g1);

        let f = b.add_function("f", 0, true);
        let b1 = b.add_call_block(f, &[g]);
        let b2 = b.add_block(f, BlockKind::Base, 4);
        let b3 = b.add_call_block(f, &[g]);
        let b4 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b1, b2);
        b.add_edge(b2, b3);
        b.add_edge(b3, b4);
        (b.finish(), vec![b1, b2, b3, b4], vec![g0, g1])
    }

    #[test]
    fn test_step_retract_roundtrip() {
        let (module, f_blocks, g_blocks) = call_module();
        let b2 = f_blocks[1];
        let g0 = g_blocks[0];

        let mut path = Path::new(Some(InstId::new(b2, 0)));
        path.step_instruction(&module, InstId::new(b2, 0), Some(InstId::new(b2, 1)));
        let snapshot = path.clone();
        path.step_instruction(&module, InstId::new(b2, 1), Some(InstId::new(b2, 2)));
        path.retract_instruction(&module);
        assert_eq!(path, snapshot);

        // Retracting over a block boundary undoes the block push
        path.step_instruction(&module, InstId::new(b2, 1), Some(InstId::new(b2, 2)));
        path.step_instruction(&module, InstId::new(b2, 2), Some(InstId::new(b2, 3)));
        path.step_instruction(&module, InstId::new(b2, 3), Some(InstId::new(g0, 0)));
        let snapshot = path.clone();
        path.step_instruction(&module, InstId::new(g0, 0), Some(InstId::new(g0, 1)));
        assert_eq!(path.entries().len(), 2);
        path.retract_instruction(&module);
        assert_eq!(path, snapshot)
    }

    #[test]
    fn test_concat_scenario() {
        let (module, f_blocks, g_blocks) = call_module();
        let (b1, b2, b3) = (f_blocks[0], f_blocks[1], f_blocks[2]);
        let b4 = g_blocks[0];

        let l = Path::from_parts(
            1,
            vec![
                PathEntry { block: b1, kind: TransitionKind::Out },
                PathEntry { block: b2, kind: TransitionKind::None },
            ],
            3,
            Some(InstId::new(b3, 0)),
        );
        let r = Path::from_parts(
            0,
            vec![
                PathEntry { block: b3, kind: TransitionKind::In },
                PathEntry { block: b4, kind: TransitionKind::None },
            ],
            1,
            Some(InstId::new(b4, 2)),
        );

        let joined = Path::concat(&module, &l, &r);
        let blocks: Vec<BlockId> = joined.entries().iter().map(|e| e.block).collect();
        assert_eq!(blocks, vec![b1, b2, b3, b4]);
        assert_eq!(joined.first_index(), l.first_index());
        assert_eq!(joined.last_index(), r.last_index());
        assert_eq!(joined.next(), r.next());

        // Concat with an empty-with-next path is idempotent
        let empty = Path::new(l.next());
        let same = Path::concat(&module, &empty, &r);
        assert_eq!(same, r);
    }

    #[test]
    fn test_get_stack() {
        let (module, f_blocks, g_blocks) = call_module();
        let (b1, b2) = (f_blocks[0], f_blocks[1]);
        let (g0, g1) = (g_blocks[0], g_blocks[1]);
        let f = module.block(b1).function;
        let g = module.block(g0).function;

        // f enters g at b1 and is still inside g
        let path = Path::from_parts(
            0,
            vec![
                PathEntry { block: b1, kind: TransitionKind::In },
                PathEntry { block: g0, kind: TransitionKind::None },
            ],
            1,
            Some(InstId::new(g0, 2)),
        );
        let stack = path.get_stack(&module, false);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0], CallStackFrame::new(None, f));
        assert_eq!(stack[1], CallStackFrame::new(Some(module.block(b1).call_instruction()), g));

        // g returns into f; forward replay pops back to one frame
        let path = Path::from_parts(
            0,
            vec![
                PathEntry { block: b1, kind: TransitionKind::In },
                PathEntry { block: g0, kind: TransitionKind::None },
                PathEntry { block: g1, kind: TransitionKind::None },
                PathEntry { block: b1, kind: TransitionKind::Out },
                PathEntry { block: b2, kind: TransitionKind::None },
            ],
            0,
            Some(InstId::new(b2, 1)),
        );
        let stack = path.get_stack(&module, false);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].function, f);

        // Reversed replay of a suffix starting inside g pushes the
        // caller frame from the return's successor
        let path = Path::from_parts(
            0,
            vec![
                PathEntry { block: g1, kind: TransitionKind::None },
                PathEntry { block: b1, kind: TransitionKind::Out },
                PathEntry { block: b2, kind: TransitionKind::None },
            ],
            0,
            Some(InstId::new(b2, 1)),
        );
        let stack = path.get_stack(&module, true);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].function, module.block(b2).function);
        assert_eq!(stack[1].function, g);
    }
}
