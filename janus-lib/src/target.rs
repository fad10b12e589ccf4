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

//! Targets are structured predicates on states: reach a block (at its
//! start or end), cover a specific branch of a terminator, or
//! reproduce an error at a location. Targets compare structurally but
//! are uniqued through the session context, so equality degenerates to
//! pointer identity and hashes are memoized on construction.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ir::{BlockId, Module};

const MAGIC_HASH_CONSTANT: u64 = 39916801;

/// The error classes of the analyzed program that exploration can be
/// asked to reproduce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReachWithError {
    None,
    /// Reaching the marked location is itself the error.
    Reachable,
    MayBeNullPointer,
    MustBeNullPointer,
    OutOfBounds,
    DivisionByZero,
    AssertionFailure,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorLocation {
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    ReachBlock { block: BlockId, at_end: bool },
    CoverBranch { block: BlockId, branch: u32 },
    ReproduceError { errors: Vec<ReachWithError>, id: String, location: ErrorLocation, block: BlockId },
}

#[derive(Debug)]
pub struct TargetNode {
    id: u64,
    hash: u64,
    kind: TargetKind,
}

/// A uniqued target.
#[derive(Clone, Debug)]
pub struct Target(Arc<TargetNode>);

impl Target {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &TargetKind {
        &self.0.kind
    }

    pub fn block(&self) -> BlockId {
        match &self.0.kind {
            TargetKind::ReachBlock { block, .. }
            | TargetKind::CoverBranch { block, .. }
            | TargetKind::ReproduceError { block, .. } => *block,
        }
    }

    /// Error-reproduction targets complete by failing at their block.
    pub fn should_fail_on_this_target(&self) -> bool {
        matches!(self.0.kind, TargetKind::ReproduceError { .. })
    }

    /// Whether a target that must only be covered once blocks the
    /// other states' forests when some state completes it.
    pub fn should_cover_once(&self) -> bool {
        !self.should_fail_on_this_target()
    }

    pub fn is_that_error(&self, error: ReachWithError) -> bool {
        match &self.0.kind {
            TargetKind::ReproduceError { errors, .. } => errors.contains(&error),
            _ => false,
        }
    }

    pub fn to_string(&self, module: &Module) -> String {
        match &self.0.kind {
            TargetKind::ReachBlock { block, at_end } => format!(
                "reach {} at {}",
                module.block_to_string(*block),
                if *at_end { "end" } else { "start" }
            ),
            TargetKind::CoverBranch { block, branch } => {
                format!("cover branch {} of {}", branch, module.block_to_string(*block))
            }
            TargetKind::ReproduceError { errors, id, block, .. } => {
                format!("reproduce {:?} ({}) at {}", errors, id, module.block_to_string(*block))
            }
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state)
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

fn hash_target_kind(kind: &TargetKind) -> u64 {
    let mut h: u64 = match kind {
        TargetKind::ReachBlock { .. } => 1,
        TargetKind::CoverBranch { .. } => 2,
        TargetKind::ReproduceError { .. } => 3,
    };
    match kind {
        TargetKind::ReachBlock { block, at_end } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(block.as_usize() as u64);
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*at_end as u64)
        }
        TargetKind::CoverBranch { block, branch } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(block.as_usize() as u64);
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*branch as u64)
        }
        TargetKind::ReproduceError { errors, id, location, block } => {
            for error in errors {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*error as u64)
            }
            for b in id.bytes() {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(b as u64)
            }
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(location.start_line as u64);
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(location.end_line as u64);
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(block.as_usize() as u64)
        }
    }
    h
}

/// The unique cache for targets, owned by the session context.
pub struct TargetInterner {
    targets: RefCell<HashMap<u64, Vec<Target>, ahash::RandomState>>,
    next_id: Cell<u64>,
}

impl TargetInterner {
    pub fn new() -> Self {
        TargetInterner { targets: RefCell::new(HashMap::default()), next_id: Cell::new(0) }
    }

    fn intern(&self, kind: TargetKind) -> Target {
        let hash = hash_target_kind(&kind);
        let mut targets = self.targets.borrow_mut();
        let bucket = targets.entry(hash).or_insert_with(Vec::new);
        for existing in bucket.iter() {
            if *existing.kind() == kind {
                return existing.clone();
            }
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let target = Target(Arc::new(TargetNode { id, hash, kind }));
        bucket.push(target.clone());
        target
    }

    pub fn reach_block(&self, block: BlockId, at_end: bool) -> Target {
        self.intern(TargetKind::ReachBlock { block, at_end })
    }

    pub fn cover_branch(&self, block: BlockId, branch: u32) -> Target {
        self.intern(TargetKind::CoverBranch { block, branch })
    }

    pub fn reproduce_error(
        &self,
        errors: Vec<ReachWithError>,
        id: String,
        location: ErrorLocation,
        block: BlockId,
    ) -> Target {
        self.intern(TargetKind::ReproduceError { errors, id, location, block })
    }
}

impl Default for TargetInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, ModuleBuilder};

    #[test]
    fn test_target_uniquing() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 1);
        let _ = b.finish();

        let interner = TargetInterner::new();
        let t1 = interner.reach_block(b0, false);
        let t2 = interner.reach_block(b0, false);
        let t3 = interner.reach_block(b0, true);
        assert_eq!(t1, t2);
        assert_eq!(t1.id(), t2.id());
        assert_ne!(t1, t3);

        let c1 = interner.cover_branch(b0, 0);
        let c2 = interner.cover_branch(b0, 1);
        assert_ne!(c1, c2);
        assert!(!c1.should_fail_on_this_target());

        let e = interner.reproduce_error(
            vec![ReachWithError::MustBeNullPointer],
            "err0".to_string(),
            ErrorLocation::default(),
            b0,
        );
        assert!(e.should_fail_on_this_target());
        assert!(e.is_that_error(ReachWithError::MustBeNullPointer));
        assert!(!e.is_that_error(ReachWithError::OutOfBounds))
    }
}
