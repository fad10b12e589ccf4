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

//! A small shadow of the external address space, carrying just enough
//! structure for the engine: objects with (possibly symbolic) address
//! and size expressions, their backing arrays, and the binding map a
//! state owns. The concrete memory model lives in the executor; the
//! compose visitor talks to it through [crate::compose::ComposeSupport].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::expr::{ArrayRef, Context, ExprRef};
use crate::ir::{GlobalId, InstId};

static OBJECT_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    id: u64,
}

impl ObjectId {
    pub fn fresh() -> Self {
        ObjectId { id: OBJECT_COUNTER.fetch_add(1, Ordering::SeqCst) }
    }

    pub fn as_u64(self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug)]
pub struct MemoryObject {
    pub id: ObjectId,
    pub address: ExprRef,
    pub size: ExprRef,
    /// Local objects die with their stack frame.
    pub is_local: bool,
    pub is_global: bool,
    pub allocated_at: Option<InstId>,
    pub global: Option<GlobalId>,
}

impl MemoryObject {
    pub fn new(address: ExprRef, size: ExprRef) -> Self {
        MemoryObject {
            id: ObjectId::fresh(),
            address,
            size,
            is_local: false,
            is_global: false,
            allocated_at: None,
            global: None,
        }
    }

    pub fn local(address: ExprRef, size: ExprRef, allocated_at: InstId) -> Self {
        MemoryObject { is_local: true, allocated_at: Some(allocated_at), ..Self::new(address, size) }
    }

    pub fn global(address: ExprRef, size: ExprRef, global: GlobalId) -> Self {
        MemoryObject { is_global: true, global: Some(global), ..Self::new(address, size) }
    }
}

/// The contents of an object, backed by a symbolic array.
#[derive(Clone, Debug)]
pub struct ObjectState {
    pub object: Arc<MemoryObject>,
    pub array: ArrayRef,
}

impl ObjectState {
    pub fn new(object: Arc<MemoryObject>, array: ArrayRef) -> Self {
        ObjectState { object, array }
    }

    /// Read `width` bits at a byte offset, least significant byte
    /// first.
    pub fn read(&self, ctx: &Context, offset: &ExprRef, width: u32) -> ExprRef {
        assert!(width % 8 == 0 && width > 0);
        let bytes = width / 8;
        let mut result: Option<ExprRef> = None;
        for byte in 0..bytes {
            let index = ctx.add(offset.clone(), ctx.constant(byte as u64, offset.width()));
            let read = ctx.read(&self.array, index);
            result = Some(match result {
                None => read,
                Some(acc) => ctx.concat(read, acc),
            });
        }
        result.unwrap()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AddressSpace {
    objects: BTreeMap<ObjectId, Arc<ObjectState>>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, state: ObjectState) -> ObjectId {
        let id = state.object.id;
        self.objects.insert(id, Arc::new(state));
        id
    }

    pub fn unbind(&mut self, id: ObjectId) {
        self.objects.remove(&id);
    }

    pub fn find(&self, id: ObjectId) -> Option<&Arc<ObjectState>> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Arc<ObjectState>> {
        self.objects.values()
    }

    /// The object backing a global, if it was materialized already.
    pub fn find_global(&self, global: GlobalId) -> Option<&Arc<ObjectState>> {
        self.objects.values().find(|os| os.object.global == Some(global))
    }

    pub fn find_by_array(&self, array: &ArrayRef) -> Option<&Arc<ObjectState>> {
        self.objects.values().find(|os| &os.array == array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SymbolicSource;

    #[test]
    fn test_read_bytes() {
        let ctx = Context::new();
        let size = ctx.constant(4, 32);
        let array = ctx.array(
            SymbolicSource::Constant { values: vec![0x11, 0x22, 0x33, 0x44] },
            32,
            8,
            size.clone(),
        );
        let object = Arc::new(MemoryObject::new(ctx.constant(0x1000, 64), size));
        let os = ObjectState::new(object, array);
        let word = os.read(&ctx, &ctx.constant(0, 32), 16);
        // Little endian: byte 0 is least significant
        assert_eq!(word.as_constant(), Some(0x2211))
    }

    #[test]
    fn test_bind_unbind() {
        let ctx = Context::new();
        let size = ctx.constant(1, 32);
        let array = ctx.array(SymbolicSource::Constant { values: vec![0] }, 32, 8, size.clone());
        let object = Arc::new(MemoryObject::new(ctx.constant(0x2000, 64), size));
        let mut space = AddressSpace::new();
        let id = space.bind(ObjectState::new(object, array));
        assert!(space.find(id).is_some());
        space.unbind(id);
        assert!(space.find(id).is_none())
    }
}
