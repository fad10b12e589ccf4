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

//! The expression algebra of the engine: quantifier-free bitvector
//! terms over symbolic arrays, hash-consed through the session
//! [Context] so that structurally equal expressions are the same
//! value. Booleans are width-1 bitvectors. Arrays are identified by a
//! [SymbolicSource] describing where their contents come from, which
//! is what the compose visitor dispatches on when an isolated result
//! is rewritten against an outer state.
//!
//! All construction goes through the builder methods on [Context],
//! which fold constants eagerly and canonicalize equalities so a
//! constant operand sits on the left.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::forest::{HistoryInterner, TargetSetInterner};
use crate::ir::{FunctionId, GlobalId, InstId};
use crate::target::TargetInterner;

const MAGIC_HASH_CONSTANT: u64 = 39916801;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Binop {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    Eq,
    Ult,
    Ule,
    Slt,
    Sle,
}

impl Binop {
    pub fn is_comparison(self) -> bool {
        use Binop::*;
        matches!(self, Eq | Ult | Ule | Slt | Sle)
    }

    pub fn name(self) -> &'static str {
        use Binop::*;
        match self {
            Add => "bvadd",
            Sub => "bvsub",
            Mul => "bvmul",
            UDiv => "bvudiv",
            SDiv => "bvsdiv",
            URem => "bvurem",
            SRem => "bvsrem",
            And => "bvand",
            Or => "bvor",
            Xor => "bvxor",
            Shl => "bvshl",
            LShr => "bvlshr",
            AShr => "bvashr",
            Eq => "=",
            Ult => "bvult",
            Ule => "bvule",
            Slt => "bvslt",
            Sle => "bvsle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        use Binop::*;
        Some(match name {
            "bvadd" => Add,
            "bvsub" => Sub,
            "bvmul" => Mul,
            "bvudiv" => UDiv,
            "bvsdiv" => SDiv,
            "bvurem" => URem,
            "bvsrem" => SRem,
            "bvand" => And,
            "bvor" => Or,
            "bvxor" => Xor,
            "bvshl" => Shl,
            "bvlshr" => LShr,
            "bvashr" => AShr,
            "=" => Eq,
            "bvult" => Ult,
            "bvule" => Ule,
            "bvslt" => Slt,
            "bvsle" => Sle,
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Constant(u64),
    Read { array: ArrayRef, index: ExprRef },
    Concat(ExprRef, ExprRef),
    Extract { expr: ExprRef, offset: u32 },
    Select { cond: ExprRef, true_expr: ExprRef, false_expr: ExprRef },
    Not(ExprRef),
    Binop { op: Binop, lhs: ExprRef, rhs: ExprRef },
}

#[derive(Debug)]
pub struct ExprNode {
    id: u64,
    width: u32,
    height: u32,
    hash: u64,
    kind: ExprKind,
}

/// A hash-consed expression. Equality is pointer identity, which the
/// interning in [Context] makes coincide with structural equality.
#[derive(Clone, Debug)]
pub struct ExprRef(Arc<ExprNode>);

impl ExprRef {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn as_constant(&self) -> Option<u64> {
        match self.0.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.kind, ExprKind::Constant(_))
    }

    pub fn is_true(&self) -> bool {
        self.0.width == 1 && self.as_constant() == Some(1)
    }

    pub fn is_false(&self) -> bool {
        self.0.width == 1 && self.as_constant() == Some(0)
    }

    pub fn is_bool(&self) -> bool {
        self.0.width == 1
    }

    /// Append every distinct array the expression reads to `arrays`.
    pub fn collect_arrays(&self, arrays: &mut Vec<ArrayRef>) {
        match self.kind() {
            ExprKind::Constant(_) => (),
            ExprKind::Read { array, index } => {
                if !arrays.contains(array) {
                    arrays.push(array.clone());
                    array.size().collect_arrays(arrays);
                    if let Some(pointer) = array.source().pointer() {
                        pointer.collect_arrays(arrays)
                    }
                }
                index.collect_arrays(arrays)
            }
            ExprKind::Concat(lhs, rhs) => {
                lhs.collect_arrays(arrays);
                rhs.collect_arrays(arrays)
            }
            ExprKind::Extract { expr, .. } | ExprKind::Not(expr) => expr.collect_arrays(arrays),
            ExprKind::Select { cond, true_expr, false_expr } => {
                cond.collect_arrays(arrays);
                true_expr.collect_arrays(arrays);
                false_expr.collect_arrays(arrays)
            }
            ExprKind::Binop { lhs, rhs, .. } => {
                lhs.collect_arrays(arrays);
                rhs.collect_arrays(arrays)
            }
        }
    }
}

impl PartialEq for ExprRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ExprRef {}

impl Hash for ExprRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state)
    }
}

impl PartialOrd for ExprRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExprRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

/// Where the contents of a symbolic array come from.
#[derive(Clone, Debug)]
pub enum SymbolicSource {
    /// A vector of known element values.
    Constant { values: Vec<u64> },
    /// A constant-filled object whose size is symbolic.
    SymbolicSizeConstant { default_value: u64, version: u64 },
    /// The address of a symbolic-size constant object.
    SymbolicSizeConstantAddress { version: u64 },
    /// A named symbolic input.
    MakeSymbolic { name: String, version: u64 },
    /// Address, size and content of memory materialized lazily when a
    /// pointer is first dereferenced.
    LazyInitAddress { pointer: ExprRef },
    LazyInitSize { pointer: ExprRef },
    LazyInitContent { pointer: ExprRef },
    /// The value of a function argument register.
    Argument { function: FunctionId, index: u32 },
    /// The value produced by an instruction register.
    Instruction { inst: InstId, index: u32 },
    /// The backing object of a global variable.
    Global { global: GlobalId },
    /// A value that cannot be reproduced by a test case (e.g. an
    /// external call result).
    Irreproducible { name: String, version: u64 },
}

impl SymbolicSource {
    pub fn pointer(&self) -> Option<&ExprRef> {
        use SymbolicSource::*;
        match self {
            LazyInitAddress { pointer } | LazyInitSize { pointer } | LazyInitContent { pointer } => Some(pointer),
            _ => None,
        }
    }

    pub fn is_lazy_init(&self) -> bool {
        self.pointer().is_some()
    }

    fn hash_value(&self) -> u64 {
        use SymbolicSource::*;
        let mut h: u64 = match self {
            Constant { .. } => 1,
            SymbolicSizeConstant { .. } => 2,
            SymbolicSizeConstantAddress { .. } => 3,
            MakeSymbolic { .. } => 4,
            LazyInitAddress { .. } => 5,
            LazyInitSize { .. } => 6,
            LazyInitContent { .. } => 7,
            Argument { .. } => 8,
            Instruction { .. } => 9,
            Global { .. } => 10,
            Irreproducible { .. } => 11,
        };
        match self {
            Constant { values } => {
                for v in values {
                    h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*v)
                }
            }
            SymbolicSizeConstant { default_value, version } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*default_value);
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*version)
            }
            SymbolicSizeConstantAddress { version } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*version)
            }
            MakeSymbolic { name, version } | Irreproducible { name, version } => {
                for b in name.bytes() {
                    h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(b as u64)
                }
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*version)
            }
            LazyInitAddress { pointer } | LazyInitSize { pointer } | LazyInitContent { pointer } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(pointer.id())
            }
            Argument { function, index } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(function.as_usize() as u64);
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*index as u64)
            }
            Instruction { inst, index } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(inst.block.as_usize() as u64);
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(inst.index as u64);
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*index as u64)
            }
            Global { global } => {
                h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(global.as_usize() as u64)
            }
        }
        h
    }

    fn equivalent(&self, other: &Self) -> bool {
        use SymbolicSource::*;
        match (self, other) {
            (Constant { values: a }, Constant { values: b }) => a == b,
            (
                SymbolicSizeConstant { default_value: a, version: va },
                SymbolicSizeConstant { default_value: b, version: vb },
            ) => a == b && va == vb,
            (SymbolicSizeConstantAddress { version: a }, SymbolicSizeConstantAddress { version: b }) => a == b,
            (MakeSymbolic { name: a, version: va }, MakeSymbolic { name: b, version: vb }) => a == b && va == vb,
            (LazyInitAddress { pointer: a }, LazyInitAddress { pointer: b }) => a == b,
            (LazyInitSize { pointer: a }, LazyInitSize { pointer: b }) => a == b,
            (LazyInitContent { pointer: a }, LazyInitContent { pointer: b }) => a == b,
            (Argument { function: fa, index: ia }, Argument { function: fb, index: ib }) => fa == fb && ia == ib,
            (Instruction { inst: ka, index: ia }, Instruction { inst: kb, index: ib }) => ka == kb && ia == ib,
            (Global { global: a }, Global { global: b }) => a == b,
            (Irreproducible { name: a, version: va }, Irreproducible { name: b, version: vb }) => {
                a == b && va == vb
            }
            (_, _) => false,
        }
    }
}

#[derive(Debug)]
pub struct ArrayNode {
    id: u64,
    name: String,
    domain_width: u32,
    range_width: u32,
    size: ExprRef,
    source: SymbolicSource,
    hash: u64,
}

/// A uniqued symbolic array.
#[derive(Clone, Debug)]
pub struct ArrayRef(Arc<ArrayNode>);

impl ArrayRef {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn domain_width(&self) -> u32 {
        self.0.domain_width
    }

    pub fn range_width(&self) -> u32 {
        self.0.range_width
    }

    pub fn size(&self) -> &ExprRef {
        &self.0.size
    }

    pub fn source(&self) -> &SymbolicSource {
        &self.0.source
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ArrayRef {}

impl Hash for ArrayRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state)
    }
}

impl PartialOrd for ArrayRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArrayRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

/// The unique caches for one exploration session. All builders borrow
/// the context; caches are append-only for the session lifetime.
pub struct Context {
    exprs: RefCell<HashMap<u64, Vec<ExprRef>, ahash::RandomState>>,
    next_expr_id: Cell<u64>,
    arrays: RefCell<HashMap<u64, Vec<ArrayRef>, ahash::RandomState>>,
    next_array_id: Cell<u64>,
    pub targets: TargetInterner,
    pub target_sets: TargetSetInterner,
    pub histories: HistoryInterner,
}

fn mask(value: u64, width: u32) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

fn sign_extend_to_i64(value: u64, width: u32) -> i64 {
    if width >= 64 {
        value as i64
    } else {
        let shift = 64 - width;
        ((value << shift) as i64) >> shift
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            exprs: RefCell::new(HashMap::default()),
            next_expr_id: Cell::new(0),
            arrays: RefCell::new(HashMap::default()),
            next_array_id: Cell::new(0),
            targets: TargetInterner::new(),
            target_sets: TargetSetInterner::new(),
            histories: HistoryInterner::new(),
        }
    }

    fn intern(&self, kind: ExprKind, width: u32) -> ExprRef {
        let hash = hash_kind(&kind, width);
        let mut exprs = self.exprs.borrow_mut();
        let bucket = exprs.entry(hash).or_insert_with(Vec::new);
        for existing in bucket.iter() {
            if existing.width() == width && kinds_equal(existing.kind(), &kind) {
                return existing.clone();
            }
        }
        let id = self.next_expr_id.get();
        self.next_expr_id.set(id + 1);
        let height = kind_height(&kind);
        let expr = ExprRef(Arc::new(ExprNode { id, width, height, hash, kind }));
        bucket.push(expr.clone());
        expr
    }

    pub fn constant(&self, value: u64, width: u32) -> ExprRef {
        assert!(width > 0 && width <= 64);
        self.intern(ExprKind::Constant(mask(value, width)), width)
    }

    pub fn true_expr(&self) -> ExprRef {
        self.constant(1, 1)
    }

    pub fn false_expr(&self) -> ExprRef {
        self.constant(0, 1)
    }

    pub fn bool_expr(&self, b: bool) -> ExprRef {
        if b {
            self.true_expr()
        } else {
            self.false_expr()
        }
    }

    pub fn array(
        &self,
        source: SymbolicSource,
        domain_width: u32,
        range_width: u32,
        size: ExprRef,
    ) -> ArrayRef {
        let mut hash = source.hash_value();
        hash = hash.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(domain_width as u64);
        hash = hash.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(range_width as u64);
        hash = hash.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(size.id());

        let mut arrays = self.arrays.borrow_mut();
        let bucket = arrays.entry(hash).or_insert_with(Vec::new);
        for existing in bucket.iter() {
            if existing.domain_width() == domain_width
                && existing.range_width() == range_width
                && existing.size() == &size
                && existing.source().equivalent(&source)
            {
                return existing.clone();
            }
        }
        let id = self.next_array_id.get();
        self.next_array_id.set(id + 1);
        let name = source_name(&source, id);
        let array = ArrayRef(Arc::new(ArrayNode { id, name, domain_width, range_width, size, source, hash }));
        bucket.push(array.clone());
        array
    }

    pub fn read(&self, array: &ArrayRef, index: ExprRef) -> ExprRef {
        assert_eq!(index.width(), array.domain_width());
        if let (Some(i), SymbolicSource::Constant { values }) = (index.as_constant(), array.source()) {
            if let Some(value) = values.get(i as usize) {
                return self.constant(*value, array.range_width());
            }
        }
        let width = array.range_width();
        self.intern(ExprKind::Read { array: array.clone(), index }, width)
    }

    pub fn concat(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let width = lhs.width() + rhs.width();
        assert!(width <= 64);
        if let (Some(l), Some(r)) = (lhs.as_constant(), rhs.as_constant()) {
            return self.constant((l << rhs.width()) | r, width);
        }
        self.intern(ExprKind::Concat(lhs, rhs), width)
    }

    pub fn extract(&self, expr: ExprRef, offset: u32, width: u32) -> ExprRef {
        assert!(offset + width <= expr.width());
        if width == expr.width() {
            return expr;
        }
        if let Some(value) = expr.as_constant() {
            return self.constant(value >> offset, width);
        }
        self.intern(ExprKind::Extract { expr, offset }, width)
    }

    pub fn select(&self, cond: ExprRef, true_expr: ExprRef, false_expr: ExprRef) -> ExprRef {
        assert!(cond.is_bool());
        assert_eq!(true_expr.width(), false_expr.width());
        if cond.is_true() {
            return true_expr;
        }
        if cond.is_false() {
            return false_expr;
        }
        if true_expr == false_expr {
            return true_expr;
        }
        let width = true_expr.width();
        self.intern(ExprKind::Select { cond, true_expr, false_expr }, width)
    }

    pub fn not(&self, expr: ExprRef) -> ExprRef {
        if let Some(value) = expr.as_constant() {
            return self.constant(!value, expr.width());
        }
        if let ExprKind::Not(inner) = expr.kind() {
            return inner.clone();
        }
        let width = expr.width();
        self.intern(ExprKind::Not(expr), width)
    }

    pub fn binop(&self, op: Binop, mut lhs: ExprRef, mut rhs: ExprRef) -> ExprRef {
        assert_eq!(lhs.width(), rhs.width(), "binop on mismatched widths");
        let width = if op.is_comparison() { 1 } else { lhs.width() };

        if let (Some(l), Some(r)) = (lhs.as_constant(), rhs.as_constant()) {
            if let Some(value) = eval_binop(op, l, r, lhs.width()) {
                return self.constant(value, width);
            }
        }

        if op == Binop::Eq {
            if lhs == rhs {
                return self.true_expr();
            }
            // Keep constants on the left so the simplifier recognizes
            // an equality it can substitute through
            if rhs.is_constant() && !lhs.is_constant() {
                std::mem::swap(&mut lhs, &mut rhs)
            }
        }

        self.intern(ExprKind::Binop { op, lhs, rhs }, width)
    }

    pub fn eq(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.binop(Binop::Eq, lhs, rhs)
    }

    pub fn and(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert!(lhs.is_bool() && rhs.is_bool());
        if lhs.is_true() {
            return rhs;
        }
        if rhs.is_true() {
            return lhs;
        }
        if lhs.is_false() || rhs.is_false() {
            return self.false_expr();
        }
        self.binop(Binop::And, lhs, rhs)
    }

    pub fn or(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert!(lhs.is_bool() && rhs.is_bool());
        if lhs.is_false() {
            return rhs;
        }
        if rhs.is_false() {
            return lhs;
        }
        if lhs.is_true() || rhs.is_true() {
            return self.true_expr();
        }
        self.binop(Binop::Or, lhs, rhs)
    }

    pub fn add(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.binop(Binop::Add, lhs, rhs)
    }

    pub fn sub(&self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.binop(Binop::Sub, lhs, rhs)
    }

    /// Zero extend (or truncate) an expression to a width.
    pub fn coerce(&self, expr: ExprRef, width: u32) -> ExprRef {
        use std::cmp::Ordering::*;
        match expr.width().cmp(&width) {
            Equal => expr,
            Greater => self.extract(expr, 0, width),
            Less => {
                let zeros = self.constant(0, width - expr.width());
                self.concat(zeros, expr)
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn eval_binop(op: Binop, l: u64, r: u64, width: u32) -> Option<u64> {
    use Binop::*;
    let ls = sign_extend_to_i64(l, width);
    let rs = sign_extend_to_i64(r, width);
    let value = match op {
        Add => mask(l.wrapping_add(r), width),
        Sub => mask(l.wrapping_sub(r), width),
        Mul => mask(l.wrapping_mul(r), width),
        UDiv => {
            if r == 0 {
                return None;
            }
            l / r
        }
        SDiv => {
            if r == 0 {
                return None;
            }
            mask(ls.wrapping_div(rs) as u64, width)
        }
        URem => {
            if r == 0 {
                return None;
            }
            l % r
        }
        SRem => {
            if r == 0 {
                return None;
            }
            mask(ls.wrapping_rem(rs) as u64, width)
        }
        And => l & r,
        Or => l | r,
        Xor => l ^ r,
        Shl => {
            if r >= width as u64 {
                0
            } else {
                mask(l << r, width)
            }
        }
        LShr => {
            if r >= width as u64 {
                0
            } else {
                l >> r
            }
        }
        AShr => {
            if r >= width as u64 {
                mask((ls >> 63) as u64, width)
            } else {
                mask((ls >> r) as u64, width)
            }
        }
        Eq => (l == r) as u64,
        Ult => (l < r) as u64,
        Ule => (l <= r) as u64,
        Slt => (ls < rs) as u64,
        Sle => (ls <= rs) as u64,
    };
    Some(value)
}

fn hash_kind(kind: &ExprKind, width: u32) -> u64 {
    use ExprKind::*;
    let mut h: u64 = match kind {
        Constant(_) => 1,
        Read { .. } => 2,
        Concat(_, _) => 3,
        Extract { .. } => 4,
        Select { .. } => 5,
        Not(_) => 6,
        Binop { .. } => 7,
    };
    h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(width as u64);
    match kind {
        Constant(value) => h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*value),
        Read { array, index } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(array.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(index.id())
        }
        Concat(lhs, rhs) => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(lhs.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(rhs.id())
        }
        Extract { expr, offset } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(expr.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*offset as u64)
        }
        Select { cond, true_expr, false_expr } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(cond.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(true_expr.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(false_expr.id())
        }
        Not(expr) => h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(expr.id()),
        Binop { op, lhs, rhs } => {
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(*op as u64);
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(lhs.id());
            h = h.wrapping_mul(MAGIC_HASH_CONSTANT).wrapping_add(rhs.id())
        }
    }
    h
}

fn kinds_equal(a: &ExprKind, b: &ExprKind) -> bool {
    use ExprKind::*;
    match (a, b) {
        (Constant(x), Constant(y)) => x == y,
        (Read { array: aa, index: ia }, Read { array: ab, index: ib }) => aa == ab && ia == ib,
        (Concat(la, ra), Concat(lb, rb)) => la == lb && ra == rb,
        (Extract { expr: ea, offset: oa }, Extract { expr: eb, offset: ob }) => ea == eb && oa == ob,
        (
            Select { cond: ca, true_expr: ta, false_expr: fa },
            Select { cond: cb, true_expr: tb, false_expr: fb },
        ) => ca == cb && ta == tb && fa == fb,
        (Not(ea), Not(eb)) => ea == eb,
        (Binop { op: opa, lhs: la, rhs: ra }, Binop { op: opb, lhs: lb, rhs: rb }) => {
            opa == opb && la == lb && ra == rb
        }
        (_, _) => false,
    }
}

fn kind_height(kind: &ExprKind) -> u32 {
    use ExprKind::*;
    1 + match kind {
        Constant(_) => 0,
        Read { index, .. } => index.height(),
        Concat(lhs, rhs) => lhs.height().max(rhs.height()),
        Extract { expr, .. } | Not(expr) => expr.height(),
        Select { cond, true_expr, false_expr } => cond.height().max(true_expr.height()).max(false_expr.height()),
        Binop { lhs, rhs, .. } => lhs.height().max(rhs.height()),
    }
}

fn source_name(source: &SymbolicSource, id: u64) -> String {
    use SymbolicSource::*;
    match source {
        Constant { .. } => format!("const_arr{}", id),
        SymbolicSizeConstant { version, .. } => format!("ss_const{}", version),
        SymbolicSizeConstantAddress { version } => format!("ss_addr{}", version),
        MakeSymbolic { name, version } => format!("{}#{}", name, version),
        LazyInitAddress { .. } => format!("li_addr{}", id),
        LazyInitSize { .. } => format!("li_size{}", id),
        LazyInitContent { .. } => format!("li_content{}", id),
        Argument { function, index } => format!("arg_{}_{}", function.as_usize(), index),
        Instruction { inst, index } => format!("reg_{}_{}_{}", inst.block.as_usize(), inst.index, index),
        Global { global } => format!("global_{}", global.as_usize()),
        Irreproducible { name, version } => format!("irre_{}#{}", name, version),
    }
}

impl fmt::Display for ExprRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_expr(f, self)
    }
}

fn write_expr(f: &mut fmt::Formatter, expr: &ExprRef) -> fmt::Result {
    match expr.kind() {
        ExprKind::Constant(value) => write!(f, "(_ bv{} {})", value, expr.width()),
        ExprKind::Read { array, index } => write!(f, "(read |{}| {})", array.name(), index),
        ExprKind::Concat(lhs, rhs) => write!(f, "(concat {} {})", lhs, rhs),
        ExprKind::Extract { expr: inner, offset } => {
            write!(f, "(extract {} {} {})", offset, expr.width(), inner)
        }
        ExprKind::Select { cond, true_expr, false_expr } => {
            write!(f, "(ite {} {} {})", cond, true_expr, false_expr)
        }
        ExprKind::Not(inner) => write!(f, "(not {})", inner),
        ExprKind::Binop { op, lhs, rhs } => write!(f, "({} {} {})", op.name(), lhs, rhs),
    }
}

/// Split a boolean expression on conjunctions, appending the leaves to
/// `out`.
pub fn split_ands(expr: &ExprRef, out: &mut Vec<ExprRef>) {
    if let ExprKind::Binop { op: Binop::And, lhs, rhs } = expr.kind() {
        if expr.is_bool() {
            split_ands(lhs, out);
            split_ands(rhs, out);
            return;
        }
    }
    out.push(expr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbolic(ctx: &Context, name: &str, width: u32) -> ExprRef {
        let size = ctx.constant(1, 32);
        let array =
            ctx.array(SymbolicSource::MakeSymbolic { name: name.to_string(), version: 0 }, 32, width, size);
        ctx.read(&array, ctx.constant(0, 32))
    }

    #[test]
    fn test_hash_consing() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let y = symbolic(&ctx, "x", 32);
        assert_eq!(x, y);
        let five = ctx.constant(5, 32);
        let a = ctx.add(x.clone(), five.clone());
        let b = ctx.add(y, five);
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id())
    }

    #[test]
    fn test_constant_folding() {
        let ctx = Context::new();
        let a = ctx.constant(3, 8);
        let b = ctx.constant(250, 8);
        assert_eq!(ctx.add(a.clone(), b.clone()).as_constant(), Some(253));
        assert_eq!(ctx.add(b.clone(), ctx.constant(10, 8)).as_constant(), Some(4));
        assert_eq!(ctx.binop(Binop::Slt, b.clone(), a.clone()).as_constant(), Some(1));
        assert_eq!(ctx.binop(Binop::Ult, b, a).as_constant(), Some(0));
        let c = ctx.concat(ctx.constant(0xab, 8), ctx.constant(0xcd, 8));
        assert_eq!(c.as_constant(), Some(0xabcd));
        assert_eq!(c.width(), 16);
        assert_eq!(ctx.extract(c, 8, 8).as_constant(), Some(0xab))
    }

    #[test]
    fn test_eq_canonical() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let five = ctx.constant(5, 32);
        let eq = ctx.eq(x.clone(), five.clone());
        match eq.kind() {
            ExprKind::Binop { op: Binop::Eq, lhs, .. } => assert!(lhs.is_constant()),
            _ => panic!("expected an equality"),
        }
        assert!(ctx.eq(x.clone(), x).is_true())
    }

    #[test]
    fn test_select_folding() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 8);
        let y = symbolic(&ctx, "y", 8);
        let t = ctx.true_expr();
        assert_eq!(ctx.select(t, x.clone(), y.clone()), x);
        let cond = ctx.eq(x.clone(), y.clone());
        let same = ctx.select(cond, x.clone(), x.clone());
        assert_eq!(same, x)
    }

    #[test]
    fn test_split_ands() {
        let ctx = Context::new();
        let p = ctx.eq(symbolic(&ctx, "x", 8), ctx.constant(1, 8));
        let q = ctx.eq(symbolic(&ctx, "y", 8), ctx.constant(2, 8));
        let r = ctx.eq(symbolic(&ctx, "z", 8), ctx.constant(3, 8));
        let conj = ctx.binop(Binop::And, ctx.binop(Binop::And, p.clone(), q.clone()), r.clone());
        let mut out = Vec::new();
        split_ands(&conj, &mut out);
        assert_eq!(out, vec![p, q, r])
    }

    #[test]
    fn test_collect_arrays() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let y = symbolic(&ctx, "y", 32);
        let sum = ctx.add(x, y);
        let mut arrays = Vec::new();
        sum.collect_arrays(&mut arrays);
        assert_eq!(arrays.len(), 2)
    }
}
