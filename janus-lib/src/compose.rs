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

//! Composition rewrites an expression produced inside an isolated
//! execution against a concrete outer state. Every read dispatches on
//! the array's symbolic source: register sources look the value up in
//! the outer frame, globals fetch their backing object, named
//! symbolics are materialized or reused on the outer state, and
//! lazy-initialization sources resolve the (composed) pointer against
//! the outer address space through the executor collaborator, which
//! contributes a guard to the safety condition.
//!
//! The visitor returns `(safety, composed)`; the caller must assert
//! the safety condition separately before trusting the value.

use std::collections::HashMap;

use crate::expr::{ArrayRef, Context, ExprKind, ExprRef, SymbolicSource};
use crate::ir::{FunctionId, GlobalId, Module};
use crate::memory::ObjectState;
use crate::solver::{PartialValidity, Solver};
use crate::state::ExecutionState;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LazyKind {
    Address,
    Size,
    Content,
}

/// The executor surface composition needs: everything that touches
/// the outer state's memory or materializes fresh symbolic objects.
pub trait ComposeSupport {
    /// The outer value of a register in the state's top frame,
    /// materializing a fresh symbolic if it was never written.
    fn register_value(
        &mut self,
        ctx: &Context,
        state: &mut ExecutionState,
        function: FunctionId,
        register: u32,
        width: u32,
    ) -> ExprRef;

    /// The backing object of a global on the outer state.
    fn global_object(&mut self, ctx: &Context, state: &mut ExecutionState, global: GlobalId) -> ObjectState;

    /// Materialize (or find the already materialized) outer array
    /// standing for an isolated-side symbolic array.
    fn materialize(&mut self, ctx: &Context, state: &mut ExecutionState, array: &ArrayRef) -> ArrayRef;

    /// The (size, address) pair standing for a symbolic-size constant
    /// allocation, rewritten through an existing symcrete or freshly
    /// introduced.
    fn size_address_pair(
        &mut self,
        ctx: &Context,
        state: &mut ExecutionState,
        array: &ArrayRef,
    ) -> (ExprRef, ExprRef);

    /// Resolve a lazily initialized pointer against the outer address
    /// space, returning the guard under which the resolution is in
    /// bounds and the value/size/content read.
    fn resolve_lazy_init(
        &mut self,
        ctx: &Context,
        state: &mut ExecutionState,
        kind: LazyKind,
        pointer: &ExprRef,
        index: &ExprRef,
        width: u32,
    ) -> Option<(ExprRef, ExprRef)>;
}

pub struct ComposeVisitor<'a> {
    ctx: &'a Context,
    module: &'a Module,
    support: &'a mut dyn ComposeSupport,
    solver: &'a mut dyn Solver,
    /// The outer state being composed into; resolutions mutate it.
    pub state: ExecutionState,
    safety_constraints: Vec<ExprRef>,
    cache: HashMap<ExprRef, ExprRef, ahash::RandomState>,
}

impl<'a> ComposeVisitor<'a> {
    pub fn new(
        ctx: &'a Context,
        module: &'a Module,
        original: &ExecutionState,
        support: &'a mut dyn ComposeSupport,
        solver: &'a mut dyn Solver,
    ) -> Self {
        ComposeVisitor {
            ctx,
            module,
            support,
            solver,
            state: original.copy(),
            safety_constraints: Vec::new(),
            cache: HashMap::default(),
        }
    }

    /// Rewrite `expr` against the outer state, returning the safety
    /// condition and the composed expression.
    pub fn compose(&mut self, expr: &ExprRef) -> (ExprRef, ExprRef) {
        let result = self.visit(expr);
        let mut safety = self.ctx.true_expr();
        for constraint in &self.safety_constraints {
            safety = self.ctx.and(safety, constraint.clone())
        }
        (safety, result)
    }

    fn visit(&mut self, expr: &ExprRef) -> ExprRef {
        if let Some(cached) = self.cache.get(expr) {
            return cached.clone();
        }
        let ctx = self.ctx;
        let result = match expr.kind() {
            ExprKind::Constant(_) => expr.clone(),
            ExprKind::Read { array, index } => {
                let array = array.clone();
                let index = self.visit(index);
                self.process_read(&array, index, expr.width())
            }
            ExprKind::Concat(lhs, rhs) => {
                let lhs = self.visit(lhs);
                let rhs = self.visit(rhs);
                ctx.concat(lhs, rhs)
            }
            ExprKind::Extract { expr: inner, offset } => {
                let width = expr.width();
                let offset = *offset;
                let inner = self.visit(inner);
                ctx.extract(inner, offset, width)
            }
            ExprKind::Select { cond, true_expr, false_expr } => {
                let cond = cond.clone();
                let true_expr = true_expr.clone();
                let false_expr = false_expr.clone();
                return self.process_select(&cond, &true_expr, &false_expr);
            }
            ExprKind::Not(inner) => {
                let inner = self.visit(inner);
                ctx.not(inner)
            }
            ExprKind::Binop { op, lhs, rhs } => {
                let op = *op;
                let lhs = self.visit(lhs);
                let rhs = self.visit(rhs);
                ctx.binop(op, lhs, rhs)
            }
        };
        self.cache.insert(expr.clone(), result.clone());
        result
    }

    /// A byte-granular view into a wider value: value[8*index ..
    /// 8*index + width].
    fn index_into(&self, value: ExprRef, index: &ExprRef, width: u32) -> ExprRef {
        let ctx = self.ctx;
        if let Some(i) = index.as_constant() {
            let offset = (i as u32) * 8;
            if offset + width <= value.width() {
                return ctx.extract(value, offset, width);
            }
            return ctx.constant(0, width);
        }
        let shift = ctx.binop(
            crate::expr::Binop::Mul,
            ctx.coerce(index.clone(), value.width()),
            ctx.constant(8, value.width()),
        );
        let shifted = ctx.binop(crate::expr::Binop::LShr, value, shift);
        ctx.extract(shifted, 0, width)
    }

    fn process_read(&mut self, array: &ArrayRef, index: ExprRef, width: u32) -> ExprRef {
        let ctx = self.ctx;
        match array.source().clone() {
            SymbolicSource::Argument { function, index: arg_index } => {
                let value =
                    self.support.register_value(ctx, &mut self.state, function, arg_index, width.max(8));
                self.index_into(value, &index, width)
            }
            SymbolicSource::Instruction { inst, index: _ } => {
                let function = self.module.block(inst.block).function;
                let register = self.module.register_of(inst);
                let value =
                    self.support.register_value(ctx, &mut self.state, function, register, width.max(8));
                self.index_into(value, &index, width)
            }
            SymbolicSource::Global { global } => {
                let object = self.support.global_object(ctx, &mut self.state, global);
                object.read(ctx, &index, width)
            }
            SymbolicSource::MakeSymbolic { .. }
            | SymbolicSource::Irreproducible { .. }
            | SymbolicSource::Constant { .. }
            | SymbolicSource::SymbolicSizeConstant { .. } => {
                let outer = self.support.materialize(ctx, &mut self.state, array);
                ctx.read(&outer, index)
            }
            SymbolicSource::SymbolicSizeConstantAddress { .. } => {
                let (_, address) = self.support.size_address_pair(ctx, &mut self.state, array);
                self.index_into(address, &index, width)
            }
            SymbolicSource::LazyInitAddress { pointer } => {
                self.lazy_init(LazyKind::Address, &pointer, &index, width)
            }
            SymbolicSource::LazyInitSize { pointer } => self.lazy_init(LazyKind::Size, &pointer, &index, width),
            SymbolicSource::LazyInitContent { pointer } => {
                self.lazy_init(LazyKind::Content, &pointer, &index, width)
            }
        }
    }

    fn lazy_init(&mut self, kind: LazyKind, pointer: &ExprRef, index: &ExprRef, width: u32) -> ExprRef {
        let ctx = self.ctx;
        let composed_pointer = self.visit(pointer);
        match self.support.resolve_lazy_init(ctx, &mut self.state, kind, &composed_pointer, index, width) {
            Some((guard, value)) => {
                self.safety_constraints.push(guard);
                value
            }
            None => {
                // The resolution failed or the solver gave up: make
                // the composed state unable to proceed silently
                self.safety_constraints.push(ctx.false_expr());
                ctx.constant(0, width)
            }
        }
    }

    fn process_select(&mut self, cond: &ExprRef, true_expr: &ExprRef, false_expr: &ExprRef) -> ExprRef {
        let ctx = self.ctx;
        let composed_cond = self.visit(cond);
        if composed_cond.is_true() {
            return self.visit(true_expr);
        }
        if composed_cond.is_false() {
            return self.visit(false_expr);
        }

        let constraints = self.state.constraints.with_assumptions(self.state.assumptions.iter());
        match self.solver.evaluate(&constraints, &composed_cond) {
            PartialValidity::MustBeTrue | PartialValidity::MayBeTrue => self.visit(true_expr),
            PartialValidity::MustBeFalse | PartialValidity::MayBeFalse => self.visit(false_expr),
            PartialValidity::TrueOrFalse => {
                // Compose both branches under opposing assumptions and
                // join their safety conditions disjunctively
                let negated = ctx.not(composed_cond.clone());

                let before = self.safety_constraints.len();
                self.state.assumptions.insert(composed_cond.clone());
                let composed_true = self.visit(true_expr);
                let true_safety = self.drain_safety(before);
                self.state.assumptions.remove(&composed_cond);

                self.state.assumptions.insert(negated.clone());
                let composed_false = self.visit(false_expr);
                let false_safety = self.drain_safety(before);
                self.state.assumptions.remove(&negated);

                self.safety_constraints.push(ctx.or(true_safety, false_safety));
                ctx.select(composed_cond, composed_true, composed_false)
            }
            PartialValidity::None => {
                // Unknown: compose syntactically but never let the
                // result be relied upon
                self.safety_constraints.push(ctx.false_expr());
                let composed_true = self.visit(true_expr);
                let composed_false = self.visit(false_expr);
                ctx.select(composed_cond, composed_true, composed_false)
            }
        }
    }

    fn drain_safety(&mut self, from: usize) -> ExprRef {
        let mut conjunction = self.ctx.true_expr();
        for constraint in self.safety_constraints.drain(from..) {
            conjunction = self.ctx.and(conjunction, constraint)
        }
        conjunction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSet;
    use crate::expr::Binop;
    use crate::ir::{BlockKind, InstId, ModuleBuilder};
    use crate::memory::MemoryObject;
    use crate::solver::{SatResult, SolverResponse};
    use std::sync::Arc;

    struct TestSupport {
        argument_value: u64,
    }

    impl ComposeSupport for TestSupport {
        fn register_value(
            &mut self,
            ctx: &Context,
            _: &mut ExecutionState,
            _: FunctionId,
            _: u32,
            width: u32,
        ) -> ExprRef {
            ctx.constant(self.argument_value, width.max(32))
        }

        fn global_object(&mut self, ctx: &Context, _: &mut ExecutionState, _: GlobalId) -> ObjectState {
            let size = ctx.constant(4, 32);
            let array =
                ctx.array(SymbolicSource::Constant { values: vec![9, 8, 7, 6] }, 32, 8, size.clone());
            ObjectState::new(Arc::new(MemoryObject::new(ctx.constant(0x40, 64), size)), array)
        }

        fn materialize(&mut self, _: &Context, _: &mut ExecutionState, array: &ArrayRef) -> ArrayRef {
            array.clone()
        }

        fn size_address_pair(
            &mut self,
            ctx: &Context,
            _: &mut ExecutionState,
            _: &ArrayRef,
        ) -> (ExprRef, ExprRef) {
            (ctx.constant(8, 64), ctx.constant(0x1000, 64))
        }

        fn resolve_lazy_init(
            &mut self,
            ctx: &Context,
            _: &mut ExecutionState,
            _: LazyKind,
            pointer: &ExprRef,
            _: &ExprRef,
            width: u32,
        ) -> Option<(ExprRef, ExprRef)> {
            let guard = ctx.binop(Binop::Ult, ctx.constant(0, pointer.width()), pointer.clone());
            Some((guard, ctx.constant(0x55, width)))
        }
    }

    struct FixedSolver {
        verdict: PartialValidity,
    }

    impl Solver for FixedSolver {
        fn check_sat(&mut self, _: &ConstraintSet) -> SatResult {
            SatResult::Sat
        }
        fn evaluate(&mut self, _: &ConstraintSet, _: &ExprRef) -> PartialValidity {
            self.verdict
        }
        fn get_response(&mut self, _: &ConstraintSet, _: &ExprRef) -> SolverResponse {
            SolverResponse::Unknown
        }
        fn get_value(&mut self, _: &ConstraintSet, _: &ExprRef) -> Option<ExprRef> {
            None
        }
        fn get_model(&mut self, _: &ConstraintSet, _: &[ArrayRef]) -> Option<Assignment> {
            None
        }
        fn set_timeout(&mut self, _: Option<std::time::Duration>) {}
    }

    use crate::constraints::Assignment;

    fn setup() -> (Arc<Context>, Arc<Module>, ExecutionState, FunctionId) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 1, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let module = Arc::new(b.finish());
        let ctx = Arc::new(Context::new());
        let state = ExecutionState::initial(&ctx, &module, f);
        (ctx, module, state, f)
    }

    #[test]
    fn test_compose_argument_read() {
        let (ctx, module, state, f) = setup();
        let mut support = TestSupport { argument_value: 0xdead };
        let mut solver = FixedSolver { verdict: PartialValidity::TrueOrFalse };
        let mut visitor = ComposeVisitor::new(&ctx, &module, &state, &mut support, &mut solver);

        let arg_array = ctx.array(
            SymbolicSource::Argument { function: f, index: 0 },
            32,
            8,
            ctx.constant(4, 32),
        );
        let byte0 = ctx.read(&arg_array, ctx.constant(0, 32));
        let byte1 = ctx.read(&arg_array, ctx.constant(1, 32));
        let word = ctx.concat(byte1, byte0);

        let (safety, composed) = visitor.compose(&word);
        assert!(safety.is_true());
        assert_eq!(composed.as_constant(), Some(0xdead))
    }

    #[test]
    fn test_compose_lazy_init_guard() {
        let (ctx, module, state, _) = setup();
        let mut support = TestSupport { argument_value: 0x2000 };
        let mut solver = FixedSolver { verdict: PartialValidity::TrueOrFalse };
        let mut visitor = ComposeVisitor::new(&ctx, &module, &state, &mut support, &mut solver);

        // A pointer that composes to a constant, dereferenced lazily
        let pointer_array = ctx.array(
            SymbolicSource::Argument { function: module.function_named("f").unwrap(), index: 0 },
            32,
            64,
            ctx.constant(1, 32),
        );
        let pointer = ctx.read(&pointer_array, ctx.constant(0, 32));
        let content_array = ctx.array(
            SymbolicSource::LazyInitContent { pointer: pointer.clone() },
            32,
            8,
            ctx.constant(8, 32),
        );
        let value = ctx.read(&content_array, ctx.constant(0, 32));

        let (safety, composed) = visitor.compose(&value);
        assert_eq!(composed.as_constant(), Some(0x55));
        // The guard 0 < ptr folded against the constant pointer
        assert!(safety.is_true())
    }

    #[test]
    fn test_compose_select_two_sided() {
        let (ctx, module, state, f) = setup();
        let mut support = TestSupport { argument_value: 1 };
        let mut solver = FixedSolver { verdict: PartialValidity::TrueOrFalse };
        let mut visitor = ComposeVisitor::new(&ctx, &module, &state, &mut support, &mut solver);

        // A condition the outer state cannot decide: a fresh symbolic
        let sym_array = ctx.array(
            SymbolicSource::MakeSymbolic { name: "c".to_string(), version: 0 },
            32,
            1,
            ctx.constant(1, 32),
        );
        let cond = ctx.read(&sym_array, ctx.constant(0, 32));
        let arg_array =
            ctx.array(SymbolicSource::Argument { function: f, index: 0 }, 32, 8, ctx.constant(4, 32));
        let t = ctx.read(&arg_array, ctx.constant(0, 32));
        let e = ctx.constant(7, 8);

        let select = ctx.select(cond.clone(), t, e.clone());
        let (safety, composed) = visitor.compose(&select);
        assert!(safety.is_true());
        match composed.kind() {
            ExprKind::Select { true_expr, false_expr, .. } => {
                assert_eq!(true_expr.as_constant(), Some(1));
                assert_eq!(false_expr.as_constant(), Some(7));
                let _ = e;
            }
            other => panic!("expected a select, got {:?}", other),
        }
    }

    #[test]
    fn test_compose_unknown_select_poisons_safety() {
        let (ctx, module, state, f) = setup();
        let mut support = TestSupport { argument_value: 1 };
        let mut solver = FixedSolver { verdict: PartialValidity::None };
        let mut visitor = ComposeVisitor::new(&ctx, &module, &state, &mut support, &mut solver);

        let sym_array = ctx.array(
            SymbolicSource::MakeSymbolic { name: "c".to_string(), version: 0 },
            32,
            1,
            ctx.constant(1, 32),
        );
        let cond = ctx.read(&sym_array, ctx.constant(0, 32));
        let arg_array =
            ctx.array(SymbolicSource::Argument { function: f, index: 0 }, 32, 8, ctx.constant(4, 32));
        let t = ctx.read(&arg_array, ctx.constant(0, 32));
        let select = ctx.select(cond, t, ctx.constant(7, 8));

        let (safety, _) = visitor.compose(&select);
        assert!(safety.is_false())
    }
}
