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

//! Path constraints and their simplification. A [ConstraintSet] is a
//! set of boolean expressions together with the symcretes standing in
//! for symbolic sizes and addresses and a concretization assignment
//! under which the conjunction is satisfiable. [PathConstraints] pairs
//! a constraint set with the execution path that produced it and
//! remembers, for every surviving constraint, the original constraints
//! it was derived from, so validity cores can be lifted back.
//!
//! The simplifier iterates equality substitution to fixpoint: an
//! equality with a constant side rewrites the other side everywhere
//! else, a plain constraint rewrites to true, and a negation rewrites
//! its operand to false.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::RewriteEqualitiesPolicy;
use crate::expr::{split_ands, ArrayRef, Binop, Context, ExprKind, ExprRef};
use crate::ir::{InstId, Module};
use crate::path::{Path, PathIndex};

/// A concrete byte assignment for a set of arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    pub bindings: BTreeMap<ArrayRef, Vec<u8>>,
}

impl Assignment {
    pub fn new() -> Self {
        Assignment { bindings: BTreeMap::new() }
    }

    pub fn bind(&mut self, array: ArrayRef, bytes: Vec<u8>) {
        self.bindings.insert(array, bytes);
    }

    pub fn get(&self, array: &ArrayRef) -> Option<&Vec<u8>> {
        self.bindings.get(array)
    }

    /// The zero-filled vector of an object's concretized size, used
    /// when the solver did not produce explicit bytes for it.
    pub fn zero_filled(size: usize) -> Vec<u8> {
        vec![0u8; size]
    }
}

static SYMCRETE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct SymcreteNode {
    id: u64,
    /// The symbolic expression the symcrete stands for.
    pub symcretized: ExprRef,
    /// The array whose concrete content is the current witness.
    pub marker: ArrayRef,
}

/// A pair of a symbolic expression and the array whose concrete value
/// stands in for it during exploration.
#[derive(Clone, Debug)]
pub struct SymcreteRef(Arc<SymcreteNode>);

impl SymcreteRef {
    pub fn new(symcretized: ExprRef, marker: ArrayRef) -> Self {
        let id = SYMCRETE_COUNTER.fetch_add(1, Ordering::SeqCst);
        SymcreteRef(Arc::new(SymcreteNode { id, symcretized, marker }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn symcretized(&self) -> &ExprRef {
        &self.0.symcretized
    }

    pub fn dependent_arrays(&self) -> Vec<ArrayRef> {
        let mut arrays = vec![self.0.marker.clone()];
        self.0.symcretized.collect_arrays(&mut arrays);
        arrays
    }

    pub fn marker(&self) -> &ArrayRef {
        &self.0.marker
    }
}

impl PartialEq for SymcreteRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for SymcreteRef {}

impl PartialOrd for SymcreteRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SymcreteRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for SymcreteRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

pub type Constraints = BTreeSet<ExprRef>;

#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    constraints: Constraints,
    symcretes: BTreeSet<SymcreteRef>,
    concretization: Assignment,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn symcretes(&self) -> &BTreeSet<SymcreteRef> {
        &self.symcretes
    }

    pub fn concretization(&self) -> &Assignment {
        &self.concretization
    }

    pub fn add_constraint(&mut self, expr: ExprRef, delta: &Assignment) {
        self.constraints.insert(expr);
        for (array, bytes) in &delta.bindings {
            self.concretization.bindings.insert(array.clone(), bytes.clone());
        }
    }

    pub fn add_symcrete(&mut self, symcrete: SymcreteRef, concretization: &Assignment) {
        for array in symcrete.dependent_arrays() {
            if let Some(bytes) = concretization.get(&array) {
                self.concretization.bindings.insert(array, bytes.clone());
            }
        }
        self.symcretes.insert(symcrete);
    }

    pub fn is_symcretized(&self, expr: &ExprRef) -> bool {
        self.symcretes.iter().any(|s| s.symcretized() == expr)
    }

    pub fn find_symcrete(&self, expr: &ExprRef) -> Option<&SymcreteRef> {
        self.symcretes.iter().find(|s| s.symcretized() == expr)
    }

    /// Update the witness bytes of arrays that already have one.
    pub fn rewrite_concretization(&mut self, assignment: &Assignment) {
        for (array, bytes) in &assignment.bindings {
            if self.concretization.bindings.contains_key(array) {
                self.concretization.bindings.insert(array.clone(), bytes.clone());
            }
        }
    }

    pub fn change_constraints(&mut self, constraints: Constraints) {
        self.constraints = constraints
    }

    pub fn gather_arrays(&self) -> Vec<ArrayRef> {
        let mut arrays = Vec::new();
        for constraint in &self.constraints {
            constraint.collect_arrays(&mut arrays)
        }
        arrays
    }

    pub fn gather_symcretized_arrays(&self) -> Vec<ArrayRef> {
        let mut arrays = Vec::new();
        for symcrete in &self.symcretes {
            for array in symcrete.dependent_arrays() {
                if !arrays.contains(&array) {
                    arrays.push(array)
                }
            }
        }
        arrays
    }
}

pub type Dependencies = HashMap<ExprRef, BTreeSet<ExprRef>, ahash::RandomState>;

#[derive(Clone, Debug, Default)]
pub struct PathConstraints {
    path: Path,
    original: Constraints,
    path_indexes: HashMap<ExprRef, PathIndex, ahash::RandomState>,
    ordered: BTreeMap<PathIndex, Vec<ExprRef>>,
    simplification_map: Dependencies,
    constraints: ConstraintSet,
}

impl PathConstraints {
    pub fn new(next: Option<InstId>) -> Self {
        PathConstraints { path: Path::new(next), ..Default::default() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn constraint_set(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn constraint_set_mut(&mut self) -> &mut ConstraintSet {
        &mut self.constraints
    }

    pub fn original(&self) -> &Constraints {
        &self.original
    }

    pub fn indexes(&self) -> &HashMap<ExprRef, PathIndex, ahash::RandomState> {
        &self.path_indexes
    }

    pub fn ordered(&self) -> &BTreeMap<PathIndex, Vec<ExprRef>> {
        &self.ordered
    }

    pub fn simplification_map(&self) -> &Dependencies {
        &self.simplification_map
    }

    pub fn advance_path(&mut self, module: &Module, prev_pc: InstId, pc: Option<InstId>) {
        self.path.step_instruction(module, prev_pc, pc)
    }

    pub fn retract_path(&mut self, module: &Module) {
        self.path.retract_instruction(module)
    }

    pub fn advance_path_concat(&mut self, module: &Module, path: &Path) {
        self.path = Path::concat(module, &self.path, path)
    }

    /// A constraint set extended with extra assumptions, used when a
    /// solver query must be made under a hypothesis.
    pub fn with_assumptions<'a, I: IntoIterator<Item = &'a ExprRef>>(&self, assumptions: I) -> ConstraintSet {
        let mut result = self.constraints.clone();
        let empty = Assignment::new();
        for assumption in assumptions {
            result.add_constraint(assumption.clone(), &empty)
        }
        result
    }

    pub fn add_constraint(
        &mut self,
        ctx: &Context,
        policy: RewriteEqualitiesPolicy,
        expr: ExprRef,
        delta: &Assignment,
    ) -> BTreeSet<ExprRef> {
        let index = self.path.current_index();
        self.add_constraint_at(ctx, policy, expr, delta, index)
    }

    /// Add a constraint recorded at a specific path position. Adding a
    /// constraint that simplifies to false is a caller bug.
    pub fn add_constraint_at(
        &mut self,
        ctx: &Context,
        policy: RewriteEqualitiesPolicy,
        expr: ExprRef,
        delta: &Assignment,
        index: PathIndex,
    ) -> BTreeSet<ExprRef> {
        let result = simplify_expr(ctx, self.constraints.constraints(), &expr);
        if result.simplified.is_constant() {
            assert!(result.simplified.is_true(), "Attempt to add invalid constraint");
            return BTreeSet::new();
        }

        let mut added = BTreeSet::new();
        let mut exprs = Vec::new();
        split_ands(&result.simplified, &mut exprs);
        for expr in exprs {
            if expr.is_constant() {
                assert!(expr.is_true(), "Expression simplified to false");
            } else {
                self.original.insert(expr.clone());
                added.insert(expr.clone());
                self.path_indexes.insert(expr.clone(), index);
                self.simplification_map.entry(expr.clone()).or_default().insert(expr.clone());
                self.ordered.entry(index).or_default().push(expr.clone());
                self.constraints.add_constraint(expr, delta);
            }
        }

        if policy != RewriteEqualitiesPolicy::None {
            let simplified = simplify(ctx, self.constraints.constraints(), policy);
            self.constraints.change_constraints(simplified.simplified);
            self.simplification_map =
                compose_dependencies(&self.simplification_map, &simplified.dependency);
        }

        added
    }

    pub fn is_symcretized(&self, expr: &ExprRef) -> bool {
        self.constraints.is_symcretized(expr)
    }

    pub fn add_symcrete(&mut self, symcrete: SymcreteRef, concretization: &Assignment) {
        self.constraints.add_symcrete(symcrete, concretization)
    }

    pub fn rewrite_concretization(&mut self, assignment: &Assignment) {
        self.constraints.rewrite_concretization(assignment)
    }
}

pub struct ExprResult {
    pub simplified: ExprRef,
    /// The original constraints that contributed replacements.
    pub dependency: BTreeSet<ExprRef>,
}

pub struct SetResult {
    pub simplified: Constraints,
    /// For each surviving constraint, the set of input constraints it
    /// was derived from.
    pub dependency: Dependencies,
}

struct Replacer<'a> {
    ctx: &'a Context,
    map: &'a HashMap<ExprRef, ExprRef, ahash::RandomState>,
    parents: &'a HashMap<ExprRef, ExprRef, ahash::RandomState>,
    dependency: BTreeSet<ExprRef>,
    evaluate_selects: bool,
}

impl<'a> Replacer<'a> {
    fn new(
        ctx: &'a Context,
        map: &'a HashMap<ExprRef, ExprRef, ahash::RandomState>,
        parents: &'a HashMap<ExprRef, ExprRef, ahash::RandomState>,
        evaluate_selects: bool,
    ) -> Self {
        Replacer { ctx, map, parents, dependency: BTreeSet::new(), evaluate_selects }
    }

    fn lookup(&mut self, expr: &ExprRef) -> Option<ExprRef> {
        if let Some(replacement) = self.map.get(expr) {
            if let Some(parent) = self.parents.get(expr) {
                self.dependency.insert(parent.clone());
            }
            Some(replacement.clone())
        } else {
            None
        }
    }

    fn visit(&mut self, expr: &ExprRef) -> ExprRef {
        if let Some(replacement) = self.lookup(expr) {
            return replacement;
        }

        let ctx = self.ctx;
        let rebuilt = match expr.kind() {
            ExprKind::Constant(_) => expr.clone(),
            ExprKind::Read { array, index } => {
                let index = self.visit(index);
                ctx.read(array, index)
            }
            ExprKind::Concat(lhs, rhs) => {
                let lhs = self.visit(lhs);
                let rhs = self.visit(rhs);
                ctx.concat(lhs, rhs)
            }
            ExprKind::Extract { expr: inner, offset } => {
                let width = expr.width();
                let inner = self.visit(inner);
                ctx.extract(inner, *offset, width)
            }
            ExprKind::Select { cond, true_expr, false_expr } => {
                let cond = self.visit(cond);
                if self.evaluate_selects && cond.is_constant() {
                    return if cond.is_true() { self.visit(true_expr) } else { self.visit(false_expr) };
                }
                let true_expr = self.visit(true_expr);
                let false_expr = self.visit(false_expr);
                ctx.select(cond, true_expr, false_expr)
            }
            ExprKind::Not(inner) => {
                let inner = self.visit(inner);
                ctx.not(inner)
            }
            ExprKind::Binop { op, lhs, rhs } => {
                let lhs = self.visit(lhs);
                let rhs = self.visit(rhs);
                ctx.binop(*op, lhs, rhs)
            }
        };

        if rebuilt != *expr {
            if let Some(replacement) = self.lookup(&rebuilt) {
                return replacement;
            }
        }
        rebuilt
    }
}

type ReplacementMap = HashMap<ExprRef, ExprRef, ahash::RandomState>;

struct Replacements {
    equalities: ReplacementMap,
    parents: ReplacementMap,
}

/// An equality whose sides an expression-level simplification may
/// substitute: a constant side replaces the other side, otherwise the
/// higher side replaces the lower one.
fn constant_equality(expr: &ExprRef) -> Option<(ExprRef, ExprRef)> {
    if let ExprKind::Binop { op: Binop::Eq, lhs, rhs } = expr.kind() {
        if lhs.is_constant() {
            return Some((rhs.clone(), lhs.clone()));
        }
    }
    None
}

/// Simplify a single expression against a set of constraints,
/// returning the rewritten expression and the constraints that
/// contributed to it.
pub fn simplify_expr(ctx: &Context, constraints: &Constraints, expr: &ExprRef) -> ExprResult {
    if expr.is_constant() {
        return ExprResult { simplified: expr.clone(), dependency: BTreeSet::new() };
    }

    let mut equalities: ReplacementMap = HashMap::default();
    let mut parents: ReplacementMap = HashMap::default();

    for constraint in constraints {
        if let ExprKind::Binop { op: Binop::Eq, lhs, rhs } = constraint.kind() {
            let (mut left, mut right) = (lhs.clone(), rhs.clone());
            if right.height() < left.height() {
                std::mem::swap(&mut left, &mut right)
            }
            if lhs.is_constant() {
                equalities.insert(rhs.clone(), lhs.clone());
                parents.insert(rhs.clone(), constraint.clone());
            } else {
                equalities.insert(constraint.clone(), ctx.true_expr());
                equalities.insert(right.clone(), left);
                parents.insert(constraint.clone(), constraint.clone());
                parents.insert(right, constraint.clone());
            }
        } else {
            equalities.insert(constraint.clone(), ctx.true_expr());
            parents.insert(constraint.clone(), constraint.clone());
            if let ExprKind::Not(inner) = constraint.kind() {
                equalities.insert(inner.clone(), ctx.false_expr());
                parents.insert(inner.clone(), constraint.clone());
            }
        }
    }

    let mut replacer = Replacer::new(ctx, &equalities, &parents, true);
    let simplified = replacer.visit(expr);
    ExprResult { simplified, dependency: replacer.dependency }
}

fn gather_replacements(ctx: &Context, constraints: &Constraints) -> Replacements {
    let mut result = Replacements { equalities: HashMap::default(), parents: HashMap::default() };
    for constraint in constraints {
        add_replacement(ctx, &mut result, constraint)
    }
    result
}

fn add_replacement(ctx: &Context, replacements: &mut Replacements, expr: &ExprRef) {
    if let Some((from, to)) = constant_equality(expr) {
        replacements.equalities.insert(from.clone(), to);
        replacements.parents.insert(from, expr.clone());
    } else {
        replacements.equalities.insert(expr.clone(), ctx.true_expr());
        replacements.parents.insert(expr.clone(), expr.clone());
    }
}

fn remove_replacement(replacements: &mut Replacements, expr: &ExprRef) {
    if let Some((from, _)) = constant_equality(expr) {
        replacements.equalities.remove(&from);
        replacements.parents.remove(&from);
    } else {
        replacements.equalities.remove(expr);
        replacements.parents.remove(expr);
    }
}

/// Simplify a whole constraint set to fixpoint. Each round rewrites
/// every constraint under the replacements built from the other
/// constraints (excluding the one being rewritten, so a constraint
/// does not trivially rewrite itself to true).
pub fn simplify(ctx: &Context, constraints: &Constraints, policy: RewriteEqualitiesPolicy) -> SetResult {
    assert!(policy != RewriteEqualitiesPolicy::None);

    let mut simplified: Constraints = constraints.clone();
    let mut dependencies: Dependencies = HashMap::default();
    for constraint in constraints {
        let mut deps = BTreeSet::new();
        deps.insert(constraint.clone());
        dependencies.insert(constraint.clone(), deps);
    }

    let mut changed = true;
    while changed {
        changed = false;
        let mut replacements = gather_replacements(ctx, &simplified);
        let mut current_simplified: Constraints = BTreeSet::new();
        let mut current_dependencies: Dependencies = HashMap::default();

        for constraint in &simplified {
            remove_replacement(&mut replacements, constraint);
            let mut replacer = Replacer::new(
                ctx,
                &replacements.equalities,
                &replacements.parents,
                policy == RewriteEqualitiesPolicy::Full,
            );
            let rewritten = replacer.visit(constraint);
            let dependency = replacer.dependency;
            add_replacement(ctx, &mut replacements, constraint);

            let mut parts = Vec::new();
            split_ands(&rewritten, &mut parts);
            let split = parts.len() > 1;
            for part in parts {
                current_simplified.insert(part.clone());
                let deps = current_dependencies.entry(part).or_default();
                deps.extend(dependency.iter().cloned());
                deps.insert(constraint.clone());
            }
            if rewritten != *constraint || split {
                changed = true
            }
        }

        if changed {
            simplified = current_simplified;
            dependencies = compose_dependencies(&dependencies, &current_dependencies);
        }
    }

    let true_expr = ctx.true_expr();
    simplified.remove(&true_expr);
    dependencies.remove(&true_expr);

    SetResult { simplified, dependency: dependencies }
}

/// `upper` maps its keys to sets of originals; `lower` maps new
/// constraints to sets of `upper` keys. The composition maps new
/// constraints straight to originals.
pub fn compose_dependencies(upper: &Dependencies, lower: &Dependencies) -> Dependencies {
    let mut result: Dependencies = HashMap::default();
    for (dependent, deps) in lower {
        let entry = result.entry(dependent.clone()).or_default();
        for dep in deps {
            match upper.get(dep) {
                Some(originals) => entry.extend(originals.iter().cloned()),
                None => {
                    entry.insert(dep.clone());
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::SymbolicSource;

    fn symbolic(ctx: &Context, name: &str, width: u32) -> ExprRef {
        let size = ctx.constant(1, 32);
        let array =
            ctx.array(SymbolicSource::MakeSymbolic { name: name.to_string(), version: 0 }, 32, width, size);
        ctx.read(&array, ctx.constant(0, 32))
    }

    #[test]
    fn test_simplifier_fixpoint() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let y = symbolic(&ctx, "y", 32);
        let z = symbolic(&ctx, "z", 32);

        let c1 = ctx.eq(x.clone(), ctx.constant(5, 32));
        let c2 = ctx.eq(y.clone(), ctx.add(x.clone(), ctx.constant(1, 32)));
        let c3 = ctx.eq(z.clone(), ctx.add(y.clone(), ctx.constant(2, 32)));

        let mut constraints = Constraints::new();
        constraints.insert(c1.clone());
        constraints.insert(c2.clone());
        constraints.insert(c3.clone());

        let result = simplify(&ctx, &constraints, RewriteEqualitiesPolicy::Full);

        let y6 = ctx.eq(y.clone(), ctx.constant(6, 32));
        let z8 = ctx.eq(z.clone(), ctx.constant(8, 32));
        assert!(result.simplified.contains(&c1));
        assert!(result.simplified.contains(&y6));
        assert!(result.simplified.contains(&z8));
        assert_eq!(result.simplified.len(), 3);

        let y_deps = &result.dependency[&y6];
        assert!(y_deps.contains(&c1) && y_deps.contains(&c2));
        let z_deps = &result.dependency[&z8];
        assert!(z_deps.contains(&c1) && z_deps.contains(&c2) && z_deps.contains(&c3));
    }

    #[test]
    fn test_simplify_expr_dependency() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let c1 = ctx.eq(x.clone(), ctx.constant(5, 32));
        let mut constraints = Constraints::new();
        constraints.insert(c1.clone());

        let sum = ctx.add(x.clone(), ctx.constant(1, 32));
        let result = simplify_expr(&ctx, &constraints, &sum);
        assert_eq!(result.simplified.as_constant(), Some(6));
        assert!(result.dependency.contains(&c1))
    }

    #[test]
    fn test_negation_rewrites_false() {
        let ctx = Context::new();
        let p = ctx.binop(Binop::Ult, symbolic(&ctx, "x", 8), ctx.constant(10, 8));
        let not_p = ctx.not(p.clone());
        let mut constraints = Constraints::new();
        constraints.insert(not_p);

        let result = simplify_expr(&ctx, &constraints, &p);
        assert!(result.simplified.is_false())
    }

    #[test]
    #[should_panic]
    fn test_add_false_forbidden() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let mut pc = PathConstraints::new(None);
        let five = ctx.eq(x.clone(), ctx.constant(5, 32));
        pc.add_constraint(&ctx, RewriteEqualitiesPolicy::Simple, five, &Assignment::new());
        let six = ctx.eq(x, ctx.constant(6, 32));
        pc.add_constraint(&ctx, RewriteEqualitiesPolicy::Simple, six, &Assignment::new());
    }

    #[test]
    fn test_path_constraints_tracks_originals() {
        let ctx = Context::new();
        let x = symbolic(&ctx, "x", 32);
        let y = symbolic(&ctx, "y", 32);
        let mut pc = PathConstraints::new(None);
        let a = Assignment::new();

        // y = x + 1 arrives first, so the set-level rewrite is what
        // collapses it once x becomes known
        let c2 = ctx.eq(y.clone(), ctx.add(x.clone(), ctx.constant(1, 32)));
        let c1 = ctx.eq(x.clone(), ctx.constant(5, 32));
        pc.add_constraint(&ctx, RewriteEqualitiesPolicy::Full, c2.clone(), &a);
        pc.add_constraint(&ctx, RewriteEqualitiesPolicy::Full, c1.clone(), &a);

        let y6 = ctx.eq(y, ctx.constant(6, 32));
        assert!(pc.constraint_set().constraints().contains(&c1));
        assert!(pc.constraint_set().constraints().contains(&y6));
        assert!(pc.original().contains(&c2));
        assert!(pc.original().contains(&c1));
        let deps = &pc.simplification_map()[&y6];
        assert!(deps.contains(&c1) && deps.contains(&c2))
    }

    #[test]
    fn test_symcretes() {
        let ctx = Context::new();
        let size_expr = symbolic(&ctx, "n", 64);
        let marker = ctx.array(
            SymbolicSource::MakeSymbolic { name: "n_bytes".to_string(), version: 0 },
            32,
            8,
            ctx.constant(8, 32),
        );
        let symcrete = SymcreteRef::new(size_expr.clone(), marker.clone());

        let mut concretization = Assignment::new();
        concretization.bind(marker.clone(), vec![4, 0, 0, 0, 0, 0, 0, 0]);

        let mut cs = ConstraintSet::new();
        cs.add_symcrete(symcrete, &concretization);
        assert!(cs.is_symcretized(&size_expr));
        assert_eq!(cs.concretization().get(&marker), Some(&vec![4, 0, 0, 0, 0, 0, 0, 0]));

        let mut rewrite = Assignment::new();
        rewrite.bind(marker.clone(), vec![8, 0, 0, 0, 0, 0, 0, 0]);
        cs.rewrite_concretization(&rewrite);
        assert_eq!(cs.concretization().get(&marker), Some(&vec![8, 0, 0, 0, 0, 0, 0, 0]))
    }
}
