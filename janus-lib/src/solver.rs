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

//! The solver collaborator boundary. No concrete solver lives in this
//! crate; the engine only relies on a collaborator that answers
//! satisfiability, value, and validity-core queries within a timeout,
//! and treats a timeout as an advisory [SatResult::Unknown].

use std::time::Duration;

use crate::constraints::{Assignment, ConstraintSet};
use crate::expr::{ArrayRef, ExprRef};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

/// Partial knowledge about a boolean expression under a constraint
/// set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartialValidity {
    MustBeTrue,
    MustBeFalse,
    MayBeTrue,
    MayBeFalse,
    TrueOrFalse,
    None,
}

/// Answer to a validity query: a proof with the core of constraints
/// it used, a counterexample model, or nothing.
#[derive(Clone, Debug)]
pub enum SolverResponse {
    Valid { core: Vec<ExprRef> },
    Invalid { model: Assignment },
    Unknown,
}

pub trait Solver {
    fn check_sat(&mut self, constraints: &ConstraintSet) -> SatResult;

    /// Classify `expr` under the constraints.
    fn evaluate(&mut self, constraints: &ConstraintSet, expr: &ExprRef) -> PartialValidity;

    /// Prove that the constraints entail `expr`, or produce a model
    /// of the negation.
    fn get_response(&mut self, constraints: &ConstraintSet, expr: &ExprRef) -> SolverResponse;

    /// A concrete value for the expression under the constraints.
    fn get_value(&mut self, constraints: &ConstraintSet, expr: &ExprRef) -> Option<ExprRef>;

    /// Concrete contents for the given arrays under the constraints.
    fn get_model(&mut self, constraints: &ConstraintSet, arrays: &[ArrayRef]) -> Option<Assignment>;

    /// Bound the next queries; `None` clears the bound. Exceeding it
    /// yields `Unknown` answers.
    fn set_timeout(&mut self, timeout: Option<Duration>);
}

/// A solver that knows nothing. Useful as a stand-in where queries
/// are expected to be downgraded conservatively.
pub struct DummySolver;

impl Solver for DummySolver {
    fn check_sat(&mut self, _: &ConstraintSet) -> SatResult {
        SatResult::Unknown
    }

    fn evaluate(&mut self, _: &ConstraintSet, _: &ExprRef) -> PartialValidity {
        PartialValidity::None
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

    fn set_timeout(&mut self, _: Option<Duration>) {}
}
