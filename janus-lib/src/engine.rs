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

//! An exploration session: the hub, the scheduler, the target
//! manager and the lemma store wired together, driven by the plain
//! loop `while !halt { select an action, let the executor apply it,
//! flush the hub }`. The executor is a collaborator: it owns the
//! instruction semantics and the solver; the engine owns everything
//! else.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backward::{BackwardSearcher, InterleavedBackwardSearcher, RandomPathBackwardSearcher, RecencyRankedSearcher};
use crate::config::EngineConfig;
use crate::constraints::Assignment;
use crate::distance::DistanceCalculator;
use crate::error::ExecError;
use crate::expr::Context;
use crate::graph::CodeGraph;
use crate::hub::{ObjectManager, Subscriber};
use crate::initializer::ConflictCoreInitializer;
use crate::ir::{BlockPredicate, FunctionId, Module};
use crate::lemma::Summary;
use crate::pob::ProofObligation;
use crate::scheduler::{Action, BidirectionalSearcher};
use crate::searcher::construct_searcher;
use crate::state::{ExecutionState, HaltReason};
use crate::target::Target;
use crate::targeting::{GuidanceKind, TargetCalculator, TargetManager};

/// The external IR executor. It applies a single action to
/// completion, performing its state mutations through the hub's
/// pending interfaces.
pub trait Interpreter {
    fn execute(&mut self, om: &mut ObjectManager, action: Action) -> Result<(), ExecError>;
}

pub struct Engine {
    config: EngineConfig,
    ctx: Arc<Context>,
    module: Arc<Module>,
    pub om: ObjectManager,
    scheduler: BidirectionalSearcher,
    target_manager: TargetManager,
    pub summary: Summary,
    guidance: GuidanceKind,
    halt: HaltReason,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        ctx: Arc<Context>,
        module: Arc<Module>,
        guidance: GuidanceKind,
        predicate: Arc<dyn BlockPredicate>,
    ) -> Self {
        let graph = Arc::new(CodeGraph::new(module.clone()));

        let mut om = ObjectManager::new(ctx.clone(), module.clone());
        om.set_predicate(predicate.clone());

        let target_manager = TargetManager::new(
            guidance,
            DistanceCalculator::new(graph.clone()),
            TargetCalculator::new(config.target_calculator_kind, graph.clone()),
            config.max_cycles_before_stuck,
        );

        let forward = construct_searcher(&config, guidance, DistanceCalculator::new(graph.clone()), 0);
        let branch = construct_searcher(&config, guidance, DistanceCalculator::new(graph.clone()), 1);

        let propagation_limit =
            if config.max_propagations == 0 { u64::MAX } else { config.max_propagations - 1 };
        let backward: Box<dyn BackwardSearcher> = Box::new(InterleavedBackwardSearcher::new(vec![
            Box::new(RecencyRankedSearcher::new(propagation_limit)),
            Box::new(RandomPathBackwardSearcher::new(config.rng_seed.wrapping_add(23))),
        ]));

        let initializer = ConflictCoreInitializer::new(
            ctx.clone(),
            graph,
            predicate,
            guidance == GuidanceKind::ErrorGuidance,
        );

        let scheduler =
            BidirectionalSearcher::new(config.ticks.clone(), forward, branch, backward, initializer);

        let summary_file = if config.ksummary_file.is_empty() {
            PathBuf::from("summary.ksummary")
        } else {
            PathBuf::from(&config.ksummary_file)
        };

        Engine {
            config,
            ctx,
            module,
            om,
            scheduler,
            target_manager,
            summary: Summary::new(summary_file),
            guidance,
            halt: HaltReason::NotHalt,
        }
    }

    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn guidance(&self) -> GuidanceKind {
        self.guidance
    }

    /// Install the entry state and allow backward initialization to
    /// restart from the entry functions.
    pub fn start(&mut self, entry_functions: BTreeSet<FunctionId>, entry: FunctionId) {
        let template = ExecutionState::initial(&self.ctx, &self.module, entry);
        self.om.set_empty_state(template.copy());
        self.om.add_initial_state(template);
        self.scheduler.initializer_mut().initialize_functions(entry_functions);
        let Engine { om, scheduler, target_manager, .. } = self;
        om.initial_update(
            &mut [target_manager as &mut dyn Subscriber],
            &mut [scheduler as &mut dyn Subscriber],
        )
    }

    /// Plant a root proof obligation at a target and seed the
    /// initializer towards it.
    pub fn add_root_pob(&mut self, target: Target) {
        let pob = ProofObligation::new_root(&self.ctx, target.clone());
        let id = self.om.insert_pob(pob);
        self.om.add_pob(id);
        if target.should_fail_on_this_target() {
            let module = self.module.clone();
            self.scheduler.initializer_mut().add_error_init(&module, &target)
        }
        self.flush_events()
    }

    pub fn request_halt(&mut self, reason: HaltReason) {
        self.halt = reason;
        let states: Vec<_> = self.om.states.iter().chain(self.om.isolated_states.iter()).copied().collect();
        for state in states {
            self.om.state_mut(state).termination_reason = reason
        }
    }

    pub fn halted(&self) -> HaltReason {
        self.halt
    }

    fn flush_events(&mut self) {
        let Engine { om, scheduler, target_manager, .. } = self;
        om.update_subscribers(
            &mut [target_manager as &mut dyn Subscriber],
            &mut [scheduler as &mut dyn Subscriber],
        )
    }

    /// One scheduling cycle: pick an action, let the executor apply
    /// it, fan the buffered updates out. Returns false once there is
    /// nothing left to do or a halt was requested.
    pub fn step(&mut self, executor: &mut dyn Interpreter) -> Result<bool, ExecError> {
        if self.halt != HaltReason::NotHalt {
            return Ok(false);
        }
        if self.scheduler.is_empty(&self.om) {
            return Ok(false);
        }
        let action = self.scheduler.select_action(&self.om);
        executor.execute(&mut self.om, action)?;
        self.flush_events();
        Ok(true)
    }

    /// Drive the session to quiescence or halt, then drain pending
    /// events and flush the lemma store.
    pub fn run(&mut self, executor: &mut dyn Interpreter) -> Result<HaltReason, ExecError> {
        while self.step(executor)? {}
        self.flush_events();
        self.summary.flush(&self.module)?;
        Ok(self.halt)
    }

    /// The test-case assignment of a state: for every symbolic
    /// object, the solver's bytes when a model is available, otherwise
    /// a zero-filled vector of the object's concretized size.
    pub fn test_case(&self, state: &ExecutionState, model: Option<&Assignment>) -> Assignment {
        let mut assignment = Assignment::new();
        for (_, array) in &state.symbolics {
            if let Some(bytes) = model.and_then(|m| m.get(array)) {
                assignment.bind(array.clone(), bytes.clone());
                continue;
            }
            let size = match state.constraints.constraint_set().concretization().get(array) {
                Some(bytes) => bytes.len(),
                None => array.size().as_constant().unwrap_or(0) as usize,
            };
            assignment.bind(array.clone(), Assignment::zero_filled(size));
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockKind, JointBlockPredicate, ModuleBuilder};
    use crate::state::StateId;

    struct RetiringExecutor {
        executed: Vec<StateId>,
    }

    impl Interpreter for RetiringExecutor {
        fn execute(&mut self, om: &mut ObjectManager, action: Action) -> Result<(), ExecError> {
            match action {
                Action::Forward(state) => {
                    om.set_current_state(state);
                    self.executed.push(state);
                    om.remove_state(state);
                    Ok(())
                }
                other => panic!("unexpected action {:?}", other),
            }
        }
    }

    #[test]
    fn test_run_to_quiescence() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let module = Arc::new(b.finish());
        let ctx = Arc::new(Context::new());

        let mut config = EngineConfig::default();
        config.ticks = vec![10, 10, 10, 10];
        config.ksummary_file = std::env::temp_dir()
            .join(format!("janus-engine-{}.ksummary", std::process::id()))
            .to_string_lossy()
            .into_owned();

        let mut engine = Engine::new(
            config,
            ctx,
            module,
            GuidanceKind::NoGuidance,
            Arc::new(JointBlockPredicate),
        );
        let mut entries = BTreeSet::new();
        entries.insert(f);
        engine.start(entries, f);

        let mut executor = RetiringExecutor { executed: Vec::new() };
        let reason = engine.run(&mut executor).unwrap();
        assert_eq!(reason, HaltReason::NotHalt);
        assert_eq!(executor.executed.len(), 1);
        assert!(engine.om.states.is_empty());
        let _ = std::fs::remove_file(&engine.config().ksummary_file);
    }

    #[test]
    fn test_request_halt_stops_run() {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("main", 0, true);
        let b0 = b.add_block(f, BlockKind::Base, 2);
        let b1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(b0, b1);
        let module = Arc::new(b.finish());
        let ctx = Arc::new(Context::new());

        let mut config = EngineConfig::default();
        config.ticks = vec![10, 10, 10, 10];
        config.ksummary_file = std::env::temp_dir()
            .join(format!("janus-halt-{}.ksummary", std::process::id()))
            .to_string_lossy()
            .into_owned();

        let mut engine = Engine::new(
            config,
            ctx,
            module,
            GuidanceKind::NoGuidance,
            Arc::new(JointBlockPredicate),
        );
        let mut entries = BTreeSet::new();
        entries.insert(f);
        engine.start(entries, f);

        engine.request_halt(HaltReason::MaxSteppedInstructions);
        let mut executor = RetiringExecutor { executed: Vec::new() };
        let reason = engine.run(&mut executor).unwrap();
        assert_eq!(reason, HaltReason::MaxSteppedInstructions);
        assert!(executor.executed.is_empty());
        let _ = std::fs::remove_file(&engine.config().ksummary_file);
    }
}
