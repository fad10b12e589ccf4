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

//! Shortest-path information over the block CFG and the function call
//! graph, memoized per source node. The distance maps drive the
//! targeted searchers; [CodeGraph::nearest_predicate_satisfying] and
//! [CodeGraph::dismantle_function] structure isolated execution by
//! chopping functions into regions separated by predicate-satisfying
//! blocks.

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Reversed;

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::ir::{BlockId, BlockPredicate, FunctionId, Module};

type BlockDistances = Arc<HashMap<BlockId, u32, ahash::RandomState>>;
type FunctionDistances = Arc<HashMap<FunctionId, u32, ahash::RandomState>>;

struct Cfg {
    graph: DiGraph<BlockId, ()>,
    index: HashMap<BlockId, NodeIndex, ahash::RandomState>,
}

struct CallGraph {
    graph: DiGraph<FunctionId, ()>,
    index: HashMap<FunctionId, NodeIndex, ahash::RandomState>,
}

pub struct CodeGraph {
    module: Arc<Module>,
    cfgs: RefCell<HashMap<FunctionId, Arc<Cfg>, ahash::RandomState>>,
    call_graph: RefCell<Option<Arc<CallGraph>>>,
    block_distance: RefCell<HashMap<BlockId, BlockDistances, ahash::RandomState>>,
    block_backward_distance: RefCell<HashMap<BlockId, BlockDistances, ahash::RandomState>>,
    function_distance: RefCell<HashMap<FunctionId, FunctionDistances, ahash::RandomState>>,
    function_backward_distance: RefCell<HashMap<FunctionId, FunctionDistances, ahash::RandomState>>,
}

impl CodeGraph {
    pub fn new(module: Arc<Module>) -> Self {
        CodeGraph {
            module,
            cfgs: RefCell::new(HashMap::default()),
            call_graph: RefCell::new(None),
            block_distance: RefCell::new(HashMap::default()),
            block_backward_distance: RefCell::new(HashMap::default()),
            function_distance: RefCell::new(HashMap::default()),
            function_backward_distance: RefCell::new(HashMap::default()),
        }
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    fn cfg(&self, function: FunctionId) -> Arc<Cfg> {
        if let Some(cfg) = self.cfgs.borrow().get(&function) {
            return cfg.clone();
        }
        let mut graph = DiGraph::new();
        let mut index: HashMap<BlockId, NodeIndex, ahash::RandomState> = HashMap::default();
        for block in &self.module.function(function).blocks {
            index.insert(*block, graph.add_node(*block));
        }
        for block in &self.module.function(function).blocks {
            for succ in &self.module.block(*block).successors {
                graph.add_edge(index[block], index[succ], ());
            }
        }
        let cfg = Arc::new(Cfg { graph, index });
        self.cfgs.borrow_mut().insert(function, cfg.clone());
        cfg
    }

    fn call_graph(&self) -> Arc<CallGraph> {
        if let Some(cg) = self.call_graph.borrow().as_ref() {
            return cg.clone();
        }
        let mut graph = DiGraph::new();
        let mut index: HashMap<FunctionId, NodeIndex, ahash::RandomState> = HashMap::default();
        for function in self.module.functions() {
            index.insert(function.id, graph.add_node(function.id));
        }
        for function in self.module.functions() {
            for call_block in &function.call_blocks {
                for called in &self.module.block(*call_block).called {
                    if self.module.function(*called).is_declaration {
                        continue;
                    }
                    graph.add_edge(index[&function.id], index[called], ());
                }
            }
        }
        let cg = Arc::new(CallGraph { graph, index });
        *self.call_graph.borrow_mut() = Some(cg.clone());
        cg
    }

    /// Forward hop counts from a block to every block reachable from
    /// it within the same function.
    pub fn distance(&self, from: BlockId) -> BlockDistances {
        if let Some(dist) = self.block_distance.borrow().get(&from) {
            return dist.clone();
        }
        let cfg = self.cfg(self.module.block(from).function);
        let raw = dijkstra(&cfg.graph, cfg.index[&from], None, |_| 1u32);
        let dist: HashMap<BlockId, u32, ahash::RandomState> =
            raw.into_iter().map(|(ix, d)| (cfg.graph[ix], d)).collect();
        let dist = Arc::new(dist);
        self.block_distance.borrow_mut().insert(from, dist.clone());
        dist
    }

    /// Hop counts on the reversed CFG.
    pub fn backward_distance(&self, from: BlockId) -> BlockDistances {
        if let Some(dist) = self.block_backward_distance.borrow().get(&from) {
            return dist.clone();
        }
        let cfg = self.cfg(self.module.block(from).function);
        let raw = dijkstra(Reversed(&cfg.graph), cfg.index[&from], None, |_| 1u32);
        let dist: HashMap<BlockId, u32, ahash::RandomState> =
            raw.into_iter().map(|(ix, d)| (cfg.graph[ix], d)).collect();
        let dist = Arc::new(dist);
        self.block_backward_distance.borrow_mut().insert(from, dist.clone());
        dist
    }

    /// Call-graph hop counts from a function to its (transitive)
    /// callees.
    pub fn function_distance(&self, from: FunctionId) -> FunctionDistances {
        if let Some(dist) = self.function_distance.borrow().get(&from) {
            return dist.clone();
        }
        let cg = self.call_graph();
        let raw = dijkstra(&cg.graph, cg.index[&from], None, |_| 1u32);
        let dist: HashMap<FunctionId, u32, ahash::RandomState> =
            raw.into_iter().map(|(ix, d)| (cg.graph[ix], d)).collect();
        let dist = Arc::new(dist);
        self.function_distance.borrow_mut().insert(from, dist.clone());
        dist
    }

    /// Call-graph hop counts from a function to its (transitive)
    /// callers.
    pub fn function_backward_distance(&self, from: FunctionId) -> FunctionDistances {
        if let Some(dist) = self.function_backward_distance.borrow().get(&from) {
            return dist.clone();
        }
        let cg = self.call_graph();
        let raw = dijkstra(Reversed(&cg.graph), cg.index[&from], None, |_| 1u32);
        let dist: HashMap<FunctionId, u32, ahash::RandomState> =
            raw.into_iter().map(|(ix, d)| (cg.graph[ix], d)).collect();
        let dist = Arc::new(dist);
        self.function_backward_distance.borrow_mut().insert(from, dist.clone());
        dist
    }

    /// BFS from `from` (exclusive) that stops each frontier branch as
    /// soon as it enters a predicate-satisfying block; the set of
    /// first hits is returned.
    pub fn nearest_predicate_satisfying(
        &self,
        from: BlockId,
        predicate: &dyn BlockPredicate,
        forward: bool,
    ) -> BTreeSet<BlockId> {
        let module = &*self.module;
        let mut result = BTreeSet::new();
        let mut visited: BTreeSet<BlockId> = BTreeSet::new();
        let mut queued: BTreeSet<BlockId> = BTreeSet::new();
        let mut nodes = VecDeque::new();
        let mut first_iteration = true;
        nodes.push_back(from);

        while let Some(current) = nodes.pop_front() {
            if !first_iteration {
                visited.insert(current);
            }

            if predicate.test(module, module.block(current)) && !first_iteration {
                result.insert(current);
            } else {
                let block = module.block(current);
                let neighbours = if forward { &block.successors } else { &block.predecessors };
                for next in neighbours {
                    if !visited.contains(next) && !queued.contains(next) {
                        nodes.push_back(*next);
                        queued.insert(*next);
                    }
                }
            }
            first_iteration = false;
        }
        result
    }

    /// Chop a function into regions separated by predicate-satisfying
    /// blocks, returning the region edges crossed by a BFS from the
    /// entry.
    pub fn dismantle_function(
        &self,
        function: FunctionId,
        predicate: &dyn BlockPredicate,
    ) -> Vec<(BlockId, BlockId)> {
        let entry = self.module.function(function).entry;
        if self.module.block(entry).is_return() {
            return vec![(entry, entry)];
        }

        let mut dismantled = Vec::new();
        let mut queue = VecDeque::new();
        let mut used: BTreeSet<BlockId> = BTreeSet::new();

        queue.push_back(entry);
        while let Some(block) = queue.pop_front() {
            used.insert(block);
            let nearest = self.nearest_predicate_satisfying(block, predicate, true);
            for to in nearest {
                dismantled.push((block, to));
                if !used.contains(&to) {
                    queue.push_back(to);
                }
            }
        }
        dismantled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Block, BlockKind, JointBlockPredicate, ModuleBuilder};

    struct ReturnPredicate;

    impl BlockPredicate for ReturnPredicate {
        fn test(&self, _: &Module, block: &Block) -> bool {
            block.is_return()
        }
    }

    fn diamond() -> (Arc<Module>, FunctionId, Vec<BlockId>) {
        let mut b = ModuleBuilder::new();
        let f = b.add_function("f", 0, true);
        let entry = b.add_block(f, BlockKind::Base, 2);
        let left = b.add_block(f, BlockKind::Base, 2);
        let right = b.add_block(f, BlockKind::Base, 3);
        let exit = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(entry, left);
        b.add_edge(entry, right);
        b.add_edge(left, exit);
        b.add_edge(right, exit);
        (Arc::new(b.finish()), f, vec![entry, left, right, exit])
    }

    #[test]
    fn test_block_distance() {
        let (module, _, blocks) = diamond();
        let graph = CodeGraph::new(module);
        let dist = graph.distance(blocks[0]);
        assert_eq!(dist[&blocks[0]], 0);
        assert_eq!(dist[&blocks[1]], 1);
        assert_eq!(dist[&blocks[3]], 2);
        let back = graph.backward_distance(blocks[3]);
        assert_eq!(back[&blocks[0]], 2);
        assert_eq!(back[&blocks[2]], 1);
        // Nothing flows back into the entry
        let back_entry = graph.backward_distance(blocks[0]);
        assert_eq!(back_entry.len(), 1);
    }

    #[test]
    fn test_function_distance() {
        let mut b = ModuleBuilder::new();
        let h = b.add_function("h", 0, true);
        let h0 = b.add_block(h, BlockKind::Return, 1);
        let _ = h0;
        let g = b.add_function("g", 0, true);
        let g0 = b.add_call_block(g, &[h]);
        let g1 = b.add_block(g, BlockKind::Return, 1);
        b.add_edge(g0, g1);
        let f = b.add_function("f", 0, true);
        let f0 = b.add_call_block(f, &[g]);
        let f1 = b.add_block(f, BlockKind::Return, 1);
        b.add_edge(f0, f1);
        let module = Arc::new(b.finish());
        let graph = CodeGraph::new(module);
        let dist = graph.function_distance(f);
        assert_eq!(dist[&g], 1);
        assert_eq!(dist[&h], 2);
        let back = graph.function_backward_distance(h);
        assert_eq!(back[&f], 2);
    }

    #[test]
    fn test_nearest_predicate() {
        let (module, _, blocks) = diamond();
        let graph = CodeGraph::new(module);
        let nearest = graph.nearest_predicate_satisfying(blocks[0], &ReturnPredicate, true);
        assert_eq!(nearest.into_iter().collect::<Vec<_>>(), vec![blocks[3]]);
        let nearest = graph.nearest_predicate_satisfying(blocks[3], &ReturnPredicate, false);
        // Walking backwards from the only return finds nothing else
        assert!(nearest.is_empty());
    }

    #[test]
    fn test_dismantle() {
        let (module, f, blocks) = diamond();
        let graph = CodeGraph::new(module);
        let dismantled = graph.dismantle_function(f, &JointBlockPredicate);
        // The join point and the return are the region boundaries
        assert!(dismantled.contains(&(blocks[0], blocks[3])));
        for (from, _) in &dismantled {
            assert!(*from == blocks[0] || *from == blocks[3]);
        }
    }
}
