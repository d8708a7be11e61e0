//! Dominance analysis using Cooper's "Simple, Fast Dominator Algorithm".
//!
//! The immediate dominators are found by iterating over the blocks in
//! reverse post-order until a full pass changes nothing. Dominance queries
//! are then answered by interval containment on DFS numbers of the
//! dominator tree, and dominance frontiers are computed on demand.

use alloc::{vec, vec::Vec};

use tracing::{debug, warn};

use super::cfg::ControlFlowGraph;
use crate::{context::Context, entity::Value, error::AnalysisError};

/// One reachable block in a [`DominatorTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomTreeNode {
    block: Value,
    /// Index of the immediate dominator; the root points to itself
    idom: Option<usize>,
    children: Vec<usize>,
    dfs_in: u32,
    dfs_out: u32,
    post_order: u32,
}

impl DomTreeNode {
    /// Block this node stands for
    pub fn block(&self) -> Value {
        self.block
    }

    /// Number of blocks this one immediately dominates
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Entry number of the walk over the dominator tree
    pub fn dfs_in(&self) -> u32 {
        self.dfs_in
    }

    /// Exit number of the walk over the dominator tree
    pub fn dfs_out(&self) -> u32 {
        self.dfs_out
    }

    /// Post-order number in the CFG
    pub fn post_order(&self) -> u32 {
        self.post_order
    }
}

/// Dominator tree and dominance frontiers for one function or region.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    cfg: ControlFlowGraph,
    nodes: Vec<DomTreeNode>,
    /// Node indices in reverse post-order
    rpo: Vec<usize>,
    max_iterations: usize,
    frontier: Vec<Vec<Value>>,
}

impl DominatorTree {
    /// Tree with only the root placed; call [`DominatorTree::calculate`]
    /// before querying it
    pub fn new(cfg: ControlFlowGraph) -> Self {
        let mut nodes: Vec<DomTreeNode> = cfg
            .blocks()
            .iter()
            .map(|block| DomTreeNode {
                block: *block,
                idom: None,
                children: Vec::new(),
                dfs_in: 0,
                dfs_out: 0,
                post_order: cfg.numbers(*block).map_or(0, |n| n.post_order),
            })
            .collect();
        nodes[0].idom = Some(0);
        let rpo = cfg
            .reverse_post_order()
            .into_iter()
            .filter_map(|block| cfg.index_of(block))
            .collect();
        let max_iterations = 2 * nodes.len() + 8;
        let frontier = vec![Vec::new(); nodes.len()];
        Self {
            cfg,
            nodes,
            rpo,
            max_iterations,
            frontier,
        }
    }

    /// Cap on the number of fixed-point passes
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Build and calculate the tree for a CFG
    pub fn from_cfg(cfg: ControlFlowGraph) -> Result<Self, AnalysisError> {
        let mut tree = Self::new(cfg);
        tree.calculate()?;
        Ok(tree)
    }

    /// Dominator tree of a function, rooted at its first block
    pub fn run_on_function(ctx: &Context, func: Value) -> Result<Self, AnalysisError> {
        Self::from_cfg(ControlFlowGraph::from_function(ctx, func)?)
    }

    /// Dominator tree of the blocks reachable from `entry`
    pub fn run_on_region(ctx: &Context, entry: Value) -> Result<Self, AnalysisError> {
        Self::from_cfg(ControlFlowGraph::from_entry(ctx, entry)?)
    }

    /// Dominator tree of a function with its dominance frontiers computed
    pub fn compute_dominance_frontier_on_function(
        ctx: &Context,
        func: Value,
    ) -> Result<Self, AnalysisError> {
        let mut tree = Self::run_on_function(ctx, func)?;
        tree.compute_dominance_frontier();
        Ok(tree)
    }

    /// Iterate to the fixed point; returns whether any immediate dominator
    /// changed
    pub fn calculate(&mut self) -> Result<bool, AnalysisError> {
        let mut any_change = false;
        let mut passes = 0;
        loop {
            passes += 1;
            if !self.pass()? {
                break;
            }
            any_change = true;
            if passes >= self.max_iterations {
                warn!(passes, nodes = self.nodes.len(), "dominator tree did not converge");
                return Err(AnalysisError::NotConverged { iterations: passes });
            }
        }
        debug!(passes, nodes = self.nodes.len(), "dominator tree converged");
        self.build_tree();
        if any_change {
            for frontier in &mut self.frontier {
                frontier.clear();
            }
        }
        Ok(any_change)
    }

    /// One sweep in reverse post-order
    fn pass(&mut self) -> Result<bool, AnalysisError> {
        let mut changed = false;
        for i in 0..self.rpo.len() {
            let node = self.rpo[i];
            if node == 0 {
                continue;
            }
            let preds: Vec<usize> = self
                .cfg
                .predecessors(self.nodes[node].block)
                .iter()
                .filter_map(|pred| self.cfg.index_of(*pred))
                .collect();
            let mut new_idom = None;
            for pred in preds {
                if self.nodes[pred].idom.is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => self.intersect(pred, current)?,
                });
            }
            if let Some(new_idom) = new_idom {
                if self.nodes[node].idom != Some(new_idom) {
                    self.nodes[node].idom = Some(new_idom);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    /// Nearest common dominator of two nodes with known dominators
    fn intersect(&self, a: usize, b: usize) -> Result<usize, AnalysisError> {
        let mut finger1 = a;
        let mut finger2 = b;
        while finger1 != finger2 {
            while self.nodes[finger1].post_order < self.nodes[finger2].post_order {
                finger1 = self.step_up(finger1)?;
            }
            while self.nodes[finger2].post_order < self.nodes[finger1].post_order {
                finger2 = self.step_up(finger2)?;
            }
        }
        Ok(finger1)
    }

    fn step_up(&self, node: usize) -> Result<usize, AnalysisError> {
        match self.nodes[node].idom {
            Some(idom) if idom != node => Ok(idom),
            _ => Err(AnalysisError::WalkedPastRoot(self.nodes[node].block)),
        }
    }

    /// Fill in children lists and tree DFS numbers from the idom links
    fn build_tree(&mut self) {
        for node in &mut self.nodes {
            node.children.clear();
        }
        for i in 0..self.rpo.len() {
            let node = self.rpo[i];
            if node == 0 {
                continue;
            }
            if let Some(idom) = self.nodes[node].idom {
                self.nodes[idom].children.push(node);
            }
        }

        let mut clock = 0u32;
        let mut stack = vec![(0usize, 0usize)];
        self.nodes[0].dfs_in = clock;
        clock += 1;
        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            if let Some(&child) = self.nodes[node].children.get(*next) {
                *next += 1;
                self.nodes[child].dfs_in = clock;
                clock += 1;
                stack.push((child, 0));
                continue;
            }
            self.nodes[node].dfs_out = clock;
            clock += 1;
            stack.pop();
        }
    }

    /// Compute the dominance frontier of every block
    pub fn compute_dominance_frontier(&mut self) {
        let mut frontier = vec![Vec::new(); self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate() {
            let preds = self.cfg.predecessors(node.block);
            // The root is also entered from outside, so a single back edge
            // already makes it a join point
            let is_root = index == 0;
            if preds.len() + usize::from(is_root) < 2 {
                continue;
            }
            for pred in preds {
                let Some(mut runner) = self.cfg.index_of(*pred) else {
                    continue;
                };
                // Walks toward the root stop below the idom; walks for the
                // root itself include it
                while is_root || Some(runner) != node.idom {
                    let set: &mut Vec<Value> = &mut frontier[runner];
                    if !set.contains(&node.block) {
                        set.push(node.block);
                    }
                    match self.nodes[runner].idom {
                        Some(idom) if idom != runner => runner = idom,
                        _ => break,
                    }
                }
            }
        }
        debug!(nodes = self.nodes.len(), "dominance frontier computed");
        self.frontier = frontier;
    }

    fn node_index(&self, block: Value) -> Result<usize, AnalysisError> {
        self.cfg
            .index_of(block)
            .ok_or(AnalysisError::UnreachableBlock(block))
    }

    /// Root of the tree
    pub fn root(&self) -> Value {
        self.cfg.entry()
    }

    /// The CFG snapshot the tree was computed from
    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    /// Tree node of a reachable block
    pub fn node(&self, block: Value) -> Result<&DomTreeNode, AnalysisError> {
        Ok(&self.nodes[self.node_index(block)?])
    }

    /// Check if `block` is reachable from the root
    pub fn is_reachable_from_entry(&self, block: Value) -> bool {
        self.cfg.is_reachable(block)
    }

    /// Check if every path from the root to `b` goes through `a`
    ///
    /// A block dominates itself.
    pub fn dominates(&self, a: Value, b: Value) -> Result<bool, AnalysisError> {
        let a = &self.nodes[self.node_index(a)?];
        let b = &self.nodes[self.node_index(b)?];
        Ok(a.dfs_in <= b.dfs_in && b.dfs_out <= a.dfs_out)
    }

    /// Check if `a` dominates `b` and they are different blocks
    pub fn properly_dominates(&self, a: Value, b: Value) -> Result<bool, AnalysisError> {
        Ok(a != b && self.dominates(a, b)?)
    }

    /// Immediate dominator; `None` for the root
    pub fn immediate_dominator(&self, block: Value) -> Result<Option<Value>, AnalysisError> {
        let index = self.node_index(block)?;
        Ok(match self.nodes[index].idom {
            Some(idom) if idom != index => Some(self.nodes[idom].block),
            _ => None,
        })
    }

    /// Blocks immediately dominated by `block`
    pub fn children(&self, block: Value) -> Result<Vec<Value>, AnalysisError> {
        let index = self.node_index(block)?;
        Ok(self.nodes[index]
            .children
            .iter()
            .map(|child| self.nodes[*child].block)
            .collect())
    }

    /// Dominance frontier of `block`
    ///
    /// Empty until [`DominatorTree::compute_dominance_frontier`] has run.
    pub fn dominance_frontier(&self, block: Value) -> Result<&[Value], AnalysisError> {
        Ok(&self.frontier[self.node_index(block)?])
    }

    /// Reachable blocks in reverse post-order
    pub fn reverse_post_order(&self) -> Vec<Value> {
        self.rpo.iter().map(|i| self.nodes[*i].block).collect()
    }
}
