//! Control Flow Graph snapshot with depth-first numbering.

use alloc::{collections::BTreeMap, vec, vec::Vec};

use crate::{context::Context, entity::Value, error::AnalysisError};

/// Per-block numbering from the depth-first traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgNumbers {
    /// Clock value when the block was first reached
    pub dfs_in: u32,
    /// Clock value when all of its successors were finished
    pub dfs_out: u32,
    /// Position in the post-order
    pub post_order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Control Flow Graph of the blocks reachable from one entry block.
///
/// Edges come from terminator operands. Blocks the entry cannot reach are
/// not part of the graph, and predecessor lists only mention reachable
/// blocks. The snapshot does not follow later edits to the IR.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    entry: Value,
    /// Reachable blocks in discovery order; index 0 is the entry
    blocks: Vec<Value>,
    index: BTreeMap<Value, usize>,
    numbers: Vec<CfgNumbers>,
    successors: Vec<Vec<Value>>,
    predecessors: Vec<Vec<Value>>,
    post_order: Vec<Value>,
}

impl ControlFlowGraph {
    /// Build the CFG of a function, rooted at its first block
    pub fn from_function(ctx: &Context, func: Value) -> Result<Self, AnalysisError> {
        let entry = ctx
            .entry_block(func)?
            .ok_or(AnalysisError::NoEntryBlock(func))?;
        Self::from_entry(ctx, entry)
    }

    /// Build the CFG of everything reachable from `entry`
    pub fn from_entry(ctx: &Context, entry: Value) -> Result<Self, AnalysisError> {
        let mut blocks = vec![entry];
        let mut index = BTreeMap::new();
        index.insert(entry, 0usize);
        let mut colors = vec![Color::White];
        let mut successors: Vec<Vec<Value>> = vec![dedup(ctx.successors(entry)?)];
        let mut numbers = vec![CfgNumbers {
            dfs_in: 0,
            dfs_out: 0,
            post_order: 0,
        }];
        let mut post_order = Vec::new();
        let mut clock = 0u32;

        // (node, next successor to look at)
        let mut stack = vec![(0usize, 0usize)];
        colors[0] = Color::Gray;
        numbers[0].dfs_in = clock;
        clock += 1;

        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            if let Some(&succ) = successors[node].get(*next) {
                *next += 1;
                let succ_index = match index.get(&succ) {
                    Some(i) => *i,
                    None => {
                        let i = blocks.len();
                        blocks.push(succ);
                        index.insert(succ, i);
                        colors.push(Color::White);
                        successors.push(dedup(ctx.successors(succ)?));
                        numbers.push(CfgNumbers {
                            dfs_in: 0,
                            dfs_out: 0,
                            post_order: 0,
                        });
                        i
                    }
                };
                if colors[succ_index] == Color::White {
                    colors[succ_index] = Color::Gray;
                    numbers[succ_index].dfs_in = clock;
                    clock += 1;
                    stack.push((succ_index, 0));
                }
                continue;
            }
            colors[node] = Color::Black;
            numbers[node].dfs_out = clock;
            clock += 1;
            numbers[node].post_order = post_order.len() as u32;
            post_order.push(blocks[node]);
            stack.pop();
        }

        let mut predecessors = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let preds = ctx
                .predecessors(*block)?
                .into_iter()
                .filter(|pred| index.contains_key(pred))
                .collect();
            predecessors.push(preds);
        }

        Ok(Self {
            entry,
            blocks,
            index,
            numbers,
            successors,
            predecessors,
            post_order,
        })
    }

    /// Entry block
    pub fn entry(&self) -> Value {
        self.entry
    }

    /// Number of reachable blocks
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Reachable blocks in discovery order
    pub fn blocks(&self) -> &[Value] {
        &self.blocks
    }

    /// Check if `block` is reachable from the entry
    pub fn is_reachable(&self, block: Value) -> bool {
        self.index.contains_key(&block)
    }

    pub(crate) fn index_of(&self, block: Value) -> Option<usize> {
        self.index.get(&block).copied()
    }

    /// Depth-first numbers of a reachable block
    pub fn numbers(&self, block: Value) -> Option<CfgNumbers> {
        self.index_of(block).map(|i| self.numbers[i])
    }

    /// Successors of a reachable block, without duplicates
    pub fn successors(&self, block: Value) -> &[Value] {
        self.index_of(block)
            .map_or(&[][..], |i| self.successors[i].as_slice())
    }

    /// Reachable predecessors of a reachable block
    pub fn predecessors(&self, block: Value) -> &[Value] {
        self.index_of(block)
            .map_or(&[][..], |i| self.predecessors[i].as_slice())
    }

    /// Blocks in post-order; the entry comes last
    pub fn post_order(&self) -> &[Value] {
        &self.post_order
    }

    /// Blocks in reverse post-order; the entry comes first
    pub fn reverse_post_order(&self) -> Vec<Value> {
        self.post_order.iter().rev().copied().collect()
    }
}

fn dedup(mut blocks: Vec<Value>) -> Vec<Value> {
    let mut seen = Vec::with_capacity(blocks.len());
    blocks.retain(|block| {
        if seen.contains(block) {
            false
        } else {
            seen.push(*block);
            true
        }
    });
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::InsertPoint;

    /// entry -> {a, b} -> join, plus an unreachable block
    fn diamond(ctx: &mut Context) -> (Value, [Value; 5]) {
        let void = ctx.void_type();
        let sig = ctx.function_type(void, &[]);
        let f = ctx.create_function(sig, "f", &[]).unwrap();
        let entry = ctx.create_block("entry", Some(f), None).unwrap();
        let a = ctx.create_block("a", Some(f), None).unwrap();
        let b = ctx.create_block("b", Some(f), None).unwrap();
        let join = ctx.create_block("join", Some(f), None).unwrap();
        let dead = ctx.create_block("dead", Some(f), None).unwrap();
        let t = ctx.const_true();
        ctx.create_cond_br(t, a, b, InsertPoint::AtEnd(entry)).unwrap();
        ctx.create_br(join, InsertPoint::AtEnd(a)).unwrap();
        ctx.create_br(join, InsertPoint::AtEnd(b)).unwrap();
        ctx.create_ret(None, InsertPoint::AtEnd(join)).unwrap();
        ctx.create_br(join, InsertPoint::AtEnd(dead)).unwrap();
        (f, [entry, a, b, join, dead])
    }

    #[test]
    fn test_diamond_numbering() {
        let mut ctx = Context::new();
        let (f, [entry, a, b, join, dead]) = diamond(&mut ctx);
        let cfg = ControlFlowGraph::from_function(&ctx, f).unwrap();

        assert_eq!(cfg.entry(), entry);
        assert_eq!(cfg.num_blocks(), 4);
        assert!(!cfg.is_reachable(dead));
        assert_eq!(cfg.post_order(), &[join, a, b, entry]);
        assert_eq!(cfg.reverse_post_order(), alloc::vec![entry, b, a, join]);

        let e = cfg.numbers(entry).unwrap();
        let j = cfg.numbers(join).unwrap();
        assert!(e.dfs_in < j.dfs_in && j.dfs_out < e.dfs_out);
        assert_eq!(e.post_order, 3);
    }

    #[test]
    fn test_predecessors_skip_unreachable() {
        let mut ctx = Context::new();
        let (f, [_, a, b, join, dead]) = diamond(&mut ctx);
        assert_eq!(ctx.predecessors(join).unwrap().len(), 3);
        let cfg = ControlFlowGraph::from_function(&ctx, f).unwrap();
        let preds = cfg.predecessors(join);
        assert_eq!(preds.len(), 2);
        assert!(preds.contains(&a) && preds.contains(&b));
        assert!(cfg.predecessors(dead).is_empty());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut ctx = Context::new();
        let entry = ctx.create_block("entry", None, None).unwrap();
        let next = ctx.create_block("next", None, None).unwrap();
        let t = ctx.const_true();
        ctx.create_cond_br(t, next, next, InsertPoint::AtEnd(entry)).unwrap();
        ctx.create_ret(None, InsertPoint::AtEnd(next)).unwrap();

        let cfg = ControlFlowGraph::from_entry(&ctx, entry).unwrap();
        assert_eq!(cfg.successors(entry), &[next]);
        assert_eq!(cfg.predecessors(next), &[entry]);
    }

    #[test]
    fn test_empty_function_has_no_entry() {
        let mut ctx = Context::new();
        let void = ctx.void_type();
        let sig = ctx.function_type(void, &[]);
        let f = ctx.create_function(sig, "decl", &[]).unwrap();
        assert_eq!(
            ControlFlowGraph::from_function(&ctx, f).unwrap_err(),
            AnalysisError::NoEntryBlock(f)
        );
    }
}
