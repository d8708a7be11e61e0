//! Analyses over the control flow graph.

pub mod cfg;
pub mod dominance;

pub use cfg::{CfgNumbers, ControlFlowGraph};
pub use dominance::{DomTreeNode, DominatorTree};
