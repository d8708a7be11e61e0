//! moses Intermediate Representation (IR).
//!
//! This crate defines the core IR of the moses compiler:
//! - Types (int, bool, pointers, arrays, structs, function signatures)
//! - Values and the def-use graph between them
//! - Instructions, basic blocks, functions and globals
//! - Dominator tree and dominance frontier analysis
//! - Textual reader/writer and a verifier
//!
//! Everything lives in a [`Context`]; values are generational handles into
//! it.

#![no_std]

extern crate alloc;

pub mod analysis;
mod block;
mod constant;
mod context;
mod entity;
mod entity_map;
mod error;
mod function;
mod inst;
mod module;
mod packed_option;
mod parser;
mod types;
mod use_list;
mod value;
mod verifier;
mod write;

pub use analysis::{CfgNumbers, ControlFlowGraph, DomTreeNode, DominatorTree};
pub use block::BlockData;
pub use constant::{ConstantData, GlobalData};
pub use context::Context;
pub use entity::{Type, Use, Value};
pub use error::{AnalysisError, IrError};
pub use function::{FunctionData, Intrinsic};
pub use inst::{BinaryOp, CmpPredicate, InsertPoint, InstData, InstKind, Opcode};
pub use module::Module;
pub use parser::{parse_module, ParseError};
pub use types::{DisplayType, TypeData, TypeTable, WORD_SIZE};
pub use use_list::{UseData, Uses};
pub use value::{ArgumentData, ValueData, ValueKind};
pub use verifier::{
    verify_dominance, verify_function, verify_module, verify_structure, verify_types,
    verify_use_lists, VerifierError,
};
pub use write::DisplayValue;
