//! Syntax tree produced by the text parsers, before name resolution.
//!
//! Positions are recorded as the length of the input remaining when the node
//! started; [`super::lower`] turns them into byte offsets.

use alloc::{boxed::Box, string::String, vec::Vec};

use crate::inst::{BinaryOp, CmpPredicate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeExpr {
    Void,
    Int,
    Bool,
    Label,
    /// `%Name`
    Named(String),
    Pointer(Box<TypeExpr>),
    Array(u64, Box<TypeExpr>),
    Struct(Vec<TypeExpr>),
    Function(Box<TypeExpr>, Vec<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    /// `%name`
    Local(String),
    /// `@name`
    Global(String),
    Int(i64),
    Bool(bool),
    Null,
    Undef,
    /// `[ T a, T b ]` or `{ T a, U b }`
    Aggregate(Vec<Typed>),
}

/// `type operand`
pub(crate) type Typed = (TypeExpr, Operand);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InstOp {
    Binary(BinaryOp, TypeExpr, Operand, Operand),
    Cmp(CmpPredicate, TypeExpr, Operand, Operand),
    Alloca(TypeExpr),
    /// Result type, typed pointer
    Load(TypeExpr, Typed),
    /// Typed value, typed pointer
    Store(Typed, Typed),
    /// Source type, typed base pointer followed by typed indices
    Gep(TypeExpr, Vec<Typed>),
    /// Type, `[ value, %block ]` pairs
    Phi(TypeExpr, Vec<(Operand, String)>),
    /// Return type, callee, typed arguments
    Call(TypeExpr, Operand, Vec<Typed>),
    Br(String),
    CondBr(Typed, String, String),
    Ret(Option<Typed>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstAst {
    pub result: Option<String>,
    pub op: InstOp,
    pub rest: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockAst {
    pub label: Option<String>,
    pub insts: Vec<InstAst>,
    pub rest: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FunctionAst {
    pub name: String,
    pub ret: TypeExpr,
    pub params: Vec<(TypeExpr, Option<String>)>,
    /// `None` for a declaration
    pub body: Option<Vec<BlockAst>>,
    pub rest: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ItemAst {
    /// `%Name = type { ... }`; `None` body for `opaque`
    TypeDef {
        name: String,
        body: Option<Vec<TypeExpr>>,
        rest: usize,
    },
    /// `@name = global T init`; `None` init for `zeroinitializer`
    Global {
        name: String,
        ty: TypeExpr,
        init: Option<Operand>,
        rest: usize,
    },
    Function(FunctionAst),
    /// Free-standing top-level block
    Block(BlockAst),
}
