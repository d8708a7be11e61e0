//! Functions and intrinsic declarations.

use alloc::{string::ToString, vec::Vec};

use crate::{
    context::Context,
    entity::{Type, Value},
    error::IrError,
    packed_option::PackedOption,
    types::TypeData,
    value::{ArgumentData, ValueKind},
};

/// Built-in functions the execution engine implements directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Intrinsic {
    /// `void (int)`: print an integer
    PrintInt,
    /// `void (bool)`: print a boolean
    PrintBool,
    /// `void (int*, int*, int)`: copy `len` bytes from the second pointer to
    /// the first
    MemCpy,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 3] = [Intrinsic::PrintInt, Intrinsic::PrintBool, Intrinsic::MemCpy];

    /// Symbol name of the declaration
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::PrintInt => "moses.print.int",
            Intrinsic::PrintBool => "moses.print.bool",
            Intrinsic::MemCpy => "moses.memcpy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    fn signature(self, ctx: &mut Context) -> Type {
        let void = ctx.void_type();
        let int = ctx.int_type();
        match self {
            Intrinsic::PrintInt => ctx.function_type(void, &[int]),
            Intrinsic::PrintBool => {
                let boolean = ctx.bool_type();
                ctx.function_type(void, &[boolean])
            }
            Intrinsic::MemCpy => {
                let ptr = ctx.pointer_type(int);
                ctx.function_type(void, &[ptr, ptr, int])
            }
        }
    }
}

/// Payload of a function value.
#[derive(Debug, Clone, Default)]
pub struct FunctionData {
    pub(crate) blocks: Vec<Value>,
    pub(crate) args: Vec<Value>,
    pub(crate) intrinsic: Option<Intrinsic>,
}

impl FunctionData {
    pub fn blocks(&self) -> &[Value] {
        &self.blocks
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn intrinsic(&self) -> Option<Intrinsic> {
        self.intrinsic
    }
}

impl Context {
    /// Create a function with no blocks (a declaration until one is added)
    ///
    /// `arg_names` may be shorter than the parameter list; the remaining
    /// arguments are unnamed.
    pub fn create_function(
        &mut self,
        signature: Type,
        name: &str,
        arg_names: &[&str],
    ) -> Result<Value, IrError> {
        let params = match self.types.data(signature) {
            TypeData::Function { params, .. } => params.clone(),
            _ => {
                return Err(IrError::TypeMismatch {
                    context: "function signature",
                    expected: "a function type".to_string(),
                    found: self.type_name(signature),
                })
            }
        };
        if arg_names.len() > params.len() {
            return Err(IrError::IndexOutOfRange {
                what: "argument name",
                index: arg_names.len() - 1,
                len: params.len(),
            });
        }

        let func = self.new_value(signature, name, ValueKind::Function(FunctionData::default()));
        let mut args = Vec::with_capacity(params.len());
        for (index, ty) in params.into_iter().enumerate() {
            let arg_name = arg_names.get(index).copied().unwrap_or("");
            args.push(self.new_value(
                ty,
                arg_name,
                ValueKind::Argument(ArgumentData {
                    parent: PackedOption::some(func),
                    index: index as u32,
                }),
            ));
        }
        self.function_data_mut(func)?.args = args;
        Ok(func)
    }

    /// Declaration of an intrinsic, created once per context
    pub fn declare_intrinsic(&mut self, intrinsic: Intrinsic) -> Value {
        if let Some(func) = self.intrinsics.get(&intrinsic) {
            return *func;
        }
        let signature = intrinsic.signature(self);
        let params = match self.types.data(signature) {
            TypeData::Function { params, .. } => params.clone(),
            _ => Vec::new(),
        };
        let func = self.new_value(
            signature,
            intrinsic.name(),
            ValueKind::Function(FunctionData {
                intrinsic: Some(intrinsic),
                ..FunctionData::default()
            }),
        );
        let args = params
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.new_value(
                    ty,
                    "",
                    ValueKind::Argument(ArgumentData {
                        parent: PackedOption::some(func),
                        index: index as u32,
                    }),
                )
            })
            .collect();
        if let ValueKind::Function(data) = &mut self.values[func].kind {
            data.args = args;
        }
        self.intrinsics.insert(intrinsic, func);
        func
    }

    /// Intrinsic tag of a function, if any
    pub fn intrinsic(&self, func: Value) -> Option<Intrinsic> {
        self.function_data(func).ok().and_then(|data| data.intrinsic)
    }

    pub(crate) fn insert_block_at(&mut self, func: Value, index: usize, block: Value) -> Result<(), IrError> {
        if self.block_data(block)?.parent.is_some() {
            return Err(IrError::AlreadyInserted(block));
        }
        let blocks = &mut self.function_data_mut(func)?.blocks;
        let index = index.min(blocks.len());
        blocks.insert(index, block);
        self.block_data_mut(block)?.parent = PackedOption::some(func);
        Ok(())
    }

    /// Append a detached block to a function
    pub fn add_basic_block(&mut self, func: Value, block: Value) -> Result<(), IrError> {
        let len = self.function_data(func)?.blocks.len();
        self.insert_block_at(func, len, block)
    }

    /// Argument `index` of a function
    pub fn argument(&self, func: Value, index: usize) -> Result<Value, IrError> {
        let args = &self.function_data(func)?.args;
        args.get(index).copied().ok_or(IrError::IndexOutOfRange {
            what: "argument",
            index,
            len: args.len(),
        })
    }

    pub fn arguments(&self, func: Value) -> Result<&[Value], IrError> {
        Ok(&self.function_data(func)?.args)
    }

    pub fn blocks(&self, func: Value) -> Result<&[Value], IrError> {
        Ok(&self.function_data(func)?.blocks)
    }

    /// First block, `None` for a declaration
    pub fn entry_block(&self, func: Value) -> Result<Option<Value>, IrError> {
        Ok(self.function_data(func)?.blocks.first().copied())
    }

    pub fn return_type(&self, func: Value) -> Result<Type, IrError> {
        let ty = self.try_value(func)?.ty;
        match self.types.data(ty) {
            TypeData::Function { ret, .. } => Ok(*ret),
            _ => Err(IrError::WrongKind {
                value: func,
                expected: "a function",
            }),
        }
    }

    pub fn param_types(&self, func: Value) -> Result<&[Type], IrError> {
        let ty = self.try_value(func)?.ty;
        match self.types.data(ty) {
            TypeData::Function { params, .. } => Ok(params),
            _ => Err(IrError::WrongKind {
                value: func,
                expected: "a function",
            }),
        }
    }

    /// A function without blocks
    pub fn is_declaration(&self, func: Value) -> Result<bool, IrError> {
        Ok(self.function_data(func)?.blocks.is_empty())
    }
}
