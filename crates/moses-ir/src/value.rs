//! Values: the nodes of the IR graph.
//!
//! Everything that can be referenced (instruction results, constants, block
//! labels, functions, arguments, global variables) is a [`Value`] handle into
//! the context's value arena. A value that holds references to other values is
//! a *user*; its references are its operand list of [`Use`]s.

use alloc::{string::String, vec::Vec};

use crate::{
    block::BlockData,
    constant::{ConstantData, GlobalData},
    context::Context,
    entity::{Type, Use, Value},
    error::IrError,
    function::FunctionData,
    inst::{InstData, InstKind, Opcode},
    packed_option::PackedOption,
};

/// Payload of a function argument.
#[derive(Debug, Clone)]
pub struct ArgumentData {
    pub(crate) parent: PackedOption<Value>,
    pub(crate) index: u32,
}

impl ArgumentData {
    /// The function owning this argument
    pub fn parent(&self) -> Option<Value> {
        self.parent.expand()
    }

    /// Position in the function's argument list
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// What a value is.
#[derive(Debug, Clone)]
pub enum ValueKind {
    /// Formal parameter of a function
    Argument(ArgumentData),
    /// Basic block label
    BasicBlock(BlockData),
    /// Function definition or declaration
    Function(FunctionData),
    /// Module-scope storage
    GlobalVariable(GlobalData),
    /// Instruction result
    Instruction(InstData),
    /// Compile-time constant
    Constant(ConstantData),
}

impl ValueKind {
    /// Short name of the kind, for error messages
    pub fn describe(&self) -> &'static str {
        match self {
            ValueKind::Argument(_) => "an argument",
            ValueKind::BasicBlock(_) => "a basic block",
            ValueKind::Function(_) => "a function",
            ValueKind::GlobalVariable(_) => "a global variable",
            ValueKind::Instruction(_) => "an instruction",
            ValueKind::Constant(_) => "a constant",
        }
    }
}

/// Storage for one value.
#[derive(Debug, Clone)]
pub struct ValueData {
    pub(crate) ty: Type,
    pub(crate) name: Option<String>,
    /// Head of the intrusive use list
    pub(crate) first_use: PackedOption<Use>,
    pub(crate) operands: Vec<Use>,
    pub(crate) kind: ValueKind,
}

impl ValueData {
    pub(crate) fn new(ty: Type, name: Option<String>, kind: ValueKind) -> Self {
        Self {
            ty,
            name,
            first_use: PackedOption::none(),
            operands: Vec::new(),
            kind,
        }
    }

    /// Type of the value
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Display name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Operand list (empty unless this value is a user)
    pub fn operands(&self) -> &[Use] {
        &self.operands
    }

    /// What the value is
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

impl Context {
    /// Whether `value` refers to a live value
    pub fn contains_value(&self, value: Value) -> bool {
        self.values.contains(value)
    }

    /// Get the storage of a value, or `None` for a stale handle
    pub fn value_data(&self, value: Value) -> Option<&ValueData> {
        self.values.get(value)
    }

    /// Get the storage of a live value
    pub fn try_value(&self, value: Value) -> Result<&ValueData, IrError> {
        self.values.get(value).ok_or(IrError::StaleValue(value))
    }

    pub(crate) fn try_value_mut(&mut self, value: Value) -> Result<&mut ValueData, IrError> {
        self.values.get_mut(value).ok_or(IrError::StaleValue(value))
    }

    /// Type of a value
    ///
    /// # Panics
    ///
    /// Panics if `value` is stale.
    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty
    }

    /// Display name of a value
    ///
    /// # Panics
    ///
    /// Panics if `value` is stale.
    pub fn name(&self, value: Value) -> Option<&str> {
        self.values[value].name.as_deref()
    }

    /// Set or clear the display name of a value
    pub fn set_name(&mut self, value: Value, name: &str) -> Result<(), IrError> {
        let data = self.try_value_mut(value)?;
        data.name = if name.is_empty() {
            None
        } else {
            Some(String::from(name))
        };
        Ok(())
    }

    /// What a value is
    ///
    /// # Panics
    ///
    /// Panics if `value` is stale.
    pub fn kind(&self, value: Value) -> &ValueKind {
        &self.values[value].kind
    }

    /// Check if the value is an instruction
    pub fn is_instruction(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::Instruction(_))
        )
    }

    /// Check if the value is a basic block
    pub fn is_block(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::BasicBlock(_))
        )
    }

    /// Check if the value is a function
    pub fn is_function(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::Function(_))
        )
    }

    /// Check if the value is a constant
    pub fn is_constant(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::Constant(_))
        )
    }

    /// Check if the value is a function argument
    pub fn is_argument(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::Argument(_))
        )
    }

    /// Check if the value is a global variable
    pub fn is_global(&self, value: Value) -> bool {
        matches!(
            self.value_data(value).map(|d| &d.kind),
            Some(ValueKind::GlobalVariable(_))
        )
    }

    /// Instruction payload, if `value` is an instruction
    pub fn inst_kind(&self, value: Value) -> Option<&InstKind> {
        match self.value_data(value).map(|d| &d.kind) {
            Some(ValueKind::Instruction(inst)) => Some(&inst.kind),
            _ => None,
        }
    }

    /// Opcode, if `value` is an instruction
    pub fn opcode(&self, value: Value) -> Option<Opcode> {
        self.inst_kind(value).map(InstKind::opcode)
    }

    /// Argument payload of a live argument value
    pub fn argument_data(&self, value: Value) -> Result<&ArgumentData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::Argument(arg) => Ok(arg),
            _ => Err(IrError::WrongKind {
                value,
                expected: "an argument",
            }),
        }
    }

    pub(crate) fn inst_data(&self, value: Value) -> Result<&InstData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::Instruction(inst) => Ok(inst),
            _ => Err(IrError::WrongKind {
                value,
                expected: "an instruction",
            }),
        }
    }

    pub(crate) fn inst_data_mut(&mut self, value: Value) -> Result<&mut InstData, IrError> {
        match &mut self.try_value_mut(value)?.kind {
            ValueKind::Instruction(inst) => Ok(inst),
            _ => Err(IrError::WrongKind {
                value,
                expected: "an instruction",
            }),
        }
    }

    pub(crate) fn block_data(&self, value: Value) -> Result<&BlockData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::BasicBlock(block) => Ok(block),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a basic block",
            }),
        }
    }

    pub(crate) fn block_data_mut(&mut self, value: Value) -> Result<&mut BlockData, IrError> {
        match &mut self.try_value_mut(value)?.kind {
            ValueKind::BasicBlock(block) => Ok(block),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a basic block",
            }),
        }
    }

    pub(crate) fn function_data(&self, value: Value) -> Result<&FunctionData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::Function(func) => Ok(func),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a function",
            }),
        }
    }

    pub(crate) fn function_data_mut(&mut self, value: Value) -> Result<&mut FunctionData, IrError> {
        match &mut self.try_value_mut(value)?.kind {
            ValueKind::Function(func) => Ok(func),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a function",
            }),
        }
    }

    /// Allocate a new value with no operands and no uses
    pub(crate) fn new_value(&mut self, ty: Type, name: &str, kind: ValueKind) -> Value {
        let name = if name.is_empty() {
            None
        } else {
            Some(String::from(name))
        };
        self.values.insert(ValueData::new(ty, name, kind))
    }

    /// Release a value's operands and free its slot
    ///
    /// The caller has already unlinked it from any container.
    pub(crate) fn free_value(&mut self, value: Value) -> Result<(), IrError> {
        let uses = self.use_count(value);
        if uses > 0 {
            return Err(IrError::ValueStillInUse { value, uses });
        }
        self.release_operands(value)?;
        self.values.remove(value);
        Ok(())
    }

    /// Number of live values in the context
    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_name_and_clear() {
        let mut ctx = Context::new();
        let int = ctx.int_type();
        let f_ty = ctx.function_type(int, &[int]);
        let f = ctx.create_function(f_ty, "f", &["x"]).unwrap();
        let x = ctx.argument(f, 0).unwrap();

        assert_eq!(ctx.name(x), Some("x"));
        ctx.set_name(x, "y").unwrap();
        assert_eq!(ctx.name(x), Some("y"));
        ctx.set_name(x, "").unwrap();
        assert_eq!(ctx.name(x), None);
    }

    #[test]
    fn test_kind_predicates() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let block = ctx.create_block("entry", None, None).unwrap();

        assert!(ctx.is_constant(one));
        assert!(!ctx.is_block(one));
        assert!(ctx.is_block(block));
        assert!(!ctx.is_instruction(block));
        assert_eq!(ctx.opcode(block), None);
        assert_eq!(ctx.kind(block).describe(), "a basic block");
    }

    #[test]
    fn test_stale_handle_is_reported() {
        let mut ctx = Context::new();
        let block = ctx.create_block("tmp", None, None).unwrap();
        ctx.erase_block(block).unwrap();

        assert!(!ctx.contains_value(block));
        assert_eq!(ctx.try_value(block).err(), Some(IrError::StaleValue(block)));
        assert!(ctx.set_name(block, "x").is_err());
    }
}
