//! Constants and global variables.
//!
//! Scalar constants (`int`, `bool`, `null`, `undef`) are uniqued through the
//! context's constant cache. Aggregate constants are users whose operands are
//! the element constants; they are not uniqued.

use alloc::string::ToString;

use crate::{
    context::Context,
    entity::{Type, Value},
    error::IrError,
    types::TypeData,
    value::ValueKind,
};

/// Payload of a constant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantData {
    Int(i64),
    Bool(bool),
    /// Null pointer of the constant's pointer type
    Null,
    /// Unspecified value of the constant's type
    Undef,
    /// Array or struct; elements are the operands
    Aggregate,
}

/// Cache key for uniqued constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ConstantKey {
    Int(i64),
    Bool(bool),
    Null(Type),
    Undef(Type),
}

/// Payload of a global variable.
#[derive(Debug, Clone)]
pub struct GlobalData {
    pub(crate) value_type: Type,
}

impl GlobalData {
    /// Type of the stored value (the global itself is a pointer to it)
    pub fn value_type(&self) -> Type {
        self.value_type
    }
}

impl Context {
    fn cached_constant(&mut self, key: ConstantKey, ty: Type, data: ConstantData) -> Value {
        if let Some(value) = self.constants.get(&key) {
            return *value;
        }
        let value = self.new_value(ty, "", ValueKind::Constant(data));
        self.constants.insert(key, value);
        value
    }

    /// Integer constant
    pub fn const_int(&mut self, value: i64) -> Value {
        let ty = self.int_type();
        self.cached_constant(ConstantKey::Int(value), ty, ConstantData::Int(value))
    }

    /// Boolean constant
    pub fn const_bool(&self, value: bool) -> Value {
        if value {
            self.const_true()
        } else {
            self.const_false()
        }
    }

    /// Null pointer of a pointer type
    pub fn const_null(&mut self, ty: Type) -> Result<Value, IrError> {
        if !self.types.is_pointer(ty) {
            return Err(IrError::InvalidType {
                reason: "null requires a pointer type",
            });
        }
        Ok(self.cached_constant(ConstantKey::Null(ty), ty, ConstantData::Null))
    }

    /// Undefined value of a type
    pub fn undef(&mut self, ty: Type) -> Value {
        self.cached_constant(ConstantKey::Undef(ty), ty, ConstantData::Undef)
    }

    /// Fresh, non-uniqued undef used as a forward-reference stand-in
    pub(crate) fn placeholder(&mut self, ty: Type) -> Value {
        self.new_value(ty, "", ValueKind::Constant(ConstantData::Undef))
    }

    /// Array or struct constant built from element constants
    pub fn const_aggregate(&mut self, ty: Type, elements: &[Value]) -> Result<Value, IrError> {
        let expected: alloc::vec::Vec<Type> = match self.types.data(ty) {
            TypeData::Array { element, len } => {
                if elements.len() as u64 > *len {
                    return Err(IrError::IndexOutOfRange {
                        what: "array element",
                        index: elements.len(),
                        len: *len as usize,
                    });
                }
                elements.iter().map(|_| *element).collect()
            }
            TypeData::Struct { fields, .. } => {
                if elements.len() != fields.len() {
                    return Err(IrError::TypeMismatch {
                        context: "struct constant",
                        expected: fields.len().to_string(),
                        found: elements.len().to_string(),
                    });
                }
                fields.clone()
            }
            _ => {
                return Err(IrError::InvalidType {
                    reason: "aggregate constant requires an array or struct type",
                })
            }
        };
        for (element, ty) in elements.iter().zip(&expected) {
            if !self.is_constant(*element) {
                return Err(IrError::WrongKind {
                    value: *element,
                    expected: "a constant",
                });
            }
            self.expect_type("aggregate element", *ty, self.value_type(*element))?;
        }

        let value = self.new_value(ty, "", ValueKind::Constant(ConstantData::Aggregate));
        for element in elements {
            self.push_operand(value, *element)?;
        }
        Ok(value)
    }

    /// Payload of a constant value
    pub fn constant_data(&self, value: Value) -> Result<ConstantData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::Constant(data) => Ok(*data),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a constant",
            }),
        }
    }

    /// Integer payload, if `value` is an integer constant
    pub fn as_const_int(&self, value: Value) -> Option<i64> {
        match self.value_data(value).map(|d| &d.kind) {
            Some(ValueKind::Constant(ConstantData::Int(n))) => Some(*n),
            _ => None,
        }
    }

    /// Create a global variable holding a `value_type`
    ///
    /// The global's own type is a pointer to `value_type`.
    pub fn create_global(
        &mut self,
        value_type: Type,
        name: &str,
        initializer: Option<Value>,
    ) -> Result<Value, IrError> {
        if self.size_of(value_type).is_none() {
            return Err(IrError::InvalidType {
                reason: "global variable type has no storage size",
            });
        }
        if let Some(init) = initializer {
            self.check_initializer(value_type, init)?;
        }
        let ptr = self.pointer_type(value_type);
        let global = self.new_value(
            ptr,
            name,
            ValueKind::GlobalVariable(GlobalData { value_type }),
        );
        if let Some(init) = initializer {
            self.push_operand(global, init)?;
        }
        Ok(global)
    }

    fn check_initializer(&self, value_type: Type, init: Value) -> Result<(), IrError> {
        if !self.is_constant(init) {
            return Err(IrError::WrongKind {
                value: init,
                expected: "a constant",
            });
        }
        self.expect_type("global initializer", value_type, self.try_value(init)?.ty)
    }

    /// Payload of a global variable
    pub fn global_data(&self, value: Value) -> Result<&GlobalData, IrError> {
        match &self.try_value(value)?.kind {
            ValueKind::GlobalVariable(global) => Ok(global),
            _ => Err(IrError::WrongKind {
                value,
                expected: "a global variable",
            }),
        }
    }

    /// Initializer of a global variable
    pub fn global_initializer(&self, global: Value) -> Result<Option<Value>, IrError> {
        self.global_data(global)?;
        match self.operands(global).first() {
            Some(u) => Ok(self.use_value(*u)),
            None => Ok(None),
        }
    }

    /// Set or replace the initializer of a global variable
    pub fn set_initializer(&mut self, global: Value, init: Value) -> Result<(), IrError> {
        let value_type = self.global_data(global)?.value_type;
        self.check_initializer(value_type, init)?;
        match self.operands(global).first().copied() {
            Some(u) => self.set_operand(u, init),
            None => self.push_operand(global, init).map(|_| ()),
        }
    }
}
