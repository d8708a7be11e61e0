//! The IR context.
//!
//! A [`Context`] owns everything a compilation unit allocates: the type table,
//! the value and use arenas, and the caches that make types and scalar
//! constants unique. It is an explicit value passed to every operation; there
//! is no global instance.

use alloc::{collections::BTreeMap, string::String, string::ToString, vec::Vec};

use crate::{
    constant::{ConstantData, ConstantKey},
    entity::{Type, Use, Value},
    entity_map::Arena,
    error::IrError,
    function::Intrinsic,
    types::{TypeData, TypeTable},
    use_list::UseData,
    value::{ValueData, ValueKind},
};

/// Owner of all types, values and uses of one compilation unit.
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) types: TypeTable,
    pub(crate) values: Arena<Value, ValueData>,
    pub(crate) uses: Arena<Use, UseData>,
    pub(crate) constants: BTreeMap<ConstantKey, Value>,
    pub(crate) intrinsics: BTreeMap<Intrinsic, Value>,
    void_ty: Type,
    int_ty: Type,
    bool_ty: Type,
    label_ty: Type,
    const_true: Value,
    const_false: Value,
}

impl Context {
    /// Create a context with the primitive types and boolean constants
    pub fn new() -> Self {
        let mut types = TypeTable::new();
        let void_ty = types.intern(TypeData::Void);
        let int_ty = types.intern(TypeData::Int);
        let bool_ty = types.intern(TypeData::Bool);
        let label_ty = types.intern(TypeData::Label);

        let mut values = Arena::new();
        let const_true = values.insert(ValueData::new(
            bool_ty,
            None,
            ValueKind::Constant(ConstantData::Bool(true)),
        ));
        let const_false = values.insert(ValueData::new(
            bool_ty,
            None,
            ValueKind::Constant(ConstantData::Bool(false)),
        ));

        let mut constants = BTreeMap::new();
        constants.insert(ConstantKey::Bool(true), const_true);
        constants.insert(ConstantKey::Bool(false), const_false);

        Self {
            types,
            values,
            uses: Arena::new(),
            constants,
            intrinsics: BTreeMap::new(),
            void_ty,
            int_ty,
            bool_ty,
            label_ty,
            const_true,
            const_false,
        }
    }

    /// The type table
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Structure of a type
    pub fn type_data(&self, ty: Type) -> &TypeData {
        self.types.data(ty)
    }

    pub fn void_type(&self) -> Type {
        self.void_ty
    }

    pub fn int_type(&self) -> Type {
        self.int_ty
    }

    pub fn bool_type(&self) -> Type {
        self.bool_ty
    }

    pub fn label_type(&self) -> Type {
        self.label_ty
    }

    pub fn const_true(&self) -> Value {
        self.const_true
    }

    pub fn const_false(&self) -> Value {
        self.const_false
    }

    /// Pointer to `pointee`
    pub fn pointer_type(&mut self, pointee: Type) -> Type {
        self.types.intern(TypeData::Pointer { pointee })
    }

    /// Array of `len` elements
    pub fn array_type(&mut self, element: Type, len: u64) -> Type {
        self.types.intern(TypeData::Array { element, len })
    }

    /// Anonymous (literal) struct
    pub fn struct_type(&mut self, fields: &[Type]) -> Type {
        self.types.intern(TypeData::Struct {
            name: None,
            fields: fields.to_vec(),
        })
    }

    /// Get or create the identified struct `name`
    pub fn named_struct(&mut self, name: &str) -> Type {
        self.types.named_struct(name)
    }

    /// Set the fields of an identified struct
    pub fn set_struct_body(&mut self, ty: Type, fields: &[Type]) -> Result<(), IrError> {
        self.types.set_struct_body(ty, fields.to_vec())
    }

    /// Function signature type
    pub fn function_type(&mut self, ret: Type, params: &[Type]) -> Type {
        self.types.intern(TypeData::Function {
            ret,
            params: params.to_vec(),
        })
    }

    /// Storage size of a type in bytes
    pub fn size_of(&self, ty: Type) -> Option<u64> {
        self.types.size_of(ty)
    }

    /// Byte offset of a struct field
    pub fn field_offset(&self, ty: Type, index: usize) -> Option<u64> {
        self.types.field_offset(ty, index)
    }

    /// Pointee of a pointer type
    pub fn pointee(&self, ty: Type) -> Option<Type> {
        self.types.pointee(ty)
    }

    /// Render a type for an error message
    pub(crate) fn type_name(&self, ty: Type) -> String {
        self.types.display(ty).to_string()
    }

    /// Fail with a type mismatch unless `found == expected`
    pub(crate) fn expect_type(
        &self,
        context: &'static str,
        expected: Type,
        found: Type,
    ) -> Result<(), IrError> {
        if expected == found {
            Ok(())
        } else {
            Err(IrError::TypeMismatch {
                context,
                expected: self.type_name(expected),
                found: self.type_name(found),
            })
        }
    }

    /// Every live value, in arena order
    pub fn live_values(&self) -> Vec<Value> {
        self.values.iter().map(|(v, _)| v).collect()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_singletons() {
        let ctx = Context::new();
        assert_ne!(ctx.int_type(), ctx.bool_type());
        assert_eq!(ctx.type_data(ctx.void_type()), &TypeData::Void);
        assert_eq!(ctx.type_data(ctx.label_type()), &TypeData::Label);
        assert_eq!(ctx.value_type(ctx.const_true()), ctx.bool_type());
        assert_ne!(ctx.const_true(), ctx.const_false());
    }

    #[test]
    fn test_type_constructors_are_uniqued() {
        let mut ctx = Context::new();
        let int = ctx.int_type();
        assert_eq!(ctx.pointer_type(int), ctx.pointer_type(int));
        assert_eq!(ctx.array_type(int, 4), ctx.array_type(int, 4));
        assert_ne!(ctx.array_type(int, 4), ctx.array_type(int, 5));
        assert_eq!(ctx.struct_type(&[int, int]), ctx.struct_type(&[int, int]));
        assert_eq!(ctx.function_type(int, &[int]), ctx.function_type(int, &[int]));
    }

    #[test]
    fn test_named_struct_is_distinct_from_literal() {
        let mut ctx = Context::new();
        let int = ctx.int_type();
        let named = ctx.named_struct("Pair");
        ctx.set_struct_body(named, &[int, int]).unwrap();
        let literal = ctx.struct_type(&[int, int]);

        assert_ne!(named, literal);
        assert_eq!(ctx.size_of(named), ctx.size_of(literal));
        assert_eq!(ctx.field_offset(named, 1), Some(8));
    }

    #[test]
    fn test_expect_type_reports_names() {
        let mut ctx = Context::new();
        let int = ctx.int_type();
        let ptr = ctx.pointer_type(int);
        let err = ctx.expect_type("store", int, ptr).unwrap_err();
        assert_eq!(
            err,
            IrError::TypeMismatch {
                context: "store",
                expected: "int".into(),
                found: "int*".into(),
            }
        );
    }
}
