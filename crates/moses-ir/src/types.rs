//! Type system for the IR.
//!
//! Types are interned in a [`TypeTable`]: literal types (pointers, arrays,
//! anonymous structs, function types) are uniqued structurally, named structs
//! are uniqued by name. Every type is referred to by a [`Type`] handle, so
//! type equality is handle equality.

use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::fmt;

use crate::{entity::Type, entity_map::PrimaryMap, error::IrError};

/// Size in bytes of one machine word: `int`, `bool` and pointers.
pub const WORD_SIZE: u64 = 8;

/// Structure of a type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeData {
    /// No value
    Void,
    /// 64-bit signed integer
    Int,
    /// Boolean, stored as a machine word
    Bool,
    /// Basic block label
    Label,
    /// Pointer to `pointee`
    Pointer { pointee: Type },
    /// Fixed-length array
    Array { element: Type, len: u64 },
    /// Struct; `name` is set for identified structs
    Struct {
        name: Option<String>,
        fields: Vec<Type>,
    },
    /// Function signature
    Function { ret: Type, params: Vec<Type> },
}

/// Interning table for types.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: PrimaryMap<Type, TypeData>,
    literal: BTreeMap<TypeData, Type>,
    named: BTreeMap<String, Type>,
}

impl TypeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            types: PrimaryMap::new(),
            literal: BTreeMap::new(),
            named: BTreeMap::new(),
        }
    }

    /// Intern a literal type
    ///
    /// Named structs must go through [`TypeTable::named_struct`].
    pub fn intern(&mut self, data: TypeData) -> Type {
        debug_assert!(
            !matches!(data, TypeData::Struct { name: Some(_), .. }),
            "named structs are uniqued by name"
        );
        if let Some(ty) = self.literal.get(&data) {
            return *ty;
        }
        let ty = self.types.push(data.clone());
        self.literal.insert(data, ty);
        ty
    }

    /// Get or create the identified struct called `name`
    ///
    /// A freshly created struct is opaque (no fields) until
    /// [`TypeTable::set_struct_body`] is called.
    pub fn named_struct(&mut self, name: &str) -> Type {
        if let Some(ty) = self.named.get(name) {
            return *ty;
        }
        let ty = self.types.push(TypeData::Struct {
            name: Some(String::from(name)),
            fields: Vec::new(),
        });
        self.named.insert(String::from(name), ty);
        ty
    }

    /// Look up an identified struct by name
    pub fn lookup_struct(&self, name: &str) -> Option<Type> {
        self.named.get(name).copied()
    }

    /// Identified structs, ordered by name
    pub fn named_structs(&self) -> impl Iterator<Item = (&str, Type)> + '_ {
        self.named.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Set the fields of an identified struct
    ///
    /// A struct may refer to itself through a pointer but never by value.
    pub fn set_struct_body(&mut self, ty: Type, body: Vec<Type>) -> Result<(), IrError> {
        if body.iter().any(|field| self.contains_by_value(*field, ty)) {
            return Err(IrError::InvalidType {
                reason: "struct contains itself by value",
            });
        }
        // Named structs are keyed by name, not structure, so mutating the body
        // does not disturb the literal interning table.
        match self.types.get_mut(ty) {
            Some(TypeData::Struct {
                name: Some(_),
                fields,
            }) => {
                *fields = body;
                Ok(())
            }
            _ => Err(IrError::InvalidType {
                reason: "only named structs have a settable body",
            }),
        }
    }

    fn contains_by_value(&self, ty: Type, target: Type) -> bool {
        if ty == target {
            return true;
        }
        match self.data(ty) {
            TypeData::Array { element, .. } => self.contains_by_value(*element, target),
            TypeData::Struct { fields, .. } => {
                fields.iter().any(|field| self.contains_by_value(*field, target))
            }
            _ => false,
        }
    }

    /// Get the structure of a type
    pub fn data(&self, ty: Type) -> &TypeData {
        &self.types[ty]
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Storage size in bytes
    ///
    /// `None` for types without storage and for sizes that overflow `u64`.
    pub fn size_of(&self, ty: Type) -> Option<u64> {
        match self.data(ty) {
            TypeData::Int | TypeData::Bool | TypeData::Pointer { .. } => Some(WORD_SIZE),
            TypeData::Array { element, len } => {
                self.size_of(*element)?.checked_mul(*len)
            }
            TypeData::Struct { fields, .. } => {
                let mut total = 0u64;
                for field in fields {
                    total = total.checked_add(self.size_of(*field)?)?;
                }
                Some(total)
            }
            TypeData::Void | TypeData::Label | TypeData::Function { .. } => None,
        }
    }

    /// Byte offset of field `index` in a struct type
    pub fn field_offset(&self, ty: Type, index: usize) -> Option<u64> {
        match self.data(ty) {
            TypeData::Struct { fields, .. } if index < fields.len() => {
                let mut offset = 0u64;
                for field in &fields[..index] {
                    offset = offset.checked_add(self.size_of(*field)?)?;
                }
                Some(offset)
            }
            _ => None,
        }
    }

    /// Pointee of a pointer type
    pub fn pointee(&self, ty: Type) -> Option<Type> {
        match self.data(ty) {
            TypeData::Pointer { pointee } => Some(*pointee),
            _ => None,
        }
    }

    /// Check if this is the integer type
    pub fn is_int(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Int)
    }

    /// Check if this is the boolean type
    pub fn is_bool(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Bool)
    }

    /// Check if this is a pointer type
    pub fn is_pointer(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Pointer { .. })
    }

    /// Check if this is an array or struct type
    pub fn is_aggregate(&self, ty: Type) -> bool {
        matches!(
            self.data(ty),
            TypeData::Array { .. } | TypeData::Struct { .. }
        )
    }

    /// Check if this is a function type
    pub fn is_function(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Function { .. })
    }

    /// Display adapter for a type
    pub fn display(&self, ty: Type) -> DisplayType<'_> {
        DisplayType { table: self, ty }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a type in the textual IR syntax.
pub struct DisplayType<'a> {
    table: &'a TypeTable,
    ty: Type,
}

impl fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table;
        match table.data(self.ty) {
            TypeData::Void => write!(f, "void"),
            TypeData::Int => write!(f, "int"),
            TypeData::Bool => write!(f, "bool"),
            TypeData::Label => write!(f, "label"),
            TypeData::Pointer { pointee } => write!(f, "{}*", table.display(*pointee)),
            TypeData::Array { element, len } => {
                write!(f, "[{} x {}]", len, table.display(*element))
            }
            TypeData::Struct {
                name: Some(name), ..
            } => write!(f, "%{}", name),
            TypeData::Struct { name: None, fields } => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", table.display(*field))?;
                }
                write!(f, " }}")
            }
            TypeData::Function { ret, params } => {
                write!(f, "{} (", table.display(*ret))?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", table.display(*param))?;
                }
                write!(f, ")")
            }
        }
    }
}
