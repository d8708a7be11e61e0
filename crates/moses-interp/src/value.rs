//! Runtime values.

use core::fmt;

use moses_ir::{Context, Type, TypeData};

/// A value computed by the interpreter.
///
/// Aggregates never appear here; they are handled through their address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GenericValue {
    Bool(bool),
    Int(i64),
    Pointer(u64),
}

impl GenericValue {
    /// Zero of a scalar type, used for `undef`
    pub fn zero(ctx: &Context, ty: Type) -> Option<Self> {
        match ctx.type_data(ty) {
            TypeData::Int => Some(GenericValue::Int(0)),
            TypeData::Bool => Some(GenericValue::Bool(false)),
            TypeData::Pointer { .. } => Some(GenericValue::Pointer(0)),
            _ => None,
        }
    }

    /// Decode a machine word as a value of `ty`
    pub fn from_word(ctx: &Context, ty: Type, word: i64) -> Option<Self> {
        match ctx.type_data(ty) {
            TypeData::Int => Some(GenericValue::Int(word)),
            TypeData::Bool => Some(GenericValue::Bool(word != 0)),
            TypeData::Pointer { .. } => Some(GenericValue::Pointer(word as u64)),
            _ => None,
        }
    }

    /// Encode as a machine word
    pub fn to_word(self) -> i64 {
        match self {
            GenericValue::Bool(b) => b as i64,
            GenericValue::Int(n) => n,
            GenericValue::Pointer(address) => address as i64,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            GenericValue::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            GenericValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_pointer(self) -> Option<u64> {
        match self {
            GenericValue::Pointer(address) => Some(address),
            _ => None,
        }
    }

    /// Check whether the value fits a parameter or result of type `ty`
    pub fn matches_type(self, ctx: &Context, ty: Type) -> bool {
        matches!(
            (self, ctx.type_data(ty)),
            (GenericValue::Int(_), TypeData::Int)
                | (GenericValue::Bool(_), TypeData::Bool)
                | (GenericValue::Pointer(_), TypeData::Pointer { .. })
        )
    }
}

impl fmt::Display for GenericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericValue::Bool(b) => write!(f, "{}", b),
            GenericValue::Int(n) => write!(f, "{}", n),
            GenericValue::Pointer(address) => write!(f, "0x{:x}", address),
        }
    }
}
