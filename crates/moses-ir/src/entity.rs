//! Entity handles for IR elements.
//!
//! Types are dense, never-freed entities indexed through [`EntityRef`].
//! Values and uses live in generational arenas: their handles carry a
//! generation so a handle to an erased slot is detected instead of silently
//! aliasing whatever reuses the slot.

use core::fmt;

/// Dense entity reference (index only).
pub trait EntityRef: Copy + Clone + PartialEq + Eq + core::hash::Hash + fmt::Debug {
    /// Get the index of this entity
    fn index(self) -> usize;

    /// Create an entity from an index
    fn from_index(index: usize) -> Self;
}

/// Generation-checked entity reference for arena slots.
pub trait ArenaKey: Copy + Clone + PartialEq + Eq + Ord + fmt::Debug {
    /// Build a handle for `slot` at `generation`
    fn new(slot: u32, generation: u32) -> Self;

    /// Slot index in the arena
    fn slot(self) -> u32;

    /// Generation the slot had when this handle was issued
    fn generation(self) -> u32;
}

/// Sentinel support for [`crate::packed_option::PackedOption`].
pub trait ReservedValue: Copy {
    /// The value used to encode `None`
    fn reserved_value() -> Self;

    /// Whether this is the reserved value
    fn is_reserved_value(&self) -> bool;
}

/// Handle to anything referenceable in the IR: instruction results,
/// constants, blocks, functions, arguments and global variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value {
    slot: u32,
    generation: u32,
}

impl ArenaKey for Value {
    fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    fn slot(self) -> u32 {
        self.slot
    }

    fn generation(self) -> u32 {
        self.generation
    }
}

impl ReservedValue for Value {
    fn reserved_value() -> Self {
        Self {
            slot: u32::MAX,
            generation: u32::MAX,
        }
    }

    fn is_reserved_value(&self) -> bool {
        self.slot == u32::MAX
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.slot)
    }
}

/// Handle to one def-use edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Use {
    slot: u32,
    generation: u32,
}

impl ArenaKey for Use {
    fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    fn slot(self) -> u32 {
        self.slot
    }

    fn generation(self) -> u32 {
        self.generation
    }
}

impl ReservedValue for Use {
    fn reserved_value() -> Self {
        Self {
            slot: u32::MAX,
            generation: u32::MAX,
        }
    }

    fn is_reserved_value(&self) -> bool {
        self.slot == u32::MAX
    }
}

impl fmt::Display for Use {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "use{}", self.slot)
    }
}

/// Handle to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);

impl EntityRef for Type {
    fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        Type(index as u32)
    }
}

impl ReservedValue for Type {
    fn reserved_value() -> Self {
        Type(u32::MAX)
    }

    fn is_reserved_value(&self) -> bool {
        self.0 == u32::MAX
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn test_value_key_roundtrip() {
        let v = Value::new(7, 3);
        assert_eq!(v.slot(), 7);
        assert_eq!(v.generation(), 3);
        assert_eq!(format!("{}", v), "v7");
    }

    #[test]
    fn test_generations_distinguish_handles() {
        let a = Value::new(4, 0);
        let b = Value::new(4, 1);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_reserved_values() {
        assert!(Value::reserved_value().is_reserved_value());
        assert!(!Value::new(0, 0).is_reserved_value());
        assert!(Use::reserved_value().is_reserved_value());
        assert!(Type::reserved_value().is_reserved_value());
        assert!(!Type::from_index(3).is_reserved_value());
    }

    #[test]
    fn test_type_entity_ref() {
        let t = Type::from_index(10);
        assert_eq!(t.index(), 10);
    }
}
