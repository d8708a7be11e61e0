//! Packed Option for entity references.
//!
//! Stores a handle inline and encodes `None` as the handle type's reserved
//! value, so parent and use-list links cost no discriminant.

use crate::entity::ReservedValue;

/// Space-efficient Option for entity references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackedOption<T: ReservedValue>(T);

impl<T: ReservedValue> PackedOption<T> {
    /// Create a None value
    pub fn none() -> Self {
        Self(T::reserved_value())
    }

    /// Create a Some value
    pub fn some(entity: T) -> Self {
        debug_assert!(
            !entity.is_reserved_value(),
            "cannot pack the reserved value as Some"
        );
        Self(entity)
    }

    /// Expand to Option
    pub fn expand(self) -> Option<T> {
        if self.0.is_reserved_value() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Check if this is Some
    pub fn is_some(&self) -> bool {
        !self.0.is_reserved_value()
    }

    /// Check if this is None
    pub fn is_none(&self) -> bool {
        self.0.is_reserved_value()
    }
}

impl<T: ReservedValue> Default for PackedOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: ReservedValue> From<Option<T>> for PackedOption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(entity) => Self::some(entity),
            None => Self::none(),
        }
    }
}

impl<T: ReservedValue> From<T> for PackedOption<T> {
    fn from(entity: T) -> Self {
        Self::some(entity)
    }
}
