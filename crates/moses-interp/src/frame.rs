//! Activation records.

use alloc::{collections::BTreeMap, vec::Vec};

use moses_ir::Value;

use crate::value::GenericValue;

/// One frame of the interpreter stack.
///
/// Top-level code runs in a frame without a function.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub(crate) function: Option<Value>,
    pub(crate) block: Value,
    /// Index of the next instruction in `block`
    pub(crate) cursor: usize,
    pub(crate) values: BTreeMap<Value, GenericValue>,
    /// Call instruction waiting for this frame's result
    pub(crate) caller: Option<Value>,
    /// Allocations released when the frame pops
    pub(crate) allocations: Vec<u64>,
}

impl ExecutionContext {
    pub(crate) fn new(function: Option<Value>, block: Value, caller: Option<Value>) -> Self {
        Self {
            function,
            block,
            cursor: 0,
            values: BTreeMap::new(),
            caller,
            allocations: Vec::new(),
        }
    }

    pub fn function(&self) -> Option<Value> {
        self.function
    }

    pub fn block(&self) -> Value {
        self.block
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn caller(&self) -> Option<Value> {
        self.caller
    }

    pub fn allocations(&self) -> &[u64] {
        &self.allocations
    }

    /// Value computed for `value` in this frame
    pub fn get(&self, value: Value) -> Option<GenericValue> {
        self.values.get(&value).copied()
    }

    pub(crate) fn bind(&mut self, value: Value, result: GenericValue) {
        self.values.insert(value, result);
    }

    /// Continue at the start of `block`
    pub(crate) fn jump(&mut self, block: Value) {
        self.block = block;
        self.cursor = 0;
    }

    /// Merge a finished top-level frame into this one; its allocations stay live
    pub(crate) fn absorb(&mut self, other: ExecutionContext) {
        self.values.extend(other.values);
        self.allocations.extend(other.allocations);
    }
}
