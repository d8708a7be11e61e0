//! Module: a context plus its ordered top-level items.

use alloc::vec::Vec;
use core::fmt;

use crate::{context::Context, entity::Value, value::ValueKind};

/// A compilation unit.
///
/// `items` lists global variables, functions and free-standing blocks in
/// definition order. Free-standing blocks are top-level code: the execution
/// engine runs the first one it finds.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub context: Context,
    pub items: Vec<Value>,
}

impl Module {
    /// Create an empty module with a fresh context
    pub fn new() -> Self {
        Self {
            context: Context::new(),
            items: Vec::new(),
        }
    }

    /// Record a top-level item
    pub fn push_item(&mut self, item: Value) {
        if !self.items.contains(&item) {
            self.items.push(item);
        }
    }

    fn find(&self, name: &str, pred: impl Fn(&ValueKind) -> bool) -> Option<Value> {
        self.items.iter().copied().find(|item| {
            self.context
                .value_data(*item)
                .is_some_and(|data| data.name() == Some(name) && pred(data.kind()))
        })
    }

    /// Look up a function by name
    pub fn get_function(&self, name: &str) -> Option<Value> {
        self.find(name, |kind| matches!(kind, ValueKind::Function(_)))
    }

    /// Look up a global variable by name
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.find(name, |kind| matches!(kind, ValueKind::GlobalVariable(_)))
    }

    /// Functions, in definition order
    pub fn functions(&self) -> impl Iterator<Item = Value> + '_ {
        self.items
            .iter()
            .copied()
            .filter(|item| self.context.is_function(*item))
    }

    /// Global variables, in definition order
    pub fn globals(&self) -> impl Iterator<Item = Value> + '_ {
        self.items
            .iter()
            .copied()
            .filter(|item| self.context.is_global(*item))
    }

    /// First free-standing block, the module's top-level code
    pub fn top_level_block(&self) -> Option<Value> {
        self.items.iter().copied().find(|item| {
            self.context.is_block(*item)
                && matches!(self.context.block_parent(*item), Ok(None))
        })
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.context.write_module(f, &self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_kind() {
        let mut module = Module::new();
        let ctx = &mut module.context;
        let int = ctx.int_type();
        let sig = ctx.function_type(int, &[]);
        let f = ctx.create_function(sig, "main", &[]).unwrap();
        let g = ctx.create_global(int, "main_count", None).unwrap();
        let top = ctx.create_block("top", None, None).unwrap();
        module.push_item(g);
        module.push_item(f);
        module.push_item(top);
        module.push_item(f);

        assert_eq!(module.items.len(), 3);
        assert_eq!(module.get_function("main"), Some(f));
        assert_eq!(module.get_function("main_count"), None);
        assert_eq!(module.get_global("main_count"), Some(g));
        assert_eq!(module.functions().count(), 1);
        assert_eq!(module.globals().count(), 1);
        assert_eq!(module.top_level_block(), Some(top));
    }
}
