//! Def-use bookkeeping.
//!
//! Every operand slot of a user is a [`Use`]. A use sits in its user's operand
//! vector at the position it records, and in the intrusive doubly-linked use
//! list of the value it references. New uses are linked at the head of the
//! list.

use alloc::vec::Vec;

use tracing::trace;

use crate::{
    context::Context,
    entity::{Use, Value},
    error::IrError,
    packed_option::PackedOption,
};

/// Storage for one def-use edge.
#[derive(Debug, Clone)]
pub struct UseData {
    /// Referenced value; none after `drop_all_references`
    pub(crate) value: PackedOption<Value>,
    pub(crate) user: Value,
    pub(crate) operand_no: u32,
    pub(crate) prev: PackedOption<Use>,
    pub(crate) next: PackedOption<Use>,
}

impl UseData {
    /// Referenced value
    pub fn value(&self) -> Option<Value> {
        self.value.expand()
    }

    /// The user owning this operand slot
    pub fn user(&self) -> Value {
        self.user
    }

    /// Position in the user's operand list
    pub fn operand_no(&self) -> usize {
        self.operand_no as usize
    }

    /// Previous use in the value's use list
    pub fn prev(&self) -> Option<Use> {
        self.prev.expand()
    }

    /// Next use in the value's use list
    pub fn next(&self) -> Option<Use> {
        self.next.expand()
    }
}

/// Iterator over the use list of a value.
pub struct Uses<'a> {
    ctx: &'a Context,
    next: Option<Use>,
}

impl Iterator for Uses<'_> {
    type Item = Use;

    fn next(&mut self) -> Option<Use> {
        let current = self.next?;
        self.next = self.ctx.uses.get(current).and_then(|data| data.next.expand());
        Some(current)
    }
}

impl Context {
    /// Storage of a use, or `None` for a stale handle
    pub fn use_data(&self, u: Use) -> Option<&UseData> {
        self.uses.get(u)
    }

    fn try_use(&self, u: Use) -> Result<&UseData, IrError> {
        self.uses.get(u).ok_or(IrError::StaleUse(u))
    }

    /// Value referenced by a use
    pub fn use_value(&self, u: Use) -> Option<Value> {
        self.uses.get(u).and_then(|data| data.value.expand())
    }

    /// User owning a use
    pub fn use_user(&self, u: Use) -> Option<Value> {
        self.uses.get(u).map(|data| data.user)
    }

    /// Register a new use of `value` at operand `position` of `user`
    ///
    /// `position == operand count` appends; a smaller position inserts and
    /// renumbers the operands after it. `None` creates a null operand slot.
    pub fn add_use(
        &mut self,
        value: Option<Value>,
        user: Value,
        position: usize,
    ) -> Result<Use, IrError> {
        let len = self.try_value(user)?.operands.len();
        if position > len {
            return Err(IrError::IndexOutOfRange {
                what: "operand",
                index: position,
                len,
            });
        }
        if let Some(value) = value {
            self.try_value(value)?;
        }

        let u = self.uses.insert(UseData {
            value: PackedOption::none(),
            user,
            operand_no: position as u32,
            prev: PackedOption::none(),
            next: PackedOption::none(),
        });
        if let Some(value) = value {
            self.link_use(u, value);
        }
        self.values[user].operands.insert(position, u);
        if position < len {
            self.renumber_operands(user, position + 1);
        }
        Ok(u)
    }

    /// Append `value` as the last operand of `user`
    pub(crate) fn push_operand(&mut self, user: Value, value: Value) -> Result<Use, IrError> {
        let len = self.try_value(user)?.operands.len();
        self.add_use(Some(value), user, len)
    }

    /// Point an existing use at `new_value`
    ///
    /// A use that currently references a value only accepts a value of the
    /// same type.
    pub fn set_operand(&mut self, u: Use, new_value: Value) -> Result<(), IrError> {
        let current = self.try_use(u)?.value.expand();
        let new_ty = self.try_value(new_value)?.ty;
        if let Some(current) = current {
            if current == new_value {
                return Ok(());
            }
            let current_ty = self.values[current].ty;
            self.expect_type("operand update", current_ty, new_ty)?;
        }
        self.unlink_use(u);
        self.link_use(u, new_value);
        Ok(())
    }

    /// Point operand `index` of `user` at `new_value`
    pub fn set_operand_at(
        &mut self,
        user: Value,
        index: usize,
        new_value: Value,
    ) -> Result<(), IrError> {
        let u = self.operand_use(user, index)?;
        self.set_operand(u, new_value)
    }

    /// Redirect every use of `old` to `new`
    ///
    /// The use list is drained before any use is re-linked, so users that
    /// reference `old` several times (or `new` itself) are handled.
    pub fn replace_all_uses_with(&mut self, old: Value, new: Value) -> Result<(), IrError> {
        if old == new {
            return Err(IrError::SelfReplacement(old));
        }
        let old_ty = self.try_value(old)?.ty;
        let new_ty = self.try_value(new)?.ty;
        self.expect_type("replace_all_uses_with", old_ty, new_ty)?;

        let drained: Vec<Use> = self.uses(old).collect();
        for u in &drained {
            self.unlink_use(*u);
        }
        for u in &drained {
            self.link_use(*u, new);
        }
        trace!(%old, %new, count = drained.len(), "replaced all uses");
        Ok(())
    }

    /// Iterate over the uses of a value, head first
    pub fn uses(&self, value: Value) -> Uses<'_> {
        Uses {
            ctx: self,
            next: self.values.get(value).and_then(|data| data.first_use.expand()),
        }
    }

    /// Iterate over the users of a value (one entry per use)
    pub fn users(&self, value: Value) -> impl Iterator<Item = Value> + '_ {
        self.uses(value)
            .filter_map(move |u| self.uses.get(u).map(|data| data.user))
    }

    /// Number of uses; walks the whole list
    pub fn use_count(&self, value: Value) -> usize {
        self.uses(value).count()
    }

    /// Whether the value has exactly one use
    pub fn has_one_use(&self, value: Value) -> bool {
        match self.values.get(value).and_then(|data| data.first_use.expand()) {
            Some(head) => self.uses[head].next.is_none(),
            None => false,
        }
    }

    /// Whether anything references the value
    pub fn has_uses(&self, value: Value) -> bool {
        self.values
            .get(value)
            .is_some_and(|data| data.first_use.is_some())
    }

    /// Operand slots of a user
    ///
    /// # Panics
    ///
    /// Panics if `user` is stale.
    pub fn operands(&self, user: Value) -> &[Use] {
        &self.values[user].operands
    }

    /// Number of operand slots of a user
    ///
    /// # Panics
    ///
    /// Panics if `user` is stale.
    pub fn num_operands(&self, user: Value) -> usize {
        self.values[user].operands.len()
    }

    /// Use handle of operand `index`
    pub fn operand_use(&self, user: Value, index: usize) -> Result<Use, IrError> {
        let operands = &self.try_value(user)?.operands;
        operands
            .get(index)
            .copied()
            .ok_or(IrError::IndexOutOfRange {
                what: "operand",
                index,
                len: operands.len(),
            })
    }

    /// Value referenced by operand `index`
    pub fn operand(&self, user: Value, index: usize) -> Result<Value, IrError> {
        let u = self.operand_use(user, index)?;
        self.uses[u]
            .value
            .expand()
            .ok_or(IrError::NullOperand { user, index })
    }

    /// Null every operand of `user`, unlinking it from the use lists
    pub fn drop_all_references(&mut self, user: Value) -> Result<(), IrError> {
        let operands = self.try_value(user)?.operands.clone();
        for u in operands {
            self.unlink_use(u);
        }
        Ok(())
    }

    /// Delete operand `index` of `user` and renumber the rest
    pub fn remove_operand(&mut self, user: Value, index: usize) -> Result<(), IrError> {
        let u = self.operand_use(user, index)?;
        self.unlink_use(u);
        self.uses.remove(u);
        self.values[user].operands.remove(index);
        self.renumber_operands(user, index);
        Ok(())
    }

    /// Unlink and free every operand of `user`
    pub(crate) fn release_operands(&mut self, user: Value) -> Result<(), IrError> {
        let operands = core::mem::take(&mut self.try_value_mut(user)?.operands);
        for u in operands {
            self.unlink_use(u);
            self.uses.remove(u);
        }
        Ok(())
    }

    fn renumber_operands(&mut self, user: Value, from: usize) {
        let operands = &self.values[user].operands;
        for (i, u) in operands.iter().enumerate().skip(from) {
            self.uses[*u].operand_no = i as u32;
        }
    }

    /// Link a detached use at the head of `value`'s list
    fn link_use(&mut self, u: Use, value: Value) {
        let head = self.values[value].first_use;
        {
            let data = &mut self.uses[u];
            data.value = PackedOption::some(value);
            data.prev = PackedOption::none();
            data.next = head;
        }
        if let Some(head) = head.expand() {
            self.uses[head].prev = PackedOption::some(u);
        }
        self.values[value].first_use = PackedOption::some(u);
    }

    /// Remove a use from its value's list, leaving it null
    fn unlink_use(&mut self, u: Use) {
        let (value, prev, next) = {
            let data = &self.uses[u];
            (data.value.expand(), data.prev, data.next)
        };
        let Some(value) = value else {
            return;
        };
        match prev.expand() {
            Some(prev) => self.uses[prev].next = next,
            None => {
                if let Some(data) = self.values.get_mut(value) {
                    data.first_use = next;
                }
            }
        }
        if let Some(next) = next.expand() {
            self.uses[next].prev = prev;
        }
        let data = &mut self.uses[u];
        data.value = PackedOption::none();
        data.prev = PackedOption::none();
        data.next = PackedOption::none();
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::inst::{BinaryOp, InsertPoint};

    fn add(ctx: &mut Context, a: Value, b: Value) -> Value {
        ctx.create_binary(BinaryOp::Add, a, b, "", InsertPoint::Detached)
            .unwrap()
    }

    #[test]
    fn test_operands_register_uses() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let sum = add(&mut ctx, one, two);

        assert_eq!(ctx.num_operands(sum), 2);
        assert_eq!(ctx.operand(sum, 0).unwrap(), one);
        assert_eq!(ctx.operand(sum, 1).unwrap(), two);
        assert!(ctx.has_one_use(one));
        assert_eq!(ctx.users(two).collect::<Vec<_>>(), vec![sum]);
    }

    #[test]
    fn test_same_value_used_twice() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let sum = add(&mut ctx, one, one);

        assert_eq!(ctx.use_count(one), 2);
        assert!(!ctx.has_one_use(one));
        assert_eq!(ctx.users(one).collect::<Vec<_>>(), vec![sum, sum]);
    }

    #[test]
    fn test_replace_all_uses_with() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let three = ctx.const_int(3);
        let a = add(&mut ctx, one, two);
        let b = add(&mut ctx, two, one);

        ctx.replace_all_uses_with(one, three).unwrap();

        assert_eq!(ctx.use_count(one), 0);
        assert_eq!(ctx.use_count(three), 2);
        assert_eq!(ctx.operand(a, 0).unwrap(), three);
        assert_eq!(ctx.operand(b, 1).unwrap(), three);
        assert_eq!(ctx.operand(b, 0).unwrap(), two);
    }

    #[test]
    fn test_replace_all_uses_with_self_reference() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let sum = add(&mut ctx, one, one);

        // `two` already referenced by the user after the first rewrite
        let other = add(&mut ctx, one, two);
        ctx.replace_all_uses_with(one, two).unwrap();

        assert_eq!(ctx.use_count(one), 0);
        assert_eq!(ctx.use_count(two), 4);
        assert_eq!(ctx.operand(sum, 0).unwrap(), two);
        assert_eq!(ctx.operand(other, 1).unwrap(), two);
    }

    #[test]
    fn test_replace_all_uses_with_errors() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let t = ctx.const_true();

        assert_eq!(
            ctx.replace_all_uses_with(one, one),
            Err(IrError::SelfReplacement(one))
        );
        assert!(matches!(
            ctx.replace_all_uses_with(one, t),
            Err(IrError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_operand_checks_type() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let sum = add(&mut ctx, one, one);

        ctx.set_operand_at(sum, 1, two).unwrap();
        assert_eq!(ctx.use_count(one), 1);
        assert_eq!(ctx.operand(sum, 1).unwrap(), two);

        let t = ctx.const_true();
        assert!(ctx.set_operand_at(sum, 0, t).is_err());
        assert!(ctx.set_operand_at(sum, 5, two).is_err());
    }

    #[test]
    fn test_add_use_inserts_and_renumbers() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let agg_ty = ctx.array_type(ctx.int_type(), 3);
        let agg = ctx.const_aggregate(agg_ty, &[one, two]).unwrap();

        let three = ctx.const_int(3);
        let u = ctx.add_use(Some(three), agg, 1).unwrap();

        assert_eq!(ctx.use_data(u).unwrap().operand_no(), 1);
        assert_eq!(ctx.operand(agg, 2).unwrap(), two);
        let last = ctx.operand_use(agg, 2).unwrap();
        assert_eq!(ctx.use_data(last).unwrap().operand_no(), 2);
        assert!(ctx.add_use(Some(three), agg, 9).is_err());
    }

    #[test]
    fn test_remove_operand_renumbers() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let three = ctx.const_int(3);
        let agg_ty = ctx.array_type(ctx.int_type(), 3);
        let agg = ctx.const_aggregate(agg_ty, &[one, two, three]).unwrap();

        ctx.remove_operand(agg, 0).unwrap();

        assert_eq!(ctx.use_count(one), 0);
        assert_eq!(ctx.num_operands(agg), 2);
        let first = ctx.operand_use(agg, 0).unwrap();
        assert_eq!(ctx.use_data(first).unwrap().operand_no(), 0);
        assert_eq!(ctx.use_value(first), Some(two));
    }

    #[test]
    fn test_drop_all_references() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let sum = add(&mut ctx, one, two);

        ctx.drop_all_references(sum).unwrap();

        assert_eq!(ctx.use_count(one), 0);
        assert_eq!(ctx.use_count(two), 0);
        assert_eq!(ctx.num_operands(sum), 2);
        assert_eq!(
            ctx.operand(sum, 0),
            Err(IrError::NullOperand {
                user: sum,
                index: 0
            })
        );

        // A null slot takes any value
        let t = ctx.const_true();
        ctx.set_operand_at(sum, 0, t).unwrap();
        assert_eq!(ctx.use_count(t), 1);
    }

    #[test]
    fn test_list_links_are_bidirectional() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        for _ in 0..4 {
            add(&mut ctx, one, one);
        }
        let uses: Vec<Use> = ctx.uses(one).collect();
        assert_eq!(uses.len(), 8);
        for pair in uses.windows(2) {
            assert_eq!(ctx.use_data(pair[0]).unwrap().next(), Some(pair[1]));
            assert_eq!(ctx.use_data(pair[1]).unwrap().prev(), Some(pair[0]));
        }
        assert_eq!(ctx.use_data(uses[0]).unwrap().prev(), None);
    }
}
