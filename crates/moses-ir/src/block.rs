//! Basic blocks.
//!
//! A block is a label-typed value holding an ordered instruction list. Control
//! edges are not stored: a block's predecessors are the blocks of the
//! terminators found in its use list, and its successors are read from its
//! own terminator's operands.

use alloc::vec::Vec;

use tracing::trace;

use crate::{
    context::Context,
    entity::Value,
    error::IrError,
    inst::{InsertPoint, InstKind},
    packed_option::PackedOption,
    value::ValueKind,
};

/// Payload of a basic block value.
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub(crate) parent: PackedOption<Value>,
    pub(crate) insts: Vec<Value>,
}

impl BlockData {
    /// Containing function
    pub fn parent(&self) -> Option<Value> {
        self.parent.expand()
    }

    /// Instructions, in execution order
    pub fn insts(&self) -> &[Value] {
        &self.insts
    }
}

impl Context {
    /// Create a block
    ///
    /// With a parent, the block is appended to the function, or placed right
    /// before `insert_before` when given. Without a parent, `insert_before`
    /// supplies the function; with neither, the block is free-standing.
    pub fn create_block(
        &mut self,
        name: &str,
        parent: Option<Value>,
        insert_before: Option<Value>,
    ) -> Result<Value, IrError> {
        let parent = match (parent, insert_before) {
            (Some(func), _) => Some(func),
            (None, Some(before)) => Some(
                self.block_data(before)?
                    .parent
                    .expand()
                    .ok_or(IrError::NoParent(before))?,
            ),
            (None, None) => None,
        };
        let position = match parent {
            Some(func) => {
                let blocks = &self.function_data(func)?.blocks;
                match insert_before {
                    Some(before) => Some(blocks.iter().position(|b| *b == before).ok_or(
                        IrError::WrongKind {
                            value: before,
                            expected: "a block of the parent function",
                        },
                    )?),
                    None => Some(blocks.len()),
                }
            }
            None => None,
        };

        let label = self.label_type();
        let block = self.new_value(label, name, ValueKind::BasicBlock(BlockData::default()));
        if let (Some(func), Some(position)) = (parent, position) {
            self.insert_block_at(func, position, block)?;
        }
        Ok(block)
    }

    /// Instructions of a block
    pub fn block_insts(&self, block: Value) -> Result<&[Value], IrError> {
        Ok(&self.block_data(block)?.insts)
    }

    /// Containing function of a block
    pub fn block_parent(&self, block: Value) -> Result<Option<Value>, IrError> {
        Ok(self.block_data(block)?.parent.expand())
    }

    /// Splice a detached instruction in before position `index`
    ///
    /// No terminator placement is enforced; that is the verifier's job.
    pub fn block_insert(&mut self, block: Value, index: usize, inst: Value) -> Result<(), IrError> {
        let len = self.block_data(block)?.insts.len();
        if index > len {
            return Err(IrError::IndexOutOfRange {
                what: "instruction",
                index,
                len,
            });
        }
        if self.inst_data(inst)?.parent.is_some() {
            return Err(IrError::AlreadyInserted(inst));
        }
        self.block_data_mut(block)?.insts.insert(index, inst);
        self.inst_data_mut(inst)?.parent = PackedOption::some(block);
        Ok(())
    }

    /// Append a detached instruction
    pub fn append_inst(&mut self, block: Value, inst: Value) -> Result<(), IrError> {
        let len = self.block_data(block)?.insts.len();
        self.block_insert(block, len, inst)
    }

    /// Last instruction, if it is a terminator
    pub fn terminator(&self, block: Value) -> Result<Option<Value>, IrError> {
        Ok(self
            .block_data(block)?
            .insts
            .last()
            .copied()
            .filter(|inst| self.is_terminator(*inst)))
    }

    /// Blocks whose terminator targets `block`, in use-list order, without
    /// duplicates
    pub fn predecessors(&self, block: Value) -> Result<Vec<Value>, IrError> {
        self.block_data(block)?;
        let mut preds = Vec::new();
        for user in self.users(block) {
            if !self.is_terminator(user) {
                continue;
            }
            if let Some(pred) = self.inst_data(user)?.parent.expand() {
                if !preds.contains(&pred) {
                    preds.push(pred);
                }
            }
        }
        Ok(preds)
    }

    /// Successor blocks read from the terminator (empty without one)
    pub fn successors(&self, block: Value) -> Result<Vec<Value>, IrError> {
        match self.terminator(block)? {
            Some(term) => self.terminator_successors(term),
            None => Ok(Vec::new()),
        }
    }

    /// Unlink `inst` from `block` if it is there; it stays alive, detached
    pub fn remove_instruction(&mut self, block: Value, inst: Value) -> Result<bool, IrError> {
        let insts = &mut self.block_data_mut(block)?.insts;
        match insts.iter().position(|i| *i == inst) {
            Some(index) => {
                insts.remove(index);
                self.inst_data_mut(inst)?.parent = PackedOption::none();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Split `block` before instruction `index`
    ///
    /// Instructions `[index..]` move into a new block placed right after
    /// `block`, `block` gets a branch to the new block, and PHI nodes in the
    /// moved terminator's successors now name the new block as their incoming
    /// block.
    pub fn split_basic_block(
        &mut self,
        block: Value,
        index: usize,
        name: &str,
    ) -> Result<Value, IrError> {
        let data = self.block_data(block)?;
        let len = data.insts.len();
        if index > len {
            return Err(IrError::IndexOutOfRange {
                what: "split point",
                index,
                len,
            });
        }
        let parent = data.parent.expand();

        let new_block = self.create_block(name, None, None)?;
        if let Some(func) = parent {
            let position = self
                .function_data(func)?
                .blocks
                .iter()
                .position(|b| *b == block)
                .map_or(0, |p| p + 1);
            self.insert_block_at(func, position, new_block)?;
        }

        let moved = self.block_data_mut(block)?.insts.split_off(index);
        for inst in &moved {
            self.inst_data_mut(*inst)?.parent = PackedOption::some(new_block);
        }
        let count = moved.len();
        self.block_data_mut(new_block)?.insts = moved;

        let mut succs = self.successors(new_block)?;
        succs.dedup();
        for succ in succs {
            self.redirect_phi_incoming(succ, block, new_block)?;
        }

        self.create_br(new_block, InsertPoint::AtEnd(block))?;
        trace!(%block, %new_block, moved = count, "split basic block");
        Ok(new_block)
    }

    /// Rename `from` to `to` in the incoming blocks of every PHI of `block`
    fn redirect_phi_incoming(&mut self, block: Value, from: Value, to: Value) -> Result<(), IrError> {
        let phis: Vec<Value> = self
            .block_insts(block)?
            .iter()
            .copied()
            .filter(|inst| matches!(self.inst_kind(*inst), Some(InstKind::Phi)))
            .collect();
        for phi in phis {
            for i in 0..self.num_incoming(phi)? {
                if self.incoming_block(phi, i)? == from {
                    self.set_incoming_block(phi, i, to)?;
                }
            }
        }
        Ok(())
    }

    /// Unlink a block from its function, keeping it alive
    pub fn remove_block_from_parent(&mut self, block: Value) -> Result<(), IrError> {
        let func = self
            .block_data(block)?
            .parent
            .expand()
            .ok_or(IrError::NoParent(block))?;
        self.function_data_mut(func)?.blocks.retain(|b| *b != block);
        self.block_data_mut(block)?.parent = PackedOption::none();
        Ok(())
    }

    /// Erase a block and every instruction in it
    ///
    /// Refused while the block is still a branch target or PHI incoming block,
    /// or while an instruction outside the block uses one inside it.
    pub fn erase_block(&mut self, block: Value) -> Result<(), IrError> {
        let uses = self.use_count(block);
        if uses > 0 {
            return Err(IrError::ValueStillInUse { value: block, uses });
        }
        let insts = self.block_data(block)?.insts.clone();
        for inst in &insts {
            let outside = self
                .users(*inst)
                .filter(|user| self.inst_parent(*user).ok().flatten() != Some(block))
                .count();
            if outside > 0 {
                return Err(IrError::ValueStillInUse {
                    value: *inst,
                    uses: outside,
                });
            }
        }

        if self.block_data(block)?.parent.is_some() {
            self.remove_block_from_parent(block)?;
        }
        for inst in &insts {
            self.release_operands(*inst)?;
        }
        for inst in &insts {
            self.free_value(*inst)?;
        }
        self.free_value(block)
    }

    /// Move `block` right after `after` in `after`'s function
    pub fn move_block_after(&mut self, block: Value, after: Value) -> Result<(), IrError> {
        if block == after {
            return Ok(());
        }
        self.block_data(block)?;
        let func = self
            .block_data(after)?
            .parent
            .expand()
            .ok_or(IrError::NoParent(after))?;
        if self.block_data(block)?.parent.is_some() {
            self.remove_block_from_parent(block)?;
        }
        let position = self
            .function_data(func)?
            .blocks
            .iter()
            .position(|b| *b == after)
            .ok_or(IrError::NoParent(after))?;
        self.insert_block_at(func, position + 1, block)
    }
}
