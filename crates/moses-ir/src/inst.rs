//! Instructions.
//!
//! An instruction is a value whose [`InstKind`] says what it computes and
//! whose operands are the values it reads. Operand layout per kind:
//!
//! | kind | operands |
//! |---|---|
//! | binary, cmp | `[lhs, rhs]` |
//! | alloca, phi (fresh) | `[]` |
//! | load | `[ptr]` |
//! | store | `[value, ptr]` |
//! | getelementptr | `[ptr, index...]` |
//! | phi | `[value0, block0, value1, block1, ...]` |
//! | call | `[callee, arg...]` |
//! | br | `[dest]` or `[cond, if_true, if_false]` |
//! | ret | `[]` or `[value]` |

use alloc::{string::ToString, vec::Vec};
use core::fmt;

use crate::{
    context::Context,
    entity::{Type, Value},
    error::IrError,
    packed_option::PackedOption,
    types::TypeData,
    value::ValueKind,
};

/// Two-operand arithmetic and logic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Signed division
    Div,
    /// Signed remainder
    Rem,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic shift right
    Shr,
}

impl BinaryOp {
    /// All operations, in mnemonic order
    pub const ALL: [BinaryOp; 10] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Xor,
        BinaryOp::Shl,
        BinaryOp::Shr,
    ];

    /// Textual mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
        }
    }

    /// Parse a mnemonic
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    /// Whether the operation also applies to booleans
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

/// Comparison predicates. Integer comparisons are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpPredicate {
    pub const ALL: [CmpPredicate; 6] = [
        CmpPredicate::Eq,
        CmpPredicate::Ne,
        CmpPredicate::Lt,
        CmpPredicate::Le,
        CmpPredicate::Gt,
        CmpPredicate::Ge,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::Lt => "lt",
            CmpPredicate::Le => "le",
            CmpPredicate::Gt => "gt",
            CmpPredicate::Ge => "ge",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.mnemonic() == s)
    }
}

/// Opcode-specific instruction payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstKind {
    Binary(BinaryOp),
    Cmp(CmpPredicate),
    /// Stack allocation of one `allocated`
    Alloca { allocated: Type },
    Load,
    Store,
    /// Address computation; `source` is the pointee type of the base pointer
    GetElementPtr { source: Type },
    Phi,
    Call,
    Br,
    Ret,
}

impl InstKind {
    /// Flat opcode tag
    pub fn opcode(&self) -> Opcode {
        match self {
            InstKind::Binary(_) => Opcode::Binary,
            InstKind::Cmp(_) => Opcode::Cmp,
            InstKind::Alloca { .. } => Opcode::Alloca,
            InstKind::Load => Opcode::Load,
            InstKind::Store => Opcode::Store,
            InstKind::GetElementPtr { .. } => Opcode::GetElementPtr,
            InstKind::Phi => Opcode::Phi,
            InstKind::Call => Opcode::Call,
            InstKind::Br => Opcode::Br,
            InstKind::Ret => Opcode::Ret,
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode().is_terminator()
    }
}

/// Instruction opcode, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    Binary,
    Cmp,
    Alloca,
    Load,
    Store,
    GetElementPtr,
    Phi,
    Call,
    Br,
    Ret,
}

impl Opcode {
    /// Whether instructions with this opcode end a block
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Br | Opcode::Ret)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Binary => "binary",
            Opcode::Cmp => "cmp",
            Opcode::Alloca => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::GetElementPtr => "getelementptr",
            Opcode::Phi => "phi",
            Opcode::Call => "call",
            Opcode::Br => "br",
            Opcode::Ret => "ret",
        };
        f.write_str(name)
    }
}

/// Payload of an instruction value.
#[derive(Debug, Clone)]
pub struct InstData {
    pub(crate) kind: InstKind,
    pub(crate) parent: PackedOption<Value>,
}

impl InstData {
    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Containing block
    pub fn parent(&self) -> Option<Value> {
        self.parent.expand()
    }
}

/// Where a freshly built instruction goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append to the block
    AtEnd(Value),
    /// Before a placed instruction
    Before(Value),
    /// After a placed instruction
    After(Value),
    /// Not placed in any block
    Detached,
}

impl Context {
    fn check_insert_point(&self, at: InsertPoint) -> Result<(), IrError> {
        match at {
            InsertPoint::AtEnd(block) => self.block_data(block).map(|_| ()),
            InsertPoint::Before(pos) | InsertPoint::After(pos) => {
                if self.inst_data(pos)?.parent.is_none() {
                    return Err(IrError::NoParent(pos));
                }
                Ok(())
            }
            InsertPoint::Detached => Ok(()),
        }
    }

    fn build_inst(
        &mut self,
        kind: InstKind,
        ty: Type,
        name: &str,
        operands: &[Value],
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        self.check_insert_point(at)?;
        for operand in operands {
            self.try_value(*operand)?;
        }
        let inst = self.new_value(
            ty,
            name,
            ValueKind::Instruction(InstData {
                kind,
                parent: PackedOption::none(),
            }),
        );
        for operand in operands {
            self.push_operand(inst, *operand)?;
        }
        match at {
            InsertPoint::AtEnd(block) => self.append_inst(block, inst)?,
            InsertPoint::Before(pos) => self.insert_before(inst, pos)?,
            InsertPoint::After(pos) => self.insert_after(inst, pos)?,
            InsertPoint::Detached => {}
        }
        Ok(inst)
    }

    fn mismatch(&self, context: &'static str, expected: &str, found: Type) -> IrError {
        IrError::TypeMismatch {
            context,
            expected: expected.to_string(),
            found: self.type_name(found),
        }
    }

    fn expect_block(&self, value: Value) -> Result<(), IrError> {
        self.block_data(value).map(|_| ())
    }

    /// `lhs op rhs`
    pub fn create_binary(
        &mut self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        name: &str,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        let ty = self.try_value(lhs)?.ty;
        self.expect_type(op.mnemonic(), ty, self.try_value(rhs)?.ty)?;
        if op.is_logical() {
            if !self.types.is_int(ty) && !self.types.is_bool(ty) {
                return Err(self.mismatch(op.mnemonic(), "int or bool", ty));
            }
        } else if !self.types.is_int(ty) {
            return Err(self.mismatch(op.mnemonic(), "int", ty));
        }
        self.build_inst(InstKind::Binary(op), ty, name, &[lhs, rhs], at)
    }

    /// `cmp pred lhs, rhs`, yielding a bool
    pub fn create_cmp(
        &mut self,
        pred: CmpPredicate,
        lhs: Value,
        rhs: Value,
        name: &str,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        let ty = self.try_value(lhs)?.ty;
        self.expect_type("cmp", ty, self.try_value(rhs)?.ty)?;
        if !(self.types.is_int(ty) || self.types.is_bool(ty) || self.types.is_pointer(ty)) {
            return Err(self.mismatch("cmp", "int, bool or pointer", ty));
        }
        let result = self.bool_type();
        self.build_inst(InstKind::Cmp(pred), result, name, &[lhs, rhs], at)
    }

    /// Stack slot for one `allocated`, yielding its address
    pub fn create_alloca(
        &mut self,
        allocated: Type,
        name: &str,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        if self.size_of(allocated).is_none() {
            return Err(IrError::InvalidType {
                reason: "alloca of a type without storage size",
            });
        }
        let ty = self.pointer_type(allocated);
        self.build_inst(InstKind::Alloca { allocated }, ty, name, &[], at)
    }

    /// Read the value behind `ptr`
    pub fn create_load(&mut self, ptr: Value, name: &str, at: InsertPoint) -> Result<Value, IrError> {
        let ptr_ty = self.try_value(ptr)?.ty;
        let ty = self
            .types
            .pointee(ptr_ty)
            .ok_or_else(|| self.mismatch("load", "a pointer", ptr_ty))?;
        if self.size_of(ty).is_none() {
            return Err(IrError::InvalidType {
                reason: "load of a type without storage size",
            });
        }
        self.build_inst(InstKind::Load, ty, name, &[ptr], at)
    }

    /// Write `value` to `ptr`
    pub fn create_store(&mut self, value: Value, ptr: Value, at: InsertPoint) -> Result<Value, IrError> {
        let ptr_ty = self.try_value(ptr)?.ty;
        let pointee = self
            .types
            .pointee(ptr_ty)
            .ok_or_else(|| self.mismatch("store", "a pointer", ptr_ty))?;
        self.expect_type("store", pointee, self.try_value(value)?.ty)?;
        let void = self.void_type();
        self.build_inst(InstKind::Store, void, "", &[value, ptr], at)
    }

    /// Address of an element reached from `ptr` through `indices`
    ///
    /// The first index steps over whole `*ptr` objects; each further index
    /// selects an array element or (constant index) a struct field.
    pub fn create_gep(
        &mut self,
        ptr: Value,
        indices: &[Value],
        name: &str,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        let ptr_ty = self.try_value(ptr)?.ty;
        let source = self
            .types
            .pointee(ptr_ty)
            .ok_or_else(|| self.mismatch("getelementptr", "a pointer", ptr_ty))?;
        if indices.is_empty() {
            return Err(IrError::IndexOutOfRange {
                what: "getelementptr index",
                index: 0,
                len: 0,
            });
        }
        for index in indices {
            let ty = self.try_value(*index)?.ty;
            if !self.types.is_int(ty) {
                return Err(self.mismatch("getelementptr index", "int", ty));
            }
        }

        let mut current = source;
        for index in &indices[1..] {
            current = match self.types.data(current) {
                TypeData::Array { element, .. } => *element,
                TypeData::Struct { fields, .. } => {
                    let field = self.as_const_int(*index).ok_or(IrError::WrongKind {
                        value: *index,
                        expected: "a constant struct field index",
                    })?;
                    match usize::try_from(field).ok().and_then(|i| fields.get(i)) {
                        Some(ty) => *ty,
                        None => {
                            return Err(IrError::IndexOutOfRange {
                                what: "struct field",
                                index: field.max(0) as usize,
                                len: fields.len(),
                            })
                        }
                    }
                }
                _ => {
                    return Err(IrError::InvalidType {
                        reason: "getelementptr indexes into a non-aggregate type",
                    })
                }
            };
        }

        let ty = self.pointer_type(current);
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(ptr);
        operands.extend_from_slice(indices);
        self.build_inst(InstKind::GetElementPtr { source }, ty, name, &operands, at)
    }

    /// Empty PHI node; incoming pairs are added with [`Context::add_incoming`]
    pub fn create_phi(&mut self, ty: Type, name: &str, at: InsertPoint) -> Result<Value, IrError> {
        self.build_inst(InstKind::Phi, ty, name, &[], at)
    }

    /// Call `callee` with `args`
    ///
    /// Intrinsic declarations accept any pointer for a pointer parameter.
    pub fn create_call(
        &mut self,
        callee: Value,
        args: &[Value],
        name: &str,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        let callee_ty = self.try_value(callee)?.ty;
        let (ret, params) = match self.types.data(callee_ty) {
            TypeData::Function { ret, params } => (*ret, params.clone()),
            _ => return Err(self.mismatch("call", "a function", callee_ty)),
        };
        if params.len() != args.len() {
            return Err(IrError::TypeMismatch {
                context: "call argument count",
                expected: params.len().to_string(),
                found: args.len().to_string(),
            });
        }
        let lenient = self.intrinsic(callee).is_some();
        for (arg, param) in args.iter().zip(&params) {
            let arg_ty = self.try_value(*arg)?.ty;
            if lenient && self.types.is_pointer(*param) && self.types.is_pointer(arg_ty) {
                continue;
            }
            self.expect_type("call argument", *param, arg_ty)?;
        }

        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.build_inst(InstKind::Call, ret, name, &operands, at)
    }

    /// Unconditional branch to `dest`
    pub fn create_br(&mut self, dest: Value, at: InsertPoint) -> Result<Value, IrError> {
        self.expect_block(dest)?;
        let void = self.void_type();
        self.build_inst(InstKind::Br, void, "", &[dest], at)
    }

    /// Branch to `if_true` or `if_false` on a bool condition
    pub fn create_cond_br(
        &mut self,
        cond: Value,
        if_true: Value,
        if_false: Value,
        at: InsertPoint,
    ) -> Result<Value, IrError> {
        let cond_ty = self.try_value(cond)?.ty;
        if !self.types.is_bool(cond_ty) {
            return Err(self.mismatch("br condition", "bool", cond_ty));
        }
        self.expect_block(if_true)?;
        self.expect_block(if_false)?;
        let void = self.void_type();
        self.build_inst(InstKind::Br, void, "", &[cond, if_true, if_false], at)
    }

    /// Return, with or without a value
    pub fn create_ret(&mut self, value: Option<Value>, at: InsertPoint) -> Result<Value, IrError> {
        let void = self.void_type();
        match value {
            Some(value) => self.build_inst(InstKind::Ret, void, "", &[value], at),
            None => self.build_inst(InstKind::Ret, void, "", &[], at),
        }
    }

    /// Containing block of an instruction
    pub fn inst_parent(&self, inst: Value) -> Result<Option<Value>, IrError> {
        Ok(self.inst_data(inst)?.parent.expand())
    }

    /// Function containing an instruction, through its block
    pub fn inst_function(&self, inst: Value) -> Option<Value> {
        let block = self.inst_parent(inst).ok()??;
        self.block_parent(block).ok()?
    }

    /// Whether `inst` is a `br` or `ret`
    pub fn is_terminator(&self, inst: Value) -> bool {
        self.inst_kind(inst).is_some_and(InstKind::is_terminator)
    }

    fn placed_position(&self, inst: Value) -> Result<(Value, usize), IrError> {
        let block = self.inst_data(inst)?.parent.expand().ok_or(IrError::NoParent(inst))?;
        let index = self
            .block_data(block)?
            .insts
            .iter()
            .position(|i| *i == inst)
            .ok_or(IrError::NoParent(inst))?;
        Ok((block, index))
    }

    /// Place a detached instruction right before `pos`
    pub fn insert_before(&mut self, inst: Value, pos: Value) -> Result<(), IrError> {
        let (block, index) = self.placed_position(pos)?;
        self.block_insert(block, index, inst)
    }

    /// Place a detached instruction right after `pos`
    pub fn insert_after(&mut self, inst: Value, pos: Value) -> Result<(), IrError> {
        let (block, index) = self.placed_position(pos)?;
        self.block_insert(block, index + 1, inst)
    }

    /// Move an instruction (placed or not) right before `pos`
    pub fn move_before(&mut self, inst: Value, pos: Value) -> Result<(), IrError> {
        if inst == pos {
            return Ok(());
        }
        self.placed_position(pos)?;
        if self.inst_data(inst)?.parent.is_some() {
            self.remove_from_parent(inst)?;
        }
        self.insert_before(inst, pos)
    }

    /// Unlink an instruction from its block, keeping it alive
    pub fn remove_from_parent(&mut self, inst: Value) -> Result<(), IrError> {
        let (block, index) = self.placed_position(inst)?;
        self.block_data_mut(block)?.insts.remove(index);
        self.inst_data_mut(inst)?.parent = PackedOption::none();
        Ok(())
    }

    /// Unlink an instruction, drop its operands and free it
    ///
    /// Refused while anything still uses the instruction's result.
    pub fn erase_from_parent(&mut self, inst: Value) -> Result<(), IrError> {
        let parent = self.inst_data(inst)?.parent;
        let uses = self.use_count(inst);
        if uses > 0 {
            return Err(IrError::ValueStillInUse { value: inst, uses });
        }
        if parent.is_some() {
            self.remove_from_parent(inst)?;
        }
        self.free_value(inst)
    }

    fn phi_data(&self, phi: Value) -> Result<(), IrError> {
        match self.inst_data(phi)?.kind {
            InstKind::Phi => Ok(()),
            _ => Err(IrError::WrongKind {
                value: phi,
                expected: "a phi node",
            }),
        }
    }

    /// Add an incoming `(value, block)` pair to a PHI node
    pub fn add_incoming(&mut self, phi: Value, value: Value, block: Value) -> Result<(), IrError> {
        self.phi_data(phi)?;
        let phi_ty = self.values[phi].ty;
        self.expect_type("phi incoming value", phi_ty, self.try_value(value)?.ty)?;
        self.expect_block(block)?;
        self.push_operand(phi, value)?;
        self.push_operand(phi, block)?;
        Ok(())
    }

    /// Number of incoming pairs of a PHI node
    pub fn num_incoming(&self, phi: Value) -> Result<usize, IrError> {
        self.phi_data(phi)?;
        Ok(self.values[phi].operands.len() / 2)
    }

    fn incoming_index(&self, phi: Value, index: usize) -> Result<usize, IrError> {
        let len = self.num_incoming(phi)?;
        if index >= len {
            return Err(IrError::IndexOutOfRange {
                what: "phi incoming",
                index,
                len,
            });
        }
        Ok(index * 2)
    }

    /// Value of incoming pair `index`
    pub fn incoming_value(&self, phi: Value, index: usize) -> Result<Value, IrError> {
        let slot = self.incoming_index(phi, index)?;
        self.operand(phi, slot)
    }

    /// Block of incoming pair `index`
    pub fn incoming_block(&self, phi: Value, index: usize) -> Result<Value, IrError> {
        let slot = self.incoming_index(phi, index)?;
        self.operand(phi, slot + 1)
    }

    /// Redirect the block of incoming pair `index`
    pub fn set_incoming_block(&mut self, phi: Value, index: usize, block: Value) -> Result<(), IrError> {
        let slot = self.incoming_index(phi, index)?;
        self.expect_block(block)?;
        self.set_operand_at(phi, slot + 1, block)
    }

    /// Delete incoming pair `index`
    pub fn remove_incoming(&mut self, phi: Value, index: usize) -> Result<(), IrError> {
        let slot = self.incoming_index(phi, index)?;
        self.remove_operand(phi, slot + 1)?;
        self.remove_operand(phi, slot)
    }

    /// Operand slot holding successor `index` of a terminator
    fn successor_slot(&self, term: Value, index: usize) -> Result<usize, IrError> {
        let len = self.num_successors(term)?;
        if index >= len {
            return Err(IrError::IndexOutOfRange {
                what: "successor",
                index,
                len,
            });
        }
        // Conditional branches carry the condition in slot 0
        Ok(if len == 2 { index + 1 } else { index })
    }

    /// Number of successor blocks of a terminator
    pub fn num_successors(&self, term: Value) -> Result<usize, IrError> {
        match self.inst_data(term)?.kind {
            InstKind::Br if self.values[term].operands.len() == 3 => Ok(2),
            InstKind::Br => Ok(1),
            InstKind::Ret => Ok(0),
            _ => Err(IrError::NotATerminator(term)),
        }
    }

    /// Successor `index` of a terminator
    pub fn successor(&self, term: Value, index: usize) -> Result<Value, IrError> {
        let slot = self.successor_slot(term, index)?;
        self.operand(term, slot)
    }

    /// Redirect successor `index` of a terminator
    pub fn set_successor(&mut self, term: Value, index: usize, block: Value) -> Result<(), IrError> {
        let slot = self.successor_slot(term, index)?;
        self.expect_block(block)?;
        self.set_operand_at(term, slot, block)
    }

    /// Successor blocks of a terminator, in operand order
    pub fn terminator_successors(&self, term: Value) -> Result<Vec<Value>, IrError> {
        (0..self.num_successors(term)?)
            .map(|i| self.successor(term, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn setup() -> (Context, Value) {
        let mut ctx = Context::new();
        let block = ctx.create_block("entry", None, None).unwrap();
        (ctx, block)
    }

    #[test]
    fn test_mnemonics_round_trip() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_mnemonic(op.mnemonic()), Some(op));
        }
        for pred in CmpPredicate::ALL {
            assert_eq!(CmpPredicate::from_mnemonic(pred.mnemonic()), Some(pred));
        }
        assert_eq!(BinaryOp::from_mnemonic("fadd"), None);
    }

    #[test]
    fn test_opcode_terminators() {
        assert!(Opcode::Br.is_terminator());
        assert!(Opcode::Ret.is_terminator());
        assert!(!Opcode::Call.is_terminator());
        let allocated = <Type as crate::entity::EntityRef>::from_index(1);
        assert_eq!(InstKind::Alloca { allocated }.opcode(), Opcode::Alloca);
        assert!(InstKind::Ret.is_terminator());
    }

    #[test]
    fn test_binary_type_checks() {
        let (mut ctx, block) = setup();
        let one = ctx.const_int(1);
        let t = ctx.const_true();
        let f = ctx.const_false();

        let at = InsertPoint::AtEnd(block);
        assert!(ctx.create_binary(BinaryOp::Add, one, t, "", at).is_err());
        assert!(ctx.create_binary(BinaryOp::Add, t, f, "", at).is_err());
        let x = ctx.create_binary(BinaryOp::Xor, t, f, "x", at).unwrap();
        assert_eq!(ctx.value_type(x), ctx.bool_type());
        let s = ctx.create_binary(BinaryOp::Shl, one, one, "s", at).unwrap();
        assert_eq!(ctx.value_type(s), ctx.int_type());
        assert_eq!(ctx.block_insts(block).unwrap(), &[x, s]);
    }

    #[test]
    fn test_cmp_yields_bool() {
        let (mut ctx, block) = setup();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);
        let c = ctx
            .create_cmp(CmpPredicate::Lt, one, two, "c", InsertPoint::AtEnd(block))
            .unwrap();
        assert_eq!(ctx.value_type(c), ctx.bool_type());
        assert_eq!(ctx.inst_kind(c), Some(&InstKind::Cmp(CmpPredicate::Lt)));
    }

    #[test]
    fn test_memory_instruction_types() {
        let (mut ctx, block) = setup();
        let at = InsertPoint::AtEnd(block);
        let int = ctx.int_type();
        let slot = ctx.create_alloca(int, "slot", at).unwrap();
        assert_eq!(ctx.value_type(slot), ctx.pointer_type(int));

        let five = ctx.const_int(5);
        let store = ctx.create_store(five, slot, at).unwrap();
        assert_eq!(ctx.operand(store, 0).unwrap(), five);
        assert_eq!(ctx.operand(store, 1).unwrap(), slot);

        let load = ctx.create_load(slot, "v", at).unwrap();
        assert_eq!(ctx.value_type(load), int);

        let t = ctx.const_true();
        assert!(ctx.create_store(t, slot, at).is_err());
        assert!(ctx.create_load(five, "", at).is_err());
        let void = ctx.void_type();
        assert!(ctx.create_alloca(void, "", at).is_err());
    }

    #[test]
    fn test_gep_result_types() {
        let (mut ctx, block) = setup();
        let at = InsertPoint::AtEnd(block);
        let int = ctx.int_type();
        let boolean = ctx.bool_type();
        let arr = ctx.array_type(int, 4);
        let pair = ctx.struct_type(&[boolean, arr]);
        let base = ctx.create_alloca(pair, "p", at).unwrap();
        let zero = ctx.const_int(0);
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);

        let field = ctx.create_gep(base, &[zero, one], "f", at).unwrap();
        assert_eq!(ctx.value_type(field), ctx.pointer_type(arr));
        let elem = ctx.create_gep(base, &[zero, one, two], "e", at).unwrap();
        assert_eq!(ctx.value_type(elem), ctx.pointer_type(int));
        assert_eq!(
            ctx.inst_kind(elem),
            Some(&InstKind::GetElementPtr { source: pair })
        );

        assert!(ctx.create_gep(base, &[zero, two], "", at).is_err());
        assert!(ctx.create_gep(base, &[], "", at).is_err());
        let t = ctx.const_true();
        assert!(ctx.create_gep(base, &[t], "", at).is_err());
    }

    #[test]
    fn test_call_checks_signature() {
        let mut ctx = Context::new();
        let int = ctx.int_type();
        let sig = ctx.function_type(int, &[int, int]);
        let f = ctx.create_function(sig, "add", &["a", "b"]).unwrap();
        let one = ctx.const_int(1);
        let t = ctx.const_true();

        let call = ctx
            .create_call(f, &[one, one], "r", InsertPoint::Detached)
            .unwrap();
        assert_eq!(ctx.value_type(call), int);
        assert_eq!(ctx.operand(call, 0).unwrap(), f);
        assert!(ctx.create_call(f, &[one], "", InsertPoint::Detached).is_err());
        assert!(ctx
            .create_call(f, &[one, t], "", InsertPoint::Detached)
            .is_err());
        assert!(ctx.create_call(one, &[], "", InsertPoint::Detached).is_err());
    }

    #[test]
    fn test_intrinsic_call_accepts_any_pointer() {
        let (mut ctx, block) = setup();
        let at = InsertPoint::AtEnd(block);
        let memcpy = ctx.declare_intrinsic(crate::function::Intrinsic::MemCpy);
        let int = ctx.int_type();
        let arr = ctx.array_type(int, 2);
        let dst = ctx.create_alloca(arr, "dst", at).unwrap();
        let src = ctx.create_alloca(arr, "src", at).unwrap();
        let len = ctx.const_int(16);
        assert!(ctx.create_call(memcpy, &[dst, src, len], "", at).is_ok());
    }

    #[test]
    fn test_branch_successors() {
        let (mut ctx, entry) = setup();
        let a = ctx.create_block("a", None, None).unwrap();
        let b = ctx.create_block("b", None, None).unwrap();
        let t = ctx.const_true();
        let br = ctx
            .create_cond_br(t, a, b, InsertPoint::AtEnd(entry))
            .unwrap();

        assert_eq!(ctx.num_successors(br).unwrap(), 2);
        assert_eq!(ctx.successor(br, 0).unwrap(), a);
        assert_eq!(ctx.terminator_successors(br).unwrap(), vec![a, b]);

        ctx.set_successor(br, 1, a).unwrap();
        assert_eq!(ctx.successor(br, 1).unwrap(), a);
        assert_eq!(ctx.use_count(b), 0);
        assert!(ctx.successor(br, 2).is_err());

        let one = ctx.const_int(1);
        assert!(ctx.set_successor(br, 0, one).is_err());
        let ret = ctx.create_ret(None, InsertPoint::AtEnd(a)).unwrap();
        assert_eq!(ctx.num_successors(ret).unwrap(), 0);
    }

    #[test]
    fn test_successor_of_non_terminator() {
        let (mut ctx, block) = setup();
        let one = ctx.const_int(1);
        let add = ctx
            .create_binary(BinaryOp::Add, one, one, "", InsertPoint::AtEnd(block))
            .unwrap();
        assert_eq!(ctx.successor(add, 0), Err(IrError::NotATerminator(add)));
        assert_eq!(ctx.num_successors(add), Err(IrError::NotATerminator(add)));
    }

    #[test]
    fn test_phi_incoming() {
        let (mut ctx, entry) = setup();
        let other = ctx.create_block("other", None, None).unwrap();
        let int = ctx.int_type();
        let phi = ctx.create_phi(int, "x", InsertPoint::Detached).unwrap();
        let one = ctx.const_int(1);
        let two = ctx.const_int(2);

        ctx.add_incoming(phi, one, entry).unwrap();
        ctx.add_incoming(phi, two, other).unwrap();
        assert_eq!(ctx.num_incoming(phi).unwrap(), 2);
        assert_eq!(ctx.incoming_value(phi, 1).unwrap(), two);
        assert_eq!(ctx.incoming_block(phi, 0).unwrap(), entry);

        ctx.remove_incoming(phi, 0).unwrap();
        assert_eq!(ctx.num_incoming(phi).unwrap(), 1);
        assert_eq!(ctx.incoming_block(phi, 0).unwrap(), other);
        assert_eq!(ctx.use_count(entry), 0);
        assert!(ctx.incoming_value(phi, 1).is_err());

        let t = ctx.const_true();
        assert!(ctx.add_incoming(phi, t, entry).is_err());
        assert!(ctx.add_incoming(one, one, entry).is_err());
    }

    #[test]
    fn test_insert_move_remove() {
        let (mut ctx, block) = setup();
        let one = ctx.const_int(1);
        let at = InsertPoint::AtEnd(block);
        let a = ctx.create_binary(BinaryOp::Add, one, one, "a", at).unwrap();
        let c = ctx.create_binary(BinaryOp::Mul, one, one, "c", at).unwrap();
        let b = ctx
            .create_binary(BinaryOp::Sub, one, one, "b", InsertPoint::Before(c))
            .unwrap();
        let d = ctx
            .create_binary(BinaryOp::Or, one, one, "d", InsertPoint::After(c))
            .unwrap();
        assert_eq!(ctx.block_insts(block).unwrap(), &[a, b, c, d]);

        ctx.move_before(d, a).unwrap();
        assert_eq!(ctx.block_insts(block).unwrap(), &[d, a, b, c]);

        ctx.remove_from_parent(b).unwrap();
        assert_eq!(ctx.block_insts(block).unwrap(), &[d, a, c]);
        assert_eq!(ctx.inst_parent(b).unwrap(), None);
        assert!(ctx.contains_value(b));
        assert_eq!(ctx.insert_after(b, b), Err(IrError::NoParent(b)));

        ctx.insert_after(b, c).unwrap();
        assert_eq!(ctx.block_insts(block).unwrap(), &[d, a, c, b]);
        assert_eq!(ctx.insert_before(b, a), Err(IrError::AlreadyInserted(b)));
    }

    #[test]
    fn test_erase_refused_while_used() {
        let (mut ctx, block) = setup();
        let one = ctx.const_int(1);
        let at = InsertPoint::AtEnd(block);
        let a = ctx.create_binary(BinaryOp::Add, one, one, "a", at).unwrap();
        let b = ctx.create_binary(BinaryOp::Add, a, one, "b", at).unwrap();

        assert_eq!(
            ctx.erase_from_parent(a),
            Err(IrError::ValueStillInUse { value: a, uses: 1 })
        );
        ctx.erase_from_parent(b).unwrap();
        assert!(!ctx.contains_value(b));
        assert_eq!(ctx.use_count(one), 2);
        ctx.erase_from_parent(a).unwrap();
        assert_eq!(ctx.use_count(one), 0);
        assert!(ctx.block_insts(block).unwrap().is_empty());
    }
}
