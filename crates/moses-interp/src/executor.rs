//! Instruction semantics.

use alloc::{format, string::String, vec::Vec};

use moses_ir::{BinaryOp, CmpPredicate, InstKind, Intrinsic, IrError, Opcode, TypeData, Value};
use tracing::{info, trace};

use crate::{
    error::{ExecError, Trap},
    interpreter::{storage_size, Flow, Interpreter},
    value::GenericValue,
};

fn mismatch(context: &'static str, expected: &str, found: GenericValue) -> ExecError {
    IrError::TypeMismatch {
        context,
        expected: String::from(expected),
        found: format!("{:?}", found),
    }
    .into()
}

fn expect_pointer(value: GenericValue) -> Result<u64, ExecError> {
    value
        .as_pointer()
        .ok_or_else(|| mismatch("pointer operand", "a pointer", value))
}

fn expect_int(value: GenericValue) -> Result<i64, ExecError> {
    value
        .as_int()
        .ok_or_else(|| mismatch("integer operand", "an int", value))
}

/// `lhs op rhs` with wrapping 64-bit integer semantics
pub(crate) fn binary(op: BinaryOp, lhs: GenericValue, rhs: GenericValue) -> Result<GenericValue, ExecError> {
    match (lhs, rhs) {
        (GenericValue::Int(a), GenericValue::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(Trap::DivisionByZero.into()),
                BinaryOp::Div => a.wrapping_div(b),
                BinaryOp::Rem => a.wrapping_rem(b),
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                BinaryOp::Xor => a ^ b,
                BinaryOp::Shl => a.wrapping_shl((b & 63) as u32),
                BinaryOp::Shr => a.wrapping_shr((b & 63) as u32),
            };
            Ok(GenericValue::Int(result))
        }
        (GenericValue::Bool(a), GenericValue::Bool(b)) if op.is_logical() => {
            Ok(GenericValue::Bool(match op {
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                _ => a ^ b,
            }))
        }
        (lhs, _) => Err(mismatch("binary operands", "two ints or two bools", lhs)),
    }
}

fn compare<T: Ord>(pred: CmpPredicate, a: T, b: T) -> bool {
    match pred {
        CmpPredicate::Eq => a == b,
        CmpPredicate::Ne => a != b,
        CmpPredicate::Lt => a < b,
        CmpPredicate::Le => a <= b,
        CmpPredicate::Gt => a > b,
        CmpPredicate::Ge => a >= b,
    }
}

/// Signed for ints, by value for bools, by address for pointers
pub(crate) fn cmp(pred: CmpPredicate, lhs: GenericValue, rhs: GenericValue) -> Result<bool, ExecError> {
    match (lhs, rhs) {
        (GenericValue::Int(a), GenericValue::Int(b)) => Ok(compare(pred, a, b)),
        (GenericValue::Bool(a), GenericValue::Bool(b)) => Ok(compare(pred, a, b)),
        (GenericValue::Pointer(a), GenericValue::Pointer(b)) => Ok(compare(pred, a, b)),
        (lhs, _) => Err(mismatch("cmp operands", "two values of one type", lhs)),
    }
}

impl<'ctx> Interpreter<'ctx> {
    /// Execute one instruction of the current frame
    pub(crate) fn execute(&mut self, inst: Value) -> Result<Flow, ExecError> {
        let ctx = self.ctx;
        let Some(kind) = ctx.inst_kind(inst) else {
            return Err(IrError::WrongKind {
                value: inst,
                expected: "an instruction",
            }
            .into());
        };

        match *kind {
            InstKind::Binary(op) => {
                let lhs = self.operand(inst, 0)?;
                let rhs = self.operand(inst, 1)?;
                let result = binary(op, lhs, rhs)?;
                self.bind(inst, result);
            }
            InstKind::Cmp(pred) => {
                let lhs = self.operand(inst, 0)?;
                let rhs = self.operand(inst, 1)?;
                let result = cmp(pred, lhs, rhs)?;
                self.bind(inst, GenericValue::Bool(result));
            }
            InstKind::Alloca { allocated } => {
                let size = storage_size(ctx, allocated)?;
                let base = self.memory.allocate(size)?;
                if let Some(frame) = self.stack.last_mut() {
                    frame.allocations.push(base);
                }
                self.bind(inst, GenericValue::Pointer(base));
            }
            InstKind::Load => {
                let ty = ctx.value_type(inst);
                if ctx.types().is_aggregate(ty) {
                    return Err(Trap::AggregateByValue.into());
                }
                let address = expect_pointer(self.operand(inst, 0)?)?;
                let word = self.memory.read_word(address)?;
                let value = GenericValue::from_word(ctx, ty, word).ok_or(IrError::InvalidType {
                    reason: "load of a type without a runtime value",
                })?;
                self.bind(inst, value);
            }
            InstKind::Store => {
                let stored = ctx.operand(inst, 0)?;
                if ctx.types().is_aggregate(ctx.value_type(stored)) {
                    return Err(Trap::AggregateByValue.into());
                }
                let value = self.resolve(stored)?;
                let address = expect_pointer(self.operand(inst, 1)?)?;
                self.memory.write_word(address, value.to_word())?;
            }
            InstKind::GetElementPtr { source } => {
                let address = self.gep(inst, source)?;
                self.bind(inst, GenericValue::Pointer(address));
            }
            InstKind::Phi => return Err(Trap::UnsupportedInstruction(Opcode::Phi).into()),
            InstKind::Call => self.call(inst)?,
            InstKind::Br => {
                let dest = if ctx.num_operands(inst) == 3 {
                    let cond = self.operand(inst, 0)?;
                    let taken = cond
                        .as_bool()
                        .ok_or_else(|| mismatch("branch condition", "a bool", cond))?;
                    ctx.operand(inst, if taken { 1 } else { 2 })?
                } else {
                    ctx.operand(inst, 0)?
                };
                if !ctx.is_block(dest) {
                    return Err(IrError::WrongKind {
                        value: dest,
                        expected: "a basic block",
                    }
                    .into());
                }
                trace!(%dest, "branch");
                if let Some(frame) = self.stack.last_mut() {
                    frame.jump(dest);
                }
            }
            InstKind::Ret => {
                let value = if ctx.num_operands(inst) > 0 {
                    Some(self.operand(inst, 0)?)
                } else {
                    None
                };
                self.pop_frame(value);
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    /// Address computed by a `getelementptr`
    fn gep(&mut self, inst: Value, source: moses_ir::Type) -> Result<u64, ExecError> {
        let ctx = self.ctx;
        let mut address = expect_pointer(self.operand(inst, 0)?)? as i64;
        let first = expect_int(self.operand(inst, 1)?)?;
        address = address.wrapping_add(first.wrapping_mul(storage_size(ctx, source)? as i64));

        let mut current = source;
        for index in 2..ctx.num_operands(inst) {
            match ctx.type_data(current) {
                TypeData::Struct { fields, .. } => {
                    let field = ctx
                        .as_const_int(ctx.operand(inst, index)?)
                        .filter(|field| *field >= 0 && (*field as usize) < fields.len())
                        .ok_or(IrError::InvalidType {
                            reason: "struct field index must be an in-range constant",
                        })? as usize;
                    let offset = ctx.field_offset(current, field).ok_or(IrError::InvalidType {
                        reason: "struct field without an offset",
                    })?;
                    address = address.wrapping_add(offset as i64);
                    current = fields[field];
                }
                TypeData::Array { element, .. } => {
                    let position = expect_int(self.operand(inst, index)?)?;
                    let stride = storage_size(ctx, *element)? as i64;
                    address = address.wrapping_add(position.wrapping_mul(stride));
                    current = *element;
                }
                _ => {
                    return Err(IrError::InvalidType {
                        reason: "getelementptr index into a non-aggregate type",
                    }
                    .into())
                }
            }
        }
        Ok(address as u64)
    }

    fn call(&mut self, inst: Value) -> Result<(), ExecError> {
        let ctx = self.ctx;
        let callee = ctx.operand(inst, 0)?;
        if !ctx.is_function(callee) {
            return Err(Trap::NotAFunction(callee).into());
        }
        let args = (1..ctx.num_operands(inst))
            .map(|index| self.operand(inst, index))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(intrinsic) = ctx.intrinsic(callee) {
            return self.call_intrinsic(intrinsic, &args);
        }
        if ctx.is_declaration(callee)? {
            return Err(Trap::UndefinedFunction(callee).into());
        }
        if ctx.param_types(callee)?.len() != args.len() {
            return Err(Trap::ArgumentMismatch {
                reason: "wrong number of arguments",
            }
            .into());
        }
        self.push_frame(callee, Some(inst), &args)
    }

    /// Run a built-in function
    pub(crate) fn call_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        args: &[GenericValue],
    ) -> Result<(), ExecError> {
        match (intrinsic, args) {
            (Intrinsic::PrintInt, [GenericValue::Int(n)]) => {
                info!(value = *n, "print");
                self.output.push_str(&format!("{}\n", n));
            }
            (Intrinsic::PrintBool, [GenericValue::Bool(b)]) => {
                info!(value = *b, "print");
                self.output.push_str(if *b { "true\n" } else { "false\n" });
            }
            (
                Intrinsic::MemCpy,
                [GenericValue::Pointer(dst), GenericValue::Pointer(src), GenericValue::Int(len)],
            ) => {
                if *len < 0 {
                    return Err(Trap::ArgumentMismatch {
                        reason: "negative memcpy length",
                    }
                    .into());
                }
                self.memory.copy(*dst, *src, *len as u64)?;
            }
            _ => {
                return Err(Trap::ArgumentMismatch {
                    reason: "intrinsic called with the wrong arguments",
                }
                .into())
            }
        }
        Ok(())
    }
}
