//! Textual form of the IR.
//!
//! The format is LLVM-like:
//!
//! ```text
//! %Pair = type { int, bool }
//!
//! @g = global int 5
//!
//! define int @add(int %a, int %b) {
//! entry:
//!   %sum = add int %a, %b
//!   ret int %sum
//! }
//! ```
//!
//! Unnamed arguments, blocks and non-void results are numbered `%0`, `%1`,
//! ... per function, in definition order. The reader in [`crate::parser`]
//! accepts everything written here.

use alloc::collections::BTreeMap;
use core::fmt::{self, Write};

use crate::{
    constant::ConstantData,
    context::Context,
    entity::{Type, Use, Value},
    inst::InstKind,
    types::{DisplayType, TypeData},
    value::ValueKind,
};

/// Sequential numbers for unnamed values of one function or block.
#[derive(Debug, Default)]
struct SlotTracker {
    slots: BTreeMap<Value, u32>,
}

impl SlotTracker {
    fn assign(&mut self, value: Value) {
        let next = self.slots.len() as u32;
        self.slots.entry(value).or_insert(next);
    }

    fn for_function(ctx: &Context, func: Value) -> Self {
        let mut tracker = Self::default();
        for arg in ctx.arguments(func).unwrap_or_default() {
            if ctx.name(*arg).is_none() {
                tracker.assign(*arg);
            }
        }
        for block in ctx.blocks(func).unwrap_or_default() {
            tracker.add_block(ctx, *block);
        }
        tracker
    }

    fn for_block(ctx: &Context, block: Value) -> Self {
        let mut tracker = Self::default();
        tracker.add_block(ctx, block);
        tracker
    }

    fn add_block(&mut self, ctx: &Context, block: Value) {
        if ctx.name(block).is_none() {
            self.assign(block);
        }
        for inst in ctx.block_insts(block).unwrap_or_default() {
            if ctx.name(*inst).is_none() && ctx.value_type(*inst) != ctx.void_type() {
                self.assign(*inst);
            }
        }
    }

    /// Tracker for whatever function or block encloses `value`
    fn enclosing(ctx: &Context, value: Value) -> Self {
        let block = match ctx.kind(value) {
            ValueKind::Instruction(inst) => inst.parent(),
            ValueKind::BasicBlock(_) => Some(value),
            ValueKind::Argument(arg) => {
                return arg
                    .parent()
                    .map_or_else(Self::default, |f| Self::for_function(ctx, f))
            }
            _ => None,
        };
        match block {
            Some(block) => match ctx.block_parent(block).ok().flatten() {
                Some(func) => Self::for_function(ctx, func),
                None => Self::for_block(ctx, block),
            },
            None => Self::default(),
        }
    }
}

struct Printer<'a> {
    ctx: &'a Context,
    slots: SlotTracker,
}

impl<'a> Printer<'a> {
    fn ty(&self, ty: Type) -> DisplayType<'a> {
        self.ctx.types.display(ty)
    }

    /// Local name after the `%` sigil
    fn local(&self, f: &mut dyn Write, value: Value) -> fmt::Result {
        match self.ctx.name(value) {
            Some(name) => write!(f, "%{}", name),
            None => match self.slots.slots.get(&value) {
                Some(slot) => write!(f, "%{}", slot),
                None => write!(f, "%<badref {}>", value),
            },
        }
    }

    /// Operand without its type
    fn operand(&self, f: &mut dyn Write, value: Value) -> fmt::Result {
        let Some(data) = self.ctx.value_data(value) else {
            return write!(f, "<stale {}>", value);
        };
        match data.kind() {
            ValueKind::Constant(ConstantData::Int(n)) => write!(f, "{}", n),
            ValueKind::Constant(ConstantData::Bool(b)) => write!(f, "{}", b),
            ValueKind::Constant(ConstantData::Null) => write!(f, "null"),
            ValueKind::Constant(ConstantData::Undef) => write!(f, "undef"),
            ValueKind::Constant(ConstantData::Aggregate) => {
                let (open, close) = match self.ctx.type_data(data.ty()) {
                    TypeData::Array { .. } => ("[", "]"),
                    _ => ("{ ", " }"),
                };
                f.write_str(open)?;
                for (i, u) in data.operands().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.use_operand(f, *u, true)?;
                }
                f.write_str(close)
            }
            ValueKind::Function(_) | ValueKind::GlobalVariable(_) => match data.name() {
                Some(name) => write!(f, "@{}", name),
                None => write!(f, "@<anon {}>", value),
            },
            _ => self.local(f, value),
        }
    }

    fn typed(&self, f: &mut dyn Write, value: Value) -> fmt::Result {
        write!(f, "{} ", self.ty(self.ctx.value_type(value)))?;
        self.operand(f, value)
    }

    fn use_operand(&self, f: &mut dyn Write, u: Use, typed: bool) -> fmt::Result {
        match self.ctx.use_value(u) {
            Some(value) if typed => self.typed(f, value),
            Some(value) => self.operand(f, value),
            None => f.write_str("<null>"),
        }
    }

    fn nth(&self, f: &mut dyn Write, ops: &[Use], index: usize, typed: bool) -> fmt::Result {
        match ops.get(index) {
            Some(u) => self.use_operand(f, *u, typed),
            None => f.write_str("<missing>"),
        }
    }

    fn operands(&self, f: &mut dyn Write, inst: Value, from: usize) -> fmt::Result {
        for (i, u) in self.ctx.operands(inst).iter().enumerate().skip(from) {
            if i > from {
                f.write_str(", ")?;
            }
            self.use_operand(f, *u, true)?;
        }
        Ok(())
    }

    fn inst(&self, f: &mut dyn Write, inst: Value) -> fmt::Result {
        let ctx = self.ctx;
        let Some(kind) = ctx.inst_kind(inst) else {
            return self.typed(f, inst);
        };
        let ty = ctx.value_type(inst);
        if ty != ctx.void_type() {
            self.local(f, inst)?;
            f.write_str(" = ")?;
        }
        let ops = ctx.operands(inst);
        match kind {
            InstKind::Binary(op) => {
                write!(f, "{} {} ", op.mnemonic(), self.ty(ty))?;
                self.nth(f, ops, 0, false)?;
                f.write_str(", ")?;
                self.nth(f, ops, 1, false)
            }
            InstKind::Cmp(pred) => {
                let operand_ty = ops
                    .first()
                    .and_then(|u| ctx.use_value(*u))
                    .map(|v| ctx.value_type(v));
                match operand_ty {
                    Some(operand_ty) => write!(f, "cmp {} {} ", pred.mnemonic(), self.ty(operand_ty))?,
                    None => write!(f, "cmp {} ", pred.mnemonic())?,
                }
                self.nth(f, ops, 0, false)?;
                f.write_str(", ")?;
                self.nth(f, ops, 1, false)
            }
            InstKind::Alloca { allocated } => write!(f, "alloca {}", self.ty(*allocated)),
            InstKind::Load => {
                write!(f, "load {}, ", self.ty(ty))?;
                self.nth(f, ops, 0, true)
            }
            InstKind::Store => {
                f.write_str("store ")?;
                self.operands(f, inst, 0)
            }
            InstKind::GetElementPtr { source } => {
                write!(f, "getelementptr {}, ", self.ty(*source))?;
                self.operands(f, inst, 0)
            }
            InstKind::Phi => {
                write!(f, "phi {}", self.ty(ty))?;
                for (i, pair) in ops.chunks(2).enumerate() {
                    f.write_str(if i == 0 { " [ " } else { ", [ " })?;
                    self.nth(f, pair, 0, false)?;
                    if let Some(block) = pair.get(1) {
                        f.write_str(", ")?;
                        self.use_operand(f, *block, false)?;
                    }
                    f.write_str(" ]")?;
                }
                Ok(())
            }
            InstKind::Call => {
                write!(f, "call {} ", self.ty(ty))?;
                self.nth(f, ops, 0, false)?;
                f.write_str("(")?;
                self.operands(f, inst, 1)?;
                f.write_str(")")
            }
            InstKind::Br => {
                f.write_str("br ")?;
                self.operands(f, inst, 0)
            }
            InstKind::Ret => match ops.first() {
                Some(u) => {
                    f.write_str("ret ")?;
                    self.use_operand(f, *u, true)
                }
                None => f.write_str("ret void"),
            },
        }
    }

    fn block(&self, f: &mut dyn Write, block: Value) -> fmt::Result {
        match self.ctx.name(block) {
            Some(name) => writeln!(f, "{}:", name)?,
            None => match self.slots.slots.get(&block) {
                Some(slot) => writeln!(f, "{}:", slot)?,
                None => writeln!(f, "<badref {}>:", block)?,
            },
        }
        for inst in self.ctx.block_insts(block).unwrap_or_default() {
            f.write_str("  ")?;
            self.inst(f, *inst)?;
            f.write_str("\n")?;
        }
        Ok(())
    }

    fn function(&self, f: &mut dyn Write, func: Value) -> fmt::Result {
        let ctx = self.ctx;
        let ret = ctx.return_type(func).map_err(|_| fmt::Error)?;
        let declaration = ctx.is_declaration(func).map_err(|_| fmt::Error)?;
        write!(
            f,
            "{} {} ",
            if declaration { "declare" } else { "define" },
            self.ty(ret)
        )?;
        self.operand(f, func)?;
        f.write_str("(")?;
        for (i, arg) in ctx.arguments(func).unwrap_or_default().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if declaration {
                write!(f, "{}", self.ty(ctx.value_type(*arg)))?;
            } else {
                self.typed(f, *arg)?;
            }
        }
        f.write_str(")")?;
        if declaration {
            return f.write_str("\n");
        }
        f.write_str(" {\n")?;
        for (i, block) in ctx.blocks(func).unwrap_or_default().iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            self.block(f, *block)?;
        }
        f.write_str("}\n")
    }

    fn global(&self, f: &mut dyn Write, global: Value) -> fmt::Result {
        let ctx = self.ctx;
        let value_type = ctx.global_data(global).map_err(|_| fmt::Error)?.value_type();
        self.operand(f, global)?;
        write!(f, " = global {} ", self.ty(value_type))?;
        match ctx.global_initializer(global).ok().flatten() {
            Some(init) => self.operand(f, init)?,
            None => f.write_str("zeroinitializer")?,
        }
        f.write_str("\n")
    }

    fn value(&self, f: &mut dyn Write, value: Value) -> fmt::Result {
        match self.ctx.value_data(value).map(|data| data.kind()) {
            Some(ValueKind::Function(_)) => self.function(f, value),
            Some(ValueKind::GlobalVariable(_)) => self.global(f, value),
            Some(ValueKind::BasicBlock(_)) => self.block(f, value),
            Some(ValueKind::Instruction(_)) => self.inst(f, value),
            Some(_) => self.typed(f, value),
            None => write!(f, "<stale {}>", value),
        }
    }
}

/// Formats a value in the textual IR syntax.
pub struct DisplayValue<'a> {
    ctx: &'a Context,
    value: Value,
}

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = match self.ctx.value_data(self.value) {
            Some(_) => SlotTracker::enclosing(self.ctx, self.value),
            None => SlotTracker::default(),
        };
        let printer = Printer {
            ctx: self.ctx,
            slots,
        };
        printer.value(f, self.value)
    }
}

impl Context {
    /// Display adapter for a value: full text for functions, globals, blocks
    /// and instructions, `type operand` for everything else
    pub fn display(&self, value: Value) -> DisplayValue<'_> {
        DisplayValue { ctx: self, value }
    }

    /// Display adapter for a type
    pub fn display_type(&self, ty: Type) -> DisplayType<'_> {
        self.types.display(ty)
    }

    /// Write named struct definitions, then `items` separated by blank lines
    pub fn write_module(&self, f: &mut dyn Write, items: &[Value]) -> fmt::Result {
        let mut first = true;
        for (name, ty) in self.types.named_structs() {
            let TypeData::Struct { fields, .. } = self.types.data(ty) else {
                continue;
            };
            write!(f, "%{} = type {{", name)?;
            for (i, field) in fields.iter().enumerate() {
                f.write_str(if i == 0 { " " } else { ", " })?;
                write!(f, "{}", self.types.display(*field))?;
            }
            f.write_str(if fields.is_empty() { "}\n" } else { " }\n" })?;
            first = false;
        }
        for item in items {
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            let printer = Printer {
                ctx: self,
                slots: match self.value_data(*item) {
                    Some(_) => SlotTracker::enclosing(self, *item),
                    None => SlotTracker::default(),
                },
            };
            printer.value(f, *item)?;
        }
        Ok(())
    }
}
