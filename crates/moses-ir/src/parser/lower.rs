//! Name resolution: turns the syntax tree into values of a fresh module.
//!
//! Items are lowered in passes so that everything at the top level may be
//! referenced before it is defined: named struct names, then struct bodies,
//! then globals and function signatures, then initializers, then bodies.
//! Inside a body, a local used before its definition is bound to a
//! placeholder that is replaced with `replace_all_uses_with` once the
//! definition is seen.

use alloc::{
    collections::BTreeMap,
    format,
    string::{String, ToString},
    vec::Vec,
};

use super::{
    error::ParseError,
    syntax::{BlockAst, FunctionAst, InstAst, InstOp, ItemAst, Operand, TypeExpr, Typed},
};
use crate::{
    entity::{Type, Value},
    error::IrError,
    function::Intrinsic,
    inst::InsertPoint,
    module::Module,
};

/// Numeric names are slots assigned by the printer; they stay unnamed
fn value_name(name: &str) -> &str {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        ""
    } else {
        name
    }
}

#[derive(Debug, Default)]
struct Scope {
    locals: BTreeMap<String, Value>,
    /// Placeholder and first use position of names not yet defined
    pending: BTreeMap<String, (Value, usize)>,
}

struct Lowerer {
    source_len: usize,
    module: Module,
    globals: BTreeMap<String, Value>,
}

impl Lowerer {
    fn error(&self, rest: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.source_len.saturating_sub(rest),
        }
    }

    /// Converts an IR error into a parse error at `rest`
    fn lift(&self, rest: usize) -> impl Fn(IrError) -> ParseError {
        let source_len = self.source_len;
        move |err| ParseError {
            message: err.to_string(),
            position: source_len.saturating_sub(rest),
        }
    }

    fn resolve_type(&mut self, ty: &TypeExpr, rest: usize) -> Result<Type, ParseError> {
        let resolved = match ty {
            TypeExpr::Void => self.module.context.void_type(),
            TypeExpr::Int => self.module.context.int_type(),
            TypeExpr::Bool => self.module.context.bool_type(),
            TypeExpr::Label => self.module.context.label_type(),
            TypeExpr::Named(name) => match self.module.context.types().lookup_struct(name) {
                Some(ty) => ty,
                None => return Err(self.error(rest, format!("unknown type %{}", name))),
            },
            TypeExpr::Pointer(pointee) => {
                let pointee = self.resolve_type(pointee, rest)?;
                self.module.context.pointer_type(pointee)
            }
            TypeExpr::Array(len, element) => {
                let element = self.resolve_type(element, rest)?;
                self.module.context.array_type(element, *len)
            }
            TypeExpr::Struct(fields) => {
                let fields = self.resolve_types(fields, rest)?;
                self.module.context.struct_type(&fields)
            }
            TypeExpr::Function(ret, params) => {
                let ret = self.resolve_type(ret, rest)?;
                let params = self.resolve_types(params, rest)?;
                self.module.context.function_type(ret, &params)
            }
        };
        Ok(resolved)
    }

    fn resolve_types(&mut self, types: &[TypeExpr], rest: usize) -> Result<Vec<Type>, ParseError> {
        types.iter().map(|ty| self.resolve_type(ty, rest)).collect()
    }

    fn expect_type(&self, expected: Type, value: Value, rest: usize) -> Result<(), ParseError> {
        let ctx = &self.module.context;
        let found = ctx.value_type(value);
        if found == expected {
            return Ok(());
        }
        Err(self.error(
            rest,
            format!(
                "type mismatch: expected {}, found {}",
                ctx.display_type(expected),
                ctx.display_type(found)
            ),
        ))
    }

    fn declare_global(&mut self, name: &str, value: Value, rest: usize) -> Result<(), ParseError> {
        if self.globals.contains_key(name) {
            return Err(self.error(rest, format!("redefinition of @{}", name)));
        }
        self.globals.insert(name.to_string(), value);
        Ok(())
    }

    /// `@name`; intrinsics may be used without a declaration
    fn global(&mut self, name: &str, rest: usize) -> Result<Value, ParseError> {
        if let Some(value) = self.globals.get(name) {
            return Ok(*value);
        }
        match Intrinsic::from_name(name) {
            Some(intrinsic) => {
                let func = self.module.context.declare_intrinsic(intrinsic);
                self.globals.insert(name.to_string(), func);
                Ok(func)
            }
            None => Err(self.error(rest, format!("use of undefined global @{}", name))),
        }
    }

    /// Operand of type `ty`; without a scope only constants and globals resolve
    fn operand(
        &mut self,
        scope: Option<&mut Scope>,
        ty: Type,
        operand: &Operand,
        rest: usize,
    ) -> Result<Value, ParseError> {
        let value = match operand {
            Operand::Local(name) => {
                let Some(scope) = scope else {
                    return Err(self.error(rest, format!("local %{} used outside a function", name)));
                };
                if let Some(value) = scope.locals.get(name) {
                    *value
                } else if let Some((placeholder, _)) = scope.pending.get(name) {
                    *placeholder
                } else {
                    let placeholder = self.module.context.placeholder(ty);
                    scope.pending.insert(name.clone(), (placeholder, rest));
                    placeholder
                }
            }
            Operand::Global(name) => self.global(name, rest)?,
            Operand::Int(n) => self.module.context.const_int(*n),
            Operand::Bool(b) => self.module.context.const_bool(*b),
            Operand::Null => self
                .module
                .context
                .const_null(ty)
                .map_err(self.lift(rest))?,
            Operand::Undef => self.module.context.undef(ty),
            Operand::Aggregate(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for (element_ty, element) in elements {
                    let element_ty = self.resolve_type(element_ty, rest)?;
                    values.push(self.operand(None, element_ty, element, rest)?);
                }
                self.module
                    .context
                    .const_aggregate(ty, &values)
                    .map_err(self.lift(rest))?
            }
        };
        self.expect_type(ty, value, rest)?;
        Ok(value)
    }

    fn typed(&mut self, scope: &mut Scope, (ty, operand): &Typed, rest: usize) -> Result<Value, ParseError> {
        let ty = self.resolve_type(ty, rest)?;
        self.operand(Some(scope), ty, operand, rest)
    }

    fn label(&self, scope: &Scope, name: &str, rest: usize) -> Result<Value, ParseError> {
        match scope.locals.get(name) {
            Some(block) if self.module.context.is_block(*block) => Ok(*block),
            _ => Err(self.error(rest, format!("undefined label %{}", name))),
        }
    }

    /// Bind `name`, resolving any earlier forward references to it
    fn define(&mut self, scope: &mut Scope, name: &str, value: Value, rest: usize) -> Result<(), ParseError> {
        if scope.locals.contains_key(name) {
            return Err(self.error(rest, format!("redefinition of %{}", name)));
        }
        if let Some((placeholder, _)) = scope.pending.remove(name) {
            self.module
                .context
                .replace_all_uses_with(placeholder, value)
                .map_err(self.lift(rest))?;
            self.module
                .context
                .free_value(placeholder)
                .map_err(self.lift(rest))?;
        }
        scope.locals.insert(name.to_string(), value);
        Ok(())
    }

    fn finish(&self, scope: Scope) -> Result<(), ParseError> {
        match scope.pending.into_iter().next() {
            Some((name, (_, rest))) => Err(self.error(rest, format!("use of undefined value %{}", name))),
            None => Ok(()),
        }
    }

    fn lower_inst(&mut self, scope: &mut Scope, block: Value, inst: &InstAst) -> Result<(), ParseError> {
        let rest = inst.rest;
        let at = InsertPoint::AtEnd(block);
        let name = inst.result.as_deref().map_or("", value_name);
        let value = match &inst.op {
            InstOp::Binary(op, ty, lhs, rhs) => {
                let ty = self.resolve_type(ty, rest)?;
                let lhs = self.operand(Some(&mut *scope), ty, lhs, rest)?;
                let rhs = self.operand(Some(&mut *scope), ty, rhs, rest)?;
                self.module
                    .context
                    .create_binary(*op, lhs, rhs, name, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Cmp(pred, ty, lhs, rhs) => {
                let ty = self.resolve_type(ty, rest)?;
                let lhs = self.operand(Some(&mut *scope), ty, lhs, rest)?;
                let rhs = self.operand(Some(&mut *scope), ty, rhs, rest)?;
                self.module
                    .context
                    .create_cmp(*pred, lhs, rhs, name, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Alloca(ty) => {
                let ty = self.resolve_type(ty, rest)?;
                self.module
                    .context
                    .create_alloca(ty, name, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Load(ty, ptr) => {
                let ty = self.resolve_type(ty, rest)?;
                let ptr = self.typed(scope, ptr, rest)?;
                let load = self
                    .module
                    .context
                    .create_load(ptr, name, at)
                    .map_err(self.lift(rest))?;
                self.expect_type(ty, load, rest)?;
                load
            }
            InstOp::Store(value, ptr) => {
                let value = self.typed(scope, value, rest)?;
                let ptr = self.typed(scope, ptr, rest)?;
                self.module
                    .context
                    .create_store(value, ptr, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Gep(source, operands) => {
                let source = self.resolve_type(source, rest)?;
                let Some((base, indices)) = operands.split_first() else {
                    return Err(self.error(rest, "getelementptr needs a base pointer"));
                };
                let base = self.typed(scope, base, rest)?;
                let pointee = self.module.context.pointee(self.module.context.value_type(base));
                if pointee != Some(source) {
                    return Err(self.error(rest, "getelementptr source type does not match the base pointer"));
                }
                let mut values = Vec::with_capacity(indices.len());
                for index in indices {
                    values.push(self.typed(scope, index, rest)?);
                }
                self.module
                    .context
                    .create_gep(base, &values, name, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Phi(ty, incoming) => {
                let ty = self.resolve_type(ty, rest)?;
                let phi = self
                    .module
                    .context
                    .create_phi(ty, name, at)
                    .map_err(self.lift(rest))?;
                for (value, label) in incoming {
                    let value = self.operand(Some(&mut *scope), ty, value, rest)?;
                    let pred = self.label(scope, label, rest)?;
                    self.module
                        .context
                        .add_incoming(phi, value, pred)
                        .map_err(self.lift(rest))?;
                }
                phi
            }
            InstOp::Call(ret, callee, args) => {
                let ret = self.resolve_type(ret, rest)?;
                let callee = match callee {
                    Operand::Global(callee) => self.global(callee, rest)?,
                    Operand::Local(callee) => match scope.locals.get(callee) {
                        Some(value) => *value,
                        None => return Err(self.error(rest, format!("use of undefined value %{}", callee))),
                    },
                    _ => return Err(self.error(rest, "callee must be a named value")),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.typed(scope, arg, rest)?);
                }
                let call = self
                    .module
                    .context
                    .create_call(callee, &values, name, at)
                    .map_err(self.lift(rest))?;
                self.expect_type(ret, call, rest)?;
                call
            }
            InstOp::Br(dest) => {
                let dest = self.label(scope, dest, rest)?;
                self.module
                    .context
                    .create_br(dest, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::CondBr(cond, if_true, if_false) => {
                let cond = self.typed(scope, cond, rest)?;
                let if_true = self.label(scope, if_true, rest)?;
                let if_false = self.label(scope, if_false, rest)?;
                self.module
                    .context
                    .create_cond_br(cond, if_true, if_false, at)
                    .map_err(self.lift(rest))?
            }
            InstOp::Ret(value) => {
                let value = match value {
                    Some(value) => Some(self.typed(scope, value, rest)?),
                    None => None,
                };
                self.module
                    .context
                    .create_ret(value, at)
                    .map_err(self.lift(rest))?
            }
        };

        match &inst.result {
            Some(result) => {
                if self.module.context.value_type(value) == self.module.context.void_type() {
                    return Err(self.error(rest, format!("cannot name void instruction %{}", result)));
                }
                self.define(scope, result, value, rest)
            }
            None => Ok(()),
        }
    }

    fn lower_function(&mut self, func: Value, ast: &FunctionAst) -> Result<(), ParseError> {
        let Some(body) = &ast.body else {
            return Ok(());
        };
        let mut scope = Scope::default();
        let args = self
            .module
            .context
            .arguments(func)
            .map_err(self.lift(ast.rest))?
            .to_vec();
        for ((_, name), arg) in ast.params.iter().zip(args) {
            if let Some(name) = name {
                self.define(&mut scope, name, arg, ast.rest)?;
            }
        }

        let mut blocks = Vec::with_capacity(body.len());
        for block in body {
            let label = block.label.as_deref().unwrap_or("");
            let created = self
                .module
                .context
                .create_block(value_name(label), Some(func), None)
                .map_err(self.lift(block.rest))?;
            if let Some(label) = &block.label {
                self.define(&mut scope, label, created, block.rest)?;
            }
            blocks.push(created);
        }
        for (block, created) in body.iter().zip(blocks) {
            for inst in &block.insts {
                self.lower_inst(&mut scope, created, inst)?;
            }
        }
        self.finish(scope)
    }

    fn lower_block(&mut self, block: Value, ast: &BlockAst) -> Result<(), ParseError> {
        let mut scope = Scope::default();
        if let Some(label) = &ast.label {
            self.define(&mut scope, label, block, ast.rest)?;
        }
        for inst in &ast.insts {
            self.lower_inst(&mut scope, block, inst)?;
        }
        self.finish(scope)
    }

    fn declare_types(&mut self, items: &[ItemAst]) -> Result<(), ParseError> {
        for item in items {
            if let ItemAst::TypeDef { name, rest, .. } = item {
                if self.module.context.types().lookup_struct(name).is_some() {
                    return Err(self.error(*rest, format!("redefinition of type %{}", name)));
                }
                self.module.context.named_struct(name);
            }
        }
        for item in items {
            if let ItemAst::TypeDef {
                name,
                body: Some(fields),
                rest,
            } = item
            {
                let fields = self.resolve_types(fields, *rest)?;
                let ty = self.module.context.named_struct(name);
                self.module
                    .context
                    .set_struct_body(ty, &fields)
                    .map_err(self.lift(*rest))?;
            }
        }
        Ok(())
    }

    /// Create the value for each item, in order; type definitions get `None`
    fn declare_items(&mut self, items: &[ItemAst]) -> Result<Vec<Option<Value>>, ParseError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let value = match item {
                ItemAst::TypeDef { .. } => None,
                ItemAst::Global { name, ty, rest, .. } => {
                    let ty = self.resolve_type(ty, *rest)?;
                    let global = self
                        .module
                        .context
                        .create_global(ty, name, None)
                        .map_err(self.lift(*rest))?;
                    self.declare_global(name, global, *rest)?;
                    Some(global)
                }
                ItemAst::Function(ast) => {
                    let func = self.declare_function(ast)?;
                    self.declare_global(&ast.name, func, ast.rest)?;
                    Some(func)
                }
                ItemAst::Block(ast) => {
                    let label = ast.label.as_deref().unwrap_or("");
                    let block = self
                        .module
                        .context
                        .create_block(value_name(label), None, None)
                        .map_err(self.lift(ast.rest))?;
                    Some(block)
                }
            };
            if let Some(value) = value {
                self.module.push_item(value);
            }
            values.push(value);
        }
        Ok(values)
    }

    fn declare_function(&mut self, ast: &FunctionAst) -> Result<Value, ParseError> {
        let ret = self.resolve_type(&ast.ret, ast.rest)?;
        let param_exprs: Vec<TypeExpr> = ast.params.iter().map(|(ty, _)| ty.clone()).collect();
        let params = self.resolve_types(&param_exprs, ast.rest)?;
        let signature = self.module.context.function_type(ret, &params);

        if let (Some(intrinsic), None) = (Intrinsic::from_name(&ast.name), &ast.body) {
            let func = self.module.context.declare_intrinsic(intrinsic);
            if self.module.context.value_type(func) != signature {
                return Err(self.error(
                    ast.rest,
                    format!("wrong signature for intrinsic @{}", ast.name),
                ));
            }
            return Ok(func);
        }

        let names: Vec<&str> = ast
            .params
            .iter()
            .map(|(_, name)| name.as_deref().map_or("", value_name))
            .collect();
        self.module
            .context
            .create_function(signature, &ast.name, &names)
            .map_err(self.lift(ast.rest))
    }
}

/// Build a module from parsed items; `source_len` is the length of the text
/// the positions in `items` were taken from
pub(crate) fn lower_module(source_len: usize, items: &[ItemAst]) -> Result<Module, ParseError> {
    let mut lowerer = Lowerer {
        source_len,
        module: Module::new(),
        globals: BTreeMap::new(),
    };
    lowerer.declare_types(items)?;
    let values = lowerer.declare_items(items)?;

    for (item, value) in items.iter().zip(&values) {
        if let (
            ItemAst::Global {
                ty,
                init: Some(init),
                rest,
                ..
            },
            Some(global),
        ) = (item, value)
        {
            let ty = lowerer.resolve_type(ty, *rest)?;
            let init = lowerer.operand(None, ty, init, *rest)?;
            lowerer
                .module
                .context
                .set_initializer(*global, init)
                .map_err(lowerer.lift(*rest))?;
        }
    }

    for (item, value) in items.iter().zip(&values) {
        match (item, value) {
            (ItemAst::Function(ast), Some(func)) => lowerer.lower_function(*func, ast)?,
            (ItemAst::Block(ast), Some(block)) => lowerer.lower_block(*block, ast)?,
            _ => {}
        }
    }
    Ok(lowerer.module)
}
