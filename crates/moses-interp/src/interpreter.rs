//! Interpreter state and the dispatch loop.

use alloc::{collections::BTreeMap, format, string::String, vec::Vec};

use moses_ir::{ConstantData, Context, IrError, TypeData, Value, ValueKind};
use tracing::{debug, trace, warn};

use crate::{
    config::InterpreterConfig,
    error::{ExecError, Trap},
    frame::ExecutionContext,
    logging::{ExecLog, LogEntry, LogLevel},
    memory::Memory,
    value::GenericValue,
};

/// What the dispatch loop does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// A frame popped, with its return value
    Return(Option<GenericValue>),
}

/// Stack-frame interpreter for moses IR.
///
/// The interpreter borrows the context for its whole lifetime, so the IR
/// cannot change while it runs.
pub struct Interpreter<'ctx> {
    pub(crate) ctx: &'ctx Context,
    pub(crate) config: InterpreterConfig,
    pub(crate) memory: Memory,
    pub(crate) stack: Vec<ExecutionContext>,
    /// Values and allocations of finished top-level code
    pub(crate) global_frame: Option<ExecutionContext>,
    /// Global variable -> address
    pub(crate) globals: BTreeMap<Value, u64>,
    /// Materialized aggregate constant -> address
    pub(crate) constants: BTreeMap<Value, u64>,
    pub(crate) output: String,
    pub(crate) steps: u64,
    pub(crate) log: ExecLog,
    /// Result of the instruction being executed, for the log
    pub(crate) last_result: Option<GenericValue>,
}

impl<'ctx> Interpreter<'ctx> {
    /// Create an idle interpreter over `ctx`.
    pub fn new(ctx: &'ctx Context, config: InterpreterConfig) -> Self {
        Self {
            ctx,
            config,
            memory: Memory::with_limit(config.max_memory),
            stack: Vec::new(),
            global_frame: None,
            globals: BTreeMap::new(),
            constants: BTreeMap::new(),
            output: String::new(),
            steps: 0,
            log: ExecLog::new(config.log_level, config.log_capacity),
            last_result: None,
        }
    }

    /// Create an interpreter for a module's items
    ///
    /// Global variables among `items` get their storage first, then the
    /// first free-standing block runs as top-level code.
    pub fn create(
        ctx: &'ctx Context,
        items: &[Value],
        config: InterpreterConfig,
    ) -> Result<Self, ExecError> {
        let mut interp = Self::new(ctx, config);
        for item in items {
            if ctx.is_global(*item) {
                interp.global_address(*item)?;
            }
        }
        let top_level = items
            .iter()
            .copied()
            .find(|item| ctx.is_block(*item) && matches!(ctx.block_parent(*item), Ok(None)));
        if let Some(block) = top_level {
            interp.run_top_level(block)?;
        }
        Ok(interp)
    }

    /// Run free-standing code starting at `block`
    ///
    /// Its values and allocations stay available to later runs.
    pub fn run_top_level(&mut self, block: Value) -> Result<(), ExecError> {
        self.unwind();
        self.ctx.block_insts(block)?;
        self.stack.push(ExecutionContext::new(None, block, None));
        self.run(0).map(|_| ())
    }

    /// Call `function` with `args` and run it to completion
    pub fn run_function(
        &mut self,
        function: Value,
        args: &[GenericValue],
    ) -> Result<Option<GenericValue>, ExecError> {
        self.unwind();
        if !self.ctx.is_function(function) {
            return Err(Trap::NotAFunction(function).into());
        }
        let params = self.ctx.param_types(function)?;
        if params.len() != args.len() {
            return Err(Trap::ArgumentMismatch {
                reason: "wrong number of arguments",
            }
            .into());
        }
        if args
            .iter()
            .zip(params)
            .any(|(arg, ty)| !arg.matches_type(self.ctx, *ty))
        {
            return Err(Trap::ArgumentMismatch {
                reason: "argument type does not match the parameter",
            }
            .into());
        }
        if let Some(intrinsic) = self.ctx.intrinsic(function) {
            self.call_intrinsic(intrinsic, args)?;
            return Ok(None);
        }
        self.push_frame(function, None, args)?;
        self.run(0)
    }

    /// Dispatch instructions until the stack is back to `base` frames
    fn run(&mut self, base: usize) -> Result<Option<GenericValue>, ExecError> {
        while self.stack.len() > base {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(value)) => {
                    if self.stack.len() <= base {
                        return Ok(value);
                    }
                }
                Err(err) => {
                    warn!(error = %err, steps = self.steps, "execution stopped");
                    self.log.record(LogEntry::Trap {
                        step: self.steps,
                        message: format!("{}", err),
                    });
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Fetch and execute one instruction.
    fn step(&mut self) -> Result<Flow, ExecError> {
        if self.steps >= self.config.max_steps {
            return Err(Trap::StepLimitExceeded {
                limit: self.config.max_steps,
            }
            .into());
        }
        let Some(frame) = self.stack.last_mut() else {
            return Ok(Flow::Return(None));
        };
        let insts = self.ctx.block_insts(frame.block)?;
        let Some(&inst) = insts.get(frame.cursor) else {
            return Err(Trap::FellOffBlock(frame.block).into());
        };
        frame.cursor += 1;
        self.steps += 1;
        trace!(step = self.steps, %inst, "execute");

        let flow = self.execute(inst).map_err(|err| err.at(inst))?;

        if self.log.enabled(LogLevel::Instructions) {
            self.log.record(LogEntry::Executed {
                step: self.steps,
                text: format!("{}", self.ctx.display(inst)),
                result: self.last_result.take(),
            });
        }
        self.last_result = None;
        Ok(flow)
    }

    /// Push a frame for `callee` and bind its arguments
    pub(crate) fn push_frame(
        &mut self,
        callee: Value,
        caller: Option<Value>,
        args: &[GenericValue],
    ) -> Result<(), ExecError> {
        if self.stack.len() >= self.config.max_call_depth {
            return Err(Trap::CallDepthExceeded {
                limit: self.config.max_call_depth,
            }
            .into());
        }
        let entry = self
            .ctx
            .entry_block(callee)?
            .ok_or(Trap::UndefinedFunction(callee))?;
        let mut frame = ExecutionContext::new(Some(callee), entry, caller);
        for (param, arg) in self.ctx.arguments(callee)?.iter().zip(args) {
            frame.bind(*param, *arg);
        }
        self.stack.push(frame);

        debug!(depth = self.stack.len(), callee = %callee, "call");
        self.log.record(LogEntry::Call {
            step: self.steps,
            callee: name_of(self.ctx, callee),
            depth: self.stack.len(),
        });
        Ok(())
    }

    /// Pop the current frame and hand `value` to the waiting call
    pub(crate) fn pop_frame(&mut self, value: Option<GenericValue>) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let depth = self.stack.len();
        debug!(depth, "return");
        self.log.record(LogEntry::Return {
            step: self.steps,
            value,
            depth,
        });

        if frame.function.is_none() && self.stack.is_empty() {
            match &mut self.global_frame {
                Some(global) => global.absorb(frame),
                None => self.global_frame = Some(frame),
            }
            return;
        }
        for base in &frame.allocations {
            self.memory.free(*base);
        }
        if let (Some(call), Some(value), Some(top)) = (frame.caller, value, self.stack.last_mut()) {
            top.bind(call, value);
        }
    }

    /// Drop frames left over from a run that trapped
    fn unwind(&mut self) {
        while let Some(frame) = self.stack.pop() {
            for base in &frame.allocations {
                self.memory.free(*base);
            }
        }
    }

    /// Bind the result of `inst` in the current frame
    pub(crate) fn bind(&mut self, inst: Value, value: GenericValue) {
        if let Some(frame) = self.stack.last_mut() {
            frame.bind(inst, value);
        }
        self.last_result = Some(value);
    }

    /// Runtime value of an operand
    pub(crate) fn operand(&mut self, inst: Value, index: usize) -> Result<GenericValue, ExecError> {
        let value = self.ctx.operand(inst, index)?;
        self.resolve(value)
    }

    /// Runtime value of any IR value
    pub fn resolve(&mut self, value: Value) -> Result<GenericValue, ExecError> {
        let ctx = self.ctx;
        let data = ctx.try_value(value)?;
        match data.kind() {
            ValueKind::Constant(ConstantData::Int(n)) => Ok(GenericValue::Int(*n)),
            ValueKind::Constant(ConstantData::Bool(b)) => Ok(GenericValue::Bool(*b)),
            ValueKind::Constant(ConstantData::Null) => Ok(GenericValue::Pointer(0)),
            ValueKind::Constant(ConstantData::Undef) => match GenericValue::zero(ctx, data.ty()) {
                Some(zero) => Ok(zero),
                None => Ok(GenericValue::Pointer(self.materialize(value)?)),
            },
            ValueKind::Constant(ConstantData::Aggregate) => {
                Ok(GenericValue::Pointer(self.materialize(value)?))
            }
            ValueKind::GlobalVariable(_) => Ok(GenericValue::Pointer(self.global_address(value)?)),
            ValueKind::Argument(_) | ValueKind::Instruction(_) => self
                .stack
                .last()
                .and_then(|frame| frame.get(value))
                .or_else(|| self.global_frame.as_ref().and_then(|frame| frame.get(value)))
                .ok_or_else(|| Trap::UnboundValue(value).into()),
            ValueKind::BasicBlock(_) | ValueKind::Function(_) => {
                Err(Trap::UnboundValue(value).into())
            }
        }
    }

    /// Address of a global variable, allocating and initializing it on first use
    pub fn global_address(&mut self, global: Value) -> Result<u64, ExecError> {
        if let Some(address) = self.globals.get(&global) {
            return Ok(*address);
        }
        let value_type = self.ctx.global_data(global)?.value_type();
        let size = storage_size(self.ctx, value_type)?;
        let address = self.memory.allocate(size)?;
        self.globals.insert(global, address);
        if let Some(init) = self.ctx.global_initializer(global)? {
            self.write_constant(address, init)?;
        }
        trace!(%global, address, "global allocated");
        Ok(address)
    }

    /// Give an aggregate (or aggregate `undef`) constant module-lifetime storage
    fn materialize(&mut self, constant: Value) -> Result<u64, ExecError> {
        if let Some(address) = self.constants.get(&constant) {
            return Ok(*address);
        }
        let size = storage_size(self.ctx, self.ctx.value_type(constant))?;
        let address = self.memory.allocate(size)?;
        self.write_constant(address, constant)?;
        self.constants.insert(constant, address);
        Ok(address)
    }

    /// Store a constant's bytes at `address`
    fn write_constant(&mut self, address: u64, constant: Value) -> Result<(), ExecError> {
        let ctx = self.ctx;
        let ty = ctx.value_type(constant);
        let data = ctx.constant_data(constant)?;
        match ctx.type_data(ty) {
            TypeData::Struct { fields, .. } => {
                if data != ConstantData::Aggregate {
                    return Ok(());
                }
                for index in 0..fields.len() {
                    let offset = ctx.field_offset(ty, index).ok_or(IrError::InvalidType {
                        reason: "struct field without an offset",
                    })?;
                    let element = ctx.operand(constant, index)?;
                    self.write_constant(address + offset, element)?;
                }
            }
            TypeData::Array { element, len } => {
                if data != ConstantData::Aggregate {
                    return Ok(());
                }
                let stride = storage_size(ctx, *element)?;
                for index in 0..*len {
                    let item = ctx.operand(constant, index as usize)?;
                    self.write_constant(address + index * stride, item)?;
                }
            }
            _ => {
                let value = self.resolve(constant)?;
                self.memory.write_word(address, value.to_word())?;
            }
        }
        Ok(())
    }

    /// Text printed by the print intrinsics
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Memory holding allocas, globals and materialized constants
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Number of frames on the stack
    pub fn call_depth(&self) -> usize {
        self.stack.len()
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Frames, outermost first
    pub fn frames(&self) -> &[ExecutionContext] {
        &self.stack
    }

    /// Frame left behind by top-level code
    pub fn global_frame(&self) -> Option<&ExecutionContext> {
        self.global_frame.as_ref()
    }

    /// Execution log captured so far
    pub fn logs(&self) -> &ExecLog {
        &self.log
    }

    /// Format all captured logs as a string.
    pub fn format_logs(&self) -> String {
        let mut result = String::new();
        for entry in self.log.entries() {
            result.push_str(&format!("{}\n", entry));
        }
        result
    }

    /// Clear captured log entries.
    pub fn clear_logs(&mut self) {
        self.log.clear();
    }

    /// Dump the current interpreter state as a human-readable string.
    pub fn dump_state(&self) -> String {
        let mut result = String::new();
        result.push_str(&format!("Steps executed: {}\n", self.steps));
        result.push_str(&format!("Call depth: {}\n", self.stack.len()));
        result.push_str(&format!(
            "Live allocations: {} ({} bytes)\n",
            self.memory.allocation_count(),
            self.memory.bytes_in_use()
        ));

        if !self.stack.is_empty() {
            result.push_str("\nFrames (innermost first):\n");
        }
        for (depth, frame) in self.stack.iter().rev().enumerate() {
            let function = match frame.function {
                Some(function) => format!("@{}", name_of(self.ctx, function)),
                None => String::from("<top level>"),
            };
            result.push_str(&format!(
                "  #{} {} in %{}, next instruction {}\n",
                depth,
                function,
                name_of(self.ctx, frame.block),
                frame.cursor
            ));
            for (value, generic) in &frame.values {
                result.push_str(&format!("    %{} = {}\n", name_of(self.ctx, *value), generic));
            }
        }

        if !self.globals.is_empty() {
            result.push_str("\nGlobals:\n");
            for (global, address) in &self.globals {
                result.push_str(&format!(
                    "  @{} = 0x{:x}\n",
                    name_of(self.ctx, *global),
                    address
                ));
            }
        }
        result
    }
}

/// Storage size of a type that must have one
pub(crate) fn storage_size(ctx: &Context, ty: moses_ir::Type) -> Result<u64, ExecError> {
    ctx.size_of(ty).ok_or_else(|| {
        IrError::InvalidType {
            reason: "type has no storage size",
        }
        .into()
    })
}

/// Display name of a value, falling back to its handle
pub(crate) fn name_of(ctx: &Context, value: Value) -> String {
    match ctx.value_data(value).and_then(|data| data.name()) {
        Some(name) => String::from(name),
        None => format!("{}", value),
    }
}
