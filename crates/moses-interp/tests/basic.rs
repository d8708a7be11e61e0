//! Control flow and call tests for the interpreter.

use moses_interp::{
    expect_int, expect_ok, expect_trap, GenericValue, Interpreter, InterpreterConfig, LogLevel,
    Trap,
};
use moses_ir::{parse_module, Context, InsertPoint};

const ADD: &str = "define int @add(int %a, int %b) {
entry:
  %sum = add int %a, %b
  ret int %sum
}
";

#[test]
fn test_add_function() {
    let module = parse_module(ADD).expect("parse failed");
    let add = module.get_function("add").unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    let result = interp
        .run_function(add, &[GenericValue::Int(3), GenericValue::Int(4)])
        .expect("execution failed");
    assert_eq!(result, Some(GenericValue::Int(7)));
    assert_eq!(interp.call_depth(), 0);
    assert_eq!(interp.steps(), 2);
}

#[test]
fn test_conditional_branch_takes_true_block() {
    let source = "define int @pick(bool %c) {
entry:
  br bool %c, label %yes, label %no

yes:
  call void @moses.print.int(int 1)
  ret int 1

no:
  call void @moses.print.int(int 2)
  ret int 2
}
";
    let module = parse_module(source).unwrap();
    let pick = module.get_function("pick").unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    let result = interp.run_function(pick, &[GenericValue::Bool(true)]).unwrap();
    assert_eq!(result, Some(GenericValue::Int(1)));
    assert_eq!(interp.output(), "1\n");
}

#[test]
fn test_loop_through_memory() {
    // sum of 1..=n kept in stack slots
    let source = "define int @sum(int %n) {
entry:
  %i = alloca int
  %acc = alloca int
  store int 1, int* %i
  store int 0, int* %acc
  br label %head

head:
  %iv = load int, int* %i
  %done = cmp gt int %iv, %n
  br bool %done, label %exit, label %body

body:
  %a = load int, int* %acc
  %a2 = add int %a, %iv
  store int %a2, int* %acc
  %next = add int %iv, 1
  store int %next, int* %i
  br label %head

exit:
  %r = load int, int* %acc
  ret int %r
}
";
    expect_int(source, "sum", &[10], 55);
    expect_int(source, "sum", &[0], 0);
}

#[test]
fn test_recursive_calls() {
    let source = "define int @fib(int %n) {
entry:
  %small = cmp lt int %n, 2
  br bool %small, label %base, label %rec

base:
  ret int %n

rec:
  %n1 = sub int %n, 1
  %f1 = call int @fib(int %n1)
  %n2 = sub int %n, 2
  %f2 = call int @fib(int %n2)
  %r = add int %f1, %f2
  ret int %r
}
";
    expect_int(source, "fib", &[10], 55);
}

#[test]
fn test_print_intrinsics() {
    let outcome = expect_ok(
        "define void @show(int %x) {
entry:
  call void @moses.print.int(int %x)
  %neg = cmp lt int %x, 0
  call void @moses.print.bool(bool %neg)
  ret void
}
",
        "show",
        &[-3],
    );
    assert_eq!(outcome.value, None);
    assert_eq!(outcome.output, "-3\ntrue\n");
}

#[test]
fn test_block_without_terminator_falls_off() {
    let mut ctx = Context::new();
    let int = ctx.int_type();
    let sig = ctx.function_type(int, &[]);
    let f = ctx.create_function(sig, "f", &[]).unwrap();
    let entry = ctx.create_block("entry", Some(f), None).unwrap();
    let one = ctx.const_int(1);
    let x = ctx
        .create_binary(moses_ir::BinaryOp::Add, one, one, "x", InsertPoint::AtEnd(entry))
        .unwrap();
    assert_eq!(ctx.terminator(entry).unwrap(), None);

    let mut interp = Interpreter::new(&ctx, InterpreterConfig::default());
    let err = interp.run_function(f, &[]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::FellOffBlock(entry)));
    assert_eq!(interp.frames()[0].get(x), Some(GenericValue::Int(2)));
}

#[test]
fn test_phi_is_not_evaluated() {
    expect_trap(
        "define int @f() {
entry:
  br label %next

next:
  %p = phi int [ 1, %entry ]
  ret int %p
}
",
        "f",
        &[],
        |trap| matches!(trap, Trap::UnsupportedInstruction(_)),
    );
}

#[test]
fn test_undefined_and_non_functions() {
    expect_trap(
        "declare int @ext(int)

define int @f() {
entry:
  %r = call int @ext(int 1)
  ret int %r
}
",
        "f",
        &[],
        |trap| matches!(trap, Trap::UndefinedFunction(_)),
    );

    let module = parse_module(ADD).unwrap();
    let add = module.get_function("add").unwrap();
    let entry = module.context.entry_block(add).unwrap().unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    let err = interp.run_function(entry, &[]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::NotAFunction(entry)));
}

#[test]
fn test_argument_mismatch() {
    let module = parse_module(ADD).unwrap();
    let add = module.get_function("add").unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    let err = interp.run_function(add, &[GenericValue::Int(1)]).unwrap_err();
    assert!(matches!(err.trap(), Some(Trap::ArgumentMismatch { .. })));
    let err = interp
        .run_function(add, &[GenericValue::Int(1), GenericValue::Bool(true)])
        .unwrap_err();
    assert!(matches!(err.trap(), Some(Trap::ArgumentMismatch { .. })));
}

#[test]
fn test_step_limit() {
    let source = "define void @spin() {
entry:
  br label %entry
}
";
    let module = parse_module(source).unwrap();
    let spin = module.get_function("spin").unwrap();
    let config = InterpreterConfig::default().with_max_steps(50);
    let mut interp = Interpreter::new(&module.context, config);
    let err = interp.run_function(spin, &[]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::StepLimitExceeded { limit: 50 }));
    assert_eq!(interp.steps(), 50);
}

#[test]
fn test_call_depth_limit() {
    let source = "define int @down(int %n) {
entry:
  %m = add int %n, 1
  %r = call int @down(int %m)
  ret int %r
}
";
    let module = parse_module(source).unwrap();
    let down = module.get_function("down").unwrap();
    let config = InterpreterConfig::default().with_max_call_depth(16);
    let mut interp = Interpreter::new(&module.context, config);
    let err = interp.run_function(down, &[GenericValue::Int(0)]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::CallDepthExceeded { limit: 16 }));
    assert_eq!(interp.call_depth(), 16);
}

#[test]
fn test_trap_location_and_logs() {
    let source = "define int @f(int %x) {
entry:
  %y = add int %x, 1
  %q = div int %y, %x
  ret int %q
}
";
    let module = parse_module(source).unwrap();
    let f = module.get_function("f").unwrap();
    let entry = module.context.entry_block(f).unwrap().unwrap();
    let div = module.context.block_insts(entry).unwrap()[1];

    let config = InterpreterConfig::default().with_log_level(LogLevel::Instructions);
    let mut interp = Interpreter::new(&module.context, config);
    let err = interp.run_function(f, &[GenericValue::Int(0)]).unwrap_err();
    assert_eq!(err.trap(), Some(&Trap::DivisionByZero));
    assert_eq!(err.location(), Some(div));

    assert!(!interp.logs().is_empty());
    let logs = interp.format_logs();
    assert!(logs.contains("%y = add int %x, 1"), "{}", logs);
    assert!(logs.contains("trap: division by zero"), "{}", logs);
    assert!(interp.dump_state().contains("%y = 1"));
}

#[test]
fn test_interpreter_reusable_after_trap() {
    let source = "define int @f(int %x) {
entry:
  %p = alloca int
  store int %x, int* %p
  %q = div int 10, %x
  ret int %q
}
";
    let module = parse_module(source).unwrap();
    let f = module.get_function("f").unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    assert!(interp.run_function(f, &[GenericValue::Int(0)]).is_err());
    assert_eq!(interp.memory().allocation_count(), 1);
    let result = interp.run_function(f, &[GenericValue::Int(5)]).unwrap();
    assert_eq!(result, Some(GenericValue::Int(2)));
    assert_eq!(interp.memory().allocation_count(), 0);
}
