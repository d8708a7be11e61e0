//! End-to-end tests: parse, edit, verify and print whole modules.

use moses_ir::{
    parse_module, verify_module, verify_use_lists, BinaryOp, Context, InsertPoint, IrError,
    Module, Opcode, Value,
};

fn block(ctx: &Context, func: Value, name: &str) -> Value {
    ctx.blocks(func)
        .unwrap()
        .iter()
        .copied()
        .find(|b| ctx.name(*b) == Some(name))
        .unwrap_or_else(|| panic!("no block %{}", name))
}

fn inst(ctx: &Context, block: Value, name: &str) -> Value {
    ctx.block_insts(block)
        .unwrap()
        .iter()
        .copied()
        .find(|i| ctx.name(*i) == Some(name))
        .unwrap_or_else(|| panic!("no instruction %{}", name))
}

fn reprint(module: &Module) -> String {
    let text = format!("{}", module);
    let reparsed = parse_module(&text).unwrap_or_else(|e| panic!("{}\n{}", e, text));
    let again = format!("{}", reparsed);
    assert_eq!(text, again, "printing is not stable");
    text
}

const LOOP: &str = "define int @sum(int %n) {
entry:
  br label %loop

loop:
  %i = phi int [ 0, %entry ], [ %next, %loop ]
  %acc = phi int [ 0, %entry ], [ %acc2, %loop ]
  %acc2 = add int %acc, %i
  %next = add int %i, 1
  %done = cmp ge int %next, %n
  br bool %done, label %exit, label %loop

exit:
  ret int %acc2
}
";

#[test]
fn test_split_updates_phis_and_stays_valid() {
    let mut module = parse_module(LOOP).unwrap();
    let func = module.get_function("sum").unwrap();
    let ctx = &mut module.context;
    let body = block(ctx, func, "loop");
    let phi = inst(ctx, body, "i");

    let tail = ctx.split_basic_block(body, 2, "latch").unwrap();
    assert_eq!(ctx.blocks(func).unwrap()[2], tail);
    assert_eq!(ctx.block_insts(body).unwrap().len(), 3);
    assert_eq!(ctx.opcode(ctx.terminator(body).unwrap().unwrap()), Some(Opcode::Br));
    assert_eq!(ctx.incoming_block(phi, 1).unwrap(), tail);
    assert_eq!(ctx.predecessors(body).unwrap().len(), 2);

    assert_eq!(verify_module(&module), Ok(()));
    let text = reprint(&module);
    assert!(text.contains("[ %next, %latch ]"), "{}", text);
}

#[test]
fn test_replace_all_uses_with_across_blocks() {
    let mut module = parse_module(LOOP).unwrap();
    let func = module.get_function("sum").unwrap();
    let ctx = &mut module.context;
    let body = block(ctx, func, "loop");
    let acc2 = inst(ctx, body, "acc2");
    let users: Vec<Value> = ctx.users(acc2).collect();
    assert_eq!(users.len(), 2);

    let n = ctx.argument(func, 0).unwrap();
    let doubled = ctx
        .create_binary(BinaryOp::Mul, acc2, n, "scaled", InsertPoint::After(acc2))
        .unwrap();
    assert_eq!(ctx.use_count(acc2), 3);

    // redirect every use, then put the new instruction's own operand back
    ctx.replace_all_uses_with(acc2, doubled).unwrap();
    assert_eq!(ctx.use_count(acc2), 0);
    let u = ctx.operand_use(doubled, 0).unwrap();
    ctx.set_operand(u, acc2).unwrap();
    assert_eq!(ctx.use_count(acc2), 1);
    for user in users {
        assert!(ctx.operands(user).iter().any(|u| ctx.use_value(*u) == Some(doubled)));
    }

    assert_eq!(verify_use_lists(&module.context), Ok(()));
    assert_eq!(verify_module(&module), Ok(()));
    let text = reprint(&module);
    assert!(text.contains("ret int %scaled"), "{}", text);
}

#[test]
fn test_erase_requires_no_uses() {
    let mut module = parse_module(LOOP).unwrap();
    let func = module.get_function("sum").unwrap();
    let ctx = &mut module.context;
    let body = block(ctx, func, "loop");
    let next = inst(ctx, body, "next");

    let err = ctx.erase_from_parent(next).unwrap_err();
    assert!(matches!(err, IrError::ValueStillInUse { uses: 2, .. }), "{:?}", err);
    assert!(ctx.contains_value(next));

    let one = ctx.const_int(1);
    ctx.replace_all_uses_with(next, one).unwrap();
    ctx.erase_from_parent(next).unwrap();
    assert!(!ctx.contains_value(next));
    assert_eq!(ctx.block_insts(body).unwrap().len(), 5);
    assert_eq!(verify_module(&module), Ok(()));
}

#[test]
fn test_move_and_remove_instructions() {
    let mut module = parse_module(
        "define int @f(int %a) {
entry:
  %x = add int %a, 1
  %y = mul int %a, 2
  %z = sub int %y, %x
  ret int %z
}
",
    )
    .unwrap();
    let func = module.get_function("f").unwrap();
    let ctx = &mut module.context;
    let entry = block(ctx, func, "entry");
    let x = inst(ctx, entry, "x");
    let y = inst(ctx, entry, "y");

    ctx.move_before(y, x).unwrap();
    assert_eq!(&ctx.block_insts(entry).unwrap()[..2], &[y, x]);

    ctx.remove_from_parent(x).unwrap();
    assert_eq!(ctx.inst_parent(x).unwrap(), None);
    // a detached definition no longer reaches its user
    assert!(verify_module(&module).is_err());

    let ctx = &mut module.context;
    let z = inst(ctx, entry, "z");
    ctx.insert_before(x, z).unwrap();
    assert_eq!(verify_module(&module), Ok(()));
}

#[test]
fn test_block_without_terminator() {
    let mut ctx = Context::new();
    let void = ctx.void_type();
    let sig = ctx.function_type(void, &[]);
    let func = ctx.create_function(sig, "f", &[]).unwrap();
    let entry = ctx.create_block("entry", Some(func), None).unwrap();
    assert_eq!(ctx.terminator(entry).unwrap(), None);

    ctx.create_ret(None, InsertPoint::AtEnd(entry)).unwrap();
    assert!(ctx.terminator(entry).unwrap().is_some());
}

#[test]
fn test_module_with_everything_round_trips() {
    let module = parse_module(
        "%Pair = type { int, bool }
%Node = type { int, %Node* }

@origin = global %Pair { int 1, bool false }
@count = global int zeroinitializer

declare int @external(int, bool)

define void @touch(%Node* %n) {
entry:
  %v = getelementptr %Node, %Node* %n, int 0, int 0
  %old = load int, int* %v
  %new = add int %old, 1
  store int %new, int* %v
  call void @moses.print.int(int %new)
  ret void
}

top:
  %p = alloca %Pair
  ret void
",
    )
    .unwrap();
    assert_eq!(verify_module(&module), Ok(()));
    assert_eq!(module.globals().count(), 2);
    assert!(module.top_level_block().is_some());
    let text = reprint(&module);
    assert!(text.contains("%Node = type { int, %Node* }"), "{}", text);
}
