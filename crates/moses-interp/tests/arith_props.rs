//! Property tests: interpreted integer arithmetic matches 64-bit wrapping
//! semantics.

use moses_interp::{GenericValue, Interpreter, InterpreterConfig, Trap};
use moses_ir::parse_module;
use proptest::prelude::*;

const OPS: &str = "define int @add(int %a, int %b) {
entry:
  %r = add int %a, %b
  ret int %r
}

define int @sub(int %a, int %b) {
entry:
  %r = sub int %a, %b
  ret int %r
}

define int @mul(int %a, int %b) {
entry:
  %r = mul int %a, %b
  ret int %r
}

define int @div(int %a, int %b) {
entry:
  %r = div int %a, %b
  ret int %r
}

define int @rem(int %a, int %b) {
entry:
  %r = rem int %a, %b
  ret int %r
}

define int @shl(int %a, int %b) {
entry:
  %r = shl int %a, %b
  ret int %r
}

define bool @lt(int %a, int %b) {
entry:
  %r = cmp lt int %a, %b
  ret bool %r
}
";

fn run(name: &str, a: i64, b: i64) -> Result<Option<GenericValue>, moses_interp::ExecError> {
    let module = parse_module(OPS).unwrap();
    let func = module.get_function(name).unwrap();
    let mut interp = Interpreter::new(&module.context, InterpreterConfig::default());
    interp.run_function(func, &[GenericValue::Int(a), GenericValue::Int(b)])
}

proptest! {
    #[test]
    fn arithmetic_wraps(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(run("add", a, b).unwrap(), Some(GenericValue::Int(a.wrapping_add(b))));
        prop_assert_eq!(run("sub", a, b).unwrap(), Some(GenericValue::Int(a.wrapping_sub(b))));
        prop_assert_eq!(run("mul", a, b).unwrap(), Some(GenericValue::Int(a.wrapping_mul(b))));
        prop_assert_eq!(
            run("shl", a, b).unwrap(),
            Some(GenericValue::Int(a.wrapping_shl((b & 63) as u32)))
        );
        prop_assert_eq!(run("lt", a, b).unwrap(), Some(GenericValue::Bool(a < b)));
    }

    #[test]
    fn division_matches_or_traps(a in any::<i64>(), b in prop_oneof![Just(0i64), any::<i64>()]) {
        for (name, expected) in [("div", a.checked_div(b)), ("rem", a.checked_rem(b))] {
            let result = run(name, a, b);
            if b == 0 {
                let err = result.unwrap_err();
                prop_assert_eq!(err.trap(), Some(&Trap::DivisionByZero));
            } else {
                let wrapped = if name == "div" { a.wrapping_div(b) } else { a.wrapping_rem(b) };
                prop_assert_eq!(result.unwrap(), Some(GenericValue::Int(wrapped)));
                if let Some(exact) = expected {
                    prop_assert_eq!(exact, wrapped);
                }
            }
        }
    }
}
