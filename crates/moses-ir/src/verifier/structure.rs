//! Container structure verification.

use alloc::{format, vec::Vec};

use super::{location, VerifierError};
use crate::{context::Context, entity::Value, inst::InstKind, value::ValueKind};

/// Verify block and argument structure of a function
///
/// Checks:
/// - Blocks and instructions point back to their containers
/// - Every block ends with exactly one terminator
/// - PHI nodes are grouped at the top of their block and list predecessors
/// - Operands are live and belong to the same function
pub fn verify_structure(ctx: &Context, func: Value, errors: &mut Vec<VerifierError>) {
    if let Ok(args) = ctx.arguments(func) {
        for (index, arg) in args.iter().enumerate() {
            let ok = ctx
                .argument_data(*arg)
                .is_ok_and(|data| data.parent() == Some(func) && data.index() == index);
            if !ok {
                errors.push(VerifierError::with_location(
                    format!("argument {} does not point back to its function", index),
                    location(ctx, func),
                ));
            }
        }
    }
    let Ok(blocks) = ctx.blocks(func) else {
        return;
    };
    for block in blocks {
        verify_block(ctx, *block, Some(func), errors);
    }
}

/// Verify one block; `func` is the function it should belong to
pub(crate) fn verify_block(
    ctx: &Context,
    block: Value,
    func: Option<Value>,
    errors: &mut Vec<VerifierError>,
) {
    let here = || location(ctx, block);
    match ctx.block_parent(block) {
        Ok(parent) if parent == func => {}
        Ok(_) => errors.push(VerifierError::with_location(
            "block parent link does not match its function".into(),
            here(),
        )),
        Err(err) => {
            errors.push(VerifierError::new(format!("{}", err)));
            return;
        }
    }
    let Ok(insts) = ctx.block_insts(block) else {
        return;
    };
    if insts.last().map_or(true, |inst| !ctx.is_terminator(*inst)) {
        errors.push(VerifierError::with_location(
            "block does not end with a terminator".into(),
            here(),
        ));
    }

    let preds = ctx.predecessors(block).unwrap_or_default();
    let mut seen_non_phi = false;
    for (index, inst) in insts.iter().enumerate() {
        if !matches!(ctx.inst_parent(*inst), Ok(Some(parent)) if parent == block) {
            errors.push(VerifierError::with_location(
                "instruction parent link does not match its block".into(),
                location(ctx, *inst),
            ));
            continue;
        }
        if ctx.is_terminator(*inst) && index + 1 != insts.len() {
            errors.push(VerifierError::with_location(
                "terminator in the middle of a block".into(),
                location(ctx, *inst),
            ));
        }
        match ctx.inst_kind(*inst) {
            Some(InstKind::Phi) => {
                if seen_non_phi {
                    errors.push(VerifierError::with_location(
                        "phi node after a non-phi instruction".into(),
                        location(ctx, *inst),
                    ));
                }
                verify_phi(ctx, *inst, &preds, errors);
            }
            _ => seen_non_phi = true,
        }
        verify_operands(ctx, *inst, func, errors);
    }
}

fn verify_phi(ctx: &Context, phi: Value, preds: &[Value], errors: &mut Vec<VerifierError>) {
    if ctx.num_operands(phi) % 2 != 0 {
        errors.push(VerifierError::with_location(
            "phi node has an unpaired operand".into(),
            location(ctx, phi),
        ));
        return;
    }
    for index in 0..ctx.num_incoming(phi).unwrap_or(0) {
        if let Ok(block) = ctx.incoming_block(phi, index) {
            if !preds.contains(&block) {
                errors.push(VerifierError::with_location(
                    format!("phi incoming block {} is not a predecessor", location(ctx, block)),
                    location(ctx, phi),
                ));
            }
        }
    }
}

fn verify_operands(ctx: &Context, inst: Value, func: Option<Value>, errors: &mut Vec<VerifierError>) {
    for (slot, u) in ctx.operands(inst).iter().enumerate() {
        let Some(value) = ctx.use_value(*u) else {
            errors.push(VerifierError::with_location(
                format!("operand {} is null", slot),
                location(ctx, inst),
            ));
            continue;
        };
        let owner = match ctx.value_data(value).map(|data| data.kind()) {
            None => {
                errors.push(VerifierError::with_location(
                    format!("operand {} refers to erased value {}", slot, value),
                    location(ctx, inst),
                ));
                continue;
            }
            Some(ValueKind::Instruction(data)) => match data.parent() {
                Some(block) => ctx.block_parent(block).ok().flatten(),
                None => {
                    errors.push(VerifierError::with_location(
                        format!("operand {} is an instruction outside any block", slot),
                        location(ctx, inst),
                    ));
                    continue;
                }
            },
            Some(ValueKind::BasicBlock(data)) => data.parent(),
            Some(ValueKind::Argument(data)) => data.parent(),
            Some(_) => continue,
        };
        if owner != func {
            errors.push(VerifierError::with_location(
                format!("operand {} belongs to another function", slot),
                location(ctx, inst),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inst::InsertPoint, parser::parse_module};

    fn check(ctx: &Context, func: Value) -> Vec<VerifierError> {
        let mut errors = Vec::new();
        verify_structure(ctx, func, &mut errors);
        errors
    }

    #[test]
    fn test_terminator_in_middle() {
        let mut module = parse_module("define void @f() {\nentry:\n  ret void\n}\n").unwrap();
        let f = module.get_function("f").unwrap();
        let ctx = &mut module.context;
        let entry = ctx.entry_block(f).unwrap().unwrap();
        ctx.create_ret(None, InsertPoint::AtEnd(entry)).unwrap();

        let errors = check(ctx, f);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("middle"));
    }

    #[test]
    fn test_phi_must_come_first_and_name_predecessors() {
        let module = parse_module(
            "define int @f() {\nentry:\n  br label %next\n\nnext:\n  %a = add int 1, 2\n  %p = phi int [ 1, %entry ], [ 2, %next ]\n  ret int %p\n}\n",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        let errors = check(&module.context, f);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.message.contains("after a non-phi")));
        assert!(errors.iter().any(|e| e.message.contains("not a predecessor")));
    }

    #[test]
    fn test_cross_function_operand() {
        let mut module = parse_module(
            "define int @f() {\nentry:\n  %x = add int 1, 2\n  ret int %x\n}\n\ndefine int @g() {\nentry:\n  ret int 0\n}\n",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        let g = module.get_function("g").unwrap();
        let ctx = &mut module.context;
        let f_entry = ctx.entry_block(f).unwrap().unwrap();
        let x = ctx.block_insts(f_entry).unwrap()[0];
        let g_entry = ctx.entry_block(g).unwrap().unwrap();
        let g_ret = ctx.block_insts(g_entry).unwrap()[0];
        ctx.set_operand_at(g_ret, 0, x).unwrap();

        let errors = check(ctx, g);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("another function"));
    }

    #[test]
    fn test_null_operand_reported() {
        let mut module = parse_module("define int @f() {\nentry:\n  %x = add int 1, 2\n  ret int %x\n}\n").unwrap();
        let f = module.get_function("f").unwrap();
        let ctx = &mut module.context;
        let entry = ctx.entry_block(f).unwrap().unwrap();
        let x = ctx.block_insts(entry).unwrap()[0];
        ctx.drop_all_references(x).unwrap();

        let errors = check(ctx, f);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.message.contains("null")));
    }
}
