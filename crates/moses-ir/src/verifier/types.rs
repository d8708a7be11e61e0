//! Type checks that construction alone cannot guarantee.

use alloc::{format, vec::Vec};

use super::{location, VerifierError};
use crate::{context::Context, entity::Value, inst::InstKind};

/// Verify return values and operand types of a function's instructions
///
/// Builders check operands as instructions are created, but a `ret` does not
/// know its function yet, and operand removal can leave a call or a PHI with
/// a bad shape.
pub fn verify_types(ctx: &Context, func: Value, errors: &mut Vec<VerifierError>) {
    let Ok(ret_ty) = ctx.return_type(func) else {
        return;
    };
    let returns_void = ret_ty == ctx.void_type();
    let Ok(blocks) = ctx.blocks(func) else {
        return;
    };

    for block in blocks {
        let Ok(insts) = ctx.block_insts(*block) else {
            continue;
        };
        for inst in insts {
            let here = || location(ctx, *inst);
            let operand_types: Vec<_> = ctx
                .operands(*inst)
                .iter()
                .filter_map(|u| ctx.use_value(*u))
                .filter_map(|v| ctx.value_data(v).map(|data| data.ty()))
                .collect();
            match ctx.inst_kind(*inst) {
                Some(InstKind::Ret) => match (returns_void, operand_types.first()) {
                    (true, Some(_)) => errors.push(VerifierError::with_location(
                        "void function returns a value".into(),
                        here(),
                    )),
                    (false, None) => errors.push(VerifierError::with_location(
                        format!("missing return value of type {}", ctx.type_name(ret_ty)),
                        here(),
                    )),
                    (false, Some(found)) if *found != ret_ty => {
                        errors.push(VerifierError::with_location(
                            format!(
                                "returns {} from a function returning {}",
                                ctx.type_name(*found),
                                ctx.type_name(ret_ty)
                            ),
                            here(),
                        ))
                    }
                    _ => {}
                },
                Some(InstKind::Binary(_)) | Some(InstKind::Cmp(_)) => {
                    if operand_types.len() != 2 || operand_types[0] != operand_types[1] {
                        errors.push(VerifierError::with_location(
                            "operands must be two values of one type".into(),
                            here(),
                        ));
                    }
                }
                Some(InstKind::Call) => {
                    let params = ctx
                        .operand(*inst, 0)
                        .and_then(|callee| ctx.param_types(callee))
                        .map(|params| params.len());
                    if params.map_or(true, |n| n + 1 != ctx.num_operands(*inst)) {
                        errors.push(VerifierError::with_location(
                            "call argument count does not match the callee".into(),
                            here(),
                        ));
                    }
                }
                Some(InstKind::Phi) => {
                    let ty = ctx.value_type(*inst);
                    let bad = (0..ctx.num_incoming(*inst).unwrap_or(0)).any(|i| {
                        ctx.incoming_value(*inst, i)
                            .ok()
                            .and_then(|v| ctx.value_data(v))
                            .map_or(true, |data| data.ty() != ty)
                    });
                    if bad {
                        errors.push(VerifierError::with_location(
                            "phi incoming value has the wrong type".into(),
                            here(),
                        ));
                    }
                }
                _ => {}
            }
        }
    }
}
