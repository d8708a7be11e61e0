//! Dominance verification.

use alloc::{collections::BTreeMap, format, vec::Vec};

use super::{location, VerifierError};
use crate::{analysis::DominatorTree, context::Context, entity::Value, inst::InstKind};

/// Verify dominance properties
///
/// Checks:
/// - Every use in a reachable block is dominated by its definition
/// - Within one block, a definition comes before its uses
/// - A PHI operand is dominated at the end of its incoming block
///
/// Code in unreachable blocks is not checked.
pub fn verify_dominance(ctx: &Context, func: Value, errors: &mut Vec<VerifierError>) {
    if !matches!(ctx.is_declaration(func), Ok(false)) {
        return;
    }
    let domtree = match DominatorTree::run_on_function(ctx, func) {
        Ok(domtree) => domtree,
        Err(err) => {
            errors.push(VerifierError::with_location(
                format!("dominator tree: {}", err),
                location(ctx, func),
            ));
            return;
        }
    };
    let Ok(blocks) = ctx.blocks(func) else {
        return;
    };

    // instruction -> (block, position)
    let mut definitions: BTreeMap<Value, (Value, usize)> = BTreeMap::new();
    for block in blocks {
        for (index, inst) in ctx.block_insts(*block).unwrap_or(&[]).iter().enumerate() {
            definitions.insert(*inst, (*block, index));
        }
    }

    let dominates = |def_block: Value, use_block: Value| -> bool {
        domtree.is_reachable_from_entry(def_block)
            && domtree.dominates(def_block, use_block).unwrap_or(false)
    };

    for block in blocks {
        if !domtree.is_reachable_from_entry(*block) {
            continue;
        }
        for (index, inst) in ctx.block_insts(*block).unwrap_or(&[]).iter().enumerate() {
            let is_phi = matches!(ctx.inst_kind(*inst), Some(InstKind::Phi));
            for (slot, u) in ctx.operands(*inst).iter().enumerate() {
                let Some(value) = ctx.use_value(*u) else {
                    continue;
                };
                let Some(&(def_block, def_index)) = definitions.get(&value) else {
                    continue;
                };

                if is_phi {
                    if slot % 2 != 0 {
                        continue;
                    }
                    let Ok(incoming) = ctx.incoming_block(*inst, slot / 2) else {
                        continue;
                    };
                    if domtree.is_reachable_from_entry(incoming) && !dominates(def_block, incoming) {
                        errors.push(VerifierError::with_location(
                            format!(
                                "{} does not dominate the end of incoming {}",
                                location(ctx, value),
                                location(ctx, incoming)
                            ),
                            location(ctx, *inst),
                        ));
                    }
                    continue;
                }

                let ok = if def_block == *block {
                    def_index < index
                } else {
                    dominates(def_block, *block)
                };
                if !ok {
                    errors.push(VerifierError::with_location(
                        format!(
                            "{} defined in {} does not dominate this use in {}",
                            location(ctx, value),
                            location(ctx, def_block),
                            location(ctx, *block)
                        ),
                        location(ctx, *inst),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    fn check(input: &str) -> Vec<VerifierError> {
        let module = parse_module(input).unwrap();
        let f = module.get_function("f").unwrap();
        let mut errors = Vec::new();
        verify_dominance(&module.context, f, &mut errors);
        errors
    }

    #[test]
    fn test_valid_loop() {
        let errors = check(
            "define int @f(int %n) {\nentry:\n  br label %loop\n\nloop:\n  %i = phi int [ 0, %entry ], [ %next, %loop ]\n  %next = add int %i, 1\n  %done = cmp ge int %next, %n\n  br bool %done, label %exit, label %loop\n\nexit:\n  ret int %next\n}\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_use_in_sibling_branch() {
        let errors = check(
            "define int @f(bool %c) {\nentry:\n  br bool %c, label %a, label %b\n\na:\n  %x = add int 1, 2\n  ret int %x\n\nb:\n  ret int %x\n}\n",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("does not dominate"));
        assert!(errors[0].message.contains("block %a"));
    }

    #[test]
    fn test_use_before_definition_in_block() {
        let errors = check(
            "define int @f() {\nentry:\n  %y = add int %x, 1\n  %x = add int 1, 2\n  ret int %y\n}\n",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("%x"));
    }

    #[test]
    fn test_phi_operand_checked_at_incoming_edge() {
        let errors = check(
            "define int @f(bool %c) {\nentry:\n  br bool %c, label %a, label %join\n\na:\n  %x = add int 1, 2\n  br label %join\n\njoin:\n  %p = phi int [ %x, %entry ], [ %x, %a ]\n  ret int %p\n}\n",
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("block %entry"));
    }

    #[test]
    fn test_unreachable_code_is_skipped() {
        let errors = check(
            "define int @f() {\nentry:\n  ret int 0\n\ndead:\n  %y = add int %y, 1\n  br label %dead\n}\n",
        );
        assert!(errors.is_empty());
    }
}
