//! Def-use list consistency.

use alloc::{collections::BTreeSet, format, vec::Vec};

use super::{finish, VerifierError};
use crate::{context::Context, entity::Use};

/// Verify the use lists and operand vectors of every live value
///
/// Checks:
/// - Each use list links back correctly and only holds uses of its value
/// - Each operand slot records its owner and position
/// - Each use of a value is reachable from that value's list
pub fn verify_use_lists(ctx: &Context) -> Result<(), Vec<VerifierError>> {
    let mut errors = Vec::new();
    let mut listed: BTreeSet<Use> = BTreeSet::new();

    for (value, data) in ctx.values.iter() {
        let mut prev = None;
        let mut cursor = data.first_use.expand();
        let mut steps = 0;
        while let Some(u) = cursor {
            steps += 1;
            if steps > ctx.uses.len() {
                errors.push(VerifierError::with_location(
                    "use list does not terminate".into(),
                    format!("{}", value),
                ));
                break;
            }
            let Some(use_data) = ctx.uses.get(u) else {
                errors.push(VerifierError::with_location(
                    format!("use list holds stale use {}", u),
                    format!("{}", value),
                ));
                break;
            };
            if use_data.value() != Some(value) {
                errors.push(VerifierError::with_location(
                    format!("{} in the use list refers to another value", u),
                    format!("{}", value),
                ));
            }
            if use_data.prev() != prev {
                errors.push(VerifierError::with_location(
                    format!("{} has a broken back link", u),
                    format!("{}", value),
                ));
            }
            listed.insert(u);
            prev = Some(u);
            cursor = use_data.next();
        }

        for (index, u) in data.operands.iter().enumerate() {
            match ctx.uses.get(*u) {
                Some(use_data) if use_data.user() == value && use_data.operand_no() == index => {}
                Some(_) => errors.push(VerifierError::with_location(
                    format!("operand {} records the wrong owner or position", index),
                    format!("{}", value),
                )),
                None => errors.push(VerifierError::with_location(
                    format!("operand {} is stale use {}", index, u),
                    format!("{}", value),
                )),
            }
        }
    }

    for (u, data) in ctx.uses.iter() {
        let owned = ctx
            .values
            .get(data.user())
            .is_some_and(|user| user.operands.get(data.operand_no()) == Some(&u));
        if !owned {
            errors.push(VerifierError::new(format!(
                "{} is not in the operand list of {}",
                u,
                data.user()
            )));
        }
        if let Some(value) = data.value() {
            if !ctx.contains_value(value) {
                errors.push(VerifierError::new(format!("{} refers to erased {}", u, value)));
            } else if !listed.contains(&u) {
                errors.push(VerifierError::new(format!(
                    "{} is missing from the use list of {}",
                    u, value
                )));
            }
        }
    }

    finish(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inst::InsertPoint, parser::parse_module};

    #[test]
    fn test_consistent_after_edits() {
        let mut module = parse_module(
            "define int @f(int %a) {\nentry:\n  %x = add int %a, %a\n  %y = mul int %x, %a\n  ret int %y\n}\n",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        let ctx = &mut module.context;
        let a = ctx.argument(f, 0).unwrap();
        let entry = ctx.entry_block(f).unwrap().unwrap();
        let x = ctx.block_insts(entry).unwrap()[0];
        let two = ctx.const_int(2);
        ctx.replace_all_uses_with(a, two).unwrap();
        ctx.add_use(Some(x), x, 0).unwrap();
        ctx.remove_operand(x, 0).unwrap();
        let seven = ctx.const_int(7);
        ctx.create_ret(Some(seven), InsertPoint::Detached).unwrap();
        assert_eq!(verify_use_lists(ctx), Ok(()));
    }

    #[test]
    fn test_corrupted_back_link_is_reported() {
        let mut module = parse_module(
            "define int @f(int %a) {\nentry:\n  %x = add int %a, %a\n  ret int %x\n}\n",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        let ctx = &mut module.context;
        let a = ctx.argument(f, 0).unwrap();
        let head = ctx.uses(a).next().unwrap();
        let second = ctx.use_data(head).unwrap().next().unwrap();
        ctx.uses[second].prev = crate::packed_option::PackedOption::none();

        let errors = verify_use_lists(ctx).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("back link"));
    }

    #[test]
    fn test_unlisted_use_is_reported() {
        let mut module = parse_module("define int @f(int %a) {\nentry:\n  ret int %a\n}\n").unwrap();
        let f = module.get_function("f").unwrap();
        let ctx = &mut module.context;
        let a = ctx.argument(f, 0).unwrap();
        ctx.values[a].first_use = crate::packed_option::PackedOption::none();

        let errors = verify_use_lists(ctx).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing from the use list"));
    }
}
