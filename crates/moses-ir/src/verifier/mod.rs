//! IR verifier.
//!
//! Checks run independently and collect every problem they find; nothing is
//! repaired.

use alloc::{format, string::String, vec::Vec};

use crate::{context::Context, entity::Value, module::Module, value::ValueKind};

mod dominance;
mod structure;
mod types;
mod uses;

pub use dominance::verify_dominance;
pub use structure::verify_structure;
pub use types::verify_types;
pub use uses::verify_use_lists;

/// Verifier error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierError {
    /// What is wrong
    pub message: String,
    /// Where, e.g. `"v12"` or `"block %entry"`
    pub location: Option<String>,
}

impl VerifierError {
    /// Create a new verifier error
    pub fn new(message: String) -> Self {
        Self {
            message,
            location: None,
        }
    }

    /// Create a new verifier error with location
    pub fn with_location(message: String, location: String) -> Self {
        Self {
            message,
            location: Some(location),
        }
    }
}

impl core::fmt::Display for VerifierError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Readable location for a value: its name when it has one
pub(crate) fn location(ctx: &Context, value: Value) -> String {
    let prefix = match ctx.value_data(value).map(|data| data.kind()) {
        Some(ValueKind::BasicBlock(_)) => "block ",
        Some(ValueKind::Function(_)) => "function ",
        _ => "",
    };
    let sigil = match ctx.value_data(value).map(|data| data.kind()) {
        Some(ValueKind::Function(_)) | Some(ValueKind::GlobalVariable(_)) => "@",
        _ => "%",
    };
    match ctx.value_data(value).and_then(|data| data.name()) {
        Some(name) => format!("{}{}{}", prefix, sigil, name),
        None => format!("{}{}", prefix, value),
    }
}

fn finish(errors: Vec<VerifierError>) -> Result<(), Vec<VerifierError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Verify one function: block structure, types and dominance
///
/// Declarations have nothing to check.
pub fn verify_function(ctx: &Context, func: Value) -> Result<(), Vec<VerifierError>> {
    let mut errors = Vec::new();
    if !ctx.is_function(func) {
        errors.push(VerifierError::new(format!("{} is not a function", func)));
        return Err(errors);
    }
    verify_structure(ctx, func, &mut errors);
    verify_types(ctx, func, &mut errors);
    // Dominance needs sound block structure to mean anything
    if errors.is_empty() {
        verify_dominance(ctx, func, &mut errors);
    }
    finish(errors)
}

/// Verify every function, global and free-standing block of a module, then
/// the use lists of its whole context
pub fn verify_module(module: &Module) -> Result<(), Vec<VerifierError>> {
    let ctx = &module.context;
    let mut errors = Vec::new();

    for item in &module.items {
        match ctx.value_data(*item).map(|data| data.kind()) {
            Some(ValueKind::Function(_)) => {
                if let Err(function_errors) = verify_function(ctx, *item) {
                    errors.extend(function_errors);
                }
            }
            Some(ValueKind::BasicBlock(_)) => {
                structure::verify_block(ctx, *item, None, &mut errors);
            }
            Some(ValueKind::GlobalVariable(_)) => {
                if let Ok(Some(init)) = ctx.global_initializer(*item) {
                    if !ctx.is_constant(init) {
                        errors.push(VerifierError::with_location(
                            "global initializer is not a constant".into(),
                            location(ctx, *item),
                        ));
                    }
                }
            }
            Some(_) => errors.push(VerifierError::with_location(
                "module item is not a function, global or block".into(),
                location(ctx, *item),
            )),
            None => errors.push(VerifierError::new(format!("stale module item {}", item))),
        }
    }

    if let Err(use_errors) = verify_use_lists(ctx) {
        errors.extend(use_errors);
    }
    finish(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inst::InsertPoint, parser::parse_module};

    #[test]
    fn test_verify_valid_module() {
        let module = parse_module(
            "@g = global int 0\n\ndefine int @f(int %x) {\nentry:\n  %c = cmp lt int %x, 0\n  br bool %c, label %neg, label %pos\n\nneg:\n  %n = sub int 0, %x\n  ret int %n\n\npos:\n  ret int %x\n}\n",
        )
        .unwrap();
        assert_eq!(verify_module(&module), Ok(()));
    }

    #[test]
    fn test_verify_missing_terminator() {
        let mut ctx = Context::new();
        let void = ctx.void_type();
        let sig = ctx.function_type(void, &[]);
        let f = ctx.create_function(sig, "f", &[]).unwrap();
        let entry = ctx.create_block("entry", Some(f), None).unwrap();
        let int = ctx.int_type();
        ctx.create_alloca(int, "p", InsertPoint::AtEnd(entry)).unwrap();

        let errors = verify_function(&ctx, f).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("terminator"));
        assert_eq!(errors[0].location.as_deref(), Some("block %entry"));
    }

    #[test]
    fn test_verify_declaration_is_valid() {
        let mut ctx = Context::new();
        let print = ctx.declare_intrinsic(crate::function::Intrinsic::PrintInt);
        assert_eq!(verify_function(&ctx, print), Ok(()));
    }

    #[test]
    fn test_verify_not_a_function() {
        let mut ctx = Context::new();
        let one = ctx.const_int(1);
        assert!(verify_function(&ctx, one).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = VerifierError::with_location("bad".into(), "v3".into());
        assert_eq!(alloc::format!("{}", err), "v3: bad");
    }
}
