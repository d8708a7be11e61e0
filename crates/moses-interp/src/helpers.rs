//! Helper functions for testing IR execution.

use alloc::{format, string::String};

use moses_ir::{parse_module, Module};

use crate::{
    config::InterpreterConfig,
    error::{ExecError, Trap},
    interpreter::Interpreter,
    logging::LogLevel,
    value::GenericValue,
};

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Value returned by the function, `None` for top-level code
    pub value: Option<GenericValue>,
    /// Text printed by the program
    pub output: String,
}

fn parse(source: &str) -> Module {
    parse_module(source).unwrap_or_else(|e| {
        let (line, col) = e.line_col(source);
        panic!("Failed to parse IR at {}:{}: {}\n\n{}", line, col, e.message, source)
    })
}

fn format_error(interp: &Interpreter<'_>, error: &ExecError, source: &str) -> String {
    let mut result = String::new();
    result.push_str("=== IR Execution Error ===\n\n");
    result.push_str(&format!("Error: {}\n", error));
    if let Some(inst) = error.location() {
        result.push_str(&format!("At: {}\n", interp_display(interp, inst)));
    }
    result.push_str("\nState:\n");
    result.push_str(&interp.dump_state());
    let logs = interp.format_logs();
    if !logs.is_empty() {
        result.push_str("\nLast execution logs:\n");
        result.push_str(&logs);
    }
    result.push_str("\nSource:\n");
    result.push_str(source);
    result
}

fn interp_display(interp: &Interpreter<'_>, inst: moses_ir::Value) -> String {
    format!("{}", interp.ctx.display(inst)).trim().into()
}

/// Run `function` from IR text, or the module's top-level code when
/// `function` is `None`.
///
/// On failure the error is returned with a report of the interpreter
/// state and recent log.
pub fn run_source(
    source: &str,
    function: Option<&str>,
    args: &[GenericValue],
) -> Result<RunOutcome, (ExecError, String)> {
    let module = parse(source);
    let config = InterpreterConfig::default().with_log_level(LogLevel::Instructions);
    let ctx = &module.context;

    let Some(name) = function else {
        let mut interp = Interpreter::new(ctx, config);
        let globals: alloc::vec::Vec<_> = module.globals().collect();
        for global in globals {
            if let Err(e) = interp.global_address(global) {
                let report = format_error(&interp, &e, source);
                return Err((e, report));
            }
        }
        return match module.top_level_block() {
            Some(block) => match interp.run_top_level(block) {
                Ok(()) => Ok(RunOutcome {
                    value: None,
                    output: String::from(interp.output()),
                }),
                Err(e) => {
                    let report = format_error(&interp, &e, source);
                    Err((e, report))
                }
            },
            None => panic!("No top-level block in:\n{}", source),
        };
    };

    let func = module
        .get_function(name)
        .unwrap_or_else(|| panic!("No function @{} in:\n{}", name, source));
    let mut interp = Interpreter::new(ctx, config);
    match interp.run_function(func, args) {
        Ok(value) => Ok(RunOutcome {
            value,
            output: String::from(interp.output()),
        }),
        Err(e) => {
            let report = format_error(&interp, &e, source);
            Err((e, report))
        }
    }
}

/// Expect `function` to run successfully, returning the outcome.
pub fn expect_ok(source: &str, function: &str, args: &[i64]) -> RunOutcome {
    let args: alloc::vec::Vec<_> = args.iter().map(|n| GenericValue::Int(*n)).collect();
    match run_source(source, Some(function), &args) {
        Ok(outcome) => outcome,
        Err((e, report)) => panic!("{}\n{}", report, e),
    }
}

/// Expect `function` to return a specific int.
pub fn expect_int(source: &str, function: &str, args: &[i64], expected: i64) {
    let outcome = expect_ok(source, function, args);
    if outcome.value != Some(GenericValue::Int(expected)) {
        panic!(
            "Result mismatch: expected {}, got {:?}\n\nSource:\n{}",
            expected, outcome.value, source
        );
    }
}

/// Expect `function` to return a specific bool.
pub fn expect_bool(source: &str, function: &str, args: &[i64], expected: bool) {
    let outcome = expect_ok(source, function, args);
    if outcome.value != Some(GenericValue::Bool(expected)) {
        panic!(
            "Result mismatch: expected {}, got {:?}\n\nSource:\n{}",
            expected, outcome.value, source
        );
    }
}

/// Expect `function` to trap with a trap accepted by `check`.
pub fn expect_trap<F>(source: &str, function: &str, args: &[i64], check: F)
where
    F: FnOnce(&Trap) -> bool,
{
    let args: alloc::vec::Vec<_> = args.iter().map(|n| GenericValue::Int(*n)).collect();
    match run_source(source, Some(function), &args) {
        Ok(outcome) => {
            panic!(
                "Expected a trap but execution returned {:?}\n\nSource:\n{}",
                outcome.value, source
            );
        }
        Err((e, report)) => match e.trap() {
            Some(trap) if check(trap) => {}
            _ => panic!("Trap check failed\n{}\n{}", report, e),
        },
    }
}
