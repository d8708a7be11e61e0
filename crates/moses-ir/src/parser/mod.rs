//! Reader for the textual IR written by [`crate::write`].
//!
//! Parsing happens in two steps: the `nom` parsers build a syntax tree, then
//! [`lower`] resolves names into a fresh [`Module`].

mod error;
mod instructions;
mod items;
mod lower;
mod primitives;
mod syntax;
mod whitespace;

use error::parse_error;
pub use error::ParseError;

use crate::module::Module;

/// Parse a complete module from IR text.
pub fn parse_module(input: &str) -> Result<Module, ParseError> {
    let items = match items::parse_items(input) {
        Ok(("", items)) => items,
        Ok((remaining, _)) => {
            let line = remaining.lines().next().unwrap_or(remaining);
            return Err(parse_error(
                input,
                remaining,
                &alloc::format!("unexpected input: {}", line),
            ));
        }
        Err(e) => {
            return Err(parse_error(
                input,
                input,
                &alloc::format!("parse error: {:?}", e),
            ))
        }
    };
    lower::lower_module(input.len(), &items)
}
