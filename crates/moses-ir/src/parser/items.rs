//! Top-level item parsers: type definitions, globals, functions and blocks.

use alloc::{string::String, string::ToString, vec::Vec};

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{map, opt},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{
    instructions::parse_instructions,
    primitives::{global_name, identifier, keyword, local_name, operand, parse_type, struct_body},
    syntax::{BlockAst, FunctionAst, ItemAst, TypeExpr},
    whitespace::{blank, comma},
};

/// `name:`
fn block_label(input: &str) -> IResult<&str, String> {
    map(terminated(identifier, char(':')), |s: &str| s.to_string())(input)
}

/// A labelled block
pub(crate) fn parse_block(input: &str) -> IResult<&str, BlockAst> {
    let rest = input.len();
    let (input, label) = block_label(input)?;
    let (input, insts) = parse_instructions(input)?;
    Ok((
        input,
        BlockAst {
            label: Some(label),
            insts,
            rest,
        },
    ))
}

/// Function body; the entry label may be omitted
fn body(input: &str) -> IResult<&str, Vec<BlockAst>> {
    let (input, _) = pair(char('{'), blank)(input)?;
    let rest = input.len();
    let (input, label) = opt(block_label)(input)?;
    let (input, insts) = parse_instructions(input)?;
    let mut blocks = Vec::new();
    if label.is_some() || !insts.is_empty() {
        blocks.push(BlockAst { label, insts, rest });
    }
    let (input, more) = many0(preceded(blank, parse_block))(input)?;
    blocks.extend(more);
    let (input, _) = pair(blank, char('}'))(input)?;
    Ok((input, blocks))
}

/// `T %a` or `T`
fn param(input: &str) -> IResult<&str, (TypeExpr, Option<String>)> {
    pair(parse_type, opt(preceded(blank, local_name)))(input)
}

/// `define T @f(T %a, ...) { ... }` or `declare T @f(T, ...)`
pub(crate) fn parse_function(input: &str) -> IResult<&str, FunctionAst> {
    let rest = input.len();
    let (input, is_definition) = terminated(
        alt((map(keyword("define"), |_| true), map(keyword("declare"), |_| false))),
        blank,
    )(input)?;
    let (input, ret) = terminated(parse_type, blank)(input)?;
    let (input, name) = global_name(input)?;
    let (input, params) = delimited(
        tuple((blank, char('('), blank)),
        separated_list0(comma, param),
        pair(blank, char(')')),
    )(input)?;
    let (input, body) = if is_definition {
        map(preceded(blank, body), Some)(input)?
    } else {
        (input, None)
    };
    Ok((
        input,
        FunctionAst {
            name,
            ret,
            params,
            body,
            rest,
        },
    ))
}

/// `%Name = type { ... }` or `%Name = type opaque`
fn type_def(input: &str) -> IResult<&str, ItemAst> {
    let rest = input.len();
    let (input, name) = local_name(input)?;
    let (input, _) = tuple((blank, char('='), blank, keyword("type"), blank))(input)?;
    let (input, body) = alt((map(keyword("opaque"), |_| None), map(struct_body, Some)))(input)?;
    Ok((input, ItemAst::TypeDef { name, body, rest }))
}

/// `@g = global T init` or `@g = global T zeroinitializer`
fn global(input: &str) -> IResult<&str, ItemAst> {
    let rest = input.len();
    let (input, name) = global_name(input)?;
    let (input, _) = tuple((blank, char('='), blank, keyword("global"), blank))(input)?;
    let (input, ty) = terminated(parse_type, blank)(input)?;
    let (input, init) = alt((
        map(keyword("zeroinitializer"), |_| None),
        map(operand, Some),
    ))(input)?;
    Ok((input, ItemAst::Global { name, ty, init, rest }))
}

/// Any top-level item
pub(crate) fn parse_item(input: &str) -> IResult<&str, ItemAst> {
    alt((
        type_def,
        global,
        map(parse_function, ItemAst::Function),
        map(parse_block, ItemAst::Block),
    ))(input)
}

/// All items, with surrounding whitespace and comments
pub(crate) fn parse_items(input: &str) -> IResult<&str, Vec<ItemAst>> {
    terminated(many0(preceded(blank, parse_item)), blank)(input)
}
