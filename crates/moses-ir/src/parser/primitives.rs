//! Primitive parsers for names, literals, types and operands.

use alloc::{boxed::Box, string::String, string::ToString, vec::Vec};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{map, map_res, not, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::{
    syntax::{Operand, TypeExpr, Typed},
    whitespace::{blank, comma, inline_space},
};

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse an integer literal
pub(crate) fn integer(input: &str) -> IResult<&str, i64> {
    map_res(
        recognize(pair(opt(char('-')), digit1)),
        |s: &str| s.parse::<i64>(),
    )(input)
}

/// Identifier: letters, digits, `_` and `.`
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(is_ident_char)(input)
}

/// A reserved word not followed by more identifier characters
pub(crate) fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

/// Local name (`%name`)
pub(crate) fn local_name(input: &str) -> IResult<&str, String> {
    map(preceded(char('%'), identifier), |s: &str| s.to_string())(input)
}

/// Global name (`@name`)
pub(crate) fn global_name(input: &str) -> IResult<&str, String> {
    map(preceded(char('@'), identifier), |s: &str| s.to_string())(input)
}

/// Block reference (`label %name`)
pub(crate) fn label_ref(input: &str) -> IResult<&str, String> {
    preceded(pair(keyword("label"), blank), local_name)(input)
}

fn type_list(input: &str) -> IResult<&str, Vec<TypeExpr>> {
    separated_list0(comma, parse_type)(input)
}

/// `{ T, U }` field list
pub(crate) fn struct_body(input: &str) -> IResult<&str, Vec<TypeExpr>> {
    delimited(pair(char('{'), blank), type_list, pair(blank, char('}')))(input)
}

fn array_type(input: &str) -> IResult<&str, TypeExpr> {
    let (input, _) = pair(char('['), blank)(input)?;
    let (input, len) = map_res(digit1, |s: &str| s.parse::<u64>())(input)?;
    let (input, _) = tuple((blank, char('x'), blank))(input)?;
    let (input, element) = parse_type(input)?;
    let (input, _) = pair(blank, char(']'))(input)?;
    Ok((input, TypeExpr::Array(len, Box::new(element))))
}

fn base_type(input: &str) -> IResult<&str, TypeExpr> {
    alt((
        map(keyword("void"), |_| TypeExpr::Void),
        map(keyword("int"), |_| TypeExpr::Int),
        map(keyword("bool"), |_| TypeExpr::Bool),
        map(keyword("label"), |_| TypeExpr::Label),
        map(local_name, TypeExpr::Named),
        array_type,
        map(struct_body, TypeExpr::Struct),
    ))(input)
}

/// Parse a type, including `*` and `(params)` suffixes
pub(crate) fn parse_type(input: &str) -> IResult<&str, TypeExpr> {
    let (mut input, mut ty) = base_type(input)?;
    loop {
        if let Ok((rest, _)) = preceded(inline_space, char::<&str, nom::error::Error<&str>>('*'))(input) {
            ty = TypeExpr::Pointer(Box::new(ty));
            input = rest;
            continue;
        }
        let params = delimited(
            pair(preceded(inline_space, char('(')), blank),
            type_list,
            pair(blank, char(')')),
        )(input);
        if let Ok((rest, params)) = params {
            ty = TypeExpr::Function(Box::new(ty), params);
            input = rest;
            continue;
        }
        return Ok((input, ty));
    }
}

fn aggregate(input: &str) -> IResult<&str, Vec<Typed>> {
    alt((
        delimited(
            pair(char('['), blank),
            separated_list0(comma, typed_operand),
            pair(blank, char(']')),
        ),
        delimited(
            pair(char('{'), blank),
            separated_list0(comma, typed_operand),
            pair(blank, char('}')),
        ),
    ))(input)
}

/// Operand without a type
pub(crate) fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(local_name, Operand::Local),
        map(global_name, Operand::Global),
        map(integer, Operand::Int),
        map(keyword("true"), |_| Operand::Bool(true)),
        map(keyword("false"), |_| Operand::Bool(false)),
        map(keyword("null"), |_| Operand::Null),
        map(keyword("undef"), |_| Operand::Undef),
        map(aggregate, Operand::Aggregate),
    ))(input)
}

/// `type operand`
pub(crate) fn typed_operand(input: &str) -> IResult<&str, Typed> {
    pair(terminated(parse_type, blank), operand)(input)
}
