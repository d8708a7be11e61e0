//! Instruction parsers.

use alloc::{string::String, vec::Vec};

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{map, map_opt, opt},
    multi::{separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use super::{
    primitives::{identifier, keyword, label_ref, local_name, operand, parse_type, typed_operand},
    syntax::{InstAst, InstOp, Operand},
    whitespace::{blank, comma},
};
use crate::inst::{BinaryOp, CmpPredicate};

/// `add int %a, %b`
fn binary(input: &str) -> IResult<&str, InstOp> {
    let (input, op) = terminated(map_opt(identifier, BinaryOp::from_mnemonic), blank)(input)?;
    let (input, ty) = terminated(parse_type, blank)(input)?;
    let (input, (lhs, rhs)) = separated_pair(operand, comma, operand)(input)?;
    Ok((input, InstOp::Binary(op, ty, lhs, rhs)))
}

/// `cmp lt int %a, %b`
fn cmp(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("cmp"), blank)(input)?;
    let (input, pred) = terminated(map_opt(identifier, CmpPredicate::from_mnemonic), blank)(input)?;
    let (input, ty) = terminated(parse_type, blank)(input)?;
    let (input, (lhs, rhs)) = separated_pair(operand, comma, operand)(input)?;
    Ok((input, InstOp::Cmp(pred, ty, lhs, rhs)))
}

/// `alloca T`
fn alloca(input: &str) -> IResult<&str, InstOp> {
    map(preceded(pair(keyword("alloca"), blank), parse_type), InstOp::Alloca)(input)
}

/// `load T, T* %p`
fn load(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("load"), blank)(input)?;
    let (input, (ty, ptr)) = separated_pair(parse_type, comma, typed_operand)(input)?;
    Ok((input, InstOp::Load(ty, ptr)))
}

/// `store T %v, T* %p`
fn store(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("store"), blank)(input)?;
    let (input, (value, ptr)) = separated_pair(typed_operand, comma, typed_operand)(input)?;
    Ok((input, InstOp::Store(value, ptr)))
}

/// `getelementptr T, T* %p, int 0, ...`
fn gep(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("getelementptr"), blank)(input)?;
    let (input, (source, operands)) =
        separated_pair(parse_type, comma, separated_list1(comma, typed_operand))(input)?;
    Ok((input, InstOp::Gep(source, operands)))
}

/// `[ value, %block ]`
fn incoming(input: &str) -> IResult<&str, (Operand, String)> {
    delimited(
        pair(char('['), blank),
        separated_pair(operand, comma, local_name),
        pair(blank, char(']')),
    )(input)
}

/// `phi T [ v, %bb ], ...`
fn phi(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("phi"), blank)(input)?;
    let (input, ty) = parse_type(input)?;
    let (input, pairs) = opt(preceded(blank, separated_list1(comma, incoming)))(input)?;
    Ok((input, InstOp::Phi(ty, pairs.unwrap_or_default())))
}

/// `call T @f(T a, ...)`
fn call(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("call"), blank)(input)?;
    let (input, ret) = terminated(parse_type, blank)(input)?;
    let (input, callee) = terminated(operand, blank)(input)?;
    let (input, args) = delimited(
        pair(char('('), blank),
        separated_list0(comma, typed_operand),
        pair(blank, char(')')),
    )(input)?;
    Ok((input, InstOp::Call(ret, callee, args)))
}

/// `br label %x` or `br bool %c, label %t, label %f`
fn br(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("br"), blank)(input)?;
    alt((
        map(
            tuple((typed_operand, comma, label_ref, comma, label_ref)),
            |(cond, _, if_true, _, if_false)| InstOp::CondBr(cond, if_true, if_false),
        ),
        map(label_ref, InstOp::Br),
    ))(input)
}

/// `ret void` or `ret T %v`
fn ret(input: &str) -> IResult<&str, InstOp> {
    let (input, _) = terminated(keyword("ret"), blank)(input)?;
    alt((
        map(keyword("void"), |_| InstOp::Ret(None)),
        map(typed_operand, |value| InstOp::Ret(Some(value))),
    ))(input)
}

/// Parse one instruction, with its optional `%name =` prefix
pub(crate) fn parse_instruction(input: &str) -> IResult<&str, InstAst> {
    let rest = input.len();
    let (input, result) = opt(terminated(local_name, tuple((blank, char('='), blank))))(input)?;
    let (input, op) = alt((cmp, alloca, load, store, gep, phi, call, br, ret, binary))(input)?;
    Ok((input, InstAst { result, op, rest }))
}

/// Instructions until the next label or the end of a body
pub(crate) fn parse_instructions(input: &str) -> IResult<&str, Vec<InstAst>> {
    nom::multi::many0(preceded(blank, parse_instruction))(input)
}
