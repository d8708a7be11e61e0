//! Whitespace and comment parsing.

use nom::{
    branch::alt,
    character::complete::{char, multispace1, not_line_ending, space0},
    combinator::{map, recognize},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

/// Whitespace, newlines and `;` line comments; returns the matched text
pub(crate) fn blank_space(input: &str) -> IResult<&str, &str> {
    recognize(many0(alt((
        map(multispace1, |_| ()),
        map(pair(char(';'), not_line_ending), |_| ()),
    ))))(input)
}

/// Whitespace and comments, discarded
pub(crate) fn blank(input: &str) -> IResult<&str, ()> {
    map(blank_space, |_| ())(input)
}

/// A comma with optional surrounding whitespace
pub(crate) fn comma(input: &str) -> IResult<&str, ()> {
    map(tuple((blank, char(','), blank)), |_| ())(input)
}

/// Spaces and tabs only, never a line break
pub(crate) fn inline_space(input: &str) -> IResult<&str, &str> {
    space0(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_space() {
        assert_eq!(blank_space("   "), Ok(("", "   ")));
        assert_eq!(blank_space("\n\t  "), Ok(("", "\n\t  ")));
        assert_eq!(blank_space("  %x"), Ok(("%x", "  ")));
        assert_eq!(blank_space(""), Ok(("", "")));
    }

    #[test]
    fn test_comments_are_blank() {
        assert_eq!(blank("; note\n  ret"), Ok(("ret", ())));
        assert_eq!(blank("  ; a\n; b\n%x"), Ok(("%x", ())));
        assert_eq!(blank(";trailing"), Ok(("", ())));
    }

    #[test]
    fn test_comma() {
        assert_eq!(comma(" ,  int"), Ok(("int", ())));
        assert!(comma("int").is_err());
    }

    #[test]
    fn test_inline_space_stops_at_newline() {
        assert_eq!(inline_space("  \nx"), Ok(("\nx", "  ")));
    }
}
