//! S-expression reader: turns source text into [`Value`] trees.
//!
//! The reader is deliberately small. It knows integers (decimal and `#x`
//! hexadecimal), strings, symbols, proper and dotted lists, and `;` line
//! comments. There is no quote shorthand and no keyword recognition: `#t`,
//! `$vau` and friends are plain symbols resolved by the environment.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{cut, opt, recognize},
    error::ErrorKind,
    sequence::{pair, terminated},
};

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{NumberType, SYMBOL_SPECIAL_CHARS, Value, is_valid_symbol};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Skip `;` line comments as whitespace
    pub handle_comments: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            handle_comments: true,
        }
    }
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::Char => format!("Expected character at position {position}"),
                ErrorKind::HexDigit => format!("Invalid hexadecimal literal at position {position}"),
                ErrorKind::TooLarge => {
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})")
                }
                _ => {
                    if position < input.len() {
                        let remaining_chars: String =
                            input.chars().skip(position).take(10).collect();
                        format!("Invalid syntax near '{remaining_chars}'")
                    } else {
                        "Unexpected end of input".into()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "Incomplete input".into(),
    }
}

/// Skip whitespace and, when enabled, `;` comments up to the end of the line
fn skip_atmosphere(mut input: &str, config: ParseConfig) -> &str {
    loop {
        let trimmed = input.trim_start();
        if config.handle_comments
            && let Some(comment) = trimmed.strip_prefix(';')
        {
            input = comment.find('\n').map_or("", |end| &comment[end..]);
        } else {
            return trimmed;
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ';')
}

/// Succeed without consuming if the next character ends a token
fn at_delimiter(input: &str) -> IResult<&str, ()> {
    match input.chars().next() {
        Some(c) if !is_delimiter(c) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Verify,
        ))),
        _ => Ok((input, ())),
    }
}

/// Parse a decimal number
fn parse_decimal(input: &str) -> IResult<&str, Value> {
    let (input, number_str) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((input, Value::Number(n))),
        // Overflow; symbol parsing will reject this too since it starts with digits
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a hexadecimal number (#x or #X prefix)
///
/// Once the prefix is seen the token must be a hex literal, so failures
/// are not retried as symbols.
fn parse_hexadecimal(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('#').parse(input)?;
    let (input, _) = alt((char('x'), char('X'))).parse(input)?;
    let hex_error = || nom::Err::Failure(nom::error::Error::new(input, ErrorKind::HexDigit));

    let (rest, hex_digits) =
        take_while1::<_, &str, nom::error::Error<&str>>(|c: char| c.is_ascii_hexdigit())
            .parse(input)
            .map_err(|_| hex_error())?;
    at_delimiter(rest).map_err(|_| hex_error())?;

    NumberType::from_str_radix(hex_digits, 16)
        .map(|n| (rest, Value::Number(n)))
        .map_err(|_| hex_error())
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Value::Symbol(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(text))),
            Some('\\') => {
                let escaped = match char_iter.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    // Unknown escape, or a backslash at end of input
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                };
                text.push(escaped);
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// The `.` separating the last element of a dotted list from its tail
fn parse_dot(input: &str) -> IResult<&str, char> {
    terminated(char('.'), at_delimiter).parse(input)
}

/// Parse a proper `(a b c)` or dotted `(a b . c)` list
fn parse_list(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    let (mut input, _) = char('(').parse(input)?;
    let mut elements = Vec::new();

    loop {
        input = skip_atmosphere(input, config);

        if let Some(rest) = input.strip_prefix(')') {
            return Ok((rest, Value::list(elements)));
        }

        if !elements.is_empty()
            && let Ok((rest, _)) = parse_dot(input)
        {
            let (rest, tail) = parse_sexpr(rest, config, depth + 1)?;
            let rest = skip_atmosphere(rest, config);
            let (rest, _) = cut(char(')')).parse(rest)?;
            return Ok((rest, Value::list_with_tail(elements, tail)));
        }

        let (rest, element) = parse_sexpr(input, config, depth + 1)?;
        elements.push(element);
        input = rest;
    }
}

/// Numbers, strings and symbols; each must be followed by a delimiter
fn parse_atom(input: &str) -> IResult<&str, Value> {
    alt((
        parse_hexadecimal,
        terminated(parse_decimal, at_delimiter),
        terminated(parse_string, at_delimiter),
        terminated(parse_symbol, at_delimiter),
    ))
    .parse(input)
}

/// Parse one S-expression, skipping leading whitespace and comments
fn parse_sexpr(input: &str, config: ParseConfig, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let input = skip_atmosphere(input, config);
    alt((|input| parse_list(input, config, depth), parse_atom)).parse(input)
}

/// Parse exactly one expression with the default configuration
pub fn parse_expression(input: &str) -> Result<Value, Error> {
    parse_expression_with_config(input, ParseConfig::default())
}

/// Parse exactly one expression; anything but whitespace or comments after it is an error
pub fn parse_expression_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    match parse_sexpr(input, config, 0) {
        Ok((remaining, value)) => match skip_atmosphere(remaining, config) {
            "" => Ok(value),
            remaining => Err(Error::ParseError(format!(
                "Unexpected remaining input: '{remaining}'"
            ))),
        },
        Err(e) => Err(Error::ParseError(parse_error_to_message(input, e))),
    }
}

/// Parse every top-level expression in `input`, in order
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    let config = ParseConfig::default();
    let mut remaining = skip_atmosphere(input, config);
    let mut program = Vec::new();

    while !remaining.is_empty() {
        let (rest, value) = parse_sexpr(remaining, config, 0)
            .map_err(|e| Error::ParseError(parse_error_to_message(input, e)))?;
        program.push(value);
        remaining = skip_atmosphere(rest, config);
    }
    Ok(program)
}
