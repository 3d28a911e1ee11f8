#![forbid(unsafe_code)]

//! Rule tokenizer.
//!
//! Splits on whitespace and on the four bracket characters. Everything else,
//! quotes included, accumulates into one run that is then classified. A
//! quoted string therefore cannot contain a space or a bracket.

use crate::ast::{BinaryFunc, Literal, UnaryFunc};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    OpenSet,
    CloseSet,
    Unary(UnaryFunc),
    Binary(BinaryFunc),
    Literal(Literal),
    Accessor(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: &'a str,
    /// Byte offset of the token in the expression.
    pub offset: usize,
}

/// Split `input` into classified tokens.
///
/// # Errors
///
/// [`ParseError::UnknownFunction`] for an upper-case run that is not a
/// function name, [`ParseError::InvalidLiteral`] for any other run that is
/// neither an accessor, a quoted string nor a finite number.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in input.char_indices() {
        let bracket = match ch {
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '[' => Some(TokenKind::OpenSet),
            ']' => Some(TokenKind::CloseSet),
            _ => None,
        };
        if bracket.is_none() && !ch.is_whitespace() {
            start.get_or_insert(i);
            continue;
        }
        if let Some(run) = start.take() {
            tokens.push(classify(&input[run..i], run)?);
        }
        if let Some(kind) = bracket {
            tokens.push(Token {
                kind,
                text: &input[i..i + 1],
                offset: i,
            });
        }
    }
    if let Some(run) = start {
        tokens.push(classify(&input[run..], run)?);
    }
    Ok(tokens)
}

fn classify(text: &str, offset: usize) -> Result<Token<'_>, ParseError> {
    let kind = if text == "true" {
        TokenKind::Literal(Literal::Boolean(true))
    } else if text == "false" {
        TokenKind::Literal(Literal::Boolean(false))
    } else if is_func_like(text) {
        if let Some(func) = BinaryFunc::from_name(text) {
            TokenKind::Binary(func)
        } else if let Some(func) = UnaryFunc::from_name(text) {
            TokenKind::Unary(func)
        } else {
            return Err(ParseError::UnknownFunction {
                name: text.to_string(),
                offset,
            });
        }
    } else if let Some(func) = BinaryFunc::from_name(text) {
        TokenKind::Binary(func)
    } else if is_id_like(text) {
        TokenKind::Accessor(text.to_string())
    } else if let Some(inner) = unquote(text) {
        TokenKind::Literal(Literal::String(inner.to_string()))
    } else {
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => TokenKind::Literal(Literal::Number(n)),
            _ => {
                return Err(ParseError::InvalidLiteral {
                    text: text.to_string(),
                    offset,
                });
            }
        }
    };
    Ok(Token { kind, text, offset })
}

fn is_func_like(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_uppercase())
}

/// `[a-z_][.a-z0-9_]*`
fn is_id_like(text: &str) -> bool {
    let mut bytes = text.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_lowercase() || b == b'_')
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'.')
}

fn unquote(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if text.len() >= 2 && text.ends_with(quote) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}
