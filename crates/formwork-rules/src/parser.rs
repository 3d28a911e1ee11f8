#![forbid(unsafe_code)]

//! Rule parser.
//!
//! Grammar (no precedence tiers; binary functions fold left):
//!
//! ```text
//! expression := argument (BINARY argument)*
//! argument   := literal | accessor | UNARY argument
//!             | "(" expression ")" | "[" argument* "]"
//! ```
//!
//! `a OR b AND c` is `AND(OR(a, b), c)`. Parentheses are the only way to
//! group differently.
//!
//! Trees deeper than [`MAX_DEPTH`] are rejected so that compiling, printing
//! and dropping a parsed rule never recurses without bound. Every bracket,
//! unary function and folded binary function counts one level.

use crate::ast::Node;
use crate::error::ParseError;
use crate::token::{Token, TokenKind, tokenize};

/// Deepest nesting a parsed rule may have.
pub const MAX_DEPTH: usize = 256;

/// Parse a rule into its syntax tree.
///
/// # Errors
///
/// Any [`ParseError`]: tokenizer failures, an empty expression, a token in
/// the wrong position, or an unbalanced bracket.
pub fn parse(input: &str) -> Result<Node, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let node = Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .expression(None)?;
    tracing::trace!(target: "formwork::rules", expression = input, ast = %node, "parsed rule");
    Ok(node)
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn enter(&mut self, offset: usize) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                offset,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// `open` is the offset of the `(` this expression closes, or `None` at
    /// the top level.
    fn expression(&mut self, open: Option<usize>) -> Result<Node, ParseError> {
        let outer = self.depth;
        let node = self.fold(open);
        self.depth = outer;
        node
    }

    fn fold(&mut self, open: Option<usize>) -> Result<Node, ParseError> {
        let mut lhs = self.argument()?;
        loop {
            let Some(token) = self.peek() else {
                return match open {
                    Some(offset) => Err(ParseError::Unmatched {
                        bracket: '(',
                        offset,
                    }),
                    None => Ok(lhs),
                };
            };
            match token.kind {
                TokenKind::CloseParen => {
                    let offset = token.offset;
                    if open.is_none() {
                        return Err(ParseError::Unmatched {
                            bracket: ')',
                            offset,
                        });
                    }
                    self.pos += 1;
                    return Ok(lhs);
                }
                TokenKind::Binary(func) => {
                    let offset = token.offset;
                    self.enter(offset)?;
                    self.pos += 1;
                    let rhs = self.argument()?;
                    lhs = Node::binary(func, lhs, rhs);
                }
                _ => return Err(unexpected("a binary function", token)),
            }
        }
    }

    fn argument(&mut self) -> Result<Node, ParseError> {
        let token = self.next().ok_or(ParseError::UnexpectedEnd {
            expected: "an argument",
        })?;
        match token.kind {
            TokenKind::OpenSet => {
                self.enter(token.offset)?;
                let node = self.set(token.offset);
                self.depth -= 1;
                node
            }
            TokenKind::OpenParen => {
                self.enter(token.offset)?;
                let node = self.expression(Some(token.offset));
                self.depth -= 1;
                node
            }
            TokenKind::Unary(func) => {
                self.enter(token.offset)?;
                let arg = self.argument();
                self.depth -= 1;
                Ok(Node::unary(func, arg?))
            }
            TokenKind::Literal(value) => Ok(Node::Literal { value }),
            TokenKind::Accessor(path) => Ok(Node::Accessor { path }),
            TokenKind::CloseParen | TokenKind::CloseSet | TokenKind::Binary(_) => {
                Err(unexpected("an argument", &token))
            }
        }
    }

    fn set(&mut self, open: usize) -> Result<Node, ParseError> {
        let mut values = Vec::new();
        loop {
            match self.peek().map(|t| &t.kind) {
                None => {
                    return Err(ParseError::Unmatched {
                        bracket: '[',
                        offset: open,
                    });
                }
                Some(TokenKind::CloseSet) => {
                    self.pos += 1;
                    return Ok(Node::Set { values });
                }
                Some(_) => values.push(self.argument()?),
            }
        }
    }
}

fn unexpected(expected: &'static str, token: &Token<'_>) -> ParseError {
    ParseError::UnexpectedToken {
        expected,
        found: token.text.to_string(),
        offset: token.offset,
    }
}
