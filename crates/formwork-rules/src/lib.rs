#![forbid(unsafe_code)]

//! Validation rules for formwork.
//!
//! Rules are short expressions over form fields:
//!
//! ```text
//! LEN name > 0 AND age >= 18
//! country IN ['fr' 'de' 'nl']
//! address.city NOT ''
//! ```
//!
//! Text is tokenized, parsed into a [`Node`] tree, and compiled once into a
//! resolver closure. Resolvers read [`Fields`] through the reactive layer,
//! so a rule evaluated inside a computed or a reaction re-runs exactly when a
//! field it read changes.
//!
//! # Grammar
//!
//! Binary functions have no precedence and fold left: `a OR b AND c` is
//! `(a OR b) AND c`. Parentheses are the only grouping. Sets (`[...]`) hold
//! arguments, not expressions, and nested sets flatten.
//!
//! | Function | Arity | Holds when |
//! |---|---|---|
//! | `AND` / `OR` | 2 | both / either side is truthy |
//! | `IS` / `NOT` | 2 | sides are / are not strictly equal |
//! | `IN` | 2 | every left element (or the left value) is in the right list |
//! | `<` `<=` `>` `>=` | 2 | ordering of two numbers or two strings |
//! | `LEN` | 1 | yields the string length in characters |
//! | `UNIQUE` | 1 | the list has no duplicates |
//!
//! # Errors
//!
//! Malformed text fails with [`ParseError`] when the rule is built.
//! Well-formed rules applied to the wrong shapes fail with [`EvalError`]
//! when evaluated; these are never reported as a failed rule.

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod state;
pub mod token;
pub mod validator;

pub use ast::{BinaryFunc, Literal, Node, UnaryFunc};
pub use error::{Error, EvalError, ParseError, Result};
pub use eval::{Operand, Scalar};
pub use parser::{MAX_DEPTH, parse};
pub use state::{FieldState, Fields, GroupErrors, GroupState, fields};
pub use token::{Token, TokenKind, tokenize};
pub use validator::{Expression, Validator, create_expression, create_validator_from_expression};
