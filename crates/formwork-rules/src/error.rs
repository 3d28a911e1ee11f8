#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed rule text. Offsets are byte offsets into the expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unknown function `{name}` at offset {offset}")]
    UnknownFunction { name: String, offset: usize },

    #[error("could not parse `{text}` at offset {offset}")]
    InvalidLiteral { text: String, offset: usize },

    #[error("expected {expected} at offset {offset}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        offset: usize,
    },

    #[error("expected {expected} but the expression ended")]
    UnexpectedEnd { expected: &'static str },

    #[error("unmatched `{bracket}` at offset {offset}")]
    Unmatched { bracket: char, offset: usize },

    #[error("expression nests deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}

impl ParseError {
    /// Byte offset the error points at, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Empty | Self::UnexpectedEnd { .. } => None,
            Self::UnknownFunction { offset, .. }
            | Self::InvalidLiteral { offset, .. }
            | Self::UnexpectedToken { offset, .. }
            | Self::Unmatched { offset, .. }
            | Self::TooDeep { offset, .. } => Some(*offset),
        }
    }
}

/// A well-formed rule applied to values of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unknown field `{segment}` in `{path}`")]
    UnknownField { path: String, segment: String },

    #[error("field `{segment}` in `{path}` is not a group")]
    NotAGroup { path: String, segment: String },

    #[error("{func} expects a list, found {found}")]
    ExpectedList {
        func: &'static str,
        found: &'static str,
    },

    #[error("{func} received no value")]
    MissingArgument { func: &'static str },

    #[error("{func} expects {expected}, found {found}")]
    TypeMismatch {
        func: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
