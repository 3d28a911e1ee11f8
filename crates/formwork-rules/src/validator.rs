#![forbid(unsafe_code)]

//! Compiled rules.
//!
//! An [`Expression`] is parsed and compiled once, then evaluated any number
//! of times against field state. A [`Validator`] pairs an expression with the
//! message reported when it does not hold.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::ast::Node;
use crate::error::{EvalError, ParseError};
use crate::eval::{Operand, Resolver, compile};
use crate::parser::parse;
use crate::state::Fields;

/// A parsed and compiled rule.
///
/// Cloning is cheap; clones share the tree and the compiled resolver.
#[derive(Clone)]
pub struct Expression {
    source: Rc<str>,
    ast: Rc<Node>,
    resolver: Resolver,
}

impl Expression {
    /// Parse and compile `source`.
    ///
    /// # Errors
    ///
    /// The [`ParseError`] describing why `source` is malformed.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let ast = parse(source)?;
        Ok(Self::compiled(source.into(), ast))
    }

    /// Compile an already-built tree. The source text is its display form.
    #[must_use]
    pub fn from_node(ast: Node) -> Self {
        Self::compiled(ast.to_string().into(), ast)
    }

    fn compiled(source: Rc<str>, ast: Node) -> Self {
        let resolver = compile(&ast);
        Self {
            source,
            ast: Rc::new(ast),
            resolver,
        }
    }

    /// Evaluate against `fields`, recording every field read.
    ///
    /// # Errors
    ///
    /// An [`EvalError`] when a value has the wrong shape for the function
    /// applied to it, or an accessor does not resolve.
    pub fn evaluate(&self, fields: &Fields) -> Result<Operand, EvalError> {
        (self.resolver)(fields)
    }

    /// Evaluate and reduce the result to its truthiness.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn test(&self, fields: &Fields) -> Result<bool, EvalError> {
        self.evaluate(fields).map(|operand| operand.is_truthy())
    }

    #[must_use]
    pub fn ast(&self) -> &Node {
        &self.ast
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("ast", &self.ast)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.ast == other.ast
    }
}

/// A rule and the message reported when it fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    expression: Expression,
    message: Rc<str>,
}

impl Validator {
    #[must_use]
    pub fn new(expression: Expression, message: impl Into<Rc<str>>) -> Self {
        Self {
            expression,
            message: message.into(),
        }
    }

    /// `Ok(None)` when the rule holds, `Ok(Some(message))` when it does not.
    ///
    /// # Errors
    ///
    /// Evaluation errors are returned as-is, never folded into a failure.
    pub fn validate(&self, fields: &Fields) -> Result<Option<&str>, EvalError> {
        let passed = self.expression.test(fields)?;
        Ok((!passed).then_some(&*self.message))
    }

    #[must_use]
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse `expression` into a compiled [`Expression`].
///
/// # Errors
///
/// The [`ParseError`] describing why `expression` is malformed.
pub fn create_expression(expression: &str) -> Result<Expression, ParseError> {
    let compiled = Expression::parse(expression)?;
    tracing::trace!(
        target: "formwork::rules",
        expression,
        accessors = compiled.ast().accessors().len(),
        "compiled expression"
    );
    Ok(compiled)
}

/// Parse `expression` once and pair it with `message`.
///
/// # Errors
///
/// The [`ParseError`] describing why `expression` is malformed.
pub fn create_validator_from_expression(
    expression: &str,
    message: &str,
) -> Result<Validator, ParseError> {
    let compiled = Expression::parse(expression)?;
    tracing::trace!(target: "formwork::rules", expression, message, "compiled validator");
    Ok(Validator::new(compiled, message))
}
