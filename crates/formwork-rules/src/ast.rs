#![forbid(unsafe_code)]

//! Rule syntax trees.
//!
//! A parsed rule is an immutable [`Node`] tree. `Display` prints the
//! canonical fully parenthesized form, which parses back to the same tree
//! as long as no string literal contains a space or bracket.

use std::fmt;

/// Functions applied to one argument: `LEN a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum UnaryFunc {
    Len,
    Unique,
}

impl UnaryFunc {
    pub const ALL: [Self; 2] = [Self::Len, Self::Unique];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "LEN",
            Self::Unique => "UNIQUE",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|func| func.name() == name)
    }
}

/// Functions joining two arguments: `a AND b`, `a <= b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum BinaryFunc {
    And,
    Or,
    /// Binary inequality, not negation.
    Not,
    Is,
    In,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryFunc {
    pub const ALL: [Self; 9] = [
        Self::And,
        Self::Or,
        Self::Not,
        Self::Is,
        Self::In,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Is => "IS",
            Self::In => "IN",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|func| func.name() == name)
    }
}

impl fmt::Display for UnaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for BinaryFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "lowercase"))]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) if s.contains('"') => write!(f, "'{s}'"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Node {
    Literal { value: Literal },
    /// Dot-separated field path, e.g. `address.city`.
    Accessor { path: String },
    Set { values: Vec<Node> },
    Unary { func: UnaryFunc, arg: Box<Node> },
    Binary {
        func: BinaryFunc,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
}

impl Node {
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal {
            value: Literal::String(value.into()),
        }
    }

    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Literal {
            value: Literal::Number(value),
        }
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::Literal {
            value: Literal::Boolean(value),
        }
    }

    #[must_use]
    pub fn accessor(path: impl Into<String>) -> Self {
        Self::Accessor { path: path.into() }
    }

    #[must_use]
    pub fn set(values: impl IntoIterator<Item = Node>) -> Self {
        Self::Set {
            values: values.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn unary(func: UnaryFunc, arg: Node) -> Self {
        Self::Unary {
            func,
            arg: Box::new(arg),
        }
    }

    #[must_use]
    pub fn binary(func: BinaryFunc, lhs: Node, rhs: Node) -> Self {
        Self::Binary {
            func,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Every accessor path in the tree, left to right.
    #[must_use]
    pub fn accessors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_accessors(&mut out);
        out
    }

    fn collect_accessors<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Literal { .. } => {}
            Self::Accessor { path } => out.push(path),
            Self::Set { values } => values.iter().for_each(|v| v.collect_accessors(out)),
            Self::Unary { arg, .. } => arg.collect_accessors(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_accessors(out);
                rhs.collect_accessors(out);
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { value } => write!(f, "{value}"),
            Self::Accessor { path } => f.write_str(path),
            Self::Set { values } => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            Self::Unary { func, arg } => write!(f, "({func} {arg})"),
            Self::Binary { func, lhs, rhs } => write!(f, "({lhs} {func} {rhs})"),
        }
    }
}
