#![forbid(unsafe_code)]

//! Rule evaluation.
//!
//! Each [`Node`] compiles once into a resolver closure. Resolvers read field
//! state through the reactive layer, so evaluating a rule inside a computed
//! or a reaction subscribes it to exactly the fields the rule touched.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryFunc, Literal, Node, UnaryFunc};
use crate::error::EvalError;
use crate::state::{FieldState, Fields};

/// A single value a rule can produce or read from a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// The result of evaluating any node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A path that ended on a group, or no value at all.
    Absent,
    Scalar(Scalar),
    /// Set literals; nested sets are flattened.
    List(Vec<Operand>),
}

impl Operand {
    /// `true`, a non-zero non-NaN number, a non-empty string, or any list.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Absent => false,
            Self::Scalar(Scalar::Boolean(b)) => *b,
            Self::Scalar(Scalar::Number(n)) => *n != 0.0 && !n.is_nan(),
            Self::Scalar(Scalar::String(s)) => !s.is_empty(),
            Self::List(_) => true,
        }
    }

    /// Short name of the operand's kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "nothing",
            Self::Scalar(Scalar::String(_)) => "a string",
            Self::Scalar(Scalar::Number(_)) => "a number",
            Self::Scalar(Scalar::Boolean(_)) => "a boolean",
            Self::List(_) => "a list",
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Scalar(Scalar::Number(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Scalar::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// No coercion; `NaN` differs from itself; lists compare element-wise.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        self.equals(other, false)
    }

    /// Like [`strict_eq`](Self::strict_eq) but `NaN` equals `NaN`.
    #[must_use]
    pub fn same_value_zero(&self, other: &Self) -> bool {
        self.equals(other, true)
    }

    fn equals(&self, other: &Self, nan_is_nan: bool) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Scalar(Scalar::Number(a)), Self::Scalar(Scalar::Number(b))) => {
                a == b || (nan_is_nan && a.is_nan() && b.is_nan())
            }
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y, nan_is_nan))
            }
            _ => false,
        }
    }

    fn contains(list: &[Operand], item: &Operand) -> bool {
        list.iter().any(|candidate| candidate.same_value_zero(item))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("nothing"),
            Self::Scalar(Scalar::String(s)) => write!(f, "{s:?}"),
            Self::Scalar(Scalar::Number(n)) => write!(f, "{n}"),
            Self::Scalar(Scalar::Boolean(b)) => write!(f, "{b}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<Scalar> for Operand {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Boolean(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Self::Scalar(match value {
            Literal::String(s) => Scalar::String(s),
            Literal::Number(n) => Scalar::Number(n),
            Literal::Boolean(b) => Scalar::Boolean(b),
        })
    }
}

pub(crate) type Resolver = Rc<dyn Fn(&Fields) -> Result<Operand, EvalError>>;

/// Compile `node` into a resolver.
pub(crate) fn compile(node: &Node) -> Resolver {
    match node {
        Node::Literal { value } => {
            let operand = Operand::from(value.clone());
            Rc::new(move |_: &Fields| Ok(operand.clone()))
        }
        Node::Accessor { path } => {
            let path = path.clone();
            Rc::new(move |fields: &Fields| resolve_path(fields, &path))
        }
        Node::Set { values } => {
            let items: Vec<Resolver> = values.iter().map(compile).collect();
            Rc::new(move |fields: &Fields| {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    match item(fields)? {
                        Operand::List(nested) => out.extend(nested),
                        other => out.push(other),
                    }
                }
                Ok(Operand::List(out))
            })
        }
        Node::Unary { func, arg } => {
            let func = *func;
            let arg = compile(arg);
            Rc::new(move |fields: &Fields| apply_unary(func, arg(fields)?))
        }
        Node::Binary { func, lhs, rhs } => {
            let func = *func;
            let (lhs, rhs) = (compile(lhs), compile(rhs));
            Rc::new(move |fields: &Fields| apply_binary(func, lhs(fields)?, || rhs(fields)))
        }
    }
}

/// Walk `path` through nested groups.
fn resolve_path(fields: &Fields, path: &str) -> Result<Operand, EvalError> {
    let mut segments = path.split('.').peekable();
    let mut current = fields.clone();
    while let Some(segment) = segments.next() {
        let state = current.get(segment).ok_or_else(|| EvalError::UnknownField {
            path: path.to_string(),
            segment: segment.to_string(),
        })?;
        let last = segments.peek().is_none();
        match state {
            FieldState::Group(_) if last => return Ok(Operand::Absent),
            FieldState::Group(group) => current = group.fields().clone(),
            scalar if last => return Ok(scalar.to_operand()),
            _ => {
                return Err(EvalError::NotAGroup {
                    path: path.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
    }
    Ok(Operand::Absent)
}

fn apply_unary(func: UnaryFunc, arg: Operand) -> Result<Operand, EvalError> {
    match func {
        UnaryFunc::Len => match arg {
            Operand::Absent => Err(EvalError::MissingArgument { func: func.name() }),
            Operand::Scalar(Scalar::String(s)) => Ok(Operand::from(s.chars().count() as f64)),
            other => Err(EvalError::TypeMismatch {
                func: func.name(),
                expected: "a string",
                found: other.kind(),
            }),
        },
        UnaryFunc::Unique => match arg {
            Operand::List(items) => Ok(Operand::from(
                items
                    .iter()
                    .enumerate()
                    .all(|(i, item)| !Operand::contains(&items[..i], item)),
            )),
            other => Err(EvalError::ExpectedList {
                func: func.name(),
                found: other.kind(),
            }),
        },
    }
}

/// `rhs` is only resolved when the verdict depends on it, so `AND` and `OR`
/// short-circuit.
fn apply_binary(
    func: BinaryFunc,
    lhs: Operand,
    rhs: impl FnOnce() -> Result<Operand, EvalError>,
) -> Result<Operand, EvalError> {
    let verdict = match func {
        BinaryFunc::And => lhs.is_truthy() && rhs()?.is_truthy(),
        BinaryFunc::Or => lhs.is_truthy() || rhs()?.is_truthy(),
        BinaryFunc::Is => lhs.strict_eq(&rhs()?),
        BinaryFunc::Not => !lhs.strict_eq(&rhs()?),
        BinaryFunc::In => {
            let rhs = rhs()?;
            let Operand::List(set) = &rhs else {
                return Err(EvalError::ExpectedList {
                    func: func.name(),
                    found: rhs.kind(),
                });
            };
            match &lhs {
                Operand::List(keys) => keys.iter().all(|key| Operand::contains(set, key)),
                key => Operand::contains(set, key),
            }
        }
        BinaryFunc::Lt | BinaryFunc::Le | BinaryFunc::Gt | BinaryFunc::Ge => {
            let rhs = rhs()?;
            let Some(ordering) = compare(func, &lhs, &rhs)? else {
                return Ok(Operand::from(false));
            };
            match func {
                BinaryFunc::Lt => ordering == Ordering::Less,
                BinaryFunc::Le => ordering != Ordering::Greater,
                BinaryFunc::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    };
    Ok(Operand::from(verdict))
}

/// Order two numbers or two strings. `None` when a number is NaN.
fn compare(func: BinaryFunc, lhs: &Operand, rhs: &Operand) -> Result<Option<Ordering>, EvalError> {
    match (lhs, rhs) {
        (Operand::Scalar(Scalar::Number(a)), Operand::Scalar(Scalar::Number(b))) => {
            Ok(a.partial_cmp(b))
        }
        (Operand::Scalar(Scalar::String(a)), Operand::Scalar(Scalar::String(b))) => {
            Ok(Some(a.cmp(b)))
        }
        _ => {
            let found = if matches!(
                lhs,
                Operand::Scalar(Scalar::Number(_) | Scalar::String(_))
            ) {
                rhs.kind()
            } else {
                lhs.kind()
            };
            Err(EvalError::TypeMismatch {
                func: func.name(),
                expected: "two numbers or two strings",
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::state::{GroupState, fields};
    use formwork_reactive::Runtime;

    fn eval(src: &str, state: &Fields) -> Result<Operand, EvalError> {
        compile(&parse(src).unwrap())(state)
    }

    fn empty(rt: &Runtime) -> Fields {
        fields(rt, Vec::<(&str, FieldState)>::new())
    }

    #[test]
    fn truthiness() {
        assert!(!Operand::Absent.is_truthy());
        assert!(!Operand::from(0.0).is_truthy());
        assert!(!Operand::from(f64::NAN).is_truthy());
        assert!(Operand::from(-2.0).is_truthy());
        assert!(!Operand::from("").is_truthy());
        assert!(Operand::from("x").is_truthy());
        assert!(Operand::List(Vec::new()).is_truthy());
    }

    #[test]
    fn equality_flavours_differ_on_nan() {
        let nan = Operand::from(f64::NAN);
        assert!(!nan.strict_eq(&nan));
        assert!(nan.same_value_zero(&nan));
        assert!(Operand::from(0.0).strict_eq(&Operand::from(-0.0)));
        assert!(!Operand::from(1.0).strict_eq(&Operand::from("1")));
        assert!(
            Operand::List(vec![Operand::from(1.0), Operand::from("a")])
                .strict_eq(&Operand::List(vec![Operand::from(1.0), Operand::from("a")]))
        );
    }

    #[test]
    fn sets_flatten_nested_sets() {
        let rt = Runtime::new();
        assert_eq!(
            eval("[1 [2 [3]] 'x']", &empty(&rt)),
            Ok(Operand::List(vec![
                Operand::from(1.0),
                Operand::from(2.0),
                Operand::from(3.0),
                Operand::from("x"),
            ]))
        );
    }

    #[test]
    fn len_counts_characters() {
        let rt = Runtime::new();
        let state = fields(&rt, [("name", FieldState::from("héllo"))]);
        assert_eq!(eval("LEN name", &state), Ok(Operand::from(5.0)));
        assert_eq!(eval("LEN ''", &state), Ok(Operand::from(0.0)));
    }

    #[test]
    fn len_rejects_absent_and_non_strings() {
        let rt = Runtime::new();
        let inner = GroupState::new(empty(&rt), Vec::new());
        let state = fields(
            &rt,
            [("age", FieldState::from(3.0)), ("group", FieldState::from(inner))],
        );
        assert_eq!(
            eval("LEN group", &state),
            Err(EvalError::MissingArgument { func: "LEN" })
        );
        assert_eq!(
            eval("LEN age", &state),
            Err(EvalError::TypeMismatch {
                func: "LEN",
                expected: "a string",
                found: "a number"
            })
        );
    }

    #[test]
    fn in_and_unique_require_lists() {
        let rt = Runtime::new();
        let state = empty(&rt);
        assert_eq!(
            eval("1 IN 1", &state),
            Err(EvalError::ExpectedList {
                func: "IN",
                found: "a number"
            })
        );
        assert_eq!(
            eval("UNIQUE 'abc'", &state),
            Err(EvalError::ExpectedList {
                func: "UNIQUE",
                found: "a string"
            })
        );
        assert_eq!(eval("[] IN [1]", &state), Ok(Operand::from(true)));
        assert_eq!(eval("UNIQUE []", &state), Ok(Operand::from(true)));
    }

    #[test]
    fn comparisons_need_matching_kinds() {
        let rt = Runtime::new();
        let state = empty(&rt);
        assert_eq!(eval("'a' < 'b'", &state), Ok(Operand::from(true)));
        assert_eq!(eval("'b' >= 'b'", &state), Ok(Operand::from(true)));
        assert_eq!(
            eval("1 < 'b'", &state),
            Err(EvalError::TypeMismatch {
                func: "<",
                expected: "two numbers or two strings",
                found: "a string"
            })
        );
        assert_eq!(
            eval("true > 1", &state),
            Err(EvalError::TypeMismatch {
                func: ">",
                expected: "two numbers or two strings",
                found: "a boolean"
            })
        );
    }

    #[test]
    fn and_or_short_circuit() {
        let rt = Runtime::new();
        let state = empty(&rt);
        assert_eq!(eval("false AND LEN missing", &state), Ok(Operand::from(false)));
        assert_eq!(eval("true OR LEN missing", &state), Ok(Operand::from(true)));
        assert!(eval("true AND LEN missing", &state).is_err());
        assert!(eval("false OR LEN missing", &state).is_err());
    }

    #[test]
    fn other_binary_functions_always_resolve_the_right_side() {
        let rt = Runtime::new();
        let state = empty(&rt);
        for rule in ["false IS LEN missing", "1 < LEN missing", "1 IN LEN missing"] {
            assert!(eval(rule, &state).is_err(), "{rule}");
        }
    }

    #[test]
    fn accessor_errors_name_the_segment() {
        let rt = Runtime::new();
        let state = fields(&rt, [("a", FieldState::from("value"))]);
        assert_eq!(
            eval("missing IS 1", &state),
            Err(EvalError::UnknownField {
                path: "missing".into(),
                segment: "missing".into()
            })
        );
        assert_eq!(
            eval("a.b IS 1", &state),
            Err(EvalError::NotAGroup {
                path: "a.b".into(),
                segment: "a".into()
            })
        );
    }

    #[test]
    fn operand_display() {
        let list = Operand::List(vec![Operand::from(1.0), Operand::from("a"), Operand::Absent]);
        assert_eq!(list.to_string(), r#"[1 "a" nothing]"#);
    }
}
