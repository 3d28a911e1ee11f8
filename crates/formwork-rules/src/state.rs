#![forbid(unsafe_code)]

//! Field state that rules evaluate against.
//!
//! A form is a [`Fields`] table: field name to [`FieldState`]. Groups nest
//! their own table and carry validators whose failures are collected in a
//! lazily computed `errors` cell. Children never point back at their group.

use std::fmt;
use std::rc::Rc;

use formwork_reactive::{Computed, ReactiveObject, Runtime};

use crate::error::{EvalError, ParseError};
use crate::eval::{Operand, Scalar};
use crate::validator::{Validator, create_validator_from_expression};

/// Field name to current state, tracked per field.
pub type Fields = ReactiveObject<FieldState>;

/// Build a [`Fields`] table from `(name, state)` pairs.
pub fn fields<K, V, I>(runtime: &Runtime, entries: I) -> Fields
where
    K: Into<String>,
    V: Into<FieldState>,
    I: IntoIterator<Item = (K, V)>,
{
    ReactiveObject::new(
        runtime,
        entries.into_iter().map(|(key, value)| (key, value.into())),
    )
}

/// The current value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    Text(String),
    Number(f64),
    Flag(bool),
    Group(GroupState),
}

impl FieldState {
    /// The field's value as a rule operand. Groups have no value of their
    /// own.
    #[must_use]
    pub fn to_operand(&self) -> Operand {
        match self {
            Self::Text(s) => Operand::Scalar(Scalar::String(s.clone())),
            Self::Number(n) => Operand::Scalar(Scalar::Number(*n)),
            Self::Flag(b) => Operand::Scalar(Scalar::Boolean(*b)),
            Self::Group(_) => Operand::Absent,
        }
    }

    #[must_use]
    pub fn as_group(&self) -> Option<&GroupState> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }
}

impl From<&str> for FieldState {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldState {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldState {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldState {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<GroupState> for FieldState {
    fn from(value: GroupState) -> Self {
        Self::Group(value)
    }
}

/// Validation failures of a group, or the first evaluation error.
pub type GroupErrors = Result<Vec<String>, EvalError>;

struct GroupInner {
    fields: Fields,
    validators: Vec<Validator>,
    errors: Computed<GroupErrors>,
}

/// A field group: its own fields plus the validators run over them.
///
/// Cloning a `GroupState` creates a new handle to the **same** group; two
/// handles compare equal only if they share it.
#[derive(Clone)]
pub struct GroupState {
    inner: Rc<GroupInner>,
}

impl GroupState {
    /// Group `fields` under `validators`. The errors cell is created now and
    /// evaluated on first read.
    #[must_use]
    pub fn new(fields: Fields, validators: Vec<Validator>) -> Self {
        let errors: Computed<GroupErrors> = {
            let runtime = fields.runtime().clone();
            let fields = fields.clone();
            let validators = validators.clone();
            Computed::new(&runtime, move || {
                validators
                    .iter()
                    .filter_map(|validator| validator.validate(&fields).transpose())
                    .map(|failure| failure.map(str::to_string))
                    .collect()
            })
        };
        Self {
            inner: Rc::new(GroupInner {
                fields,
                validators,
                errors,
            }),
        }
    }

    /// Compile `(expression, message)` rules and group `fields` under them.
    ///
    /// # Errors
    ///
    /// The first rule that fails to parse.
    pub fn with_rules<'r>(
        fields: Fields,
        rules: impl IntoIterator<Item = (&'r str, &'r str)>,
    ) -> Result<Self, ParseError> {
        let validators = rules
            .into_iter()
            .map(|(expression, message)| create_validator_from_expression(expression, message))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(fields, validators))
    }

    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.inner.fields
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.inner.validators
    }

    /// Messages of every failing validator, in declaration order. Tracked:
    /// reading this inside a reaction re-runs it when a field any
    /// validator read changes.
    ///
    /// # Errors
    ///
    /// The first [`EvalError`] raised by a validator.
    pub fn errors(&self) -> GroupErrors {
        self.inner.errors.get()
    }

    /// The lazily computed errors cell.
    #[must_use]
    pub fn errors_cell(&self) -> &Computed<GroupErrors> {
        &self.inner.errors
    }

    /// Whether every validator passes.
    ///
    /// # Errors
    ///
    /// The first [`EvalError`] raised by a validator.
    pub fn is_valid(&self) -> Result<bool, EvalError> {
        self.inner.errors.with(|errors| match errors {
            Ok(messages) => Ok(messages.is_empty()),
            Err(err) => Err(err.clone()),
        })
    }
}

impl PartialEq for GroupState {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupState")
            .field("fields", &self.inner.fields.keys())
            .field("validators", &self.inner.validators.len())
            .finish()
    }
}
