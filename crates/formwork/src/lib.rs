#![forbid(unsafe_code)]

//! formwork public facade crate.
//!
//! Reactive form state and the rule language that validates it.

pub use formwork_reactive as reactive;
pub use formwork_rules as rules;

pub mod prelude {
    pub use formwork_reactive::{
        Computed, ReactiveArray, ReactiveError, ReactiveObject, Reaction, Runtime, RuntimeConfig,
        Value, Watcher,
    };
    pub use formwork_rules::{
        EvalError, Expression, FieldState, Fields, GroupState, ParseError, Validator,
        create_expression, create_validator_from_expression, fields,
    };
}
