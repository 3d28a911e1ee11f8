//! Property-based invariant tests for the rule language.
//!
//! These tests verify properties that must hold for **any** well-formed
//! rule:
//!
//! 1. A chain of binary functions without parentheses folds left.
//! 2. The display form of a parsed tree parses back to the same tree.
//! 3. `NOT` is the exact negation of `IS` on scalars.
//! 4. `IN` with a single-element left list agrees with `IN` on the element.
//! 5. Evaluating constant rules never depends on field state.

use formwork_reactive::Runtime;
use formwork_rules::{
    BinaryFunc, FieldState, Literal, Node, Operand, UnaryFunc, create_expression, fields, parse,
};
use proptest::prelude::*;

// ═════════════════════════════════════════════════════════════════════════
// Strategies
// ═════════════════════════════════════════════════════════════════════════

fn binary_func() -> impl Strategy<Value = BinaryFunc> {
    proptest::sample::select(BinaryFunc::ALL.to_vec())
}

fn accessor() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}(\\.[a-z_][a-z0-9_]{0,4}){0,2}"
        .prop_filter("keywords are literals", |s| s != "true" && s != "false")
}

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        "[a-zA-Z0-9_#.-]{0,8}".prop_map(Literal::String),
        (-1.0e6..1.0e6f64).prop_map(Literal::Number),
        any::<bool>().prop_map(Literal::Boolean),
    ]
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        literal().prop_map(|value| Node::Literal { value }),
        accessor().prop_map(|path| Node::accessor(path)),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            (proptest::sample::select(UnaryFunc::ALL.to_vec()), inner.clone())
                .prop_map(|(func, arg)| Node::unary(func, arg)),
            (binary_func(), inner.clone(), inner.clone())
                .prop_map(|(func, lhs, rhs)| Node::binary(func, lhs, rhs)),
            proptest::collection::vec(inner, 0..4).prop_map(|values| Node::set(values)),
        ]
    })
}

fn scalar() -> impl Strategy<Value = Literal> {
    prop_oneof![
        "[a-z]{1,4}".prop_map(|s| Literal::String(format!("'{s}'"))),
        (-100i32..100).prop_map(|n| Literal::Number(f64::from(n))),
        any::<bool>().prop_map(Literal::Boolean),
    ]
}

/// Source text for a scalar produced by [`scalar`]. Strings already carry
/// their quotes.
fn source(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Left fold
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unparenthesized_chains_fold_left(
        names in proptest::collection::vec(accessor(), 2..6),
        funcs in proptest::collection::vec(binary_func(), 5),
    ) {
        let mut text = names[0].clone();
        let mut expected = Node::accessor(names[0].clone());
        for (name, func) in names[1..].iter().zip(&funcs) {
            text = format!("{text} {func} {name}");
            expected = Node::binary(*func, expected, Node::accessor(name.clone()));
        }
        prop_assert_eq!(parse(&text), Ok(expected));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Display reparses
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn display_form_parses_back(tree in node()) {
        let text = tree.to_string();
        prop_assert_eq!(parse(&text), Ok(tree), "display: {}", text);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-5. Evaluation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn not_negates_is(a in scalar(), b in scalar()) {
        let rt = Runtime::new();
        let state = fields(&rt, Vec::<(String, FieldState)>::new());
        let is = create_expression(&format!("{} IS {}", source(&a), source(&b))).unwrap();
        let not = create_expression(&format!("{} NOT {}", source(&a), source(&b))).unwrap();
        prop_assert_eq!(is.test(&state).unwrap(), !not.test(&state).unwrap());
    }

    #[test]
    fn single_element_list_membership_matches_scalar(
        a in scalar(),
        set in proptest::collection::vec(scalar(), 0..5),
    ) {
        let rt = Runtime::new();
        let state = fields(&rt, Vec::<(String, FieldState)>::new());
        let items: Vec<String> = set.iter().map(source).collect();
        let items = items.join(" ");
        let plain = create_expression(&format!("{} IN [{items}]", source(&a))).unwrap();
        let listed = create_expression(&format!("[{}] IN [{items}]", source(&a))).unwrap();
        prop_assert_eq!(plain.evaluate(&state), listed.evaluate(&state));
    }

    #[test]
    fn constant_rules_ignore_field_state(
        a in -50i32..50,
        b in -50i32..50,
        value in "[a-z]{0,6}",
    ) {
        let rt = Runtime::new();
        let empty = fields(&rt, Vec::<(String, FieldState)>::new());
        let filled = fields(&rt, [("x", FieldState::from(value))]);
        let expr = create_expression(&format!("({a} < {b}) OR ({a} IS {b})")).unwrap();
        let expected = Operand::from(a <= b);
        prop_assert_eq!(expr.evaluate(&empty), Ok(expected.clone()));
        prop_assert_eq!(expr.evaluate(&filled), Ok(expected));
    }
}
