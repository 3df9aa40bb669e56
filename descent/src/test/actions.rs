#![allow(clippy::missing_docs_in_private_items)]

use crate::action::{parse_expr, transform, ActionExpr, ActionItem};

#[test]
fn bare_digits_become_references() {
    let t = transform(r#"["+", 1, 3]"#);
    assert_eq!(t.text, r#"["+", $$1, $$3]"#);
    assert_eq!(t.positions, vec![1, 3]);
    assert_eq!(t.pass_through, None);
}

#[test]
fn a_single_bare_digit_is_a_pass_through() {
    let t = transform("1");
    assert_eq!(t.text, "$$1");
    assert_eq!(t.positions, vec![1]);
    assert_eq!(t.pass_through, Some(1));
}

#[test]
fn value_suffix_follows_the_reference() {
    let t = transform("2.value");
    assert_eq!(t.text, "$$2.value");
    assert_eq!(t.positions, vec![2]);

    let t = transform(r#"["str", 1.value]"#);
    assert_eq!(t.text, r#"["str", $$1.value]"#);
    assert_eq!(t.positions, vec![1]);
}

#[test]
fn float_literals_are_not_references() {
    let t = transform(r#"["n", 1.5]"#);
    assert_eq!(t.text, r#"["n", 1.5]"#);
    assert!(t.positions.is_empty());
}

#[test]
fn dollar_mode_leaves_bare_digits_alone() {
    let t = transform("[$1, 2, $3]");
    assert_eq!(t.text, "[$$1, 2, $$3]");
    assert_eq!(t.positions, vec![1, 3]);
}

#[test]
fn string_contents_are_untouched() {
    let t = transform(r#"["lit", "a 1 b", 'c 2 d']"#);
    assert_eq!(t.text, r#"["lit", "a 1 b", 'c 2 d']"#);
    assert!(t.positions.is_empty());
}

#[test]
fn spread_operands_are_references() {
    let t = transform(r#"["program", ...1]"#);
    assert_eq!(t.text, r#"["program", ...$$1]"#);
    assert_eq!(t.positions, vec![1]);
}

#[test]
fn digits_glued_to_identifiers_are_untouched() {
    let t = transform("[x1, 1e3]");
    assert_eq!(t.text, "[x1, 1e3]");
    assert!(t.positions.is_empty());
}

#[test]
fn everything_else_is_character_identical() {
    let t = transform(r#"[ "+" , 1 ,   3 ]"#);
    assert_eq!(t.text, r#"[ "+" , $$1 ,   $$3 ]"#);
}

#[test]
fn transformed_actions_parse_into_trees() {
    let expr = parse_expr(r#"["+", $$1, $$3]"#).unwrap();
    assert_eq!(
        expr,
        ActionExpr::Array(vec![
            ActionItem::Expr(ActionExpr::Str("+".to_string())),
            ActionItem::Expr(ActionExpr::Ref(1)),
            ActionItem::Expr(ActionExpr::Ref(3)),
        ])
    );
}

#[test]
fn trees_cover_spreads_and_literals() {
    let expr = parse_expr(r#"["a", ...$$2, null, true, -4, $$1.value]"#).unwrap();
    assert_eq!(
        expr,
        ActionExpr::Array(vec![
            ActionItem::Expr(ActionExpr::Str("a".to_string())),
            ActionItem::Spread(ActionExpr::Ref(2)),
            ActionItem::Expr(ActionExpr::Null),
            ActionItem::Expr(ActionExpr::Bool(true)),
            ActionItem::Expr(ActionExpr::Num(-4.0)),
            ActionItem::Expr(ActionExpr::RefValue(1)),
        ])
    );
}

#[test]
fn actions_outside_the_subset_are_refused() {
    assert_eq!(parse_expr("makeNode($$1)"), None);
    assert_eq!(parse_expr("[$$1] + [$$2]"), None);
}
