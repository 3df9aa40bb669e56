#![allow(clippy::missing_docs_in_private_items)]

use std::collections::HashSet;

use crate::cfg::{Error, Grammar, RuleSpec, END};
use crate::ll1::analyze;

fn r(lhs: &str, rhs: &[&str], action: &str) -> RuleSpec {
    (
        lhs.to_string(),
        rhs.iter().map(|s| s.to_string()).collect(),
        action.to_string(),
    )
}

fn terminals(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn nullable_propagates_through_chains() {
    env_logger::try_init().ok();

    // A -> B C ; B -> ε ; C -> ε | NUMBER
    let grammar = Grammar::new(
        "A",
        vec![
            r("A", &["B", "C"], "1"),
            r("B", &[], "[]"),
            r("C", &[], "[]"),
            r("C", &["NUMBER"], "1"),
        ],
        terminals(&["NUMBER"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();
    let analysis = analyze(&grammar);

    assert!(analysis.nullable("A"));
    assert!(analysis.nullable("B"));
    assert!(analysis.nullable("C"));
}

#[test]
fn adding_an_empty_rule_flips_nullable() {
    env_logger::try_init().ok();

    let without = Grammar::new(
        "A",
        vec![r("A", &["NUMBER"], "1")],
        terminals(&["NUMBER"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();
    assert!(!analyze(&without).nullable("A"));

    let with = Grammar::new(
        "A",
        vec![r("A", &["NUMBER"], "1"), r("A", &[], "[]")],
        terminals(&["NUMBER"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();
    assert!(analyze(&with).nullable("A"));
}

#[test]
fn terminator_list_analysis() {
    env_logger::try_init().ok();

    // Args -> ε | ',' Arg Args ; Arg -> NUMBER   (right-recursive tail)
    let grammar = Grammar::new(
        "Args",
        vec![
            r("Args", &[], "[]"),
            r("Args", &[",", "Arg", "Args"], "1"),
            r("Arg", &["NUMBER"], "1"),
        ],
        terminals(&["NUMBER", ","]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();
    let analysis = analyze(&grammar);

    assert!(analysis.nullable("Args"));
    assert_eq!(*analysis.first("Args"), set(&[","]));
    assert_eq!(*analysis.follow("Args"), set(&[END]));
    // SELECT(ε) = FOLLOW(Args) = {$end}, disjoint from {','}
    assert!(analysis.is_ll1());
}

#[test]
fn separated_list_conflict_is_reported_precisely() {
    env_logger::try_init().ok();

    // List -> ε | List ',' NUMBER : ε selects on FOLLOW(List) which
    // contains ',' through the recursion, so rules 0 and 1 collide
    let grammar = Grammar::new(
        "List",
        vec![r("List", &[], "[]"), r("List", &["List", ",", "NUMBER"], "1")],
        terminals(&["NUMBER", ","]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();
    let analysis = analyze(&grammar);

    assert!(!analysis.is_ll1());
    let conflict = &analysis.conflicts()[0];
    assert_eq!(conflict.nonterminal, "List");
    assert_eq!(conflict.rules, (0, 1));
    assert_eq!(conflict.terminals, vec![",".to_string()]);
}

#[test]
fn unknown_symbols_are_rejected() {
    let err = Grammar::new(
        "A",
        vec![r("A", &["Mystery"], "1")],
        terminals(&["NUMBER"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        Error::UnknownSymbol {
            symbol: "Mystery".to_string(),
            rule: 0,
            nonterminal: "A".to_string(),
        }
    );
}

#[test]
fn classification_is_by_lhs_presence_not_case() {
    // lower-case name on an LHS is a nonterminal, upper-case name that
    // never appears on an LHS is a terminal
    let grammar = Grammar::new(
        "program",
        vec![r("program", &["stmt"], "1"), r("stmt", &["IDENT"], "1")],
        terminals(&["IDENT"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap();

    assert_eq!(grammar.nonterminals(), ["program", "stmt"]);
    assert!(grammar.terminals().contains("IDENT"));
}

#[test]
fn start_symbol_must_be_defined() {
    let err = Grammar::new(
        "Missing",
        vec![r("A", &["NUMBER"], "1")],
        terminals(&["NUMBER"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap_err();

    assert_eq!(err, Error::UndefinedStart("Missing".to_string()));
}
