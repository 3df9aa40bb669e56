#![allow(clippy::missing_docs_in_private_items)]

use std::collections::HashSet;

use crate::cfg::{Grammar, RuleSpec, END};
use crate::ll1::analyze;

/// Shorthand for building one rule spec
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

/// The left-recursive additive grammar:
/// Expr -> Expr '+' Term | Expr '-' Term | Term ; Term -> NUMBER
fn additive() -> Grammar {
    Grammar::new(
        "Expr",
        vec![
            r("Expr", &["Expr", "+", "Term"], "[\"+\", 1, 3]"),
            r("Expr", &["Expr", "-", "Term"], "[\"-\", 1, 3]"),
            r("Expr", &["Term"], "1"),
            r("Term", &["NUMBER"], "1"),
        ],
        terminals(&["NUMBER", "+", "-"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap()
}

/// The same language right-factored into LL(1) form
fn additive_factored() -> Grammar {
    Grammar::new(
        "Expr",
        vec![
            r("Expr", &["Term", "ExprTail"], "1"),
            r("ExprTail", &[], "[]"),
            r("ExprTail", &["+", "Term", "ExprTail"], "1"),
            r("ExprTail", &["-", "Term", "ExprTail"], "1"),
            r("Term", &["NUMBER"], "1"),
        ],
        terminals(&["NUMBER", "+", "-"]),
        Vec::new(),
        Default::default(),
    )
    .unwrap()
}

#[test]
fn additive_first_sets() {
    env_logger::try_init().ok();
    let analysis = analyze(&additive());

    assert_eq!(*analysis.first("Expr"), set(&["NUMBER"]));
    assert_eq!(*analysis.first("Term"), set(&["NUMBER"]));
    assert!(!analysis.nullable("Expr"));
    assert!(!analysis.nullable("Term"));
}

#[test]
fn additive_follow_sets() {
    env_logger::try_init().ok();
    let analysis = analyze(&additive());

    // the start symbol is followed by the end sentinel and, through the
    // left recursion, by both operators
    assert_eq!(*analysis.follow("Expr"), set(&[END, "+", "-"]));
    assert_eq!(*analysis.follow("Term"), set(&[END, "+", "-"]));
}

#[test]
fn additive_select_and_conflicts() {
    env_logger::try_init().ok();
    let analysis = analyze(&additive());

    // all three Expr alternatives start with NUMBER, so the grammar is
    // not LL(1) as written; the chain pattern resolves this later
    assert_eq!(*analysis.select(0), set(&["NUMBER"]));
    assert_eq!(*analysis.select(1), set(&["NUMBER"]));
    assert_eq!(*analysis.select(2), set(&["NUMBER"]));
    assert!(!analysis.is_ll1());
    assert!(analysis.conflicted("Expr"));
    assert!(!analysis.conflicted("Term"));

    let conflict = &analysis.conflicts()[0];
    assert_eq!(conflict.nonterminal, "Expr");
    assert_eq!(conflict.rules, (0, 1));
    assert_eq!(conflict.terminals, vec!["NUMBER".to_string()]);
}

#[test]
fn factored_form_is_ll1() {
    env_logger::try_init().ok();
    let analysis = analyze(&additive_factored());

    assert!(analysis.is_ll1());
    assert!(analysis.nullable("ExprTail"));
    assert_eq!(*analysis.first("ExprTail"), set(&["+", "-"]));
    // SELECT of the ε alternative falls back to FOLLOW(ExprTail)
    assert_eq!(*analysis.select(1), set(&[END]));
    assert_eq!(*analysis.select(2), set(&["+"]));
    assert_eq!(*analysis.select(3), set(&["-"]));
}

#[test]
fn select_disjointness_matches_conflict_report() {
    env_logger::try_init().ok();

    for grammar in [additive(), additive_factored()] {
        let analysis = analyze(&grammar);
        let mut overlap = false;

        for nt in grammar.nonterminals() {
            let alts = grammar.alternatives(nt);
            for (i, &a) in alts.iter().enumerate() {
                for &b in &alts[i + 1..] {
                    if !analysis.select(a).is_disjoint(analysis.select(b)) {
                        overlap = true;
                    }
                }
            }
        }

        assert_eq!(analysis.is_ll1(), !overlap);
    }
}
