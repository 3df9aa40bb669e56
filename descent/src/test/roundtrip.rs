#![allow(clippy::missing_docs_in_private_items)]

use std::collections::{HashSet, VecDeque};

use grammar::cfg::{Grammar, Symbol};
use grammar::ll1;

use crate::interp::{self, Token, TokenLexer};
use crate::sexpr::Value;
use crate::{loader, pattern, plan};

fn build(source: &str) -> (Grammar, plan::Plan) {
    env_logger::try_init().ok();
    let grammar = loader::load(source, "test.grammar").unwrap();
    let analysis = ll1::analyze(&grammar);
    let classified = pattern::classify(&grammar, &analysis);
    let plan = plan::build(&grammar, &analysis, &classified).unwrap();
    (grammar, plan)
}

/// Every sentence of the grammar up to `max_len` terminals, by leftmost
/// expansion with a length bound
fn sentences(grammar: &Grammar, max_len: usize) -> HashSet<Vec<String>> {
    let analysis = ll1::analyze(grammar);
    let mut out = HashSet::new();
    let mut seen: HashSet<Vec<Symbol>> = HashSet::new();
    let mut queue: VecDeque<Vec<Symbol>> =
        VecDeque::from([vec![Symbol::Nonterminal(grammar.start().to_string())]]);

    while let Some(form) = queue.pop_front() {
        // every terminal and non-nullable nonterminal contributes at
        // least one token; prune forms that cannot shrink back down
        let lower_bound = form
            .iter()
            .filter(|s| match s {
                Symbol::Terminal(_) => true,
                Symbol::Nonterminal(n) => !analysis.nullable(n),
            })
            .count();
        if lower_bound > max_len {
            continue;
        }

        let Some(at) = form
            .iter()
            .position(|s| matches!(s, Symbol::Nonterminal(_)))
        else {
            out.insert(form.iter().map(|s| s.name().to_string()).collect());
            continue;
        };
        let name = form[at].name().to_string();

        for &ri in grammar.alternatives(&name) {
            let mut next: Vec<Symbol> = form[..at].to_vec();
            next.extend(grammar.rule(ri).rhs.iter().cloned());
            next.extend(form[at + 1..].iter().cloned());
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }

    out
}

fn parse_kinds(plan: &plan::Plan, kinds: &[String]) -> bool {
    let tokens = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| Token {
            kind: kind.clone(),
            value: Value::Str(kind.clone()),
            line: 1,
            column: i + 1,
        })
        .collect();
    interp::parse(plan, TokenLexer::new(tokens)).is_ok()
}

/// The emitted iterative pattern must accept exactly the grammar's
/// language: compare against exhaustive derivation over every token
/// sequence up to `max_len`
fn assert_language_equivalence(source: &str, max_len: usize) {
    let (grammar, plan) = build(source);
    let language = sentences(&grammar, max_len);

    let mut alphabet: Vec<String> = grammar.terminals().iter().cloned().collect();
    alphabet.sort();

    let mut all: Vec<Vec<String>> = vec![Vec::new()];
    let mut frontier: Vec<Vec<String>> = vec![Vec::new()];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for seq in &frontier {
            for t in &alphabet {
                let mut longer = seq.clone();
                longer.push(t.clone());
                next.push(longer);
            }
        }
        all.extend(next.iter().cloned());
        frontier = next;
    }

    for seq in &all {
        let accepted = parse_kinds(&plan, seq);
        let derivable = language.contains(seq);
        assert_eq!(
            accepted, derivable,
            "parser and grammar disagree on {:?}",
            seq
        );
    }
}

const ADDITIVE: &str = "%start Expr\n\
                        %token NUMBER\n\
                        %left '+' '-'\n\
                        Expr\n\
                          : Term\n\
                          | Expr '+' Term\n\
                          | Expr '-' Term\n\
                          ;\n\
                        Term : NUMBER ;\n";

const TERMINATOR: &str = "%start Args\n\
                          %token NUMBER\n\
                          Args\n\
                            :\n\
                            | ',' Arg Args\n\
                            ;\n\
                          Arg : NUMBER ;\n";

const ACCESSOR: &str = "%start Value\n\
                        %token IDENTIFIER\n\
                        Value\n\
                          : IDENTIFIER\n\
                          | Value '.' IDENTIFIER\n\
                          ;\n";

#[test]
fn chain_loops_accept_exactly_the_chain_language() {
    assert_language_equivalence(ADDITIVE, 5);
}

#[test]
fn tail_loops_accept_exactly_the_list_language() {
    assert_language_equivalence(TERMINATOR, 4);
}

#[test]
fn accessor_loops_accept_exactly_the_postfix_language() {
    assert_language_equivalence(ACCESSOR, 5);
}

#[test]
fn every_bounded_derivation_parses() {
    for (source, max_len) in [(ADDITIVE, 7), (TERMINATOR, 6), (ACCESSOR, 7)] {
        let (grammar, plan) = build(source);
        for sentence in sentences(&grammar, max_len) {
            assert!(
                parse_kinds(&plan, &sentence),
                "derived sentence rejected: {:?}",
                sentence
            );
        }
    }
}

#[test]
fn single_token_corruptions_are_rejected_with_locations() {
    let (_, plan) = build(ADDITIVE);

    // NUMBER '+' NUMBER NUMBER: the chain loop stops before the stray
    // token and the end-of-input assertion names it
    let tokens = ["NUMBER", "+", "NUMBER", "NUMBER"]
        .iter()
        .enumerate()
        .map(|(i, kind)| Token {
            kind: kind.to_string(),
            value: Value::Str(kind.to_string()),
            line: 1,
            column: i + 1,
        })
        .collect();
    let err = interp::parse(&plan, TokenLexer::new(tokens)).unwrap_err();
    let interp::Error::Parse(err) = err else {
        panic!("expected a parse error");
    };
    assert_eq!(err.expected, vec!["$end".to_string()]);
    assert_eq!(err.actual.kind, "NUMBER");
    assert_eq!(err.actual.column, 4);

    // NUMBER '+' '+': the operand read fails
    let tokens = ["NUMBER", "+", "+"]
        .iter()
        .enumerate()
        .map(|(i, kind)| Token {
            kind: kind.to_string(),
            value: Value::Str(kind.to_string()),
            line: 1,
            column: i + 1,
        })
        .collect();
    let err = interp::parse(&plan, TokenLexer::new(tokens)).unwrap_err();
    let interp::Error::Parse(err) = err else {
        panic!("expected a parse error");
    };
    assert_eq!(err.expected, vec!["NUMBER".to_string()]);
    assert_eq!(err.actual.kind, "+");
    assert_eq!(err.actual.column, 3);
}
