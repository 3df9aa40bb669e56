#![allow(clippy::missing_docs_in_private_items)]

use grammar::cfg::{self, Assoc};

use crate::context::Context;
use crate::loader::{self, error::Error};

fn load_err(source: &str) -> Context<Error> {
    env_logger::try_init().ok();
    loader::load(source, "test.grammar").unwrap_err()
}

#[test]
fn directives_fill_the_ir() {
    let grammar = loader::load(
        "%start Expr\n\
         %token NUMBER\n\
         %left '+' '-'\n\
         %right '^'\n\
         %special Expr expression-core\n\
         Expr : NUMBER ;\n",
        "test.grammar",
    )
    .unwrap();

    assert_eq!(grammar.start(), "Expr");
    assert_eq!(grammar.operators().len(), 2);
    assert!(matches!(grammar.operators()[0].assoc, Assoc::Left));
    assert!(matches!(grammar.operators()[1].assoc, Assoc::Right));
    assert_eq!(grammar.operators()[1].tokens, vec!["^".to_string()]);
    assert_eq!(grammar.special("Expr"), Some("expression-core"));
    // operator and quoted terminals are declared implicitly
    assert!(grammar.terminals().contains("+"));
    assert!(grammar.terminals().contains("^"));
}

#[test]
fn unknown_directives_are_rejected() {
    let err = load_err("%begin Root\nRoot : NUMBER ;\n");
    assert!(matches!(err.kind(), Error::UnknownDirective(d) if d == "%begin"));
}

#[test]
fn unterminated_rules_are_rejected() {
    let err = load_err("%token NUMBER\nA\n : NUMBER\n");
    assert!(matches!(err.kind(), Error::UnterminatedRule(lhs) if lhs == "A"));
}

#[test]
fn alternatives_need_an_open_rule() {
    let err = load_err("| NUMBER\n");
    assert!(matches!(err.kind(), Error::DanglingAlternative));
}

#[test]
fn out_of_range_action_positions_are_rejected() {
    let err = load_err("%token NUMBER\nRoot : NUMBER -> [1, 2]\n;\n");
    assert!(matches!(
        err.kind(),
        Error::BadActionRef {
            rule: 0,
            position: 2,
            limit: 1,
        }
    ));
}

#[test]
fn unresolved_symbols_are_rejected() {
    let err = load_err("Root : Mystery ;\n");
    assert!(matches!(
        err.kind(),
        Error::Grammar(cfg::Error::UnknownSymbol { symbol, rule: 0, .. }) if symbol == "Mystery"
    ));
}

#[test]
fn errors_display_the_offending_line() {
    let err = load_err("%begin Root\nRoot : NUMBER ;\n");
    let shown = err.to_string();
    assert!(shown.contains("test.grammar"));
    assert!(shown.contains("%begin Root"));
    assert!(shown.contains("^~~"));
}
