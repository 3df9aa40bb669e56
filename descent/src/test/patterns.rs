#![allow(clippy::missing_docs_in_private_items)]

use crate::pattern::{classify, Classified, Pattern};
use crate::loader;

fn classified(source: &str) -> Classified {
    env_logger::try_init().ok();
    let grammar = loader::load(source, "test.grammar").unwrap();
    let analysis = grammar::ll1::analyze(&grammar);
    classify(&grammar, &analysis)
}

#[test]
fn terminator_lists_are_tail() {
    let c = classified(
        "%start Args\n\
         %token NUMBER\n\
         Args\n\
           :\n\
           | ',' Arg Args\n\
           ;\n\
         Arg : NUMBER ;\n",
    );

    let Pattern::Tail(shape) = c.pattern("Args") else {
        panic!("expected Tail, got {}", c.pattern("Args"));
    };
    assert_eq!(shape.sep, ",");
    assert!(!shape.head_recursive);
}

#[test]
fn separated_lists_are_tail() {
    let c = classified(
        "%start List\n\
         %token NUMBER\n\
         List\n\
           :\n\
           | List ',' NUMBER\n\
           ;\n",
    );

    let Pattern::Tail(shape) = c.pattern("List") else {
        panic!("expected Tail, got {}", c.pattern("List"));
    };
    assert_eq!(shape.sep, ",");
    assert!(shape.head_recursive);
}

#[test]
fn left_recursive_operators_are_chains() {
    let c = classified(
        "%start Expr\n\
         %token NUMBER\n\
         %left '+' '-'\n\
         Expr\n\
           : Term\n\
           | Expr '+' Term\n\
           | Expr '-' Term\n\
           ;\n\
         Term : NUMBER ;\n",
    );

    let Pattern::BinaryOpChain(shape) = c.pattern("Expr") else {
        panic!("expected BinaryOpChain, got {}", c.pattern("Expr"));
    };
    assert_eq!(shape.sub, "Term");
    assert!(!shape.right);
    assert_eq!(shape.op_rules.len(), 2);
}

#[test]
fn right_recursive_operators_are_right_chains() {
    let c = classified(
        "%start Assign\n\
         %token IDENTIFIER\n\
         %right '='\n\
         Assign\n\
           : Cond\n\
           | Cond '=' Assign\n\
           ;\n\
         Cond : IDENTIFIER ;\n",
    );

    let Pattern::BinaryOpChain(shape) = c.pattern("Assign") else {
        panic!("expected BinaryOpChain, got {}", c.pattern("Assign"));
    };
    assert!(shape.right);
}

#[test]
fn postfix_operators_are_accessor_chains() {
    let c = classified(
        "%start Value\n\
         %token IDENTIFIER NUMBER\n\
         Value\n\
           : IDENTIFIER\n\
           | Value '.' IDENTIFIER     -> ['.', 1, 3]\n\
           | Value '[' Index ']'      -> [\"index\", 1, 3]\n\
           ;\n\
         Index : NUMBER ;\n",
    );

    let Pattern::AccessorChain(shape) = c.pattern("Value") else {
        panic!("expected AccessorChain, got {}", c.pattern("Value"));
    };
    assert_eq!(shape.postfix_rules.len(), 2);
}

#[test]
fn keyword_alternatives_are_dispatch() {
    let c = classified(
        "%start Stmt\n\
         %token IF WHILE BREAK NUMBER\n\
         Stmt\n\
           : IF Expr Stmt         -> [\"if\", 2, 3]\n\
           | WHILE Expr Stmt      -> [\"while\", 2, 3]\n\
           | BREAK                -> [\"break\"]\n\
           ;\n\
         Expr : NUMBER ;\n",
    );

    assert!(matches!(c.pattern("Stmt"), Pattern::Dispatch));
}

#[test]
fn nonterminal_leads_fall_back_to_switch() {
    let c = classified(
        "%start Root\n\
         %token NUMBER SEMI\n\
         Root : Line SEMI ;\n\
         Line : NUMBER ;\n",
    );

    assert!(matches!(c.pattern("Root"), Pattern::Switch));
}

#[test]
fn special_bindings_win_over_every_shape() {
    // the grammar is a perfectly good Tail shape, but the binding wins
    let c = classified(
        "%start List\n\
         %token NUMBER\n\
         %special List elision-list\n\
         List\n\
           :\n\
           | List ','\n\
           | List ',' NUMBER\n\
           ;\n",
    );

    let Pattern::Special(handler) = c.pattern("List") else {
        panic!("expected Special, got {}", c.pattern("List"));
    };
    assert_eq!(handler, "elision-list");
}
