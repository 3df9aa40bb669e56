#![allow(clippy::missing_docs_in_private_items)]

use crate::emit::js;
use crate::{loader, pattern, plan};

fn render(source: &str) -> String {
    env_logger::try_init().ok();
    let grammar = loader::load(source, "test.grammar").unwrap();
    let analysis = grammar::ll1::analyze(&grammar);
    let classified = pattern::classify(&grammar, &analysis);
    let plan = plan::build(&grammar, &analysis, &classified).unwrap();
    js::render(&plan)
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

#[test]
fn the_runtime_scaffolding_is_fixed() {
    let code = render(ADDITIVE);

    assert!(code.contains("class ParseError extends Error {"));
    assert!(code.contains("class Parser {"));
    assert!(code.contains("constructor(lexer) {"));
    assert!(code.contains("parse(source) {"));
    assert!(code.contains("this.lexer.reset(source);"));
    assert!(code.contains("_advance() {"));
    assert!(code.contains("_match(kind) {"));
    assert!(code.contains("_error(expected, message) {"));
    assert!(code.contains("if (this.la.kind !== '$end') {"));
    assert!(code.contains("module.exports = { Parser, ParseError };"));
}

#[test]
fn match_captures_before_advancing() {
    let code = render(ADDITIVE);
    let capture = code
        .find("const value = this.la.value;")
        .expect("capture line missing");
    let advance = code[capture..]
        .find("this._advance();")
        .expect("advance after capture missing");
    assert!(advance > 0);
}

#[test]
fn every_nonterminal_gets_one_function() {
    let code = render(ADDITIVE);
    assert_eq!(code.matches("parseExpr() {").count(), 1);
    assert_eq!(code.matches("parseTerm() {").count(), 1);
    assert!(code.contains("const result = this.parseExpr();"));
}

#[test]
fn chains_emit_loops_not_recursion() {
    let code = render(ADDITIVE);

    assert!(code.contains("for (;;) {"));
    assert!(code.contains("case '+': {"));
    assert!(code.contains("case '-': {"));
    assert!(code.contains("left = ['+', left, $$3];"));
    assert!(code.contains("left = ['-', left, $$3];"));

    // the expression function never calls itself
    let body_start = code.find("parseExpr() {").unwrap();
    let body_end = body_start + code[body_start..].find("\n\n").unwrap();
    assert!(!code[body_start..body_end].contains("this.parseExpr()"));
}

#[test]
fn tail_lists_emit_while_loops() {
    let code = render(
        "%start List\n\
         %token NUMBER\n\
         List\n\
           :\n\
           | List ',' NUMBER\n\
           ;\n",
    );

    assert!(code.contains("const items = [];"));
    assert!(code.contains("while (this.la.kind === ',') {"));
    assert!(code.contains("items.push(this._match('NUMBER'));"));
    assert!(code.contains("return items;"));

    let body_start = code.find("parseList() {").unwrap();
    let body_end = body_start + code[body_start..].find("\n\n").unwrap();
    assert!(!code[body_start..body_end].contains("this.parseList()"));
}

#[test]
fn right_chains_recurse_once_without_a_loop() {
    let code = render(
        "%start Assign\n\
         %token IDENTIFIER\n\
         %right '='\n\
         Assign\n\
           : Name\n\
           | Name '=' Assign\n\
           ;\n\
         Name : IDENTIFIER ;\n",
    );

    let body_start = code.find("parseAssign() {").unwrap();
    let body_end = body_start + code[body_start..].find("\n\n").unwrap();
    let body = &code[body_start..body_end];

    assert!(body.contains("case '=': {"));
    assert!(body.contains("const $$3 = this.parseAssign();"));
    assert!(body.contains("return ['=', left, $$3];"));
    assert!(!body.contains("for (;;)"));
}

#[test]
fn shared_prefixes_are_emitted_once() {
    let code = render(
        "%start Bracket\n\
         %token NUMBER\n\
         %special Bracket shared-prefix\n\
         Bracket\n\
           : '[' Expr '..' Expr ']'   -> [\"range\", 2, 4]\n\
           | '[' Expr ',' Expr ']'    -> [\"array\", 2, 4]\n\
           ;\n\
         Expr : NUMBER ;\n",
    );

    let body_start = code.find("parseBracket() {").unwrap();
    let body_end = body_start + code[body_start..].find("\n\n").unwrap();
    let body = &code[body_start..body_end];

    assert!(body.contains("this._match('[');"));
    assert_eq!(body.matches("this._match('[');").count(), 1);
    assert_eq!(body.matches("const $$2 = this.parseExpr();").count(), 1);
    assert!(body.contains("case '..': {"));
    assert!(body.contains("case ',': {"));
    assert!(body.contains("return [\"range\", $$2, $$4];"));
    assert!(body.contains("return [\"array\", $$2, $$4];"));
}

#[test]
fn dispatch_switches_on_the_leading_terminal() {
    let code = render(
        "%start Stmt\n\
         %token IF WHILE BREAK NUMBER\n\
         Stmt\n\
           : IF Expr Stmt         -> [\"if\", 2, 3]\n\
           | WHILE Expr Stmt      -> [\"while\", 2, 3]\n\
           | BREAK                -> [\"break\"]\n\
           ;\n\
         Expr : NUMBER ;\n",
    );

    assert!(code.contains("switch (this.la.kind) {"));
    assert!(code.contains("case 'IF': {"));
    assert!(code.contains("case 'WHILE': {"));
    assert!(code.contains("case 'BREAK': {"));
    assert!(code.contains("this._error(['BREAK', 'IF', 'WHILE']"));
}

#[test]
fn single_alternatives_inline_without_a_switch() {
    let code = render(
        "%start Term\n\
         %token NUMBER\n\
         Term : NUMBER ;\n",
    );

    let body_start = code.find("parseTerm() {").unwrap();
    let body_end = body_start + code[body_start..].find("\n\n").unwrap();
    let body = &code[body_start..body_end];

    assert!(body.contains("const $$1 = this._match('NUMBER');"));
    assert!(body.contains("return $$1;"));
    assert!(!body.contains("switch"));
}
