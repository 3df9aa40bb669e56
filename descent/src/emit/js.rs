//! The JavaScript back end.
//!
//! Renders an emission plan into a single source file: a `ParseError`
//! class, a `Parser` class holding the fixed runtime (`parse`,
//! `_advance`, `_match`, `_error`) and one `parseN` method per
//! nonterminal. The file depends on nothing but the lexer object the
//! caller injects.

use grammar::cfg::Symbol;

use super::CodeWriter;
use crate::pattern::Step;
use crate::plan::{Arm, Body, Fallback, FoldAction, FoldArm, Plan, PlanAction, TailArm};

/// Render the whole parser source.
pub fn render(plan: &Plan) -> String {
    let mut w = CodeWriter::new();

    w.line("'use strict';");
    w.blank();
    w.line("// Generated by descent. Do not edit.");
    w.line("//");
    w.line("// The injected lexer must provide:");
    w.line("//   reset(source)          begin lexing a new source text");
    w.line("//   next()                 the next token kind, or null at end of input");
    w.line("//   value, line, column    properties describing the last token");
    w.blank();

    render_parse_error_class(&mut w);
    w.blank();

    w.open("class Parser {");
    render_runtime(&mut w, plan);

    for (name, body) in plan.bodies() {
        w.blank();
        w.open(&format!("{}() {{", method(name)));
        match body {
            Body::Switch { arms, fallback } => render_switch(&mut w, name, arms, fallback),
            Body::TailLoop {
                seed,
                sep,
                arms,
                leading,
                ..
            } => render_tail(&mut w, name, seed, sep, arms, *leading),
            Body::FoldLoop {
                base,
                arms,
                right_assoc,
            } => render_fold(&mut w, base, arms, *right_assoc),
            Body::PrefixSwitch {
                prefix,
                arms,
                expected,
            } => render_prefix_switch(&mut w, name, prefix, arms, expected),
            Body::ElisionLoop {
                seed,
                sep,
                elem,
                labels,
                ..
            } => render_elision(&mut w, seed, sep, elem, labels),
        }
        w.close("}");
    }

    w.close("}");
    w.blank();
    w.line("module.exports = { Parser, ParseError };");

    w.finish()
}

/// The `parseN` method name of a nonterminal, with every character that
/// cannot appear in a JavaScript identifier mapped to `_`
fn method(nonterminal: &str) -> String {
    let safe: String = nonterminal
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("parse{}", safe)
}

/// A single-quoted JavaScript string literal
fn js_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// A `['A', 'B']` array literal of token kinds
fn kind_array(kinds: &[String]) -> String {
    let quoted: Vec<String> = kinds.iter().map(|k| js_str(k)).collect();
    format!("[{}]", quoted.join(", "))
}

/// A lookahead test over one or more kinds
fn kind_test(kinds: &[String]) -> String {
    let tests: Vec<String> = kinds
        .iter()
        .map(|k| format!("this.la.kind === {}", js_str(k)))
        .collect();
    tests.join(" || ")
}

/// The read expression of one step
fn step_call(sym: &Symbol) -> String {
    match sym {
        Symbol::Terminal(kind) => format!("this._match({})", js_str(kind)),
        Symbol::Nonterminal(name) => format!("this.{}()", method(name)),
    }
}

/// Emit one step, binding its value when the action needs it
fn step_line(w: &mut CodeWriter, step: &Step) {
    if step.bind {
        w.line(&format!("const $${} = {};", step.pos, step_call(&step.sym)));
    } else {
        w.line(&format!("{};", step_call(&step.sym)));
    }
}

/// The expression an action evaluates to
fn action_expr(action: &PlanAction) -> String {
    match action {
        PlanAction::PassThrough(k) => format!("$${}", k),
        PlanAction::Expr { text, .. } => text.clone(),
    }
}

/// The `ParseError` class
fn render_parse_error_class(w: &mut CodeWriter) {
    w.open("class ParseError extends Error {");
    w.open("constructor(expected, actual, message) {");
    w.line("super(message);");
    w.line("this.name = 'ParseError';");
    w.line("this.expected = expected;");
    w.line("this.actual = actual;");
    w.line("this.line = actual.line;");
    w.line("this.column = actual.column;");
    w.close("}");
    w.close("}");
}

/// The fixed runtime: constructor, `parse`, `_advance`, `_match`, `_error`
fn render_runtime(w: &mut CodeWriter, plan: &Plan) {
    w.open("constructor(lexer) {");
    w.line("this.lexer = lexer;");
    w.line("this.la = null;");
    w.close("}");
    w.blank();

    w.open("parse(source) {");
    w.line("this.lexer.reset(source);");
    w.line("this._advance();");
    w.line(&format!("const result = this.{}();", method(plan.start())));
    w.open("if (this.la.kind !== '$end') {");
    w.line(&format!(
        "this._error(['$end'], 'unexpected input after {}');",
        plan.start()
    ));
    w.close("}");
    w.line("return result;");
    w.close("}");
    w.blank();

    w.open("_advance() {");
    w.line("const kind = this.lexer.next();");
    w.open("this.la = {");
    w.line("kind: kind === null || kind === undefined ? '$end' : kind,");
    w.line("value: this.lexer.value,");
    w.line("line: this.lexer.line,");
    w.line("column: this.lexer.column,");
    w.close("};");
    w.close("}");
    w.blank();

    w.open("_match(kind) {");
    w.open("if (this.la.kind !== kind) {");
    w.line("this._error([kind], 'unexpected ' + this.la.kind);");
    w.close("}");
    w.line("const value = this.la.value; // capture before the slot is overwritten");
    w.line("this._advance();");
    w.line("return value;");
    w.close("}");
    w.blank();

    w.open("_error(expected, message) {");
    w.line("const token = this.la;");
    w.line("const shown = String(token.value).slice(0, 20);");
    w.line("throw new ParseError(expected, token, message +");
    w.line("  ': expected ' + expected.join(' or ') + ', got ' + token.kind +");
    w.line("  \" ('\" + shown + \"') at \" + token.line + ':' + token.column);");
    w.close("}");
}

/// Emit the labeled arms of a switch plus its default branch
fn render_arm_switch(w: &mut CodeWriter, nonterminal: &str, arms: &[Arm], fallback: &Fallback) {
    w.open("switch (this.la.kind) {");

    for arm in arms {
        if arm.labels.is_empty() {
            // nothing selects this alternative; it can never be taken
            continue;
        }
        for (i, label) in arm.labels.iter().enumerate() {
            if i + 1 < arm.labels.len() {
                w.line(&format!("case {}:", js_str(label)));
            } else {
                w.open(&format!("case {}: {{", js_str(label)));
            }
        }
        for step in &arm.steps {
            step_line(w, step);
        }
        w.line(&format!("return {};", action_expr(&arm.action)));
        w.close("}");
    }

    w.open("default: {");
    match fallback {
        Fallback::Error(expected) => {
            w.line(&format!(
                "this._error({}, {});",
                kind_array(expected),
                js_str(&format!("unexpected token in {}", nonterminal))
            ));
        }
        Fallback::Empty { action, .. } => {
            w.line(&format!("return {};", action_expr(action)));
        }
    }
    w.close("}");

    w.close("}");
}

/// The generic switch body, inlined when there is only one way through
fn render_switch(w: &mut CodeWriter, nonterminal: &str, arms: &[Arm], fallback: &Fallback) {
    match (arms, fallback) {
        // a single alternative needs no dispatch; the first _match
        // reports the mismatch
        ([arm], Fallback::Error(_)) => {
            for step in &arm.steps {
                step_line(w, step);
            }
            w.line(&format!("return {};", action_expr(&arm.action)));
        }
        // only an ε alternative
        ([], Fallback::Empty { action, .. }) => {
            w.line(&format!("return {};", action_expr(action)));
        }
        _ => render_arm_switch(w, nonterminal, arms, fallback),
    }
}

/// Append every bound element value of one tail-loop iteration
fn push_elems(w: &mut CodeWriter, arm: &TailArm) {
    for step in &arm.steps {
        if step.bind {
            w.line(&format!("items.push({});", step_call(&step.sym)));
        } else {
            w.line(&format!("{};", step_call(&step.sym)));
        }
    }
}

/// The tail-list loop, in both orientations
fn render_tail(
    w: &mut CodeWriter,
    nonterminal: &str,
    seed: &PlanAction,
    sep: &str,
    arms: &[TailArm],
    leading: bool,
) {
    w.line(&format!("const items = {};", action_expr(seed)));

    if leading {
        let mut started = false;
        for arm in arms {
            if arm.labels.is_empty() || arm.steps.is_empty() {
                continue;
            }
            if started {
                w.chain(&format!("}} else if ({}) {{", kind_test(&arm.labels)));
            } else {
                w.open(&format!("if ({}) {{", kind_test(&arm.labels)));
                started = true;
            }
            push_elems(w, arm);
        }
        if started {
            w.close("}");
        }
    }

    w.open(&format!("while (this.la.kind === {}) {{", js_str(sep)));
    w.line(&format!("this._match({});", js_str(sep)));

    if let [arm] = arms {
        push_elems(w, arm);
    } else {
        let mut bare = false;
        let mut started = false;
        let mut expected: Vec<String> = Vec::new();
        for arm in arms {
            if arm.labels.is_empty() {
                // the `sep`-only alternative: nothing to parse
                bare = true;
                continue;
            }
            expected.extend(arm.labels.iter().cloned());
            if started {
                w.chain(&format!("}} else if ({}) {{", kind_test(&arm.labels)));
            } else {
                w.open(&format!("if ({}) {{", kind_test(&arm.labels)));
                started = true;
            }
            push_elems(w, arm);
        }
        if started {
            if !bare {
                w.chain("} else {");
                w.line(&format!(
                    "this._error({}, {});",
                    kind_array(&expected),
                    js_str(&format!("unexpected list element in {}", nonterminal))
                ));
            }
            w.close("}");
        }
    }

    w.close("}");
    w.line("return items;");
}

/// The accumulator rebuild expression of one fold arm
fn fold_expr(arm: &FoldArm) -> String {
    match &arm.action {
        FoldAction::Default => {
            let mut out = format!("[{}, left", js_str(&arm.opener));
            for step in &arm.steps {
                if step.bind {
                    out.push_str(&format!(", $${}", step.pos));
                }
            }
            out.push(']');
            out
        }
        FoldAction::Expr { text, .. } => text.clone(),
    }
}

/// The chain/accessor fold loop; right-associative chains recurse once
/// instead of looping
fn render_fold(w: &mut CodeWriter, base: &Arm, arms: &[FoldArm], right_assoc: bool) {
    // the base parse seeds the accumulator
    if let ([step], PlanAction::PassThrough(1)) = (&base.steps[..], &base.action) {
        w.line(&format!("let left = {};", step_call(&step.sym)));
    } else {
        for step in &base.steps {
            step_line(w, step);
        }
        w.line(&format!("let left = {};", action_expr(&base.action)));
    }

    if !right_assoc {
        w.open("for (;;) {");
    }
    w.open("switch (this.la.kind) {");

    for arm in arms {
        w.open(&format!("case {}: {{", js_str(&arm.opener)));
        if arm.uses_head {
            w.line("const $$1 = left;");
        }
        for step in &arm.steps {
            step_line(w, step);
        }
        if right_assoc {
            w.line(&format!("return {};", fold_expr(arm)));
        } else {
            w.line(&format!("left = {};", fold_expr(arm)));
            w.line("break;");
        }
        w.close("}");
    }

    w.open("default: {");
    w.line("return left;");
    w.close("}");

    w.close("}");
    if !right_assoc {
        w.close("}");
    }
}

/// The shared-prefix body: common steps once, then disambiguate
fn render_prefix_switch(
    w: &mut CodeWriter,
    nonterminal: &str,
    prefix: &[Step],
    arms: &[Arm],
    expected: &[String],
) {
    for step in prefix {
        step_line(w, step);
    }
    render_arm_switch(w, nonterminal, arms, &Fallback::Error(expected.to_vec()));
}

/// The elision-list body: separated list with null holes
fn render_elision(w: &mut CodeWriter, seed: &PlanAction, sep: &str, elem: &Step, labels: &[String]) {
    w.line(&format!("const items = {};", action_expr(seed)));

    w.open(&format!("if ({}) {{", kind_test(labels)));
    w.line(&format!("items.push({});", step_call(&elem.sym)));
    w.chain(&format!("}} else if (this.la.kind === {}) {{", js_str(sep)));
    w.line("items.push(null);");
    w.close("}");

    w.open(&format!("while (this.la.kind === {}) {{", js_str(sep)));
    w.line(&format!("this._match({});", js_str(sep)));
    w.open(&format!("if ({}) {{", kind_test(labels)));
    w.line(&format!("items.push({});", step_call(&elem.sym)));
    w.chain("} else {");
    w.line("items.push(null);");
    w.close("}");
    w.close("}");

    w.line("return items;");
}
