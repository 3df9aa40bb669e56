//! The reference runtime.
//!
//! Executes an emission plan directly over a token stream, honoring the
//! same contract as the emitted JavaScript: one token of lookahead,
//! values captured before the slot is refilled, first mismatch raises
//! and unwinds. The test suite and the CLI `--check` flag parse through
//! this runtime, since the generator cannot execute its own JavaScript
//! output.

use std::collections::HashMap;
use std::fmt::Display;

use grammar::cfg::{Grammar, Symbol, END};

use crate::action::{ActionExpr, ActionItem};
use crate::pattern::Step;
use crate::plan::{Arm, Body, Fallback, FoldAction, FoldArm, Plan, PlanAction, TailArm};
use crate::sexpr::{SExpr, Value};

/// The lexer interface the runtime consumes: an operation returning the
/// next token kind, plus readable properties of the most recent token.
/// End of stream maps to the `$end` kind inside the parser.
pub trait Lexer {
    /// Advance and return the next token kind, or [None] at end of stream
    fn next_kind(&mut self) -> Option<String>;
    /// Value of the most recently returned token
    fn value(&self) -> Value;
    /// Line of the most recently returned token, 1-based
    fn line(&self) -> usize;
    /// Column of the most recently returned token, 1-based
    fn column(&self) -> usize;
}

/// One token as the parser sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token kind, a short identifier
    pub kind: String,
    /// The opaque token value
    pub value: Value,
    /// Source line, 1-based
    pub line: usize,
    /// Source column, 1-based
    pub column: usize,
}

/// A first-mismatch parse failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The terminal kinds that would have been accepted
    pub expected: Vec<String>,
    /// The token actually in the lookahead slot
    pub actual: Token,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shown = self.actual.value.to_string();
        if shown.chars().count() > 20 {
            shown = shown.chars().take(20).collect();
            shown.push('…');
        }
        write!(
            f,
            "expected {}, got {} ({}) at {}:{}",
            self.expected.join(" or "),
            self.actual.kind,
            shown,
            self.actual.line,
            self.actual.column
        )
    }
}

/// Runtime failures.
#[derive(Debug)]
pub enum Error {
    /// Token mismatch; unwinds to the caller of [parse]
    Parse(ParseError),
    /// The rule's action falls outside the subset the reference runtime
    /// evaluates; the emitted JavaScript is not affected
    Action {
        /// The rule whose action was refused
        rule: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(e) => e.fmt(f),
            Error::Action { rule } => write!(
                f,
                "the action of rule {} is outside the reference runtime's subset",
                rule
            ),
        }
    }
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

/// Parse a token stream against a plan.
///
/// # Errors
///
/// The first token mismatch raises [Error::Parse]; no partial
/// s-expression is returned.
pub fn parse<L: Lexer>(plan: &Plan, lexer: L) -> Result<SExpr, Error> {
    let mut parser = Interp {
        plan,
        lexer,
        la: Token {
            kind: END.to_string(),
            value: Value::Null,
            line: 1,
            column: 1,
        },
    };
    parser.advance();
    let result = parser.exec(plan.start())?;
    if parser.la.kind != END {
        return Err(parser.err(vec![END.to_string()]).into());
    }
    Ok(result)
}

/// Locals captured while executing one alternative, keyed by rhs position
type Locals = HashMap<usize, SExpr>;

/// The interpreting parser: a plan, a lexer and one token of lookahead.
struct Interp<'p, L: Lexer> {
    /// The plan being executed
    plan: &'p Plan,
    /// The token source
    lexer: L,
    /// The lookahead slot
    la: Token,
}

impl<L: Lexer> Interp<'_, L> {
    /// Refill the lookahead slot, mapping end of stream to `$end`
    fn advance(&mut self) {
        self.la = match self.lexer.next_kind() {
            Some(kind) => Token {
                kind,
                value: self.lexer.value(),
                line: self.lexer.line(),
                column: self.lexer.column(),
            },
            None => Token {
                kind: END.to_string(),
                value: Value::Null,
                line: self.lexer.line(),
                column: self.lexer.column(),
            },
        };
    }

    /// A parse error at the current lookahead
    fn err(&self, expected: Vec<String>) -> ParseError {
        ParseError {
            expected,
            actual: self.la.clone(),
        }
    }

    /// Match one terminal kind, returning the captured value.
    ///
    /// The value is taken before advancing; the slot is overwritten.
    fn match_kind(&mut self, kind: &str) -> Result<Value, Error> {
        if self.la.kind != kind {
            return Err(self.err(vec![kind.to_string()]).into());
        }
        let value = self.la.value.clone();
        self.advance();
        Ok(value)
    }

    /// Read one step, recording its value when the plan binds it
    fn step(&mut self, step: &Step, locals: &mut Locals) -> Result<SExpr, Error> {
        let value = match &step.sym {
            Symbol::Terminal(kind) => SExpr::Atom(self.match_kind(kind)?),
            Symbol::Nonterminal(name) => self.exec(name)?,
        };
        if step.bind {
            locals.insert(step.pos, value.clone());
        }
        Ok(value)
    }

    /// Evaluate a plan action against the captured locals
    fn eval(&self, action: &PlanAction, locals: &Locals, rule: usize) -> Result<SExpr, Error> {
        match action {
            PlanAction::PassThrough(k) => {
                Ok(locals.get(k).cloned().unwrap_or_else(SExpr::null))
            }
            PlanAction::Expr { ast: Some(ast), .. } => Ok(eval_expr(ast, locals)),
            PlanAction::Expr { ast: None, .. } => Err(Error::Action { rule }),
        }
    }

    /// Execute the body of one nonterminal
    fn exec(&mut self, nonterminal: &str) -> Result<SExpr, Error> {
        match self.plan.body(nonterminal) {
            Body::Switch { arms, fallback } => self.exec_switch(arms, fallback),
            Body::TailLoop {
                seed,
                seed_rule,
                sep,
                arms,
                leading,
            } => self.exec_tail(seed, *seed_rule, sep, arms, *leading),
            Body::FoldLoop {
                base,
                arms,
                right_assoc,
            } => self.exec_fold(base, arms, *right_assoc),
            Body::PrefixSwitch {
                prefix,
                arms,
                expected,
            } => self.exec_prefix(prefix, arms, expected),
            Body::ElisionLoop {
                seed,
                seed_rule,
                sep,
                elem,
                labels,
            } => self.exec_elision(seed, *seed_rule, sep, elem, labels),
        }
    }

    /// Run one switch arm to completion
    fn run_arm(&mut self, arm: &Arm, locals: &mut Locals) -> Result<SExpr, Error> {
        for step in &arm.steps {
            self.step(step, locals)?;
        }
        self.eval(&arm.action, locals, arm.rule)
    }

    /// Switch over the lookahead kind
    fn exec_switch(&mut self, arms: &[Arm], fallback: &Fallback) -> Result<SExpr, Error> {
        // a single alternative with an error fallback runs unguarded,
        // exactly as the emitted code inlines it
        if let ([arm], Fallback::Error(_)) = (arms, fallback) {
            return self.run_arm(arm, &mut Locals::new());
        }

        for arm in arms {
            if arm.labels.iter().any(|l| *l == self.la.kind) {
                return self.run_arm(arm, &mut Locals::new());
            }
        }

        match fallback {
            Fallback::Empty { rule, action } => self.eval(action, &Locals::new(), *rule),
            Fallback::Error(expected) => Err(self.err(expected.clone()).into()),
        }
    }

    /// Seed the accumulator sequence from the ε alternative's action
    fn seed_items(&self, seed: &PlanAction, rule: usize) -> Result<Vec<SExpr>, Error> {
        match self.eval(seed, &Locals::new(), rule)? {
            SExpr::Seq(items) => Ok(items),
            atom => Ok(vec![atom]),
        }
    }

    /// Append the bound element values of one tail-loop iteration
    fn push_elems(&mut self, arm: &TailArm, items: &mut Vec<SExpr>) -> Result<(), Error> {
        for step in &arm.steps {
            let value = self.step(step, &mut Locals::new())?;
            if step.bind {
                items.push(value);
            }
        }
        Ok(())
    }

    /// The tail-list loop, in both orientations
    fn exec_tail(
        &mut self,
        seed: &PlanAction,
        seed_rule: usize,
        sep: &str,
        arms: &[TailArm],
        leading: bool,
    ) -> Result<SExpr, Error> {
        let mut items = self.seed_items(seed, seed_rule)?;

        if leading {
            for arm in arms {
                if !arm.steps.is_empty() && arm.labels.iter().any(|l| *l == self.la.kind) {
                    self.push_elems(arm, &mut items)?;
                    break;
                }
            }
        }

        while self.la.kind == sep {
            self.match_kind(sep)?;
            if let [arm] = arms {
                self.push_elems(arm, &mut items)?;
            } else {
                let mut taken = false;
                for arm in arms {
                    if !arm.labels.is_empty() && arm.labels.iter().any(|l| *l == self.la.kind) {
                        self.push_elems(arm, &mut items)?;
                        taken = true;
                        break;
                    }
                }
                if !taken && !arms.iter().any(|a| a.labels.is_empty()) {
                    let expected = arms.iter().flat_map(|a| a.labels.iter().cloned()).collect();
                    return Err(self.err(expected).into());
                }
            }
        }

        Ok(SExpr::Seq(items))
    }

    /// Rebuild the accumulator from one fold arm
    fn fold_value(
        &mut self,
        arm: &FoldArm,
        left: SExpr,
    ) -> Result<SExpr, Error> {
        let mut locals = Locals::new();
        if arm.uses_head {
            locals.insert(1, left.clone());
        }
        for step in &arm.steps {
            self.step(step, &mut locals)?;
        }
        match &arm.action {
            FoldAction::Default => {
                let mut items = vec![SExpr::str(&arm.opener), left];
                for step in &arm.steps {
                    if step.bind {
                        items.push(locals.get(&step.pos).cloned().unwrap_or_else(SExpr::null));
                    }
                }
                Ok(SExpr::Seq(items))
            }
            FoldAction::Expr { ast: Some(ast), .. } => Ok(eval_expr(ast, &locals)),
            FoldAction::Expr { ast: None, .. } => Err(Error::Action { rule: arm.rule }),
        }
    }

    /// The chain/accessor fold loop; right-associative chains recurse
    /// through the arm's own self step instead of looping
    fn exec_fold(
        &mut self,
        base: &Arm,
        arms: &[FoldArm],
        right_assoc: bool,
    ) -> Result<SExpr, Error> {
        let mut left = self.run_arm(base, &mut Locals::new())?;

        if right_assoc {
            if let Some(arm) = arms.iter().find(|a| a.opener == self.la.kind) {
                return self.fold_value(arm, left);
            }
            return Ok(left);
        }

        loop {
            let Some(arm) = arms.iter().find(|a| a.opener == self.la.kind) else {
                return Ok(left);
            };
            left = self.fold_value(arm, left)?;
        }
    }

    /// The shared-prefix body: common steps once, then disambiguate
    fn exec_prefix(
        &mut self,
        prefix: &[Step],
        arms: &[Arm],
        expected: &[String],
    ) -> Result<SExpr, Error> {
        let mut locals = Locals::new();
        for step in prefix {
            self.step(step, &mut locals)?;
        }

        for arm in arms {
            if arm.labels.iter().any(|l| *l == self.la.kind) {
                for step in &arm.steps {
                    self.step(step, &mut locals)?;
                }
                return self.eval(&arm.action, &locals, arm.rule);
            }
        }

        Err(self.err(expected.to_vec()).into())
    }

    /// The elision-list body: separated list with null holes
    fn exec_elision(
        &mut self,
        seed: &PlanAction,
        seed_rule: usize,
        sep: &str,
        elem: &Step,
        labels: &[String],
    ) -> Result<SExpr, Error> {
        let mut items = self.seed_items(seed, seed_rule)?;

        if labels.iter().any(|l| *l == self.la.kind) {
            let value = self.step(elem, &mut Locals::new())?;
            items.push(value);
        } else if self.la.kind == sep {
            items.push(SExpr::null());
        }

        while self.la.kind == sep {
            self.match_kind(sep)?;
            if labels.iter().any(|l| *l == self.la.kind) {
                let value = self.step(elem, &mut Locals::new())?;
                items.push(value);
            } else {
                items.push(SExpr::null());
            }
        }

        Ok(SExpr::Seq(items))
    }
}

/// Evaluate an action tree against captured locals
fn eval_expr(ast: &ActionExpr, locals: &Locals) -> SExpr {
    match ast {
        ActionExpr::Ref(k) => locals.get(k).cloned().unwrap_or_else(SExpr::null),
        ActionExpr::RefValue(k) => match locals.get(k) {
            Some(SExpr::Atom(v)) => SExpr::Atom(v.unwrap_carrier().clone()),
            Some(other) => other.clone(),
            None => SExpr::null(),
        },
        ActionExpr::Str(s) => SExpr::str(s.clone()),
        ActionExpr::Num(n) => SExpr::Atom(Value::Num(*n)),
        ActionExpr::Bool(b) => SExpr::Atom(Value::Bool(*b)),
        ActionExpr::Null => SExpr::null(),
        ActionExpr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    ActionItem::Expr(e) => out.push(eval_expr(e, locals)),
                    ActionItem::Spread(e) => match eval_expr(e, locals) {
                        SExpr::Seq(seq) => out.extend(seq),
                        atom => out.push(atom),
                    },
                }
            }
            SExpr::Seq(out)
        }
    }
}

/// Whether a terminal kind is word-like (a name rather than punctuation)
fn wordlike(kind: &str) -> bool {
    kind.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// A lexer over a source string, classifying tokens against a grammar's
/// declared terminal set.
///
/// Punctuation terminals match longest-first; digit runs are `NUMBER`;
/// words are keyword terminals when their upper-cased lexeme is declared,
/// `IDENTIFIER` otherwise. Token values are the lexemes.
pub struct TextLexer {
    /// The source characters
    chars: Vec<char>,
    /// Read position
    pos: usize,
    /// Current line, 1-based
    line: usize,
    /// Current column, 1-based
    column: usize,
    /// Line of the last token returned
    token_line: usize,
    /// Column of the last token returned
    token_column: usize,
    /// Value of the last token returned
    value: Value,
    /// Punctuation terminals, longest first
    puncts: Vec<String>,
    /// Word-like terminals
    words: Vec<String>,
}

impl TextLexer {
    /// A lexer over one source text
    pub fn new(grammar: &Grammar, source: &str) -> Self {
        let mut puncts: Vec<String> = grammar
            .terminals()
            .iter()
            .filter(|t| !wordlike(t))
            .cloned()
            .collect();
        puncts.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let words = grammar
            .terminals()
            .iter()
            .filter(|t| wordlike(t))
            .cloned()
            .collect();

        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            value: Value::Null,
            puncts,
            words,
        }
    }

    /// Advance over one character, tracking line and column
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consume characters while the predicate holds
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while self.chars.get(self.pos).copied().is_some_and(&pred) {
            s.push(self.bump().unwrap());
        }
        s
    }
}

impl Lexer for TextLexer {
    fn next_kind(&mut self) -> Option<String> {
        while self.chars.get(self.pos).copied().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }

        self.token_line = self.line;
        self.token_column = self.column;

        let c = self.chars.get(self.pos).copied()?;

        if c.is_ascii_digit() {
            let lexeme = self.take_while(|c| c.is_ascii_digit());
            self.value = Value::Str(lexeme);
            return Some("NUMBER".to_string());
        }

        if c.is_alphabetic() || c == '_' {
            let lexeme = self.take_while(|c| c.is_alphanumeric() || c == '_');
            let upper = lexeme.to_uppercase();
            let kind = if self.words.contains(&upper) {
                upper
            } else {
                "IDENTIFIER".to_string()
            };
            self.value = Value::Str(lexeme);
            return Some(kind);
        }

        // longest punctuation terminal first
        let matched = self
            .puncts
            .iter()
            .find(|p| {
                let pat: Vec<char> = p.chars().collect();
                self.chars[self.pos..].starts_with(&pat)
            })
            .cloned();
        if let Some(punct) = matched {
            for _ in 0..punct.chars().count() {
                self.bump();
            }
            self.value = Value::Str(punct.clone());
            return Some(punct);
        }

        // unknown punctuation: let the parser report it
        let lexeme = self.bump().unwrap().to_string();
        self.value = Value::Str(lexeme.clone());
        Some(lexeme)
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn line(&self) -> usize {
        self.token_line
    }

    fn column(&self) -> usize {
        self.token_column
    }
}

/// A lexer over a pre-built token list, for callers that already hold a
/// token stream (and for tests).
pub struct TokenLexer {
    /// The tokens to replay
    tokens: Vec<Token>,
    /// Next token to hand out
    next: usize,
    /// Value of the last token returned
    value: Value,
    /// Line of the last token returned
    line: usize,
    /// Column of the last token returned
    column: usize,
}

impl TokenLexer {
    /// A lexer replaying the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            next: 0,
            value: Value::Null,
            line: 1,
            column: 1,
        }
    }
}

impl Lexer for TokenLexer {
    fn next_kind(&mut self) -> Option<String> {
        let token = self.tokens.get(self.next)?;
        self.next += 1;
        self.value = token.value.clone();
        self.line = token.line;
        self.column = token.column;
        Some(token.kind.clone())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn line(&self) -> usize {
        self.line
    }

    fn column(&self) -> usize {
        self.column
    }
}
