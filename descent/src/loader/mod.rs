//! The grammar loader: decodes the line-oriented DSL dialect into the IR.
//!
//! The surface syntax is yacc-flavored:
//!
//! ```text
//! %start Root
//! %token NUMBER IDENTIFIER
//! %left '+' '-'
//! %special Bracket shared-prefix
//!
//! Root
//!   : Lines                  -> ["program", ...1]
//!   ;
//! Expr
//!   : Term                   -> 1
//!   | Expr '+' Term          -> ["+", 1, 3]
//!   ;
//! ```
//!
//! Alternatives open with `:` or `|`, one per line; an empty alternative
//! is ε. An action runs from `->` to the end of the line and is kept
//! verbatim. A rule closes with `;`, either on its own line or at the end
//! of an action-less alternative. Quoted symbols are implicit terminals.
//! `#` starts a comment outside quotes.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use log::debug;

use grammar::cfg::{self, Assoc, Grammar, OperatorEntry, RuleSpec};

use crate::action;
use crate::context::Context;

pub mod error;
pub mod token;

use error::Error;
use token::{parse_symbol, Directive};

/// Decode a grammar source into the IR.
///
/// # Errors
///
/// Every [Error] is returned with the offending line attached.
pub fn load(source: &str, file_name: &str) -> Result<Grammar, Context<Error>> {
    let mut loader = Loader::new(source, file_name);
    loader.run()?;
    loader.finish()
}

/// A rule whose `;` has not been seen yet
struct Open {
    /// The rule's left-hand side
    lhs: String,
    /// The line the rule header appeared on
    line: usize,
}

/// Loader state while walking the source lines
struct Loader<'a> {
    /// Name of the grammar file, for diagnostics
    file_name: &'a str,
    /// The raw source lines
    lines: Vec<&'a str>,
    /// `%start` argument, if seen
    start: Option<String>,
    /// Declared and implicit terminal kinds
    terminals: HashSet<String>,
    /// Operator-precedence rows in declaration order
    operators: Vec<OperatorEntry>,
    /// Special-handler bindings
    specials: HashMap<String, String>,
    /// Decoded rules in declaration order
    rules: Vec<RuleSpec>,
    /// Source line of each rule, parallel to `rules`
    rule_lines: Vec<usize>,
    /// The rule currently being read
    open: Option<Open>,
}

impl<'a> Loader<'a> {
    /// Set up a loader over a source text
    fn new(source: &'a str, file_name: &'a str) -> Self {
        Self {
            file_name,
            lines: source.lines().collect(),
            start: None,
            terminals: HashSet::new(),
            operators: Vec::new(),
            specials: HashMap::new(),
            rules: Vec::new(),
            rule_lines: Vec::new(),
            open: None,
        }
    }

    /// Attach a location to an error kind
    fn ctx(&self, kind: Error, line: usize, column: usize) -> Context<Error> {
        Context::new(
            kind,
            self.lines.get(line).copied().unwrap_or("").to_string(),
            line,
            column,
            self.file_name.to_string(),
        )
    }

    /// Column (in characters) of a needle within a line, for carets
    fn column_of(&self, line: usize, needle: &str) -> usize {
        self.lines
            .get(line)
            .and_then(|l| l.find(needle).map(|b| l[..b].chars().count()))
            .unwrap_or(0)
    }

    /// Walk every source line
    fn run(&mut self) -> Result<(), Context<Error>> {
        for num in 0..self.lines.len() {
            let line = strip_comment(self.lines[num]);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('%') {
                self.directive(rest, num)?;
            } else if let Some(rest) = trimmed.strip_prefix(':').or_else(|| trimmed.strip_prefix('|')) {
                if self.open.is_none() {
                    return Err(self.ctx(Error::DanglingAlternative, num, 0));
                }
                self.alternative(rest, num)?;
            } else if trimmed == ";" {
                if self.open.take().is_none() {
                    return Err(self.ctx(Error::DanglingAlternative, num, 0));
                }
            } else {
                self.header(trimmed, num)?;
            }
        }
        Ok(())
    }

    /// Handle a `%`-directive line
    fn directive(&mut self, rest: &str, num: usize) -> Result<(), Context<Error>> {
        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or("");
        let directive = Directive::from_str(name)
            .map_err(|()| self.ctx(Error::UnknownDirective(format!("%{}", name)), num, 0))?;
        let args: Vec<&str> = words.collect();

        match directive {
            Directive::Start => {
                if self.start.is_some() {
                    return Err(self.ctx(Error::DuplicateStart, num, 0));
                }
                let [arg] = args[..] else {
                    return Err(self.usage(directive, "one nonterminal name", num));
                };
                self.start = Some(arg.to_string());
            }
            Directive::Token => {
                for arg in args {
                    let symbol = self.symbol(arg, num)?;
                    self.terminals.insert(symbol);
                }
            }
            Directive::Left | Directive::Right | Directive::Nonassoc => {
                if args.is_empty() {
                    return Err(self.usage(directive, "at least one operator terminal", num));
                }
                let mut tokens = Vec::with_capacity(args.len());
                for arg in args {
                    let symbol = self.symbol(arg, num)?;
                    // operator tokens are terminals whether quoted or not
                    self.terminals.insert(symbol.clone());
                    tokens.push(symbol);
                }
                let assoc = match directive {
                    Directive::Left => Assoc::Left,
                    Directive::Right => Assoc::Right,
                    _ => Assoc::Nonassoc,
                };
                self.operators.push(OperatorEntry { assoc, tokens });
            }
            Directive::Special => {
                let [nonterminal, handler] = args[..] else {
                    return Err(self.usage(directive, "a nonterminal and a handler name", num));
                };
                let nonterminal = self.symbol(nonterminal, num)?;
                debug!("binding special handler '{}' to {}", handler, nonterminal);
                self.specials.insert(nonterminal, handler.to_string());
            }
        }
        Ok(())
    }

    /// Directive-usage error helper
    fn usage(&self, directive: Directive, usage: &'static str, num: usize) -> Context<Error> {
        self.ctx(
            Error::DirectiveUsage {
                directive: directive.to_string(),
                usage,
            },
            num,
            0,
        )
    }

    /// Decode one symbol token, locating errors at the token
    fn symbol(&self, tok: &str, num: usize) -> Result<String, Context<Error>> {
        match parse_symbol(tok) {
            Ok(symbol) => Ok(symbol.name),
            Err(e) => Err(self.ctx(e, num, self.column_of(num, tok))),
        }
    }

    /// Handle a rule-header line, which may carry an inline first alternative
    fn header(&mut self, trimmed: &str, num: usize) -> Result<(), Context<Error>> {
        if let Some(open) = &self.open {
            return Err(self.ctx(Error::UnterminatedRule(open.lhs.clone()), num, 0));
        }

        let (name, inline) = match trimmed.find(':') {
            Some(at) => (trimmed[..at].trim_end(), Some(&trimmed[at + 1..])),
            None => (trimmed, None),
        };

        let symbol = parse_symbol(name)
            .ok()
            .filter(|s| !s.quoted)
            .ok_or_else(|| self.ctx(Error::ExpectedRule(trimmed.to_string()), num, 0))?;

        self.open = Some(Open {
            lhs: symbol.name,
            line: num,
        });

        if let Some(rest) = inline {
            self.alternative(rest, num)?;
        }
        Ok(())
    }

    /// Decode one alternative: symbols, optional `-> action`, optional `;`
    fn alternative(&mut self, text: &str, num: usize) -> Result<(), Context<Error>> {
        let (symbols_text, action) = match find_arrow(text) {
            Some(at) => {
                let action = text[at + 2..].trim();
                if action.is_empty() {
                    return Err(self.ctx(Error::EmptyAction, num, self.column_of(num, "->")));
                }
                (&text[..at], Some(action.to_string()))
            }
            None => (text, None),
        };

        let mut close = false;
        let mut names = Vec::new();
        for tok in symbols_text.split_whitespace() {
            if close {
                return Err(self.ctx(Error::BadSymbol(tok.to_string()), num, self.column_of(num, tok)));
            }
            if tok == ";" {
                close = true;
                continue;
            }
            let symbol = match parse_symbol(tok) {
                Ok(s) => s,
                Err(e) => return Err(self.ctx(e, num, self.column_of(num, tok))),
            };
            if symbol.quoted {
                self.terminals.insert(symbol.name.clone());
            }
            names.push(symbol.name);
        }

        // the trivial actions: pass position 1, or the empty sequence for ε
        let action = action.unwrap_or_else(|| {
            if names.is_empty() {
                "[]".to_string()
            } else {
                "1".to_string()
            }
        });

        let lhs = self.open.as_ref().unwrap().lhs.clone();
        self.rules.push((lhs, names, action));
        self.rule_lines.push(num);

        if close {
            self.open = None;
        }
        Ok(())
    }

    /// Validate actions, pick the start symbol and assemble the IR
    fn finish(mut self) -> Result<Grammar, Context<Error>> {
        if let Some(open) = &self.open {
            return Err(self.ctx(Error::UnterminatedRule(open.lhs.clone()), open.line, 0));
        }
        if self.rules.is_empty() {
            return Err(self.ctx(Error::NoRules, 0, 0));
        }

        for (index, (_, names, action_text)) in self.rules.iter().enumerate() {
            let transformed = action::transform(action_text);
            if let Some(&position) = transformed
                .positions
                .iter()
                .find(|&&k| k == 0 || k > names.len())
            {
                return Err(self.ctx(
                    Error::BadActionRef {
                        rule: index,
                        position,
                        limit: names.len(),
                    },
                    self.rule_lines[index],
                    0,
                ));
            }
        }

        let start = self.start.take().unwrap_or_else(|| "Root".to_string());
        debug!(
            "loaded {} rules, {} terminals, start symbol {}",
            self.rules.len(),
            self.terminals.len(),
            start
        );

        let rule_lines = std::mem::take(&mut self.rule_lines);
        Grammar::new(
            start,
            std::mem::take(&mut self.rules),
            std::mem::take(&mut self.terminals),
            std::mem::take(&mut self.operators),
            std::mem::take(&mut self.specials),
        )
        .map_err(|e| {
            let line = match &e {
                cfg::Error::UnknownSymbol { rule, .. } => rule_lines[*rule],
                _ => 0,
            };
            self.ctx(Error::Grammar(e), line, 0)
        })
    }
}

/// Truncate a line at the first `#` outside quotes
fn strip_comment(line: &str) -> &str {
    let mut in_str: Option<char> = None;
    let mut escape = false;
    for (at, c) in line.char_indices() {
        match in_str {
            Some(quote) => {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == quote {
                    in_str = None;
                }
            }
            None => match c {
                '\'' | '"' => in_str = Some(c),
                '#' => return &line[..at],
                _ => {}
            },
        }
    }
    line
}

/// Byte offset of the first `->` outside quotes
fn find_arrow(text: &str) -> Option<usize> {
    let mut in_str: Option<char> = None;
    let mut escape = false;
    let bytes = text.as_bytes();
    for (at, c) in text.char_indices() {
        match in_str {
            Some(quote) => {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == quote {
                    in_str = None;
                }
            }
            None => match c {
                '\'' | '"' => in_str = Some(c),
                '-' if bytes.get(at + 1) == Some(&b'>') => return Some(at),
                _ => {}
            },
        }
    }
    None
}
