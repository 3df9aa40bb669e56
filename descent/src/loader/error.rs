//! Errors produced while decoding a grammar source.

use std::fmt::Display;

use grammar::cfg;

/// Ways a grammar source can be malformed.
#[derive(Debug)]
pub enum Error {
    /// A `%`-line names no known directive
    UnknownDirective(String),
    /// A directive was given the wrong arguments
    DirectiveUsage {
        /// The directive as written
        directive: String,
        /// What it expects
        usage: &'static str,
    },
    /// `%start` appeared twice
    DuplicateStart,
    /// The source declares no rules at all
    NoRules,
    /// A line that should open a rule does not look like one
    ExpectedRule(String),
    /// `:`, `|` or `;` appeared with no rule open
    DanglingAlternative,
    /// A rule was still open at end of input
    UnterminatedRule(String),
    /// A symbol token is neither quoted nor identifier-shaped
    BadSymbol(String),
    /// `->` with nothing after it
    EmptyAction,
    /// An action references a position outside its rhs
    BadActionRef {
        /// Index of the offending rule
        rule: usize,
        /// The out-of-range position
        position: usize,
        /// The rhs length the position was checked against
        limit: usize,
    },
    /// A structural invariant failed while assembling the IR
    Grammar(cfg::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownDirective(d) => write!(f, "unknown directive '{}'", d),
            Error::DirectiveUsage { directive, usage } => {
                write!(f, "{} expects {}", directive, usage)
            }
            Error::DuplicateStart => write!(f, "%start appears more than once"),
            Error::NoRules => write!(f, "grammar declares no rules"),
            Error::ExpectedRule(line) => {
                write!(f, "expected a rule header, found '{}'", line)
            }
            Error::DanglingAlternative => {
                write!(f, "alternative outside of a rule")
            }
            Error::UnterminatedRule(lhs) => {
                write!(f, "rule '{}' is missing its closing ';'", lhs)
            }
            Error::BadSymbol(s) => write!(f, "malformed symbol '{}'", s),
            Error::EmptyAction => write!(f, "'->' with no action after it"),
            Error::BadActionRef {
                rule,
                position,
                limit,
            } => write!(
                f,
                "action of rule {} references position {} but the rule has {} symbol(s)",
                rule, position, limit
            ),
            Error::Grammar(e) => e.fmt(f),
        }
    }
}

impl From<cfg::Error> for Error {
    fn from(value: cfg::Error) -> Self {
        Self::Grammar(value)
    }
}
