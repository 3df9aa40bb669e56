//! The grammar intermediate representation.
//!
//! All loader dialects decode to [Grammar]; the analyzer, the pattern
//! recognizer and the emitter only ever see this form. Construction
//! validates the structural invariants so the later stages can index
//! freely.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

/// Reserved terminal kind marking the end of the token stream.
pub const END: &str = "$end";

/// The set of declared terminal kinds
pub type Terminals = HashSet<String>;
/// A raw rule as decoded by a loader dialect: `(lhs, rhs symbol names, action)`
pub type RuleSpec = (String, Vec<String>, String);
/// Special-handler bindings declared by the grammar: nonterminal name → handler name
pub type Specials = HashMap<String, String>;

/// A single symbol on the right-hand side of a rule.
///
/// Classification is by LHS-presence, never by case: a name is a
/// nonterminal iff some rule defines it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// An atomic token kind produced by the lexer
    Terminal(String),
    /// A name defined by at least one rule
    Nonterminal(String),
}

impl Symbol {
    /// The symbol's name regardless of classification
    pub fn name(&self) -> &str {
        match self {
            Symbol::Terminal(t) => t,
            Symbol::Nonterminal(n) => n,
        }
    }

    /// Whether this symbol is a reference to the given nonterminal
    pub fn is_nt(&self, name: &str) -> bool {
        matches!(self, Symbol::Nonterminal(n) if n == name)
    }
}

/// A production rule with its semantic action.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Position in declaration order; used by every diagnostic
    pub index: usize,
    /// The nonterminal this rule defines
    pub lhs: String,
    /// The symbol sequence; an empty sequence is ε
    pub rhs: Vec<Symbol>,
    /// Verbatim host-language expression producing the rule's s-expression
    pub action: String,
}

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// `a op b op c` groups as `(a op b) op c`
    Left,
    /// `a op b op c` groups as `a op (b op c)`
    Right,
    /// chaining is not meaningful for these operators
    Nonassoc,
}

/// One row of the operator-precedence table. Low table index binds loosest.
///
/// The table is advisory in LL(1) mode: it validates operator-chain
/// recognition and is never consulted at parse time.
#[derive(Debug, Clone)]
pub struct OperatorEntry {
    /// How chains of these operators associate
    pub assoc: Assoc,
    /// The operator terminals sharing this precedence level
    pub tokens: Vec<String>,
}

/// Errors raised while assembling a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An rhs symbol is neither a declared terminal nor a defined nonterminal
    UnknownSymbol {
        /// The unresolved name
        symbol: String,
        /// Index of the offending rule
        rule: usize,
        /// The rule's left-hand side
        nonterminal: String,
    },
    /// The start symbol has no defining rule
    UndefinedStart(String),
    /// A name was declared as a terminal and also defined by rules
    TerminalOnLhs(String),
    /// `$end` is reserved for the end-of-stream sentinel
    ReservedEnd,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownSymbol {
                symbol,
                rule,
                nonterminal,
            } => write!(
                f,
                "unknown symbol '{}' in rule {} of {}",
                symbol, rule, nonterminal
            ),
            Error::UndefinedStart(s) => write!(f, "start symbol '{}' has no rules", s),
            Error::TerminalOnLhs(s) => write!(
                f,
                "'{}' is declared as a terminal but appears on a left-hand side",
                s
            ),
            Error::ReservedEnd => write!(f, "'{}' is reserved and cannot be declared", END),
        }
    }
}

/// A validated context-free grammar with semantic actions and the
/// advisory operator table.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// The start symbol
    start: String,
    /// Rules in declaration order; `Rule::index` equals the position here
    rules: Vec<Rule>,
    /// Nonterminals in first-definition order
    nonterminals: Vec<String>,
    /// Rule indices per nonterminal, in declaration order
    alternatives: HashMap<String, Vec<usize>>,
    /// The declared terminal kinds
    terminals: Terminals,
    /// Operator-precedence table, low to high binding
    operators: Vec<OperatorEntry>,
    /// Special-handler bindings
    specials: Specials,
}

impl Grammar {
    /// Assemble and validate a grammar from raw rule specs.
    ///
    /// Symbol names resolve against the set of left-hand sides first and
    /// the declared terminals second; anything else is an error. The
    /// rules keep their declaration order, which fixes every rule index
    /// used in diagnostics.
    ///
    /// # Errors
    ///
    /// See [Error] for the structural invariants checked here.
    pub fn new(
        start: impl Into<String>,
        specs: Vec<RuleSpec>,
        terminals: Terminals,
        operators: Vec<OperatorEntry>,
        specials: Specials,
    ) -> Result<Self, Error> {
        let start = start.into();

        if terminals.contains(END) || specs.iter().any(|(lhs, _, _)| lhs.as_str() == END) {
            return Err(Error::ReservedEnd);
        }

        // nonterminals in first-definition order
        let mut nonterminals: Vec<String> = Vec::new();
        for (lhs, _, _) in &specs {
            if !nonterminals.contains(lhs) {
                nonterminals.push(lhs.clone());
            }
        }

        if let Some(n) = nonterminals.iter().find(|n| terminals.contains(*n)) {
            return Err(Error::TerminalOnLhs(n.clone()));
        }
        if !nonterminals.contains(&start) {
            return Err(Error::UndefinedStart(start));
        }

        let defined: HashSet<&String> = nonterminals.iter().collect();

        let mut rules = Vec::with_capacity(specs.len());
        let mut alternatives: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, (lhs, names, action)) in specs.into_iter().enumerate() {
            let mut rhs = Vec::with_capacity(names.len());
            for name in names {
                let symbol = if defined.contains(&name) {
                    Symbol::Nonterminal(name)
                } else if terminals.contains(&name) {
                    Symbol::Terminal(name)
                } else {
                    return Err(Error::UnknownSymbol {
                        symbol: name,
                        rule: index,
                        nonterminal: lhs,
                    });
                };
                rhs.push(symbol);
            }

            alternatives.entry(lhs.clone()).or_default().push(index);
            rules.push(Rule {
                index,
                lhs,
                rhs,
                action,
            });
        }

        Ok(Self {
            start,
            rules,
            nonterminals,
            alternatives,
            terminals,
            operators,
            specials,
        })
    }

    /// The start symbol
    pub fn start(&self) -> &str {
        &self.start
    }

    /// All rules in declaration order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule with the given index
    pub fn rule(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    /// Nonterminals in first-definition order
    pub fn nonterminals(&self) -> &[String] {
        &self.nonterminals
    }

    /// The declared terminal kinds
    pub fn terminals(&self) -> &Terminals {
        &self.terminals
    }

    /// Rule indices of the given nonterminal, in declaration order
    pub fn alternatives(&self, nonterminal: &str) -> &[usize] {
        self.alternatives
            .get(nonterminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The operator-precedence table
    pub fn operators(&self) -> &[OperatorEntry] {
        &self.operators
    }

    /// The special handler bound to a nonterminal, if any
    pub fn special(&self, nonterminal: &str) -> Option<&str> {
        self.specials.get(nonterminal).map(String::as_str)
    }

    /// All special-handler bindings
    pub fn specials(&self) -> &Specials {
        &self.specials
    }
}
