//! The rule-pattern recognizer.
//!
//! Inspects each nonterminal's alternative list and tags it with exactly
//! one pattern; the first matching shape wins, in the fixed order
//! Special, Tail, BinaryOpChain, AccessorChain, Dispatch, Switch. The
//! iterative shapes are what turn the naive recursive reading of a
//! left-recursive grammar into loops with bounded stack.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use log::{debug, warn};

use grammar::cfg::{Assoc, Grammar, Rule, Symbol};
use grammar::ll1::Analysis;

/// A right- or left-recursive list shape.
#[derive(Debug, Clone)]
pub struct TailShape {
    /// The single ε alternative
    pub empty_rule: usize,
    /// The separator terminal common to every recursive alternative
    pub sep: String,
    /// The recursive alternatives, in declaration order
    pub recursive: Vec<usize>,
    /// Recursion at the head (`N sep elems`, a separated list) rather
    /// than at the end (`sep elems N`, a terminator loop)
    pub head_recursive: bool,
}

/// A binary-operator chain shape.
#[derive(Debug, Clone)]
pub struct ChainShape {
    /// The non-recursive alternative: a single call to the sub-level
    pub base_rule: usize,
    /// The sub-level nonterminal
    pub sub: String,
    /// The operator alternatives, one operator terminal each
    pub op_rules: Vec<usize>,
    /// `Sub op N` (right-recursive, right-associative) rather than `N op Sub`
    pub right: bool,
}

/// A left-recursive postfix-operator chain shape.
#[derive(Debug, Clone)]
pub struct AccessorShape {
    /// The single non-recursive base alternative
    pub base_rule: usize,
    /// The postfix alternatives, each opened by a distinct terminal
    pub postfix_rules: Vec<usize>,
}

/// The pattern tag attached to every nonterminal.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A special handler is bound to this name; the generic engine steps aside
    Special(String),
    /// List terminator / separated list compiled to a `while` loop
    Tail(TailShape),
    /// Operator chain compiled to an accumulator loop
    BinaryOpChain(ChainShape),
    /// Postfix accessor chain compiled to an accumulator loop
    AccessorChain(AccessorShape),
    /// Every alternative opens with a distinct terminal; one switch
    Dispatch,
    /// No exploitable shape; switch over the SELECT sets
    Switch,
}

impl Pattern {
    /// Short tag name, used by statistics and logs
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Special(_) => "special",
            Pattern::Tail(_) => "tail",
            Pattern::BinaryOpChain(_) => "binary-op-chain",
            Pattern::AccessorChain(_) => "accessor-chain",
            Pattern::Dispatch => "dispatch",
            Pattern::Switch => "switch",
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The classification of every nonterminal.
#[derive(Debug)]
pub struct Classified {
    /// Pattern per nonterminal name
    patterns: HashMap<String, Pattern>,
}

impl Classified {
    /// The pattern of a nonterminal
    pub fn pattern(&self, nonterminal: &str) -> &Pattern {
        self.patterns.get(nonterminal).unwrap()
    }

    /// Iterate over all classifications
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Pattern)> {
        self.patterns.iter()
    }
}

/// One step of an alternative's position-binding plan.
#[derive(Debug, Clone)]
pub struct Step {
    /// One-based rhs position
    pub pos: usize,
    /// The symbol read at this position
    pub sym: Symbol,
    /// Whether the action references the position; unbound steps are
    /// still matched or parsed, their value is just dropped
    pub bind: bool,
}

/// The position-binding plan of a whole rule: a terminal match or a
/// nonterminal call per rhs position.
pub fn binding_plan(rule: &Rule, used: &[usize]) -> Vec<Step> {
    rule.rhs
        .iter()
        .enumerate()
        .map(|(i, sym)| Step {
            pos: i + 1,
            sym: sym.clone(),
            bind: used.contains(&(i + 1)),
        })
        .collect()
}

/// Tag every nonterminal with a pattern.
pub fn classify(grammar: &Grammar, analysis: &Analysis) -> Classified {
    let mut patterns = HashMap::new();

    for nonterminal in grammar.nonterminals() {
        let pattern = if let Some(handler) = grammar.special(nonterminal) {
            Pattern::Special(handler.to_string())
        } else if let Some(shape) = match_tail(grammar, nonterminal) {
            Pattern::Tail(shape)
        } else if let Some(shape) = match_chain(grammar, nonterminal) {
            Pattern::BinaryOpChain(shape)
        } else if let Some(shape) = match_accessor(grammar, nonterminal) {
            Pattern::AccessorChain(shape)
        } else if matches_dispatch(grammar, nonterminal) {
            Pattern::Dispatch
        } else {
            Pattern::Switch
        };

        debug!("{} classified as {}", nonterminal, pattern.name());
        if matches!(pattern, Pattern::Switch) && analysis.conflicted(nonterminal) {
            debug!(
                "{} keeps its SELECT conflict; emission will fail unless a special handler is bound",
                nonterminal
            );
        }
        patterns.insert(nonterminal.clone(), pattern);
    }

    Classified { patterns }
}

/// Occurrences of the nonterminal itself on a rule's rhs
fn self_refs(rule: &Rule, nonterminal: &str) -> usize {
    rule.rhs.iter().filter(|s| s.is_nt(nonterminal)).count()
}

/// Recognize the Tail shape: one ε alternative plus recursive list
/// alternatives sharing a single separator terminal.
fn match_tail(grammar: &Grammar, nonterminal: &str) -> Option<TailShape> {
    let alternatives = grammar.alternatives(nonterminal);

    let empty: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| grammar.rule(i).rhs.is_empty())
        .collect();
    let [empty_rule] = empty[..] else {
        return None;
    };

    let recursive: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| i != empty_rule)
        .collect();
    if recursive.is_empty() {
        return None;
    }

    let head_recursive = grammar.rule(recursive[0]).rhs[0].is_nt(nonterminal);
    let mut sep: Option<&str> = None;

    for &index in &recursive {
        let rule = grammar.rule(index);
        if rule.rhs.len() < 2 || self_refs(rule, nonterminal) != 1 {
            return None;
        }
        let this_sep = if head_recursive {
            // N sep elems…
            if !rule.rhs[0].is_nt(nonterminal) {
                return None;
            }
            match &rule.rhs[1] {
                Symbol::Terminal(t) => t.as_str(),
                Symbol::Nonterminal(_) => return None,
            }
        } else {
            // sep elems… N
            if !rule.rhs.last().unwrap().is_nt(nonterminal) {
                return None;
            }
            match &rule.rhs[0] {
                Symbol::Terminal(t) => t.as_str(),
                Symbol::Nonterminal(_) => return None,
            }
        };
        match sep {
            None => sep = Some(this_sep),
            Some(s) if s == this_sep => {}
            Some(_) => return None,
        }
    }

    Some(TailShape {
        empty_rule,
        sep: sep.unwrap().to_string(),
        recursive,
        head_recursive,
    })
}

/// Recognize the BinaryOpChain shape: `N → Sub | N op Sub | …` or its
/// right-recursive mirror, one orientation per nonterminal.
fn match_chain(grammar: &Grammar, nonterminal: &str) -> Option<ChainShape> {
    let alternatives = grammar.alternatives(nonterminal);
    if alternatives.len() < 2 {
        return None;
    }

    let base: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| {
            let rule = grammar.rule(i);
            matches!(&rule.rhs[..], [Symbol::Nonterminal(sub)] if sub.as_str() != nonterminal)
        })
        .collect();
    let [base_rule] = base[..] else {
        return None;
    };
    let Symbol::Nonterminal(sub) = &grammar.rule(base_rule).rhs[0] else {
        unreachable!()
    };

    let op_rules: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| i != base_rule)
        .collect();

    let mut orientation: Option<bool> = None;
    let mut ops = HashSet::new();

    for &index in &op_rules {
        let rule = grammar.rule(index);
        let right = match &rule.rhs[..] {
            [head, Symbol::Terminal(_), tail] => {
                if head.is_nt(nonterminal) && tail.is_nt(sub) {
                    false
                } else if head.is_nt(sub) && tail.is_nt(nonterminal) {
                    true
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        match orientation {
            None => orientation = Some(right),
            Some(o) if o == right => {}
            Some(_) => return None,
        }
        let Symbol::Terminal(op) = &rule.rhs[1] else {
            unreachable!()
        };
        if !ops.insert(op.clone()) {
            // two alternatives on the same operator cannot be keyed apart
            return None;
        }
    }

    let right = orientation?;
    let shape = ChainShape {
        base_rule,
        sub: sub.clone(),
        op_rules,
        right,
    };
    validate_against_operator_table(grammar, nonterminal, &shape, &ops);
    Some(shape)
}

/// Check a recognized chain against the advisory operator table. The
/// table never vetoes recognition; disagreements are logged.
fn validate_against_operator_table(
    grammar: &Grammar,
    nonterminal: &str,
    shape: &ChainShape,
    ops: &HashSet<String>,
) {
    if grammar.operators().is_empty() {
        return;
    }
    for op in ops {
        let entry = grammar
            .operators()
            .iter()
            .find(|e| e.tokens.iter().any(|t| t == op));
        match entry {
            None => warn!(
                "{}: operator '{}' is not in the precedence table",
                nonterminal, op
            ),
            Some(entry) => {
                let expected = if shape.right { Assoc::Right } else { Assoc::Left };
                if entry.assoc == Assoc::Nonassoc {
                    warn!(
                        "{}: '{}' is declared nonassoc but the grammar chains it",
                        nonterminal, op
                    );
                } else if entry.assoc != expected {
                    warn!(
                        "{}: '{}' associativity disagrees with the {}-recursive rule shape",
                        nonterminal,
                        op,
                        if shape.right { "right" } else { "left" }
                    );
                }
            }
        }
    }
}

/// Recognize the AccessorChain shape: a single base alternative plus
/// left-recursive postfix alternatives with distinct opener terminals.
fn match_accessor(grammar: &Grammar, nonterminal: &str) -> Option<AccessorShape> {
    let alternatives = grammar.alternatives(nonterminal);
    if alternatives.len() < 2 {
        return None;
    }

    let base: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| {
            let rule = grammar.rule(i);
            rule.rhs.len() == 1 && self_refs(rule, nonterminal) == 0
        })
        .collect();
    let [base_rule] = base[..] else {
        return None;
    };

    let postfix_rules: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| i != base_rule)
        .collect();

    let mut openers = HashSet::new();
    for &index in &postfix_rules {
        let rule = grammar.rule(index);
        if rule.rhs.len() < 2
            || !rule.rhs[0].is_nt(nonterminal)
            || self_refs(rule, nonterminal) != 1
        {
            return None;
        }
        let Symbol::Terminal(opener) = &rule.rhs[1] else {
            return None;
        };
        if !openers.insert(opener.clone()) {
            return None;
        }
    }

    Some(AccessorShape {
        base_rule,
        postfix_rules,
    })
}

/// Recognize the Dispatch shape: every alternative opens with a distinct
/// terminal, plus at most one ε tail.
fn matches_dispatch(grammar: &Grammar, nonterminal: &str) -> bool {
    let mut leads = HashSet::new();
    let mut empties = 0;

    for &index in grammar.alternatives(nonterminal) {
        let rule = grammar.rule(index);
        match rule.rhs.first() {
            None => empties += 1,
            Some(Symbol::Terminal(t)) => {
                if !leads.insert(t.clone()) {
                    return false;
                }
            }
            Some(Symbol::Nonterminal(_)) => return false,
        }
    }

    empties <= 1
}
