//! The special handlers registry.
//!
//! A closed enumeration of bespoke emitters for shapes the generic
//! pattern engine cannot produce faithfully. Registration is static: a
//! grammar binds a nonterminal to a handler by name (`%special`), and
//! the planner resolves the name here. Handlers factor at emission
//! level; none of them widens the one-token runtime contract.

use std::str::FromStr;

use log::debug;

use grammar::cfg::{Grammar, Rule, Symbol};
use grammar::compute::first_of_seq;
use grammar::ll1::{Analysis, Conflict};

use crate::action::Transformed;
use crate::pattern::{binding_plan, Step};
use crate::plan::{plan_action, sorted, value_bearing, Arm, Body, Error, FoldAction, FoldArm};

/// The registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Emit the longest common rhs prefix once, then dispatch on the
    /// token after it. Covers bracketed forms whose meaning is decided
    /// by one token past a shared opener (range vs sequence).
    SharedPrefix,
    /// An accumulator loop that folds binary operators and postfix
    /// modifier alternatives (postfix conditionals, ternary tails) in
    /// the same iteration.
    ExpressionCore,
    /// A separated list permitting leading, interior and trailing
    /// elisions, emitted as null holes in the output sequence.
    ElisionList,
}

impl Handler {
    /// Array of all handlers (used for lookups)
    pub const VALUES: [Self; 3] = [Self::SharedPrefix, Self::ExpressionCore, Self::ElisionList];

    /// The handler's registry name
    pub const fn name(&self) -> &'static str {
        match self {
            Handler::SharedPrefix => "shared-prefix",
            Handler::ExpressionCore => "expression-core",
            Handler::ElisionList => "elision-list",
        }
    }

    /// Resolve a registry name
    pub fn lookup(name: &str) -> Option<Self> {
        Self::VALUES.iter().find(|h| h.name() == name).copied()
    }
}

impl FromStr for Handler {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or(())
    }
}

/// Produce the body for a special nonterminal.
pub fn build(
    handler: Handler,
    nonterminal: &str,
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
) -> Result<Body, Error> {
    debug!("building {} via {}", nonterminal, handler.name());
    match handler {
        Handler::SharedPrefix => shared_prefix(nonterminal, grammar, analysis, transformed),
        Handler::ExpressionCore => expression_core(nonterminal, grammar, transformed),
        Handler::ElisionList => elision_list(nonterminal, grammar, analysis, transformed),
    }
}

/// Shape-refusal helper
fn mismatch(nonterminal: &str, handler: Handler, reason: impl Into<String>) -> Error {
    Error::SpecialMismatch {
        nonterminal: nonterminal.to_string(),
        handler: handler.name(),
        reason: reason.into(),
    }
}

/// Emit the longest common prefix once, then disambiguate the
/// alternatives by the FIRST of their remainders.
fn shared_prefix(
    nonterminal: &str,
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
) -> Result<Body, Error> {
    let alternatives = grammar.alternatives(nonterminal);
    if alternatives.len() < 2 {
        return Err(mismatch(
            nonterminal,
            Handler::SharedPrefix,
            "needs at least two alternatives",
        ));
    }

    let rules: Vec<&Rule> = alternatives.iter().map(|&i| grammar.rule(i)).collect();
    let shortest = rules.iter().map(|r| r.rhs.len()).min().unwrap();
    let mut prefix_len = 0;
    while prefix_len < shortest
        && rules
            .iter()
            .all(|r| r.rhs[prefix_len] == rules[0].rhs[prefix_len])
    {
        prefix_len += 1;
    }
    if prefix_len == 0 {
        return Err(mismatch(
            nonterminal,
            Handler::SharedPrefix,
            "alternatives share no common prefix",
        ));
    }

    // a prefix position is bound when any alternative's action uses it
    let prefix = rules[0].rhs[..prefix_len]
        .iter()
        .enumerate()
        .map(|(i, sym)| Step {
            pos: i + 1,
            sym: sym.clone(),
            bind: alternatives
                .iter()
                .any(|&ri| transformed[ri].positions.contains(&(i + 1))),
        })
        .collect();

    let mut arms = Vec::new();
    let mut expected = Vec::new();
    for (&ri, rule) in alternatives.iter().zip(&rules) {
        let remainder = &rule.rhs[prefix_len..];
        let (mut first, all_nullable) =
            first_of_seq(remainder, analysis.first_map(), analysis.nullable_map());
        if all_nullable {
            first.extend(analysis.follow(nonterminal).iter().cloned());
        }
        let labels = sorted(first);
        expected.extend(labels.iter().cloned());

        let steps = remainder
            .iter()
            .enumerate()
            .map(|(i, sym)| Step {
                pos: prefix_len + i + 1,
                sym: sym.clone(),
                bind: transformed[ri].positions.contains(&(prefix_len + i + 1)),
            })
            .collect();

        arms.push(Arm {
            labels,
            rule: ri,
            steps,
            action: plan_action(&transformed[ri]),
        });
    }

    // the remainders must be tellable apart by one token
    for (i, a) in arms.iter().enumerate() {
        for b in &arms[i + 1..] {
            let shared: Vec<String> = a
                .labels
                .iter()
                .filter(|l| b.labels.contains(l))
                .cloned()
                .collect();
            if !shared.is_empty() {
                return Err(Error::UnresolvedConflict(Conflict {
                    nonterminal: nonterminal.to_string(),
                    rules: (a.rule, b.rule),
                    terminals: shared,
                }));
            }
        }
    }

    Ok(Body::PrefixSwitch {
        prefix,
        arms,
        expected: sorted(expected),
    })
}

/// The iterative expression core: one base alternative, then every
/// head-recursive alternative becomes an arm of the same fold loop.
fn expression_core(
    nonterminal: &str,
    grammar: &Grammar,
    transformed: &[Transformed],
) -> Result<Body, Error> {
    let alternatives = grammar.alternatives(nonterminal);

    let base: Vec<usize> = alternatives
        .iter()
        .copied()
        .filter(|&i| !grammar.rule(i).rhs.iter().any(|s| s.is_nt(nonterminal)))
        .collect();
    let [base_rule] = base[..] else {
        return Err(mismatch(
            nonterminal,
            Handler::ExpressionCore,
            "needs exactly one non-recursive alternative",
        ));
    };
    if grammar.rule(base_rule).rhs.is_empty() {
        return Err(mismatch(
            nonterminal,
            Handler::ExpressionCore,
            "the base alternative cannot be empty",
        ));
    }

    let base = Arm {
        labels: Vec::new(),
        rule: base_rule,
        steps: binding_plan(grammar.rule(base_rule), &transformed[base_rule].positions),
        action: plan_action(&transformed[base_rule]),
    };

    let mut arms: Vec<FoldArm> = Vec::new();
    for &ri in alternatives {
        if ri == base_rule {
            continue;
        }
        let rule = grammar.rule(ri);
        if rule.rhs.len() < 2 || !rule.rhs[0].is_nt(nonterminal) {
            return Err(mismatch(
                nonterminal,
                Handler::ExpressionCore,
                format!("rule {} is not head-recursive", ri),
            ));
        }
        let Symbol::Terminal(opener) = &rule.rhs[1] else {
            return Err(mismatch(
                nonterminal,
                Handler::ExpressionCore,
                format!("rule {} has no terminal after the recursive head", ri),
            ));
        };
        if arms.iter().any(|a| &a.opener == opener) {
            return Err(mismatch(
                nonterminal,
                Handler::ExpressionCore,
                format!("two alternatives open on '{}'", opener),
            ));
        }

        let default = transformed[ri].pass_through.is_some();
        let steps = rule
            .rhs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, sym)| Step {
                pos: i + 1,
                sym: sym.clone(),
                bind: if default {
                    i > 1 && value_bearing(sym)
                } else {
                    transformed[ri].positions.contains(&(i + 1))
                },
            })
            .collect();

        arms.push(FoldArm {
            opener: opener.clone(),
            rule: ri,
            steps,
            uses_head: !default && transformed[ri].positions.contains(&1),
            action: if default {
                FoldAction::Default
            } else {
                FoldAction::Expr {
                    text: transformed[ri].text.clone(),
                    ast: crate::action::parse_expr(&transformed[ri].text),
                }
            },
        });
    }

    if arms.is_empty() {
        return Err(mismatch(
            nonterminal,
            Handler::ExpressionCore,
            "needs at least one recursive alternative",
        ));
    }

    Ok(Body::FoldLoop {
        base,
        arms,
        right_assoc: false,
    })
}

/// The elision list: `N → ε | Elem | N sep | N sep Elem`, with missing
/// elements becoming null holes.
fn elision_list(
    nonterminal: &str,
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
) -> Result<Body, Error> {
    let alternatives = grammar.alternatives(nonterminal);

    let mut empty_rule = None;
    let mut elem: Option<Symbol> = None;
    let mut sep: Option<String> = None;

    let mut note_elem = |symbol: &Symbol| -> Result<(), Error> {
        match &elem {
            None => {
                elem = Some(symbol.clone());
                Ok(())
            }
            Some(e) if e == symbol => Ok(()),
            Some(_) => Err(mismatch(
                nonterminal,
                Handler::ElisionList,
                "alternatives disagree on the element symbol",
            )),
        }
    };

    for &ri in alternatives {
        let rule = grammar.rule(ri);
        match &rule.rhs[..] {
            [] => {
                if empty_rule.replace(ri).is_some() {
                    return Err(mismatch(
                        nonterminal,
                        Handler::ElisionList,
                        "more than one empty alternative",
                    ));
                }
            }
            [single] if !single.is_nt(nonterminal) => note_elem(single)?,
            [head, Symbol::Terminal(s)] if head.is_nt(nonterminal) => match &sep {
                None => sep = Some(s.clone()),
                Some(existing) if existing == s => {}
                Some(_) => {
                    return Err(mismatch(
                        nonterminal,
                        Handler::ElisionList,
                        "alternatives disagree on the separator",
                    ))
                }
            },
            [head, Symbol::Terminal(s), tail] if head.is_nt(nonterminal) => {
                match &sep {
                    None => sep = Some(s.clone()),
                    Some(existing) if existing == s => {}
                    Some(_) => {
                        return Err(mismatch(
                            nonterminal,
                            Handler::ElisionList,
                            "alternatives disagree on the separator",
                        ))
                    }
                }
                note_elem(tail)?;
            }
            _ => {
                return Err(mismatch(
                    nonterminal,
                    Handler::ElisionList,
                    format!("rule {} does not fit the elision shape", ri),
                ))
            }
        }
    }

    let Some(empty_rule) = empty_rule else {
        return Err(mismatch(
            nonterminal,
            Handler::ElisionList,
            "needs an empty alternative",
        ));
    };
    let Some(sep) = sep else {
        return Err(mismatch(
            nonterminal,
            Handler::ElisionList,
            "needs a recursive separator alternative",
        ));
    };
    let Some(elem) = elem else {
        return Err(mismatch(
            nonterminal,
            Handler::ElisionList,
            "no alternative names an element symbol",
        ));
    };

    let labels = match &elem {
        Symbol::Terminal(t) => vec![t.clone()],
        Symbol::Nonterminal(n) => {
            if analysis.nullable(n) {
                return Err(mismatch(
                    nonterminal,
                    Handler::ElisionList,
                    "a nullable element makes holes ambiguous",
                ));
            }
            sorted(analysis.first(n).iter().cloned())
        }
    };

    Ok(Body::ElisionLoop {
        seed: plan_action(&transformed[empty_rule]),
        seed_rule: empty_rule,
        sep,
        elem: Step {
            pos: 1,
            sym: elem,
            bind: true,
        },
        labels,
    })
}
