//! Emission planning.
//!
//! The pure stage between classification and rendering: every
//! nonterminal's pattern, binding plan and transformed action are folded
//! into a [Body] that both the JavaScript emitter and the reference
//! runtime consume. Planning is also where the late failures live:
//! out-of-range action references, unknown special handlers, and
//! conflicts nothing resolved.

use std::collections::HashMap;
use std::fmt::Display;

use grammar::cfg::{Grammar, Symbol};
use grammar::compute::first_of_seq;
use grammar::ll1::{Analysis, Conflict};

use crate::action::{self, ActionExpr, Transformed};
use crate::pattern::{binding_plan, Classified, Pattern, Step};
use crate::special::{self, Handler};

/// An action ready for rendering and evaluation.
#[derive(Debug, Clone)]
pub enum PlanAction {
    /// Return the value captured at position k verbatim
    PassThrough(usize),
    /// A transformed expression
    Expr {
        /// The transformed text, for the JavaScript emitter
        text: String,
        /// The parsed tree, for the reference runtime; [None] when the
        /// action falls outside the evaluable subset
        ast: Option<ActionExpr>,
    },
}

/// A labeled arm of a switch-shaped body.
#[derive(Debug, Clone)]
pub struct Arm {
    /// Terminals selecting this arm, sorted
    pub labels: Vec<String>,
    /// The rule this arm implements
    pub rule: usize,
    /// Steps in rhs order
    pub steps: Vec<Step>,
    /// The arm's action
    pub action: PlanAction,
}

/// What a switch body does when no label matches the lookahead.
#[derive(Debug, Clone)]
pub enum Fallback {
    /// Raise a parse error naming the expected terminals, sorted
    Error(Vec<String>),
    /// Take the ε alternative
    Empty {
        /// The ε rule
        rule: usize,
        /// Its action
        action: PlanAction,
    },
}

/// How a fold arm rebuilds the accumulator.
#[derive(Debug, Clone)]
pub enum FoldAction {
    /// `[op, left, operands…]` with the arm's opener kind as the head
    Default,
    /// A transformed action; `$$1` is the accumulator
    Expr {
        /// The transformed text
        text: String,
        /// The parsed tree, if within the evaluable subset
        ast: Option<ActionExpr>,
    },
}

/// One operator arm of a fold loop.
#[derive(Debug, Clone)]
pub struct FoldArm {
    /// The opener terminal keying this arm
    pub opener: String,
    /// The rule this arm implements
    pub rule: usize,
    /// Steps after the recursive head; the first matches the opener
    pub steps: Vec<Step>,
    /// Whether the action references position 1 (the accumulator)
    pub uses_head: bool,
    /// How the accumulator is rebuilt
    pub action: FoldAction,
}

/// One per-iteration arm of a tail loop.
#[derive(Debug, Clone)]
pub struct TailArm {
    /// FIRST of the element fragment, sorted; used for dispatch between
    /// arms and for the leading-element guard
    pub labels: Vec<String>,
    /// The rule this arm implements
    pub rule: usize,
    /// Element steps parsed after the separator; bound steps are
    /// appended to the sequence
    pub steps: Vec<Step>,
}

/// The body of one emitted parse function.
#[derive(Debug, Clone)]
pub enum Body {
    /// Dispatch and Switch: one switch over the lookahead kind
    Switch {
        /// The labeled arms in rule order
        arms: Vec<Arm>,
        /// The default branch
        fallback: Fallback,
    },
    /// Tail lists: a separator-driven accumulation loop
    TailLoop {
        /// The ε alternative's action seeds the sequence
        seed: PlanAction,
        /// The ε alternative itself, for diagnostics
        seed_rule: usize,
        /// The separator terminal
        sep: String,
        /// Per-iteration arms
        arms: Vec<TailArm>,
        /// Separated-list orientation: one element may precede the
        /// first separator
        leading: bool,
    },
    /// Operator and accessor chains: an accumulator loop over a base
    FoldLoop {
        /// The non-recursive base alternative
        base: Arm,
        /// Operator arms keyed by opener terminal
        arms: Vec<FoldArm>,
        /// Right-associative: emit one bounded recursion instead of a loop
        right_assoc: bool,
    },
    /// Shared-prefix special: common steps once, then disambiguate
    PrefixSwitch {
        /// The common prefix steps
        prefix: Vec<Step>,
        /// The per-alternative remainders
        arms: Vec<Arm>,
        /// Terminals expected after the prefix, sorted
        expected: Vec<String>,
    },
    /// Elision-list special: separated list with holes
    ElisionLoop {
        /// The ε alternative's action seeds the sequence
        seed: PlanAction,
        /// The ε alternative itself, for diagnostics
        seed_rule: usize,
        /// The separator terminal
        sep: String,
        /// The element read wherever one is present
        elem: Step,
        /// FIRST of the element, sorted
        labels: Vec<String>,
    },
}

/// Planning failures; all abort emission.
#[derive(Debug)]
pub enum Error {
    /// SELECT sets overlap and no pattern or special handler covers it
    UnresolvedConflict(Conflict),
    /// An action references a position outside its rhs
    BadAction {
        /// The nonterminal owning the rule
        nonterminal: String,
        /// The offending rule
        rule: usize,
        /// The out-of-range position
        position: usize,
        /// The rhs length
        limit: usize,
    },
    /// The grammar requested a special handler that is not registered
    NoSpecialHandler {
        /// The nonterminal the handler was bound to
        nonterminal: String,
        /// The unknown handler name
        handler: String,
    },
    /// A registered handler cannot make sense of the nonterminal's shape
    SpecialMismatch {
        /// The nonterminal the handler was bound to
        nonterminal: String,
        /// The handler that refused
        handler: &'static str,
        /// Why
        reason: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnresolvedConflict(c) => write!(f, "unresolved {}", c),
            Error::BadAction {
                nonterminal,
                rule,
                position,
                limit,
            } => write!(
                f,
                "action of rule {} in {} references position {} but the rule has {} symbol(s)",
                rule, nonterminal, position, limit
            ),
            Error::NoSpecialHandler {
                nonterminal,
                handler,
            } => write!(
                f,
                "no special handler named '{}' is registered (requested by {})",
                handler, nonterminal
            ),
            Error::SpecialMismatch {
                nonterminal,
                handler,
                reason,
            } => write!(
                f,
                "special handler '{}' cannot emit {}: {}",
                handler, nonterminal, reason
            ),
        }
    }
}

/// The full emission plan: one body per nonterminal, in grammar order.
#[derive(Debug)]
pub struct Plan {
    /// The start symbol
    start: String,
    /// Bodies in grammar nonterminal order
    bodies: Vec<(String, Body)>,
    /// Name → position in `bodies`
    index: HashMap<String, usize>,
}

impl Plan {
    /// The start symbol
    pub fn start(&self) -> &str {
        &self.start
    }

    /// All bodies in grammar order
    pub fn bodies(&self) -> &[(String, Body)] {
        &self.bodies
    }

    /// The body of one nonterminal
    pub fn body(&self, nonterminal: &str) -> &Body {
        &self.bodies[self.index[nonterminal]].1
    }
}

/// Whether a symbol's parse result is worth capturing when no action
/// says otherwise: nonterminals always, terminals only when their kind
/// is word-like (NUMBER, IDENTIFIER); punctuation is structural.
pub fn value_bearing(sym: &Symbol) -> bool {
    match sym {
        Symbol::Nonterminal(_) => true,
        Symbol::Terminal(kind) => kind
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$'),
    }
}

/// Build the emission plan for a classified grammar.
pub fn build(grammar: &Grammar, analysis: &Analysis, classified: &Classified) -> Result<Plan, Error> {
    // transform every action up front; this is where BadAction surfaces
    let mut transformed = Vec::with_capacity(grammar.rules().len());
    for rule in grammar.rules() {
        let t = action::transform(&rule.action);
        if let Some(&position) = t.positions.iter().find(|&&k| k == 0 || k > rule.rhs.len()) {
            return Err(Error::BadAction {
                nonterminal: rule.lhs.clone(),
                rule: rule.index,
                position,
                limit: rule.rhs.len(),
            });
        }
        transformed.push(t);
    }

    let mut bodies = Vec::new();
    let mut index = HashMap::new();

    for nonterminal in grammar.nonterminals() {
        let body = match classified.pattern(nonterminal) {
            Pattern::Special(name) => {
                let handler =
                    Handler::lookup(name).ok_or_else(|| Error::NoSpecialHandler {
                        nonterminal: nonterminal.clone(),
                        handler: name.clone(),
                    })?;
                special::build(handler, nonterminal, grammar, analysis, &transformed)?
            }
            Pattern::Tail(shape) => tail_body(grammar, analysis, &transformed, shape),
            Pattern::BinaryOpChain(shape) => chain_body(grammar, &transformed, shape),
            Pattern::AccessorChain(shape) => accessor_body(grammar, &transformed, shape),
            Pattern::Dispatch => dispatch_body(grammar, analysis, &transformed, nonterminal),
            Pattern::Switch => {
                if let Some(conflict) = analysis.conflicts_of(nonterminal).next() {
                    return Err(Error::UnresolvedConflict(conflict.clone()));
                }
                switch_body(grammar, analysis, &transformed, nonterminal)
            }
        };

        index.insert(nonterminal.clone(), bodies.len());
        bodies.push((nonterminal.clone(), body));
    }

    Ok(Plan {
        start: grammar.start().to_string(),
        bodies,
        index,
    })
}

/// Lift a transformed action into a [PlanAction]
pub(crate) fn plan_action(t: &Transformed) -> PlanAction {
    match t.pass_through {
        Some(k) => PlanAction::PassThrough(k),
        None => PlanAction::Expr {
            text: t.text.clone(),
            ast: action::parse_expr(&t.text),
        },
    }
}

/// Sorted copy of a label set
pub(crate) fn sorted(labels: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = labels.into_iter().collect();
    v.sort();
    v.dedup();
    v
}

/// The generic switch body: one arm per alternative, keyed by its
/// SELECT set; the default raises an error naming the whole set.
fn switch_body(
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
    nonterminal: &str,
) -> Body {
    let mut arms = Vec::new();
    let mut expected = Vec::new();

    for &ri in grammar.alternatives(nonterminal) {
        let rule = grammar.rule(ri);
        let labels = sorted(analysis.select(ri).iter().cloned());
        expected.extend(labels.iter().cloned());
        arms.push(Arm {
            labels,
            rule: ri,
            steps: binding_plan(rule, &transformed[ri].positions),
            action: plan_action(&transformed[ri]),
        });
    }

    Body::Switch {
        arms,
        fallback: Fallback::Error(sorted(expected)),
    }
}

/// The dispatch body: terminal-keyed arms, ε as the default branch.
fn dispatch_body(
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
    nonterminal: &str,
) -> Body {
    let mut arms = Vec::new();
    let mut empty = None;
    let mut expected = Vec::new();

    for &ri in grammar.alternatives(nonterminal) {
        let rule = grammar.rule(ri);
        if rule.rhs.is_empty() {
            empty = Some(Fallback::Empty {
                rule: ri,
                action: plan_action(&transformed[ri]),
            });
            continue;
        }
        let labels = sorted(analysis.select(ri).iter().cloned());
        expected.extend(labels.iter().cloned());
        arms.push(Arm {
            labels,
            rule: ri,
            steps: binding_plan(rule, &transformed[ri].positions),
            action: plan_action(&transformed[ri]),
        });
    }

    Body::Switch {
        arms,
        fallback: empty.unwrap_or(Fallback::Error(sorted(expected))),
    }
}

/// The tail-loop body for both list orientations.
fn tail_body(
    grammar: &Grammar,
    analysis: &Analysis,
    transformed: &[Transformed],
    shape: &crate::pattern::TailShape,
) -> Body {
    let mut arms = Vec::new();

    for &ri in &shape.recursive {
        let rule = grammar.rule(ri);
        // element fragment: everything except the self reference and the
        // separator
        let elems: Vec<Symbol> = if shape.head_recursive {
            rule.rhs[2..].to_vec()
        } else {
            rule.rhs[1..rule.rhs.len() - 1].to_vec()
        };
        let (first, _) = first_of_seq(&elems, analysis.first_map(), analysis.nullable_map());

        let base_pos = if shape.head_recursive { 3 } else { 2 };
        let steps = elems
            .iter()
            .enumerate()
            .map(|(i, sym)| Step {
                pos: base_pos + i,
                sym: sym.clone(),
                bind: value_bearing(sym),
            })
            .collect();

        arms.push(TailArm {
            labels: sorted(first),
            rule: ri,
            steps,
        });
    }

    Body::TailLoop {
        seed: plan_action(&transformed[shape.empty_rule]),
        seed_rule: shape.empty_rule,
        sep: shape.sep.clone(),
        arms,
        leading: shape.head_recursive,
    }
}

/// Lift a chain alternative's action: the trivial pass-through means
/// "use the default `[op, left, right]` build".
fn fold_action(t: &Transformed) -> FoldAction {
    match t.pass_through {
        Some(_) => FoldAction::Default,
        None => FoldAction::Expr {
            text: t.text.clone(),
            ast: action::parse_expr(&t.text),
        },
    }
}

/// Steps after the recursive head of a fold alternative
fn fold_steps(rule: &grammar::cfg::Rule, t: &Transformed) -> Vec<Step> {
    let default = t.pass_through.is_some();
    rule.rhs
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, sym)| Step {
            pos: i + 1,
            sym: sym.clone(),
            // the default build captures every value-bearing operand;
            // the opener itself contributes its kind, not its value
            bind: if default {
                i > 1 && value_bearing(sym)
            } else {
                t.positions.contains(&(i + 1))
            },
        })
        .collect()
}

/// The fold-loop body of a binary-operator chain.
fn chain_body(
    grammar: &Grammar,
    transformed: &[Transformed],
    shape: &crate::pattern::ChainShape,
) -> Body {
    let base_rule = grammar.rule(shape.base_rule);
    let base = Arm {
        labels: Vec::new(),
        rule: shape.base_rule,
        steps: binding_plan(base_rule, &[1]),
        action: PlanAction::PassThrough(1),
    };

    let arms = shape
        .op_rules
        .iter()
        .map(|&ri| {
            let rule = grammar.rule(ri);
            let Symbol::Terminal(opener) = &rule.rhs[1] else {
                unreachable!()
            };
            FoldArm {
                opener: opener.clone(),
                rule: ri,
                steps: fold_steps(rule, &transformed[ri]),
                uses_head: transformed[ri].pass_through.is_none()
                    && transformed[ri].positions.contains(&1),
                action: fold_action(&transformed[ri]),
            }
        })
        .collect();

    Body::FoldLoop {
        base,
        arms,
        right_assoc: shape.right,
    }
}

/// The fold-loop body of an accessor chain.
fn accessor_body(
    grammar: &Grammar,
    transformed: &[Transformed],
    shape: &crate::pattern::AccessorShape,
) -> Body {
    let base_rule = grammar.rule(shape.base_rule);
    let base = Arm {
        labels: Vec::new(),
        rule: shape.base_rule,
        steps: binding_plan(base_rule, &[1]),
        action: PlanAction::PassThrough(1),
    };

    let arms = shape
        .postfix_rules
        .iter()
        .map(|&ri| {
            let rule = grammar.rule(ri);
            let Symbol::Terminal(opener) = &rule.rhs[1] else {
                unreachable!()
            };
            FoldArm {
                opener: opener.clone(),
                rule: ri,
                steps: fold_steps(rule, &transformed[ri]),
                uses_head: transformed[ri].pass_through.is_none()
                    && transformed[ri].positions.contains(&1),
                action: fold_action(&transformed[ri]),
            }
        })
        .collect();

    Body::FoldLoop {
        base,
        arms,
        right_assoc: false,
    }
}
