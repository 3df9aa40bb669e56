//! LL(1) analysis: bundles the closure computations and detects SELECT
//! conflicts.
//!
//! A grammar is LL(1) iff the SELECT sets of each nonterminal's
//! alternatives are pairwise disjoint. Conflicts are recorded, not fatal:
//! the pattern recognizer resolves the ones created by the iterative list
//! and chain shapes, and special handlers may resolve the rest. Whatever
//! is still conflicted at emission time fails there.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use log::debug;

use crate::cfg::Grammar;
use crate::compute::{compute_first, compute_follow, compute_nullable, compute_select};

/// A SELECT overlap between two alternatives of the same nonterminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The nonterminal whose alternatives overlap
    pub nonterminal: String,
    /// The two rule indices that overlap
    pub rules: (usize, usize),
    /// The shared terminals, sorted
    pub terminals: Vec<String>,
}

impl Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SELECT conflict in {} between rules {} and {} on {}",
            self.nonterminal,
            self.rules.0,
            self.rules.1,
            self.terminals.join(", ")
        )
    }
}

/// The analyzer's output: one snapshot of every derived set.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Whether each nonterminal derives ε
    nullable: HashMap<String, bool>,
    /// FIRST set of each nonterminal, terminals only
    first: HashMap<String, HashSet<String>>,
    /// FOLLOW set of each nonterminal
    follow: HashMap<String, HashSet<String>>,
    /// SELECT set per rule, indexed by rule index
    select: Vec<HashSet<String>>,
    /// Every SELECT overlap found
    conflicts: Vec<Conflict>,
}

/// Run the full analysis over a grammar.
pub fn analyze(grammar: &Grammar) -> Analysis {
    let nullable = compute_nullable(grammar);
    let first = compute_first(grammar, &nullable);
    let follow = compute_follow(grammar, &first, &nullable);
    let select = compute_select(grammar, &first, &nullable, &follow);

    let mut conflicts = Vec::new();
    for nonterminal in grammar.nonterminals() {
        let alternatives = grammar.alternatives(nonterminal);
        for (pos, &a) in alternatives.iter().enumerate() {
            for &b in &alternatives[pos + 1..] {
                let mut shared: Vec<String> =
                    select[a].intersection(&select[b]).cloned().collect();
                if !shared.is_empty() {
                    shared.sort();
                    debug!(
                        "{}: rules {} and {} overlap on {}",
                        nonterminal,
                        a,
                        b,
                        shared.join(", ")
                    );
                    conflicts.push(Conflict {
                        nonterminal: nonterminal.clone(),
                        rules: (a, b),
                        terminals: shared,
                    });
                }
            }
        }
    }

    Analysis {
        nullable,
        first,
        follow,
        select,
        conflicts,
    }
}

impl Analysis {
    /// Whether the nonterminal derives ε
    pub fn nullable(&self, nonterminal: &str) -> bool {
        *self.nullable.get(nonterminal).unwrap()
    }

    /// FIRST set of the nonterminal, terminals only
    pub fn first(&self, nonterminal: &str) -> &HashSet<String> {
        self.first.get(nonterminal).unwrap()
    }

    /// FOLLOW set of the nonterminal
    pub fn follow(&self, nonterminal: &str) -> &HashSet<String> {
        self.follow.get(nonterminal).unwrap()
    }

    /// SELECT set of the rule with the given index
    pub fn select(&self, rule: usize) -> &HashSet<String> {
        &self.select[rule]
    }

    /// The nullable map, for staging into later passes
    pub fn nullable_map(&self) -> &HashMap<String, bool> {
        &self.nullable
    }

    /// The FIRST map, for staging into later passes
    pub fn first_map(&self) -> &HashMap<String, HashSet<String>> {
        &self.first
    }

    /// Every conflict found, in nonterminal order
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// The conflicts involving one nonterminal
    pub fn conflicts_of<'a>(&'a self, nonterminal: &'a str) -> impl Iterator<Item = &'a Conflict> {
        self.conflicts
            .iter()
            .filter(move |c| c.nonterminal == nonterminal)
    }

    /// Whether the nonterminal has any SELECT overlap
    pub fn conflicted(&self, nonterminal: &str) -> bool {
        self.conflicts_of(nonterminal).next().is_some()
    }

    /// Whether the grammar is LL(1) as written (zero conflicts)
    pub fn is_ll1(&self) -> bool {
        self.conflicts.is_empty()
    }
}
