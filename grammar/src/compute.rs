//! Closure computations over a grammar: nullable, FIRST, FOLLOW, SELECT.
//!
//! All four are iterate-to-fixpoint set computations; each pass rebuilds
//! the sets from the previous snapshot and stops once nothing changed.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::cfg::{Grammar, Symbol, END};

/// Whether each nonterminal can derive the empty string.
///
/// A nonterminal is nullable iff it has a rule whose rhs is empty or
/// whose symbols are all nullable.
pub fn compute_nullable(grammar: &Grammar) -> HashMap<String, bool> {
    let mut nullable: HashMap<String, bool> = grammar
        .nonterminals()
        .iter()
        .map(|n| (n.clone(), false))
        .collect();

    let mut pass = 0;
    loop {
        let mut new_nullable = nullable.clone();

        for rule in grammar.rules() {
            let all = rule.rhs.iter().all(|s| match s {
                Symbol::Terminal(_) => false,
                Symbol::Nonterminal(n) => *nullable.get(n).unwrap(),
            });
            if all {
                new_nullable.insert(rule.lhs.clone(), true);
            }
        }

        pass += 1;
        if nullable != new_nullable {
            nullable = new_nullable;
        } else {
            debug!("nullable fixpoint reached after {} passes", pass);
            break;
        }
    }

    nullable
}

/// The FIRST set of each nonterminal, terminals only.
///
/// ε membership is carried separately by the nullable map.
pub fn compute_first(
    grammar: &Grammar,
    nullable: &HashMap<String, bool>,
) -> HashMap<String, HashSet<String>> {
    let mut first: HashMap<String, HashSet<String>> = grammar
        .nonterminals()
        .iter()
        .map(|n| (n.clone(), HashSet::new()))
        .collect();

    let mut pass = 0;
    loop {
        let mut new_first = first.clone();

        for rule in grammar.rules() {
            let (set, _) = first_of_seq(&rule.rhs, &first, nullable);
            new_first.get_mut(&rule.lhs).unwrap().extend(set);
        }

        pass += 1;
        if first != new_first {
            first = new_first;
        } else {
            debug!("FIRST fixpoint reached after {} passes", pass);
            break;
        }
    }

    first
}

/// FIRST of a sentential fragment, plus whether the whole fragment is
/// nullable.
///
/// Walks the fragment left to right, stopping at the first symbol that
/// cannot derive ε.
pub fn first_of_seq(
    symbols: &[Symbol],
    first: &HashMap<String, HashSet<String>>,
    nullable: &HashMap<String, bool>,
) -> (HashSet<String>, bool) {
    let mut set = HashSet::new();

    for symbol in symbols {
        match symbol {
            Symbol::Terminal(t) => {
                set.insert(t.clone());
                return (set, false);
            }
            Symbol::Nonterminal(n) => {
                set.extend(first.get(n).unwrap().iter().cloned());
                if !nullable.get(n).unwrap() {
                    return (set, false);
                }
            }
        }
    }

    (set, true)
}

/// The FOLLOW set of each nonterminal, seeded with `$end` for the start
/// symbol.
pub fn compute_follow(
    grammar: &Grammar,
    first: &HashMap<String, HashSet<String>>,
    nullable: &HashMap<String, bool>,
) -> HashMap<String, HashSet<String>> {
    let mut follow: HashMap<String, HashSet<String>> = grammar
        .nonterminals()
        .iter()
        .map(|n| (n.clone(), HashSet::new()))
        .collect();
    follow
        .get_mut(grammar.start())
        .unwrap()
        .insert(END.to_string());

    let mut pass = 0;
    loop {
        let mut new_follow = follow.clone();

        for rule in grammar.rules() {
            for (i, symbol) in rule.rhs.iter().enumerate() {
                let Symbol::Nonterminal(b) = symbol else {
                    continue;
                };

                let (beta_first, beta_nullable) = first_of_seq(&rule.rhs[i + 1..], first, nullable);
                let target = new_follow.get_mut(b).unwrap();
                target.extend(beta_first);
                if beta_nullable {
                    let lhs_follow = follow.get(&rule.lhs).unwrap().clone();
                    new_follow.get_mut(b).unwrap().extend(lhs_follow);
                }
            }
        }

        pass += 1;
        if follow != new_follow {
            follow = new_follow;
        } else {
            debug!("FOLLOW fixpoint reached after {} passes", pass);
            break;
        }
    }

    follow
}

/// The SELECT set of each rule, indexed by rule index.
///
/// SELECT(A → α) is FIRST(α) minus ε, plus FOLLOW(A) when α is nullable.
pub fn compute_select(
    grammar: &Grammar,
    first: &HashMap<String, HashSet<String>>,
    nullable: &HashMap<String, bool>,
    follow: &HashMap<String, HashSet<String>>,
) -> Vec<HashSet<String>> {
    grammar
        .rules()
        .iter()
        .map(|rule| {
            let (mut set, all_nullable) = first_of_seq(&rule.rhs, first, nullable);
            if all_nullable {
                set.extend(follow.get(&rule.lhs).unwrap().iter().cloned());
            }
            set
        })
        .collect()
}
